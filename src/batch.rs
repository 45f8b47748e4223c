use std::path::Path;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::extract::Extractor;
use crate::formats::BatchItemResult;
use crate::scan::scan_dir;

pub const CANCELLED: &str = "cancelled";

/// Where a run is, published before each item starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub index: usize,
    pub total: usize,
    pub current_path: Option<String>,
    pub percent: u8,
    pub processing: bool,
}

impl BatchProgress {
    fn starting(index: usize, total: usize, path: &str) -> Self {
        let percent = ((index + 1) as f64 / total as f64 * 100.0).round();
        Self {
            index,
            total,
            current_path: Some(path.to_owned()),
            percent: percent.clamp(0.0, 100.0) as u8,
            processing: true,
        }
    }
}

/// Extracts containers one at a time. A failing item becomes a
/// [`BatchItemResult::Failure`] and never stops the run.
pub struct BatchDriver {
    extractor: Extractor,
    progress: watch::Sender<BatchProgress>,
    cancel: CancellationToken,
}

impl BatchDriver {
    pub fn new(extractor: Extractor) -> Self {
        let (progress, _) = watch::channel(BatchProgress::default());
        Self {
            extractor,
            progress,
            cancel: CancellationToken::new(),
        }
    }

    /// Checked between items; an item already in flight runs to completion.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> BatchProgress {
        self.progress.borrow().clone()
    }

    /// One result per input path, in input order.
    pub async fn run(&mut self, paths: &[String]) -> Vec<BatchItemResult> {
        let total = paths.len();
        let mut results = Vec::with_capacity(total);
        self.progress.send_replace(BatchProgress::default());

        for (index, path) in paths.iter().enumerate() {
            if self.cancel.is_cancelled() {
                results.push(BatchItemResult::Failure {
                    path: path.clone(),
                    error_message: CANCELLED.to_owned(),
                });
                continue;
            }

            self.progress
                .send_replace(BatchProgress::starting(index, total, path));
            tracing::info!(index = index + 1, total, path = %path, "extracting");

            let result = match self.extractor.extract(path).await {
                Ok((record, toc)) => BatchItemResult::Success {
                    path: path.clone(),
                    record,
                    toc,
                },
                Err(err) => {
                    tracing::warn!(path = %path, ?err, "extraction failed");
                    BatchItemResult::Failure {
                        path: path.clone(),
                        error_message: format!("{err:#}"),
                    }
                }
            };
            results.push(result);
        }

        self.progress.send_replace(BatchProgress::default());
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        tracing::info!(total, succeeded, failed = total - succeeded, "batch finished");
        results
    }

    /// Scans `root` for containers and runs over what it finds.
    pub async fn run_dir(
        &mut self,
        root: &Path,
        max_files: usize,
    ) -> anyhow::Result<Vec<BatchItemResult>> {
        let found = scan_dir(self.extractor.source().as_ref(), root, max_files).await?;
        let paths = found.into_iter().map(|file| file.path).collect::<Vec<_>>();
        Ok(self.run(&paths).await)
    }
}
