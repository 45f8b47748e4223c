use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::{NaiveDate, Utc};
use tokio_util::sync::CancellationToken;

use crate::batch::BatchDriver;
use crate::cli::ExtractArgs;
use crate::container::ContainerOpener;
use crate::cover::resolve_cover;
use crate::epub::EpubOpener;
use crate::formats::{ContainerRecord, TocEntry};
use crate::normalize::normalize;
use crate::placeholder::{PlaceholderSource, RandomPlaceholders};
use crate::scan::scan_dir;
use crate::source::{ByteSource, LocalFs};
use crate::{export, toc};

pub async fn run(args: ExtractArgs) -> anyhow::Result<()> {
    let mut paths = args.paths.clone();
    if let Some(dir) = args.dir.as_deref() {
        let found = scan_dir(&LocalFs, Path::new(dir), args.max_files)
            .await
            .with_context(|| format!("scan directory: {dir}"))?;
        paths.extend(found.into_iter().map(|file| file.path));
    }
    if paths.is_empty() {
        anyhow::bail!("nothing to extract: pass container paths or --dir");
    }

    let options = ExtractOptions {
        extract_cover: !args.no_cover,
    };
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted; stopping after the current container");
                cancel.cancel();
            }
        }
    });

    let mut driver =
        BatchDriver::new(Extractor::local(options, args.seed)).with_cancellation(cancel);
    let results = driver.run(&paths).await;
    interrupt.abort();

    if let Some(csv) = args.csv.as_deref() {
        export::write_report(Path::new(csv), &results, args.force)?;
    }
    if let Some(json) = args.json.as_deref() {
        export::write_results_json(Path::new(json), &results, args.force)?;
    }
    if let Some(archive) = args.archive.as_deref() {
        export::write_bundle(Path::new(archive), &results, args.force)?;
    }
    if args.csv.is_none() && args.json.is_none() && args.archive.is_none() {
        for result in &results {
            println!("{}", serde_json::to_string(result).context("serialize result")?);
        }
    }

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    eprintln!(
        "extracted {succeeded} of {} containers ({} failed)",
        results.len(),
        results.len() - succeeded
    );
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Resolve and embed a cover image as a data URI.
    pub extract_cover: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            extract_cover: true,
        }
    }
}

/// Runs one container through read, open, TOC flattening, normalization and
/// cover lookup.
pub struct Extractor {
    source: Arc<dyn ByteSource>,
    opener: Arc<dyn ContainerOpener>,
    placeholders: Box<dyn PlaceholderSource>,
    options: ExtractOptions,
    today: Option<NaiveDate>,
}

impl Extractor {
    pub fn new(
        source: Arc<dyn ByteSource>,
        opener: Arc<dyn ContainerOpener>,
        placeholders: Box<dyn PlaceholderSource>,
        options: ExtractOptions,
    ) -> Self {
        Self {
            source,
            opener,
            placeholders,
            options,
            today: None,
        }
    }

    /// Local files opened as EPUB. A seed makes placeholder data reproducible.
    pub fn local(options: ExtractOptions, seed: Option<u64>) -> Self {
        let placeholders = match seed {
            Some(seed) => RandomPlaceholders::seeded(seed),
            None => RandomPlaceholders::from_entropy(),
        };
        Self::new(
            Arc::new(LocalFs),
            Arc::new(EpubOpener),
            Box::new(placeholders),
            options,
        )
    }

    /// Pins the date placeholder publish dates count back from.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn source(&self) -> &Arc<dyn ByteSource> {
        &self.source
    }

    /// Only a failing byte source is an error; anything wrong inside the
    /// container degrades to placeholder data.
    pub async fn extract(&mut self, path: &str) -> anyhow::Result<(ContainerRecord, Vec<TocEntry>)> {
        let fs_path = Path::new(path);
        let bytes = self
            .source
            .read_bytes(fs_path)
            .await
            .with_context(|| format!("read container: {path}"))?;
        let byte_len = bytes.len() as u64;

        let file_size = match self.source.stat(fs_path).await {
            Ok(stat) => stat.size,
            Err(err) => {
                tracing::debug!(path, ?err, "stat failed; using byte length");
                byte_len
            }
        };

        let opened = self.opener.open(bytes);
        let entries = match &opened {
            Ok(handle) => toc::extract(handle.navigation()),
            Err(_) => Vec::new(),
        };

        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let (mut record, entries) = normalize(
            opened.as_deref(),
            entries,
            path,
            file_size,
            self.placeholders.as_mut(),
            today,
        );

        if self.options.extract_cover
            && let Ok(handle) = &opened
        {
            record.cover_data_uri = resolve_cover(handle.as_ref());
        }

        tracing::debug!(
            path,
            title = %record.title,
            chapters = record.chapter_count,
            cover = record.cover_data_uri.is_some(),
            "extracted"
        );
        Ok((record, entries))
    }
}
