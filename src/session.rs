use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::container::{BookHandle, ContainerOpener, Resource};
use crate::cover::resolve_cover;
use crate::epub::EpubOpener;
use crate::formats::TocEntry;
use crate::source::{ByteSource, LocalFs};
use crate::toc;

struct OpenBook {
    path: String,
    handle: Box<dyn BookHandle>,
}

/// Holds at most one open container for interactive use. The caller owns the
/// session and decides when a container is opened and released.
pub struct BookSession {
    source: Arc<dyn ByteSource>,
    opener: Arc<dyn ContainerOpener>,
    current: Option<OpenBook>,
}

impl BookSession {
    pub fn new(source: Arc<dyn ByteSource>, opener: Arc<dyn ContainerOpener>) -> Self {
        Self {
            source,
            opener,
            current: None,
        }
    }

    pub fn local() -> Self {
        Self::new(Arc::new(LocalFs), Arc::new(EpubOpener))
    }

    /// Opens `path`, releasing whatever was open before. On failure the
    /// session is left closed.
    pub async fn open(&mut self, path: &str) -> anyhow::Result<&dyn BookHandle> {
        self.close();

        let bytes = self
            .source
            .read_bytes(Path::new(path))
            .await
            .with_context(|| format!("read container: {path}"))?;
        let handle = self
            .opener
            .open(bytes)
            .with_context(|| format!("open container: {path}"))?;

        tracing::debug!(path, "container opened");
        let book = self.current.insert(OpenBook {
            path: path.to_owned(),
            handle,
        });
        Ok(book.handle.as_ref())
    }

    /// Releases the open container. Returns whether one was open.
    pub fn close(&mut self) -> bool {
        match self.current.take() {
            Some(book) => {
                tracing::debug!(path = %book.path, "container closed");
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn path(&self) -> Option<&str> {
        self.current.as_ref().map(|book| book.path.as_str())
    }

    pub fn handle(&self) -> anyhow::Result<&dyn BookHandle> {
        self.current
            .as_ref()
            .map(|book| book.handle.as_ref())
            .context("no container is open")
    }

    pub fn toc(&self) -> anyhow::Result<Vec<TocEntry>> {
        Ok(toc::extract(self.handle()?.navigation()))
    }

    pub fn cover(&self) -> anyhow::Result<Option<String>> {
        Ok(resolve_cover(self.handle()?))
    }

    pub fn request(&self, path_or_url: &str) -> anyhow::Result<Resource> {
        self.handle()?.request(path_or_url)
    }
}
