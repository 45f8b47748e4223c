use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;

/// Container bytes as they come off the byte source.
///
/// The shape is fixed here, at the I/O boundary, so nothing downstream has to
/// inspect what kind of buffer it was handed.
#[derive(Debug, Clone)]
pub enum BookBuffer {
    /// Read into a fresh buffer owned by the caller.
    Owned(Vec<u8>),
    /// Shared with another owner (an in-memory source, a cache).
    Shared(Arc<[u8]>),
}

impl BookBuffer {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Owned(bytes) => bytes,
            Self::Shared(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn into_shared(self) -> Arc<[u8]> {
        match self {
            Self::Owned(bytes) => Arc::from(bytes),
            Self::Shared(bytes) => bytes,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub is_file: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("read file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("stat {}: {source}", path.display())]
    Stat { path: PathBuf, source: io::Error },

    #[error("list directory {}: {source}", path.display())]
    ListDir { path: PathBuf, source: io::Error },
}

/// File-system access consumed by the extraction pipeline.
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn read_bytes(&self, path: &Path) -> Result<BookBuffer, SourceError>;
    async fn stat(&self, path: &Path) -> Result<FileStat, SourceError>;
    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, SourceError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl ByteSource for LocalFs {
    async fn read_bytes(&self, path: &Path) -> Result<BookBuffer, SourceError> {
        fs::read(path)
            .await
            .map(BookBuffer::Owned)
            .map_err(|source| SourceError::Read {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn stat(&self, path: &Path) -> Result<FileStat, SourceError> {
        let meta = fs::metadata(path)
            .await
            .map_err(|source| SourceError::Stat {
                path: path.to_path_buf(),
                source,
            })?;

        // Not every platform/filesystem records a birth time.
        Ok(FileStat {
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
            created: meta.created().ok().map(DateTime::<Utc>::from),
        })
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, SourceError> {
        let list_err = |source| SourceError::ListDir {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = fs::read_dir(path).await.map_err(list_err)?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(list_err)? {
            let file_type = entry.file_type().await.map_err(list_err)?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: file_type.is_dir(),
                is_file: file_type.is_file(),
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_fs_reads_stats_and_lists() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        std::fs::write(temp.path().join("a.epub"), b"abc")?;
        std::fs::create_dir(temp.path().join("nested"))?;

        let source = LocalFs;
        let bytes = source.read_bytes(&temp.path().join("a.epub")).await?;
        assert_eq!(bytes.as_slice(), b"abc");

        let stat = source.stat(&temp.path().join("a.epub")).await?;
        assert_eq!(stat.size, 3);
        assert!(stat.modified.is_some());

        let mut entries = source.list_dir(temp.path()).await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_file);
        assert!(entries[1].is_dir);
        Ok(())
    }

    #[tokio::test]
    async fn local_fs_read_error_names_the_path() {
        let err = LocalFs
            .read_bytes(Path::new("/definitely/not/here.epub"))
            .await
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("/definitely/not/here.epub"), "{err}");
    }

    #[test]
    fn book_buffer_into_shared_keeps_bytes() {
        let shared = BookBuffer::Owned(vec![1, 2, 3]).into_shared();
        assert_eq!(&shared[..], &[1, 2, 3]);
        assert_eq!(BookBuffer::Shared(shared).len(), 3);
    }
}
