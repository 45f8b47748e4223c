//! Seam between the extraction pipeline and whatever opens e-book containers.
//!
//! The pipeline only ever sees [`ContainerOpener::open`]'s `Result`: a handle
//! it can query, or an [`OpenError`] it answers with placeholder data.

use std::collections::BTreeMap;

use url::Url;

use crate::source::BookBuffer;

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("container is not a readable archive: {0}")]
    Archive(String),

    #[error("container is missing {0}")]
    Missing(String),

    #[error("malformed {document}: {reason}")]
    Malformed { document: String, reason: String },
}

/// Package-level metadata as the container declares it, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub publisher: Option<String>,
    pub date: Option<String>,
    pub identifier: Option<String>,
    pub description: Option<String>,
    /// `<meta name="..." content="...">` pairs, e.g. `cover`.
    pub meta: BTreeMap<String, String>,
}

impl PackageMetadata {
    pub fn meta(&self, name: &str) -> Option<&str> {
        self.meta.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Path inside the container, already resolved against the package document.
    pub href: String,
    pub media_type: String,
    pub properties: Vec<String>,
}

/// One node of the container's navigation tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavItem {
    pub label: Option<String>,
    pub href: Option<String>,
    pub kind: Option<String>,
    pub size: Option<u64>,
    pub subitems: Vec<NavItem>,
}

/// A resource fetched out of an open container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub bytes: Vec<u8>,
    pub media_type: Option<String>,
}

impl Resource {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(strip_bom(&self.bytes)).into_owned()
    }
}

pub trait BookHandle: Send + Sync {
    fn metadata(&self) -> &PackageMetadata;

    fn manifest(&self) -> &[ManifestItem];

    /// `None` when the container carries no navigation document at all.
    fn navigation(&self) -> Option<&[NavItem]>;

    /// Direct cover reference, if the package declares one.
    fn cover(&self) -> Option<&str>;

    /// Base URL that container paths are resolved against.
    fn base_url(&self) -> &Url;

    /// Fetches a container path or a URL under [`BookHandle::base_url`].
    fn request(&self, path_or_url: &str) -> anyhow::Result<Resource>;

    fn cover_url(&self) -> Option<String>;

    /// Fetches an ephemeral `blob:` URL minted by this handle.
    fn fetch_blob(&self, url: &str) -> anyhow::Result<Resource> {
        anyhow::bail!("blob urls are not supported by this container: {url}")
    }
}

pub trait ContainerOpener: Send + Sync {
    fn open(&self, bytes: BookBuffer) -> Result<Box<dyn BookHandle>, OpenError>;
}

pub(crate) fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Best-effort media type from a path's extension.
pub fn media_type_for_path(path: &str) -> &'static str {
    let path = path.split(['#', '?']).next().unwrap_or(path);
    let name = path.rsplit('/').next().unwrap_or(path);
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "xhtml" => "application/xhtml+xml",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "ncx" => "application/x-dtbncx+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_text_drops_utf8_bom() {
        let resource = Resource {
            bytes: vec![0xEF, 0xBB, 0xBF, b'h', b'i'],
            media_type: None,
        };
        assert_eq!(resource.text(), "hi");
    }

    #[test]
    fn media_type_for_path_ignores_case_and_fragments() {
        assert_eq!(media_type_for_path("images/Cover.JPG"), "image/jpeg");
        assert_eq!(media_type_for_path("text/ch1.xhtml#p3"), "application/xhtml+xml");
        assert_eq!(media_type_for_path("README"), "application/octet-stream");
    }
}
