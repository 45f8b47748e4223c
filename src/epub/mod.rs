//! Zip-backed EPUB implementation of [`ContainerOpener`].

pub mod parser;

use std::collections::HashMap;
use std::io::{Cursor, Read as _};
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use url::Url;
use zip::ZipArchive;

use crate::container::{
    BookHandle, ContainerOpener, ManifestItem, NavItem, OpenError, PackageMetadata, Resource,
    media_type_for_path, strip_bom,
};
use crate::source::BookBuffer;

use self::parser::{parse_container_xml, parse_nav_document, parse_ncx, parse_opf};

pub const BASE_URL: &str = "epub://book/";

type Archive = ZipArchive<Cursor<Arc<[u8]>>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct EpubOpener;

impl ContainerOpener for EpubOpener {
    fn open(&self, bytes: BookBuffer) -> Result<Box<dyn BookHandle>, OpenError> {
        Ok(Box::new(EpubHandle::open(bytes)?))
    }
}

pub struct EpubHandle {
    archive: Mutex<Archive>,
    metadata: PackageMetadata,
    manifest: Vec<ManifestItem>,
    navigation: Option<Vec<NavItem>>,
    cover: Option<String>,
    base_url: Url,
}

impl EpubHandle {
    pub fn open(bytes: BookBuffer) -> Result<Self, OpenError> {
        let base_url = Url::parse(BASE_URL).map_err(|err| OpenError::Archive(err.to_string()))?;
        let mut archive = ZipArchive::new(Cursor::new(bytes.into_shared()))
            .map_err(|err| OpenError::Archive(err.to_string()))?;

        let entry_sizes = (0..archive.len())
            .filter_map(|i| {
                let file = archive.by_index(i).ok()?;
                Some((file.name().to_owned(), file.size()))
            })
            .collect::<HashMap<_, _>>();

        let container = read_text(&mut archive, "META-INF/container.xml")
            .map_err(|_| OpenError::Missing("META-INF/container.xml".to_owned()))?;
        let opf_path = parse_container_xml(&container)?;
        let opf = read_text(&mut archive, &opf_path)
            .map_err(|_| OpenError::Missing(format!("package document {opf_path}")))?;
        let opf = parse_opf(&opf)?;
        let opf_dir = parent_dir(&opf_path);

        let manifest = opf
            .manifest
            .into_iter()
            .map(|item| ManifestItem {
                href: join_path(opf_dir, &item.href),
                id: item.id,
                media_type: item.media_type,
                properties: item.properties,
            })
            .collect::<Vec<_>>();

        let cover = manifest
            .iter()
            .find(|item| item.properties.iter().any(|p| p == "cover-image"))
            .map(|item| item.href.clone());

        let mut navigation = load_navigation(&mut archive, &manifest, opf.spine_toc.as_deref());
        if let Some(items) = navigation.as_mut() {
            annotate(items, &manifest, &entry_sizes);
        }

        Ok(Self {
            archive: Mutex::new(archive),
            metadata: opf.metadata,
            manifest,
            navigation,
            cover,
            base_url,
        })
    }

    /// Maps a container path or a URL under the base URL to a container path.
    fn container_path(&self, path_or_url: &str) -> anyhow::Result<String> {
        let path = match Url::parse(path_or_url) {
            Ok(url) => {
                if url.scheme() != self.base_url.scheme() || url.host() != self.base_url.host() {
                    anyhow::bail!("url is outside the container: {url}");
                }
                percent_encoding::percent_decode_str(url.path())
                    .decode_utf8_lossy()
                    .into_owned()
            }
            Err(_) => strip_fragment(path_or_url).to_owned(),
        };
        Ok(path.trim_start_matches('/').to_owned())
    }
}

impl BookHandle for EpubHandle {
    fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    fn manifest(&self) -> &[ManifestItem] {
        &self.manifest
    }

    fn navigation(&self) -> Option<&[NavItem]> {
        self.navigation.as_deref()
    }

    fn cover(&self) -> Option<&str> {
        self.cover.as_deref()
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, path_or_url: &str) -> anyhow::Result<Resource> {
        let path = self.container_path(path_or_url)?;
        let bytes = {
            let mut archive = self
                .archive
                .lock()
                .map_err(|_| anyhow::anyhow!("epub archive lock poisoned"))?;
            read_entry(&mut archive, &path)?
        };

        let media_type = self
            .manifest
            .iter()
            .find(|item| item.href == path)
            .map(|item| item.media_type.clone())
            .filter(|media_type| !media_type.is_empty())
            .unwrap_or_else(|| media_type_for_path(&path).to_owned());

        Ok(Resource {
            bytes,
            media_type: Some(media_type),
        })
    }

    fn cover_url(&self) -> Option<String> {
        self.manifest
            .iter()
            .filter(|item| item.media_type.starts_with("image/"))
            .find(|item| {
                item.id.to_ascii_lowercase().contains("cover")
                    || item.href.to_ascii_lowercase().contains("cover")
            })
            .and_then(|item| self.base_url.join(&item.href).ok())
            .map(String::from)
    }
}

/// EPUB 3 nav document first, the NCX second.
fn load_navigation(
    archive: &mut Archive,
    manifest: &[ManifestItem],
    spine_toc: Option<&str>,
) -> Option<Vec<NavItem>> {
    if let Some(nav) = manifest
        .iter()
        .find(|item| item.properties.iter().any(|p| p == "nav"))
    {
        match read_text(archive, &nav.href)
            .map_err(|err| OpenError::Missing(format!("nav document {}: {err:#}", nav.href)))
            .and_then(|text| parse_nav_document(&text))
        {
            Ok(Some(mut items)) => {
                resolve_hrefs(&mut items, parent_dir(&nav.href));
                return Some(items);
            }
            Ok(None) => tracing::debug!(href = %nav.href, "nav document has no toc"),
            Err(err) => tracing::debug!(href = %nav.href, %err, "nav document unusable"),
        }
    }

    let ncx = spine_toc
        .and_then(|id| manifest.iter().find(|item| item.id == id))
        .or_else(|| {
            manifest
                .iter()
                .find(|item| item.media_type == "application/x-dtbncx+xml")
        })?;
    match read_text(archive, &ncx.href)
        .map_err(|err| OpenError::Missing(format!("ncx {}: {err:#}", ncx.href)))
        .and_then(|text| parse_ncx(&text))
    {
        Ok(mut items) => {
            resolve_hrefs(&mut items, parent_dir(&ncx.href));
            Some(items)
        }
        Err(err) => {
            tracing::debug!(href = %ncx.href, %err, "ncx unusable");
            None
        }
    }
}

fn resolve_hrefs(items: &mut [NavItem], base_dir: &str) {
    for item in items {
        if let Some(href) = item.href.as_mut() {
            *href = join_path(base_dir, href);
        }
        resolve_hrefs(&mut item.subitems, base_dir);
    }
}

/// Fills in each nav item's media kind and the size of the document it points at.
fn annotate(items: &mut [NavItem], manifest: &[ManifestItem], sizes: &HashMap<String, u64>) {
    for item in items {
        if let Some(href) = item.href.as_deref() {
            let path = strip_fragment(href);
            let decoded = percent_encoding::percent_decode_str(path).decode_utf8_lossy();
            if let Some(found) = manifest
                .iter()
                .find(|m| m.href == path || m.href == *decoded)
            {
                item.kind = Some(kind_for_media_type(&found.media_type).to_owned());
            }
            item.size = sizes
                .get(path)
                .or_else(|| sizes.get(decoded.as_ref()))
                .copied();
        }
        annotate(&mut item.subitems, manifest, sizes);
    }
}

fn kind_for_media_type(media_type: &str) -> &'static str {
    if media_type.starts_with("image/") {
        "image"
    } else if media_type == "application/xhtml+xml" || media_type.starts_with("text/") {
        "text"
    } else {
        "other"
    }
}

fn read_text(archive: &mut Archive, path: &str) -> anyhow::Result<String> {
    let bytes = read_entry(archive, path)?;
    Ok(String::from_utf8_lossy(strip_bom(&bytes)).into_owned())
}

fn read_entry(archive: &mut Archive, path: &str) -> anyhow::Result<Vec<u8>> {
    // Some packagers percent-encode hrefs that are stored unencoded.
    let name = if archive.index_for_name(path).is_some() {
        path.to_owned()
    } else {
        percent_encoding::percent_decode_str(path)
            .decode_utf8()
            .with_context(|| format!("invalid utf-8 in path: {path}"))?
            .into_owned()
    };

    let mut file = archive
        .by_name(&name)
        .with_context(|| format!("entry not found: {path}"))?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)
        .with_context(|| format!("read entry: {path}"))?;
    Ok(contents)
}

fn strip_fragment(href: &str) -> &str {
    href.split(['#', '?']).next().unwrap_or(href)
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Joins a relative href onto a container directory, folding `.` and `..`.
/// The fragment, if any, is kept.
pub fn join_path(base_dir: &str, href: &str) -> String {
    let (path, fragment) = match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    };

    let mut segments: Vec<&str> = if path.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut joined = segments.join("/");
    if let Some(fragment) = fragment {
        joined.push('#');
        joined.push_str(fragment);
    }
    joined
}
