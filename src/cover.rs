//! Cover image lookup. Four strategies are tried in order and the first one
//! that produces image bytes wins; a miss at any step only moves on.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

use crate::container::{BookHandle, Resource, media_type_for_path};

static IMG_SRC_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r#"(?i)<img[^>]+src="([^"]+)"[^>]*>"#));

pub fn resolve_cover(handle: &dyn BookHandle) -> Option<String> {
    let strategies: [(&str, fn(&dyn BookHandle) -> anyhow::Result<Option<String>>); 4] = [
        ("cover reference", from_cover_reference),
        ("cover metadata", from_cover_metadata),
        ("first toc document", from_first_document),
        ("cover url", from_cover_url),
    ];

    for (name, strategy) in strategies {
        match strategy(handle) {
            Ok(Some(uri)) => {
                tracing::debug!(strategy = name, "cover found");
                return Some(uri);
            }
            Ok(None) => tracing::debug!(strategy = name, "no cover candidate"),
            Err(err) => tracing::debug!(strategy = name, ?err, "cover lookup failed"),
        }
    }
    None
}

fn from_cover_reference(handle: &dyn BookHandle) -> anyhow::Result<Option<String>> {
    let Some(path) = handle.cover() else {
        return Ok(None);
    };
    let resource = handle.request(path)?;
    Ok(Some(resource_data_uri(&resource, path)))
}

fn from_cover_metadata(handle: &dyn BookHandle) -> anyhow::Result<Option<String>> {
    let metadata = handle.metadata();
    let Some(id) = metadata.meta("cover-image").or_else(|| metadata.meta("cover")) else {
        return Ok(None);
    };
    let Some(item) = handle.manifest().iter().find(|item| item.id == id) else {
        anyhow::bail!("cover metadata points at unknown manifest id {id}");
    };
    let resource = handle.request(&item.href)?;
    Ok(Some(resource_data_uri(&resource, &item.href)))
}

fn from_first_document(handle: &dyn BookHandle) -> anyhow::Result<Option<String>> {
    let Some(href) = handle
        .navigation()
        .and_then(|items| items.first())
        .and_then(|item| item.href.as_deref())
    else {
        return Ok(None);
    };

    let document = handle.request(href)?.text();
    let img_src = IMG_SRC_RE
        .as_ref()
        .map_err(|err| anyhow::anyhow!("compile img regex: {err}"))?;
    let Some(src) = img_src
        .captures(&document)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    else {
        return Ok(None);
    };

    let url = handle.base_url().join(href)?.join(src)?;
    if matches!(url.scheme(), "http" | "https") {
        tracing::debug!(%url, "skipping remote cover image");
        return Ok(None);
    }
    let resource = handle.request(url.as_str())?;
    Ok(Some(resource_data_uri(&resource, url.path())))
}

fn from_cover_url(handle: &dyn BookHandle) -> anyhow::Result<Option<String>> {
    let Some(url) = handle.cover_url() else {
        return Ok(None);
    };
    let resource = if url.starts_with("blob:") {
        handle.fetch_blob(&url)?
    } else {
        handle.request(&url)?
    };
    Ok(Some(resource_data_uri(&resource, &url)))
}

fn resource_data_uri(resource: &Resource, path: &str) -> String {
    let mime = resource
        .media_type
        .as_deref()
        .filter(|media_type| !media_type.is_empty())
        .unwrap_or_else(|| media_type_for_path(path));
    encode_data_uri(&resource.bytes, mime)
}

pub fn encode_data_uri(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Splits a base64 data URI back into its mime type and bytes.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    let mime = if mime.is_empty() {
        "application/octet-stream"
    } else {
        mime
    };
    Some((mime.to_owned(), bytes))
}
