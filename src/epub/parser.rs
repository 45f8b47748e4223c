//! XML documents inside an EPUB: `container.xml`, the OPF package, the EPUB 3
//! nav document and the EPUB 2 NCX.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::container::{NavItem, OpenError, PackageMetadata};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OpfData {
    pub metadata: PackageMetadata,
    pub manifest: Vec<RawManifestItem>,
    /// `toc` attribute of `<spine>`, naming the NCX manifest item.
    pub spine_toc: Option<String>,
}

pub fn parse_container_xml(content: &str) -> Result<String, OpenError> {
    let mut reader = Reader::from_str(content);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(path) = attr(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(malformed("container.xml", err)),
            _ => {}
        }
    }

    Err(OpenError::Missing("rootfile in container.xml".to_owned()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MetaField {
    Title,
    Creator,
    Publisher,
    Date,
    Identifier,
    Description,
    Property(String),
}

impl MetaField {
    fn from_local(local: &[u8]) -> Option<Self> {
        Some(match local {
            b"title" => Self::Title,
            b"creator" => Self::Creator,
            b"publisher" => Self::Publisher,
            b"date" => Self::Date,
            b"identifier" => Self::Identifier,
            b"description" => Self::Description,
            _ => return None,
        })
    }
}

pub fn parse_opf(content: &str) -> Result<OpfData, OpenError> {
    let mut reader = Reader::from_str(content);

    let mut data = OpfData::default();
    let mut in_metadata = false;
    let mut current: Option<MetaField> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    b"metadata" => in_metadata = true,
                    b"meta" if in_metadata => {
                        if let Some((name, content)) = meta_pair(&e) {
                            data.metadata.meta.entry(name).or_insert(content);
                        } else if let Some(property) = attr(&e, b"property") {
                            current = Some(MetaField::Property(property));
                            text.clear();
                        }
                    }
                    b"spine" => data.spine_toc = attr(&e, b"toc"),
                    b"item" => data.manifest.extend(manifest_item(&e)),
                    _ if in_metadata => {
                        if let Some(field) = MetaField::from_local(local) {
                            current = Some(field);
                            text.clear();
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"item" => data.manifest.extend(manifest_item(&e)),
                    b"meta" if in_metadata => {
                        if let Some((name, content)) = meta_pair(&e) {
                            data.metadata.meta.entry(name).or_insert(content);
                        }
                    }
                    b"spine" => data.spine_toc = attr(&e, b"toc"),
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::CData(e)) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current.is_some()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    text.push_str(&resolved);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"metadata" {
                    in_metadata = false;
                }
                if let Some(field) = current.take() {
                    store_field(&mut data.metadata, field, text.trim());
                    text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(malformed("package document", err)),
            _ => {}
        }
    }

    Ok(data)
}

/// Only the first occurrence of each field counts.
fn store_field(metadata: &mut PackageMetadata, field: MetaField, value: &str) {
    if value.is_empty() {
        return;
    }
    let slot = match field {
        MetaField::Title => &mut metadata.title,
        MetaField::Creator => &mut metadata.creator,
        MetaField::Publisher => &mut metadata.publisher,
        MetaField::Date => &mut metadata.date,
        MetaField::Identifier => &mut metadata.identifier,
        MetaField::Description => &mut metadata.description,
        MetaField::Property(name) => {
            metadata.meta.entry(name).or_insert_with(|| value.to_owned());
            return;
        }
    };
    if slot.is_none() {
        *slot = Some(value.to_owned());
    }
}

/// Items without an id can't be referenced and are skipped.
fn manifest_item(e: &BytesStart<'_>) -> Option<RawManifestItem> {
    let id = attr(e, b"id").filter(|id| !id.is_empty())?;
    Some(RawManifestItem {
        id,
        href: attr(e, b"href").unwrap_or_default(),
        media_type: attr(e, b"media-type").unwrap_or_default(),
        properties: attr(e, b"properties")
            .map(|p| p.split_ascii_whitespace().map(str::to_owned).collect())
            .unwrap_or_default(),
    })
}

fn meta_pair(e: &BytesStart<'_>) -> Option<(String, String)> {
    let name = attr(e, b"name")?;
    let content = attr(e, b"content")?;
    Some((name, content))
}

#[derive(Default)]
struct PendingItem {
    label: String,
    href: Option<String>,
    children: Vec<NavItem>,
}

impl PendingItem {
    fn finish(self) -> NavItem {
        let label = self.label.split_whitespace().collect::<Vec<_>>().join(" ");
        NavItem {
            label: (!label.is_empty()).then_some(label),
            href: self.href,
            kind: None,
            size: None,
            subitems: self.children,
        }
    }
}

/// Parses the `<nav epub:type="toc">` element of an EPUB 3 nav document.
///
/// Returns `Ok(None)` when the document has no toc nav.
pub fn parse_nav_document(content: &str) -> Result<Option<Vec<NavItem>>, OpenError> {
    let mut reader = Reader::from_str(content);

    let mut nav_depth = 0usize;
    let mut found = false;
    let mut label_depth = 0usize;
    let mut stack: Vec<PendingItem> = vec![PendingItem::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"nav" {
                    if nav_depth > 0 {
                        nav_depth += 1;
                    } else if is_toc_nav(&e) {
                        nav_depth = 1;
                        found = true;
                    }
                    continue;
                }
                if nav_depth == 0 {
                    continue;
                }
                match local {
                    b"li" => stack.push(PendingItem::default()),
                    b"a" | b"span" if stack.len() > 1 => {
                        label_depth += 1;
                        if local == b"a"
                            && let Some(top) = stack.last_mut()
                            && top.href.is_none()
                        {
                            top.href = attr(&e, b"href");
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if nav_depth == 0 {
                    continue;
                }
                match local {
                    b"nav" => {
                        nav_depth -= 1;
                        if nav_depth == 0 {
                            break;
                        }
                    }
                    b"li" if stack.len() > 1 => {
                        if let Some(done) = stack.pop()
                            && let Some(parent) = stack.last_mut()
                        {
                            parent.children.push(done.finish());
                        }
                    }
                    b"a" | b"span" => label_depth = label_depth.saturating_sub(1),
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if label_depth > 0
                    && let Some(top) = stack.last_mut()
                {
                    top.label.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if label_depth > 0
                    && let Some(top) = stack.last_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    top.label.push_str(&resolved);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(malformed("nav document", err)),
            _ => {}
        }
    }

    if !found {
        return Ok(None);
    }
    // Unclosed <li> elements still count.
    while stack.len() > 1 {
        if let Some(done) = stack.pop()
            && let Some(parent) = stack.last_mut()
        {
            parent.children.push(done.finish());
        }
    }
    Ok(stack.pop().map(|root| root.children))
}

fn is_toc_nav(e: &BytesStart<'_>) -> bool {
    e.attributes().flatten().any(|a| {
        local_name(a.key.as_ref()) == b"type"
            && String::from_utf8_lossy(&a.value)
                .split_ascii_whitespace()
                .any(|t| t == "toc")
    })
}

/// Parses the `<navMap>` of an EPUB 2 NCX document.
pub fn parse_ncx(content: &str) -> Result<Vec<NavItem>, OpenError> {
    let mut reader = Reader::from_str(content);

    let mut stack: Vec<PendingItem> = vec![PendingItem::default()];
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"navPoint" => stack.push(PendingItem::default()),
                    b"text" if stack.len() > 1 => in_text = true,
                    b"content" => set_ncx_src(&mut stack, &e),
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"content" {
                    set_ncx_src(&mut stack, &e);
                }
            }
            Ok(Event::Text(e)) => {
                if in_text && let Some(top) = stack.last_mut() {
                    top.label.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text
                    && let Some(top) = stack.last_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    top.label.push_str(&resolved);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"text" => in_text = false,
                    b"navPoint" if stack.len() > 1 => {
                        if let Some(done) = stack.pop()
                            && let Some(parent) = stack.last_mut()
                        {
                            parent.children.push(done.finish());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(malformed("ncx document", err)),
            _ => {}
        }
    }

    Ok(stack.into_iter().next().map(|root| root.children).unwrap_or_default())
}

fn set_ncx_src(stack: &mut [PendingItem], e: &BytesStart<'_>) {
    if stack.len() > 1
        && let Some(top) = stack.last_mut()
        && top.href.is_none()
    {
        top.href = attr(e, b"src");
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Attribute value by local name, entity-unescaped.
fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key || local_name(a.key.as_ref()) == key)
        .map(|a| {
            let raw = String::from_utf8_lossy(&a.value).into_owned();
            match quick_xml::escape::unescape(&raw) {
                Ok(unescaped) => unescaped.into_owned(),
                Err(_) => raw,
            }
        })
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_owned()),
        "quot" => return Some("\"".to_owned()),
        "lt" => return Some("<".to_owned()),
        "gt" => return Some(">".to_owned()),
        "amp" => return Some("&".to_owned()),
        "nbsp" => return Some("\u{a0}".to_owned()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse::<u32>().ok()?
    };
    char::from_u32(code).map(|c| c.to_string())
}

fn malformed(document: &str, err: impl std::fmt::Display) -> OpenError {
    OpenError::Malformed {
        document: document.to_owned(),
        reason: err.to_string(),
    }
}
