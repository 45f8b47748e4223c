use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike as _, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::container::{BookHandle, OpenError, PackageMetadata};
use crate::formats::{ContainerRecord, TocEntry};
use crate::placeholder::{PlaceholderSource, placeholder_record, placeholder_toc};

/// Publish dates some packagers write when the real date is unknown.
const NULL_DATES: &[&str] = &["0101-01-01T00:00:00+00:00", "0001-01-01T00:00:00Z"];

static TAG_RE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(r"<[^>]*>"));

/// Turns whatever the opener produced into a complete record and TOC.
///
/// A failed open, or an open container without navigation, gets placeholder
/// data around the real file name and size. This never fails.
pub fn normalize(
    opened: Result<&dyn BookHandle, &OpenError>,
    toc: Vec<TocEntry>,
    file_path: &str,
    file_size_bytes: u64,
    placeholders: &mut dyn PlaceholderSource,
    today: NaiveDate,
) -> (ContainerRecord, Vec<TocEntry>) {
    let file_name = file_name_from_path(file_path);

    match opened {
        Ok(handle) if handle.navigation().is_some() => {
            let record =
                record_from_metadata(handle.metadata(), file_name, toc.len(), file_size_bytes);
            (record, toc)
        }
        Ok(_) => {
            tracing::warn!(path = file_path, "container has no navigation; using placeholder data");
            placeholder_output(placeholders, file_name, file_size_bytes, today)
        }
        Err(err) => {
            tracing::warn!(path = file_path, %err, "container parse failed; using placeholder data");
            placeholder_output(placeholders, file_name, file_size_bytes, today)
        }
    }
}

fn placeholder_output(
    placeholders: &mut dyn PlaceholderSource,
    file_name: &str,
    file_size_bytes: u64,
    today: NaiveDate,
) -> (ContainerRecord, Vec<TocEntry>) {
    let toc = placeholder_toc();
    let record = placeholder_record(
        placeholders,
        file_name,
        file_size_bytes,
        today,
        toc.len() as u64,
    );
    (record, toc)
}

pub fn record_from_metadata(
    metadata: &PackageMetadata,
    file_name: &str,
    chapter_count: usize,
    file_size_bytes: u64,
) -> ContainerRecord {
    ContainerRecord {
        file_name: file_name.to_owned(),
        title: metadata.title.clone().unwrap_or_default(),
        book_identifier: normalize_identifier(metadata.identifier.as_deref().unwrap_or("")),
        author: normalize_author(metadata.creator.as_deref().unwrap_or("")),
        publisher: metadata.publisher.clone().unwrap_or_default(),
        publish_date: normalize_publish_date(metadata.date.as_deref().unwrap_or("")),
        description: clean_description(metadata.description.as_deref().unwrap_or("")),
        chapter_count: chapter_count as u64,
        file_size_bytes,
        cover_data_uri: None,
    }
}

/// Last path segment, splitting on both `/` and `\`.
pub fn file_name_from_path(path: &str) -> &str {
    path.rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(path)
}

/// `urn:uuid:` identifiers carry no catalog meaning and are dropped.
pub fn normalize_identifier(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("urn:uuid:") {
        return String::new();
    }
    raw.to_owned()
}

pub fn normalize_author(raw: &str) -> String {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("unknown") {
        return String::new();
    }
    raw.to_owned()
}

/// `YYYY-MM-DD` for anything parseable, empty for null sentinels and junk.
pub fn normalize_publish_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || NULL_DATES.contains(&raw) {
        return String::new();
    }

    match parse_date(raw) {
        Some(date) if (0..=9999).contains(&date.year()) => date.format("%Y-%m-%d").to_string(),
        _ => {
            tracing::debug!(date = raw, "unparseable publish date dropped");
            String::new()
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    // Partial dates: `2020-05` and `2020` pin to the first day.
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d") {
        return Some(date);
    }
    if raw.len() == 4 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::from_ymd_opt(raw.parse().ok()?, 1, 1);
    }
    None
}

/// Strips markup tags and collapses whitespace runs.
pub fn clean_description(raw: &str) -> String {
    let without_tags = match TAG_RE.as_ref() {
        Ok(re) => re.replace_all(raw, ""),
        Err(_) => Cow::Borrowed(raw),
    };
    without_tags.split_whitespace().collect::<Vec<_>>().join(" ")
}
