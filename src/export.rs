use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;

use crate::archive;
use crate::cli::ArchiveArgs;
use crate::cover::decode_data_uri;
use crate::formats::{ArchiveEntry, BatchItemResult};
use crate::report::to_delimited_text;

pub const REPORT_ENTRY: &str = "report.csv";
pub const RESULTS_ENTRY: &str = "results.json";

/// Packs files under their own names with the store-only encoder.
pub fn run_archive(args: ArchiveArgs) -> anyhow::Result<()> {
    let mut entries = Vec::with_capacity(args.files.len());
    for file in &args.files {
        let path = Path::new(file);
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("not a file path: {file}"))?;
        let bytes = std::fs::read(path).with_context(|| format!("read input: {file}"))?;
        entries.push(ArchiveEntry::new(name, bytes));
    }
    write_archive(Path::new(&args.out), &entries, args.force)
}

pub fn write_report(path: &Path, results: &[BatchItemResult], force: bool) -> anyhow::Result<()> {
    write_output(path, to_delimited_text(results).as_bytes(), force)?;
    tracing::info!(out = %path.display(), "wrote report");
    Ok(())
}

pub fn write_results_json(
    path: &Path,
    results: &[BatchItemResult],
    force: bool,
) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(results).context("serialize results")?;
    write_output(path, &json, force)?;
    tracing::info!(out = %path.display(), "wrote results json");
    Ok(())
}

pub fn write_archive(path: &Path, entries: &[ArchiveEntry], force: bool) -> anyhow::Result<()> {
    let bytes = archive::encode(entries).context("encode archive")?;
    write_output(path, &bytes, force)?;
    tracing::info!(
        out = %path.display(),
        entries = entries.len(),
        bytes = bytes.len(),
        "wrote archive"
    );
    Ok(())
}

/// Report, results and extracted covers packed into one archive.
pub fn write_bundle(path: &Path, results: &[BatchItemResult], force: bool) -> anyhow::Result<()> {
    let entries = bundle_entries(results)?;
    write_archive(path, &entries, force)
}

pub fn bundle_entries(results: &[BatchItemResult]) -> anyhow::Result<Vec<ArchiveEntry>> {
    let mut entries = vec![
        ArchiveEntry::new(REPORT_ENTRY, to_delimited_text(results)),
        ArchiveEntry::new(
            RESULTS_ENTRY,
            serde_json::to_vec_pretty(results).context("serialize results")?,
        ),
    ];

    let mut used = HashSet::new();
    for result in results {
        let BatchItemResult::Success { path, record, .. } = result else {
            continue;
        };
        let Some(uri) = record.cover_data_uri.as_deref() else {
            continue;
        };
        let Some((mime, bytes)) = decode_data_uri(uri) else {
            tracing::warn!(path = %path, "cover data uri is not decodable; leaving it out");
            continue;
        };

        let stem = Path::new(&record.file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| "cover".to_owned());
        let ext = extension_for_mime(&mime);

        let mut name = format!("covers/{stem}.{ext}");
        let mut n = 2;
        while !used.insert(name.clone()) {
            name = format!("covers/{stem}-{n}.{ext}");
            n += 1;
        }
        entries.push(ArchiveEntry::new(name, bytes));
    }

    Ok(entries)
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/bmp" => "bmp",
        _ => "bin",
    }
}

/// Whole-file write. Refuses to replace an existing file unless `force`.
fn write_output(path: &Path, contents: &[u8], force: bool) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }

    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("open output: {}", path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("write output: {}", path.display()))?;
    file.flush()
        .with_context(|| format!("flush output: {}", path.display()))?;
    Ok(())
}
