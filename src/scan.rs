use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::cli::ScanArgs;
use crate::formats::ScannedFile;
use crate::source::{ByteSource, DirEntry, LocalFs};

pub const DEFAULT_MAX_FILES: usize = 500;

/// Prints one JSON line per container found.
pub async fn run(args: ScanArgs) -> anyhow::Result<()> {
    let found = scan_dir(&LocalFs, Path::new(&args.dir), args.max_files).await?;
    for file in &found {
        println!("{}", serde_json::to_string(file).context("serialize scanned file")?);
    }
    tracing::info!(dir = %args.dir, count = found.len(), "scan complete");
    Ok(())
}

/// Collects `.epub` files under `root`, depth first with each directory's
/// entries in name order, stopping as soon as `max_files` are found.
///
/// Only an unlistable `root` is an error. Unlistable subdirectories are
/// skipped with a warning.
pub async fn scan_dir(
    source: &dyn ByteSource,
    root: &Path,
    max_files: usize,
) -> anyhow::Result<Vec<ScannedFile>> {
    let mut found = Vec::new();
    if max_files == 0 {
        return Ok(found);
    }

    let root_entries = source
        .list_dir(root)
        .await
        .with_context(|| format!("list scan root: {}", root.display()))?;
    let mut stack = vec![(root.to_path_buf(), sorted(root_entries).into_iter())];

    while let Some((dir, entries)) = stack.last_mut() {
        let Some(entry) = entries.next() else {
            stack.pop();
            continue;
        };
        let path = dir.join(&entry.name);

        if entry.is_dir {
            match source.list_dir(&path).await {
                Ok(children) => stack.push((path, sorted(children).into_iter())),
                Err(err) => tracing::warn!(path = %path.display(), ?err, "skipping unreadable directory"),
            }
            continue;
        }

        if !entry.is_file || !is_epub(&entry.name) {
            continue;
        }

        found.push(scanned(source, path, entry.name).await);
        if found.len() >= max_files {
            tracing::info!(max_files, root = %root.display(), "scan cap reached");
            break;
        }
    }

    Ok(found)
}

fn sorted(mut entries: Vec<DirEntry>) -> Vec<DirEntry> {
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

fn is_epub(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".epub")
}

async fn scanned(source: &dyn ByteSource, path: PathBuf, name: String) -> ScannedFile {
    let stat = match source.stat(&path).await {
        Ok(stat) => stat,
        Err(err) => {
            tracing::warn!(path = %path.display(), ?err, "stat failed; keeping entry without timestamps");
            Default::default()
        }
    };

    ScannedFile {
        path: path.to_string_lossy().into_owned(),
        name,
        size: stat.size,
        modified: stat.modified,
        created: stat.created,
    }
}
