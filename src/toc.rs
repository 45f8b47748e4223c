use crate::cli::TocArgs;
use crate::container::NavItem;
use crate::formats::{TocEntry, TocEntryKind};
use crate::session::BookSession;

pub const UNTITLED_CHAPTER: &str = "Untitled chapter";

/// Flattens a navigation tree into pre-order entries, parents before children.
///
/// An absent or empty tree yields no entries; substituting placeholder
/// contents is the normalizer's job.
pub fn extract(navigation: Option<&[NavItem]>) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    if let Some(items) = navigation {
        walk(items, 0, &mut entries);
    }
    entries
}

/// Prints the flattened TOC of one container, indented by level.
pub async fn run(args: TocArgs) -> anyhow::Result<()> {
    let mut session = BookSession::local();
    session.open(&args.path).await?;
    let entries = session.toc()?;
    session.close();

    if entries.is_empty() {
        tracing::warn!(path = %args.path, "container has no navigation entries");
    }
    for entry in &entries {
        let indent = "  ".repeat(entry.level as usize);
        match entry.kind {
            TocEntryKind::Text => println!("{indent}{}", entry.title),
            kind => println!("{indent}{} [{}]", entry.title, kind.as_str()),
        }
    }
    Ok(())
}

fn walk(items: &[NavItem], level: u32, out: &mut Vec<TocEntry>) {
    for item in items {
        let title = item
            .label
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .unwrap_or(UNTITLED_CHAPTER);

        out.push(TocEntry {
            title: title.to_owned(),
            kind: item
                .kind
                .as_deref()
                .map(TocEntryKind::from_hint)
                .unwrap_or_default(),
            size_bytes: item.size.unwrap_or(0),
            level,
        });

        if !item.subitems.is_empty() {
            walk(&item.subitems, level + 1, out);
        }
    }
}
