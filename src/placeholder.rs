//! Stand-in data for containers that cannot be opened or carry no navigation.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};

use crate::formats::{ContainerRecord, TocEntry, TocEntryKind};

const TITLES: &[&str] = &[
    "A Journey Through the Digital World",
    "Programming Languages of the Future",
    "Where Technology Meets the Humanities",
    "Thinking in the Age of Data",
    "The Ethics of Artificial Intelligence",
];

const AUTHORS: &[&str] = &[
    "Alex Morgan",
    "Jordan Lee",
    "Sam Rivera",
    "Casey Chen",
    "Robin Patel",
];

const PUBLISHERS: &[&str] = &[
    "Science & Technology Press",
    "Literature Press",
    "Education Press",
    "People's Press",
    "Electronics Industry Press",
];

pub const DESCRIPTION: &str =
    "A book about technology and innovation, exploring how modern science shapes society.";

/// Random choices behind placeholder records. Swap in a seeded source for
/// reproducible output.
pub trait PlaceholderSource: Send {
    /// Uniform value in `0..upper`; `upper` is never zero.
    fn below(&mut self, upper: u64) -> u64;
}

#[derive(Debug, Clone)]
pub struct RandomPlaceholders {
    rng: StdRng,
}

impl RandomPlaceholders {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl PlaceholderSource for RandomPlaceholders {
    fn below(&mut self, upper: u64) -> u64 {
        self.rng.random_range(0..upper.max(1))
    }
}

fn pick<'a>(source: &mut dyn PlaceholderSource, pool: &[&'a str]) -> &'a str {
    let index = source.below(pool.len() as u64) as usize;
    pool.get(index).copied().unwrap_or(pool[0])
}

/// Builds a complete record around the real file name and size.
pub fn placeholder_record(
    source: &mut dyn PlaceholderSource,
    file_name: &str,
    file_size_bytes: u64,
    today: NaiveDate,
    chapter_count: u64,
) -> ContainerRecord {
    let title = pick(source, TITLES);
    let identifier = format!("ISBN{:010}", source.below(1_000_000_000));
    let author = pick(source, AUTHORS);
    let publisher = pick(source, PUBLISHERS);
    let days_back = source.below(365) as i64;
    let publish_date = (today - Duration::days(days_back))
        .format("%Y-%m-%d")
        .to_string();

    ContainerRecord {
        file_name: file_name.to_owned(),
        title: title.to_owned(),
        book_identifier: identifier,
        author: author.to_owned(),
        publisher: publisher.to_owned(),
        publish_date,
        description: DESCRIPTION.to_owned(),
        chapter_count,
        file_size_bytes,
        cover_data_uri: None,
    }
}

/// Generic book skeleton: cover, preface, three chapters, appendix, references.
pub fn placeholder_toc() -> Vec<TocEntry> {
    [
        ("Cover", TocEntryKind::Image, 0),
        ("Preface", TocEntryKind::Text, 0),
        ("Chapter 1: Getting Started", TocEntryKind::Text, 0),
        ("1.1 Preparation", TocEntryKind::Text, 1),
        ("1.2 Fundamentals", TocEntryKind::Text, 1),
        ("Chapter 2: Going Further", TocEntryKind::Text, 0),
        ("Chapter 3: In Practice", TocEntryKind::Text, 0),
        ("Appendix", TocEntryKind::Text, 0),
        ("References", TocEntryKind::Text, 0),
    ]
    .into_iter()
    .map(|(title, kind, level)| TocEntry {
        title: title.to_owned(),
        kind,
        size_bytes: 0,
        level,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a fixed sequence, wrapping each value into range.
    struct Sequence(Vec<u64>, usize);

    impl PlaceholderSource for Sequence {
        fn below(&mut self, upper: u64) -> u64 {
            let value = self.0[self.1 % self.0.len()];
            self.1 += 1;
            value % upper
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default()
    }

    #[test]
    fn placeholder_record_uses_injected_choices() {
        let mut source = Sequence(vec![1, 42, 2, 3, 10], 0);
        let record = placeholder_record(&mut source, "book.epub", 99, today(), 9);

        assert_eq!(record.file_name, "book.epub");
        assert_eq!(record.title, TITLES[1]);
        assert_eq!(record.book_identifier, "ISBN0000000042");
        assert_eq!(record.author, AUTHORS[2]);
        assert_eq!(record.publisher, PUBLISHERS[3]);
        assert_eq!(record.publish_date, "2024-05-22");
        assert_eq!(record.description, DESCRIPTION);
        assert_eq!(record.chapter_count, 9);
        assert_eq!(record.file_size_bytes, 99);
    }

    #[test]
    fn seeded_sources_repeat() {
        let a = placeholder_record(&mut RandomPlaceholders::seeded(7), "a", 0, today(), 0);
        let b = placeholder_record(&mut RandomPlaceholders::seeded(7), "a", 0, today(), 0);
        assert_eq!(a, b);
        assert_eq!(a.book_identifier.len(), 14);
        assert!(a.book_identifier.starts_with("ISBN"));
    }

    #[test]
    fn placeholder_toc_is_a_nine_entry_skeleton() {
        let toc = placeholder_toc();
        assert_eq!(toc.len(), 9);
        assert_eq!(toc[0].kind, TocEntryKind::Image);
        assert_eq!(toc.iter().filter(|e| e.level == 1).count(), 2);
    }
}
