use crate::formats::{BatchItemResult, ContainerRecord};

const BOM: char = '\u{FEFF}';

pub const HEADERS: [&str; 9] = [
    "File name",
    "Title",
    "Identifier",
    "Author",
    "Publisher",
    "Publish date",
    "Description",
    "Chapter count",
    "File size",
];

/// Comma-separated report of the successful results, BOM first so
/// spreadsheet tools pick up UTF-8. Failures are left out.
pub fn to_delimited_text(results: &[BatchItemResult]) -> String {
    let mut lines = vec![HEADERS.join(",")];
    lines.extend(results.iter().filter_map(|result| match result {
        BatchItemResult::Success { record, .. } => Some(row(record)),
        BatchItemResult::Failure { .. } => None,
    }));

    let mut out = String::from(BOM);
    out.push_str(&lines.join("\n"));
    out
}

fn row(record: &ContainerRecord) -> String {
    let text = [
        &record.file_name,
        &record.title,
        &record.book_identifier,
        &record.author,
        &record.publisher,
        &record.publish_date,
        &record.description,
    ];

    let mut fields = text.iter().map(|field| quote(field)).collect::<Vec<_>>();
    fields.push(record.chapter_count.to_string());
    fields.push(record.file_size_bytes.to_string());
    fields.join(",")
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> ContainerRecord {
        ContainerRecord {
            file_name: "a.epub".to_owned(),
            title: title.to_owned(),
            book_identifier: String::new(),
            author: "Ann".to_owned(),
            publisher: "Pub".to_owned(),
            publish_date: "2020-01-02".to_owned(),
            description: "x, y".to_owned(),
            chapter_count: 4,
            file_size_bytes: 1234,
            cover_data_uri: Some("data:image/png;base64,AA==".to_owned()),
        }
    }

    #[test]
    fn report_has_bom_header_and_only_successes() {
        let results = vec![
            BatchItemResult::Success {
                path: "/a.epub".to_owned(),
                record: record("The \"Best\" Book"),
                toc: Vec::new(),
            },
            BatchItemResult::Failure {
                path: "/b.epub".to_owned(),
                error_message: "boom".to_owned(),
            },
        ];

        let text = to_delimited_text(&results);
        let body = text.strip_prefix('\u{FEFF}').unwrap();
        let lines = body.split('\n').collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], HEADERS.join(","));
        assert_eq!(
            lines[1],
            r#""a.epub","The ""Best"" Book","","Ann","Pub","2020-01-02","x, y",4,1234"#
        );
    }

    #[test]
    fn empty_run_is_header_only() {
        let text = to_delimited_text(&[]);
        assert_eq!(text, format!("\u{FEFF}{}", HEADERS.join(",")));
    }
}
