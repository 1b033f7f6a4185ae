//! Document header block (YAML front matter)
//!
//! Every archived document starts with a block delimited by `---` lines that
//! carries its [`ItemMetadata`]. The block is the only structured part of a
//! document; it is what the [`resolver`](crate::resolver) reads back to decide
//! whether an item is already archived.
//!
//! ```text
//! ---
//! title: Some question
//! url: https://www.zhihu.com/question/1/answer/2
//! author: someone
//! created: 2024-01-01 12:00
//! modified: 2024-01-02 08:30
//! upvote_num: 10
//! comment_num: 2
//! ---
//! body...
//! ```

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::error::Result;
use crate::types::ItemMetadata;

/// Delimiter line of the header block
pub const DELIMITER: &str = "---";

/// Timestamp format written to headers (minute resolution)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Second-resolution format written by older archives, still accepted when reading
pub const LEGACY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Written in place of an absent timestamp
pub const MISSING_TIMESTAMP: &str = "N/A";

/// Field order of the block is the field order of this struct
#[derive(Serialize)]
struct FrontMatter {
    title: String,
    url: String,
    author: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    author_badge: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    location: String,
    created: String,
    modified: String,
    upvote_num: u64,
    comment_num: u64,
}

/// A document split into its header block and body
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Document<'a> {
    /// Complete header block including both delimiter lines
    pub header: Option<&'a str>,
    /// Text between the delimiter lines
    pub front_matter: Option<&'a str>,
    /// Everything after the header block (the whole text when there is none)
    pub body: &'a str,
}

/// Split a document into header block and body
///
/// A header exists only when the first line is a delimiter and a closing
/// delimiter line follows. Delimiters start at the first column; an indented
/// `---` belongs to a block scalar inside the header.
pub fn split_document(text: &str) -> Document<'_> {
    let no_header = Document {
        header: None,
        front_matter: None,
        body: text,
    };

    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return no_header;
    };
    if first.trim_end() != DELIMITER {
        return no_header;
    }

    let inner_start = first.len();
    let mut pos = inner_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            let end = pos + line.len();
            return Document {
                header: Some(&text[..end]),
                front_matter: Some(&text[inner_start..pos]),
                body: &text[end..],
            };
        }
        pos += line.len();
    }
    no_header
}

/// Render metadata as a header block, terminated by a newline
pub fn encode(metadata: &ItemMetadata) -> Result<String> {
    let front_matter = FrontMatter {
        title: metadata.title.clone(),
        url: metadata.url.clone(),
        author: metadata.author.clone(),
        author_badge: metadata.author_badge.clone(),
        location: metadata.location.clone(),
        created: format_timestamp(metadata.created),
        modified: format_timestamp(metadata.modified),
        upvote_num: metadata.upvote_num,
        comment_num: metadata.comment_num,
    };

    let yaml = serde_yaml::to_string(&front_matter)?;
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n"))
}

/// Read the metadata of a document
///
/// Returns `None` when the document has no header block or the block is not a
/// YAML mapping. Unparsable timestamps are logged and read as absent.
pub fn decode(text: &str) -> Option<ItemMetadata> {
    let front_matter = split_document(text).front_matter?;

    let value: Value = match serde_yaml::from_str(front_matter) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Header block is not valid YAML");
            return None;
        }
    };
    let Value::Mapping(map) = value else {
        return None;
    };

    let defaults = ItemMetadata::default();
    Some(ItemMetadata {
        title: get_string(&map, "title").unwrap_or(defaults.title),
        url: get_string(&map, "url").unwrap_or_default(),
        author: get_string(&map, "author").unwrap_or(defaults.author),
        author_badge: get_string(&map, "author_badge").unwrap_or_default(),
        created: get_timestamp(&map, "created"),
        modified: get_timestamp(&map, "modified"),
        upvote_num: get_count(&map, "upvote_num"),
        comment_num: get_count(&map, "comment_num"),
        location: get_string(&map, "location").unwrap_or_default(),
    })
}

/// Truncate a timestamp to the minute
pub fn truncate_to_minute(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp)
}

/// Parse a header timestamp in the current or legacy format
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, LEGACY_TIMESTAMP_FORMAT))
        .ok()
}

fn format_timestamp(timestamp: Option<NaiveDateTime>) -> String {
    timestamp
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| MISSING_TIMESTAMP.to_string())
}

fn get_string(map: &Mapping, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn get_count(map: &Mapping, key: &str) -> u64 {
    match map.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn get_timestamp(map: &Mapping, key: &str) -> Option<NaiveDateTime> {
    let text = get_string(map, key)?;
    let text = text.trim();
    if text.is_empty() || text == MISSING_TIMESTAMP {
        return None;
    }
    let parsed = parse_timestamp(text);
    if parsed.is_none() {
        warn!(field = key, value = text, "Unparsable timestamp in header, treating as absent");
    }
    parsed
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn full_metadata() -> ItemMetadata {
        ItemMetadata {
            title: "How do compilers work".into(),
            url: "https://www.zhihu.com/question/1/answer/2".into(),
            author: "Ferris".into(),
            author_badge: "Systems: programmer # crab".into(),
            created: Some(at(2023, 5, 1, 9, 15, 42)),
            modified: Some(at(2024, 1, 2, 8, 30, 5)),
            upvote_num: 1024,
            comment_num: 12,
            location: "IP: Berlin".into(),
        }
    }

    #[test]
    fn test_round_trip_truncates_to_minute() {
        let original = full_metadata();
        let decoded = decode(&encode(&original).unwrap()).unwrap();

        let expected = ItemMetadata {
            created: original.created.map(truncate_to_minute),
            modified: original.modified.map(truncate_to_minute),
            ..original
        };
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_encode_field_order_and_sentinels() {
        let metadata = ItemMetadata {
            title: "T".into(),
            url: "https://example.com/p/1".into(),
            author: "A".into(),
            ..ItemMetadata::default()
        };
        let header = encode(&metadata).unwrap();

        assert!(header.starts_with("---\n"));
        assert!(header.ends_with("---\n"));
        assert!(!header.contains("author_badge"));
        assert!(!header.contains("location"));

        let keys: Vec<&str> = header
            .lines()
            .filter_map(|l| l.split_once(':').map(|(k, _)| k))
            .filter(|k| !k.starts_with(' '))
            .collect();
        assert_eq!(
            keys,
            vec!["title", "url", "author", "created", "modified", "upvote_num", "comment_num"]
        );
        assert!(header.contains("created: N/A"));
        assert!(header.contains("modified: N/A"));

        let decoded = decode(&header).unwrap();
        assert_eq!(decoded.created, None);
        assert_eq!(decoded.modified, None);
    }

    #[test]
    fn test_numeric_looking_title_survives() {
        let metadata = ItemMetadata {
            title: "2024".into(),
            ..full_metadata()
        };
        assert_eq!(decode(&encode(&metadata).unwrap()).unwrap().title, "2024");
    }

    #[test]
    fn test_legacy_second_resolution_is_accepted() {
        let doc = "---\nurl: https://a\ncreated: 2020-02-03 04:05:06\nmodified: 2020-02-03 04:05\n---\nbody";
        let decoded = decode(doc).unwrap();
        assert_eq!(decoded.created, Some(at(2020, 2, 3, 4, 5, 6)));
        assert_eq!(decoded.modified, Some(at(2020, 2, 3, 4, 5, 0)));
    }

    #[test]
    fn test_unparsable_timestamp_is_absent_not_fatal() {
        let doc = "---\nurl: https://a\nmodified: yesterday-ish\n---\n";
        let decoded = decode(doc).unwrap();
        assert_eq!(decoded.url, "https://a");
        assert_eq!(decoded.modified, None);
    }

    #[test]
    fn test_decode_rejects_documents_without_header() {
        assert!(decode("").is_none());
        assert!(decode("# Just markdown\n---\n").is_none());
        assert!(decode("---\ntitle: unterminated\n").is_none());
        assert!(decode("---\n- a\n- b\n---\n").is_none());
        assert!(decode("---\ntitle: [unclosed\n---\n").is_none());
    }

    #[test]
    fn test_split_document_keeps_body_intact() {
        let text = "---\ntitle: x\n---\nline one\n---\nline two\n";
        let doc = split_document(text);
        assert_eq!(doc.header, Some("---\ntitle: x\n---\n"));
        assert_eq!(doc.front_matter, Some("title: x\n"));
        assert_eq!(doc.body, "line one\n---\nline two\n");

        let plain = split_document("no header here");
        assert_eq!(plain.header, None);
        assert_eq!(plain.body, "no header here");
    }

    #[test]
    fn test_delimiter_line_inside_a_field_stays_in_the_header() {
        let metadata = ItemMetadata {
            author_badge: "first line\n---\nlast line".into(),
            ..full_metadata()
        };
        let encoded = encode(&metadata).unwrap();
        let decoded = decode(&format!("{encoded}body\n")).unwrap();

        assert_eq!(decoded.author_badge, metadata.author_badge);
        assert_eq!(decoded.url, metadata.url);
        assert_eq!(decoded.comment_num, 12);
        assert_eq!(split_document(&format!("{encoded}body\n")).body, "body\n");
    }

    #[test]
    fn test_indented_delimiter_does_not_close_header() {
        let text = "---\nauthor_badge: |-\n  a\n  ---\n  b\nurl: https://a\n---\nbody";
        let doc = split_document(text);
        assert_eq!(doc.body, "body");

        let decoded = decode(text).unwrap();
        assert_eq!(decoded.author_badge, "a\n---\nb");
        assert_eq!(decoded.url, "https://a");
    }

    #[test]
    fn test_missing_url_decodes_as_empty() {
        let decoded = decode("---\ntitle: only a title\n---\n").unwrap();
        assert_eq!(decoded.url, "");
        assert_eq!(decoded.upvote_num, 0);
    }
}
