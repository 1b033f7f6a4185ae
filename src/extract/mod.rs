//! Item classification and extraction.
//!
//! Turns one raw listing record into [`ItemMetadata`] and an [`ItemBody`]. The
//! `type` discriminant selects how the title and body are found:
//!
//! - `answer` / `article`: nested question title or article title, HTML body verbatim
//! - `pin`: excerpt (or the start of the first text block) behind a note marker,
//!   body assembled from text and image blocks
//! - `zvideo`: raw title, synthesized summary body
//! - anything else: an ordered list of title strategies, body from whatever
//!   content shape is present
//!
//! Extraction never fails. A record that cannot be decoded still yields a
//! document, with a placeholder title and an explanatory body.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Deserialize;
use serde_json::Number;
use tracing::warn;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::types::{ItemBody, ItemKind, ItemMetadata, RawItem};
use crate::utils::{sanitize_filename, truncate_chars};

/// Marker prepended to note titles
pub const NOTE_TITLE_PREFIX: &str = "Note：";

/// Characters of the first text block used when a note has no excerpt
const NOTE_TITLE_CHARS: usize = 30;

const ERROR_BODY: &str = "<p>Error: the content of this item could not be parsed.</p>";
const UNSUPPORTED_BODY: &str = "<p>Unsupported content type or structure.</p>";
const UNSUPPORTED_LIST_BODY: &str = "<p>Unsupported list content.</p>";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Record {
    #[serde(rename = "type")]
    kind: Option<String>,
    url: Option<String>,
    title: Option<String>,
    excerpt_title: Option<String>,
    question: Option<Question>,
    content: Option<Content>,
    author: Option<Author>,
    created_time: Option<Number>,
    created: Option<Number>,
    updated_time: Option<Number>,
    updated: Option<Number>,
    voteup_count: Option<u64>,
    comment_count: Option<u64>,
    video: Option<Video>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Question {
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Author {
    name: Option<String>,
    headline: Option<String>,
    ip_info: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Video {
    thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Content {
    Html(String),
    Blocks(Vec<Block>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Block {
    #[serde(rename = "type")]
    kind: Option<String>,
    content: Option<String>,
    url: Option<String>,
    title: Option<String>,
}

type TitleStrategy = fn(&Record) -> Option<String>;

/// Title lookups for records of unknown type, tried in order
const UNKNOWN_TITLE_STRATEGIES: &[TitleStrategy] =
    &[question_title, flat_title, first_block_title];

fn non_empty(s: Option<&String>) -> Option<String> {
    s.filter(|s| !s.is_empty()).cloned()
}

fn question_title(record: &Record) -> Option<String> {
    non_empty(record.question.as_ref()?.title.as_ref())
}

fn flat_title(record: &Record) -> Option<String> {
    non_empty(record.title.as_ref())
}

fn first_block_title(record: &Record) -> Option<String> {
    match &record.content {
        Some(Content::Blocks(blocks)) => non_empty(blocks.first()?.title.as_ref())
            .map(|title| format!("{NOTE_TITLE_PREFIX}{title}")),
        _ => None,
    }
}

/// Convert source epoch seconds to local wall-clock time (`0` means absent)
pub fn epoch_to_local(secs: i64) -> Option<NaiveDateTime> {
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0).map(|utc| utc.with_timezone(&Local).naive_local())
}

fn epoch(n: Option<&Number>) -> Option<i64> {
    let n = n?;
    n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))
}

/// Turns raw records into metadata and body
#[derive(Clone, Debug)]
pub struct Extractor {
    site_base: String,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(&SyncConfig::default().site_base)
    }
}

impl Extractor {
    /// Extractor synthesizing canonical links under `site_base`
    pub fn new(site_base: &str) -> Self {
        Self {
            site_base: site_base.trim_end_matches('/').to_string(),
        }
    }

    /// Extract one record; `ordinal` is its 1-based position in the collection
    pub fn extract(&self, raw: &RawItem, ordinal: u64) -> (ItemMetadata, ItemBody) {
        let (mut metadata, body) = match self.try_extract(raw) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, ordinal, "Failed to parse item, writing placeholder");
                placeholder(raw)
            }
        };

        metadata.title = sanitize_filename(&metadata.title);
        if metadata.title.is_empty() {
            metadata.title = format!("Untitled item_{ordinal}");
        }
        (metadata, body)
    }

    fn try_extract(&self, raw: &RawItem) -> Result<(ItemMetadata, ItemBody)> {
        let id = raw.id();
        let record: Record = if raw.content().is_null() {
            Record::default()
        } else {
            serde_json::from_value(raw.content().clone()).map_err(|e| Error::ItemExtract {
                id: id.clone().unwrap_or_else(|| "unknown".to_string()),
                reason: e.to_string(),
            })?
        };

        let mut metadata = common_metadata(&record);
        let kind = ItemKind::from_discriminant(record.kind.as_deref());

        let body = match kind {
            ItemKind::Answer => {
                metadata.title = question_title(&record)
                    .unwrap_or_else(|| "Answer without question title".to_string());
                ItemBody::new(content_html(&record))
            }
            ItemKind::Article => {
                metadata.title =
                    flat_title(&record).unwrap_or_else(|| "Article without title".to_string());
                ItemBody::new(content_html(&record))
            }
            ItemKind::Pin => {
                metadata.title = note_title(&record);
                self.fill_missing_url(&mut metadata, "pin", id.as_deref());
                ItemBody::new(note_html(&record))
            }
            ItemKind::Zvideo => {
                metadata.title =
                    flat_title(&record).unwrap_or_else(|| "Video without title".to_string());
                self.fill_missing_url(&mut metadata, "zvideo", id.as_deref());
                ItemBody::new(video_html(&record, &metadata))
            }
            ItemKind::Unknown => {
                metadata.title = UNKNOWN_TITLE_STRATEGIES
                    .iter()
                    .find_map(|strategy| strategy(&record))
                    .unwrap_or_else(|| {
                        format!("Unknown type_{}", id.as_deref().unwrap_or("no-id"))
                    });
                ItemBody::new(unknown_html(&record))
            }
        };

        Ok((metadata, body))
    }

    fn fill_missing_url(&self, metadata: &mut ItemMetadata, section: &str, id: Option<&str>) {
        if let Some(id) = id
            && (metadata.url.is_empty() || metadata.url == "#")
        {
            metadata.url = format!("{}/{}/{}", self.site_base, section, id);
        }
    }
}

fn placeholder(raw: &RawItem) -> (ItemMetadata, ItemBody) {
    let id = raw.id().unwrap_or_else(|| Local::now().timestamp_micros().to_string());
    let url = raw
        .content()
        .get("url")
        .and_then(|u| u.as_str())
        .filter(|u| !u.is_empty())
        .unwrap_or("#")
        .to_string();
    let metadata = ItemMetadata {
        title: format!("Parse error_{id}"),
        url,
        ..ItemMetadata::default()
    };
    (metadata, ItemBody::new(ERROR_BODY))
}

fn common_metadata(record: &Record) -> ItemMetadata {
    let defaults = ItemMetadata::default();
    let author = record.author.as_ref();

    let created = epoch(record.created_time.as_ref())
        .or_else(|| epoch(record.created.as_ref()))
        .unwrap_or(0);
    let modified = epoch(record.updated_time.as_ref())
        .or_else(|| epoch(record.updated.as_ref()))
        .unwrap_or(created);

    ItemMetadata {
        title: defaults.title,
        url: non_empty(record.url.as_ref()).unwrap_or(defaults.url),
        author: author
            .and_then(|a| non_empty(a.name.as_ref()))
            .unwrap_or(defaults.author),
        author_badge: author.and_then(|a| a.headline.clone()).unwrap_or_default(),
        created: epoch_to_local(created),
        modified: epoch_to_local(modified),
        upvote_num: record.voteup_count.unwrap_or(0),
        comment_num: record.comment_count.unwrap_or(0),
        location: author.and_then(|a| a.ip_info.clone()).unwrap_or_default(),
    }
}

fn content_html(record: &Record) -> String {
    match &record.content {
        Some(Content::Html(html)) => html.clone(),
        Some(Content::Blocks(blocks)) => blocks
            .iter()
            .filter_map(|b| b.content.as_deref())
            .collect::<Vec<_>>()
            .join(""),
        None => String::new(),
    }
}

fn note_title(record: &Record) -> String {
    let base = non_empty(record.excerpt_title.as_ref()).or_else(|| match &record.content {
        Some(Content::Blocks(blocks)) => blocks
            .first()
            .filter(|b| b.kind.as_deref() == Some("text"))
            .and_then(|b| b.content.as_deref())
            .map(|text| truncate_chars(text, NOTE_TITLE_CHARS).to_string()),
        _ => None,
    });
    let base = base
        .map(|b| sanitize_filename(&b))
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| "Untitled note".to_string());
    format!("{NOTE_TITLE_PREFIX}{base}")
}

fn note_html(record: &Record) -> String {
    match &record.content {
        Some(Content::Blocks(blocks)) => blocks
            .iter()
            .filter_map(|block| match block.kind.as_deref() {
                Some("text") => Some(format!("<p>{}</p>", block.content.as_deref().unwrap_or(""))),
                Some("image") => Some(format!(
                    r#"<img src="{}" alt="Note image">"#,
                    block.url.as_deref().unwrap_or("#")
                )),
                _ => None,
            })
            .collect(),
        Some(Content::Html(html)) => format!("<p>{html}</p>"),
        None => String::new(),
    }
}

fn video_html(record: &Record, metadata: &ItemMetadata) -> String {
    let title = record.title.as_deref().unwrap_or("");
    let thumbnail = record
        .video
        .as_ref()
        .and_then(|v| v.thumbnail.as_deref())
        .unwrap_or("");
    format!(
        "<p><strong>Video: {title}</strong></p>\
         <p><a href='{url}'>Watch online</a></p>\
         <p>Author: {author}</p>\
         <p><img src='{thumbnail}' alt='Video cover'></p>",
        url = metadata.url,
        author = metadata.author,
    )
}

fn unknown_html(record: &Record) -> String {
    match &record.content {
        Some(Content::Blocks(blocks)) => match blocks.first() {
            Some(first) => first
                .content
                .clone()
                .unwrap_or_else(|| UNSUPPORTED_LIST_BODY.to_string()),
            None => UNSUPPORTED_BODY.to_string(),
        },
        Some(Content::Html(html)) => html.clone(),
        None => UNSUPPORTED_BODY.to_string(),
    }
}
