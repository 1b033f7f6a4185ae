//! Core types for collection-archiver

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::config::CollectionConfig;
use crate::utils::sanitize_filename;

/// Kind of content a raw record carries, read from its `type` discriminant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Answer to a question
    Answer,
    /// Long-form article
    Article,
    /// Short note made of text and image blocks
    Pin,
    /// Video entry
    Zvideo,
    /// Anything else, including records without a discriminant
    Unknown,
}

impl ItemKind {
    /// Classify a discriminant string
    pub fn from_discriminant(kind: Option<&str>) -> Self {
        match kind {
            Some("answer") => ItemKind::Answer,
            Some("article") => ItemKind::Article,
            Some("pin") => ItemKind::Pin,
            Some("zvideo") => ItemKind::Zvideo,
            _ => ItemKind::Unknown,
        }
    }
}

/// One record as returned by a collection listing page
///
/// The record is kept as raw JSON; its payload lives under the `content` key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawItem(pub Value);

impl RawItem {
    /// Wrap a JSON record
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The item payload (`Value::Null` when the record has none)
    pub fn content(&self) -> &Value {
        self.0.get("content").unwrap_or(&Value::Null)
    }

    /// Kind of the payload
    pub fn kind(&self) -> ItemKind {
        ItemKind::from_discriminant(self.content().get("type").and_then(Value::as_str))
    }

    /// Internal identifier of the payload, rendered as text
    pub fn id(&self) -> Option<String> {
        match self.content().get("id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl From<Value> for RawItem {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Normalized, type-independent description of one item
///
/// `title` is always non-empty and safe to use as a filename stem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    /// Display title, also used as the document filename stem
    pub title: String,
    /// Canonical URL (`#` when unknown)
    pub url: String,
    /// Author display name
    pub author: String,
    /// Author headline, empty when absent
    pub author_badge: String,
    /// Creation time (local wall clock)
    pub created: Option<NaiveDateTime>,
    /// Last modification time (local wall clock)
    pub modified: Option<NaiveDateTime>,
    /// Upvote count
    pub upvote_num: u64,
    /// Comment count
    pub comment_num: u64,
    /// Author location, empty when absent
    pub location: String,
}

impl Default for ItemMetadata {
    fn default() -> Self {
        Self {
            title: "Untitled content".to_string(),
            url: "#".to_string(),
            author: "Unknown author".to_string(),
            author_badge: String::new(),
            created: None,
            modified: None,
            upvote_num: 0,
            comment_num: 0,
            location: String::new(),
        }
    }
}

/// Rich-text body of an item, as HTML
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemBody {
    /// HTML fragment
    pub html: String,
}

impl ItemBody {
    /// Wrap an HTML fragment
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    /// Convert the body to Markdown
    pub fn to_markdown(&self) -> String {
        html2md::rewrite_html(&self.html, false)
    }
}

/// One collection prepared for synchronization
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionTarget {
    /// Collection URL as configured
    pub url: String,
    /// Collection identifier (last path segment of the URL)
    pub id: String,
    /// Directory the collection's documents are written to
    pub dir: PathBuf,
}

impl CollectionTarget {
    /// Build a target from its configuration entry
    ///
    /// Returns `None` when the entry has no URL.
    pub fn from_config(entry: &CollectionConfig) -> Option<Self> {
        let url = entry.url.trim();
        if url.is_empty() {
            return None;
        }
        let id = collection_id(url);
        let dir = match &entry.path {
            Some(path) if !path.as_os_str().is_empty() => path.clone(),
            _ => PathBuf::from(format!("collection_{}", sanitize_filename(&id))),
        };
        Some(Self {
            url: url.to_string(),
            id,
            dir,
        })
    }
}

/// Last non-empty path segment of a collection URL
pub fn collection_id(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Pagination position within one collection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Offset of the next page to fetch
    pub offset: u64,
    /// Total number of items reported by the source
    pub total: u64,
}

impl RunState {
    /// Fresh state for a collection of `total` items
    pub fn new(total: u64) -> Self {
        Self { offset: 0, total }
    }

    /// Whether every page has been requested
    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.total
    }

    /// 1-based page number for the current offset
    pub fn page_number(&self, limit: u64) -> u64 {
        self.offset / limit.max(1) + 1
    }
}

/// Outcome of synchronizing one collection
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    /// Collection URL
    pub url: String,
    /// Archive directory
    pub dir: PathBuf,
    /// Items reported by the source
    pub total: u64,
    /// Pages fetched successfully
    pub pages: u64,
    /// Documents written
    pub saved: u64,
    /// Items already archived
    pub skipped: u64,
    /// Items that could not be archived
    pub failed: u64,
    /// Page re-fetches after network failures
    pub recoveries: u64,
    /// Why the collection was abandoned, if it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a whole run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// One report per processed collection, in configuration order
    pub reports: Vec<SourceReport>,
}

impl RunSummary {
    /// Documents written across all collections
    pub fn saved(&self) -> u64 {
        self.reports.iter().map(|r| r.saved).sum()
    }

    /// Items skipped across all collections
    pub fn skipped(&self) -> u64 {
        self.reports.iter().map(|r| r.skipped).sum()
    }

    /// Items that failed across all collections
    pub fn failed(&self) -> u64 {
        self.reports.iter().map(|r| r.failed).sum()
    }
}

/// Event emitted while a run progresses
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A collection is about to be paginated
    CollectionStarted {
        /// Collection URL
        url: String,
        /// Archive directory
        dir: PathBuf,
        /// Items reported by the source
        total: u64,
    },

    /// A listing page was fetched
    PageFetched {
        /// Collection URL
        url: String,
        /// Page offset
        offset: u64,
        /// Number of records on the page
        items: usize,
    },

    /// A document was written
    ItemSaved {
        /// Item title
        title: String,
        /// Document path
        path: PathBuf,
    },

    /// An item was already archived in the same version
    ItemSkipped {
        /// Item title
        title: String,
        /// Path of the equivalent document
        existing: PathBuf,
    },

    /// An item could not be archived
    ItemFailed {
        /// Item title
        title: String,
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },

    /// A page failed with a network error and will be fetched again
    Recovering {
        /// Collection URL
        url: String,
        /// Offset that will be re-fetched
        offset: u64,
        /// Retry attempt (1-based)
        attempt: u32,
        /// Backoff before the retry
        delay_ms: u64,
    },

    /// A collection finished
    CollectionFinished {
        /// Final report
        report: SourceReport,
    },

    /// A collection was abandoned
    CollectionFailed {
        /// Collection URL
        url: String,
        /// Error message
        error: String,
    },
}
