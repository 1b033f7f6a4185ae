//! Shared helpers for driver tests: a scripted in-memory source and item builders.

use crate::config::{CollectionConfig, Config, RetryConfig, SyncConfig};
use crate::error::{Error, Result};
use crate::source::ItemSource;
use crate::types::RawItem;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// In-memory collections with scripted failures
#[derive(Default)]
pub(crate) struct MockSource {
    collections: HashMap<String, Vec<Value>>,
    totals: HashMap<String, u64>,
    broken_counts: HashSet<String>,
    page_failures: Mutex<HashMap<u64, VecDeque<Error>>>,
    page_calls: AtomicU32,
    requested_offsets: Mutex<Vec<u64>>,
}

impl MockSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a collection with the given records
    pub(crate) fn with_collection(mut self, id: &str, items: Vec<Value>) -> Self {
        self.collections.insert(id.to_string(), items);
        self
    }

    /// Report `total` items for a collection regardless of how many it has
    pub(crate) fn with_total(mut self, id: &str, total: u64) -> Self {
        self.totals.insert(id.to_string(), total);
        self
    }

    /// Make the count query of a collection fail
    pub(crate) fn with_broken_count(mut self, id: &str) -> Self {
        self.broken_counts.insert(id.to_string());
        self
    }

    /// Fail the next page request at `offset` with `error` (queued per offset)
    pub(crate) fn fail_page(self, offset: u64, error: Error) -> Self {
        self.page_failures
            .lock()
            .unwrap()
            .entry(offset)
            .or_default()
            .push_back(error);
        self
    }

    pub(crate) fn page_calls(&self) -> u32 {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requested_offsets(&self) -> Vec<u64> {
        self.requested_offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl ItemSource for MockSource {
    async fn count(&self, collection_id: &str) -> Result<u64> {
        if self.broken_counts.contains(collection_id) {
            return Err(server_error());
        }
        if let Some(total) = self.totals.get(collection_id) {
            return Ok(*total);
        }
        Ok(self
            .collections
            .get(collection_id)
            .map_or(0, |items| items.len() as u64))
    }

    async fn page(&self, collection_id: &str, offset: u64, limit: u64) -> Result<Vec<RawItem>> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.requested_offsets.lock().unwrap().push(offset);

        if let Some(error) = self
            .page_failures
            .lock()
            .unwrap()
            .get_mut(&offset)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }

        let items = self
            .collections
            .get(collection_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(items
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .map(RawItem::new)
            .collect())
    }
}

/// A retryable transport failure
pub(crate) fn server_error() -> Error {
    Error::Http {
        status: 503,
        url: "mock://collection".into(),
    }
}

/// A permanent failure
pub(crate) fn forbidden() -> Error {
    Error::Http {
        status: 403,
        url: "mock://collection".into(),
    }
}

/// Local listener that accepts connections and closes them without answering
pub(crate) async fn dropping_listener() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    addr
}

/// Real transport error of a connection closed before any response
pub(crate) async fn dropped_connection() -> Error {
    let addr = dropping_listener().await;
    let err = reqwest::get(format!("http://{addr}/collections/1/items"))
        .await
        .unwrap_err();
    Error::Network(err)
}

/// Listing record of an answer
pub(crate) fn answer(id: u64, title: &str, updated: i64) -> Value {
    json!({
        "created": 1700000000,
        "content": {
            "type": "answer",
            "id": id,
            "url": format!("https://www.zhihu.com/question/1/answer/{id}"),
            "question": {"title": title},
            "content": format!("<p>Answer number {id}</p>"),
            "author": {"name": "Ferris"},
            "created_time": 1700000000,
            "updated_time": updated,
            "voteup_count": id,
            "comment_count": 0
        }
    })
}

/// `n` answers with distinct titles and URLs
pub(crate) fn answers(n: u64) -> Vec<Value> {
    (1..=n)
        .map(|id| answer(id, &format!("Question {id}"), 1700000000 + id as i64 * 60))
        .collect()
}

/// Config archiving collection ids into `root/<id>` with fast pacing and retries
pub(crate) fn test_config(root: &Path, ids: &[&str], page_size: u64) -> Config {
    Config {
        collections: ids
            .iter()
            .map(|id| CollectionConfig {
                url: format!("https://www.zhihu.com/collection/{id}"),
                path: Some(root.join(id)),
            })
            .collect(),
        global_image_path: Some(root.join("images")),
        sync: SyncConfig {
            page_size,
            page_delay: Duration::ZERO,
            ..SyncConfig::default()
        },
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 1.0,
            jitter: false,
        },
        ..Config::default()
    }
}

/// Sorted names of the Markdown documents in `dir`
pub(crate) fn documents(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".md"))
        .collect();
    names.sort();
    names
}
