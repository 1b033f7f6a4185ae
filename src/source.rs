//! Remote collection sources
//!
//! The sync driver talks to a collection through the [`ItemSource`] trait: one
//! call for the total item count, one for a page of raw records. The
//! [`HttpItemSource`] implementation speaks the collection listing API:
//!
//! ```text
//! GET {api_base}/collections/{id}/items?offset={offset}&limit={limit}
//! { "paging": { "totals": 42, ... }, "data": [ { "content": { ... } }, ... ] }
//! ```

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{AuthConfig, SyncConfig};
use crate::error::{Error, Result};
use crate::types::RawItem;

/// A paginated remote collection
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Total number of items in the collection
    async fn count(&self, collection_id: &str) -> Result<u64>;

    /// Up to `limit` raw records starting at `offset`
    ///
    /// An empty page means the collection has no more items.
    async fn page(&self, collection_id: &str, offset: u64, limit: u64) -> Result<Vec<RawItem>>;
}

#[derive(Debug, Default, Deserialize)]
struct Listing {
    #[serde(default)]
    paging: Paging,
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Paging {
    #[serde(default)]
    totals: u64,
}

/// [`ItemSource`] backed by the HTTP listing API
#[derive(Debug, Clone)]
pub struct HttpItemSource {
    client: reqwest::Client,
    api_base: String,
}

impl HttpItemSource {
    /// Create a source from transport settings and request credentials
    ///
    /// Credentials are attached to every request as default headers; a header
    /// name or value that is not valid HTTP is a configuration error.
    pub fn new(sync: &SyncConfig, auth: &AuthConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &auth.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config(format!("invalid header name '{name}': {e}"), "auth.headers"))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::config(format!("invalid value for header '{name}': {e}"), "auth.headers"))?;
            headers.insert(name, value);
        }
        if let Some(cookie) = auth.cookie_header() {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| Error::config(format!("invalid cookie value: {e}"), "auth.cookies"))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .timeout(sync.request_timeout)
            .user_agent(sync.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: sync.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Listing endpoint of a collection
    pub fn items_url(&self, collection_id: &str) -> String {
        format!("{}/collections/{}/items", self.api_base, collection_id)
    }

    async fn listing(&self, collection_id: &str, offset: u64, limit: u64) -> Result<Listing> {
        let url = self.items_url(collection_id);
        debug!(url = %url, offset, limit, "Requesting listing page");

        let response = self
            .client
            .get(&url)
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ItemSource for HttpItemSource {
    async fn count(&self, collection_id: &str) -> Result<u64> {
        Ok(self.listing(collection_id, 0, 1).await?.paging.totals)
    }

    async fn page(&self, collection_id: &str, offset: u64, limit: u64) -> Result<Vec<RawItem>> {
        let listing = self.listing(collection_id, offset, limit).await?;
        Ok(listing.data.into_iter().map(RawItem::new).collect())
    }
}
