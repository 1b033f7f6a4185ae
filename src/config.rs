//! Configuration types for collection-archiver
//!
//! The on-disk format is JSON. Only `collections` and `global_image_path` are
//! required for a run; every other section falls back to its defaults:
//!
//! ```json
//! {
//!   "collections": [
//!     { "url": "https://www.zhihu.com/collection/123456", "path": "archive/reading" }
//!   ],
//!   "global_image_path": "archive/images"
//! }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, path::PathBuf, time::Duration};

/// Top-level run configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Collections to mirror, processed in order
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,

    /// Directory shared by all collections for downloaded images (required)
    #[serde(default)]
    pub global_image_path: Option<PathBuf>,

    /// Pagination, pacing and timeout settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Recovery policy for network failures during pagination
    #[serde(default)]
    pub retry: RetryConfig,

    /// Opaque request credentials forwarded to the listing API
    #[serde(default)]
    pub auth: AuthConfig,
}

/// One collection to mirror
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Public collection URL; its last path segment is the collection id
    #[serde(default)]
    pub url: String,

    /// Archive directory for this collection's documents.
    /// Empty or missing means `collection_<id>` in the working directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Pagination and transport settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Items requested per page (default: 20)
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Pause before every page request (default: 800 milliseconds)
    #[serde(default = "default_page_delay", with = "duration_ms_serde")]
    pub page_delay: Duration,

    /// Timeout for count and page requests (default: 10 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for each image download (default: 15 seconds)
    #[serde(default = "default_image_timeout", with = "duration_serde")]
    pub image_timeout: Duration,

    /// Base URL of the listing API (default: `https://www.zhihu.com/api/v4`)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Base URL used to synthesize canonical links for notes and videos
    #[serde(default = "default_site_base")]
    pub site_base: String,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            page_delay: default_page_delay(),
            request_timeout: default_request_timeout(),
            image_timeout: default_image_timeout(),
            api_base: default_api_base(),
            site_base: default_site_base(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retry behavior configuration
///
/// The defaults give a fixed five second backoff (multiplier 1.0, no jitter),
/// capped at five consecutive failures per page.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of consecutive retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 5 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each failure (default: 1.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Request credentials, forwarded verbatim
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Extra request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Cookies, sent as a single `Cookie` header
    #[serde(default)]
    pub cookies: HashMap<String, String>,
}

impl AuthConfig {
    /// Render the cookie map as a `Cookie` header value (sorted by name)
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let mut pairs: Vec<_> = self.cookies.iter().collect();
        pairs.sort();
        Some(
            pairs
                .into_iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

impl Config {
    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config {
            message: format!("invalid configuration JSON: {e}"),
            key: None,
        })
    }

    /// Load a configuration file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| Error::Config {
            message: format!("cannot read configuration '{}': {}", path.display(), e),
            key: None,
        })?;
        Self::from_json(&text)
    }

    /// Check the settings a run cannot start without
    pub fn validate(&self) -> Result<()> {
        match &self.global_image_path {
            Some(p) if !p.as_os_str().is_empty() => {}
            _ => {
                return Err(Error::config(
                    "global_image_path must be set",
                    "global_image_path",
                ));
            }
        }
        if self.sync.page_size == 0 {
            return Err(Error::config("page_size must be at least 1", "sync.page_size"));
        }
        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::config(
                format!("backoff_multiplier must be a finite number of at least 1.0, got {multiplier}"),
                "retry.backoff_multiplier",
            ));
        }
        Ok(())
    }

    /// Image root directory, once [`validate`](Self::validate) has passed
    pub fn image_root(&self) -> Result<&Path> {
        self.global_image_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| Error::config("global_image_path must be set", "global_image_path"))
    }
}

fn default_page_size() -> u64 {
    20
}

fn default_page_delay() -> Duration {
    Duration::from_millis(800)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_image_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_api_base() -> String {
    "https://www.zhihu.com/api/v4".to_string()
}

fn default_site_base() -> String {
    "https://www.zhihu.com".to_string()
}

fn default_user_agent() -> String {
    concat!("collection-archiver/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_json(
            r#"{
                "collections": [
                    {"url": "https://www.zhihu.com/collection/42", "path": "out/reading"},
                    {"url": "https://www.zhihu.com/collection/43"}
                ],
                "global_image_path": "out/images"
            }"#,
        )
        .unwrap();

        assert_eq!(config.collections.len(), 2);
        assert_eq!(config.collections[0].path, Some(PathBuf::from("out/reading")));
        assert_eq!(config.collections[1].path, None);
        assert_eq!(config.sync.page_size, 20);
        assert_eq!(config.sync.page_delay, Duration::from_millis(800));
        assert_eq!(config.sync.request_timeout, Duration::from_secs(10));
        assert_eq!(config.sync.image_timeout, Duration::from_secs(15));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(5));
        assert!(!config.retry.jitter);
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_global_image_path_is_config_error() {
        let config = Config::from_json(r#"{"collections": []}"#).unwrap();
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("global_image_path")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_global_image_path_is_config_error() {
        let config = Config::from_json(r#"{"global_image_path": ""}"#).unwrap();
        assert!(config.validate().is_err());
        assert!(config.image_root().is_err());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config =
            Config::from_json(r#"{"global_image_path": "img", "sync": {"page_size": 0}}"#).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_backoff_multiplier_below_one_rejected() {
        let config = Config::from_json(
            r#"{"global_image_path": "img", "retry": {"backoff_multiplier": -1.0}}"#,
        )
        .unwrap();
        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("retry.backoff_multiplier"))
            }
            other => panic!("expected config error, got {other:?}"),
        }

        let mut config = Config::from_json(r#"{"global_image_path": "img"}"#).unwrap();
        config.retry.backoff_multiplier = f64::NAN;
        assert!(config.validate().is_err());
        config.retry.backoff_multiplier = 2.0;
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        assert!(matches!(
            Config::from_json("{not json"),
            Err(Error::Config { key: None, .. })
        ));
    }

    #[test]
    fn test_durations_round_trip_through_json() {
        let mut config = Config::default();
        config.sync.page_delay = Duration::from_millis(250);
        config.retry.initial_delay = Duration::from_secs(2);

        let json = serde_json::to_string(&config).expect("serialize failed");
        let back: Config = serde_json::from_str(&json).expect("deserialize failed");

        assert_eq!(back.sync.page_delay, Duration::from_millis(250));
        assert_eq!(back.retry.initial_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_cookie_header_is_sorted_and_joined() {
        let mut auth = AuthConfig::default();
        assert_eq!(auth.cookie_header(), None);

        auth.cookies.insert("z_c0".into(), "token".into());
        auth.cookies.insert("d_c0".into(), "device".into());
        assert_eq!(auth.cookie_header().as_deref(), Some("d_c0=device; z_c0=token"));
    }

    #[tokio::test]
    async fn test_from_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_file(&dir.path().join("absent.json")).await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
