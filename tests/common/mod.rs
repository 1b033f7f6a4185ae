//! Common test utilities for collection-archiver E2E tests

#[allow(dead_code)]
pub mod fixtures;

pub use fixtures::*;

use collection_archiver::{CollectionConfig, Config, RetryConfig, SyncConfig};
use std::path::Path;
use std::time::Duration;
use wiremock::MockServer;

/// Config pointing the listing API at `server`, archiving into `root`
pub fn config_for(server: &MockServer, root: &Path, collection_id: &str) -> Config {
    Config {
        collections: vec![CollectionConfig {
            url: format!("https://www.zhihu.com/collection/{collection_id}"),
            path: Some(root.join("notes")),
        }],
        global_image_path: Some(root.join("images")),
        sync: SyncConfig {
            page_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
            image_timeout: Duration::from_secs(5),
            api_base: format!("{}/api/v4", server.uri()),
            ..SyncConfig::default()
        },
        retry: RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 1.0,
            jitter: false,
        },
        ..Config::default()
    }
}
