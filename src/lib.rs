//! # collection-archiver
//!
//! Incremental mirror of remote content collections into a local Markdown archive.
//!
//! ## Design Philosophy
//!
//! collection-archiver is designed to be:
//! - **Incremental** - Re-running against an unchanged collection writes nothing
//! - **Non-destructive** - Existing documents are never overwritten; a changed item
//!   gets an additional numbered document
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to progress events, no polling required
//!
//! Every archived document is a Markdown file starting with a YAML header block
//! (title, URL, author, timestamps, counters). Embedded remote images are stored
//! once per run in a shared image directory and linked relatively.
//!
//! ## Quick Start
//!
//! ```no_run
//! use collection_archiver::{CollectionSyncer, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_json(
//!         r#"{
//!             "collections": [{ "url": "https://www.zhihu.com/collection/123456" }],
//!             "global_image_path": "archive/images"
//!         }"#,
//!     )?;
//!
//!     let mut syncer = CollectionSyncer::with_http_source(config)?;
//!
//!     // Subscribe to events
//!     let mut events = syncer.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = syncer.run().await?;
//!     println!("{} saved, {} already archived", summary.saved(), summary.skipped());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Item classification and extraction
pub mod extract;
/// Document header block codec
pub mod header;
/// Run-scoped image localization
pub mod images;
/// Filename allocation and change detection
pub mod resolver;
/// Retry classification and backoff
pub mod retry;
/// Remote collection sources
pub mod source;
/// Collection synchronization driver
pub mod sync;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{AuthConfig, CollectionConfig, Config, RetryConfig, SyncConfig};
pub use error::{Error, Result};
pub use extract::Extractor;
pub use images::ImageCache;
pub use resolver::Resolution;
pub use source::{HttpItemSource, ItemSource};
pub use sync::CollectionSyncer;
pub use types::{
    CollectionTarget, ItemBody, ItemKind, ItemMetadata, RawItem, RunState, RunSummary,
    SourceReport, SyncEvent,
};
