//! Collection synchronization driver
//!
//! [`CollectionSyncer`] walks every configured collection page by page and
//! archives each item it has not seen yet. Per collection:
//!
//! 1. the archive directory is created
//! 2. the total item count is queried once (failure abandons the collection)
//! 3. pages are fetched at increasing offsets after a pacing delay; an empty page
//!    or reaching the total ends the collection
//! 4. every record is extracted, checked against the archive, rendered with its
//!    header block, has its images localized, and is written to a fresh file
//!
//! A retryable page failure is recovered by fetching the same offset again after
//! a backoff, so nothing is lost and nothing already written is written twice.
//! Failures of a single item are logged and counted; the collection continues.

use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::Extractor;
use crate::header;
use crate::images::ImageCache;
use crate::resolver::{self, Resolution};
use crate::retry::{Backoff, IsRetryable};
use crate::source::{HttpItemSource, ItemSource};
use crate::types::{
    CollectionTarget, ItemBody, ItemMetadata, RawItem, RunState, RunSummary, SourceReport,
    SyncEvent,
};

/// Buffered events per subscriber before it starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Mirrors remote collections into local Markdown archives
pub struct CollectionSyncer {
    config: Arc<Config>,
    source: Arc<dyn ItemSource>,
    extractor: Extractor,
    images: ImageCache,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl CollectionSyncer {
    /// Create a syncer reading collections from `source`
    ///
    /// Fails with [`Error::Config`] when the configuration cannot support a run
    /// (for example when `global_image_path` is missing).
    pub fn new(config: Config, source: Arc<dyn ItemSource>) -> Result<Self> {
        config.validate()?;

        let images = ImageCache::new(
            config.image_root()?,
            config.sync.image_timeout,
            &config.sync.user_agent,
        )?;
        let extractor = Extractor::new(&config.sync.site_base);
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            source,
            extractor,
            images,
            event_tx,
        })
    }

    /// Create a syncer talking to the HTTP listing API
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use collection_archiver::{CollectionSyncer, Config};
    /// use std::path::Path;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = Config::from_file(Path::new("archive.json")).await?;
    /// let mut syncer = CollectionSyncer::with_http_source(config)?;
    ///
    /// let summary = syncer.run().await?;
    /// println!("saved {} new documents", summary.saved());
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_http_source(config: Config) -> Result<Self> {
        let source = HttpItemSource::new(&config.sync, &config.auth)?;
        Self::new(config, Arc::new(source))
    }

    /// Subscribe to progress events
    ///
    /// Every subscriber receives every event emitted after it subscribed. A
    /// subscriber that falls more than 1000 events behind receives
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Images downloaded during the current (or last) run
    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    fn emit_event(&self, event: SyncEvent) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Synchronize every configured collection, in order
    ///
    /// Only a failure to prepare the shared image directory ends the run early;
    /// a collection that fails is reported in the summary and the next one is
    /// processed.
    pub async fn run(&mut self) -> Result<RunSummary> {
        self.images.clear();
        let mut summary = RunSummary::default();

        let config = Arc::clone(&self.config);
        if config.collections.is_empty() {
            warn!("No collections configured, nothing to do");
            return Ok(summary);
        }

        tokio::fs::create_dir_all(self.images.root())
            .await
            .map_err(|e| Error::Write {
                path: self.images.root().to_path_buf(),
                source: e,
            })?;
        info!(path = %self.images.root().display(), "Using image directory");

        for entry in &config.collections {
            let Some(target) = CollectionTarget::from_config(entry) else {
                warn!("Skipping collection entry without a URL");
                continue;
            };
            let report = self.sync_collection(&target).await;
            summary.reports.push(report);
        }

        info!(
            collections = summary.reports.len(),
            saved = summary.saved(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            images = self.images.len(),
            "Run finished"
        );
        Ok(summary)
    }

    /// Synchronize one collection
    ///
    /// Never fails: problems end up in [`SourceReport::error`] and the item
    /// counters.
    pub async fn sync_collection(&mut self, target: &CollectionTarget) -> SourceReport {
        let mut report = SourceReport {
            url: target.url.clone(),
            dir: target.dir.clone(),
            ..SourceReport::default()
        };

        info!(url = %target.url, dir = %target.dir.display(), "Synchronizing collection");

        if let Err(e) = tokio::fs::create_dir_all(&target.dir).await {
            let error = Error::Write {
                path: target.dir.clone(),
                source: e,
            };
            return self.abandon(report, error);
        }

        let total = match self.source.count(&target.id).await {
            Ok(total) => total,
            Err(e) => {
                let error = Error::SourceFetch {
                    url: target.url.clone(),
                    reason: e.to_string(),
                };
                return self.abandon(report, error);
            }
        };
        report.total = total;
        info!(url = %target.url, total, "Collection item count");
        self.emit_event(SyncEvent::CollectionStarted {
            url: target.url.clone(),
            dir: target.dir.clone(),
            total,
        });

        let config = Arc::clone(&self.config);
        let limit = config.sync.page_size;
        let mut state = RunState::new(total);
        let mut backoff = Backoff::new(&config.retry);

        while !state.is_exhausted() {
            info!(
                url = %target.url,
                page = state.page_number(limit),
                offset = state.offset,
                "Fetching page"
            );
            tokio::time::sleep(config.sync.page_delay).await;

            let items = match self.source.page(&target.id, state.offset, limit).await {
                Ok(items) => {
                    backoff.reset();
                    items
                }
                Err(e) => {
                    let error = Error::PageFetch {
                        offset: state.offset,
                        source: Box::new(e),
                    };
                    if error.is_retryable()
                        && let Some(delay) = backoff.next_delay()
                    {
                        report.recoveries += 1;
                        warn!(
                            url = %target.url,
                            offset = state.offset,
                            attempt = backoff.attempt(),
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Page fetch failed, retrying same offset"
                        );
                        self.emit_event(SyncEvent::Recovering {
                            url: target.url.clone(),
                            offset: state.offset,
                            attempt: backoff.attempt(),
                            delay_ms: delay.as_millis() as u64,
                        });
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return self.abandon(report, error);
                }
            };

            report.pages += 1;
            self.emit_event(SyncEvent::PageFetched {
                url: target.url.clone(),
                offset: state.offset,
                items: items.len(),
            });

            if items.is_empty() {
                info!(url = %target.url, offset = state.offset, "Empty page, end of collection");
                break;
            }

            for (idx, raw) in items.iter().enumerate() {
                let ordinal = state.offset + idx as u64 + 1;
                debug!(ordinal, total, "Processing item");
                self.archive_item(raw, ordinal, &target.dir, &mut report)
                    .await;
            }

            state.offset += limit;
        }

        info!(
            url = %target.url,
            saved = report.saved,
            skipped = report.skipped,
            failed = report.failed,
            "Collection finished"
        );
        self.emit_event(SyncEvent::CollectionFinished {
            report: report.clone(),
        });
        report
    }

    async fn archive_item(
        &mut self,
        raw: &RawItem,
        ordinal: u64,
        dir: &Path,
        report: &mut SourceReport,
    ) {
        let (metadata, body) = self.extractor.extract(raw, ordinal);

        match self.store(&metadata, &body, dir).await {
            Ok(Resolution::Allocate(path)) => {
                report.saved += 1;
                info!(title = %metadata.title, path = %path.display(), "Saved document");
                self.emit_event(SyncEvent::ItemSaved {
                    title: metadata.title,
                    path,
                });
            }
            Ok(Resolution::Skip(existing)) => {
                report.skipped += 1;
                info!(title = %metadata.title, existing = %existing.display(), "Already archived, skipping");
                self.emit_event(SyncEvent::ItemSkipped {
                    title: metadata.title,
                    existing,
                });
            }
            Err(e) => {
                report.failed += 1;
                warn!(title = %metadata.title, ordinal, error = %e, "Failed to archive item");
                self.emit_event(SyncEvent::ItemFailed {
                    title: metadata.title,
                    code: e.error_code().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Resolve, render and write one item; `Skip` means nothing was written
    async fn store(
        &mut self,
        metadata: &ItemMetadata,
        body: &ItemBody,
        dir: &Path,
    ) -> Result<Resolution> {
        let resolution = resolver::resolve(&metadata.title, metadata, dir).await?;

        if let Resolution::Allocate(path) = &resolution {
            let text = format!("{}{}", header::encode(metadata)?, body.to_markdown());
            let text = self.images.localize(&text, dir).await;
            write_new(path, &text).await?;
        }

        Ok(resolution)
    }

    fn abandon(&self, mut report: SourceReport, error: Error) -> SourceReport {
        error!(url = %report.url, code = error.error_code(), error = %error, "Abandoning collection");
        report.error = Some(error.to_string());
        self.emit_event(SyncEvent::CollectionFailed {
            url: report.url.clone(),
            error: error.to_string(),
        });
        report
    }
}

/// Write a document that must not exist yet
async fn write_new(path: &Path, text: &str) -> Result<()> {
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })?;
    fill_or_remove(file, path, text).await
}

/// Write `text` into the just created `path`; on failure the file is removed
///
/// A truncated document would still carry a complete header block and be
/// taken for an archived copy on the next run.
async fn fill_or_remove<W>(mut writer: W, path: &Path, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut written = writer.write_all(text.as_bytes()).await;
    if written.is_ok() {
        written = writer.flush().await;
    }
    drop(writer);

    if let Err(source) = written {
        if let Err(e) = tokio::fs::remove_file(path).await {
            error!(path = %path.display(), error = %e, "Failed to remove partially written document");
        }
        return Err(Error::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
