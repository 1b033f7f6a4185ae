//! Filename allocation with change detection
//!
//! A logical item is identified by its URL and its modification time at minute
//! resolution. Candidate filenames `stem.md`, `stem(1).md`, `stem(2).md`, ... are
//! probed in order: the first missing one is allocated, and finding an equivalent
//! document on the way means the item is already archived. Existing documents are
//! never overwritten, so a changed item gets an additional numbered file next to
//! the stale one.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::header;
use crate::types::ItemMetadata;

/// Extension of archived documents
pub const DOCUMENT_EXTENSION: &str = "md";

/// Maximum number of numbered candidates probed for one stem
const MAX_SUFFIX: u32 = 9999;

/// Decision for one incoming item
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Write the item to this (currently free) path
    Allocate(PathBuf),
    /// An equivalent document already exists at this path
    Skip(PathBuf),
}

/// Candidate filename for a stem and suffix counter (`0` means no suffix)
pub fn candidate_name(stem: &str, counter: u32) -> String {
    if counter == 0 {
        format!("{stem}.{DOCUMENT_EXTENSION}")
    } else {
        format!("{stem}({counter}).{DOCUMENT_EXTENSION}")
    }
}

/// Whether two metadata records describe the same version of the same item
///
/// Both modification times must be present and equal at minute resolution, or
/// both absent.
pub fn is_same_version(existing: &ItemMetadata, incoming: &ItemMetadata) -> bool {
    if existing.url != incoming.url {
        return false;
    }
    match (existing.modified, incoming.modified) {
        (Some(a), Some(b)) => header::truncate_to_minute(a) == header::truncate_to_minute(b),
        (None, None) => true,
        _ => false,
    }
}

/// Decide where an item goes in `dir`, or whether it is already there
pub async fn resolve(stem: &str, incoming: &ItemMetadata, dir: &Path) -> Result<Resolution> {
    for counter in 0..=MAX_SUFFIX {
        let path = dir.join(candidate_name(stem, counter));

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Resolution::Allocate(path));
            }
            Err(e) => {
                // Present but unreadable: never a match, never overwritten
                debug!(path = %path.display(), error = %e, "Cannot read existing document");
                continue;
            }
        };

        match header::decode(&text) {
            Some(existing) if is_same_version(&existing, incoming) => {
                debug!(path = %path.display(), url = %incoming.url, "Equivalent document already archived");
                return Ok(Resolution::Skip(path));
            }
            Some(_) => {}
            None => {
                debug!(path = %path.display(), "Existing document has no readable header");
            }
        }
    }

    Err(Error::NameExhausted {
        stem: stem.to_string(),
        dir: dir.to_path_buf(),
        attempts: MAX_SUFFIX + 1,
    })
}
