//! Run-scoped image localization
//!
//! Remote image references in a document body are downloaded into the shared
//! image directory and rewritten to relative links. Each URL is fetched at most
//! once per run: the [`ImageCache`] remembers where it stored every image and is
//! cleared when a new run starts. A failed download never fails the document,
//! the reference just keeps pointing at the remote URL.

use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::header::split_document;
use crate::utils::relative_path;

/// Inline image reference: `![alt](link)`
#[allow(clippy::expect_used)]
static IMAGE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[(?P<alt>.*?)\]\((?P<link>.+?)\)").expect("literal pattern compiles")
});

/// Extension used when neither the response nor the URL names a known format
const DEFAULT_EXTENSION: &str = ".jpg";

/// Extensions accepted from a URL path
const KNOWN_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg"];

/// Hex digits of the URL digest used in local filenames
const HASH_PREFIX_LEN: usize = 16;

/// Downloaded images of the current run, keyed by remote URL
#[derive(Debug)]
pub struct ImageCache {
    client: reqwest::Client,
    root: PathBuf,
    entries: HashMap<String, PathBuf>,
}

struct ImageRef {
    span: Range<usize>,
    alt: String,
    link: String,
}

impl ImageCache {
    /// Cache storing images under `root`
    ///
    /// `root` is made absolute against the current directory; it is created on
    /// the first download.
    pub fn new(root: &Path, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            root: std::path::absolute(root)?,
            entries: HashMap::new(),
        })
    }

    /// Absolute image directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path of an already downloaded image
    pub fn get(&self, url: &str) -> Option<&Path> {
        self.entries.get(url).map(PathBuf::as_path)
    }

    /// Number of images downloaded this run
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been downloaded this run
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry; files on disk are kept
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Rewrite remote image references in `text` for a document stored in `doc_dir`
    ///
    /// The header block is passed through untouched. References are matched
    /// within single lines; non-HTTP links and failed downloads are left as they
    /// are.
    pub async fn localize(&mut self, text: &str, doc_dir: &Path) -> String {
        let document = split_document(text);
        let mut out = String::with_capacity(text.len());
        if let Some(header) = document.header {
            out.push_str(header);
        }

        for line in document.body.split_inclusive('\n') {
            let refs = find_refs(line);
            if refs.is_empty() {
                out.push_str(line);
                continue;
            }

            let mut last = 0;
            for image in refs {
                out.push_str(&line[last..image.span.start]);
                match self.local_link(&image.link, doc_dir).await {
                    Some(local) => out.push_str(&format!("![{}]({})", image.alt, local)),
                    None => out.push_str(&line[image.span.clone()]),
                }
                last = image.span.end;
            }
            out.push_str(&line[last..]);
        }
        out
    }

    async fn local_link(&mut self, url: &str, doc_dir: &Path) -> Option<String> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return None;
        }

        let path = match self.entries.get(url) {
            Some(path) => path.clone(),
            None => match self.download(url).await {
                Ok(path) => {
                    self.entries.insert(url.to_string(), path.clone());
                    path
                }
                Err(e) => {
                    warn!(url, error = %e, "Image download failed, keeping remote link");
                    return None;
                }
            },
        };

        Some(relative_path(&path, doc_dir))
    }

    async fn download(&self, url: &str) -> Result<PathBuf> {
        let image_error = |reason: String| Error::ImageFetch {
            url: url.to_string(),
            reason,
        };

        let response = self.client.get(url).send().await.map_err(|e| {
            image_error(if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            })
        })?;

        if !response.status().is_success() {
            return Err(image_error(format!("HTTP {}", response.status())));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| image_error(e.to_string()))?;

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self
            .root
            .join(image_filename(url, extension_for(&content_type, url)));
        tokio::fs::write(&path, &bytes).await?;

        info!(url, path = %path.display(), bytes = bytes.len(), "Image downloaded");
        Ok(path)
    }
}

fn find_refs(line: &str) -> Vec<ImageRef> {
    IMAGE_REF
        .captures_iter(line)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(ImageRef {
                span: whole.range(),
                alt: caps.name("alt").map_or("", |m| m.as_str()).to_string(),
                link: caps.name("link")?.as_str().to_string(),
            })
        })
        .collect()
}

/// File extension (with dot) for a downloaded image
///
/// The response media type wins; otherwise a known extension in the URL path is
/// used, falling back to `.jpg`.
pub fn extension_for(content_type: &str, url: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "image/svg+xml" => ".svg",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        _ => extension_from_url(url).unwrap_or(DEFAULT_EXTENSION),
    }
}

fn extension_from_url(url: &str) -> Option<&'static str> {
    let parsed = url::Url::parse(url).ok()?;
    let ext = Path::new(parsed.path()).extension()?.to_str()?;
    let dotted = format!(".{}", ext.to_ascii_lowercase());
    KNOWN_EXTENSIONS.iter().copied().find(|known| *known == dotted)
}

/// Local filename: URL digest prefix plus a microsecond timestamp
fn image_filename(url: &str, ext: &str) -> String {
    let digest = format!("{:x}", md5::compute(url.as_bytes()));
    let micros = chrono::Utc::now().timestamp_micros();
    format!("{}_{}{}", &digest[..HASH_PREFIX_LEN], micros, ext)
}
