//! Utility functions for filenames and path manipulation

use std::path::{Component, Path, PathBuf};

/// Characters that are not allowed in filenames on at least one supported platform
const ILLEGAL_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Remove characters that are illegal in filenames and trim surrounding whitespace
///
/// # Examples
///
/// ```
/// use collection_archiver::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("  What is 1/2? "), "What is 12");
/// assert_eq!(sanitize_filename("a<b>|c"), "abc");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// First `n` characters of `s` (not bytes)
#[must_use]
pub fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Path of `target` relative to the directory `base`, with `/` separators
///
/// Both paths are made absolute against the current directory first. When no
/// relative path exists (different roots or drive prefixes) the absolute target
/// is returned instead, still with `/` separators.
///
/// # Examples
///
/// ```
/// use collection_archiver::utils::relative_path;
/// use std::path::Path;
///
/// let rel = relative_path(Path::new("/archive/images/a.png"), Path::new("/archive/notes"));
/// assert_eq!(rel, "../images/a.png");
/// ```
pub fn relative_path(target: &Path, base: &Path) -> String {
    let target = absolute(target);
    let base = absolute(base);

    let target_parts: Vec<Component<'_>> = target.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();

    // Differing roots (e.g. Windows drives) have no relative form
    if target_parts.first() != base_parts.first() {
        return to_slashes(&target);
    }

    let common = target_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..base_parts.len() {
        parts.push("..".to_string());
    }
    for part in &target_parts[common..] {
        parts.push(part.as_os_str().to_string_lossy().into_owned());
    }

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

fn absolute(path: &Path) -> PathBuf {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    // Collapse `.` and `..` without touching the filesystem
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
