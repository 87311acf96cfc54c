//! Catalog discovery: recursively lists eligible images under an instance root.

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::path::Path;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::events::CatalogEntry;

/// Content types the slideshow is willing to show.
pub const ENABLED_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/heic"];

const SAFE_PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Guess a file's content type from its extension.
#[must_use]
pub fn content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(OsStr::to_str)?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime)
}

/// Return `true` if `path` classifies as one of [`ENABLED_TYPES`].
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    content_type(path).is_some_and(|mime| ENABLED_TYPES.contains(&mime))
}

/// Recursively list eligible images below `root` as `/`-separated relative paths.
///
/// Within a directory, files come before the contents of its subdirectories and
/// both are ordered by name. Dot-prefixed entries are skipped. A directory that
/// cannot be read is logged and contributes nothing; its siblings are still
/// walked, so this never fails as a whole.
#[must_use]
pub fn discover_images(root: &Path) -> Vec<String> {
    let mut out = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by(files_first)
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(
                    path = ?err.path(),
                    error = %err,
                    "unable to read catalog directory; skipping"
                );
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_supported_image(entry.path()) {
            continue;
        }
        if let Some(rel) = relative_path(root, entry.path()) {
            debug!(path = %rel, "catalog: found image");
            out.push(rel);
        }
    }
    out
}

/// Pair each relative path with the URL that serves it for instance `id`.
#[must_use]
pub fn catalog_entries(id: &str, paths: Vec<String>) -> Vec<CatalogEntry> {
    paths
        .into_iter()
        .map(|path| CatalogEntry {
            url: photo_url(id, &path),
            path,
        })
        .collect()
}

/// `/photo/{id}/{path}` with each segment percent-encoded.
#[must_use]
pub fn photo_url(id: &str, rel: &str) -> String {
    let mut url = format!("/photo/{}", encode_segment(id));
    for segment in rel.split('/') {
        url.push('/');
        url.push_str(&encode_segment(segment));
    }
    url
}

/// Percent-encode one URL path segment.
#[must_use]
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SAFE_PATH_SEGMENT).to_string()
}

fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

fn is_hidden(entry: &DirEntry) -> bool {
    // Never skip the root; tempfile roots can be dot-dirs.
    if entry.depth() == 0 {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|n| n.starts_with('.'))
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
