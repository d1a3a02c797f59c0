//! Precomputed static asset index.
//!
//! # Responsibilities
//! - Walk a root directory once at construction (production mode)
//! - Apply the ignore policy (dotfiles out, `.well-known` always in)
//! - Precompute the full header set per file
//! - Map normalized URL paths to file entries
//!
//! # Design Decisions
//! - Index keys are `/`-prefixed, forward-slash, NFC-normalized paths
//! - Entries are immutable once built; lookups hand out references
//! - Encoding suffixes (`.gz`/`.br`) are resolved at header-computation
//!   time so negotiated variants carry the inner file's content type

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{header, HeaderMap, HeaderValue};
use unicode_normalization::UnicodeNormalization;

use crate::assets::mime::MimeTable;
use crate::assets::StaticOptions;

/// Metadata and precomputed headers for one servable file.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Absolute path on disk.
    pub abs: PathBuf,

    /// File size in bytes.
    pub size: u64,

    /// Precomputed response headers for the unconditional 200 case.
    pub headers: HeaderMap,
}

/// Mapping from normalized URL path to file entry, built once per root.
#[derive(Debug, Default)]
pub struct StaticIndex {
    entries: HashMap<String, FileEntry>,
}

impl StaticIndex {
    /// Walk `root` and index every servable regular file.
    pub fn build(root: &Path, opts: &StaticOptions, mime: &MimeTable) -> std::io::Result<Self> {
        let cache_control = opts.cache_control();
        let mut entries = HashMap::new();

        walk(root, root, &mut |abs, meta, rel| {
            if ignored(&rel, opts.dot_files) {
                return Ok(());
            }
            let mtime = meta.modified()?;
            let mut headers = entry_headers(&rel, meta.len(), mtime, opts.etag, mime);
            if let Some(cc) = &cache_control {
                if let Ok(value) = HeaderValue::from_str(cc) {
                    headers.insert(header::CACHE_CONTROL, value);
                }
            }
            let key = format!("/{}", rel.nfc().collect::<String>());
            entries.insert(
                key,
                FileEntry {
                    abs: abs.to_path_buf(),
                    size: meta.len(),
                    headers,
                },
            );
            Ok(())
        })?;

        Ok(Self { entries })
    }

    /// Look up an entry by normalized URL path.
    pub fn get(&self, key: &str) -> Option<&FileEntry> {
        self.entries.get(key)
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the root contained no servable files.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ignore policy: dotfiles are skipped unless allowed, `.well-known`
/// subtrees are always kept.
pub(crate) fn ignored(rel: &str, dot_files: bool) -> bool {
    if rel.contains(".well-known/") || rel.starts_with(".well-known") {
        return false;
    }
    if dot_files {
        return false;
    }
    rel.starts_with('.') || rel.contains("/.")
}

/// Compute the header set for a file, resolving the encoding suffix.
pub(crate) fn entry_headers(
    name: &str,
    size: u64,
    mtime: SystemTime,
    etag: bool,
    mime: &MimeTable,
) -> HeaderMap {
    let encoding = if name.ends_with(".br") {
        Some("br")
    } else if name.ends_with(".gz") {
        Some("gzip")
    } else {
        None
    };
    let inner = if encoding.is_some() {
        &name[..name.len() - 3]
    } else {
        name
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    if let Some(ctype) = mime.content_type(inner) {
        if let Ok(value) = HeaderValue::from_str(&ctype) {
            headers.insert(header::CONTENT_TYPE, value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(mtime)) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    if let Some(enc) = encoding {
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(enc));
    }
    if etag {
        let mtime_ms = mtime
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        if let Ok(value) = HeaderValue::from_str(&format!("W/\"{}-{}\"", size, mtime_ms)) {
            headers.insert(header::ETAG, value);
        }
    }
    headers
}

/// Depth-first walk over regular files, reporting root-relative paths
/// with forward-slash separators.
fn walk(
    dir: &Path,
    root: &Path,
    f: &mut impl FnMut(&Path, &fs::Metadata, String) -> std::io::Result<()>,
) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let meta = entry.metadata()?;
        if meta.is_dir() {
            walk(&path, root, f)?;
        } else if meta.is_file() {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            f(&path, &meta, rel)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn opts() -> StaticOptions {
        StaticOptions::default()
    }

    #[test]
    fn test_index_keys_and_headers() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("sub/app.js"), "console.log(1)").unwrap();
        fs::write(dir.path().join("sub/app.js.gz"), "zzzz").unwrap();

        let index = StaticIndex::build(dir.path(), &opts(), &MimeTable::new()).unwrap();
        assert_eq!(index.len(), 3);

        let entry = index.get("/index.html").unwrap();
        assert_eq!(
            entry.headers.get(header::CONTENT_TYPE).unwrap(),
            "text/html;charset=utf-8"
        );
        assert_eq!(entry.headers.get(header::CONTENT_LENGTH).unwrap(), "13");
        assert!(entry
            .headers
            .get(header::ETAG)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("W/\"13-"));

        // encoded variant reports the inner type plus the encoding
        let gz = index.get("/sub/app.js.gz").unwrap();
        assert_eq!(gz.headers.get(header::CONTENT_TYPE).unwrap(), "text/javascript");
        assert_eq!(gz.headers.get(header::CONTENT_ENCODING).unwrap(), "gzip");
    }

    #[test]
    fn test_dotfiles_skipped_well_known_kept() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".well-known")).unwrap();
        fs::write(dir.path().join(".env"), "secret").unwrap();
        fs::write(dir.path().join(".well-known/security.txt"), "contact").unwrap();

        let index = StaticIndex::build(dir.path(), &opts(), &MimeTable::new()).unwrap();
        assert!(index.get("/.env").is_none());
        assert!(index.get("/.well-known/security.txt").is_some());

        let mut dotted = opts();
        dotted.dot_files = true;
        let index = StaticIndex::build(dir.path(), &dotted, &MimeTable::new()).unwrap();
        assert!(index.get("/.env").is_some());
    }

    #[test]
    fn test_cache_control_variants() {
        let mut o = opts();
        o.max_age = Some(0);
        assert_eq!(o.cache_control().as_deref(), Some("public,max-age=0,must-revalidate"));
        o.max_age = Some(31536000);
        o.immutable = true;
        assert_eq!(
            o.cache_control().as_deref(),
            Some("public,max-age=31536000,immutable")
        );
        o.max_age = None;
        assert_eq!(o.cache_control(), None);
    }
}
