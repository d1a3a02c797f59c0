//! Static asset responder.
//!
//! # Responsibilities
//! - Resolve a request path to the best matching file for the client's
//!   Accept-Encoding (brotli, then gzip, then identity)
//! - Answer conditional requests (If-None-Match / ETag → 304)
//! - Answer range requests (206 / 416 with Content-Range)
//! - Guard dev-mode probes against path traversal
//!
//! # Design Decisions
//! - Candidate paths are derived once per request; the production path
//!   needs no filesystem round-trips at all
//! - Malformed percent-encoding falls back to the raw path, not an error
//! - Cached header sets are cloned before any per-response mutation

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode, Uri};
use bytes::Bytes;
use futures_util::stream;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::assets::index::{entry_headers, ignored, FileEntry, StaticIndex};
use crate::assets::mime::MimeTable;
use crate::assets::{HeaderHook, StaticOptions};

/// Serves one root directory, via a precomputed index or live probing.
pub struct StaticServer {
    root: PathBuf,
    opts: StaticOptions,
    mime: MimeTable,
    index: Option<StaticIndex>,
    hook: Option<HeaderHook>,
}

impl StaticServer {
    /// Open a server for `root`. Returns `Ok(None)` when the directory
    /// does not exist (the resolver stage is simply skipped).
    pub fn open(
        root: &Path,
        opts: StaticOptions,
        hook: Option<HeaderHook>,
    ) -> io::Result<Option<Self>> {
        if !root.is_dir() {
            return Ok(None);
        }
        let root = root.canonicalize()?;
        let mime = MimeTable::new();
        let index = if opts.dev {
            None
        } else {
            Some(StaticIndex::build(&root, &opts, &mime)?)
        };
        Ok(Some(Self {
            root,
            opts,
            mime,
            index,
            hook,
        }))
    }

    /// Respond to a request, or decline with `Ok(None)` when no file
    /// matches.
    pub async fn respond(
        &self,
        uri: &Uri,
        request_headers: &HeaderMap,
    ) -> io::Result<Option<Response<Body>>> {
        let pathname = decode_pathname(uri.path());
        let accept = request_headers
            .get(header::ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let candidates = candidate_paths(&pathname, &self.opts, accept);

        let entry = match self.lookup(&candidates) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        // conditional GET
        if self.opts.etag {
            let matched = request_headers
                .get(header::IF_NONE_MATCH)
                .zip(entry.headers.get(header::ETAG))
                .is_some_and(|(inm, etag)| inm == etag);
            if matched {
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::NOT_MODIFIED;
                *response.headers_mut() = entry.headers.clone();
                return Ok(Some(response));
            }
        }

        let mut headers = entry.headers.clone();
        if self.opts.gzip || self.opts.brotli {
            headers.append(header::VARY, HeaderValue::from_static("Accept-Encoding"));
        }
        if let Some(hook) = &self.hook {
            hook(&mut headers, &pathname);
        }

        let range = request_headers
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_range(v, entry.size));

        match range {
            Some(Err(())) => {
                headers.insert(
                    header::CONTENT_RANGE,
                    content_range_unsatisfied(entry.size),
                );
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
                *response.headers_mut() = headers;
                Ok(Some(response))
            }
            Some(Ok((start, end))) => {
                headers.insert(header::CONTENT_RANGE, content_range(start, end, entry.size));
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(end - start + 1));
                headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
                let mut file = File::open(&entry.abs).await?;
                file.seek(io::SeekFrom::Start(start)).await?;
                let mut window = vec![0u8; (end - start + 1) as usize];
                file.read_exact(&mut window).await?;
                let mut response = Response::new(Body::from(window));
                *response.status_mut() = StatusCode::PARTIAL_CONTENT;
                *response.headers_mut() = headers;
                Ok(Some(response))
            }
            None => {
                let file = File::open(&entry.abs).await?;
                let mut response = Response::new(file_body(file));
                *response.headers_mut() = headers;
                Ok(Some(response))
            }
        }
    }

    fn lookup(&self, candidates: &[String]) -> Option<FileEntry> {
        match &self.index {
            Some(index) => candidates.iter().find_map(|c| index.get(c).cloned()),
            None => candidates.iter().find_map(|c| self.probe(c)),
        }
    }

    /// Dev-mode lookup: stat the disk, refusing anything that resolves
    /// outside the root.
    fn probe(&self, candidate: &str) -> Option<FileEntry> {
        if ignored(candidate.trim_start_matches('/'), self.opts.dot_files) {
            return None;
        }
        let abs = normalized_join(&self.root, candidate);
        if !abs.starts_with(&self.root) {
            return None;
        }
        let meta = fs::metadata(&abs).ok()?;
        if !meta.is_file() {
            return None;
        }
        let mtime = meta.modified().ok()?;
        let mut headers = entry_headers(candidate, meta.len(), mtime, self.opts.etag, &self.mime);
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(if self.opts.etag { "no-cache" } else { "no-store" }),
        );
        Some(FileEntry {
            abs,
            size: meta.len(),
            headers,
        })
    }
}

/// Percent-decode, tolerating malformed sequences by keeping the raw path.
fn decode_pathname(path: &str) -> String {
    if !path.contains('%') {
        return path.to_string();
    }
    match urlencoding::decode(path) {
        Ok(Cow::Borrowed(s)) => s.to_string(),
        Ok(Cow::Owned(s)) => s,
        Err(_) => path.to_string(),
    }
}

/// Ordered lookup candidates for a path: per preferred encoding each
/// configured extension plus the bare suffix, then the identity forms,
/// each as `path` and `path/index` variants.
fn candidate_paths(pathname: &str, opts: &StaticOptions, accept: &str) -> Vec<String> {
    let accept = accept.to_ascii_lowercase();
    let mut suffixes: Vec<String> = Vec::new();
    if opts.brotli && accept.contains("br") {
        suffixes.extend(opts.extensions.iter().map(|e| format!("{}.br", e)));
        suffixes.push("br".to_string());
    }
    if opts.gzip && accept.contains("gzip") {
        suffixes.extend(opts.extensions.iter().map(|e| format!("{}.gz", e)));
        suffixes.push("gz".to_string());
    }
    suffixes.push(String::new());
    suffixes.extend(opts.extensions.iter().cloned());

    let base = pathname.strip_suffix('/').unwrap_or(pathname);
    let mut candidates = Vec::with_capacity(suffixes.len() * 2);
    for suffix in &suffixes {
        let ext = if suffix.is_empty() {
            String::new()
        } else {
            format!(".{}", suffix)
        };
        if !base.is_empty() {
            candidates.push(format!("{}{}", base, ext));
        }
        candidates.push(format!("{}/index{}", base, ext));
    }
    candidates
}

/// Chunked streaming body over an open file; nothing is buffered whole.
fn file_body(file: File) -> Body {
    Body::from_stream(stream::try_unfold(file, |mut file| async move {
        let mut chunk = vec![0u8; 64 * 1024];
        let read = file.read(&mut chunk).await?;
        if read == 0 {
            Ok::<_, io::Error>(None)
        } else {
            chunk.truncate(read);
            Ok(Some((Bytes::from(chunk), file)))
        }
    }))
}

/// Parse `bytes=a-b` against the file size.
///
/// `None` means no byte range was requested (unknown range units are
/// ignored, not rejected); `Some(Err(()))` means unsatisfiable (416).
/// Out-of-range starts and ends are both rejected rather than clamped.
fn parse_range(value: &str, size: u64) -> Option<Result<(u64, u64), ()>> {
    let spec = value.trim().strip_prefix("bytes=")?;
    let Some((raw_start, raw_end)) = spec.split_once('-') else {
        return Some(Err(()));
    };
    let start = raw_start.trim().parse::<u64>().unwrap_or(0);
    let end = raw_end
        .trim()
        .parse::<u64>()
        .unwrap_or_else(|_| size.saturating_sub(1));
    if start >= size || end >= size || start > end {
        return Some(Err(()));
    }
    Some(Ok((start, end)))
}

fn content_range(start: u64, end: u64, size: u64) -> HeaderValue {
    HeaderValue::from_str(&format!("bytes {}-{}/{}", start, end, size))
        .unwrap_or_else(|_| HeaderValue::from_static("bytes */0"))
}

fn content_range_unsatisfied(size: u64) -> HeaderValue {
    HeaderValue::from_str(&format!("bytes */{}", size))
        .unwrap_or_else(|_| HeaderValue::from_static("bytes */0"))
}

/// Join a request path onto the root, folding `.` and `..` lexically so
/// escapes are caught by a prefix check.
fn normalized_join(root: &Path, candidate: &str) -> PathBuf {
    let mut joined = root.to_path_buf();
    for component in Path::new(candidate).components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::ParentDir => {
                joined.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    joined
}
