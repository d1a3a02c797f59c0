//! Extension to content-type resolution.
//!
//! # Design Decisions
//! - One immutable table per static server, built at construction and
//!   passed by reference; no process-global registry
//! - Local overrides win over the mime_guess database
//! - `text/html` always carries an explicit utf-8 charset

use std::collections::HashMap;

/// Immutable extension → content-type table.
#[derive(Debug)]
pub struct MimeTable {
    overrides: HashMap<&'static str, &'static str>,
}

impl MimeTable {
    /// Build the table with the gateway's extra registrations.
    pub fn new() -> Self {
        let mut overrides = HashMap::new();
        // the modern registration; mime_guess still says application/javascript
        overrides.insert("js", "text/javascript");
        overrides.insert("mjs", "text/javascript");
        overrides.insert("avif", "image/avif");
        overrides.insert("webmanifest", "application/manifest+json");
        overrides.insert("md", "text/markdown");
        overrides.insert("map", "application/json");
        Self { overrides }
    }

    /// Content type for a file name, `None` when the extension is unknown.
    ///
    /// Callers strip any `.gz`/`.br` encoding suffix before asking.
    pub fn content_type(&self, name: &str) -> Option<String> {
        let ext = name.rsplit_once('.').map(|(_, ext)| ext)?;
        let base = self
            .overrides
            .get(ext)
            .copied()
            .or_else(|| mime_guess::from_ext(ext).first_raw())?;
        if base == "text/html" {
            Some(format!("{};charset=utf-8", base))
        } else {
            Some(base.to_string())
        }
    }
}

impl Default for MimeTable {
    fn default() -> Self {
        Self::new()
    }
}
