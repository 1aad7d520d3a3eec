//! Mime type and charset detection
//!
//! Detection sniffs the first few KiB of a file against a small magic table,
//! then falls back to text detection. The result is memoized in the entry's
//! scratch cache so the charset field and mime sort keys reuse it.

use crate::entry::{Entry, cache_keys};
use crate::error::ResolveError;
use crate::fs::{FileKind, FileSystem, read_prefix};
use crate::style::{SharedStyle, StyleKind};

pub const MIME_FIELD: &str = "Mime-type";
pub const PARENT_MIME_FIELD: &str = "parent-Mime-type";
pub const CHARSET_FIELD: &str = "Charset";

/// Bytes read for sniffing.
const SNIFF_LIMIT: u64 = 3072;

const OCTET_STREAM: &str = "application/octet-stream";

/// (offset, magic bytes, mime type)
const MAGIC: &[(usize, &[u8], &str)] = &[
    (0, b"\x89PNG\r\n\x1a\n", "image/png"),
    (0, b"\xff\xd8\xff", "image/jpeg"),
    (0, b"GIF87a", "image/gif"),
    (0, b"GIF89a", "image/gif"),
    (0, b"%PDF-", "application/pdf"),
    (0, b"PK\x03\x04", "application/zip"),
    (0, b"\x1f\x8b", "application/gzip"),
    (0, b"BZh", "application/x-bzip2"),
    (0, b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
    (0, b"\xfd7zXZ\x00", "application/x-xz"),
    (0, b"\x7fELF", "application/x-elf"),
    (0, b"\x00asm", "application/wasm"),
    (257, b"ustar", "application/x-tar"),
    (4, b"ftyp", "video/mp4"),
    (0, b"ID3", "audio/mpeg"),
    (0, b"OggS", "audio/ogg"),
    (0, b"fLaC", "audio/flac"),
    (0, b"SQLite format 3\x00", "application/vnd.sqlite3"),
];

/// Detect the mime type of `bytes`, e.g. `image/png` or
/// `text/plain; charset=utf-8`.
pub fn detect(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "text/plain".to_string();
    }
    for (offset, magic, mime) in MAGIC {
        if bytes.len() >= offset + magic.len() && &bytes[*offset..offset + magic.len()] == *magic {
            return (*mime).to_string();
        }
    }
    if let Some(rest) = bytes.strip_prefix(b"\xef\xbb\xbf") {
        return format!("{}; charset=utf-8", text_subtype(rest));
    }
    if bytes.starts_with(b"\xff\xfe") {
        return "text/plain; charset=utf-16le".to_string();
    }
    if bytes.starts_with(b"\xfe\xff") {
        return "text/plain; charset=utf-16be".to_string();
    }
    if bytes.contains(&0) {
        return OCTET_STREAM.to_string();
    }
    match std::str::from_utf8(bytes) {
        Ok(_) => format!("{}; charset=utf-8", text_subtype(bytes)),
        // A multi-byte sequence cut by the sniff limit is still UTF-8.
        Err(e) if e.error_len().is_none() => {
            format!("{}; charset=utf-8", text_subtype(bytes))
        }
        Err(_) if bytes.iter().all(|b| !b.is_ascii_control() || b.is_ascii_whitespace()) => {
            "text/plain; charset=iso-8859-1".to_string()
        }
        Err(_) => OCTET_STREAM.to_string(),
    }
}

fn text_subtype(bytes: &[u8]) -> &'static str {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
    let trimmed = head.trim_start().to_ascii_lowercase();
    if trimmed.starts_with("#!") {
        if trimmed.contains("python") {
            "text/x-python"
        } else if trimmed.contains("sh") {
            "text/x-shellscript"
        } else {
            "text/plain"
        }
    } else if trimmed.starts_with("<?xml") {
        "text/xml"
    } else if trimmed.starts_with("<!doctype html") || trimmed.starts_with("<html") {
        "text/html"
    } else if trimmed.starts_with('{') || trimmed.starts_with('[') {
        "application/json"
    } else {
        "text/plain"
    }
}

/// Detect the mime type of `entry` once and store it (and its charset, when
/// present) in the scratch cache.
pub fn detect_into_cache(entry: &mut Entry, fs: &dyn FileSystem) -> Result<String, ResolveError> {
    if let Some(mime) = entry.cache_str(cache_keys::MIME) {
        return Ok(mime.to_string());
    }
    let full = match entry.stat.kind {
        FileKind::Dir => "directory".to_string(),
        FileKind::Symlink => "symlink".to_string(),
        FileKind::Pipe => "named_pipe".to_string(),
        FileKind::Socket => "socket".to_string(),
        FileKind::BlockDevice | FileKind::CharDevice => "device".to_string(),
        _ => detect(&read_prefix(fs, &entry.path, SNIFF_LIMIT)?),
    };
    let (mime, charset) = match full.split_once(';') {
        Some((mime, params)) => (
            mime.trim().to_string(),
            params
                .trim()
                .strip_prefix("charset=")
                .map(|c| c.to_string()),
        ),
        None => (full, None),
    };
    entry.set_cache(cache_keys::MIME, mime.clone());
    if let Some(charset) = charset {
        entry.set_cache(cache_keys::CHARSET, charset);
    }
    Ok(mime)
}

/// Top-level type of a mime string: `image/png` → `image`.
pub fn parent_type(mime: &str) -> &str {
    mime.split('/').next().unwrap_or(mime)
}

pub struct MimeResolver {
    style: SharedStyle,
    parent_only: bool,
}

impl MimeResolver {
    pub fn new(style: SharedStyle) -> Self {
        Self {
            style,
            parent_only: false,
        }
    }

    /// Render only the top-level type.
    pub fn parent_only(mut self, parent_only: bool) -> Self {
        self.parent_only = parent_only;
        self
    }
}

impl super::Resolver for MimeResolver {
    fn field(&self) -> &str {
        if self.parent_only {
            PARENT_MIME_FIELD
        } else {
            MIME_FIELD
        }
    }

    fn resolve(&self, entry: &mut Entry, fs: &dyn FileSystem) -> Result<String, ResolveError> {
        let mime = detect_into_cache(entry, fs)?;
        let shown = if self.parent_only {
            parent_type(&mime)
        } else {
            &mime
        };
        Ok(self.style.paint(StyleKind::Mime, shown))
    }
}

/// Reuses mime detection from the cache when a `MimeResolver` ran first.
pub struct CharsetResolver {
    style: SharedStyle,
}

impl CharsetResolver {
    pub fn new(style: SharedStyle) -> Self {
        Self { style }
    }
}

impl super::Resolver for CharsetResolver {
    fn field(&self) -> &str {
        CHARSET_FIELD
    }

    fn resolve(&self, entry: &mut Entry, fs: &dyn FileSystem) -> Result<String, ResolveError> {
        if !entry.stat.is_file() {
            return Err(ResolveError::Unavailable);
        }
        if entry.cache_str(cache_keys::MIME).is_none() {
            detect_into_cache(entry, fs)?;
        }
        let charset = entry
            .cache_str(cache_keys::CHARSET)
            .ok_or(ResolveError::Unavailable)?;
        Ok(self.style.paint(StyleKind::Charset, charset))
    }
}
