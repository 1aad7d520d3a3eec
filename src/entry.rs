//! Entry model: one filesystem object and the attributes computed for it

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::fs::{FileSystem, Stat};

/// Scratch cache keys shared between resolvers, sort prerequisites and
/// collectors. Each key lists its producer and its consumers.
pub mod cache_keys {
    /// Produced by `MimeResolver` and the mime sort prerequisite.
    /// Read by `CharsetResolver` and the mime sort keys.
    pub const MIME: &str = "mime";
    /// Produced by `MimeResolver` when the detected type carries a charset.
    /// Read by `CharsetResolver`.
    pub const CHARSET: &str = "charset";
    /// Produced by the recursive-size sort prerequisite.
    /// Read by `SizeResolver` in recursive mode and the recursive-size sort key.
    pub const RECURSIVE_SIZE: &str = "recursive_size";
    /// Hex sha256 of the whole file. Produced by `ChecksumResolver` when
    /// sha256 is selected. Read by `DuplicateDetector` in thorough mode.
    pub const SHA256: &str = "sha256";
}

/// Name of the field every listing ends with. Never padded by alignment.
pub const NAME_FIELD: &str = "Name";

/// One rendered attribute of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    /// Registration index of the resolver that produced the field.
    #[serde(skip)]
    pub order: usize,
}

/// A filesystem object snapshot plus its ordered attribute map.
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: PathBuf,
    pub name: String,
    pub stat: Stat,
    /// Cross-resolver memoization, see [`cache_keys`].
    pub cache: HashMap<String, Vec<u8>>,
    fields: Vec<Field>,
    /// Directory this entry was found in (recursive and tree modes).
    pub parent: Option<PathBuf>,
    /// Distance from the listing root; the root itself is 0.
    pub depth: Option<usize>,
    /// Extra lines printed beneath the entry.
    pub annotations: Vec<String>,
}

impl Entry {
    pub fn new(path: impl Into<PathBuf>, stat: Stat) -> Self {
        let path = path.into();
        let name = display_name(&path);
        Self {
            path,
            name,
            stat,
            cache: HashMap::new(),
            fields: Vec::new(),
            parent: None,
            depth: None,
            annotations: Vec::new(),
        }
    }

    /// Single-stat lookup.
    pub fn from_path(fs: &dyn FileSystem, path: &Path) -> io::Result<Self> {
        let stat = fs.stat(path)?;
        Ok(Self::new(path, stat))
    }

    /// Tag the entry with its position in a walked tree.
    pub fn with_position(mut self, parent: Option<PathBuf>, depth: usize) -> Self {
        self.parent = parent;
        self.depth = Some(depth);
        self
    }

    pub fn is_dir(&self) -> bool {
        self.stat.is_dir()
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.') && self.name != "." && self.name != ".."
    }

    /// Extension of the base name including the leading dot, or "".
    pub fn extension(&self) -> &str {
        match self.name.rfind('.') {
            Some(0) | None => "",
            Some(i) => &self.name[i..],
        }
    }

    /// Set a field, replacing the value of an existing field of the same name.
    pub fn set_field(&mut self, name: &str, value: String, order: usize) {
        if let Some(field) = self.fields.iter_mut().find(|f| f.name == name) {
            field.value = value;
            field.order = order;
        } else {
            self.fields.push(Field {
                name: name.to_string(),
                value,
                order,
            });
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value.as_str())
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Fields sorted by the order index of their producer.
    pub fn fields_by_order(&self) -> Vec<&Field> {
        let mut fields: Vec<&Field> = self.fields.iter().collect();
        fields.sort_by_key(|f| f.order);
        fields
    }

    pub fn field_names_by_order(&self) -> Vec<String> {
        self.fields_by_order()
            .into_iter()
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn cache_str(&self, key: &str) -> Option<&str> {
        self.cache.get(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn cache_u64(&self, key: &str) -> Option<u64> {
        self.cache_str(key).and_then(|s| s.parse().ok())
    }

    pub fn set_cache(&mut self, key: &str, value: impl Into<Vec<u8>>) {
        self.cache.insert(key.to_string(), value.into());
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
