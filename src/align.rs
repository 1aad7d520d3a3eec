//! Column alignment
//!
//! Pads the values of alignable fields so that every entry of a batch renders
//! them at the same display width. Widths ignore ANSI escape sequences, so
//! styled and plain values line up the same way.

use std::collections::{BTreeMap, HashSet};

use unicode_width::UnicodeWidthStr;

use crate::entry::{Entry, NAME_FIELD};
use crate::resolvers::git::GIT_FIELD;
use crate::resolvers::mime::{CHARSET_FIELD, MIME_FIELD, PARENT_MIME_FIELD};
use crate::resolvers::owner::{GROUP_FIELD, GROUP_UID_FIELD, OWNER_FIELD, OWNER_UID_FIELD};
use crate::resolvers::permission::{OCTAL_FIELD, PERMISSIONS_FIELD};
use crate::resolvers::size::SIZE_FIELD;
use crate::resolvers::stat::{BLOCKS_FIELD, INODE_FIELD, LINK_FIELD};

/// Which fields get padded, and from which side.
#[derive(Debug, Clone)]
pub struct AlignConfig {
    alignable: HashSet<String>,
    /// Families of dynamically named fields, e.g. `Sum(md5)` or `Time Modified`.
    prefixes: Vec<String>,
    left: HashSet<String>,
}

impl Default for AlignConfig {
    fn default() -> Self {
        let mut config = Self::empty();
        for name in [
            SIZE_FIELD,
            OWNER_UID_FIELD,
            GROUP_UID_FIELD,
            OCTAL_FIELD,
            BLOCKS_FIELD,
            INODE_FIELD,
            LINK_FIELD,
        ] {
            config.register(name);
        }
        for name in [
            OWNER_FIELD,
            GROUP_FIELD,
            PERMISSIONS_FIELD,
            MIME_FIELD,
            PARENT_MIME_FIELD,
            CHARSET_FIELD,
            GIT_FIELD,
        ] {
            config.register_left(name);
        }
        for prefix in ["Sum(", "Time ", "Relative-Time "] {
            config.register_prefix(prefix);
        }
        config
    }
}

impl AlignConfig {
    /// A registry that aligns nothing.
    pub fn empty() -> Self {
        Self {
            alignable: HashSet::new(),
            prefixes: Vec::new(),
            left: HashSet::new(),
        }
    }

    /// Right-align `name`.
    pub fn register(&mut self, name: &str) -> &mut Self {
        if name != NAME_FIELD {
            self.alignable.insert(name.to_string());
        }
        self
    }

    /// Left-align `name`, padding after the value.
    pub fn register_left(&mut self, name: &str) -> &mut Self {
        if name != NAME_FIELD {
            self.alignable.insert(name.to_string());
            self.left.insert(name.to_string());
        }
        self
    }

    /// Right-align every field whose name starts with `prefix`.
    pub fn register_prefix(&mut self, prefix: &str) -> &mut Self {
        self.prefixes.push(prefix.to_string());
        self
    }

    pub fn is_alignable(&self, name: &str) -> bool {
        name != NAME_FIELD
            && (self.alignable.contains(name) || self.prefixes.iter().any(|p| name.starts_with(p)))
    }

    pub fn is_left(&self, name: &str) -> bool {
        self.left.contains(name)
    }
}

/// Terminal width of `s` with escape sequences removed.
pub fn display_width(s: &str) -> usize {
    if s.contains('\x1b') {
        strip_ansi_escapes::strip_str(s).width()
    } else {
        s.width()
    }
}

fn pad(value: &str, width: usize, left: bool) -> String {
    let fill = width.saturating_sub(display_width(value));
    if fill == 0 {
        return value.to_string();
    }
    if left {
        format!("{value}{}", " ".repeat(fill))
    } else {
        format!("{}{value}", " ".repeat(fill))
    }
}

/// Final display width of each aligned field in a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidthTable {
    widths: BTreeMap<String, usize>,
}

impl WidthTable {
    pub fn width(&self, name: &str) -> Option<usize> {
        self.widths.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    /// Padded titles for the given field names, in that order.
    ///
    /// A title wider than every value of its field widens the field: all
    /// entries are re-padded to the title width and the table is updated.
    pub fn header_row(
        &mut self,
        entries: &mut [Entry],
        config: &AlignConfig,
        names: &[String],
    ) -> Vec<String> {
        names
            .iter()
            .map(|name| {
                let Some(width) = self.width(name) else {
                    return name.clone();
                };
                let left = config.is_left(name);
                let title_width = display_width(name);
                if title_width > width {
                    for entry in entries.iter_mut() {
                        if let Some(field) = entry.field_mut(name) {
                            field.value = pad(&field.value, title_width, left);
                        }
                    }
                    self.widths.insert(name.clone(), title_width);
                    name.clone()
                } else {
                    pad(name, width, left)
                }
            })
            .collect()
    }
}

/// Pad every alignable field of `entries` to the widest value of that field.
pub fn align_batch(entries: &mut [Entry], config: &AlignConfig) -> WidthTable {
    let mut widths: BTreeMap<String, usize> = BTreeMap::new();
    for entry in entries.iter() {
        for field in entry.fields() {
            if !config.is_alignable(&field.name) {
                continue;
            }
            let w = display_width(&field.value);
            widths
                .entry(field.name.clone())
                .and_modify(|max| *max = (*max).max(w))
                .or_insert(w);
        }
    }

    for entry in entries.iter_mut() {
        for (name, &width) in &widths {
            let left = config.is_left(name);
            if let Some(field) = entry.field_mut(name) {
                field.value = pad(&field.value, width, left);
            }
        }
    }

    tracing::debug!(fields = widths.len(), entries = entries.len(), "aligned batch");
    WidthTable { widths }
}
