//! JSON output
//!
//! Each entry becomes an object whose keys are its field names in display
//! order. Tree mode nests children under `"children"`.

use std::io::Write;

use serde::Serialize;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};

use crate::entry::Entry;
use crate::error::Result;
use crate::tree::Tree;

struct JsonEntry<'a> {
    entry: &'a Entry,
    children: Option<JsonChildren<'a>>,
}

impl Serialize for JsonEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.entry.fields_by_order();
        let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
        for field in fields {
            map.serialize_entry(&field.name, &field.value)?;
        }
        if let Some(children) = &self.children {
            map.serialize_entry("children", children)?;
        }
        map.end()
    }
}

struct JsonChildren<'a> {
    entries: &'a [Entry],
    tree: &'a Tree,
    node: usize,
}

impl Serialize for JsonChildren<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let children = &self.tree.node(self.node).children;
        let mut seq = serializer.serialize_seq(Some(children.len()))?;
        for &child in children {
            seq.serialize_element(&node_json(self.entries, self.tree, child))?;
        }
        seq.end()
    }
}

fn node_json<'a>(entries: &'a [Entry], tree: &'a Tree, node: usize) -> JsonEntry<'a> {
    let has_children = !tree.node(node).children.is_empty();
    JsonEntry {
        entry: &entries[tree.node(node).entry],
        children: has_children.then_some(JsonChildren {
            entries,
            tree,
            node,
        }),
    }
}

struct JsonEntries<'a> {
    entries: &'a [Entry],
    tree: Option<&'a Tree>,
}

impl Serialize for JsonEntries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.tree {
            Some(tree) => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(&node_json(self.entries, tree, Tree::ROOT))?;
                seq.end()
            }
            None => {
                let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
                for entry in self.entries {
                    seq.serialize_element(&JsonEntry {
                        entry,
                        children: None,
                    })?;
                }
                seq.end()
            }
        }
    }
}

/// One listed root.
#[derive(Serialize)]
pub struct JsonListing<'a> {
    pub root: String,
    entries: JsonEntries<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<Vec<String>>,
}

impl<'a> JsonListing<'a> {
    pub fn new(root: String, entries: &'a [Entry], tree: Option<&'a Tree>) -> Self {
        Self {
            root,
            entries: JsonEntries { entries, tree },
            total: None,
            duplicates: Vec::new(),
        }
    }
}

/// Print all listings as one pretty-printed JSON array.
pub fn write_json<W: Write>(out: &mut W, listings: &[JsonListing<'_>]) -> Result<()> {
    let json = serde_json::to_string_pretty(listings)?;
    writeln!(out, "{json}")?;
    Ok(())
}
