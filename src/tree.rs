//! Tree assembly from a flat, depth-tagged batch

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::entry::Entry;
use crate::error::{AssembleError, ConfigError};

/// One column of a node's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    /// Non-last sibling.
    Tee,
    /// Last sibling.
    Corner,
    /// A non-last ancestor at this depth has more siblings below.
    Continuation,
    Blank,
}

/// Glyphs used to draw connectors.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GlyphSet {
    pub tee: String,
    pub corner: String,
    pub continuation: String,
    pub blank: String,
}

impl GlyphSet {
    pub fn unicode() -> Self {
        Self::custom("├── ", "╰── ", "│   ", "    ")
    }

    pub fn rectangle() -> Self {
        Self::custom("├── ", "└── ", "│   ", "    ")
    }

    pub fn ascii() -> Self {
        Self::custom("|---- ", "|---- ", "|     ", "      ")
    }

    pub fn custom(tee: &str, corner: &str, continuation: &str, blank: &str) -> Self {
        Self {
            tee: tee.to_string(),
            corner: corner.to_string(),
            continuation: continuation.to_string(),
            blank: blank.to_string(),
        }
    }

    pub fn glyph(&self, connector: Connector) -> &str {
        match connector {
            Connector::Tee => &self.tee,
            Connector::Corner => &self.corner,
            Connector::Continuation => &self.continuation,
            Connector::Blank => &self.blank,
        }
    }

    /// Render a full connector vector.
    pub fn prefix(&self, connectors: &[Connector]) -> String {
        connectors.iter().map(|&c| self.glyph(c)).collect()
    }

    /// Prefix for annotation lines beneath a node: its own slot becomes a
    /// continuation (more siblings follow) or blank.
    pub fn annotation_prefix(&self, connectors: &[Connector]) -> String {
        connectors
            .iter()
            .map(|&c| match c {
                Connector::Tee => self.glyph(Connector::Continuation),
                Connector::Corner => self.glyph(Connector::Blank),
                other => self.glyph(other),
            })
            .collect()
    }
}

impl Default for GlyphSet {
    fn default() -> Self {
        Self::unicode()
    }
}

impl FromStr for GlyphSet {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unicode" => Ok(Self::unicode()),
            "ascii" => Ok(Self::ascii()),
            "rectangle" => Ok(Self::rectangle()),
            _ => Err(ConfigError::UnknownTreeStyle(s.to_string())),
        }
    }
}

/// Arena node. Indices refer to [`Tree::nodes`] and the assembled batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// One slot per depth level; empty for the root.
    pub connectors: Vec<Connector>,
    /// Index of the entry in the batch.
    pub entry: usize,
}

impl Node {
    pub fn depth(&self) -> usize {
        self.connectors.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub const ROOT: usize = 0;

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn root(&self) -> &Node {
        &self.nodes[Self::ROOT]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node indices in depth-first pre-order, children in batch order.
    pub fn pre_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![Self::ROOT];
        while let Some(index) = stack.pop() {
            order.push(index);
            stack.extend(self.nodes[index].children.iter().rev());
        }
        order
    }

    fn set_subtree_slot(&mut self, index: usize, slot: usize, connector: Connector) {
        let mut stack = self.nodes[index].children.clone();
        while let Some(child) = stack.pop() {
            self.nodes[child].connectors[slot] = connector;
            stack.extend(self.nodes[child].children.iter().copied());
        }
    }
}

/// Build the connector-decorated tree for a resolved batch.
///
/// The single depth-0 entry is the root; every other entry must name a parent
/// one level above it. Sibling order follows batch order.
pub fn assemble(entries: &[Entry]) -> Result<Tree, AssembleError> {
    let mut levels: Vec<Vec<usize>> = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let depth = entry.depth.unwrap_or(0);
        if levels.len() <= depth {
            levels.resize_with(depth + 1, Vec::new);
        }
        levels[depth].push(i);
    }

    let roots = levels.first().map_or(0, Vec::len);
    match roots {
        0 => return Err(AssembleError::MissingRoot),
        1 => {}
        n => return Err(AssembleError::MultipleRoots(n)),
    }

    let root_entry = levels[0][0];
    let mut tree = Tree {
        nodes: vec![Node {
            parent: None,
            children: Vec::new(),
            connectors: Vec::new(),
            entry: root_entry,
        }],
    };
    let mut by_path: HashMap<&Path, usize> = HashMap::new();
    by_path.insert(entries[root_entry].path.as_path(), Tree::ROOT);

    for (depth, level) in levels.iter().enumerate().skip(1) {
        let mut registered = Vec::with_capacity(level.len());
        for &i in level {
            let entry = &entries[i];
            let parent = entry
                .parent
                .as_deref()
                .and_then(|p| by_path.get(p).copied())
                .filter(|&p| tree.nodes[p].depth() + 1 == depth)
                .ok_or_else(|| AssembleError::Orphan {
                    path: entry.path.clone(),
                    parent: entry.parent.clone().unwrap_or_else(PathBuf::new),
                })?;
            let index = tree.nodes.len();
            tree.nodes.push(Node {
                parent: Some(parent),
                children: Vec::new(),
                connectors: vec![Connector::Blank; depth],
                entry: i,
            });
            tree.nodes[parent].children.push(index);
            registered.push((entry.path.as_path(), index));
        }
        by_path.extend(registered);
    }

    let parents: Vec<usize> = (0..tree.nodes.len()).collect();
    for parent in parents {
        let children = tree.nodes[parent].children.clone();
        let last = children.len().saturating_sub(1);
        for (position, child) in children.into_iter().enumerate() {
            let slot = tree.nodes[child].depth() - 1;
            let (own, below) = if position == last {
                (Connector::Corner, Connector::Blank)
            } else {
                (Connector::Tee, Connector::Continuation)
            };
            tree.nodes[child].connectors[slot] = own;
            tree.set_subtree_slot(child, slot, below);
        }
    }

    tracing::debug!(nodes = tree.len(), depth = levels.len() - 1, "assembled tree");
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryFs;

    fn tagged(fs: &MemoryFs, path: &str, parent: Option<&str>, depth: usize) -> Entry {
        Entry::from_path(fs, Path::new(path))
            .unwrap()
            .with_position(parent.map(PathBuf::from), depth)
    }

    fn fixture() -> Vec<Entry> {
        let fs = MemoryFs::new();
        fs.add_file("/root/a/c", "");
        fs.add_file("/root/b", "");
        vec![
            tagged(&fs, "/root", None, 0),
            tagged(&fs, "/root/a", Some("/root"), 1),
            tagged(&fs, "/root/a/c", Some("/root/a"), 2),
            tagged(&fs, "/root/b", Some("/root"), 1),
        ]
    }

    #[test]
    fn test_fixture_shape() {
        let entries = fixture();
        let tree = assemble(&entries).unwrap();

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.root().entry, 0);
        let depth_one: Vec<_> = tree.nodes().iter().filter(|n| n.depth() == 1).collect();
        let depth_two: Vec<_> = tree.nodes().iter().filter(|n| n.depth() == 2).collect();
        assert_eq!(depth_one.len(), 2);
        assert_eq!(depth_two.len(), 1);

        for node in tree.nodes() {
            let corners = node
                .children
                .iter()
                .filter(|&&c| {
                    let child = tree.node(c);
                    child.connectors[child.depth() - 1] == Connector::Corner
                })
                .count();
            assert_eq!(corners, usize::from(!node.children.is_empty()));
        }
    }

    #[test]
    fn test_connectors_propagate() {
        let entries = fixture();
        let tree = assemble(&entries).unwrap();
        let order: Vec<usize> = tree.pre_order().iter().map(|&i| tree.node(i).entry).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);

        let c = tree.nodes().iter().find(|n| n.entry == 2).unwrap();
        assert_eq!(c.connectors, vec![Connector::Continuation, Connector::Corner]);
        let b = tree.nodes().iter().find(|n| n.entry == 3).unwrap();
        assert_eq!(b.connectors, vec![Connector::Corner]);

        let glyphs = GlyphSet::rectangle();
        assert_eq!(glyphs.prefix(&c.connectors), "│   └── ");
        assert_eq!(glyphs.annotation_prefix(&b.connectors), "    ");
    }

    #[test]
    fn test_missing_and_multiple_roots() {
        let mut entries = fixture();
        assert_eq!(
            assemble(&entries[1..]).unwrap_err(),
            AssembleError::MissingRoot
        );
        entries[3].depth = Some(0);
        assert_eq!(
            assemble(&entries).unwrap_err(),
            AssembleError::MultipleRoots(2)
        );
    }

    #[test]
    fn test_orphan() {
        let mut entries = fixture();
        entries[2].parent = Some(PathBuf::from("/elsewhere"));
        assert!(matches!(
            assemble(&entries),
            Err(AssembleError::Orphan { .. })
        ));
    }

    #[test]
    fn test_glyph_styles() {
        assert_eq!("ASCII".parse::<GlyphSet>().unwrap(), GlyphSet::ascii());
        assert_eq!(GlyphSet::default().corner, "╰── ");
        assert!(matches!(
            "fancy".parse::<GlyphSet>(),
            Err(ConfigError::UnknownTreeStyle(_))
        ));
    }
}
