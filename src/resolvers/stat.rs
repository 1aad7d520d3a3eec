//! Fields read straight from stat data: inode, hard links, blocks

use crate::entry::Entry;
use crate::error::ResolveError;
use crate::fs::FileSystem;
use crate::style::{SharedStyle, StyleKind};

pub const INODE_FIELD: &str = "Inode";
pub const LINK_FIELD: &str = "Link";
pub const BLOCKS_FIELD: &str = "Blocks";

pub struct InodeResolver {
    style: SharedStyle,
}

impl InodeResolver {
    pub fn new(style: SharedStyle) -> Self {
        Self { style }
    }
}

impl super::Resolver for InodeResolver {
    fn field(&self) -> &str {
        INODE_FIELD
    }

    fn resolve(&self, entry: &mut Entry, _fs: &dyn FileSystem) -> Result<String, ResolveError> {
        Ok(self
            .style
            .paint(StyleKind::Inode, &entry.stat.inode.to_string()))
    }
}

/// Number of hard links.
pub struct LinkResolver {
    style: SharedStyle,
}

impl LinkResolver {
    pub fn new(style: SharedStyle) -> Self {
        Self { style }
    }
}

impl super::Resolver for LinkResolver {
    fn field(&self) -> &str {
        LINK_FIELD
    }

    fn resolve(&self, entry: &mut Entry, _fs: &dyn FileSystem) -> Result<String, ResolveError> {
        Ok(self
            .style
            .paint(StyleKind::Link, &entry.stat.nlink.to_string()))
    }
}

pub struct BlocksResolver {
    style: SharedStyle,
}

impl BlocksResolver {
    pub fn new(style: SharedStyle) -> Self {
        Self { style }
    }
}

impl super::Resolver for BlocksResolver {
    fn field(&self) -> &str {
        BLOCKS_FIELD
    }

    fn resolve(&self, entry: &mut Entry, _fs: &dyn FileSystem) -> Result<String, ResolveError> {
        if entry.stat.blocks == 0 {
            return Err(ResolveError::Unavailable);
        }
        Ok(self
            .style
            .paint(StyleKind::Blocks, &entry.stat.blocks.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{NativeFs, Stat};
    use crate::resolvers::Resolver;
    use crate::style::Plain;
    use std::sync::Arc;

    #[test]
    fn test_stat_fields() {
        let mut e = Entry::new(
            "/a",
            Stat {
                inode: 1234,
                nlink: 3,
                blocks: 8,
                ..Default::default()
            },
        );
        let style = Arc::new(Plain);
        assert_eq!(
            InodeResolver::new(style.clone())
                .resolve(&mut e, &NativeFs)
                .unwrap(),
            "1234"
        );
        assert_eq!(
            LinkResolver::new(style.clone())
                .resolve(&mut e, &NativeFs)
                .unwrap(),
            "3"
        );
        assert_eq!(
            BlocksResolver::new(style).resolve(&mut e, &NativeFs).unwrap(),
            "8"
        );
    }

    #[test]
    fn test_zero_blocks_unavailable() {
        let mut e = Entry::new("/a", Stat::default());
        let err = BlocksResolver::new(Arc::new(Plain))
            .resolve(&mut e, &NativeFs)
            .unwrap_err();
        assert_eq!(err.sentinel(), "-");
    }
}
