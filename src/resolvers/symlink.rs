//! Symlink target annotations

use crate::entry::Entry;
use crate::fs::FileSystem;
use crate::style::{SharedStyle, StyleKind};

/// Appends `-> target` beneath every symlink. Broken links are marked.
pub struct SymlinkTargetAnnotator {
    style: SharedStyle,
}

impl SymlinkTargetAnnotator {
    pub fn new(style: SharedStyle) -> Self {
        Self { style }
    }
}

impl super::Collector for SymlinkTargetAnnotator {
    fn name(&self) -> &'static str {
        "symlink-target"
    }

    fn collect(&self, entry: &mut Entry, fs: &dyn FileSystem) {
        if !entry.stat.is_symlink() {
            return;
        }
        let line = match fs.read_link(&entry.path) {
            Ok(target) => {
                let resolved = match entry.path.parent() {
                    Some(dir) if target.is_relative() => dir.join(&target),
                    _ => target.clone(),
                };
                let shown = target.to_string_lossy();
                if fs.stat(&resolved).is_ok() {
                    format!("-> {}", self.style.paint(StyleKind::Symlink, &shown))
                } else {
                    format!("-> {} [broken]", self.style.paint(StyleKind::Annotation, &shown))
                }
            }
            Err(e) => format!("-> ? ({e})"),
        };
        entry.annotations.push(line);
    }
}
