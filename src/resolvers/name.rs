//! Name field

use crate::entry::{Entry, NAME_FIELD};
use crate::error::ResolveError;
use crate::fs::{FileKind, FileSystem};
use crate::style::{SharedStyle, StyleKind};

/// Renders the entry name, optionally as a full path and with a type
/// indicator (`/`, `*`, `@`, `|`, `=`) appended.
pub struct NameResolver {
    style: SharedStyle,
    classify: bool,
    full_path: bool,
}

impl NameResolver {
    pub fn new(style: SharedStyle) -> Self {
        Self {
            style,
            classify: false,
            full_path: false,
        }
    }

    pub fn with_classify(mut self, classify: bool) -> Self {
        self.classify = classify;
        self
    }

    pub fn with_full_path(mut self, full_path: bool) -> Self {
        self.full_path = full_path;
        self
    }
}

fn style_kind(entry: &Entry) -> StyleKind {
    match entry.stat.kind {
        FileKind::Dir => StyleKind::Dir,
        FileKind::Symlink => StyleKind::Symlink,
        FileKind::File if entry.stat.is_executable() => StyleKind::Executable,
        FileKind::File => StyleKind::File,
        _ => StyleKind::Special,
    }
}

fn indicator(entry: &Entry) -> &'static str {
    match entry.stat.kind {
        FileKind::Dir => "/",
        FileKind::Symlink => "@",
        FileKind::Pipe => "|",
        FileKind::Socket => "=",
        FileKind::File if entry.stat.is_executable() => "*",
        _ => "",
    }
}

impl super::Resolver for NameResolver {
    fn field(&self) -> &str {
        NAME_FIELD
    }

    fn resolve(&self, entry: &mut Entry, _fs: &dyn FileSystem) -> Result<String, ResolveError> {
        let text = if self.full_path {
            entry.path.to_string_lossy().to_string()
        } else {
            entry.name.clone()
        };
        let mut rendered = self.style.paint(style_kind(entry), &text);
        if self.classify {
            rendered.push_str(indicator(entry));
        }
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{NativeFs, Stat};
    use crate::resolvers::Resolver;
    use crate::style::Plain;
    use std::sync::Arc;

    fn entry(kind: FileKind, mode: u32) -> Entry {
        Entry::new(
            "/tmp/x/thing",
            Stat {
                kind,
                mode,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_plain_name() {
        let r = NameResolver::new(Arc::new(Plain));
        let mut e = entry(FileKind::File, 0o644);
        assert_eq!(r.resolve(&mut e, &NativeFs).unwrap(), "thing");
    }

    #[test]
    fn test_classify_indicators() {
        let r = NameResolver::new(Arc::new(Plain)).with_classify(true);
        let cases = [
            (FileKind::Dir, 0o755, "thing/"),
            (FileKind::File, 0o755, "thing*"),
            (FileKind::File, 0o644, "thing"),
            (FileKind::Symlink, 0o777, "thing@"),
            (FileKind::Pipe, 0o644, "thing|"),
        ];
        for (kind, mode, expected) in cases {
            let mut e = entry(kind, mode);
            assert_eq!(r.resolve(&mut e, &NativeFs).unwrap(), expected);
        }
    }

    #[test]
    fn test_full_path() {
        let r = NameResolver::new(Arc::new(Plain)).with_full_path(true);
        let mut e = entry(FileKind::File, 0o644);
        assert_eq!(r.resolve(&mut e, &NativeFs).unwrap(), "/tmp/x/thing");
    }
}
