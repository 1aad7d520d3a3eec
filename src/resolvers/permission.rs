//! Permission string and octal mode fields

use crate::entry::Entry;
use crate::error::ResolveError;
use crate::fs::FileSystem;
use crate::style::{SharedStyle, StyleKind};

pub const PERMISSIONS_FIELD: &str = "Permissions";
pub const OCTAL_FIELD: &str = "Octal";

/// `ls -l` style mode string, e.g. `drwxr-xr-x` or `.rwsr-x--T`.
pub fn mode_string(entry: &Entry) -> String {
    let mode = entry.stat.mode;
    let mut out = String::with_capacity(10);
    out.push(entry.stat.kind.mode_char());

    // (read, write, exec, special bit, special char)
    let triads = [
        (0o400, 0o200, 0o100, 0o4000, 's'),
        (0o040, 0o020, 0o010, 0o2000, 's'),
        (0o004, 0o002, 0o001, 0o1000, 't'),
    ];
    for (r, w, x, special, ch) in triads {
        out.push(if mode & r != 0 { 'r' } else { '-' });
        out.push(if mode & w != 0 { 'w' } else { '-' });
        out.push(match (mode & x != 0, mode & special != 0) {
            (true, true) => ch,
            (false, true) => ch.to_ascii_uppercase(),
            (true, false) => 'x',
            (false, false) => '-',
        });
    }
    out
}

pub struct PermissionResolver {
    style: SharedStyle,
}

impl PermissionResolver {
    pub fn new(style: SharedStyle) -> Self {
        Self { style }
    }
}

impl super::Resolver for PermissionResolver {
    fn field(&self) -> &str {
        PERMISSIONS_FIELD
    }

    fn resolve(&self, entry: &mut Entry, _fs: &dyn FileSystem) -> Result<String, ResolveError> {
        Ok(self
            .style
            .paint(StyleKind::Permissions, &mode_string(entry)))
    }
}

pub struct OctalResolver {
    style: SharedStyle,
}

impl OctalResolver {
    pub fn new(style: SharedStyle) -> Self {
        Self { style }
    }
}

impl super::Resolver for OctalResolver {
    fn field(&self) -> &str {
        OCTAL_FIELD
    }

    fn resolve(&self, entry: &mut Entry, _fs: &dyn FileSystem) -> Result<String, ResolveError> {
        let text = format!("{:04o}", entry.stat.mode & 0o7777);
        Ok(self.style.paint(StyleKind::Permissions, &text))
    }
}
