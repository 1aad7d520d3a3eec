//! Opaque `styleText(kind, value)` function handed to resolvers
//!
//! Resolvers wrap their rendered values through a [`Style`]; the rest of the
//! pipeline never interprets the escape codes it produces.

use std::io::Write;
use std::sync::Arc;

use termcolor::{Ansi, Color, ColorSpec, WriteColor};

/// What a rendered value represents, used to pick its color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleKind {
    Dir,
    File,
    Executable,
    Symlink,
    Special,
    Size,
    Blocks,
    Owner,
    Group,
    Permissions,
    Time,
    Mime,
    Charset,
    Checksum,
    Inode,
    Link,
    GitStatus,
    Annotation,
    Faint,
    /// Header and footer titles.
    Header,
}

impl StyleKind {
    pub fn color_spec(self) -> ColorSpec {
        let mut spec = ColorSpec::new();
        match self {
            StyleKind::Dir => {
                spec.set_fg(Some(Color::Blue)).set_bold(true);
            }
            StyleKind::File => {}
            StyleKind::Executable => {
                spec.set_fg(Some(Color::Green)).set_bold(true);
            }
            StyleKind::Symlink => {
                spec.set_fg(Some(Color::Cyan));
            }
            StyleKind::Special => {
                spec.set_fg(Some(Color::Yellow));
            }
            StyleKind::Size | StyleKind::Blocks => {
                spec.set_fg(Some(Color::Green));
            }
            StyleKind::Owner | StyleKind::Group => {
                spec.set_fg(Some(Color::Yellow));
            }
            StyleKind::Permissions => {
                spec.set_fg(Some(Color::Magenta));
            }
            StyleKind::Time => {
                spec.set_fg(Some(Color::Blue));
            }
            StyleKind::Mime | StyleKind::Charset => {
                spec.set_fg(Some(Color::Cyan));
            }
            StyleKind::Checksum | StyleKind::Inode | StyleKind::Link => {
                spec.set_fg(Some(Color::Magenta));
            }
            StyleKind::GitStatus => {
                spec.set_fg(Some(Color::Red));
            }
            StyleKind::Annotation | StyleKind::Faint => {
                spec.set_fg(Some(Color::Black)).set_intense(true);
            }
            StyleKind::Header => {
                spec.set_underline(true);
            }
        }
        spec
    }
}

/// Renders a value for display.
pub trait Style: Send + Sync {
    fn paint(&self, kind: StyleKind, value: &str) -> String;
}

pub type SharedStyle = Arc<dyn Style>;

/// No decoration at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plain;

impl Style for Plain {
    fn paint(&self, _kind: StyleKind, value: &str) -> String {
        value.to_string()
    }
}

/// ANSI escape sequences produced through termcolor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiStyle;

impl Style for AnsiStyle {
    fn paint(&self, kind: StyleKind, value: &str) -> String {
        let spec = kind.color_spec();
        if spec.is_none() {
            return value.to_string();
        }
        let mut out = Ansi::new(Vec::with_capacity(value.len() + 16));
        let written = out
            .set_color(&spec)
            .and_then(|_| write!(out, "{value}"))
            .and_then(|_| out.reset());
        match written {
            Ok(()) => String::from_utf8(out.into_inner()).unwrap_or_else(|_| value.to_string()),
            Err(_) => value.to_string(),
        }
    }
}

pub fn shared(use_color: bool) -> SharedStyle {
    if use_color {
        Arc::new(AnsiStyle)
    } else {
        Arc::new(Plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_is_identity() {
        assert_eq!(Plain.paint(StyleKind::Dir, "src"), "src");
    }

    #[test]
    fn test_ansi_wraps_value() {
        let painted = AnsiStyle.paint(StyleKind::Dir, "src");
        assert!(painted.contains("src"));
        assert!(painted.starts_with('\x1b'));
        assert!(painted.len() > "src".len());
    }

    #[test]
    fn test_ansi_skips_unstyled_kind() {
        assert_eq!(AnsiStyle.paint(StyleKind::File, "a.txt"), "a.txt");
    }
}
