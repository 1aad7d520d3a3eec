//! Sort engine
//!
//! A [`Sorter`] collects an ordered chain of [`SortKey`]s and compiles it into
//! one total-order [`Comparator`]. Keys are tried in registration order and the
//! first non-equal result wins; complete ties keep input order because the
//! pipeline sorts stably.

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use unicode_width::UnicodeWidthStr;

use crate::entry::{Entry, cache_keys};
use crate::error::ConfigError;
use crate::fs::TimeKind;
use crate::resolvers::IdNames;
use crate::resolvers::mime::parent_type;

pub type Comparator = Arc<dyn Fn(&Entry, &Entry) -> Ordering + Send + Sync>;

static VERSION3: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("VERSION3 regex is invalid"));
static VERSION2: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)").expect("VERSION2 regex is invalid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    }

    fn flip(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

/// One comparison criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Name {
        case_sensitive: bool,
        ignore_leading_dot: bool,
    },
    Size,
    /// Reads the cached recursive size.
    RecursiveSize { depth: i64 },
    Time(TimeKind),
    Extension { case_sensitive: bool },
    Owner { case_sensitive: bool },
    Group { case_sensitive: bool },
    /// Reads the cached mime type.
    Mime,
    MimeParent,
    Inode,
    Width,
    Version,
    /// Hidden directories, then directories, then non-links, then name.
    Default,
    /// Keep input order.
    None,
}

/// A pre-pass that fills the cache slot a sort key reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    RecursiveSize { depth: i64 },
    Mime,
}

impl SortKey {
    pub fn prerequisite(&self) -> Option<Prerequisite> {
        match self {
            SortKey::RecursiveSize { depth } => Some(Prerequisite::RecursiveSize { depth: *depth }),
            SortKey::Mime | SortKey::MimeParent => Some(Prerequisite::Mime),
            _ => None,
        }
    }
}

/// A key with its direction, as parsed from `--sort`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: Direction,
}

impl FromStr for SortSpec {
    type Err = ConfigError;

    /// `key`, `key:asc`, `key:desc` or `key-descend`. A leading capital
    /// selects the case-sensitive variant of name, extension, owner and group.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ConfigError::UnknownSortKey(s.to_string());
        let (key, mut direction) = match s.split_once(':') {
            Some((key, "asc" | "ascend")) => (key, Some(Direction::Ascending)),
            Some((key, "desc" | "descend")) => (key, Some(Direction::Descending)),
            Some(_) => return Err(unknown()),
            None => (s, None),
        };
        let key = match key.strip_suffix("-descend") {
            Some(stripped) => {
                direction = Some(Direction::Descending);
                stripped
            }
            None => key,
        };
        let (key, default_direction) = match key {
            "none" | "nosort" | "U" => (SortKey::None, Direction::Ascending),
            "default" | "nature" => (SortKey::Default, Direction::Ascending),
            "name" | "n" => (name_key(false, false), Direction::Ascending),
            "Name" | "N" => (name_key(true, false), Direction::Ascending),
            ".name" | "name-nodot" => (name_key(false, true), Direction::Ascending),
            ".Name" | "Name-nodot" => (name_key(true, true), Direction::Ascending),
            "size" => (SortKey::Size, Direction::Ascending),
            "S" => (SortKey::Size, Direction::Descending),
            "recursive-size" | "rsize" => (SortKey::RecursiveSize { depth: -1 }, Direction::Ascending),
            "time" | "mtime" | "modified" => (SortKey::Time(TimeKind::Modified), Direction::Ascending),
            "t" => (SortKey::Time(TimeKind::Modified), Direction::Descending),
            "atime" | "accessed" => (SortKey::Time(TimeKind::Accessed), Direction::Ascending),
            "ctime" | "btime" | "created" => (SortKey::Time(TimeKind::Created), Direction::Ascending),
            "extension" | "ext" | "x" => (
                SortKey::Extension {
                    case_sensitive: false,
                },
                Direction::Ascending,
            ),
            "Extension" | "Ext" | "X" => (
                SortKey::Extension {
                    case_sensitive: true,
                },
                Direction::Ascending,
            ),
            "owner" | "user" => (
                SortKey::Owner {
                    case_sensitive: false,
                },
                Direction::Ascending,
            ),
            "Owner" | "User" => (
                SortKey::Owner {
                    case_sensitive: true,
                },
                Direction::Ascending,
            ),
            "group" => (
                SortKey::Group {
                    case_sensitive: false,
                },
                Direction::Ascending,
            ),
            "Group" => (
                SortKey::Group {
                    case_sensitive: true,
                },
                Direction::Ascending,
            ),
            "mime" | "mimetype" => (SortKey::Mime, Direction::Ascending),
            "mime-parent" | "mimetype-parent" => (SortKey::MimeParent, Direction::Ascending),
            "inode" => (SortKey::Inode, Direction::Ascending),
            "width" => (SortKey::Width, Direction::Ascending),
            "version" | "v" => (SortKey::Version, Direction::Ascending),
            _ => return Err(unknown()),
        };
        Ok(SortSpec {
            key,
            direction: direction.unwrap_or(default_direction),
        })
    }
}

fn name_key(case_sensitive: bool, ignore_leading_dot: bool) -> SortKey {
    SortKey::Name {
        case_sensitive,
        ignore_leading_dot,
    }
}

/// Builder for the batch comparator.
#[derive(Debug, Clone, Default)]
pub struct Sorter {
    keys: Vec<SortSpec>,
    reverse: bool,
    dir_first: bool,
    disabled: bool,
    recursive_depth: Option<i64>,
    names: Arc<IdNames>,
}

impl Sorter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share the uid/gid name table used by the owner and group keys.
    pub fn with_names(mut self, names: Arc<IdNames>) -> Self {
        self.names = names;
        self
    }

    /// Append a key. `none` disables sorting for good.
    pub fn add(&mut self, mut spec: SortSpec) -> &mut Self {
        if let (Some(limit), SortKey::RecursiveSize { depth }) = (self.recursive_depth, &mut spec.key) {
            *depth = limit;
        }
        if spec.key == SortKey::None {
            self.disabled = true;
            self.keys.clear();
        } else if !self.disabled {
            self.keys.push(spec);
        }
        self
    }

    /// Toggle batch-wide reversal of the user key chain. Entries missing a
    /// cached sort value stay last either way.
    pub fn reverse(&mut self) -> &mut Self {
        self.reverse = !self.reverse;
        self
    }

    /// Depth limit of every recursive-size key, past and future. Must match
    /// the depth the size column renders with, since both share one cache slot.
    pub fn recursive_depth(&mut self, limit: i64) -> &mut Self {
        self.recursive_depth = Some(limit);
        for spec in &mut self.keys {
            if let SortKey::RecursiveSize { depth } = &mut spec.key {
                *depth = limit;
            }
        }
        self
    }

    pub fn dir_first(&mut self) -> &mut Self {
        self.dir_first = true;
        self
    }

    /// Pre-passes the registered keys depend on, deduplicated.
    pub fn prerequisites(&self) -> Vec<Prerequisite> {
        let mut out = Vec::new();
        for spec in &self.keys {
            if let Some(p) = spec.key.prerequisite() {
                if !out.contains(&p) {
                    out.push(p);
                }
            }
        }
        out
    }

    /// Compile the chain. `None` means input order is kept.
    pub fn build(&self) -> Option<Comparator> {
        if self.disabled {
            return None;
        }
        let keys = if self.keys.is_empty() {
            vec![SortSpec {
                key: SortKey::Default,
                direction: Direction::Ascending,
            }]
        } else {
            self.keys.clone()
        };
        let reverse = self.reverse;
        let dir_first = self.dir_first;
        let names = self.names.clone();

        Some(Arc::new(move |a: &Entry, b: &Entry| {
            if dir_first {
                let ord = b.is_dir().cmp(&a.is_dir());
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            keys.iter()
                .map(|spec| {
                    let direction = if reverse { spec.direction.flip() } else { spec.direction };
                    compare(&spec.key, direction, a, b, &names)
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        }))
    }
}

fn compare(key: &SortKey, direction: Direction, a: &Entry, b: &Entry, names: &IdNames) -> Ordering {
    let ord = match key {
        SortKey::Name {
            case_sensitive,
            ignore_leading_dot,
        } => {
            let strip = |e: &Entry| -> String {
                let name = if *ignore_leading_dot {
                    e.name.strip_prefix('.').unwrap_or(&e.name)
                } else {
                    &e.name
                };
                fold(name, *case_sensitive)
            };
            strip(a).cmp(&strip(b))
        }
        SortKey::Size => a.stat.size.cmp(&b.stat.size),
        SortKey::RecursiveSize { .. } => {
            return cached(direction, a, b, |e| e.cache_u64(cache_keys::RECURSIVE_SIZE));
        }
        SortKey::Time(kind) => a.stat.time(*kind).cmp(&b.stat.time(*kind)),
        SortKey::Extension { case_sensitive } => {
            fold(a.extension(), *case_sensitive).cmp(&fold(b.extension(), *case_sensitive))
        }
        SortKey::Owner { case_sensitive } => fold(&names.user(a.stat.uid), *case_sensitive)
            .cmp(&fold(&names.user(b.stat.uid), *case_sensitive)),
        SortKey::Group { case_sensitive } => fold(&names.group(a.stat.gid), *case_sensitive)
            .cmp(&fold(&names.group(b.stat.gid), *case_sensitive)),
        SortKey::Mime => {
            return cached(direction, a, b, |e| {
                e.cache_str(cache_keys::MIME).map(str::to_string)
            });
        }
        SortKey::MimeParent => {
            return cached(direction, a, b, |e| {
                e.cache_str(cache_keys::MIME)
                    .map(|m| parent_type(m).to_string())
            });
        }
        SortKey::Inode => a.stat.inode.cmp(&b.stat.inode),
        SortKey::Width => a.name.width().cmp(&b.name.width()),
        SortKey::Version => version(&a.name).cmp(&version(&b.name)),
        SortKey::Default => default_order(a, b),
        SortKey::None => Ordering::Equal,
    };
    direction.apply(ord)
}

fn fold(s: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        s.to_string()
    } else {
        s.to_lowercase()
    }
}

/// Present slots in key direction; absent slots after every present one.
fn cached<T: Ord>(
    direction: Direction,
    a: &Entry,
    b: &Entry,
    read: impl Fn(&Entry) -> Option<T>,
) -> Ordering {
    match (read(a), read(b)) {
        (Some(x), Some(y)) => direction.apply(x.cmp(&y)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn default_order(a: &Entry, b: &Entry) -> Ordering {
    let hidden_dir = |e: &Entry| e.is_dir() && e.is_hidden();
    hidden_dir(b)
        .cmp(&hidden_dir(a))
        .then_with(|| b.is_dir().cmp(&a.is_dir()))
        .then_with(|| a.stat.is_symlink().cmp(&b.stat.is_symlink()))
        .then_with(|| a.name.cmp(&b.name))
}

/// `(major, minor, patch)` of the first version number in a name.
fn version(name: &str) -> (u64, u64, u64) {
    let num = |s: &str| s.parse::<u64>().unwrap_or(0);
    if let Some(c) = VERSION3.captures(name) {
        return (num(&c[1]), num(&c[2]), num(&c[3]));
    }
    if let Some(c) = VERSION2.captures(name) {
        return (num(&c[1]), num(&c[2]), 0);
    }
    (0, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileKind, Stat};

    fn entry(name: &str, kind: FileKind, size: u64) -> Entry {
        Entry::new(
            format!("/d/{name}"),
            Stat {
                kind,
                size,
                ..Default::default()
            },
        )
    }

    fn file(name: &str, size: u64) -> Entry {
        entry(name, FileKind::File, size)
    }

    fn dir(name: &str) -> Entry {
        entry(name, FileKind::Dir, 0)
    }

    fn names(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn sorted(mut entries: Vec<Entry>, sorter: &Sorter) -> Vec<Entry> {
        if let Some(cmp) = sorter.build() {
            entries.sort_by(|a, b| cmp(a, b));
        }
        entries
    }

    fn spec(s: &str) -> SortSpec {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_directions() {
        assert_eq!(spec("size").direction, Direction::Ascending);
        assert_eq!(spec("S").direction, Direction::Descending);
        assert_eq!(spec("size:desc").direction, Direction::Descending);
        assert_eq!(spec("name-descend").direction, Direction::Descending);
        assert_eq!(
            spec("Name").key,
            SortKey::Name {
                case_sensitive: true,
                ignore_leading_dot: false
            }
        );
        assert!(matches!(
            "bogus".parse::<SortSpec>(),
            Err(ConfigError::UnknownSortKey(_))
        ));
        assert!("size:sideways".parse::<SortSpec>().is_err());
    }

    #[test]
    fn test_case_sensitivity() {
        let input = vec![file("b", 0), file("B", 0), file("a", 0)];
        let mut sorter = Sorter::new();
        sorter.add(spec("Name"));
        assert_eq!(names(&sorted(input.clone(), &sorter)), vec!["B", "a", "b"]);

        let mut sorter = Sorter::new();
        sorter.add(spec("name"));
        // "b" and "B" tie, input order kept.
        assert_eq!(names(&sorted(input, &sorter)), vec!["a", "b", "B"]);
    }

    #[test]
    fn test_chain_and_ties_keep_input_order() {
        let input = vec![file("x", 10), file("y", 5), file("z", 10), file("w", 5)];
        let mut sorter = Sorter::new();
        sorter.add(spec("size"));
        let once = sorted(input, &sorter);
        assert_eq!(names(&once), vec!["y", "w", "x", "z"]);

        let twice = sorted(once.clone(), &sorter);
        assert_eq!(names(&twice), names(&once));
    }

    #[test]
    fn test_reverse_keeps_dirs_first() {
        let input = vec![file("a", 3), dir("m"), file("b", 1), dir("c")];
        let mut sorter = Sorter::new();
        sorter.add(spec("name")).dir_first().reverse();
        let out = sorted(input, &sorter);
        assert_eq!(names(&out), vec!["m", "c", "b", "a"]);
        let first_file = out.iter().position(|e| !e.is_dir()).unwrap();
        assert!(out[first_file..].iter().all(|e| !e.is_dir()));
    }

    #[test]
    fn test_none_wins_over_later_keys() {
        let input = vec![file("b", 0), file("a", 0)];
        let mut sorter = Sorter::new();
        sorter.add(spec("none")).add(spec("name")).dir_first();
        assert!(sorter.build().is_none());
        assert_eq!(names(&sorted(input, &sorter)), vec!["b", "a"]);
    }

    #[test]
    fn test_default_order() {
        let mut link = entry("a-link", FileKind::Symlink, 0);
        link.stat.mode = 0o777;
        let input = vec![file("z", 0), link, dir("src"), dir(".git"), file("a", 0)];
        let out = sorted(input, &Sorter::new());
        assert_eq!(names(&out), vec![".git", "src", "a", "z", "a-link"]);
    }

    #[test]
    fn test_version_order() {
        let input = vec![file("lib-1.10.0", 0), file("lib-1.9.2", 0), file("lib-1.9", 0)];
        let mut sorter = Sorter::new();
        sorter.add(spec("version"));
        assert_eq!(
            names(&sorted(input, &sorter)),
            vec!["lib-1.9", "lib-1.9.2", "lib-1.10.0"]
        );
    }

    #[test]
    fn test_ignore_leading_dot_and_width() {
        let input = vec![file(".zshrc", 0), file("bin", 0), file(".a", 0)];
        let mut sorter = Sorter::new();
        sorter.add(spec(".name"));
        assert_eq!(names(&sorted(input.clone(), &sorter)), vec![".a", "bin", ".zshrc"]);

        let mut sorter = Sorter::new();
        sorter.add(spec("width"));
        assert_eq!(names(&sorted(input, &sorter)), vec![".a", "bin", ".zshrc"]);
    }

    #[test]
    fn test_cached_keys_absent_last_and_prerequisites() {
        let mut a = file("a", 0);
        let mut b = file("b", 0);
        let c = file("c", 0);
        a.set_cache(cache_keys::RECURSIVE_SIZE, "100");
        b.set_cache(cache_keys::RECURSIVE_SIZE, "5");

        let mut sorter = Sorter::new();
        sorter.add(spec("recursive-size:desc")).add(spec("mime"));
        assert_eq!(
            sorter.prerequisites(),
            vec![Prerequisite::RecursiveSize { depth: -1 }, Prerequisite::Mime]
        );
        let out = sorted(vec![c, b, a], &sorter);
        assert_eq!(names(&out), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_absent_slots_stay_last_when_reversed() {
        let mut a = file("a", 0);
        let mut b = file("b", 0);
        let c = file("c", 0);
        a.set_cache(cache_keys::MIME, "text/plain");
        b.set_cache(cache_keys::MIME, "image/png");

        let mut sorter = Sorter::new();
        sorter.add(spec("mime"));
        let out = sorted(vec![c.clone(), a.clone(), b.clone()], &sorter);
        assert_eq!(names(&out), vec!["b", "a", "c"]);

        sorter.reverse();
        let out = sorted(vec![c, b, a], &sorter);
        assert_eq!(names(&out), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_recursive_depth_applies_to_every_key() {
        let mut sorter = Sorter::new();
        sorter.add(spec("rsize"));
        sorter.recursive_depth(0);
        sorter.add(spec("recursive-size:desc"));
        assert_eq!(
            sorter.prerequisites(),
            vec![Prerequisite::RecursiveSize { depth: 0 }]
        );
    }

    #[test]
    fn test_extension_key() {
        let input = vec![file("b.txt", 0), file("a.rs", 0), file("Makefile", 0)];
        let mut sorter = Sorter::new();
        sorter.add(spec("ext")).add(spec("name"));
        assert_eq!(
            names(&sorted(input, &sorter)),
            vec!["Makefile", "a.rs", "b.txt"]
        );
    }
}
