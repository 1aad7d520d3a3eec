//! Directory walker
//!
//! Produces batches for list, recurse and tree modes. Recursive walks fan
//! out one task per directory on the worker pool; the pool scope is the
//! completion barrier.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use glob::Pattern;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::debug;

use crate::entry::Entry;
use crate::error::{ConfigError, Error, WalkError};
use crate::fs::FileSystem;
use crate::pool::WorkerPool;

/// Configuration for which entries a walk yields.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Include names starting with `.`.
    pub show_all: bool,
    pub dirs_only: bool,
    /// Glob patterns matched against base names.
    pub ignore_patterns: Vec<String>,
    /// Skip paths matched by `.gitignore` files.
    pub git_ignore: bool,
    /// Only include files modified after this time
    pub newer_than: Option<SystemTime>,
    /// Only include files modified before this time
    pub older_than: Option<SystemTime>,
}

/// Compiled form of [`WalkerConfig`].
#[derive(Debug)]
pub struct EntryFilter {
    show_all: bool,
    dirs_only: bool,
    patterns: Vec<Pattern>,
    gitignore: Option<GitignoreMatcher>,
    newer_than: Option<SystemTime>,
    older_than: Option<SystemTime>,
}

impl EntryFilter {
    /// Compile patterns and load `.gitignore` files from `root` upward to
    /// the enclosing repository root.
    pub fn new(config: &WalkerConfig, root: &Path) -> Result<Self, ConfigError> {
        let patterns = config
            .ignore_patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|source| ConfigError::InvalidGlob {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let gitignore = if config.git_ignore {
            Some(load_gitignore(root)?)
        } else {
            None
        };
        Ok(Self {
            show_all: config.show_all,
            dirs_only: config.dirs_only,
            patterns,
            gitignore,
            newer_than: config.newer_than,
            older_than: config.older_than,
        })
    }

    /// Accept everything.
    pub fn permissive() -> Self {
        Self {
            show_all: true,
            dirs_only: false,
            patterns: Vec::new(),
            gitignore: None,
            newer_than: None,
            older_than: None,
        }
    }

    pub fn accepts(&self, entry: &Entry) -> bool {
        if !self.show_all && entry.is_hidden() {
            return false;
        }
        if self.dirs_only && !entry.is_dir() {
            return false;
        }
        if self.patterns.iter().any(|p| p.matches(&entry.name)) {
            return false;
        }
        if let Some(gi) = &self.gitignore {
            if gi.is_ignored(&entry.path, entry.is_dir()) {
                return false;
            }
        }
        if !entry.is_dir() && !self.passes_time_filter(entry) {
            return false;
        }
        true
    }

    fn passes_time_filter(&self, entry: &Entry) -> bool {
        let Some(mtime) = entry.stat.modified else {
            return true;
        };
        if self.newer_than.is_some_and(|newer| mtime < newer) {
            return false;
        }
        if self.older_than.is_some_and(|older| mtime > older) {
            return false;
        }
        true
    }
}

fn load_gitignore(given: &Path) -> Result<GitignoreMatcher, ConfigError> {
    let root = given.canonicalize().unwrap_or_else(|_| given.to_path_buf());
    let mut files = Vec::new();
    let mut top = None;
    for dir in root.ancestors() {
        let candidate = dir.join(".gitignore");
        if candidate.is_file() {
            files.push(candidate);
        }
        if dir.join(".git").exists() {
            top = Some(dir.to_path_buf());
            break;
        }
    }
    // Outside a repository every ancestor was scanned.
    let top = top.unwrap_or_else(|| root.ancestors().last().unwrap_or(&root).to_path_buf());
    let mut builder = GitignoreBuilder::new(&top);
    // Outermost first so nested files take precedence.
    for file in files.iter().rev() {
        if let Some(e) = builder.add(file) {
            return Err(ConfigError::Gitignore(e.to_string()));
        }
    }
    let matcher = builder
        .build()
        .map_err(|e| ConfigError::Gitignore(e.to_string()))?;
    Ok(GitignoreMatcher {
        matcher,
        given: given.to_path_buf(),
        root,
    })
}

/// `.gitignore` rules plus the mapping from walked paths, which are relative
/// to the root as given, to the absolute paths the rules expect.
#[derive(Debug)]
struct GitignoreMatcher {
    matcher: Gitignore,
    given: PathBuf,
    root: PathBuf,
}

impl GitignoreMatcher {
    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let absolute = match path.strip_prefix(&self.given) {
            Ok(rel) => self.root.join(rel),
            Err(_) => path.to_path_buf(),
        };
        absolute.starts_with(self.matcher.path())
            && self
                .matcher
                .matched_path_or_any_parents(&absolute, is_dir)
                .is_ignore()
    }
}

/// Result of a walk: every entry found plus every directory that failed.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub entries: Vec<Entry>,
    pub errors: Vec<WalkError>,
}

pub struct Walker<'a> {
    fs: &'a dyn FileSystem,
    filter: EntryFilter,
    pool: &'a WorkerPool,
}

impl<'a> Walker<'a> {
    pub fn new(fs: &'a dyn FileSystem, filter: EntryFilter, pool: &'a WorkerPool) -> Self {
        Self { fs, filter, pool }
    }

    /// List the children of `dir`. A non-directory lists as itself.
    pub fn list(&self, dir: &Path) -> Result<WalkOutcome, Error> {
        let root = Entry::from_path(self.fs, dir).map_err(|source| Error::Root {
            path: dir.to_path_buf(),
            source,
        })?;
        if !root.is_dir() {
            return Ok(WalkOutcome {
                entries: vec![root],
                errors: Vec::new(),
            });
        }
        let listing = self.fs.read_dir(dir).map_err(|source| Error::Root {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut outcome = WalkOutcome::default();
        outcome.errors.extend(listing.errors.into_iter().map(|source| WalkError::ReadDir {
            path: dir.to_path_buf(),
            source,
        }));
        for child in listing.children {
            match Entry::from_path(self.fs, &child) {
                Ok(entry) if self.filter.accepts(&entry) => outcome.entries.push(entry),
                Ok(_) => {}
                Err(source) => outcome.errors.push(WalkError::Stat {
                    path: child,
                    source,
                }),
            }
        }
        Ok(outcome)
    }

    /// Walk `root` recursively. The root itself is the depth-0 entry;
    /// `depth_limit < 0` is unlimited and `0` reads only the root.
    pub fn walk(&self, root: &Path, depth_limit: i64) -> Result<WalkOutcome, Error> {
        let root_entry = Entry::from_path(self.fs, root)
            .map_err(|source| Error::Root {
                path: root.to_path_buf(),
                source,
            })?
            .with_position(None, 0);

        let entries = Mutex::new(Vec::new());
        let errors = Mutex::new(Vec::new());
        if root_entry.is_dir() {
            let start = root.to_path_buf();
            self.pool
                .scope(|s| self.visit(s, start, 0, depth_limit, &entries, &errors));
        }

        let mut found = entries.into_inner().unwrap_or_else(PoisonError::into_inner);
        found.sort_by(|a: &Entry, b: &Entry| a.path.cmp(&b.path));
        found.insert(0, root_entry);
        let mut errors = errors.into_inner().unwrap_or_else(PoisonError::into_inner);
        errors.sort_by(|a: &WalkError, b: &WalkError| a.path().cmp(b.path()));
        debug!(
            root = %root.display(),
            entries = found.len(),
            errors = errors.len(),
            "walk complete"
        );
        Ok(WalkOutcome {
            entries: found,
            errors,
        })
    }

    fn visit<'s>(
        &'s self,
        scope: &rayon::Scope<'s>,
        dir: PathBuf,
        depth: usize,
        limit: i64,
        entries: &'s Mutex<Vec<Entry>>,
        errors: &'s Mutex<Vec<WalkError>>,
    ) {
        if limit >= 0 && depth as i64 > limit {
            return;
        }
        let record = |error: WalkError| {
            debug!(%error, "walk error");
            errors
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(error);
        };
        let listing = match self.fs.read_dir(&dir) {
            Ok(listing) => listing,
            Err(source) => {
                record(WalkError::ReadDir { path: dir, source });
                return;
            }
        };
        for source in listing.errors {
            record(WalkError::ReadDir {
                path: dir.clone(),
                source,
            });
        }

        let mut found = Vec::with_capacity(listing.children.len());
        for child in listing.children {
            let entry = match Entry::from_path(self.fs, &child) {
                Ok(entry) => entry.with_position(Some(dir.clone()), depth + 1),
                Err(source) => {
                    record(WalkError::Stat {
                        path: child,
                        source,
                    });
                    continue;
                }
            };
            if !self.filter.accepts(&entry) {
                continue;
            }
            // Symlinked directories stat as links and are never descended.
            if entry.is_dir() {
                let path = entry.path.clone();
                scope.spawn(move |s| self.visit(s, path, depth + 1, limit, entries, errors));
            }
            found.push(entry);
        }
        entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(found);
    }
}
