//! Git status field

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use git2::{Repository, Status, StatusOptions};

use crate::entry::Entry;
use crate::error::ResolveError;
use crate::fs::FileSystem;
use crate::style::{SharedStyle, StyleKind};

pub const GIT_FIELD: &str = "Git";

const UNMODIFIED: [char; 2] = ['-', '-'];

/// Short `XY` status (index, worktree) of every changed path of one
/// repository, captured once before resolution starts.
#[derive(Debug, Clone, Default)]
pub struct GitStatusCache {
    root: PathBuf,
    statuses: BTreeMap<PathBuf, [char; 2]>,
}

impl GitStatusCache {
    /// Open the repository containing `path`, if any.
    pub fn discover(path: &Path) -> Option<Self> {
        let repo = Repository::discover(path).ok()?;
        let workdir = repo.workdir()?;
        let root = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());

        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .include_ignored(true)
            .recurse_untracked_dirs(false);
        let statuses = repo.statuses(Some(&mut opts)).ok()?;

        let mut map = BTreeMap::new();
        for entry in statuses.iter() {
            let Some(rel) = entry.path() else {
                continue;
            };
            map.insert(root.join(rel), short_status(entry.status()));
        }
        tracing::debug!(root = %root.display(), changed = map.len(), "loaded git status");
        Some(Self {
            root,
            statuses: map,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Status of `path`. Directories report the first changed descendant;
    /// anything under an untracked or ignored directory inherits its status.
    pub fn status(&self, path: &Path, is_dir: bool) -> [char; 2] {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(status) = self.statuses.get(&path) {
            return *status;
        }
        for ancestor in path.ancestors().skip(1) {
            if !ancestor.starts_with(&self.root) {
                break;
            }
            if let Some(status) = self.statuses.get(ancestor) {
                if matches!(status, ['?', '?'] | ['!', '!']) {
                    return *status;
                }
            }
        }
        if is_dir {
            let descendant = self
                .statuses
                .range(path.clone()..)
                .take_while(|(p, _)| p.starts_with(&path))
                .find(|(_, s)| **s != ['!', '!']);
            if let Some((_, status)) = descendant {
                return *status;
            }
        }
        UNMODIFIED
    }
}

fn short_status(status: Status) -> [char; 2] {
    if status.contains(Status::IGNORED) {
        return ['!', '!'];
    }
    if status.contains(Status::WT_NEW) {
        return ['?', '?'];
    }
    if status.contains(Status::CONFLICTED) {
        return ['U', 'U'];
    }
    let x = if status.contains(Status::INDEX_NEW) {
        'A'
    } else if status.contains(Status::INDEX_MODIFIED) {
        'M'
    } else if status.contains(Status::INDEX_DELETED) {
        'D'
    } else if status.contains(Status::INDEX_RENAMED) {
        'R'
    } else if status.contains(Status::INDEX_TYPECHANGE) {
        'T'
    } else {
        '-'
    };
    let y = if status.contains(Status::WT_MODIFIED) {
        'M'
    } else if status.contains(Status::WT_DELETED) {
        'D'
    } else if status.contains(Status::WT_RENAMED) {
        'R'
    } else if status.contains(Status::WT_TYPECHANGE) {
        'T'
    } else {
        '-'
    };
    [x, y]
}

pub struct GitResolver {
    style: SharedStyle,
    cache: Option<GitStatusCache>,
}

impl GitResolver {
    /// `cache` is `None` outside a repository; every entry then renders `--`.
    pub fn new(style: SharedStyle, cache: Option<GitStatusCache>) -> Self {
        Self { style, cache }
    }
}

impl super::Resolver for GitResolver {
    fn field(&self) -> &str {
        GIT_FIELD
    }

    fn resolve(&self, entry: &mut Entry, _fs: &dyn FileSystem) -> Result<String, ResolveError> {
        let status = match &self.cache {
            Some(cache) => cache.status(&entry.path, entry.is_dir()),
            None => UNMODIFIED,
        };
        let text: String = status.iter().collect();
        if status == UNMODIFIED {
            return Ok(self.style.paint(StyleKind::Faint, &text));
        }
        Ok(self.style.paint(StyleKind::GitStatus, &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn stage(repo: &Repository, rel: &str) {
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(rel)).unwrap();
        index.write().unwrap();
    }

    #[test]
    fn test_untracked_and_added() {
        let (dir, repo) = create_test_repo();
        fs::write(dir.path().join("staged.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("loose.rs"), "fn other() {}").unwrap();
        stage(&repo, "staged.rs");

        let cache = GitStatusCache::discover(dir.path()).unwrap();
        assert_eq!(cache.status(&dir.path().join("staged.rs"), false), ['A', '-']);
        assert_eq!(cache.status(&dir.path().join("loose.rs"), false), ['?', '?']);
    }

    #[test]
    fn test_untracked_dir_children_inherit() {
        let (dir, _repo) = create_test_repo();
        fs::create_dir(dir.path().join("new")).unwrap();
        fs::write(dir.path().join("new/a.txt"), "a").unwrap();

        let cache = GitStatusCache::discover(dir.path()).unwrap();
        assert_eq!(cache.status(&dir.path().join("new"), true), ['?', '?']);
        assert_eq!(cache.status(&dir.path().join("new/a.txt"), false), ['?', '?']);
    }

    #[test]
    fn test_directory_aggregates_descendants() {
        let (dir, repo) = create_test_repo();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        stage(&repo, "src/lib.rs");

        let cache = GitStatusCache::discover(dir.path()).unwrap();
        assert_eq!(cache.status(&dir.path().join("src"), true), ['A', '-']);
    }

    #[test]
    fn test_outside_repo() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("plain");
        fs::create_dir(&nested).unwrap();
        // TempDir may itself live inside a repository on some machines.
        if let Some(cache) = GitStatusCache::discover(&nested) {
            assert!(!cache.root().starts_with(&nested));
        }
    }
}
