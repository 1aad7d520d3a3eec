//! Test fixtures: temporary directories on disk and an in-memory filesystem.
//!
//! This module is only compiled for tests and benchmarks.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use crate::fs::{DirListing, FileKind, FileSystem, Stat};

/// A temporary directory for testing, optionally a git repository.
///
/// The directory is automatically cleaned up when dropped.
pub struct TestDir {
    dir: TempDir,
    git_initialized: bool,
}

impl TestDir {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        Self {
            dir,
            git_initialized: false,
        }
    }

    pub fn with_git() -> Self {
        let mut dir = Self::new();
        dir.init_git();
        dir
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn init_git(&mut self) {
        for args in [
            &["init"][..],
            &["config", "user.email", "test@test.com"],
            &["config", "user.name", "Test"],
        ] {
            Command::new("git")
                .args(args)
                .current_dir(self.dir.path())
                .output()
                .expect("Failed to run git");
        }
        self.git_initialized = true;
    }

    /// Write a file, creating parent directories. Staged when git is set up.
    pub fn add_file(&self, path: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let full_path = self.dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("Failed to write file");

        if self.git_initialized {
            Command::new("git")
                .args(["add", path])
                .current_dir(self.dir.path())
                .output()
                .expect("Failed to git add");
        }
        full_path
    }

    pub fn add_dir(&self, path: &str) -> PathBuf {
        let full_path = self.dir.path().join(path);
        fs::create_dir_all(&full_path).expect("Failed to create dir");
        full_path
    }

    #[cfg(unix)]
    pub fn add_symlink(&self, path: &str, target: &str) -> PathBuf {
        let full_path = self.dir.path().join(path);
        std::os::unix::fs::symlink(target, &full_path).expect("Failed to create symlink");
        full_path
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
    Symlink(PathBuf),
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    node: Node,
    mode: u32,
    inode: u64,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<PathBuf, MemoryEntry>,
    failing: HashSet<PathBuf>,
    unreported: HashSet<PathBuf>,
    next_inode: u64,
}

/// In-memory [`FileSystem`] with injectable `read_dir` failures.
///
/// Parent directories are created implicitly. Every entry gets a distinct
/// inode and a fixed modification time unless overridden.
#[derive(Debug)]
pub struct MemoryFs {
    state: Mutex<MemoryState>,
}

/// Default modification time of every entry.
pub const MEMORY_FS_EPOCH: Duration = Duration::from_secs(1_700_000_000);

impl MemoryFs {
    pub fn new() -> Self {
        let fs = Self {
            state: Mutex::new(MemoryState::default()),
        };
        fs.insert(Path::new("/"), Node::Dir, 0o755);
        fs
    }

    fn insert(&self, path: &Path, node: Node, mode: u32) {
        let mut state = self.state.lock().expect("memory fs poisoned");
        for ancestor in path.ancestors().skip(1) {
            if !state.entries.contains_key(ancestor) {
                state.next_inode += 1;
                let inode = state.next_inode;
                state.entries.insert(
                    ancestor.to_path_buf(),
                    MemoryEntry {
                        node: Node::Dir,
                        mode: 0o755,
                        inode,
                        modified: SystemTime::UNIX_EPOCH + MEMORY_FS_EPOCH,
                    },
                );
            }
        }
        let inode = match state.entries.get(path) {
            Some(existing) => existing.inode,
            None => {
                state.next_inode += 1;
                state.next_inode
            }
        };
        state.entries.insert(
            path.to_path_buf(),
            MemoryEntry {
                node,
                mode,
                inode,
                modified: SystemTime::UNIX_EPOCH + MEMORY_FS_EPOCH,
            },
        );
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), Node::Dir, 0o755);
    }

    /// Add or overwrite a regular file.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.insert(path.as_ref(), Node::File(content.into()), 0o644);
    }

    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl Into<PathBuf>) {
        self.insert(path.as_ref(), Node::Symlink(target.into()), 0o777);
    }

    pub fn set_mode(&self, path: impl AsRef<Path>, mode: u32) {
        let mut state = self.state.lock().expect("memory fs poisoned");
        if let Some(entry) = state.entries.get_mut(path.as_ref()) {
            entry.mode = mode;
        }
    }

    pub fn set_modified(&self, path: impl AsRef<Path>, modified: SystemTime) {
        let mut state = self.state.lock().expect("memory fs poisoned");
        if let Some(entry) = state.entries.get_mut(path.as_ref()) {
            entry.modified = modified;
        }
    }

    /// Make `read_dir(path)` fail with `PermissionDenied`.
    pub fn fail_read_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().expect("memory fs poisoned");
        state.failing.insert(path.as_ref().to_path_buf());
    }

    /// Make `read_dir` of the parent report an error in place of `path`.
    pub fn fail_dir_entry(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().expect("memory fs poisoned");
        state.unreported.insert(path.as_ref().to_path_buf());
    }

    fn lookup(&self, path: &Path) -> io::Result<MemoryEntry> {
        let state = self.state.lock().map_err(|_| io::Error::other("poisoned"))?;
        state
            .entries
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemoryFs {
    fn stat(&self, path: &Path) -> io::Result<Stat> {
        let entry = self.lookup(path)?;
        let (kind, size) = match &entry.node {
            Node::File(bytes) => (FileKind::File, bytes.len() as u64),
            Node::Dir => (FileKind::Dir, 0),
            Node::Symlink(target) => (FileKind::Symlink, target.as_os_str().len() as u64),
        };
        Ok(Stat {
            kind,
            size,
            mode: entry.mode,
            modified: Some(entry.modified),
            accessed: Some(entry.modified),
            created: Some(entry.modified),
            nlink: 1,
            inode: entry.inode,
            uid: 0,
            gid: 0,
            blocks: size.div_ceil(512),
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<DirListing> {
        let entry = self.lookup(path)?;
        if !matches!(entry.node, Node::Dir) {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                path.display().to_string(),
            ));
        }
        let state = self.state.lock().map_err(|_| io::Error::other("poisoned"))?;
        if state.failing.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                path.display().to_string(),
            ));
        }
        let mut listing = DirListing::default();
        for child in state.entries.keys().filter(|p| p.parent() == Some(path)) {
            if state.unreported.contains(child) {
                listing.errors.push(io::Error::other(format!(
                    "unreadable entry in {}",
                    path.display()
                )));
            } else {
                listing.children.push(child.clone());
            }
        }
        Ok(listing)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        match self.lookup(path)?.node {
            Node::File(bytes) => Ok(Box::new(Cursor::new(bytes))),
            Node::Dir => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                path.display().to_string(),
            )),
            Node::Symlink(target) => {
                let resolved = match path.parent() {
                    Some(dir) if target.is_relative() => dir.join(target),
                    _ => target,
                };
                self.open(&resolved)
            }
        }
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        match self.lookup(path)?.node {
            Node::Symlink(target) => Ok(target),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                path.display().to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_fs_implicit_parents() {
        let fs = MemoryFs::new();
        fs.add_file("/a/b/c.txt", "hi");
        assert!(fs.stat(Path::new("/a")).unwrap().is_dir());
        assert!(fs.stat(Path::new("/a/b")).unwrap().is_dir());
        assert_eq!(fs.stat(Path::new("/a/b/c.txt")).unwrap().size, 2);
    }

    #[test]
    fn test_memory_fs_read_dir_sorted_direct_children() {
        let fs = MemoryFs::new();
        fs.add_file("/d/b", "");
        fs.add_file("/d/a", "");
        fs.add_file("/d/sub/deep", "");
        let children = fs.read_dir(Path::new("/d")).unwrap().children;
        assert_eq!(
            children,
            vec![
                PathBuf::from("/d/a"),
                PathBuf::from("/d/b"),
                PathBuf::from("/d/sub")
            ]
        );
    }

    #[test]
    fn test_memory_fs_failures() {
        let fs = MemoryFs::new();
        fs.add_dir("/locked");
        fs.fail_read_dir("/locked");
        let err = fs.read_dir(Path::new("/locked")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(
            fs.stat(Path::new("/missing")).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_test_dir_creates_files() {
        let dir = TestDir::new();
        let path = dir.add_file("x/y.txt", "content");
        assert!(path.exists());
        assert!(dir.path().join("x").is_dir());
    }
}
