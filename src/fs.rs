//! Filesystem capability set
//!
//! The walker and every resolver reach the filesystem only through the
//! [`FileSystem`] trait, so a fake filesystem (see `test_utils::MemoryFs`) can
//! drive the whole pipeline in tests.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Type of a filesystem object, as reported by `lstat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileKind {
    #[default]
    File,
    Dir,
    Symlink,
    Pipe,
    Socket,
    BlockDevice,
    CharDevice,
    Other,
}

impl FileKind {
    /// Leading character of an `ls -l` style mode string.
    pub fn mode_char(self) -> char {
        match self {
            FileKind::File => '.',
            FileKind::Dir => 'd',
            FileKind::Symlink => 'l',
            FileKind::Pipe => '|',
            FileKind::Socket => 's',
            FileKind::BlockDevice => 'b',
            FileKind::CharDevice => 'c',
            FileKind::Other => '?',
        }
    }
}

/// Raw stat data captured when an entry is created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stat {
    pub kind: FileKind,
    pub size: u64,
    /// Permission bits including setuid/setgid/sticky (`st_mode & 0o7777`).
    pub mode: u32,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub created: Option<SystemTime>,
    pub nlink: u64,
    pub inode: u64,
    pub uid: u32,
    pub gid: u32,
    /// Number of 512-byte blocks allocated.
    pub blocks: u64,
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_executable(&self) -> bool {
        self.is_file() && self.mode & 0o111 != 0
    }

    pub fn time(&self, kind: TimeKind) -> Option<SystemTime> {
        match kind {
            TimeKind::Modified => self.modified,
            TimeKind::Accessed => self.accessed,
            TimeKind::Created => self.created,
        }
    }
}

/// Which timestamp of a [`Stat`] to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeKind {
    #[default]
    Modified,
    Accessed,
    Created,
}

impl TimeKind {
    pub fn label(self) -> &'static str {
        match self {
            TimeKind::Modified => "Modified",
            TimeKind::Accessed => "Accessed",
            TimeKind::Created => "Created",
        }
    }
}

impl std::str::FromStr for TimeKind {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mod" | "modified" | "mtime" => Ok(TimeKind::Modified),
            "access" | "accessed" | "ac" | "atime" => Ok(TimeKind::Accessed),
            "create" | "created" | "cr" | "ctime" | "birth" => Ok(TimeKind::Created),
            other => Err(crate::error::ConfigError::UnknownTimeKind(other.to_string())),
        }
    }
}

/// Children of one directory, as full paths sorted by file name. Entries the
/// OS failed to report are kept as errors.
#[derive(Debug, Default)]
pub struct DirListing {
    pub children: Vec<PathBuf>,
    pub errors: Vec<io::Error>,
}

/// Filesystem operations the pipeline depends on.
///
/// `stat` does not follow symlinks.
pub trait FileSystem: Send + Sync {
    fn stat(&self, path: &Path) -> io::Result<Stat>;

    fn read_dir(&self, path: &Path) -> io::Result<DirListing>;

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;
}

/// The real filesystem, backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFs;

impl FileSystem for NativeFs {
    fn stat(&self, path: &Path) -> io::Result<Stat> {
        let meta = std::fs::symlink_metadata(path)?;
        Ok(stat_from_metadata(&meta))
    }

    fn read_dir(&self, path: &Path) -> io::Result<DirListing> {
        let mut entries = Vec::new();
        let mut errors = Vec::new();
        for entry in std::fs::read_dir(path)? {
            match entry {
                Ok(entry) => entries.push(entry),
                Err(e) => errors.push(e),
            }
        }
        entries.sort_by_key(|a| a.file_name());
        Ok(DirListing {
            children: entries.into_iter().map(|e| e.path()).collect(),
            errors,
        })
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(std::fs::File::open(path)?))
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::read_link(path)
    }
}

fn kind_from_file_type(ft: std::fs::FileType) -> FileKind {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if ft.is_fifo() {
            return FileKind::Pipe;
        }
        if ft.is_socket() {
            return FileKind::Socket;
        }
        if ft.is_block_device() {
            return FileKind::BlockDevice;
        }
        if ft.is_char_device() {
            return FileKind::CharDevice;
        }
    }
    if ft.is_symlink() {
        FileKind::Symlink
    } else if ft.is_dir() {
        FileKind::Dir
    } else if ft.is_file() {
        FileKind::File
    } else {
        FileKind::Other
    }
}

#[cfg(unix)]
fn stat_from_metadata(meta: &std::fs::Metadata) -> Stat {
    use std::os::unix::fs::MetadataExt;

    Stat {
        kind: kind_from_file_type(meta.file_type()),
        size: meta.len(),
        mode: meta.mode() & 0o7777,
        modified: meta.modified().ok(),
        accessed: meta.accessed().ok(),
        created: meta.created().ok(),
        nlink: meta.nlink(),
        inode: meta.ino(),
        uid: meta.uid(),
        gid: meta.gid(),
        blocks: meta.blocks(),
    }
}

#[cfg(not(unix))]
fn stat_from_metadata(meta: &std::fs::Metadata) -> Stat {
    let mode = if meta.permissions().readonly() { 0o444 } else { 0o644 };
    Stat {
        kind: kind_from_file_type(meta.file_type()),
        size: meta.len(),
        mode,
        modified: meta.modified().ok(),
        accessed: meta.accessed().ok(),
        created: meta.created().ok(),
        nlink: 1,
        inode: 0,
        uid: 0,
        gid: 0,
        blocks: 0,
    }
}

/// Read at most `limit` bytes from `path`.
pub fn read_prefix(fs: &dyn FileSystem, path: &Path, limit: u64) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    fs.open(path)?.take(limit).read_to_end(&mut buf)?;
    Ok(buf)
}
