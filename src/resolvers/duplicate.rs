//! Duplicate file detection

use std::collections::HashMap;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use sha2::{Digest, Sha256};

use crate::entry::{Entry, cache_keys};
use crate::fs::FileSystem;
use crate::resolvers::checksum::{ChecksumKind, stream_digests};

/// Files up to this size are always hashed whole.
const QUICK_THRESHOLD: u64 = 16 * 1024;

/// Groups regular files by size and content hash.
///
/// Quick mode hashes the head, middle and tail of large files; thorough mode
/// hashes every byte. The table is only complete once resolution returns.
#[derive(Debug, Default)]
pub struct DuplicateDetector {
    thorough: bool,
    table: Mutex<HashMap<String, Vec<PathBuf>>>,
}

impl DuplicateDetector {
    pub fn new(thorough: bool) -> Self {
        Self {
            thorough,
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Sets of paths sharing a hash, each set sorted, sets ordered by their
    /// first path.
    pub fn result(&self) -> Vec<Vec<PathBuf>> {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let mut groups: Vec<Vec<PathBuf>> = table
            .values()
            .filter(|paths| paths.len() > 1)
            .map(|paths| {
                let mut paths = paths.clone();
                paths.sort();
                paths
            })
            .collect();
        groups.sort();
        groups
    }

    /// Table key: the sampling mode, the file size and the sha256 of the
    /// hashed bytes. Files of different sizes never share a key.
    fn key(&self, entry: &Entry, fs: &dyn FileSystem) -> io::Result<String> {
        let size = entry.stat.size;
        let (prefix, digest) = if self.thorough {
            ("", whole_file_sha256(entry, fs)?)
        } else if size <= QUICK_THRESHOLD {
            ("f", whole_file_sha256(entry, fs)?)
        } else {
            let mut reader = fs.open(&entry.path)?;
            let mut hasher = Sha256::new();
            let mut pos = 0u64;
            for (start, len) in crucial_ranges(size) {
                io::copy(&mut (&mut reader).take(start.saturating_sub(pos)), &mut io::sink())?;
                let mut chunk = Vec::with_capacity(len as usize);
                (&mut reader).take(len).read_to_end(&mut chunk)?;
                hasher.update(&chunk);
                pos = pos.max(start) + chunk.len() as u64;
            }
            ("s", format!("{:x}", hasher.finalize()))
        };
        Ok(format!("{prefix}{size}:{digest}"))
    }
}

fn whole_file_sha256(entry: &Entry, fs: &dyn FileSystem) -> io::Result<String> {
    if let Some(hex) = entry.cache_str(cache_keys::SHA256) {
        return Ok(hex.to_string());
    }
    let mut sums = stream_digests(fs.open(&entry.path)?, &[ChecksumKind::Sha256])?;
    Ok(sums.swap_remove(0))
}

/// (offset, length) of the head, middle and tail samples of a large file.
fn crucial_ranges(size: u64) -> [(u64, u64); 3] {
    [
        (0, QUICK_THRESHOLD / 2),
        (size / 2, QUICK_THRESHOLD / 4),
        (size - QUICK_THRESHOLD / 4, QUICK_THRESHOLD / 4),
    ]
}

impl super::Collector for DuplicateDetector {
    fn name(&self) -> &'static str {
        "duplicate"
    }

    fn collect(&self, entry: &mut Entry, fs: &dyn FileSystem) {
        if !entry.stat.is_file() {
            return;
        }
        let key = match self.key(entry, fs) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!(path = %entry.path.display(), error = %e, "skipping duplicate hash");
                return;
            }
        };
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .push(entry.path.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolvers::Collector;
    use crate::test_utils::MemoryFs;
    use std::path::Path;

    fn collect_all(detector: &DuplicateDetector, fs: &MemoryFs, paths: &[&str]) {
        for path in paths {
            let mut e = Entry::from_path(fs, Path::new(path)).unwrap();
            detector.collect(&mut e, fs);
        }
    }

    #[test]
    fn test_groups_identical_content() {
        let fs = MemoryFs::new();
        fs.add_dir("/d");
        fs.add_file("/d/a", b"same".to_vec());
        fs.add_file("/d/b", b"same".to_vec());
        fs.add_file("/d/c", b"different".to_vec());

        for thorough in [false, true] {
            let detector = DuplicateDetector::new(thorough);
            collect_all(&detector, &fs, &["/d", "/d/a", "/d/b", "/d/c"]);
            assert_eq!(
                detector.result(),
                vec![vec![PathBuf::from("/d/a"), PathBuf::from("/d/b")]]
            );
        }
    }

    #[test]
    fn test_quick_mode_samples_large_files() {
        let fs = MemoryFs::new();
        let mut a = vec![1u8; 64 * 1024];
        let mut b = a.clone();
        // Differ outside every sampled range.
        a[12 * 1024] = 2;
        b[12 * 1024] = 3;
        fs.add_file("/a", a);
        fs.add_file("/b", b);

        let quick = DuplicateDetector::new(false);
        collect_all(&quick, &fs, &["/a", "/b"]);
        assert_eq!(quick.result().len(), 1);

        let thorough = DuplicateDetector::new(true);
        collect_all(&thorough, &fs, &["/a", "/b"]);
        assert!(thorough.result().is_empty());
    }

    #[test]
    fn test_different_sizes_never_match() {
        let fs = MemoryFs::new();
        fs.add_file("/a", vec![0u8; 20 * 1024]);
        fs.add_file("/b", vec![0u8; 40 * 1024]);

        for thorough in [false, true] {
            let detector = DuplicateDetector::new(thorough);
            collect_all(&detector, &fs, &["/a", "/b"]);
            assert!(detector.result().is_empty());
        }
    }

    #[test]
    fn test_thorough_reuses_cached_digest() {
        let fs = MemoryFs::new();
        fs.add_file("/a", b"one".to_vec());
        fs.add_file("/b", b"two".to_vec());
        let detector = DuplicateDetector::new(true);
        for path in ["/a", "/b"] {
            let mut e = Entry::from_path(&fs, Path::new(path)).unwrap();
            e.set_cache(cache_keys::SHA256, "same-digest");
            detector.collect(&mut e, &fs);
        }
        assert_eq!(detector.result().len(), 1);
    }

    #[test]
    fn test_poisoned_table_keeps_groups() {
        let fs = MemoryFs::new();
        fs.add_file("/a", b"same".to_vec());
        fs.add_file("/b", b"same".to_vec());
        let detector = DuplicateDetector::new(false);
        collect_all(&detector, &fs, &["/a"]);
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = detector.table.lock().unwrap();
            panic!("poisoned while holding the table");
        }));
        assert!(detector.table.is_poisoned());

        collect_all(&detector, &fs, &["/b"]);
        assert_eq!(
            detector.result(),
            vec![vec![PathBuf::from("/a"), PathBuf::from("/b")]]
        );
    }
}
