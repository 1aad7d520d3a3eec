//! Content checksum field

use std::io::{self, Read};
use std::str::FromStr;

use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::entry::{Entry, cache_keys};
use crate::error::{ConfigError, ResolveError};
use crate::fs::FileSystem;
use crate::style::{SharedStyle, StyleKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl ChecksumKind {
    pub fn name(self) -> &'static str {
        match self {
            ChecksumKind::Md5 => "md5",
            ChecksumKind::Sha1 => "sha1",
            ChecksumKind::Sha224 => "sha224",
            ChecksumKind::Sha256 => "sha256",
            ChecksumKind::Sha384 => "sha384",
            ChecksumKind::Sha512 => "sha512",
        }
    }

    /// Length of the hex digest.
    pub fn hex_len(self) -> usize {
        match self {
            ChecksumKind::Md5 => 32,
            ChecksumKind::Sha1 => 40,
            ChecksumKind::Sha224 => 56,
            ChecksumKind::Sha256 => 64,
            ChecksumKind::Sha384 => 96,
            ChecksumKind::Sha512 => 128,
        }
    }

    pub fn hex_digest(self, data: &[u8]) -> String {
        let mut hasher = Hasher::new(self);
        hasher.update(data);
        hasher.finish_hex()
    }
}

/// Read size for streaming a file through the hashers.
const BUFFER_SIZE: usize = 64 * 1024;

enum Hasher {
    Md5(md5::Context),
    Sha1(Sha1),
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl Hasher {
    fn new(kind: ChecksumKind) -> Self {
        match kind {
            ChecksumKind::Md5 => Hasher::Md5(md5::Context::new()),
            ChecksumKind::Sha1 => Hasher::Sha1(Sha1::new()),
            ChecksumKind::Sha224 => Hasher::Sha224(Sha224::new()),
            ChecksumKind::Sha256 => Hasher::Sha256(Sha256::new()),
            ChecksumKind::Sha384 => Hasher::Sha384(Sha384::new()),
            ChecksumKind::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(h) => h.consume(data),
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha224(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha384(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    fn finish_hex(self) -> String {
        match self {
            Hasher::Md5(h) => format!("{:x}", h.compute()),
            Hasher::Sha1(h) => format!("{:x}", h.finalize()),
            Hasher::Sha224(h) => format!("{:x}", h.finalize()),
            Hasher::Sha256(h) => format!("{:x}", h.finalize()),
            Hasher::Sha384(h) => format!("{:x}", h.finalize()),
            Hasher::Sha512(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Hex digests of everything `reader` yields, one per kind, in one pass
/// through a fixed buffer.
pub fn stream_digests(mut reader: impl Read, kinds: &[ChecksumKind]) -> io::Result<Vec<String>> {
    let mut hashers: Vec<Hasher> = kinds.iter().map(|&k| Hasher::new(k)).collect();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        for hasher in &mut hashers {
            hasher.update(&buffer[..n]);
        }
    }
    Ok(hashers.into_iter().map(Hasher::finish_hex).collect())
}

impl FromStr for ChecksumKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(ChecksumKind::Md5),
            "sha1" => Ok(ChecksumKind::Sha1),
            "sha224" => Ok(ChecksumKind::Sha224),
            "sha256" => Ok(ChecksumKind::Sha256),
            "sha384" => Ok(ChecksumKind::Sha384),
            "sha512" => Ok(ChecksumKind::Sha512),
            _ => Err(ConfigError::UnknownChecksum(s.to_string())),
        }
    }
}

/// One or more space-separated hex digests of the file content, under a
/// field named like `Sum(md5,sha256)`.
pub struct ChecksumResolver {
    style: SharedStyle,
    kinds: Vec<ChecksumKind>,
    field: String,
}

impl ChecksumResolver {
    pub fn new(style: SharedStyle, kinds: Vec<ChecksumKind>) -> Self {
        let names: Vec<_> = kinds.iter().map(|k| k.name()).collect();
        Self {
            field: format!("Sum({})", names.join(",")),
            style,
            kinds,
        }
    }
}

impl super::Resolver for ChecksumResolver {
    fn field(&self) -> &str {
        &self.field
    }

    fn resolve(&self, entry: &mut Entry, fs: &dyn FileSystem) -> Result<String, ResolveError> {
        if !entry.stat.is_file() {
            return Err(ResolveError::Unavailable);
        }
        let sums = stream_digests(fs.open(&entry.path)?, &self.kinds)?;
        if let Some(i) = self.kinds.iter().position(|&k| k == ChecksumKind::Sha256) {
            entry.set_cache(cache_keys::SHA256, sums[i].as_str());
        }
        Ok(self.style.paint(StyleKind::Checksum, &sums.join(" ")))
    }
}
