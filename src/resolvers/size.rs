//! Size field, size units and recursive directory sizes

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::entry::{Entry, cache_keys};
use crate::error::{ConfigError, ResolveError};
use crate::fs::FileSystem;
use crate::style::{SharedStyle, StyleKind};

pub const SIZE_FIELD: &str = "Size";

/// Unit used to render sizes. `Auto` picks the largest unit below 1024.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeUnit {
    #[default]
    Auto,
    Bit,
    Byte,
    Kilo,
    Mega,
    Giga,
    Tera,
    Peta,
    Exa,
}

const SCALED_UNITS: [SizeUnit; 7] = [
    SizeUnit::Byte,
    SizeUnit::Kilo,
    SizeUnit::Mega,
    SizeUnit::Giga,
    SizeUnit::Tera,
    SizeUnit::Peta,
    SizeUnit::Exa,
];

impl SizeUnit {
    pub fn label(self) -> &'static str {
        match self {
            SizeUnit::Auto => "",
            SizeUnit::Bit => "bit",
            SizeUnit::Byte => "B",
            SizeUnit::Kilo => "KB",
            SizeUnit::Mega => "MB",
            SizeUnit::Giga => "GB",
            SizeUnit::Tera => "TB",
            SizeUnit::Peta => "PB",
            SizeUnit::Exa => "EB",
        }
    }

    /// Bytes per unit; `Auto` and `Bit` report 1.
    fn bytes(self) -> f64 {
        match self {
            SizeUnit::Auto | SizeUnit::Bit | SizeUnit::Byte => 1.0,
            SizeUnit::Kilo => 1024.0,
            SizeUnit::Mega => 1024f64.powi(2),
            SizeUnit::Giga => 1024f64.powi(3),
            SizeUnit::Tera => 1024f64.powi(4),
            SizeUnit::Peta => 1024f64.powi(5),
            SizeUnit::Exa => 1024f64.powi(6),
        }
    }
}

impl FromStr for SizeUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" | "" => Ok(SizeUnit::Auto),
            "bit" | "Bit" | "BIT" => Ok(SizeUnit::Bit),
            "B" | "b" | "byte" | "Byte" | "BYTE" => Ok(SizeUnit::Byte),
            "KB" | "kb" | "K" | "k" => Ok(SizeUnit::Kilo),
            "MB" | "mb" | "M" | "m" => Ok(SizeUnit::Mega),
            "GB" | "gb" | "G" | "g" => Ok(SizeUnit::Giga),
            "TB" | "tb" | "T" | "t" => Ok(SizeUnit::Tera),
            "PB" | "pb" | "P" | "p" => Ok(SizeUnit::Peta),
            "EB" | "eb" | "E" | "e" => Ok(SizeUnit::Exa),
            other => Err(ConfigError::UnknownSizeUnit(other.to_string())),
        }
    }
}

/// Format a size in bytes. Zero renders as "-".
pub fn format_size(bytes: u64, unit: SizeUnit) -> String {
    if bytes == 0 {
        return "-".to_string();
    }
    match unit {
        SizeUnit::Auto => {
            let mut v = bytes as f64;
            for unit in SCALED_UNITS {
                if v < 1024.0 {
                    return format!("{:.1} {}", v, unit.label());
                }
                v /= 1024.0;
            }
            format!("{:.1} {}", v * 1024.0, SizeUnit::Exa.label())
        }
        SizeUnit::Bit => format!("{} {}", bytes.saturating_mul(8), unit.label()),
        SizeUnit::Byte => format!("{} {}", bytes, unit.label()),
        _ => format!("{:.1} {}", bytes as f64 / unit.bytes(), unit.label()),
    }
}

/// Sum of the sizes of every non-directory below `path`, descending at most
/// `depth` levels (`depth < 0` is unlimited). Unreadable branches count as 0.
pub fn recursive_size(fs: &dyn FileSystem, path: &Path, depth: i64) -> u64 {
    let Ok(stat) = fs.stat(path) else {
        return 0;
    };
    if !stat.is_dir() {
        return stat.size;
    }
    let mut total = 0u64;
    let mut pending = vec![(path.to_path_buf(), 1i64)];
    while let Some((dir, level)) = pending.pop() {
        let Ok(listing) = fs.read_dir(&dir) else {
            continue;
        };
        for child in listing.children {
            let Ok(stat) = fs.stat(&child) else {
                continue;
            };
            if stat.is_dir() {
                if depth < 0 || level < depth {
                    pending.push((child, level + 1));
                }
            } else {
                total = total.saturating_add(stat.size);
            }
        }
    }
    total
}

/// Compute the recursive size of `entry` into its scratch cache, once.
pub fn prepare_recursive_size(entry: &mut Entry, fs: &dyn FileSystem, depth: i64) -> u64 {
    if let Some(size) = entry.cache_u64(cache_keys::RECURSIVE_SIZE) {
        return size;
    }
    let size = recursive_size(fs, &entry.path, depth);
    entry.set_cache(cache_keys::RECURSIVE_SIZE, size.to_string());
    size
}

/// Atomically accumulated total of every size rendered in a batch.
///
/// Only meaningful once the resolution phase has returned.
#[derive(Debug, Clone, Default)]
pub struct SizeTotal(Arc<AtomicU64>);

impl SizeTotal {
    pub fn add(&self, bytes: u64) {
        self.0.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

pub struct SizeResolver {
    style: SharedStyle,
    unit: SizeUnit,
    total: Option<SizeTotal>,
    recursive_depth: Option<i64>,
}

impl SizeResolver {
    pub fn new(style: SharedStyle, unit: SizeUnit) -> Self {
        Self {
            style,
            unit,
            total: None,
            recursive_depth: None,
        }
    }

    /// Add every rendered size to `total`.
    pub fn with_total(mut self, total: SizeTotal) -> Self {
        self.total = Some(total);
        self
    }

    /// Render directories with the size of their contents.
    pub fn with_recursive(mut self, depth: i64) -> Self {
        self.recursive_depth = Some(depth);
        self
    }
}

impl super::Resolver for SizeResolver {
    fn field(&self) -> &str {
        SIZE_FIELD
    }

    fn resolve(&self, entry: &mut Entry, fs: &dyn FileSystem) -> Result<String, ResolveError> {
        let bytes = match self.recursive_depth {
            Some(depth) => prepare_recursive_size(entry, fs, depth),
            None => entry.stat.size,
        };
        if let Some(total) = &self.total {
            total.add(bytes);
        }
        let text = format_size(bytes, self.unit);
        if text == "-" {
            return Ok(text);
        }
        Ok(self.style.paint(StyleKind::Size, &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::Stat;
    use crate::resolvers::Resolver;
    use crate::style::Plain;
    use crate::test_utils::MemoryFs;

    #[test]
    fn test_format_size_auto() {
        assert_eq!(format_size(0, SizeUnit::Auto), "-");
        assert_eq!(format_size(1, SizeUnit::Auto), "1.0 B");
        assert_eq!(format_size(1023, SizeUnit::Auto), "1023.0 B");
        assert_eq!(format_size(4444, SizeUnit::Auto), "4.3 KB");
        assert_eq!(format_size(55555, SizeUnit::Auto), "54.3 KB");
        assert_eq!(format_size(5 * 1024 * 1024, SizeUnit::Auto), "5.0 MB");
    }

    #[test]
    fn test_format_size_fixed_units() {
        assert_eq!(format_size(2, SizeUnit::Bit), "16 bit");
        assert_eq!(format_size(2048, SizeUnit::Byte), "2048 B");
        assert_eq!(format_size(2048, SizeUnit::Kilo), "2.0 KB");
    }

    #[test]
    fn test_parse_size_unit() {
        assert_eq!("k".parse::<SizeUnit>().unwrap(), SizeUnit::Kilo);
        assert_eq!("auto".parse::<SizeUnit>().unwrap(), SizeUnit::Auto);
        assert!("furlong".parse::<SizeUnit>().is_err());
    }

    #[test]
    fn test_total_accumulates() {
        let total = SizeTotal::default();
        let r = SizeResolver::new(Arc::new(Plain), SizeUnit::Byte).with_total(total.clone());
        let fs = MemoryFs::new();
        for size in [10, 20, 30] {
            let mut e = Entry::new(
                "/f",
                Stat {
                    size,
                    ..Default::default()
                },
            );
            r.resolve(&mut e, &fs).unwrap();
        }
        assert_eq!(total.get(), 60);
    }

    #[test]
    fn test_recursive_size_respects_depth() {
        let fs = MemoryFs::new();
        fs.add_dir("/r");
        fs.add_file("/r/a", vec![0; 10]);
        fs.add_dir("/r/sub");
        fs.add_file("/r/sub/b", vec![0; 5]);
        fs.add_dir("/r/sub/deep");
        fs.add_file("/r/sub/deep/c", vec![0; 1]);

        assert_eq!(recursive_size(&fs, Path::new("/r"), -1), 16);
        assert_eq!(recursive_size(&fs, Path::new("/r"), 1), 10);
        assert_eq!(recursive_size(&fs, Path::new("/r"), 2), 15);
        assert_eq!(recursive_size(&fs, Path::new("/r/a"), -1), 10);
    }

    #[test]
    fn test_recursive_resolver_uses_cache() {
        let fs = MemoryFs::new();
        fs.add_dir("/r");
        let mut e = Entry::from_path(&fs, Path::new("/r")).unwrap();
        e.set_cache(cache_keys::RECURSIVE_SIZE, "2048");
        let r = SizeResolver::new(Arc::new(Plain), SizeUnit::Auto).with_recursive(-1);
        assert_eq!(r.resolve(&mut e, &fs).unwrap(), "2.0 KB");
    }
}
