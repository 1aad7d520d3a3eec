//! Run configuration and the optional config file

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::sort::SortSpec;
use crate::tree::GlyphSet;
use crate::walk::WalkerConfig;

/// How roots are traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Direct children of each root.
    #[default]
    List,
    /// Every entry below each root, as a flat list.
    Recurse,
    /// Every entry below each root, drawn as a tree.
    Tree,
}

/// What to list and in which order.
#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub mode: Mode,
    /// Maximum directory depth to read; negative is unlimited.
    pub depth: i64,
    /// Maximum entries per root after sorting; 0 is unlimited.
    pub limit: usize,
    pub sort: Vec<SortSpec>,
    pub reverse: bool,
    pub dir_first: bool,
    /// Worker threads; 0 uses available parallelism.
    pub jobs: usize,
    pub walker: WalkerConfig,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            mode: Mode::List,
            depth: -1,
            limit: 0,
            sort: Vec::new(),
            reverse: false,
            dir_first: false,
            jobs: 0,
            walker: WalkerConfig::default(),
        }
    }
}

/// How a resolved batch is printed.
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub use_color: bool,
    pub json: bool,
    pub header: bool,
    pub footer: bool,
    pub total_size: bool,
    pub glyphs: GlyphSet,
}

/// Contents of `config.toml`.
///
/// ```toml
/// args = ["--dir-first", "--sort", "name"]
///
/// [tree-style]
/// tee = "├─ "
/// corner = "└─ "
/// continuation = "│  "
/// blank = "   "
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    /// Arguments inserted before the command-line arguments.
    pub args: Vec<String>,
    pub tree_style: Option<GlyphSet>,
}

impl FileConfig {
    /// Default location: `$XDG_CONFIG_HOME/lsg/config.toml` on Linux, the
    /// platform equivalent elsewhere.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lsg").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Read a config file. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::ConfigIo {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config = toml::from_str(&text).map_err(|source| ConfigError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(Some(config))
    }

    /// Load from the default location, or nothing when `disabled`.
    pub fn discover(disabled: bool) -> Result<Self, ConfigError> {
        if disabled {
            return Ok(Self::default());
        }
        match Self::default_path() {
            Some(path) => Ok(Self::load(&path)?.unwrap_or_default()),
            None => Ok(Self::default()),
        }
    }

    /// `argv` with the configured arguments inserted after the program name.
    pub fn merge_args<I, T>(&self, argv: I) -> Vec<OsString>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let mut merged: Vec<OsString> = argv.next().into_iter().collect();
        merged.extend(self.args.iter().map(OsString::from));
        merged.extend(argv);
        merged
    }
}

/// Parse an age bound: a duration before `now` (`"2h"`, `"3 days"`) or an
/// absolute timestamp (`"2024-05-01 12:00:00"`).
pub fn parse_age(value: &str, now: SystemTime) -> Result<SystemTime, ConfigError> {
    let value = value.trim();
    match humantime::parse_duration(value) {
        Ok(duration) => Ok(now.checked_sub(duration).unwrap_or(SystemTime::UNIX_EPOCH)),
        Err(source) => humantime::parse_rfc3339_weak(value)
            .map_err(|_| ConfigError::InvalidDuration {
                value: value.to_string(),
                source,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_parse_age_duration() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(10_000);
        assert_eq!(
            parse_age("1h", now).unwrap(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(6_400)
        );
    }

    #[test]
    fn test_parse_age_timestamp() {
        let t = parse_age("1970-01-02 00:00:00", SystemTime::now()).unwrap();
        assert_eq!(t, SystemTime::UNIX_EPOCH + Duration::from_secs(86_400));
    }

    #[test]
    fn test_parse_age_invalid() {
        assert!(matches!(
            parse_age("soon", SystemTime::now()),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
args = ["--dir-first"]

[tree-style]
tee = "+ "
corner = "` "
continuation = "| "
blank = "  "
"#,
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap().unwrap();
        assert_eq!(config.args, vec!["--dir-first"]);
        assert_eq!(
            config.tree_style,
            Some(GlyphSet::custom("+ ", "` ", "| ", "  "))
        );
    }

    #[test]
    fn test_missing_and_broken_config() {
        let dir = TempDir::new().unwrap();
        assert_eq!(FileConfig::load(&dir.path().join("nope.toml")).unwrap(), None);

        let path = dir.path().join("bad.toml");
        fs::write(&path, "args = 3").unwrap();
        assert!(matches!(
            FileConfig::load(&path),
            Err(ConfigError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_merge_args() {
        let config = FileConfig {
            args: vec!["-a".into()],
            tree_style: None,
        };
        let merged = config.merge_args(["lsg".to_string(), "/tmp".to_string()]);
        assert_eq!(merged, vec!["lsg", "-a", "/tmp"]);
        assert!(FileConfig::discover(true).unwrap().args.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_merge_args_keeps_non_utf8_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let raw = std::ffi::OsStr::from_bytes(b"caf\xe9");
        let config = FileConfig {
            args: vec!["-a".into()],
            tree_style: None,
        };
        let merged = config.merge_args([OsString::from("lsg"), raw.to_os_string()]);
        assert_eq!(merged[2].as_bytes(), b"caf\xe9");
    }
}
