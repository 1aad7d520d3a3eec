//! Error types and exit-status classification

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of one resolver on one entry. Never aborts a batch; the engine
/// renders [`ResolveError::sentinel`] in place of the field value.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The attribute does not apply to this entry (e.g. checksum of a directory).
    #[error("unavailable")]
    Unavailable,

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Detection(String),
}

impl ResolveError {
    /// Text rendered in place of the field value.
    pub fn sentinel(&self) -> String {
        match self {
            ResolveError::Unavailable => "-".to_string(),
            ResolveError::Io(e) => match e.kind() {
                io::ErrorKind::PermissionDenied => "permission_denied".to_string(),
                io::ErrorKind::NotFound => "not_found".to_string(),
                _ => "failed_to_read".to_string(),
            },
            ResolveError::Detection(msg) => msg.clone(),
        }
    }
}

/// Failure while walking one directory. Recorded; sibling branches continue.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("cannot open directory '{}': {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot access '{}': {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WalkError {
    pub fn path(&self) -> &PathBuf {
        match self {
            WalkError::ReadDir { path, .. } | WalkError::Stat { path, .. } => path,
        }
    }
}

/// Invalid configuration, detected before any concurrent phase starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown sort key '{0}'")]
    UnknownSortKey(String),

    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("invalid duration '{value}': {source}")]
    InvalidDuration {
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("unknown size unit '{0}'")]
    UnknownSizeUnit(String),

    #[error("unknown checksum type '{0}'")]
    UnknownChecksum(String),

    #[error("unknown time type '{0}'")]
    UnknownTimeKind(String),

    #[error("invalid time style '{0}'")]
    UnknownTimeStyle(String),

    #[error("unknown tree style '{0}'")]
    UnknownTreeStyle(String),

    #[error("invalid gitignore: {0}")]
    Gitignore(String),

    #[error("failed to read config file {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Inconsistent depth/parent tags handed to the tree assembler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssembleError {
    #[error("batch has no depth-0 entry")]
    MissingRoot,

    #[error("batch has {0} depth-0 entries")]
    MultipleRoots(usize),

    #[error("entry '{}' has no parent node '{}'", path.display(), parent.display())]
    Orphan { path: PathBuf, parent: PathBuf },
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot access '{}': {source}", path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error("error writing output: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Aggregated outcome of a whole invocation.
///
/// `Serious` means a requested root produced no output at all; `Minor` means a
/// subset of fields or entries degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Severity {
    #[default]
    Ok,
    Minor,
    Serious,
}

impl Severity {
    /// Keep the worse of the two.
    pub fn escalate(&mut self, other: Severity) {
        if other > *self {
            *self = other;
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Severity::Ok => 0,
            Severity::Minor => 1,
            Severity::Serious => 2,
        }
    }
}
