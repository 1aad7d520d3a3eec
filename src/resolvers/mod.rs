//! Attribute resolver plug-ins
//!
//! A [`Resolver`] computes one named field of one entry. A [`Collector`] is
//! the no-output variant: it only feeds auxiliary state (a duplicate table,
//! annotation lines). Both see exactly one entry at a time and may use its
//! scratch cache to share work with resolvers registered after them.

use crate::entry::Entry;
use crate::error::ResolveError;
use crate::fs::FileSystem;

pub mod checksum;
pub mod duplicate;
pub mod git;
pub mod mime;
pub mod name;
pub mod owner;
pub mod permission;
pub mod size;
pub mod stat;
pub mod symlink;
pub mod time;

pub use checksum::{ChecksumKind, ChecksumResolver};
pub use duplicate::DuplicateDetector;
pub use git::{GitResolver, GitStatusCache};
pub use mime::{CharsetResolver, MimeResolver};
pub use name::NameResolver;
pub use owner::{GroupResolver, IdNames, OwnerResolver};
pub use permission::{OctalResolver, PermissionResolver};
pub use size::{SizeResolver, SizeTotal, SizeUnit};
pub use stat::{BlocksResolver, InodeResolver, LinkResolver};
pub use symlink::SymlinkTargetAnnotator;
pub use time::{TimeFormat, TimeResolver};

/// Computes one field for one entry.
pub trait Resolver: Send + Sync {
    /// Name of the field this resolver writes.
    fn field(&self) -> &str;

    /// Render the field value. Errors become a sentinel for this field only.
    fn resolve(&self, entry: &mut Entry, fs: &dyn FileSystem) -> Result<String, ResolveError>;
}

/// Side-effect-only pass over one entry, run after its field resolvers.
pub trait Collector: Send + Sync {
    fn name(&self) -> &'static str;

    fn collect(&self, entry: &mut Entry, fs: &dyn FileSystem);
}

/// Lets a caller keep a handle on a collector's state after registering it.
impl<C: Collector + ?Sized> Collector for std::sync::Arc<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn collect(&self, entry: &mut Entry, fs: &dyn FileSystem) {
        (**self).collect(entry, fs)
    }
}
