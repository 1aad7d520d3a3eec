//! Owner and group fields

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::entry::Entry;
use crate::error::ResolveError;
use crate::fs::FileSystem;
use crate::style::{SharedStyle, StyleKind};

pub const OWNER_FIELD: &str = "Owner";
pub const OWNER_UID_FIELD: &str = "Owner-uid";
pub const GROUP_FIELD: &str = "Group";
pub const GROUP_UID_FIELD: &str = "Group-uid";

#[cfg(unix)]
fn lookup_user(uid: u32) -> Option<String> {
    use nix::unistd::{Uid, User};
    User::from_uid(Uid::from_raw(uid)).ok().flatten().map(|u| u.name)
}

#[cfg(unix)]
fn lookup_group(gid: u32) -> Option<String> {
    use nix::unistd::{Gid, Group};
    Group::from_gid(Gid::from_raw(gid))
        .ok()
        .flatten()
        .map(|g| g.name)
}

#[cfg(not(unix))]
fn lookup_user(_uid: u32) -> Option<String> {
    None
}

#[cfg(not(unix))]
fn lookup_group(_gid: u32) -> Option<String> {
    None
}

/// Memoized uid/gid → name lookups, shared across worker threads.
///
/// Unknown ids render as the number itself.
#[derive(Debug, Default)]
pub struct IdNames {
    users: Mutex<HashMap<u32, String>>,
    groups: Mutex<HashMap<u32, String>>,
}

impl IdNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self, uid: u32) -> String {
        cached(&self.users, uid, lookup_user)
    }

    pub fn group(&self, gid: u32) -> String {
        cached(&self.groups, gid, lookup_group)
    }
}

fn cached(table: &Mutex<HashMap<u32, String>>, id: u32, lookup: fn(u32) -> Option<String>) -> String {
    let lock = || table.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(name) = lock().get(&id) {
        return name.clone();
    }
    let name = lookup(id).unwrap_or_else(|| id.to_string());
    lock().insert(id, name.clone());
    name
}

pub struct OwnerResolver {
    style: SharedStyle,
    names: Arc<IdNames>,
    numeric: bool,
}

impl OwnerResolver {
    pub fn new(style: SharedStyle, names: Arc<IdNames>) -> Self {
        Self {
            style,
            names,
            numeric: false,
        }
    }

    /// Render the uid instead of the user name.
    pub fn numeric(mut self, numeric: bool) -> Self {
        self.numeric = numeric;
        self
    }
}

impl super::Resolver for OwnerResolver {
    fn field(&self) -> &str {
        if self.numeric {
            OWNER_UID_FIELD
        } else {
            OWNER_FIELD
        }
    }

    fn resolve(&self, entry: &mut Entry, _fs: &dyn FileSystem) -> Result<String, ResolveError> {
        let text = if self.numeric {
            entry.stat.uid.to_string()
        } else {
            self.names.user(entry.stat.uid)
        };
        Ok(self.style.paint(StyleKind::Owner, &text))
    }
}

pub struct GroupResolver {
    style: SharedStyle,
    names: Arc<IdNames>,
    numeric: bool,
}

impl GroupResolver {
    pub fn new(style: SharedStyle, names: Arc<IdNames>) -> Self {
        Self {
            style,
            names,
            numeric: false,
        }
    }

    /// Render the gid instead of the group name.
    pub fn numeric(mut self, numeric: bool) -> Self {
        self.numeric = numeric;
        self
    }
}

impl super::Resolver for GroupResolver {
    fn field(&self) -> &str {
        if self.numeric {
            GROUP_UID_FIELD
        } else {
            GROUP_FIELD
        }
    }

    fn resolve(&self, entry: &mut Entry, _fs: &dyn FileSystem) -> Result<String, ResolveError> {
        let text = if self.numeric {
            entry.stat.gid.to_string()
        } else {
            self.names.group(entry.stat.gid)
        };
        Ok(self.style.paint(StyleKind::Group, &text))
    }
}
