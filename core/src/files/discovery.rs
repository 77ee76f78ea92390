//! Enumerate the files and directories beneath a path.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backends::Backend;
use crate::errors::Result;
use crate::path;

use super::RawEntry;

/// A file found during discovery, with its size in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredFile {
    pub path: String,
    pub size: u64,
}

/// Directories and files beneath a path, in pre-order.
///
/// When the path is a non-empty directory it is the first entry of
/// `directories`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverySet {
    pub directories: Vec<String>,
    pub files: Vec<DiscoveredFile>,
}

impl DiscoverySet {
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}

/// Walk `path` on `backend`.
///
/// A file (or link) yields itself. An empty directory yields an empty set.
/// Backends that do not list recursively contribute their direct children
/// only.
pub fn discover(backend: &mut dyn Backend, path: &str) -> Result<DiscoverySet> {
    let root = path::normalize(path);
    match backend.stat(&root)? {
        Some(entry) => discover_entry(backend, &root, &entry),
        None => Ok(DiscoverySet::default()),
    }
}

/// Same as [`discover`] for a path whose stat record is already known.
pub fn discover_entry(
    backend: &mut dyn Backend,
    root: &str,
    entry: &RawEntry,
) -> Result<DiscoverySet> {
    let mut set = DiscoverySet::default();
    if !entry.is_directory() {
        set.files.push(DiscoveredFile {
            path: root.to_string(),
            size: entry.size,
        });
        return Ok(set);
    }

    let children = backend.list_raw(root)?;
    if children.is_empty() {
        return Ok(set);
    }

    set.directories.push(root.to_string());
    let recursive = backend.lists_recursively();
    walk(backend, children, recursive, &mut set)?;

    debug!(
        "Discovered {} directories and {} files under {}",
        set.directories.len(),
        set.files.len(),
        root
    );
    Ok(set)
}

fn walk(
    backend: &mut dyn Backend,
    children: Vec<RawEntry>,
    recursive: bool,
    set: &mut DiscoverySet,
) -> Result<()> {
    for child in children {
        if child.is_directory() {
            set.directories.push(child.path.clone());
            if recursive {
                let grandchildren = backend.list_raw(&child.path)?;
                walk(backend, grandchildren, recursive, set)?;
            }
        } else if child.kind.is_some() {
            set.files.push(DiscoveredFile {
                path: child.path,
                size: child.size,
            });
        }
    }
    Ok(())
}
