//! The `delete` action.

use serde::Deserialize;
use tracing::{debug, info};

use crate::backends::Backend;
use crate::errors::{Result, StorageError};
use crate::files::DiscoverySet;
use crate::operation::OperationContext;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeleteOptions {
    pub delete_subdirectories: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            delete_subdirectories: true,
        }
    }
}

/// Fails with `PermissionDenied` when the operation path is the configured
/// root. Shared by `delete` and the cleanup half of `move`.
pub(crate) fn ensure_not_root(backend: &dyn Backend, ctx: &OperationContext) -> Result<()> {
    if ctx.metadata.is_root || backend.absolute_path(&ctx.path) == backend.root_path() {
        return Err(StorageError::PermissionDenied(format!(
            "refusing to delete the root {}",
            ctx.path
        )));
    }
    Ok(())
}

/// Delete the operation path and everything discovered beneath it.
///
/// The configured root can never be deleted. With
/// `delete_subdirectories == false` a directory that has subdirectories is
/// refused before anything is removed.
pub fn delete(backend: &mut dyn Backend, ctx: &OperationContext, opts: &DeleteOptions) -> Result<()> {
    ensure_not_root(backend, ctx)?;
    if !ctx.metadata.exists {
        return Err(StorageError::NotFound(ctx.path.clone()));
    }
    if !opts.delete_subdirectories && ctx.discovery.directories.iter().any(|d| *d != ctx.path) {
        return Err(StorageError::OperationFailed(format!(
            "{} has subdirectories and delete_subdirectories is false",
            ctx.path
        )));
    }

    remove_tree(backend, &ctx.path, ctx.metadata.is_directory, &ctx.discovery)?;
    info!("Deleted {}", ctx.path);
    Ok(())
}

/// Remove every discovered file, then every discovered directory deepest
/// first. An empty directory (nothing discovered) is removed directly.
pub(crate) fn remove_tree(
    backend: &mut dyn Backend,
    root: &str,
    is_directory: bool,
    discovery: &DiscoverySet,
) -> Result<()> {
    let mut files: Vec<&str> = discovery.file_paths().collect();
    files.sort_unstable();
    for file in files {
        debug!("Deleting file {}", file);
        backend.delete_file(file)?;
    }

    if !is_directory {
        return Ok(());
    }

    let mut directories: Vec<&str> = discovery.directories.iter().map(String::as_str).collect();
    if directories.is_empty() {
        directories.push(root);
    }
    directories.sort_unstable_by(|a, b| b.cmp(a));
    for dir in directories {
        debug!("Removing directory {}", dir);
        backend.remove_dir(dir)?;
    }
    Ok(())
}
