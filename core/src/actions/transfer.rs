//! The `copy` and `move` actions.
//!
//! Both run on one backend or, when `target_adapter` names another
//! backend, from the current connection to a second scoped session. Files
//! are transferred whole; a failure part way leaves what was already
//! written in place.

use serde_json::Value;
use tracing::info;

use crate::backends::{Backend, BackendKind};
use crate::config::ConnectionOptions;
use crate::errors::{Result, StorageError};
use crate::operation::{OperationContext, Session};
use crate::path;

use super::delete::{ensure_not_root, remove_tree};
use super::write::{ensure_directory, put_file};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Copy,
    Move,
}

/// A second backend to copy or move into.
#[derive(Debug, Clone)]
pub struct TargetAdapter {
    pub kind: BackendKind,
    pub options: ConnectionOptions,
}

impl TargetAdapter {
    /// `null`, `""` and `"current"` mean the current connection; an object
    /// `{"backend": "<kind>", ...connection options}` opens another one.
    fn parse(value: Option<&Value>) -> Result<Option<Self>> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() || s.eq_ignore_ascii_case("current") => {
                Ok(None)
            }
            Some(Value::Object(map)) => {
                let kind = match map.get("backend") {
                    Some(Value::String(kind)) => kind.parse::<BackendKind>()?,
                    _ => {
                        return Err(StorageError::InvalidArgument(
                            "target_adapter.backend is required".to_string(),
                        ))
                    }
                };
                let options = ConnectionOptions::from_value(&Value::Object(map.clone()))
                    .map_err(|e| StorageError::InvalidArgument(format!("target_adapter: {e}")))?
                    .expand();
                Ok(Some(Self { kind, options }))
            }
            Some(other) => Err(StorageError::InvalidArgument(format!(
                "target_adapter must be an object, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Directory to copy into; empty means the source's parent.
    pub target_directory: String,
    /// New name at the destination; empty keeps the source name.
    pub target_name: String,
    pub replace: bool,
    pub target_adapter: Option<TargetAdapter>,
}

impl TransferOptions {
    pub(crate) fn parse(options: &Value) -> Result<Self> {
        let target_directory = match options.get("target_directory") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => {
                return Err(StorageError::InvalidArgument(
                    "target_directory is required".to_string(),
                ))
            }
            Some(other) => {
                return Err(StorageError::InvalidArgument(format!(
                    "target_directory must be a string, got {other}"
                )))
            }
        };
        let target_name = match options.get("target_name") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => {
                return Err(StorageError::InvalidArgument(format!(
                    "target_name must be a string, got {other}"
                )))
            }
        };
        let replace = match options.get("replace") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) | None => true,
            Some(other) => {
                return Err(StorageError::InvalidArgument(format!(
                    "replace must be a boolean, got {other}"
                )))
            }
        };

        Ok(Self {
            target_directory,
            target_name,
            replace,
            target_adapter: TargetAdapter::parse(options.get("target_adapter"))?,
        })
    }
}

/// Copy or move the operation path, opening a target session first when a
/// target adapter is configured.
pub fn transfer(
    backend: &mut dyn Backend,
    ctx: &OperationContext,
    opts: &TransferOptions,
    mode: TransferMode,
) -> Result<()> {
    let Some(adapter) = &opts.target_adapter else {
        return move_or_copy(backend, None, ctx, opts, mode);
    };

    let mut session = Session::open(adapter.kind, adapter.options.clone())?;
    let result = move_or_copy(backend, Some(session.backend_mut()), ctx, opts, mode);
    let closed = session.close();
    result?;
    closed
}

/// Copy or move `ctx.path` from `source` into `target` (or back into
/// `source` when `target` is `None`).
pub fn move_or_copy(
    source: &mut dyn Backend,
    mut target: Option<&mut dyn Backend>,
    ctx: &OperationContext,
    opts: &TransferOptions,
    mode: TransferMode,
) -> Result<()> {
    let same_backend = target.is_none();
    let metadata = &ctx.metadata;
    let source_path = ctx.path.as_str();

    if mode == TransferMode::Move {
        ensure_not_root(source, ctx)?;
    }
    if !metadata.exists {
        return Err(StorageError::NotFound(ctx.path.clone()));
    }

    let parent = path::parent(source_path);
    let target_dir = if opts.target_directory.trim().is_empty() {
        parent.clone().ok_or_else(|| {
            StorageError::InvalidArgument(format!(
                "{source_path} has no parent; target_directory is required"
            ))
        })?
    } else {
        path::normalize(&opts.target_directory)
    };

    if opts.target_name.is_empty() && same_backend && parent.as_deref() == Some(target_dir.as_str())
    {
        return Err(StorageError::InvalidArgument(
            "target_name is required when the target directory is the source's parent".to_string(),
        ));
    }

    if mode == TransferMode::Move && !metadata.is_writeable {
        return Err(StorageError::PermissionDenied(format!(
            "cannot move {source_path}: source is not writeable"
        )));
    }

    {
        let destination = on_target(source, &mut target);
        if destination.options().read_only {
            return Err(StorageError::PermissionDenied(format!(
                "cannot write to {target_dir}: target connection is read-only"
            )));
        }
        match destination.stat(&target_dir)? {
            None => return Err(StorageError::NotFound(target_dir)),
            Some(entry) if !entry.is_directory() => {
                return Err(StorageError::OperationFailed(format!(
                    "{target_dir} is not a directory"
                )))
            }
            Some(entry) if !entry.access.writeable => {
                return Err(StorageError::PermissionDenied(target_dir))
            }
            Some(_) => {}
        }
    }

    if metadata.is_directory {
        let target_root = if opts.target_name.is_empty() {
            target_dir.clone()
        } else {
            path::join(&target_dir, &opts.target_name)
        };
        if same_backend && path::is_within(&target_root, source_path) {
            return Err(StorageError::InvalidArgument(format!(
                "cannot copy {source_path} into itself ({target_root})"
            )));
        }

        ensure_directory(on_target(source, &mut target), &target_root)?;

        let mut directories: Vec<&str> = ctx.discovery.directories.iter().map(String::as_str).collect();
        directories.sort_unstable();
        for dir in directories {
            let new_dir = path::build_new_path(&target_root, dir, source_path)?;
            ensure_directory(on_target(source, &mut target), &new_dir)?;
        }

        let mut files: Vec<&str> = ctx.discovery.file_paths().collect();
        files.sort_unstable();
        for file in files {
            let new_file = path::build_new_path(&target_root, file, source_path)?;
            let data = source.read_bytes(file)?;
            put_file(on_target(source, &mut target), &new_file, &data, opts.replace)?;
        }
    } else {
        let name = if opts.target_name.is_empty() {
            path::name(source_path)
        } else {
            opts.target_name.as_str()
        };
        let destination = path::join(&target_dir, name);
        if same_backend && destination == source_path {
            return Err(StorageError::InvalidArgument(format!(
                "source and destination are both {source_path}"
            )));
        }

        let data = source.read_bytes(source_path)?;
        put_file(on_target(source, &mut target), &destination, &data, opts.replace)?;
    }

    if mode == TransferMode::Move {
        remove_tree(source, source_path, metadata.is_directory, &ctx.discovery)?;
    }

    info!(
        "{} {} to {}",
        if mode == TransferMode::Move { "Moved" } else { "Copied" },
        source_path,
        target_dir
    );
    Ok(())
}

fn on_target<'a>(
    source: &'a mut dyn Backend,
    target: &'a mut Option<&mut dyn Backend>,
) -> &'a mut dyn Backend {
    match target {
        Some(t) => &mut **t,
        None => source,
    }
}
