//! Named actions applied to a resolved path.
//!
//! An action name and its option bag are parsed into an [`ActionRequest`]
//! before any backend I/O happens, so a missing or malformed option fails
//! fast with `InvalidArgument`. [`execute`] then applies the request against
//! the [`OperationContext`] produced by metadata resolution.

pub mod attributes;
pub mod delete;
pub mod list;
pub mod transfer;
pub mod write;

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::backends::Backend;
use crate::errors::{Result, StorageError};
use crate::files::EntryKind;
use crate::operation::OperationContext;

pub use attributes::{GroupOptions, OwnerOptions, PermissionOptions, TouchOptions};
pub use delete::DeleteOptions;
pub use list::ListOptions;
pub use transfer::{TargetAdapter, TransferMode, TransferOptions};
pub use write::WriteOptions;

/// The supported action names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Write,
    GetList,
    Delete,
    Copy,
    Move,
    ChangeOwner,
    ChangeGroup,
    ChangePermission,
    Touch,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::GetList => "getList",
            Self::Delete => "delete",
            Self::Copy => "copy",
            Self::Move => "move",
            Self::ChangeOwner => "changeOwner",
            Self::ChangeGroup => "changeGroup",
            Self::ChangePermission => "changePermission",
            Self::Touch => "touch",
        }
    }

    /// Whether the action modifies the connection it runs on. `copy` only
    /// modifies its target, which is checked separately.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Read | Self::GetList | Self::Copy)
    }
}

impl FromStr for Action {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "getlist" => Ok(Self::GetList),
            "delete" => Ok(Self::Delete),
            "copy" => Ok(Self::Copy),
            "move" => Ok(Self::Move),
            "changeowner" => Ok(Self::ChangeOwner),
            "changegroup" => Ok(Self::ChangeGroup),
            "changepermission" => Ok(Self::ChangePermission),
            "touch" => Ok(Self::Touch),
            _ => Err(StorageError::UnknownAction(s.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action together with its validated options.
#[derive(Debug, Clone)]
pub enum ActionRequest {
    Read,
    Write(WriteOptions),
    GetList(ListOptions),
    Delete(DeleteOptions),
    Copy(TransferOptions),
    Move(TransferOptions),
    ChangeOwner(OwnerOptions),
    ChangeGroup(GroupOptions),
    ChangePermission(PermissionOptions),
    Touch(TouchOptions),
}

impl ActionRequest {
    /// Validate `options` for `action`.
    pub fn parse(action: Action, options: &Value) -> Result<Self> {
        Ok(match action {
            Action::Read => Self::Read,
            Action::Write => Self::Write(from_options(action, options)?),
            Action::GetList => Self::GetList(from_options(action, options)?),
            Action::Delete => Self::Delete(from_options(action, options)?),
            Action::Copy => Self::Copy(TransferOptions::parse(options)?),
            Action::Move => Self::Move(TransferOptions::parse(options)?),
            Action::ChangeOwner => Self::ChangeOwner(OwnerOptions::parse(options)?),
            Action::ChangeGroup => Self::ChangeGroup(GroupOptions::parse(options)?),
            Action::ChangePermission => {
                Self::ChangePermission(PermissionOptions::parse(options)?)
            }
            Action::Touch => Self::Touch(TouchOptions::parse(options)?),
        })
    }

    pub fn action(&self) -> Action {
        match self {
            Self::Read => Action::Read,
            Self::Write(_) => Action::Write,
            Self::GetList(_) => Action::GetList,
            Self::Delete(_) => Action::Delete,
            Self::Copy(_) => Action::Copy,
            Self::Move(_) => Action::Move,
            Self::ChangeOwner(_) => Action::ChangeOwner,
            Self::ChangeGroup(_) => Action::ChangeGroup,
            Self::ChangePermission(_) => Action::ChangePermission,
            Self::Touch(_) => Action::Touch,
        }
    }
}

/// What an action produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// File bytes, from `read`.
    Content(Vec<u8>),
    /// Sorted paths, from `getList`.
    List(Vec<String>),
    /// Every other action.
    Done,
}

/// Apply `request` to the path described by `ctx`.
pub fn execute(
    backend: &mut dyn Backend,
    ctx: &OperationContext,
    request: &ActionRequest,
) -> Result<Outcome> {
    let action = request.action();
    if action.is_mutating() && backend.options().read_only {
        return Err(StorageError::PermissionDenied(format!(
            "{action} on {}: connection is read-only",
            ctx.path
        )));
    }

    info!("Executing {} on {}", action, ctx.path);
    match request {
        ActionRequest::Read => read(backend, ctx).map(Outcome::Content),
        ActionRequest::Write(opts) => write::write(backend, ctx, opts).map(|_| Outcome::Done),
        ActionRequest::GetList(opts) => list::get_list(ctx, opts).map(Outcome::List),
        ActionRequest::Delete(opts) => delete::delete(backend, ctx, opts).map(|_| Outcome::Done),
        ActionRequest::Copy(opts) => {
            transfer::transfer(backend, ctx, opts, TransferMode::Copy).map(|_| Outcome::Done)
        }
        ActionRequest::Move(opts) => {
            transfer::transfer(backend, ctx, opts, TransferMode::Move).map(|_| Outcome::Done)
        }
        ActionRequest::ChangeOwner(opts) => {
            attributes::change_owner(backend, ctx, opts).map(|_| Outcome::Done)
        }
        ActionRequest::ChangeGroup(opts) => {
            attributes::change_group(backend, ctx, opts).map(|_| Outcome::Done)
        }
        ActionRequest::ChangePermission(opts) => {
            attributes::change_permission(backend, ctx, opts).map(|_| Outcome::Done)
        }
        ActionRequest::Touch(opts) => attributes::touch(backend, ctx, opts).map(|_| Outcome::Done),
    }
}

/// Parse `action` and `options`, then [`execute`] them.
pub fn dispatch(
    backend: &mut dyn Backend,
    ctx: &OperationContext,
    action: &str,
    options: &Value,
) -> Result<Outcome> {
    let action: Action = action.parse()?;
    let request = ActionRequest::parse(action, options)?;
    execute(backend, ctx, &request)
}

fn read(backend: &mut dyn Backend, ctx: &OperationContext) -> Result<Vec<u8>> {
    let metadata = &ctx.metadata;
    if !metadata.exists {
        return Err(StorageError::NotFound(ctx.path.clone()));
    }
    if metadata.entry_type != Some(EntryKind::File) {
        return Err(StorageError::OperationFailed(format!(
            "{} is not a file",
            ctx.path
        )));
    }
    if !metadata.is_readable {
        return Err(StorageError::PermissionDenied(ctx.path.clone()));
    }
    backend.read_bytes(&ctx.path)
}

/// Deserialize an options struct out of the shared option bag. Keys that
/// belong to the connection or to other actions are ignored.
fn from_options<T: DeserializeOwned>(action: Action, options: &Value) -> Result<T> {
    let bag = if options.is_null() {
        Value::Object(Default::default())
    } else {
        options.clone()
    };
    serde_json::from_value(bag)
        .map_err(|e| StorageError::InvalidArgument(format!("{action} options: {e}")))
}

/// A required, non-empty string option.
fn required_string(options: &Value, key: &str) -> Result<String> {
    match options.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Null) | None => Err(StorageError::InvalidArgument(format!(
            "{key} is required"
        ))),
        Some(_) => Err(StorageError::InvalidArgument(format!(
            "{key} must be a non-empty string"
        ))),
    }
}
