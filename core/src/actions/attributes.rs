//! `changeOwner`, `changeGroup`, `changePermission` and `touch`.
//!
//! Permission and timestamp changes are verified by re-reading the entry
//! afterwards; a mismatch is an `Integrity` error.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use crate::backends::Backend;
use crate::config::parse_octal_mode;
use crate::errors::{Result, StorageError};
use crate::files::{format_permissions, EntryKind};
use crate::operation::OperationContext;

use super::required_string;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerOptions {
    pub user_name: String,
}

impl OwnerOptions {
    pub(crate) fn parse(options: &Value) -> Result<Self> {
        Ok(Self {
            user_name: required_string(options, "user_name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOptions {
    /// Group name or numeric id.
    pub group_id: String,
}

impl GroupOptions {
    pub(crate) fn parse(options: &Value) -> Result<Self> {
        Ok(Self {
            group_id: required_string(options, "group_id")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionOptions {
    pub permission: u32,
}

impl PermissionOptions {
    pub(crate) fn parse(options: &Value) -> Result<Self> {
        let raw = options
            .get("permission")
            .filter(|v| !v.is_null())
            .ok_or_else(|| StorageError::InvalidArgument("permission is required".to_string()))?;
        let permission = parse_octal_mode(raw)
            .filter(|mode| *mode <= 0o7777)
            .ok_or_else(|| {
                StorageError::InvalidArgument(format!(
                    "permission must be an octal mode such as 0755, got {raw}"
                ))
            })?;
        Ok(Self { permission })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchOptions {
    /// `None` means now.
    pub modification_time: Option<DateTime<Utc>>,
    /// `None` means now.
    pub access_time: Option<DateTime<Utc>>,
}

impl TouchOptions {
    pub(crate) fn parse(options: &Value) -> Result<Self> {
        Ok(Self {
            modification_time: parse_time(options, "modification_time")?,
            access_time: parse_time(options, "access_time")?,
        })
    }
}

/// Accepts unix seconds (number or numeric string) or RFC 3339.
fn parse_time(options: &Value, key: &str) -> Result<Option<DateTime<Utc>>> {
    let invalid = || StorageError::InvalidArgument(format!("{key} is not a valid timestamp"));
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let secs = n.as_i64().ok_or_else(invalid)?;
            DateTime::from_timestamp(secs, 0).map(Some).ok_or_else(invalid)
        }
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => {
            if let Ok(secs) = s.trim().parse::<i64>() {
                return DateTime::from_timestamp(secs, 0).map(Some).ok_or_else(invalid);
            }
            DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|_| invalid())
        }
        Some(_) => Err(invalid()),
    }
}

fn require_existing(ctx: &OperationContext) -> Result<()> {
    if ctx.metadata.exists {
        Ok(())
    } else {
        Err(StorageError::NotFound(ctx.path.clone()))
    }
}

pub fn change_owner(backend: &mut dyn Backend, ctx: &OperationContext, opts: &OwnerOptions) -> Result<()> {
    require_existing(ctx)?;
    backend.chown(&ctx.path, &opts.user_name)?;
    info!("Changed owner of {} to {}", ctx.path, opts.user_name);
    Ok(())
}

pub fn change_group(backend: &mut dyn Backend, ctx: &OperationContext, opts: &GroupOptions) -> Result<()> {
    require_existing(ctx)?;
    backend.chgrp(&ctx.path, &opts.group_id)?;
    info!("Changed group of {} to {}", ctx.path, opts.group_id);
    Ok(())
}

/// Apply the mode, then check the permission bits took effect. Backends
/// that cannot report a mode are not checked, and neither are links: the
/// change lands on the link target while `stat` reports the link itself.
pub fn change_permission(
    backend: &mut dyn Backend,
    ctx: &OperationContext,
    opts: &PermissionOptions,
) -> Result<()> {
    require_existing(ctx)?;
    backend.chmod(&ctx.path, opts.permission)?;

    let entry = backend
        .stat(&ctx.path)?
        .ok_or_else(|| StorageError::NotFound(ctx.path.clone()))?;
    let checked_mode = entry.mode.filter(|_| entry.kind != Some(EntryKind::Link));
    if let Some(actual) = checked_mode {
        if actual & 0o777 != opts.permission & 0o777 {
            return Err(StorageError::Integrity(format!(
                "{} has mode {} after chmod, expected {}",
                ctx.path,
                format_permissions(actual),
                format_permissions(opts.permission)
            )));
        }
    }
    info!("Changed mode of {} to {:04o}", ctx.path, opts.permission);
    Ok(())
}

/// Set timestamps (creating an empty file when missing), then check the
/// requested modification time took effect. Links are not checked, for the
/// same reason as in [`change_permission`].
pub fn touch(backend: &mut dyn Backend, ctx: &OperationContext, opts: &TouchOptions) -> Result<()> {
    backend.touch(&ctx.path, opts.modification_time, opts.access_time)?;

    if let Some(expected) = opts.modification_time.filter(|_| !ctx.metadata.is_link) {
        let actual = backend
            .stat(&ctx.path)?
            .and_then(|entry| entry.modified)
            .map(|t| t.timestamp());
        if actual != Some(expected.timestamp()) {
            return Err(StorageError::Integrity(format!(
                "{} has modification time {:?} after touch, expected {}",
                ctx.path,
                actual,
                expected.timestamp()
            )));
        }
    }
    info!("Touched {}", ctx.path);
    Ok(())
}
