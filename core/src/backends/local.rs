//! Local filesystem backend.
//!
//! Logical paths are resolved beneath the configured `root`, which must be
//! an existing, readable directory. There is no handle to open: `connect`
//! only validates the root and `close` just flips the connected flag.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use filetime::FileTime;
use tracing::{debug, info};

use crate::config::ConnectionOptions;
use crate::errors::{Result, StorageError};
use crate::files::{Access, EntryKind, FileHashes, RawEntry};
use crate::path;

use super::{Backend, BackendKind, WriteMode};

/// Backend over the host filesystem.
pub struct LocalBackend {
    options: ConnectionOptions,
    root: String,
    connected: bool,
}

impl LocalBackend {
    pub fn new(options: ConnectionOptions) -> Self {
        let root = match path::normalize(&options.root) {
            r if r.is_empty() => "/".to_string(),
            r => r,
        };
        Self {
            options,
            root,
            connected: false,
        }
    }

    fn physical(&self, logical: &str) -> String {
        path::under_root(&self.root, logical)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(StorageError::Connection(
                "local backend is not connected".to_string(),
            ))
        }
    }

    /// Apply the default mode to an entry this backend just created.
    #[cfg(unix)]
    fn apply_default_mode(&self, physical: &str, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(physical, fs::Permissions::from_mode(mode))
            .map_err(|e| StorageError::from_io(e, physical))
    }

    #[cfg(not(unix))]
    fn apply_default_mode(&self, _physical: &str, _mode: u32) -> Result<()> {
        Ok(())
    }
}

impl Backend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    fn connect(&mut self) -> Result<()> {
        let meta = fs::metadata(&self.root).map_err(|e| {
            StorageError::OperationFailed(format!("root {} is not accessible: {e}", self.root))
        })?;
        if !meta.is_dir() {
            return Err(StorageError::OperationFailed(format!(
                "root {} is not a directory",
                self.root
            )));
        }
        fs::read_dir(&self.root).map_err(|e| {
            StorageError::OperationFailed(format!("root {} is not readable: {e}", self.root))
        })?;

        self.connected = true;
        info!("Local backend connected at root {}", self.root);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.connected {
            debug!("Local backend closed");
        }
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn absolute_path(&self, path: &str) -> String {
        self.physical(path)
    }

    fn root_path(&self) -> String {
        self.root.clone()
    }

    fn lists_recursively(&self) -> bool {
        true
    }

    fn stat(&mut self, path: &str) -> Result<Option<RawEntry>> {
        self.ensure_connected()?;
        let logical = path::normalize(path);
        let physical = self.physical(&logical);

        let meta = match fs::symlink_metadata(&physical) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::from_io(e, &physical)),
        };

        Ok(Some(entry_from_metadata(&logical, &physical, &meta)))
    }

    fn list_raw(&mut self, path: &str) -> Result<Vec<RawEntry>> {
        self.ensure_connected()?;
        let logical = path::normalize(path);
        let physical = self.physical(&logical);

        let mut result = Vec::new();
        for dir_entry in fs::read_dir(&physical).map_err(|e| StorageError::from_io(e, &physical))? {
            let dir_entry = dir_entry?;
            let name = dir_entry.file_name().to_string_lossy().to_string();
            if name == "." || name == ".." {
                continue;
            }
            let meta = fs::symlink_metadata(dir_entry.path())?;
            let child_logical = path::join(&logical, &name);
            let child_physical = dir_entry.path().to_string_lossy().to_string();
            result.push(entry_from_metadata(&child_logical, &child_physical, &meta));
        }

        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    fn read_bytes(&mut self, path: &str) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        let physical = self.physical(path);
        fs::read(&physical).map_err(|e| StorageError::from_io(e, &physical))
    }

    fn write_bytes(&mut self, path: &str, data: &[u8], mode: WriteMode) -> Result<()> {
        self.ensure_connected()?;
        let physical = self.physical(path);
        let existed = Path::new(&physical).exists();

        let mut open = OpenOptions::new();
        match mode {
            WriteMode::Create => open.write(true).create_new(true),
            WriteMode::Replace | WriteMode::Truncate => open.write(true).create(true).truncate(true),
            WriteMode::Append => open.append(true).create(true),
        };

        let mut file = open
            .open(&physical)
            .map_err(|e| StorageError::from_io(e, &physical))?;
        file.write_all(data)
            .map_err(|e| StorageError::from_io(e, &physical))?;
        debug!("Wrote {} bytes to {} ({:?})", data.len(), physical, mode);

        if !existed {
            self.apply_default_mode(&physical, self.options.default_file_permissions)?;
        }
        Ok(())
    }

    fn delete_file(&mut self, path: &str) -> Result<()> {
        self.ensure_connected()?;
        let physical = self.physical(path);
        debug!("Removing file {}", physical);
        fs::remove_file(&physical).map_err(|e| StorageError::from_io(e, &physical))
    }

    fn remove_dir(&mut self, path: &str) -> Result<()> {
        self.ensure_connected()?;
        let physical = self.physical(path);
        debug!("Removing directory {}", physical);
        fs::remove_dir(&physical).map_err(|e| StorageError::from_io(e, &physical))
    }

    fn mkdir(&mut self, path: &str) -> Result<()> {
        self.ensure_connected()?;
        let physical = self.physical(path);
        debug!("Creating directory {}", physical);
        fs::create_dir(&physical).map_err(|e| StorageError::from_io(e, &physical))?;
        self.apply_default_mode(&physical, self.options.default_directory_permissions)
    }

    #[cfg(unix)]
    fn chmod(&mut self, path: &str, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        self.ensure_connected()?;
        let physical = self.physical(path);
        fs::set_permissions(&physical, fs::Permissions::from_mode(mode))
            .map_err(|e| StorageError::from_io(e, &physical))
    }

    #[cfg(not(unix))]
    fn chmod(&mut self, _path: &str, _mode: u32) -> Result<()> {
        Err(StorageError::NotSupported(
            "permission bits are not available on this platform".to_string(),
        ))
    }

    #[cfg(unix)]
    fn chown(&mut self, path: &str, user: &str) -> Result<()> {
        use nix::unistd::{chown, Uid, User};
        self.ensure_connected()?;
        let physical = self.physical(path);

        let uid = match user.parse::<u32>() {
            Ok(raw) => Uid::from_raw(raw),
            Err(_) => User::from_name(user)
                .map_err(|e| StorageError::OperationFailed(format!("user lookup failed: {e}")))?
                .ok_or_else(|| StorageError::InvalidArgument(format!("unknown user: {user}")))?
                .uid,
        };
        chown(physical.as_str(), Some(uid), None)
            .map_err(|e| StorageError::from_io(std::io::Error::from(e), &physical))
    }

    #[cfg(not(unix))]
    fn chown(&mut self, _path: &str, _user: &str) -> Result<()> {
        Err(StorageError::NotSupported(
            "ownership is not available on this platform".to_string(),
        ))
    }

    #[cfg(unix)]
    fn chgrp(&mut self, path: &str, group: &str) -> Result<()> {
        use nix::unistd::{chown, Gid, Group};
        self.ensure_connected()?;
        let physical = self.physical(path);

        let gid = match group.parse::<u32>() {
            Ok(raw) => Gid::from_raw(raw),
            Err(_) => Group::from_name(group)
                .map_err(|e| StorageError::OperationFailed(format!("group lookup failed: {e}")))?
                .ok_or_else(|| StorageError::InvalidArgument(format!("unknown group: {group}")))?
                .gid,
        };
        chown(physical.as_str(), None, Some(gid))
            .map_err(|e| StorageError::from_io(std::io::Error::from(e), &physical))
    }

    #[cfg(not(unix))]
    fn chgrp(&mut self, _path: &str, _group: &str) -> Result<()> {
        Err(StorageError::NotSupported(
            "ownership is not available on this platform".to_string(),
        ))
    }

    fn touch(
        &mut self,
        path: &str,
        modified: Option<DateTime<Utc>>,
        accessed: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.ensure_connected()?;
        let physical = self.physical(path);

        if !Path::new(&physical).exists() {
            self.write_bytes(path, &[], WriteMode::Create)?;
        }

        let now = FileTime::now();
        let to_filetime = |t: Option<DateTime<Utc>>| {
            t.map(|t| FileTime::from_unix_time(t.timestamp(), t.timestamp_subsec_nanos()))
                .unwrap_or(now)
        };
        filetime::set_file_times(&physical, to_filetime(accessed), to_filetime(modified))
            .map_err(|e| StorageError::from_io(e, &physical))
    }

    fn hashes(&mut self, path: &str) -> Result<FileHashes> {
        self.ensure_connected()?;
        let physical = self.physical(path);
        let mut file = fs::File::open(&physical).map_err(|e| StorageError::from_io(e, &physical))?;
        Ok(FileHashes::from_reader(&mut file)?)
    }
}

fn entry_from_metadata(logical: &str, physical: &str, meta: &fs::Metadata) -> RawEntry {
    let file_type = meta.file_type();
    let kind = if file_type.is_symlink() {
        Some(EntryKind::Link)
    } else if file_type.is_dir() {
        Some(EntryKind::Directory)
    } else if file_type.is_file() {
        Some(EntryKind::File)
    } else {
        None
    };

    let size = if kind == Some(EntryKind::Directory) {
        0
    } else {
        meta.len()
    };

    let (owner, group, mode) = ownership(meta);

    RawEntry {
        name: path::name(physical).to_string(),
        path: logical.to_string(),
        kind,
        size,
        owner,
        group,
        created: meta.created().ok().map(to_utc),
        accessed: meta.accessed().ok().map(to_utc),
        modified: meta.modified().ok().map(to_utc),
        mode,
        access: access_for(physical, meta),
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(unix)]
fn ownership(meta: &fs::Metadata) -> (Option<String>, Option<String>, Option<u32>) {
    use std::os::unix::fs::MetadataExt;
    (
        Some(meta.uid().to_string()),
        Some(meta.gid().to_string()),
        Some(meta.mode() & 0o7777),
    )
}

#[cfg(not(unix))]
fn ownership(_meta: &fs::Metadata) -> (Option<String>, Option<String>, Option<u32>) {
    (None, None, None)
}

/// Effective access of the current process, as the kernel decides it.
#[cfg(unix)]
fn access_for(physical: &str, _meta: &fs::Metadata) -> Access {
    use nix::unistd::{access, AccessFlags};
    Access {
        readable: access(physical, AccessFlags::R_OK).is_ok(),
        writeable: access(physical, AccessFlags::W_OK).is_ok(),
        executable: access(physical, AccessFlags::X_OK).is_ok(),
    }
}

#[cfg(not(unix))]
fn access_for(_physical: &str, meta: &fs::Metadata) -> Access {
    Access {
        readable: true,
        writeable: !meta.permissions().readonly(),
        executable: meta.is_dir(),
    }
}
