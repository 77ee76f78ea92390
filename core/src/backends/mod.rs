//! Storage backends.
//!
//! Every backend implements the [`Backend`] capability trait. Callers hold a
//! [`Connection`], a tagged enum over the implemented backends, selected by
//! [`BackendKind`]. All paths passed to a backend are logical paths
//! (normalized, interpreted against the configured `root`); the backend maps
//! them onto its own namespace.
//!
//! # Lifecycle
//!
//! 1. Create with [`Connection::new()`] (disconnected).
//! 2. [`connect()`](Backend::connect) validates/opens the backend.
//! 3. Raw primitives: [`stat()`](Backend::stat),
//!    [`list_raw()`](Backend::list_raw), [`read_bytes()`](Backend::read_bytes),
//!    [`write_bytes()`](Backend::write_bytes), ...
//! 4. [`close()`](Backend::close) releases the handle.

pub mod ftp;
pub mod local;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ConnectionOptions;
use crate::errors::{Result, StorageError};
use crate::files::{FileHashes, RawEntry};

pub use ftp::FtpBackend;
pub use local::LocalBackend;

/// How [`Backend::write_bytes`] treats an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create a new file; the caller has checked it does not exist.
    Create,
    /// Overwrite an existing file.
    Replace,
    /// Append to the end of the file, creating it if needed.
    Append,
    /// Cut the file to zero length, then write.
    Truncate,
}

/// Capability set shared by every storage backend.
pub trait Backend: Send {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Options the backend was created with.
    fn options(&self) -> &ConnectionOptions;

    /// Open the backend (validate the root, authenticate, ...).
    fn connect(&mut self) -> Result<()>;

    /// Release the backend handle. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Whether [`connect()`](Self::connect) succeeded and `close` has not
    /// been called since.
    fn is_connected(&self) -> bool;

    /// Absolute path of `path` in the backend's own namespace.
    fn absolute_path(&self, path: &str) -> String;

    /// Absolute path of the configured root.
    fn root_path(&self) -> String;

    /// Whether [`list_raw()`](Self::list_raw) results should be descended
    /// into during discovery.
    fn lists_recursively(&self) -> bool;

    /// Stat a path. `Ok(None)` means the path does not exist.
    fn stat(&mut self, path: &str) -> Result<Option<RawEntry>>;

    /// Immediate children of a directory (no `.`/`..`), sorted by name.
    fn list_raw(&mut self, path: &str) -> Result<Vec<RawEntry>>;

    /// Whole-file read.
    fn read_bytes(&mut self, path: &str) -> Result<Vec<u8>>;

    /// Whole-buffer write.
    fn write_bytes(&mut self, path: &str, data: &[u8], mode: WriteMode) -> Result<()>;

    /// Remove a file or link.
    fn delete_file(&mut self, path: &str) -> Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&mut self, path: &str) -> Result<()>;

    /// Create a single directory level.
    fn mkdir(&mut self, path: &str) -> Result<()>;

    /// Set permission bits.
    fn chmod(&mut self, path: &str, mode: u32) -> Result<()>;

    /// Change the owning user (name or numeric id).
    fn chown(&mut self, path: &str, user: &str) -> Result<()>;

    /// Change the owning group (name or numeric id).
    fn chgrp(&mut self, path: &str, group: &str) -> Result<()>;

    /// Set modification/access time, creating an empty file when missing.
    /// `None` means now.
    fn touch(
        &mut self,
        path: &str,
        modified: Option<DateTime<Utc>>,
        accessed: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// MD5/SHA-1 of a file. Backends without a hash primitive hash the
    /// fetched buffer.
    fn hashes(&mut self, path: &str) -> Result<FileHashes> {
        let data = self.read_bytes(path)?;
        Ok(FileHashes::from_bytes(&data))
    }
}

/// Backend names accepted by [`Connection::new`].
///
/// `Media` is an alias of `Local`. `Dropbox`, `Github`, `Remote` and `Js`
/// are recognised but not implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendKind {
    Local,
    Ftp,
    Media,
    Dropbox,
    Github,
    Remote,
    Js,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "Local",
            Self::Ftp => "Ftp",
            Self::Media => "Media",
            Self::Dropbox => "Dropbox",
            Self::Github => "Github",
            Self::Remote => "Remote",
            Self::Js => "Js",
        }
    }

    /// Resolve aliases; fails for declared-but-unimplemented backends.
    pub fn implemented(self) -> Result<Self> {
        match self {
            Self::Local | Self::Media => Ok(Self::Local),
            Self::Ftp => Ok(Self::Ftp),
            other => Err(StorageError::NotSupported(format!(
                "{} backend is not implemented",
                other.as_str()
            ))),
        }
    }
}

impl FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "ftp" => Ok(Self::Ftp),
            "media" => Ok(Self::Media),
            "dropbox" => Ok(Self::Dropbox),
            "github" => Ok(Self::Github),
            "remote" => Ok(Self::Remote),
            "js" => Ok(Self::Js),
            other => Err(StorageError::InvalidArgument(format!(
                "Unknown backend: {other}"
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for BackendKind {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BackendKind> for String {
    fn from(kind: BackendKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A live (or not yet connected) backend.
pub enum Connection {
    Local(LocalBackend),
    Ftp(FtpBackend),
}

impl Connection {
    /// Create a disconnected backend of `kind`.
    ///
    /// Fails with `NotSupported` for stub backends and `InvalidArgument`
    /// when `options` do not satisfy the backend's requirements.
    pub fn new(kind: BackendKind, options: ConnectionOptions) -> Result<Self> {
        let kind = kind.implemented()?;

        let problems = options.validate(kind);
        if !problems.is_empty() {
            let message = problems
                .iter()
                .map(|p| format!("{}: {}", p.field, p.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(StorageError::InvalidArgument(message));
        }

        Ok(match kind {
            BackendKind::Ftp => Self::Ftp(FtpBackend::new(options)),
            _ => Self::Local(LocalBackend::new(options)),
        })
    }
}

macro_rules! delegate {
    ($self:ident, $backend:ident => $body:expr) => {
        match $self {
            Connection::Local($backend) => $body,
            Connection::Ftp($backend) => $body,
        }
    };
}

impl Backend for Connection {
    fn kind(&self) -> BackendKind {
        delegate!(self, b => b.kind())
    }

    fn options(&self) -> &ConnectionOptions {
        delegate!(self, b => b.options())
    }

    fn connect(&mut self) -> Result<()> {
        delegate!(self, b => b.connect())
    }

    fn close(&mut self) -> Result<()> {
        delegate!(self, b => b.close())
    }

    fn is_connected(&self) -> bool {
        delegate!(self, b => b.is_connected())
    }

    fn absolute_path(&self, path: &str) -> String {
        delegate!(self, b => b.absolute_path(path))
    }

    fn root_path(&self) -> String {
        delegate!(self, b => b.root_path())
    }

    fn lists_recursively(&self) -> bool {
        delegate!(self, b => b.lists_recursively())
    }

    fn stat(&mut self, path: &str) -> Result<Option<RawEntry>> {
        delegate!(self, b => b.stat(path))
    }

    fn list_raw(&mut self, path: &str) -> Result<Vec<RawEntry>> {
        delegate!(self, b => b.list_raw(path))
    }

    fn read_bytes(&mut self, path: &str) -> Result<Vec<u8>> {
        delegate!(self, b => b.read_bytes(path))
    }

    fn write_bytes(&mut self, path: &str, data: &[u8], mode: WriteMode) -> Result<()> {
        delegate!(self, b => b.write_bytes(path, data, mode))
    }

    fn delete_file(&mut self, path: &str) -> Result<()> {
        delegate!(self, b => b.delete_file(path))
    }

    fn remove_dir(&mut self, path: &str) -> Result<()> {
        delegate!(self, b => b.remove_dir(path))
    }

    fn mkdir(&mut self, path: &str) -> Result<()> {
        delegate!(self, b => b.mkdir(path))
    }

    fn chmod(&mut self, path: &str, mode: u32) -> Result<()> {
        delegate!(self, b => b.chmod(path, mode))
    }

    fn chown(&mut self, path: &str, user: &str) -> Result<()> {
        delegate!(self, b => b.chown(path, user))
    }

    fn chgrp(&mut self, path: &str, group: &str) -> Result<()> {
        delegate!(self, b => b.chgrp(path, group))
    }

    fn touch(
        &mut self,
        path: &str,
        modified: Option<DateTime<Utc>>,
        accessed: Option<DateTime<Utc>>,
    ) -> Result<()> {
        delegate!(self, b => b.touch(path, modified, accessed))
    }

    fn hashes(&mut self, path: &str) -> Result<FileHashes> {
        delegate!(self, b => b.hashes(path))
    }
}
