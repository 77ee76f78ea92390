//! One storage operation from start to finish.
//!
//! [`run`] is the entry point: it validates the action, backend and
//! options, opens a [`Session`], resolves the path into an
//! [`OperationContext`], executes the action and closes the session on every
//! exit path.

use serde_json::Value;
use tracing::{debug, warn};

use crate::actions::{self, Action, ActionRequest, Outcome};
use crate::backends::{Backend, BackendKind, Connection};
use crate::config::ConnectionOptions;
use crate::errors::{Result, StorageError};
use crate::files::{self, DiscoverySet, Metadata};
use crate::path;

/// Everything an action needs to know about its path, computed once per
/// operation.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Normalized logical path.
    pub path: String,
    pub metadata: Metadata,
    pub discovery: DiscoverySet,
}

impl OperationContext {
    /// Normalize `raw_path` and resolve its metadata and discovery on
    /// `backend`.
    pub fn resolve(backend: &mut dyn Backend, raw_path: &str) -> Result<Self> {
        let path = path::normalize(raw_path);
        let (metadata, discovery) = files::resolve_with_discovery(backend, &path)?;
        Ok(Self {
            path,
            metadata,
            discovery,
        })
    }
}

/// A connected backend that is closed when the session ends.
///
/// Prefer [`close()`](Self::close) to observe close errors; dropping an open
/// session closes it and only logs a failure.
pub struct Session {
    connection: Connection,
    closed: bool,
}

impl Session {
    /// Create and connect a backend.
    pub fn open(kind: BackendKind, options: ConnectionOptions) -> Result<Self> {
        let mut connection = Connection::new(kind, options)?;
        connection.connect()?;
        debug!("Session opened on {} backend", kind);
        Ok(Self {
            connection,
            closed: false,
        })
    }

    /// [`open()`](Self::open) with options taken from a raw option bag.
    pub fn open_from_value(kind: BackendKind, options: &Value) -> Result<Self> {
        Self::open(kind, connection_options(options)?)
    }

    pub fn backend_mut(&mut self) -> &mut dyn Backend {
        &mut self.connection
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.connection.close()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.connection.close() {
                warn!("Failed to close {} session: {e}", self.connection.kind());
            }
        }
    }
}

/// Run `action` on `path` of a `backend` connection configured by
/// `options`.
///
/// The action name, backend name and every option are validated before
/// the connection is opened.
pub fn run(action: &str, path: &str, backend: &str, options: &Value) -> Result<Outcome> {
    let action: Action = action.parse()?;
    let kind: BackendKind = backend.parse()?;
    let connection_options = connection_options(options)?;
    let request = ActionRequest::parse(action, options)?;
    require_path(path)?;

    let mut session = Session::open(kind, connection_options)?;
    let result = OperationContext::resolve(session.backend_mut(), path)
        .and_then(|ctx| actions::execute(session.backend_mut(), &ctx, &request));
    let closed = session.close();

    let outcome = result?;
    closed?;
    Ok(outcome)
}

/// Resolve the [`Metadata`] of `path` on a `backend` connection.
pub fn metadata(path: &str, backend: &str, options: &Value) -> Result<Metadata> {
    let kind: BackendKind = backend.parse()?;
    let connection_options = connection_options(options)?;
    require_path(path)?;

    let mut session = Session::open(kind, connection_options)?;
    let result = files::resolve(session.backend_mut(), path);
    let closed = session.close();

    let metadata = result?;
    closed?;
    Ok(metadata)
}

fn connection_options(options: &Value) -> Result<ConnectionOptions> {
    ConnectionOptions::from_value(options)
        .map(ConnectionOptions::expand)
        .map_err(|e| StorageError::InvalidArgument(e.to_string()))
}

fn require_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        Err(StorageError::InvalidArgument("path is required".to_string()))
    } else {
        Ok(())
    }
}
