//! Standard and application JSON-RPC 2.0 error codes.

use fsbridge_core::errors::ErrorKind;

/// Invalid JSON was received by the server.
pub const PARSE_ERROR: i64 = -32700;

/// The JSON sent is not a valid Request object.
pub const INVALID_REQUEST: i64 = -32600;

/// The method does not exist / is not available.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Invalid method parameter(s).
pub const INVALID_PARAMS: i64 = -32602;

/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;

// Application error codes, one per storage error kind.

/// Bad action name, backend name or option value.
pub const VALIDATION_FAILED: i64 = -32010;

/// The path does not exist.
pub const NOT_FOUND: i64 = -32011;

/// Read-only connection, root protection or missing access rights.
pub const PERMISSION_DENIED: i64 = -32012;

/// Could not connect to, or lost, the storage backend.
pub const CONNECTION_FAILED: i64 = -32013;

/// A change did not take effect.
pub const INTEGRITY_CHECK_FAILED: i64 = -32014;

/// The backend returned something self-contradictory.
pub const INVARIANT_VIOLATED: i64 = -32015;

/// The backend reported a failure.
pub const FILESYSTEM_ERROR: i64 = -32016;

/// The backend cannot perform this operation.
pub const NOT_SUPPORTED: i64 = -32017;

/// Error code reported for a storage error of `kind`.
pub fn code_for(kind: ErrorKind) -> i64 {
    match kind {
        ErrorKind::Validation => VALIDATION_FAILED,
        ErrorKind::NotFound => NOT_FOUND,
        ErrorKind::Permission => PERMISSION_DENIED,
        ErrorKind::Connection => CONNECTION_FAILED,
        ErrorKind::Integrity => INTEGRITY_CHECK_FAILED,
        ErrorKind::Invariant => INVARIANT_VIOLATED,
        ErrorKind::Filesystem => FILESYSTEM_ERROR,
        ErrorKind::NotSupported => NOT_SUPPORTED,
    }
}
