use std::time::Instant;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use fsbridge_core::actions::Outcome;
use fsbridge_core::errors::StorageError;
use fsbridge_core::operation;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::protocol::errors;
use crate::protocol::messages::{JsonRpcErrorResponse, JsonRpcRequest, JsonRpcResponse};
use crate::protocol::methods::{HealthCheckResult, StorageMetadataParams, StorageRunParams};

/// Backends a `storage.*` request can name.
const SUPPORTED_BACKENDS: [&str; 3] = ["Local", "Ftp", "Media"];

/// Dispatcher handles incoming JSON-RPC requests and routes them
/// to the appropriate handler function.
///
/// Storage work is blocking, so each operation runs on tokio's blocking
/// pool and holds its own backend session for exactly that request.
pub struct Dispatcher {
    start_time: Instant,
}

/// The result of dispatching a request: either a success or error response.
pub enum DispatchResult {
    Success(JsonRpcResponse),
    Error(JsonRpcErrorResponse),
}

impl DispatchResult {
    /// Serialize the result to a JSON `Value`.
    pub fn to_json(&self) -> Value {
        let value = match self {
            Self::Success(resp) => serde_json::to_value(resp),
            Self::Error(resp) => serde_json::to_value(resp),
        };
        value.unwrap_or_else(|e| {
            error!("Failed to serialize response: {e}");
            Value::Null
        })
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Dispatch a parsed JSON-RPC request to the appropriate handler.
    pub async fn dispatch(&self, request: JsonRpcRequest) -> DispatchResult {
        let id = request.id.clone();
        let method = request.method.as_str();

        debug!("Dispatching method: {}", method);

        match method {
            "storage.run" => self.handle_storage_run(request).await,
            "storage.metadata" => self.handle_storage_metadata(request).await,
            "health.check" => self.handle_health_check(request),
            _ => {
                warn!("Unknown method: {}", method);
                DispatchResult::Error(JsonRpcErrorResponse::new(
                    id,
                    errors::METHOD_NOT_FOUND,
                    format!("Method not found: {method}"),
                ))
            }
        }
    }

    async fn handle_storage_run(&self, request: JsonRpcRequest) -> DispatchResult {
        let id = request.id.clone();
        let params: StorageRunParams = match parse_params(&request) {
            Ok(p) => p,
            Err(err) => return DispatchResult::Error(err),
        };

        let result = tokio::task::spawn_blocking(move || {
            operation::run(&params.action, &params.path, &params.backend, &params.options)
        })
        .await;

        match result {
            Ok(Ok(outcome)) => {
                DispatchResult::Success(JsonRpcResponse::new(id, outcome_to_json(outcome)))
            }
            Ok(Err(e)) => storage_error(id, e),
            Err(e) => join_error(id, e),
        }
    }

    async fn handle_storage_metadata(&self, request: JsonRpcRequest) -> DispatchResult {
        let id = request.id.clone();
        let params: StorageMetadataParams = match parse_params(&request) {
            Ok(p) => p,
            Err(err) => return DispatchResult::Error(err),
        };

        let result = tokio::task::spawn_blocking(move || {
            operation::metadata(&params.path, &params.backend, &params.options)
        })
        .await;

        match result {
            Ok(Ok(metadata)) => match serde_json::to_value(&metadata) {
                Ok(value) => DispatchResult::Success(JsonRpcResponse::new(id, value)),
                Err(e) => DispatchResult::Error(JsonRpcErrorResponse::new(
                    id,
                    errors::INTERNAL_ERROR,
                    format!("Failed to serialize metadata: {e}"),
                )),
            },
            Ok(Err(e)) => storage_error(id, e),
            Err(e) => join_error(id, e),
        }
    }

    fn handle_health_check(&self, request: JsonRpcRequest) -> DispatchResult {
        let result = HealthCheckResult {
            status: "ok".to_string(),
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            backends: SUPPORTED_BACKENDS.iter().map(|b| b.to_string()).collect(),
        };
        match serde_json::to_value(result) {
            Ok(value) => DispatchResult::Success(JsonRpcResponse::new(request.id, value)),
            Err(e) => DispatchResult::Error(JsonRpcErrorResponse::new(
                request.id,
                errors::INTERNAL_ERROR,
                e.to_string(),
            )),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_params<T: DeserializeOwned>(request: &JsonRpcRequest) -> Result<T, JsonRpcErrorResponse> {
    serde_json::from_value(request.params.clone()).map_err(|e| {
        JsonRpcErrorResponse::new(
            request.id.clone(),
            errors::INVALID_PARAMS,
            format!("Invalid {} params: {e}", request.method),
        )
    })
}

/// `read` content travels base64-encoded; listings and plain completions
/// are sent as-is.
fn outcome_to_json(outcome: Outcome) -> Value {
    match outcome {
        Outcome::Content(bytes) => json!({ "content": BASE64.encode(bytes) }),
        Outcome::List(paths) => json!({ "list": paths }),
        Outcome::Done => json!({ "done": true }),
    }
}

fn storage_error(id: Value, err: StorageError) -> DispatchResult {
    let kind = err.kind();
    warn!("Storage operation failed ({kind:?}): {err}");
    DispatchResult::Error(
        JsonRpcErrorResponse::new(id, errors::code_for(kind), err.to_string())
            .with_data(json!({ "kind": kind })),
    )
}

fn join_error(id: Value, err: tokio::task::JoinError) -> DispatchResult {
    error!("Storage task did not complete: {err}");
    DispatchResult::Error(JsonRpcErrorResponse::new(
        id,
        errors::INTERNAL_ERROR,
        format!("Storage task did not complete: {err}"),
    ))
}
