//! Typed parameters and results for the agent's JSON-RPC methods.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── storage.run ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct StorageRunParams {
    pub action: String,
    pub path: String,
    pub backend: String,
    /// Connection options and action options in one bag.
    #[serde(default)]
    pub options: Value,
}

// ── storage.metadata ────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct StorageMetadataParams {
    pub path: String,
    pub backend: String,
    #[serde(default)]
    pub options: Value,
}

// ── health.check ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub status: String,
    pub agent_version: String,
    pub uptime_secs: u64,
    pub backends: Vec<String>,
}
