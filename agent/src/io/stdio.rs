//! NDJSON transport: one JSON-RPC request per stdin line, one response per
//! stdout line, answered in order.

use std::time::Instant;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::handler::dispatch::Dispatcher;
use crate::protocol::errors;
use crate::protocol::messages::{JsonRpcErrorResponse, JsonRpcRequest};

/// Largest accepted request line: 1 MiB.
const MAX_LINE_SIZE: usize = 1_048_576;

/// Request counts reported when the input closes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub handled: u64,
    pub failed: u64,
}

/// Serve storage requests on stdin/stdout until stdin closes.
pub async fn run_stdio_loop() -> anyhow::Result<()> {
    let dispatcher = Dispatcher::new();
    let reader = BufReader::new(tokio::io::stdin());
    let stats = serve(&dispatcher, reader, tokio::io::stdout()).await?;
    info!(
        "Stdin closed after {} requests ({} failed), shutting down",
        stats.handled, stats.failed
    );
    Ok(())
}

/// Answer every line of `reader` on `writer`. Blank lines are skipped.
pub async fn serve<R, W>(
    dispatcher: &Dispatcher,
    mut reader: R,
    mut writer: W,
) -> anyhow::Result<LoopStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = LoopStats::default();
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(stats);
        }
        let Some(response) = handle_line(dispatcher, line.trim()).await else {
            continue;
        };

        stats.handled += 1;
        if response.get("error").is_some() {
            stats.failed += 1;
        }
        write_response(&mut writer, &response).await?;
    }
}

/// Turn one input line into its response, or `None` for a blank line.
///
/// Lines that are too long, are not JSON or are not JSON-RPC 2.0 are
/// answered with an error and a `null` id without reaching the dispatcher.
async fn handle_line(dispatcher: &Dispatcher, line: &str) -> Option<Value> {
    if line.is_empty() {
        return None;
    }
    if line.len() > MAX_LINE_SIZE {
        warn!("Rejecting {} byte request line", line.len());
        return Some(error_json(JsonRpcErrorResponse::new(
            Value::Null,
            errors::PARSE_ERROR,
            "Message exceeds 1 MiB size limit",
        )));
    }

    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            warn!("Failed to parse JSON-RPC request: {e}");
            return Some(error_json(JsonRpcErrorResponse::new(
                Value::Null,
                errors::PARSE_ERROR,
                format!("Parse error: {e}"),
            )));
        }
    };
    if request.jsonrpc != "2.0" {
        return Some(error_json(JsonRpcErrorResponse::new(
            request.id,
            errors::INVALID_REQUEST,
            "Invalid JSON-RPC version (must be \"2.0\")",
        )));
    }

    let method = request.method.clone();
    let started = Instant::now();
    let response = dispatcher.dispatch(request).await.to_json();
    let elapsed = started.elapsed();

    match response.get("error") {
        Some(error) => info!(
            "{method} failed in {elapsed:?}: code {} kind {}",
            error["code"],
            error["data"]["kind"].as_str().unwrap_or("protocol")
        ),
        None => debug!("{method} completed in {elapsed:?}"),
    }
    Some(response)
}

fn error_json(err: JsonRpcErrorResponse) -> Value {
    serde_json::to_value(err).unwrap_or(Value::Null)
}

/// Write a JSON value as an NDJSON line to the writer.
async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    value: &Value,
) -> anyhow::Result<()> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
