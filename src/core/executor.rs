//! Remote execution — ship a payload through the transport and parse the
//! structured record it prints as its last line.

use super::error::Error;
use super::types::{Host, RemoteExecutionResult, ResultRecord, StateSnapshot, Value};
use crate::transport::Transport;
use tracing::debug;

/// Execute a payload on a host and parse the result.
///
/// Transport failures pass through untouched (no retry — that decision
/// belongs to the caller). Anything the transport *did* return must contain
/// the record; otherwise the call fails with `Protocol`.
pub fn execute(
    transport: &dyn Transport,
    host: &Host,
    payload: &str,
) -> Result<RemoteExecutionResult, Error> {
    debug!(host = %host.addr, payload_bytes = payload.len(), "shipping payload");
    let output = transport.send(host, payload)?;
    debug!(
        exit_code = output.exit_code,
        stdout_bytes = output.stdout.len(),
        "session finished"
    );

    let record = parse_record(&output.stdout).map_err(|detail| {
        let stderr = output.stderr.trim();
        if stderr.is_empty() {
            Error::Protocol(detail)
        } else {
            Error::Protocol(format!("{} (remote stderr: {})", detail, stderr))
        }
    })?;

    let mut updated_state = StateSnapshot::new();
    for (name, value) in record.variables {
        updated_state.insert(name, value);
    }

    Ok(RemoteExecutionResult {
        return_value: Value::from_wire(&record.result),
        captured_output: record.output.trim().to_string(),
        updated_state,
    })
}

/// Parse the last non-empty stdout line as the structured record.
pub fn parse_record(stdout: &str) -> Result<ResultRecord, String> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| "empty response".to_string())?;

    serde_json::from_str(line.trim()).map_err(|e| {
        let snippet: String = line.chars().take(120).collect();
        format!("{} in line: {}", e, snippet)
    })
}
