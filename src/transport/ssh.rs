//! SSH transport.
//!
//! Drives the `ssh` binary directly — no libssh2 dependency. The payload is
//! piped to the remote interpreter's stdin (not passed as an argument) to
//! avoid argument length limits and quoting damage.

use super::{ExecOutput, Transport};
use crate::core::error::{TransportError, TransportErrorKind};
use crate::core::types::Host;
use crate::lang::Dialect;
use std::io::Write;
use std::process::{Command, Stdio};

/// Runs payloads on a remote host over ssh.
pub struct SshTransport {
    interpreter: &'static [&'static str],
}

impl SshTransport {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            interpreter: dialect.interpreter(),
        }
    }
}

impl Transport for SshTransport {
    fn send(&self, host: &Host, payload: &str) -> Result<ExecOutput, TransportError> {
        let mut cmd = Command::new("ssh");
        cmd.args(["-o", "BatchMode=yes"])
            .args(["-o", "ConnectTimeout=5"])
            .args(["-o", "StrictHostKeyChecking=accept-new"]);

        if let Some(ref key) = host.ssh_key {
            cmd.args(["-i", &expand_home(key)]);
        }

        cmd.arg(format!("{}@{}", host.user, host.addr))
            .args(self.interpreter)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            TransportError::new(
                TransportErrorKind::Io,
                format!("failed to spawn ssh to {}: {}", host.addr, e),
            )
        })?;

        if let Some(ref mut stdin) = child.stdin {
            stdin.write_all(payload.as_bytes()).map_err(|e| {
                TransportError::new(TransportErrorKind::Io, format!("stdin write error: {}", e))
            })?;
        }

        let output = child.wait_with_output().map_err(|e| {
            TransportError::new(TransportErrorKind::Io, format!("ssh wait error: {}", e))
        })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        // ssh itself exits 255 on connection-level failure; anything else
        // is the remote interpreter's own status
        if exit_code == 255 && stdout.is_empty() {
            return Err(classify_failure(&host.addr, &stderr));
        }

        Ok(ExecOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

/// Map ssh's stderr onto a transport error kind so timeouts stay
/// distinguishable from refusals and auth failures.
fn classify_failure(addr: &str, stderr: &str) -> TransportError {
    let lower = stderr.to_lowercase();
    let kind = if lower.contains("timed out") || lower.contains("timeout") {
        TransportErrorKind::Timeout
    } else if lower.contains("permission denied") || lower.contains("authentication") {
        TransportErrorKind::Auth
    } else {
        TransportErrorKind::Refused
    };
    TransportError::new(kind, format!("ssh to {}: {}", addr, stderr.trim()))
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{}/{}", home, rest);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_expansion() {
        let expanded = expand_home("~/.ssh/id_ed25519");
        assert!(expanded.contains(".ssh/id_ed25519"));
        assert!(!expanded.starts_with('~'));
        assert_eq!(expand_home("/abs/key"), "/abs/key");
    }

    #[test]
    fn test_classify_timeout() {
        let e = classify_failure("10.0.0.5", "ssh: connect to host 10.0.0.5: Connection timed out");
        assert_eq!(e.kind, TransportErrorKind::Timeout);
        assert!(e.message.contains("10.0.0.5"));
    }

    #[test]
    fn test_classify_refused() {
        let e = classify_failure("10.0.0.5", "ssh: connect to host 10.0.0.5: Connection refused");
        assert_eq!(e.kind, TransportErrorKind::Refused);
    }

    #[test]
    fn test_classify_auth() {
        let e = classify_failure("10.0.0.5", "root@10.0.0.5: Permission denied (publickey).");
        assert_eq!(e.kind, TransportErrorKind::Auth);
    }
}
