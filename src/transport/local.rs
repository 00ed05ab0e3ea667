//! Local execution transport — spawn the interpreter directly.

use super::{ExecOutput, Transport};
use crate::core::error::{TransportError, TransportErrorKind};
use crate::core::types::Host;
use crate::lang::Dialect;
use std::io::Write;
use std::process::{Command, Stdio};

/// Runs payloads in a fresh local interpreter process.
pub struct LocalTransport {
    interpreter: &'static [&'static str],
}

impl LocalTransport {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            interpreter: dialect.interpreter(),
        }
    }
}

impl Transport for LocalTransport {
    fn send(&self, _host: &Host, payload: &str) -> Result<ExecOutput, TransportError> {
        let mut child = Command::new(self.interpreter[0])
            .args(&self.interpreter[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TransportError::new(
                    TransportErrorKind::Io,
                    format!("failed to spawn {}: {}", self.interpreter[0], e),
                )
            })?;

        if let Some(ref mut stdin) = child.stdin {
            stdin.write_all(payload.as_bytes()).map_err(|e| {
                TransportError::new(TransportErrorKind::Io, format!("stdin write error: {}", e))
            })?;
        }

        let output = child.wait_with_output().map_err(|e| {
            TransportError::new(TransportErrorKind::Io, format!("wait error: {}", e))
        })?;

        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_available() -> bool {
        Command::new("python3")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_local_echo() {
        if !python_available() {
            return;
        }
        let t = LocalTransport::new(Dialect::Python);
        let out = t.send(&Host::localhost(), "print(\"hello\")").unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_local_exit_code_and_stderr() {
        if !python_available() {
            return;
        }
        let t = LocalTransport::new(Dialect::Python);
        let out = t
            .send(
                &Host::localhost(),
                "import sys\nsys.stderr.write(\"boom\")\nsys.exit(3)",
            )
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, 3);
        assert!(out.stderr.contains("boom"));
    }

    #[test]
    fn test_local_payload_bytes_preserved() {
        if !python_available() {
            return;
        }
        // embedded quoting depends on exact reproduction of the payload
        let t = LocalTransport::new(Dialect::Python);
        let out = t
            .send(&Host::localhost(), "print(\"a\\tb\")\nprint('c\"d')")
            .unwrap();
        assert_eq!(out.stdout, "a\tb\nc\"d\n");
    }

    #[test]
    fn test_local_missing_interpreter_is_io_error() {
        let t = LocalTransport {
            interpreter: &["landfall-no-such-interpreter"],
        };
        let err = t.send(&Host::localhost(), "").unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Io);
    }
}
