//! Transport abstraction — deliver a payload to a host's interpreter and
//! bring back everything it wrote.
//!
//! The payload travels on the interpreter's stdin, byte-for-byte: no argv
//! embedding, no quoting layer, no line-ending translation.

pub mod local;
pub mod ssh;

use crate::core::error::TransportError;
use crate::core::types::Host;
use crate::lang::Dialect;

/// Raw output from one interpreter session.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A channel that can start a fresh interpreter on a host, feed it a
/// payload, and return its combined output. One blocking round trip per
/// call; retries and timeouts are the implementation's business.
pub trait Transport: Send + Sync {
    fn send(&self, host: &Host, payload: &str) -> Result<ExecOutput, TransportError>;
}

/// Default transport: local spawn for local addresses, ssh otherwise.
pub struct SystemTransport {
    local: local::LocalTransport,
    ssh: ssh::SshTransport,
}

impl SystemTransport {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            local: local::LocalTransport::new(dialect),
            ssh: ssh::SshTransport::new(dialect),
        }
    }
}

impl Transport for SystemTransport {
    fn send(&self, host: &Host, payload: &str) -> Result<ExecOutput, TransportError> {
        if is_local_addr(&host.addr) {
            self.local.send(host, payload)
        } else {
            self.ssh.send(host, payload)
        }
    }
}

/// Check if an address is this machine.
fn is_local_addr(addr: &str) -> bool {
    if addr == "127.0.0.1" || addr == "localhost" || addr == "::1" {
        return true;
    }
    if let Ok(hostname) = std::fs::read_to_string("/etc/hostname") {
        if addr == hostname.trim() {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_detection() {
        assert!(is_local_addr("127.0.0.1"));
        assert!(is_local_addr("localhost"));
        assert!(is_local_addr("::1"));
        assert!(!is_local_addr("192.168.1.100"));
        assert!(!is_local_addr("10.0.0.1"));
    }

    #[test]
    fn test_exec_output_success() {
        let ok = ExecOutput {
            exit_code: 0,
            stdout: "ok".into(),
            stderr: "".into(),
        };
        assert!(ok.success());
        let fail = ExecOutput {
            exit_code: 1,
            stdout: "".into(),
            stderr: "err".into(),
        };
        assert!(!fail.success());
    }
}
