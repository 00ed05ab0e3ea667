//! Error taxonomy for the migration engine.
//!
//! Resolution-time failures (`NotFound`) abort `land` synchronously.
//! `Serialization` is swallowed per snapshot slot but fatal for call
//! arguments. `Transport` and `Protocol` abort the specific call and
//! propagate to the caller without retry.

use std::fmt;

/// Why a transport-level failure happened. Timeout and refusal are kept
/// distinguishable so callers can, in principle, separate retryable from
/// fatal failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused or host unreachable.
    Refused,
    /// Connection or session timed out.
    Timeout,
    /// Authentication rejected (bad key, wrong user).
    Auth,
    /// Local I/O failure (spawn, stdin write, wait).
    Io,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refused => write!(f, "refused"),
            Self::Timeout => write!(f, "timeout"),
            Self::Auth => write!(f, "auth"),
            Self::Io => write!(f, "io"),
        }
    }
}

/// Failure reaching a host or driving the remote interpreter session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport {}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TransportError {}

/// Engine-level error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Target procedure unknown and unresolvable from the ambient context.
    NotFound(String),
    /// A state slot or argument has no wire representation.
    Serialization { slot: String, reason: String },
    /// Connection, auth, or timeout failure reaching the host.
    Transport(TransportError),
    /// The response did not parse as the expected structured record.
    Protocol(String),
    /// Inventory file problem.
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "procedure '{}' not found", name),
            Self::Serialization { slot, reason } => {
                write!(f, "cannot serialize '{}': {}", slot, reason)
            }
            Self::Transport(e) => write!(f, "{}", e),
            Self::Protocol(detail) => write!(f, "malformed remote response: {}", detail),
            Self::Config(detail) => write!(f, "config error: {}", detail),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}
