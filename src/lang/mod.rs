//! Payload dialects — dispatch to per-interpreter modules.
//!
//! A dialect knows how to scan procedure source for call sites, render wire
//! values as literals, assemble the remote payload, split demo scripts into
//! procedure definitions, and name the interpreter that runs the payload.

pub mod python;
pub mod ruby;

use crate::core::error::Error;
use crate::core::types::StateSnapshot;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target interpreter language for payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    #[default]
    Ruby,
    Python,
}

impl Dialect {
    /// Best-effort static scan for unqualified call targets in a
    /// procedure's source, in discovery order.
    pub fn call_sites(&self, source: &str) -> Vec<String> {
        match self {
            Self::Ruby => ruby::call_sites(source),
            Self::Python => python::call_sites(source),
        }
    }

    /// Render a wire value as a literal in this dialect.
    pub fn literal(&self, value: &serde_json::Value) -> String {
        match self {
            Self::Ruby => ruby::literal(value),
            Self::Python => python::literal(value),
        }
    }

    /// Assemble the self-contained payload program.
    pub fn build_payload(
        &self,
        target: &str,
        arg_literals: &[String],
        snapshot: &StateSnapshot,
        definitions: &[String],
    ) -> String {
        match self {
            Self::Ruby => ruby::build_payload(target, arg_literals, snapshot, definitions),
            Self::Python => python::build_payload(target, arg_literals, snapshot, definitions),
        }
    }

    /// Split a demo script into its top-level procedure definitions.
    pub fn extract_procedures(&self, script: &str) -> IndexMap<String, String> {
        match self {
            Self::Ruby => ruby::extract_procedures(script),
            Self::Python => python::extract_procedures(script),
        }
    }

    /// Argv of a fresh interpreter that reads the payload from stdin.
    pub fn interpreter(&self) -> &'static [&'static str] {
        match self {
            Self::Ruby => &["ruby"],
            Self::Python => &["python3", "-"],
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ruby => write!(f, "ruby"),
            Self::Python => write!(f, "python"),
        }
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ruby" => Ok(Self::Ruby),
            "python" | "python3" => Ok(Self::Python),
            other => Err(Error::Config(format!("unknown dialect '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_parse() {
        assert_eq!("ruby".parse::<Dialect>().unwrap(), Dialect::Ruby);
        assert_eq!("python3".parse::<Dialect>().unwrap(), Dialect::Python);
        assert!("perl".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_dialect_interpreter_argv() {
        assert_eq!(Dialect::Ruby.interpreter(), &["ruby"]);
        assert_eq!(Dialect::Python.interpreter(), &["python3", "-"]);
    }

    #[test]
    fn test_dialect_dispatch_literal() {
        let v = serde_json::Value::Null;
        assert_eq!(Dialect::Ruby.literal(&v), "nil");
        assert_eq!(Dialect::Python.literal(&v), "None");
    }
}
