//! Core types: wire values, slot classification, procedure descriptors,
//! state snapshots, and the structured result record.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Values
// ============================================================================

/// A caller-side value. Everything except `Opaque` round-trips through the
/// wire serialization (JSON) verbatim; `Opaque` marks values the caller
/// holds that have no transport representation (handles, sockets, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// Non-transportable value; the string is a short description used in
    /// diagnostics only.
    Opaque(String),
}

impl Value {
    /// Convert to the wire form. Fails for `Opaque` values.
    pub fn to_wire(&self) -> Result<serde_json::Value, String> {
        match self {
            Self::Null => Ok(serde_json::Value::Null),
            Self::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Self::Int(i) => Ok(serde_json::Value::from(*i)),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| format!("non-finite float {}", f)),
            Self::Str(s) => Ok(serde_json::Value::String(s.clone())),
            Self::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.to_wire()?);
                }
                Ok(serde_json::Value::Array(out))
            }
            Self::Map(entries) => {
                let mut out = serde_json::Map::with_capacity(entries.len());
                for (k, v) in entries {
                    out.insert(k.clone(), v.to_wire()?);
                }
                Ok(serde_json::Value::Object(out))
            }
            Self::Opaque(desc) => Err(format!("opaque value ({})", desc)),
        }
    }

    /// Reconstruct from the wire form. Total: every JSON value maps back.
    pub fn from_wire(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Self::List(items.iter().map(Self::from_wire).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_wire(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_wire() {
            Ok(json) => write!(f, "{}", json),
            Err(desc) => write!(f, "<{}>", desc),
        }
    }
}

// ============================================================================
// Slot classification
// ============================================================================

/// Kind of a state slot, derived from the sigil in its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// `@x` — scoped to the caller's receiving object.
    Instance,
    /// `@@x` — shared at the defining-type level.
    Shared,
    /// `$x` — environment-wide global.
    Global,
    /// Leading-uppercase bare name — a constant attached to a type-like
    /// subject.
    Constant,
    /// Anything else — a local temporary, never eligible for transport.
    Local,
}

impl SlotKind {
    /// Classify a slot name by its sigil prefix.
    pub fn classify(name: &str) -> Self {
        if name.starts_with("@@") {
            Self::Shared
        } else if name.starts_with('@') {
            Self::Instance
        } else if name.starts_with('$') {
            Self::Global
        } else if name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
            Self::Constant
        } else {
            Self::Local
        }
    }

    /// Strip the sigil, leaving a bare identifier.
    pub fn bare_name(name: &str) -> &str {
        name.trim_start_matches(['@', '$'])
    }
}

// ============================================================================
// Procedures
// ============================================================================

/// A known procedure: name plus the textual definition used both for
/// shipping and for static call-site analysis. Immutable once captured;
/// re-landing the same name never replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureDescriptor {
    pub name: String,
    pub source_text: String,
}

impl ProcedureDescriptor {
    pub fn new(name: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_text: source_text.into(),
        }
    }
}

// ============================================================================
// Snapshots and results
// ============================================================================

/// Ordered slot-name → wire-value mapping captured just before a remote
/// call, and again remotely just after it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    pub slots: IndexMap<String, serde_json::Value>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.slots.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.slots.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.slots.iter()
    }
}

/// The single-line structured record a payload emits as its last line of
/// real stdout. Exactly three fields; anything else is a protocol error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResultRecord {
    /// Slot name → value after execution.
    pub variables: IndexMap<String, serde_json::Value>,
    /// Combined diagnostic output, trimmed.
    pub output: String,
    /// Return value of the call; null when the call produced none.
    pub result: serde_json::Value,
}

/// Parsed outcome of one remote invocation. Never persisted past the
/// reconcile step.
#[derive(Debug, Clone)]
pub struct RemoteExecutionResult {
    pub return_value: Value,
    pub captured_output: String,
    pub updated_state: StateSnapshot,
}

// ============================================================================
// Hosts
// ============================================================================

/// A target host (the HostCatalog supplies these).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Catalog name.
    #[serde(default)]
    pub name: String,

    /// Network address (IP or DNS).
    pub addr: String,

    /// SSH user.
    #[serde(default = "default_user")]
    pub user: String,

    /// Path to SSH private key.
    #[serde(default)]
    pub ssh_key: Option<String>,
}

fn default_user() -> String {
    "root".to_string()
}

impl Host {
    /// The implicit local host every catalog resolves.
    pub fn localhost() -> Self {
        Self {
            name: "localhost".to_string(),
            addr: "127.0.0.1".to_string(),
            user: default_user(),
            ssh_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_wire_roundtrip_scalars() {
        for v in [
            Value::Null,
            Value::Bool(true),
            Value::Int(-7),
            Value::Str("héllo\nworld".to_string()),
        ] {
            let wire = v.to_wire().unwrap();
            assert_eq!(Value::from_wire(&wire), v);
        }
    }

    #[test]
    fn test_value_wire_roundtrip_collections() {
        let v = Value::Map(IndexMap::from([
            (
                "a".to_string(),
                Value::List(vec![Value::Int(1), Value::Null]),
            ),
            ("b".to_string(), Value::Float(2.5)),
        ]));
        let wire = v.to_wire().unwrap();
        assert_eq!(Value::from_wire(&wire), v);
    }

    #[test]
    fn test_value_opaque_not_serializable() {
        let v = Value::Opaque("open file".to_string());
        let err = v.to_wire().unwrap_err();
        assert!(err.contains("open file"));
    }

    #[test]
    fn test_value_opaque_inside_list_poisons() {
        let v = Value::List(vec![Value::Int(1), Value::Opaque("socket".to_string())]);
        assert!(v.to_wire().is_err());
    }

    #[test]
    fn test_value_nonfinite_float_rejected() {
        assert!(Value::Float(f64::NAN).to_wire().is_err());
        assert!(Value::Float(f64::INFINITY).to_wire().is_err());
    }

    #[test]
    fn test_slot_kind_classification() {
        assert_eq!(SlotKind::classify("@y"), SlotKind::Instance);
        assert_eq!(SlotKind::classify("@@count"), SlotKind::Shared);
        assert_eq!(SlotKind::classify("$prefix"), SlotKind::Global);
        assert_eq!(SlotKind::classify("VERSION"), SlotKind::Constant);
        assert_eq!(SlotKind::classify("tmp"), SlotKind::Local);
    }

    #[test]
    fn test_slot_bare_name() {
        assert_eq!(SlotKind::bare_name("@y"), "y");
        assert_eq!(SlotKind::bare_name("@@count"), "count");
        assert_eq!(SlotKind::bare_name("$prefix"), "prefix");
        assert_eq!(SlotKind::bare_name("VERSION"), "VERSION");
    }

    #[test]
    fn test_result_record_rejects_unknown_fields() {
        let ok = r#"{"variables":{"@y":15},"output":"","result":null}"#;
        assert!(serde_json::from_str::<ResultRecord>(ok).is_ok());

        let extra = r#"{"variables":{},"output":"","result":null,"debug":1}"#;
        assert!(serde_json::from_str::<ResultRecord>(extra).is_err());

        let missing = r#"{"variables":{},"output":""}"#;
        assert!(serde_json::from_str::<ResultRecord>(missing).is_err());
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let mut snap = StateSnapshot::new();
        snap.insert("@z", serde_json::json!(1));
        snap.insert("@a", serde_json::json!(2));
        let names: Vec<_> = snap.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["@z", "@a"]);
    }

    #[test]
    fn test_host_defaults() {
        let yaml = "addr: 10.0.0.5";
        let h: Host = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(h.user, "root");
        assert!(h.ssh_key.is_none());
    }

    #[test]
    fn test_host_localhost() {
        let h = Host::localhost();
        assert_eq!(h.addr, "127.0.0.1");
    }
}
