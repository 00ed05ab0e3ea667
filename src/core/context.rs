//! Explicit caller context and the state snapshotter.
//!
//! The context replaces the original's implicit binding capture: an ordered
//! set of named slots (sigil-classified), a subject kind, and an ambient
//! table of procedure definitions visible at the call site.

use super::types::{SlotKind, StateSnapshot, Value};
use indexmap::IndexMap;
use tracing::warn;

/// Whether the context's subject is a plain receiving object or a type-like
/// entity. Shared slots and constants are only visible on type-like
/// subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubjectKind {
    #[default]
    Instance,
    TypeLike,
}

/// The caller's environment as the engine sees it.
#[derive(Debug, Clone, Default)]
pub struct Context {
    subject: SubjectKind,
    slots: IndexMap<String, Value>,
    procedures: IndexMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose subject is a type-like entity (class/module level).
    pub fn type_like() -> Self {
        Self {
            subject: SubjectKind::TypeLike,
            ..Self::default()
        }
    }

    pub fn subject(&self) -> SubjectKind {
        self.subject
    }

    /// Set a slot. The name carries its sigil (`@y`, `@@count`, `$prefix`,
    /// `VERSION`); bare lowercase names are local temporaries and will never
    /// be shipped.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.slots.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }

    pub fn slots(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.slots.iter()
    }

    /// Record a procedure definition visible in this environment. The
    /// resolver consults this table when it meets a callee the registry
    /// does not know yet.
    pub fn define_procedure(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.procedures.insert(name.into(), source.into());
    }

    pub fn procedure(&self, name: &str) -> Option<&str> {
        self.procedures.get(name).map(String::as_str)
    }

    pub fn procedure_names(&self) -> impl Iterator<Item = &String> {
        self.procedures.keys()
    }

    /// Is this slot eligible for transport from this context?
    fn eligible(&self, kind: SlotKind) -> bool {
        match kind {
            SlotKind::Instance | SlotKind::Global => true,
            SlotKind::Shared | SlotKind::Constant => self.subject == SubjectKind::TypeLike,
            SlotKind::Local => false,
        }
    }
}

/// Capture the transport-eligible subset of a context's slots.
///
/// A slot whose value cannot be serialized is skipped — the snapshot is
/// partial, the call proceeds without that slot.
pub fn capture(ctx: &Context) -> StateSnapshot {
    let mut snapshot = StateSnapshot::new();
    for (name, value) in ctx.slots() {
        let kind = SlotKind::classify(name);
        if !ctx.eligible(kind) {
            continue;
        }
        match value.to_wire() {
            Ok(wire) => snapshot.insert(name.clone(), wire),
            Err(reason) => {
                warn!(slot = %name, %reason, "skipping non-serializable slot");
            }
        }
    }
    snapshot
}
