//! Procedure registry — the catalog of known procedures.

use super::error::Error;
use super::types::ProcedureDescriptor;
use indexmap::IndexMap;

/// Catalog of procedures known to the engine. One per `Hub`, never a
/// process-wide singleton.
#[derive(Debug, Default)]
pub struct Registry {
    procedures: IndexMap<String, ProcedureDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a procedure. Idempotent per name: if the name is already
    /// known the existing descriptor is returned untouched, so a later
    /// redefinition never silently replaces the captured original.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        source_text: impl Into<String>,
    ) -> &ProcedureDescriptor {
        let name = name.into();
        self.procedures
            .entry(name.clone())
            .or_insert_with(|| ProcedureDescriptor::new(name, source_text.into()))
    }

    pub fn get(&self, name: &str) -> Result<&ProcedureDescriptor, Error> {
        self.procedures
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}
