//! Dependency resolution — transitive call-graph closure over procedure
//! source.
//!
//! Depth-first over the dialect's call-site scan. A seen set guarantees
//! termination on cyclic call graphs; every node is visited exactly once.
//! Callees the registry does not know are looked up in the ambient context
//! (and registered on the fly) or skipped — static analysis is best-effort,
//! so an unresolved dependency becomes a remote name error at execution
//! time, not a resolution failure.

use super::context::Context;
use super::error::Error;
use super::registry::Registry;
use crate::lang::Dialect;
use std::collections::HashSet;
use tracing::trace;

/// Compute the dependency closure of `target`: the target first, then each
/// transitively-called procedure in discovery order, deduplicated.
///
/// Fails with `NotFound` only when the target itself is neither registered
/// nor defined in the ambient context.
pub fn resolve(
    registry: &mut Registry,
    ctx: &Context,
    dialect: Dialect,
    target: &str,
) -> Result<Vec<String>, Error> {
    if !ensure_known(registry, ctx, target) {
        return Err(Error::NotFound(target.to_string()));
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut order: Vec<String> = Vec::new();
    walk(registry, ctx, dialect, target, &mut seen, &mut order);
    Ok(order)
}

fn walk(
    registry: &mut Registry,
    ctx: &Context,
    dialect: Dialect,
    name: &str,
    seen: &mut HashSet<String>,
    order: &mut Vec<String>,
) {
    if !seen.insert(name.to_string()) {
        return;
    }
    order.push(name.to_string());

    let source = match registry.get(name) {
        Ok(descriptor) => descriptor.source_text.clone(),
        Err(_) => return,
    };

    for callee in dialect.call_sites(&source) {
        if seen.contains(&callee) {
            continue;
        }
        if ensure_known(registry, ctx, &callee) {
            walk(registry, ctx, dialect, &callee, seen, order);
        } else {
            trace!(caller = name, %callee, "callee not resolvable, skipping");
        }
    }
}

/// Make sure `name` has a descriptor, registering it from the ambient
/// context if needed. Returns false when the name is unresolvable.
fn ensure_known(registry: &mut Registry, ctx: &Context, name: &str) -> bool {
    if registry.contains(name) {
        return true;
    }
    if let Some(source) = ctx.procedure(name) {
        let source = source.to_string();
        registry.register(name, source);
        return true;
    }
    false
}
