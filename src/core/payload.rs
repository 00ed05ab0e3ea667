//! Payload assembly — turn a snapshot, a dependency closure, and a call
//! into one self-contained program for the remote interpreter.

use super::error::Error;
use super::types::{StateSnapshot, Value};
use crate::lang::Dialect;

/// Build the payload text for one invocation.
///
/// `definitions` is the source of every descriptor in the closure, target
/// included. Arguments must be wire-representable: unlike snapshot slots
/// (already filtered at capture), an argument cannot be silently omitted,
/// so an opaque argument fails the whole call.
pub fn build(
    dialect: Dialect,
    target: &str,
    args: &[Value],
    snapshot: &StateSnapshot,
    definitions: &[String],
) -> Result<String, Error> {
    let mut arg_literals = Vec::with_capacity(args.len());
    for (position, arg) in args.iter().enumerate() {
        let wire = arg.to_wire().map_err(|reason| Error::Serialization {
            slot: format!("argument {}", position),
            reason,
        })?;
        arg_literals.push(dialect.literal(&wire));
    }

    Ok(dialect.build_payload(target, &arg_literals, snapshot, definitions))
}
