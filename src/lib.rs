//! Landfall — transparent procedure migration.
//!
//! Land a procedure on a remote host and keep calling it as if it were
//! local: dependencies travel with it, caller state ships both ways, and
//! side-effect output comes home.

pub mod cli;
pub mod core;
pub mod lang;
pub mod transport;
