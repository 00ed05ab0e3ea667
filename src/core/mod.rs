//! Core engine logic — types, registry, resolution, payloads, execution.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod hub;
pub mod payload;
pub mod registry;
pub mod resolver;
pub mod types;
