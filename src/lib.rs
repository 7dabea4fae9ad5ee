//! Forward relay: relays forwarded message bundles from trusted origins.

pub mod config;
pub mod error;
pub mod host;
pub mod llm;
pub mod relay;
