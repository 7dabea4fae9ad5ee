//! Forward relay workflow.
//!
//! Every inbound event handed to [`ForwardHandler`] flows through:
//! 1. `filter`: forwarded-bundle shape and origin whitelist (no I/O)
//! 2. `classifier`: optional model yes/no check, fail-closed
//! 3. `cooldown`: delay (or skip) inside the window since the last relay
//! 4. `resolver`: configured group/user ids → host chat streams
//! 5. `dispatcher`: forward to each stream, fold results by policy

pub mod classifier;
pub mod cooldown;
pub mod dispatcher;
pub mod filter;
pub mod handler;
pub mod resolver;

pub use handler::{ForwardHandler, HandlerResult, RelayOutcome};
