//! Callgate Core - the event capability and its leaf implementations
//!
//! This crate defines what every other Callgate crate builds on:
//! - The `Event` capability (arm a resume continuation, fire it at most once)
//! - Resume continuations and the values they deliver
//! - Callback results (positional and named values from one trigger)
//! - Degenerate events (Immediate, Never)
//! - Manually fired and closure-backed events (Signal, FnEvent)
//! - The quorum combinator (all-of, any-of, n-of-m) and its `&` / `|` operators

pub mod error;
pub mod event;
pub mod func;
pub mod immediate;
pub mod ops;
pub mod quorum;
pub mod result;
pub mod signal;

pub use error::*;
pub use event::*;
pub use func::*;
pub use immediate::*;
pub use ops::*;
pub use quorum::*;
pub use result::*;
pub use signal::*;
