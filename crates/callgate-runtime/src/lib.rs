//! Callgate Runtime - drives suspendable bodies over events
//!
//! This crate turns sequential-looking async bodies into callback-driven
//! state machines:
//! - `invoke` runs a body up to its first suspension point
//! - Each `co.wait(event)` arms the event and parks the body until it fires
//! - `CoroutineHandle` reports state and cancels (running the body's cleanup)
//! - `NestedCoroutine` exposes a whole body as one event for the combinators
//!
//! No executor is involved. Whatever external loop backs the events (a timer
//! wheel, a UI dispatcher, a tokio task) supplies the resumes.

pub mod config;
pub mod coroutine;
pub mod driver;
pub mod nested;

pub use config::*;
pub use coroutine::*;
pub use driver::*;
pub use nested::*;
