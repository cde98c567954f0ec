//! Callgate Test Harness - event sources and a scripted loop for validation
//!
//! This crate provides:
//! - Counting events (`Inc`) for arm-order scenarios
//! - Misbehaving sources that fire more than once
//! - A recording resume
//! - A deterministic, seedable manual event loop

pub mod manual_loop;
pub mod sources;

pub use manual_loop::*;
pub use sources::*;
