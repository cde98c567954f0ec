//! Closure-backed events
//!
//! Any `FnOnce(Resume)` is a valid event: it is called with the continuation
//! when armed and decides itself when (or whether) to fire it.

use std::fmt;

use crate::{assert_unarmed, Event, Resume};

type ArmFn = Box<dyn FnOnce(Resume) + Send>;

/// Event that runs a closure when armed
pub struct FnEvent {
    arm_fn: Option<ArmFn>,
}

impl FnEvent {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Resume) + Send + 'static,
    {
        FnEvent {
            arm_fn: Some(Box::new(f)),
        }
    }
}

/// Shorthand for `FnEvent::new`
pub fn from_fn<F>(f: F) -> FnEvent
where
    F: FnOnce(Resume) + Send + 'static,
{
    FnEvent::new(f)
}

impl Event for FnEvent {
    fn arm(&mut self, resume: Resume) {
        assert_unarmed(self.arm_fn.is_none(), "FnEvent");
        if let Some(f) = self.arm_fn.take() {
            f(resume);
        }
    }
}

impl fmt::Debug for FnEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEvent")
            .field("armed", &self.arm_fn.is_none())
            .finish()
    }
}
