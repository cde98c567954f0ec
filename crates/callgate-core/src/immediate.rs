//! Degenerate events
//!
//! `Immediate` resumes before `arm` returns. `Never` never resumes: a body
//! parked on it stays suspended until cancelled or re-driven by hand.

use crate::{assert_unarmed, CallbackResult, Event, Resume};

/// Resumes synchronously inside `arm`
#[derive(Debug, Default)]
pub struct Immediate {
    result: CallbackResult,
    armed: bool,
}

impl Immediate {
    pub fn new() -> Self {
        Immediate::default()
    }

    /// Resume with the given values instead of an empty result
    pub fn with(result: CallbackResult) -> Self {
        Immediate {
            result,
            armed: false,
        }
    }
}

impl Event for Immediate {
    fn arm(&mut self, resume: Resume) {
        assert_unarmed(self.armed, "Immediate");
        self.armed = true;
        resume.fire(std::mem::take(&mut self.result));
    }
}

/// Never resumes
#[derive(Debug, Default)]
pub struct Never {
    armed: bool,
}

impl Never {
    pub fn new() -> Self {
        Never::default()
    }
}

impl Event for Never {
    fn arm(&mut self, _resume: Resume) {
        assert_unarmed(self.armed, "Never");
        self.armed = true;
    }
}
