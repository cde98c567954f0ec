//! Manually fired single-shot event
//!
//! `signal()` splits into the `Signal` (the event a body waits on) and a
//! cloneable `Trigger` held by whatever external code decides when it fires.
//! It is the smallest well-behaved adapter: one registration per arm, at most
//! one delivery, and de-registration on `disarm`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::{assert_unarmed, CallbackResult, Event, Resume};

#[derive(Debug, Default)]
struct SignalState {
    /// Registered continuation while armed and unfired
    resume: Option<Resume>,
    /// Result fired before the signal was armed
    latched: Option<CallbackResult>,
    armed: bool,
    fired: bool,
    released: bool,
}

/// Event side of a signal
#[derive(Debug)]
pub struct Signal {
    shared: Arc<Mutex<SignalState>>,
}

/// Firing side of a signal
#[derive(Clone, Debug)]
pub struct Trigger {
    shared: Arc<Mutex<SignalState>>,
}

/// Create a connected signal/trigger pair
pub fn signal() -> (Signal, Trigger) {
    let shared = Arc::new(Mutex::new(SignalState::default()));
    (
        Signal {
            shared: Arc::clone(&shared),
        },
        Trigger { shared },
    )
}

impl Event for Signal {
    fn arm(&mut self, resume: Resume) {
        let latched = {
            let mut state = self.shared.lock();
            assert_unarmed(state.armed, "Signal");
            state.armed = true;
            match state.latched.take() {
                Some(result) => {
                    state.fired = true;
                    Some(result)
                }
                None => {
                    state.resume = Some(resume.clone());
                    None
                }
            }
        };

        if let Some(result) = latched {
            resume.fire(result);
        }
    }

    fn disarm(&mut self) {
        let released = {
            let mut state = self.shared.lock();
            state.released = true;
            state.resume.take()
        };
        drop(released);
    }
}

impl Trigger {
    /// Fire the signal
    ///
    /// Returns true if a registered continuation was resumed now. Firing an
    /// unarmed signal latches the result until it is armed; firing after the
    /// first delivery or after release is ignored.
    pub fn fire(&self, result: CallbackResult) -> bool {
        let resume = {
            let mut state = self.shared.lock();
            if state.fired || state.released {
                trace!("signal already fired or released, ignoring");
                return false;
            }
            match state.resume.take() {
                Some(resume) => {
                    state.fired = true;
                    resume
                }
                None => {
                    state.latched = Some(result);
                    return false;
                }
            }
        };

        resume.fire(result);
        true
    }

    pub fn fire_empty(&self) -> bool {
        self.fire(CallbackResult::new())
    }

    /// Is a continuation currently registered?
    pub fn is_armed(&self) -> bool {
        self.shared.lock().resume.is_some()
    }

    pub fn is_fired(&self) -> bool {
        self.shared.lock().fired
    }

    /// Was the registration released by `disarm`?
    pub fn is_released(&self) -> bool {
        self.shared.lock().released
    }
}
