//! Event sources for tests
//!
//! - `Inc`: bumps a shared counter when armed, then fires synchronously
//! - `DoubleFire`: fires its resume twice (a source that breaks the contract)
//! - `Recorder`: a resume that keeps every delivery

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use callgate_core::{assert_unarmed, CallbackResult, Delivery, Event, Resume};
use parking_lot::Mutex;

/// Shared counter for `Inc` events
#[derive(Clone, Debug, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Counter::default()
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Event that increments this counter when armed
    pub fn inc(&self) -> Inc {
        Inc {
            counter: self.clone(),
            armed: false,
        }
    }

    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Increments its counter on arm, then fires with the new value
#[derive(Debug)]
pub struct Inc {
    counter: Counter,
    armed: bool,
}

impl Event for Inc {
    fn arm(&mut self, resume: Resume) {
        assert_unarmed(self.armed, "Inc");
        self.armed = true;
        let value = self.counter.bump();
        resume.fire(CallbackResult::from_args([value]));
    }
}

/// Fires its resume twice in a row
#[derive(Debug, Default)]
pub struct DoubleFire {
    result: CallbackResult,
    armed: bool,
}

impl DoubleFire {
    pub fn new(result: CallbackResult) -> Self {
        DoubleFire {
            result,
            armed: false,
        }
    }
}

impl Event for DoubleFire {
    fn arm(&mut self, resume: Resume) {
        assert_unarmed(self.armed, "DoubleFire");
        self.armed = true;
        resume.fire(self.result.clone());
        resume.fire(self.result.clone());
    }
}

callgate_core::impl_event_ops!(Inc, DoubleFire);

/// Resume that records what it receives
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Recorder::default()
    }

    pub fn resume(&self) -> Resume {
        let deliveries = Arc::clone(&self.deliveries);
        Resume::new(move |delivery| deliveries.lock().push(delivery))
    }

    pub fn count(&self) -> usize {
        self.deliveries.lock().len()
    }

    /// Take everything recorded so far
    pub fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.deliveries.lock())
    }
}
