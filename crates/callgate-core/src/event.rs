//! The event capability
//!
//! An event is a single-shot asynchronous condition. Arming it hands over a
//! resume continuation; the event fires that continuation at most once,
//! either synchronously inside `arm`, later from whatever external loop backs
//! it, or never.
//!
//! Adapters that bind a concrete callback API to this capability must:
//! - register exactly once per `arm` call
//! - deliver at most once
//! - release the registration in `disarm` where the backing mechanism allows it
//! - own the `Resume` (it is an `Arc`) for the full registration lifetime

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{CallbackResult, CoroutineError, CoroutineResult, Outcome};

/// What a resume continuation receives: an outcome, or an error propagated
/// out of a nested body
pub type Delivery = CoroutineResult<Outcome>;

/// Resume continuation handed to `Event::arm`
///
/// Cheap to clone; every clone refers to the same continuation. Whoever
/// holds a registration holds a strong reference, so the continuation can
/// never be reclaimed before it fires.
#[derive(Clone)]
pub struct Resume {
    inner: Arc<dyn Fn(Delivery) + Send + Sync>,
}

impl Resume {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Delivery) + Send + Sync + 'static,
    {
        Resume { inner: Arc::new(f) }
    }

    /// Deliver an outcome or error
    pub fn deliver(&self, delivery: Delivery) {
        (self.inner)(delivery)
    }

    /// Fire with a callback result
    pub fn fire(&self, result: CallbackResult) {
        self.deliver(Ok(Outcome::Fired(result)))
    }

    /// Fire with no values
    pub fn fire_empty(&self) {
        self.fire(CallbackResult::new())
    }

    pub fn resolve(&self, outcome: Outcome) {
        self.deliver(Ok(outcome))
    }

    pub fn fail(&self, err: CoroutineError) {
        self.deliver(Err(err))
    }

    /// Do both handles refer to the same continuation?
    pub fn ptr_eq(&self, other: &Resume) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Resume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resume({:p})", Arc::as_ptr(&self.inner))
    }
}

/// Type-erasure helper so combinators can recognize each other behind
/// `Box<dyn Event>`
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Any + Send> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Single-shot asynchronous condition
///
/// `arm` is called at most once per instance. Arming an already-armed
/// instance is a programming error and built-in events panic on it.
pub trait Event: AsAny + Send + 'static {
    /// Register `resume`; fire it at most once
    fn arm(&mut self, resume: Resume);

    /// Release an outstanding registration
    ///
    /// Called when the waiter no longer cares (cancellation, or a sibling
    /// already satisfied the combinator). Sources that cannot de-register
    /// keep the default no-op and stay registered; their late delivery is
    /// ignored by whoever armed them.
    fn disarm(&mut self) {}
}

/// Owned, type-erased event
pub type BoxEvent = Box<dyn Event>;

/// Conversion into a `BoxEvent`
pub trait IntoEvent {
    fn into_event(self) -> BoxEvent;
}

impl<E: Event> IntoEvent for E {
    fn into_event(self) -> BoxEvent {
        Box::new(self)
    }
}

impl IntoEvent for BoxEvent {
    fn into_event(self) -> BoxEvent {
        self
    }
}

/// Panic with a uniform message when a single-shot event is armed twice
#[track_caller]
pub fn assert_unarmed(armed: bool, what: &str) {
    assert!(
        !armed,
        "{what} armed twice: events are single-shot and cannot be re-armed"
    );
}
