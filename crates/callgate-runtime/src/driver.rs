//! Coroutine driver
//!
//! The driver advances a body across its suspension points: poll the body
//! until it yields an event, arm that event with a resume bound to the
//! current suspension, and poll again once the resume fires.
//!
//! A resume fired synchronously inside `arm` (an `Immediate`, or a
//! combinator whose children fire synchronously) re-enters the body before
//! `arm` returns, on the arming thread's stack. Siblings declared after the
//! resolving child are armed only once the body has suspended again or
//! finished. Re-entry nests at most `max_reentry_depth` deep; past that, and
//! for resumes fired from another thread while a cycle is running, the
//! resume is queued and the running drive loop services it after `arm`
//! returns. Long synchronous chains therefore stay off the stack.
//!
//! Locking: driver state sits behind one mutex, never held while arming an
//! event, firing a resume, polling the body or dropping user values.

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, ThreadId};

use callgate_core::{
    BoxEvent, CallbackResult, CoroutineError, CoroutineResult, Delivery, Outcome, Resume,
};
use futures::task::noop_waker_ref;
use parking_lot::Mutex;
use tracing::{debug, debug_span, error, trace, warn};

use crate::coroutine::{BodyFuture, SuspensionSlot};
use crate::Coroutine;

/// Called once with the body's final result (nested coroutines)
pub(crate) type ExitHook = Box<dyn FnOnce(CoroutineResult<()>) + Send>;

/// Lifecycle of a coroutine handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoroutineState {
    /// Inside a drive cycle
    Running,
    /// Parked on an armed event
    Suspended,
    /// Body ran to its end
    Completed,
    /// Cancelled; cleanup has run
    Cancelled,
    /// Body returned an error
    Failed,
}

impl CoroutineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CoroutineState::Completed | CoroutineState::Cancelled | CoroutineState::Failed
        )
    }
}

struct Inner {
    state: CoroutineState,
    /// Identifies the current suspension; resumes carrying an older value
    /// are stale
    generation: u64,
    /// A drive cycle (or cancellation) owns the body
    driving: bool,
    /// Thread running the current cycle
    driver: Option<ThreadId>,
    /// Drive cycles nested inside an `arm` on the driver thread
    depth: usize,
    /// Resumes serviced since the cycle was entered from outside
    cycle_resumes: usize,
    /// Resume that arrived while driving
    pending: Option<Delivery>,
    cancel_requested: bool,
    /// Event the body is parked on
    current: Option<BoxEvent>,
    body: Option<BodyFuture>,
    on_exit: Option<ExitHook>,
    /// Failure of a nested cycle, keyed by the generation it resumed; picked
    /// up by the frame that armed that generation
    handoff: Option<(u64, CoroutineError)>,
    /// Failure from a resume that had no synchronous caller
    error: Option<CoroutineError>,
}

impl Inner {
    /// Take ownership of the body for a cycle entered from outside
    fn begin_cycle(&mut self) {
        self.driving = true;
        self.driver = Some(thread::current().id());
        self.cycle_resumes = 0;
        self.state = CoroutineState::Running;
    }

    /// Can a resume fired right now re-enter the body on this stack?
    fn can_reenter(&self, max_depth: usize) -> bool {
        self.driving
            && !self.cancel_requested
            && self.body.is_some()
            && self.depth < max_depth
            && self.driver == Some(thread::current().id())
    }

    fn take_handoff(&mut self, generation: u64) -> Option<CoroutineError> {
        match self.handoff.take() {
            Some((armed, err)) if armed == generation => Some(err),
            other => {
                self.handoff = other;
                None
            }
        }
    }
}

/// Outcome of one drive cycle
enum Step {
    Suspended,
    Finished(CoroutineResult<()>),
    CancelRequested,
    /// The event fired inside `arm` and a nested cycle took the body over;
    /// carries that cycle's failure
    Reentered(Option<CoroutineError>),
}

pub(crate) struct Shared {
    name: String,
    max_sync_resumes: Option<usize>,
    max_reentry_depth: usize,
    slot: SuspensionSlot,
    inner: Mutex<Inner>,
}

impl Shared {
    fn resume_for(self: &Arc<Self>, generation: u64) -> Resume {
        let shared = Arc::clone(self);
        Resume::new(move |delivery| {
            shared.deliver(generation, delivery);
        })
    }

    /// Accept a delivery for suspension `generation`
    ///
    /// Returns false when the delivery was ignored.
    fn deliver(self: &Arc<Self>, generation: u64, delivery: Delivery) -> bool {
        let (reentrant, fired) = {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.state.is_terminal() {
                trace!(name = %self.name, generation, "stale resume ignored");
                return false;
            }
            let reentrant = if inner.can_reenter(self.max_reentry_depth) {
                inner.depth += 1;
                true
            } else if inner.driving {
                if inner.pending.is_some() {
                    trace!(name = %self.name, "second resume for one suspension ignored");
                    return false;
                }
                inner.pending = Some(delivery);
                return true;
            } else {
                inner.begin_cycle();
                false
            };
            inner.generation += 1;
            (reentrant, inner.current.take())
        };
        drop(fired);

        let failure = self.run(Some(delivery));

        if reentrant {
            let mut inner = self.inner.lock();
            inner.depth -= 1;
            if let Some(err) = failure {
                inner.handoff = Some((generation, err));
            }
            return true;
        }

        if let Some(err) = failure {
            if err.is_cancelled() {
                debug!(name = %self.name, "body returned cancellation on its own");
            } else {
                error!(name = %self.name, error = %err, "coroutine failed");
            }
            self.inner.lock().error = Some(err);
        }
        true
    }

    /// One drive cycle, wrapped in the coroutine span; returns a failure
    /// nobody else will see
    fn run(self: &Arc<Self>, delivery: Option<Delivery>) -> Option<CoroutineError> {
        let span = debug_span!("coroutine", name = %self.name);
        let _entered = span.enter();

        match self.drive(delivery) {
            Step::Suspended => None,
            Step::Finished(result) => self.finish(result),
            Step::CancelRequested => {
                self.unwind();
                None
            }
            Step::Reentered(failure) => failure,
        }
    }

    fn drive(self: &Arc<Self>, mut delivery: Option<Delivery>) -> Step {
        let mut cx = Context::from_waker(noop_waker_ref());

        loop {
            let body = {
                let mut inner = self.inner.lock();
                if delivery.is_some() {
                    inner.cycle_resumes += 1;
                    if let Some(limit) = self.max_sync_resumes {
                        if inner.cycle_resumes > limit {
                            return Step::Finished(Err(CoroutineError::SyncResumeLimit(limit)));
                        }
                    }
                }
                inner.body.take()
            };
            let Some(mut body) = body else {
                return Step::Suspended;
            };

            if let Some(delivery) = delivery.take() {
                self.slot.lock().delivery = Some(delivery);
            }
            let poll = body.as_mut().poll(&mut cx);
            let yielded = {
                let mut slot = self.slot.lock();
                slot.delivery = None;
                slot.yielded.take()
            };

            let mut event = match (poll, yielded) {
                (Poll::Ready(result), _) => return Step::Finished(result),
                (Poll::Pending, None) => return Step::Finished(Err(CoroutineError::ForeignAwait)),
                (Poll::Pending, Some(event)) => event,
            };

            let generation = {
                let mut inner = self.inner.lock();
                inner.body = Some(body);
                if inner.cancel_requested {
                    return Step::CancelRequested;
                }
                inner.generation
            };

            event.arm(self.resume_for(generation));

            let mut inner = self.inner.lock();
            if inner.generation != generation {
                // Fired inside arm; the event has resolved, drop it
                let failure = inner.take_handoff(generation);
                drop(inner);
                drop(event);
                return Step::Reentered(failure);
            }
            inner.current = Some(event);
            if inner.cancel_requested {
                return Step::CancelRequested;
            }
            let Some(next) = inner.pending.take() else {
                inner.driving = false;
                inner.state = CoroutineState::Suspended;
                return Step::Suspended;
            };
            inner.generation += 1;
            delivery = Some(next);
            let fired = inner.current.take();
            drop(inner);
            drop(fired);
        }
    }

    /// Record the final result; hand it to the exit hook if there is one,
    /// otherwise return a failure to the caller
    fn finish(&self, result: CoroutineResult<()>) -> Option<CoroutineError> {
        let (body, current, hook) = {
            let mut inner = self.inner.lock();
            inner.state = match &result {
                Ok(()) => CoroutineState::Completed,
                Err(err) if err.is_cancelled() => CoroutineState::Cancelled,
                Err(_) => CoroutineState::Failed,
            };
            inner.driving = false;
            inner.cancel_requested = false;
            inner.pending = None;
            (inner.body.take(), inner.current.take(), inner.on_exit.take())
        };
        drop(body);
        drop(current);

        match hook {
            Some(hook) => {
                hook(result);
                None
            }
            None => result.err(),
        }
    }

    /// Inject cancellation at the suspension point, run the body's cleanup,
    /// then release the event it was parked on
    ///
    /// The caller must own the drive (`driving` set).
    fn unwind(&self) {
        let (body, current) = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.pending = None;
            inner.cancel_requested = false;
            (inner.body.take(), inner.current.take())
        };

        if let Some(mut body) = body {
            self.slot.lock().delivery = Some(Err(CoroutineError::Cancelled));
            let mut cx = Context::from_waker(noop_waker_ref());
            let poll = body.as_mut().poll(&mut cx);
            let yielded = {
                let mut slot = self.slot.lock();
                slot.delivery = None;
                slot.yielded.take()
            };

            match poll {
                Poll::Ready(Ok(())) => debug!(name = %self.name, "body absorbed cancellation"),
                Poll::Ready(Err(err)) if err.is_cancelled() => {}
                Poll::Ready(Err(err)) => {
                    warn!(name = %self.name, error = %err, "body failed while cancelling")
                }
                Poll::Pending => {}
            }
            if yielded.is_some() {
                warn!(name = %self.name, "body waited again while cancelling, dropping the event");
            }
            drop(yielded);
            drop(body);
        }

        if let Some(mut event) = current {
            event.disarm();
        }

        let hook = {
            let mut inner = self.inner.lock();
            inner.state = CoroutineState::Cancelled;
            inner.driving = false;
            inner.on_exit.take()
        };
        if let Some(hook) = hook {
            hook(Err(CoroutineError::Cancelled));
        }
        debug!(name = %self.name, "coroutine cancelled");
    }
}

impl Coroutine {
    /// Run the body up to its first suspension point
    ///
    /// Returns the handle together with a failure from that first run, if
    /// any. With an exit hook the failure goes to the hook instead.
    pub(crate) fn launch(
        self,
        on_exit: Option<ExitHook>,
    ) -> (CoroutineHandle, Option<CoroutineError>) {
        let Coroutine { config, slot, body } = self;
        let shared = Arc::new(Shared {
            name: config.name,
            max_sync_resumes: config.max_sync_resumes,
            max_reentry_depth: config.max_reentry_depth,
            slot,
            inner: Mutex::new(Inner {
                state: CoroutineState::Running,
                generation: 0,
                driving: true,
                driver: Some(thread::current().id()),
                depth: 0,
                cycle_resumes: 0,
                pending: None,
                cancel_requested: false,
                current: None,
                body: Some(body),
                on_exit,
                handoff: None,
                error: None,
            }),
        });

        let failure = shared.run(None);
        (CoroutineHandle { shared }, failure)
    }
}

/// Handle to a started coroutine
///
/// Dropping the handle detaches it: the body keeps running as long as the
/// event it is parked on can still fire.
#[derive(Clone)]
pub struct CoroutineHandle {
    shared: Arc<Shared>,
}

impl CoroutineHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> CoroutineState {
        self.shared.inner.lock().state
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Cancel the coroutine
    ///
    /// Injects `Err(Cancelled)` at the current suspension point and polls the
    /// body once so its cleanup runs, drops the body, then disarms the event
    /// it was parked on. Idempotent: calling it on a finished handle does
    /// nothing. Called from inside a drive cycle, the cancellation is carried
    /// out by that cycle as soon as the current arm returns.
    pub fn cancel(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.state.is_terminal() {
                return;
            }
            if inner.driving {
                inner.cancel_requested = true;
                return;
            }
            inner.begin_cycle();
        }

        let span = debug_span!("coroutine", name = %self.shared.name);
        let _entered = span.enter();
        self.shared.unwind();
    }

    /// Resume the current suspension point by hand
    ///
    /// Used to step a body parked on `Never`. Returns false if the handle is
    /// not suspended.
    pub fn resume_with(&self, result: CallbackResult) -> bool {
        let generation = {
            let inner = self.shared.inner.lock();
            if inner.state != CoroutineState::Suspended {
                return false;
            }
            inner.generation
        };
        self.shared.deliver(generation, Ok(Outcome::Fired(result)))
    }

    /// Take the failure recorded by a resume that had no caller to return it to
    pub fn take_error(&self) -> Option<CoroutineError> {
        self.shared.inner.lock().error.take()
    }

    /// Stop reporting completion to the exit hook
    pub(crate) fn clear_exit_hook(&self) {
        let hook = self.shared.inner.lock().on_exit.take();
        drop(hook);
    }
}

impl std::fmt::Debug for CoroutineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoroutineHandle")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}
