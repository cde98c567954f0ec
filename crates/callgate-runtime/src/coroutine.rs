//! Suspendable bodies
//!
//! A body is an `async` block that receives a [`Co`]. Every `co.wait(event)`
//! is a suspension point: the future hands the event to the driver and
//! resolves with whatever the event delivers when it fires. Bodies must not
//! await anything else; the driver polls with a no-op waker and has no way
//! to learn when a foreign future becomes ready.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use callgate_core::{BoxEvent, CoroutineError, CoroutineResult, Delivery, IntoEvent, Outcome};
use parking_lot::Mutex;

use crate::{CoroutineHandle, DriverConfig};

pub(crate) type BodyFuture = Pin<Box<dyn Future<Output = CoroutineResult<()>> + Send>>;

/// Exchange point between a suspended body and its driver
#[derive(Default)]
pub(crate) struct Suspension {
    /// Event the body yielded on its last poll
    pub(crate) yielded: Option<BoxEvent>,
    /// Value to hand back at the suspension point on the next poll
    pub(crate) delivery: Option<Delivery>,
}

pub(crate) type SuspensionSlot = Arc<Mutex<Suspension>>;

/// Suspension context handed to a body
#[derive(Clone)]
pub struct Co {
    slot: SuspensionSlot,
}

impl Co {
    /// Suspend until `event` fires
    ///
    /// Resolves to the event's outcome, or to `Err(Cancelled)` when the
    /// handle is cancelled while parked here.
    pub fn wait(&self, event: impl IntoEvent) -> Wait {
        Wait {
            slot: Arc::clone(&self.slot),
            event: Some(event.into_event()),
        }
    }
}

impl std::fmt::Debug for Co {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Co").finish_non_exhaustive()
    }
}

/// Future returned by [`Co::wait`]
#[must_use = "a wait does nothing unless awaited"]
pub struct Wait {
    slot: SuspensionSlot,
    event: Option<BoxEvent>,
}

impl Future for Wait {
    type Output = CoroutineResult<Outcome>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let mut slot = this.slot.lock();

        if let Some(event) = this.event.take() {
            if slot.yielded.is_some() {
                return Poll::Ready(Err(CoroutineError::ConcurrentWait));
            }
            slot.yielded = Some(event);
            return Poll::Pending;
        }

        match slot.delivery.take() {
            Some(delivery) => Poll::Ready(delivery),
            None => Poll::Pending,
        }
    }
}

/// A body bound to its suspension context, not yet started
///
/// The body future is built at construction time; none of its code runs
/// until it is started (directly, or by arming a `NestedCoroutine`).
pub struct Coroutine {
    pub(crate) config: DriverConfig,
    pub(crate) slot: SuspensionSlot,
    pub(crate) body: BodyFuture,
}

impl Coroutine {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Co) -> Fut,
        Fut: Future<Output = CoroutineResult<()>> + Send + 'static,
    {
        Self::with_config(f, DriverConfig::default())
    }

    /// Build a body from a function and explicit arguments
    pub fn with_args<F, A, Fut>(f: F, args: A) -> Self
    where
        F: FnOnce(Co, A) -> Fut,
        Fut: Future<Output = CoroutineResult<()>> + Send + 'static,
    {
        Self::with_config(move |co| f(co, args), DriverConfig::default())
    }

    pub fn with_config<F, Fut>(f: F, config: DriverConfig) -> Self
    where
        F: FnOnce(Co) -> Fut,
        Fut: Future<Output = CoroutineResult<()>> + Send + 'static,
    {
        let slot = SuspensionSlot::default();
        let body = Box::pin(f(Co {
            slot: Arc::clone(&slot),
        }));
        Coroutine { config, slot, body }
    }

    /// Replace the driver configuration
    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Run the body up to its first suspension point
    ///
    /// Fails if the body fails before suspending; later failures are kept
    /// on the handle.
    pub fn start(self) -> CoroutineResult<CoroutineHandle> {
        let (handle, failure) = self.launch(None);
        match failure {
            Some(err) => Err(err),
            None => Ok(handle),
        }
    }
}

impl std::fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coroutine")
            .field("name", &self.config.name)
            .finish_non_exhaustive()
    }
}

/// Start a body with the default configuration
pub fn invoke<F, Fut>(f: F) -> CoroutineResult<CoroutineHandle>
where
    F: FnOnce(Co) -> Fut,
    Fut: Future<Output = CoroutineResult<()>> + Send + 'static,
{
    Coroutine::new(f).start()
}

/// Start a body with an explicit configuration
pub fn invoke_with<F, Fut>(config: DriverConfig, f: F) -> CoroutineResult<CoroutineHandle>
where
    F: FnOnce(Co) -> Fut,
    Fut: Future<Output = CoroutineResult<()>> + Send + 'static,
{
    Coroutine::with_config(f, config).start()
}
