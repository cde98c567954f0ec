//! A whole coroutine as one event
//!
//! Arming a `NestedCoroutine` starts its body on its own driver. The outer
//! waiter sees a single fire when the body completes; every intermediate
//! suspension point stays internal. This is what lets `all_of` / `any_of`
//! fan out over several independent sequences.

use std::future::Future;

use callgate_core::{assert_unarmed, CoroutineResult, Event, Resume};

use crate::driver::ExitHook;
use crate::{Co, Coroutine, CoroutineHandle, CoroutineState};

pub struct NestedCoroutine {
    coroutine: Option<Coroutine>,
    handle: Option<CoroutineHandle>,
    released: bool,
}

impl NestedCoroutine {
    pub fn new(coroutine: Coroutine) -> Self {
        NestedCoroutine {
            coroutine: Some(coroutine),
            handle: None,
            released: false,
        }
    }

    /// Build the body from a function and its arguments now; it runs when
    /// the event is armed
    pub fn from_fn<F, A, Fut>(f: F, args: A) -> Self
    where
        F: FnOnce(Co, A) -> Fut,
        Fut: Future<Output = CoroutineResult<()>> + Send + 'static,
    {
        Self::new(Coroutine::with_args(f, args))
    }

    /// Handle of the running body, once armed
    pub fn handle(&self) -> Option<&CoroutineHandle> {
        self.handle.as_ref()
    }

    /// State of the nested body; `None` before arming
    pub fn state(&self) -> Option<CoroutineState> {
        self.handle.as_ref().map(CoroutineHandle::state)
    }
}

impl Event for NestedCoroutine {
    fn arm(&mut self, resume: Resume) {
        let coroutine = self.coroutine.take();
        assert_unarmed(coroutine.is_none(), "NestedCoroutine");
        let Some(coroutine) = coroutine else {
            return;
        };

        let on_exit: ExitHook = Box::new(move |result: CoroutineResult<()>| match result {
            Ok(()) => resume.fire_empty(),
            Err(err) => resume.fail(err),
        });
        // Failures reach the exit hook, never the second value.
        let (handle, _) = coroutine.launch(Some(on_exit));
        self.handle = Some(handle);
    }

    /// Cancel the nested body (running its cleanup) without reporting back
    fn disarm(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(handle) = &self.handle {
            handle.clear_exit_hook();
            handle.cancel();
        }
    }
}

impl std::fmt::Debug for NestedCoroutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NestedCoroutine")
            .field("armed", &self.coroutine.is_none())
            .field("state", &self.state())
            .finish()
    }
}

callgate_core::impl_event_ops!(NestedCoroutine);
