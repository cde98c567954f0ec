//! Timer event backed by the tokio runtime

use std::time::Duration;

use callgate_core::{assert_unarmed, Event, Resume};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Makes `Sleep` events on one runtime, with every duration scaled
#[derive(Clone, Debug)]
pub struct Timer {
    runtime: Handle,
    scale: f64,
}

impl Timer {
    pub fn new(runtime: Handle, scale: f64) -> Self {
        Timer { runtime, scale }
    }

    pub fn sleep(&self, secs: f64) -> Sleep {
        Sleep {
            duration: Duration::from_secs_f64((secs * self.scale).max(0.0)),
            runtime: self.runtime.clone(),
            task: None,
        }
    }
}

/// Fires once after its duration; disarming aborts the timer task
#[derive(Debug)]
pub struct Sleep {
    duration: Duration,
    runtime: Handle,
    task: Option<JoinHandle<()>>,
}

impl Event for Sleep {
    fn arm(&mut self, resume: Resume) {
        assert_unarmed(self.task.is_some(), "Sleep");
        let duration = self.duration;
        self.task = Some(self.runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            resume.fire_empty();
        }));
    }

    fn disarm(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

callgate_core::impl_event_ops!(Sleep);
