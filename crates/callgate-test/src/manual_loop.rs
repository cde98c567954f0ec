//! Deterministic, hand-cranked event loop
//!
//! Events created by a `ManualLoop` register with the loop when armed and
//! fire only when the test steps the loop. Firing order is either the
//! registration order or a seeded shuffle; a hostile loop also fires some
//! registrations twice, the way sloppy callback sources do.

use std::sync::Arc;

use callgate_core::{assert_unarmed, CallbackResult, Event, Resume};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::trace;

/// Loop errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LoopError {
    #[error("Loop still busy after {0} steps")]
    StepLimit(usize),
}

/// Manual loop configuration
#[derive(Clone, Debug)]
pub struct LoopConfig {
    /// RNG seed
    pub seed: u64,
    /// Fire registrations in random order instead of registration order
    pub shuffle: bool,
    /// Probability (0.0 - 1.0) that a firing is immediately repeated
    pub duplicate_prob: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            seed: 0,
            shuffle: false,
            duplicate_prob: 0.0,
        }
    }
}

impl LoopConfig {
    /// Fire in registration order
    pub fn ordered() -> Self {
        LoopConfig::default()
    }

    /// Fire in a seeded random order
    pub fn shuffled(seed: u64) -> Self {
        LoopConfig {
            seed,
            shuffle: true,
            duplicate_prob: 0.0,
        }
    }

    /// Seeded random order, and every third firing or so is duplicated
    pub fn hostile(seed: u64) -> Self {
        LoopConfig {
            seed,
            shuffle: true,
            duplicate_prob: 0.3,
        }
    }
}

/// Loop counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub armed: u64,
    pub fired: u64,
    pub duplicated: u64,
    pub released: u64,
}

struct Registration {
    id: u64,
    tag: String,
    resume: Resume,
}

struct LoopState {
    config: LoopConfig,
    rng: StdRng,
    next_id: u64,
    registered: Vec<Registration>,
    stats: LoopStats,
}

/// Hand-cranked event loop
#[derive(Clone)]
pub struct ManualLoop {
    state: Arc<Mutex<LoopState>>,
}

impl ManualLoop {
    pub fn new(config: LoopConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        ManualLoop {
            state: Arc::new(Mutex::new(LoopState {
                config,
                rng,
                next_id: 0,
                registered: Vec::new(),
                stats: LoopStats::default(),
            })),
        }
    }

    pub fn ordered() -> Self {
        Self::new(LoopConfig::ordered())
    }

    pub fn shuffled(seed: u64) -> Self {
        Self::new(LoopConfig::shuffled(seed))
    }

    pub fn hostile(seed: u64) -> Self {
        Self::new(LoopConfig::hostile(seed))
    }

    /// Event that fires with `[tag]` when the loop gets to it
    pub fn event(&self, tag: impl Into<String>) -> LoopEvent {
        LoopEvent {
            state: Arc::clone(&self.state),
            tag: tag.into(),
            id: None,
        }
    }

    /// Number of armed, unfired registrations
    pub fn pending(&self) -> usize {
        self.state.lock().registered.len()
    }

    pub fn pending_tags(&self) -> Vec<String> {
        self.state
            .lock()
            .registered
            .iter()
            .map(|r| r.tag.clone())
            .collect()
    }

    pub fn stats(&self) -> LoopStats {
        self.state.lock().stats.clone()
    }

    /// Fire one registration; returns its tag, or None when idle
    pub fn step(&self) -> Option<String> {
        let (registration, repeat) = {
            let mut state = self.state.lock();
            if state.registered.is_empty() {
                return None;
            }
            let index = if state.config.shuffle {
                let len = state.registered.len();
                state.rng.gen_range(0..len)
            } else {
                0
            };
            let registration = state.registered.remove(index);
            let duplicate_prob = state.config.duplicate_prob;
            let repeat = duplicate_prob > 0.0 && state.rng.gen_bool(duplicate_prob.min(1.0));
            state.stats.fired += 1;
            if repeat {
                state.stats.duplicated += 1;
            }
            (registration, repeat)
        };

        trace!(tag = %registration.tag, repeat, "manual loop firing");
        let result = CallbackResult::from_args([registration.tag.as_str()]);
        if repeat {
            registration.resume.fire(result.clone());
        }
        registration.resume.fire(result);
        Some(registration.tag)
    }

    /// Fire the first registration carrying `tag`
    pub fn fire(&self, tag: &str) -> bool {
        let registration = {
            let mut state = self.state.lock();
            let Some(index) = state.registered.iter().position(|r| r.tag == tag) else {
                return false;
            };
            state.stats.fired += 1;
            state.registered.remove(index)
        };
        registration
            .resume
            .fire(CallbackResult::from_args([registration.tag.as_str()]));
        true
    }

    /// Step until nothing is registered; returns the number of steps taken
    pub fn run_until_idle(&self, max_steps: usize) -> Result<usize, LoopError> {
        for steps in 0..max_steps {
            if self.step().is_none() {
                return Ok(steps);
            }
        }
        if self.pending() == 0 {
            Ok(max_steps)
        } else {
            Err(LoopError::StepLimit(max_steps))
        }
    }
}

impl std::fmt::Debug for ManualLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualLoop")
            .field("config", &state.config)
            .field("pending", &state.registered.len())
            .field("stats", &state.stats)
            .finish()
    }
}

/// Event registered with a `ManualLoop`
pub struct LoopEvent {
    state: Arc<Mutex<LoopState>>,
    tag: String,
    id: Option<u64>,
}

impl LoopEvent {
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl Event for LoopEvent {
    fn arm(&mut self, resume: Resume) {
        assert_unarmed(self.id.is_some(), "LoopEvent");
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.stats.armed += 1;
        state.registered.push(Registration {
            id,
            tag: self.tag.clone(),
            resume,
        });
        self.id = Some(id);
    }

    fn disarm(&mut self) {
        let Some(id) = self.id else {
            return;
        };
        let released = {
            let mut state = self.state.lock();
            let index = state.registered.iter().position(|r| r.id == id);
            let released = index.map(|index| state.registered.remove(index));
            if released.is_some() {
                state.stats.released += 1;
            }
            released
        };
        drop(released);
    }
}

impl std::fmt::Debug for LoopEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopEvent")
            .field("tag", &self.tag)
            .field("armed", &self.id.is_some())
            .finish()
    }
}

callgate_core::impl_event_ops!(LoopEvent);
