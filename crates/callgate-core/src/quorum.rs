//! Quorum-Wait combinator
//!
//! A quorum owns an ordered list of child events and a threshold n. Arming
//! it arms every child in declaration order, each bound to its ordinal; the
//! outer continuation fires exactly once, when n distinct children have
//! triggered, with one result slot per child.
//!
//! - `All`: n = child count (conjunction)
//! - `Any`: n = 1 (disjunction)
//! - `AtLeast(n)`: first n of m

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    assert_unarmed, BoxEvent, CoroutineError, CoroutineResult, Delivery, Event, IntoEvent,
    Outcome, Resume,
};

/// Combination rule of a quorum
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuorumKind {
    /// Wait for every child
    All,
    /// Wait for the first child
    Any,
    /// Wait for the first n children
    AtLeast(usize),
}

impl QuorumKind {
    /// Threshold this rule implies for `children` children
    pub fn threshold(self, children: usize) -> usize {
        match self {
            QuorumKind::All => children,
            QuorumKind::Any => 1,
            QuorumKind::AtLeast(n) => n,
        }
    }
}

/// Per-arm mutable state, shared by the per-child ordinal continuations
#[derive(Debug)]
struct Activation {
    kind: QuorumKind,
    /// Triggers still needed before the outer resume fires
    outstanding: usize,
    /// One slot per child, in declaration order
    slots: Vec<Option<Outcome>>,
    /// Ordinals that already triggered
    triggered: HashSet<usize>,
    /// Outer continuation; taken when the quorum resolves or is released
    resume: Option<Resume>,
}

impl Activation {
    fn new(kind: QuorumKind, threshold: usize, children: usize, resume: Resume) -> Self {
        Activation {
            kind,
            outstanding: threshold,
            slots: vec![None; children],
            triggered: HashSet::with_capacity(children),
            resume: Some(resume),
        }
    }

    /// Record one child delivery
    fn accept(&mut self, ordinal: usize, delivery: Delivery) -> Accepted {
        if self.triggered.contains(&ordinal) {
            return Accepted::Duplicate;
        }
        let Some(resume) = self.resume.take() else {
            return Accepted::Late;
        };

        let outcome = match delivery {
            Ok(outcome) => outcome,
            // Errors are not ours to handle; forward and stop counting.
            Err(err) => return Accepted::Resolved(resume, Err(err)),
        };

        self.triggered.insert(ordinal);
        debug_assert!(self.outstanding > 0);
        self.slots[ordinal] = Some(outcome);
        self.outstanding -= 1;
        if self.outstanding > 0 {
            self.resume = Some(resume);
            return Accepted::Counted;
        }

        let slots = std::mem::take(&mut self.slots);
        Accepted::Resolved(resume, Ok(Outcome::Slots(slots)))
    }
}

/// What a child delivery did to its activation
enum Accepted {
    Counted,
    /// Threshold reached (or a child failed): fire the outer resume
    Resolved(Resume, Delivery),
    /// This child had already triggered
    Duplicate,
    /// Another child resolved the quorum first, or it was released
    Late,
}

fn on_child(activation: &Mutex<Activation>, ordinal: usize, delivery: Delivery) {
    let (kind, accepted) = {
        let mut activation = activation.lock();
        (activation.kind, activation.accept(ordinal, delivery))
    };
    match accepted {
        Accepted::Resolved(resume, delivery) => resume.deliver(delivery),
        Accepted::Duplicate => {
            debug!(ordinal, ?kind, "child event triggered more than once, ignoring")
        }
        Accepted::Late => trace!(ordinal, ?kind, "child fired after quorum resolved, ignoring"),
        Accepted::Counted => {}
    }
}

/// n-of-m combinator over child events
pub struct Quorum {
    kind: QuorumKind,
    threshold: usize,
    children: Vec<BoxEvent>,
    activation: Option<Arc<Mutex<Activation>>>,
    released: bool,
}

impl Quorum {
    /// Build a quorum, validating the threshold
    ///
    /// Valid: 1 <= n <= children, or an empty `All` (n = 0, resolves as soon
    /// as it is armed).
    pub fn try_new(kind: QuorumKind, children: Vec<BoxEvent>) -> CoroutineResult<Self> {
        let threshold = kind.threshold(children.len());
        let empty_conjunction = kind == QuorumKind::All && children.is_empty();
        if !empty_conjunction && (threshold == 0 || threshold > children.len()) {
            return Err(CoroutineError::InvalidThreshold {
                threshold,
                children: children.len(),
            });
        }

        Ok(Quorum {
            kind,
            threshold,
            children,
            activation: None,
            released: false,
        })
    }

    /// Build a quorum; panics on an invalid threshold
    #[track_caller]
    pub fn new(kind: QuorumKind, children: Vec<BoxEvent>) -> Self {
        match Self::try_new(kind, children) {
            Ok(quorum) => quorum,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn kind(&self) -> QuorumKind {
        self.kind
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Number of children
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_armed(&self) -> bool {
        self.activation.is_some()
    }

    /// Is this a conjunction or disjunction that has not been armed yet?
    /// Only those are absorbed when combined with an operator.
    pub(crate) fn is_flattenable_as(&self, kind: QuorumKind) -> bool {
        matches!(kind, QuorumKind::All | QuorumKind::Any) && self.kind == kind && !self.is_armed()
    }

    /// Move the children out, leaving an empty unarmed quorum behind
    pub(crate) fn take_children(&mut self) -> Vec<BoxEvent> {
        std::mem::take(&mut self.children)
    }
}

impl Event for Quorum {
    fn arm(&mut self, resume: Resume) {
        assert_unarmed(self.is_armed(), "Quorum");
        if self.threshold == 0 {
            let mut activation = Activation::new(self.kind, 0, 0, resume.clone());
            activation.resume = None;
            self.activation = Some(Arc::new(Mutex::new(activation)));
            resume.resolve(Outcome::Slots(Vec::new()));
            return;
        }

        let activation = Arc::new(Mutex::new(Activation::new(
            self.kind,
            self.threshold,
            self.children.len(),
            resume,
        )));
        self.activation = Some(Arc::clone(&activation));

        for (ordinal, child) in self.children.iter_mut().enumerate() {
            let activation = Arc::clone(&activation);
            child.arm(Resume::new(move |delivery| {
                on_child(&activation, ordinal, delivery)
            }));
        }
    }

    fn disarm(&mut self) {
        if self.released {
            return;
        }
        let Some(activation) = &self.activation else {
            return;
        };
        self.released = true;

        let (released, triggered) = {
            let mut activation = activation.lock();
            (activation.resume.take(), activation.triggered.clone())
        };
        drop(released);

        for (ordinal, child) in self.children.iter_mut().enumerate() {
            if !triggered.contains(&ordinal) {
                child.disarm();
            }
        }
    }
}

impl std::fmt::Debug for Quorum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quorum")
            .field("kind", &self.kind)
            .field("threshold", &self.threshold)
            .field("children", &self.children.len())
            .field("armed", &self.is_armed())
            .finish()
    }
}

fn collect<I, E>(events: I) -> Vec<BoxEvent>
where
    I: IntoIterator<Item = E>,
    E: IntoEvent,
{
    events.into_iter().map(IntoEvent::into_event).collect()
}

/// Conjunction: resume once every event has fired
#[track_caller]
pub fn all_of<I, E>(events: I) -> Quorum
where
    I: IntoIterator<Item = E>,
    E: IntoEvent,
{
    Quorum::new(QuorumKind::All, collect(events))
}

/// Disjunction: resume when the first event fires
#[track_caller]
pub fn any_of<I, E>(events: I) -> Quorum
where
    I: IntoIterator<Item = E>,
    E: IntoEvent,
{
    Quorum::new(QuorumKind::Any, collect(events))
}

/// Quorum-Wait: resume once `n` distinct events have fired
#[track_caller]
pub fn wait_for<I, E>(n: usize, events: I) -> Quorum
where
    I: IntoIterator<Item = E>,
    E: IntoEvent,
{
    Quorum::new(QuorumKind::AtLeast(n), collect(events))
}
