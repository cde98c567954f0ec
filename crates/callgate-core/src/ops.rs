//! `&` and `|` on events
//!
//! `a & b` builds a conjunction and `a | b` a disjunction. Chains of the same
//! operator flatten into one N-ary quorum: `a | b | c` is a single
//! three-child disjunction. Rust's precedence already binds `&` tighter than
//! `|`, and flattening never crosses that boundary, so `a | b & c` is a
//! disjunction over `[a, all_of([b, c])]`.
//!
//! Types outside this crate opt in with [`impl_event_ops!`]; anything else
//! that converts into an event can use [`EventExt::and`] / [`EventExt::or`].

use crate::{
    BoxEvent, FnEvent, Immediate, IntoEvent, Never, Quorum, QuorumKind, Signal,
};

fn absorb(kind: QuorumKind, mut event: BoxEvent, out: &mut Vec<BoxEvent>) {
    if let Some(quorum) = event.as_mut().as_any_mut().downcast_mut::<Quorum>() {
        if quorum.is_flattenable_as(kind) {
            out.extend(quorum.take_children());
            return;
        }
    }
    out.push(event);
}

fn combine(kind: QuorumKind, lhs: BoxEvent, rhs: BoxEvent) -> Quorum {
    let mut children = Vec::new();
    absorb(kind, lhs, &mut children);
    absorb(kind, rhs, &mut children);
    Quorum::new(kind, children)
}

/// Conjunction of two events, flattening unarmed conjunctions on either side
pub fn conjoin(lhs: impl IntoEvent, rhs: impl IntoEvent) -> Quorum {
    combine(QuorumKind::All, lhs.into_event(), rhs.into_event())
}

/// Disjunction of two events, flattening unarmed disjunctions on either side
pub fn disjoin(lhs: impl IntoEvent, rhs: impl IntoEvent) -> Quorum {
    combine(QuorumKind::Any, lhs.into_event(), rhs.into_event())
}

/// Method forms of the operators, available on anything that converts into
/// an event (including `BoxEvent`)
pub trait EventExt: IntoEvent + Sized {
    fn and(self, rhs: impl IntoEvent) -> Quorum {
        conjoin(self, rhs)
    }

    fn or(self, rhs: impl IntoEvent) -> Quorum {
        disjoin(self, rhs)
    }

    fn boxed(self) -> BoxEvent {
        self.into_event()
    }
}

impl<T: IntoEvent> EventExt for T {}

/// Implement `&` and `|` for event types
#[macro_export]
macro_rules! impl_event_ops {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<R: $crate::IntoEvent> ::std::ops::BitAnd<R> for $ty {
                type Output = $crate::Quorum;

                fn bitand(self, rhs: R) -> $crate::Quorum {
                    $crate::conjoin(self, rhs)
                }
            }

            impl<R: $crate::IntoEvent> ::std::ops::BitOr<R> for $ty {
                type Output = $crate::Quorum;

                fn bitor(self, rhs: R) -> $crate::Quorum {
                    $crate::disjoin(self, rhs)
                }
            }
        )*
    };
}

impl_event_ops!(Immediate, Never, Signal, FnEvent, Quorum, BoxEvent);
