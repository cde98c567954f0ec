//! End-to-end scenarios: bodies driven over combinators

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use callgate_core::{
    all_of, any_of, signal, CallbackResult, CoroutineError, EventExt, Immediate, Never, Outcome,
};
use callgate_runtime::{invoke, invoke_with, Coroutine, CoroutineState, DriverConfig, NestedCoroutine};
use callgate_test::{Counter, DoubleFire, ManualLoop};
use parking_lot::Mutex;
use serde_json::json;

type Captured = Arc<Mutex<Vec<Outcome>>>;

fn captured() -> Captured {
    Arc::new(Mutex::new(Vec::new()))
}

// ============================================================================
// CONJUNCTION / DISJUNCTION
// ============================================================================

#[test]
fn conjunction_of_three_incs_runs_next_statement() {
    let counter = Counter::new();
    let observed = Arc::new(Mutex::new(None));
    let (c, seen) = (counter.clone(), Arc::clone(&observed));

    let handle = invoke(move |co| async move {
        co.wait(c.inc() & c.inc() & c.inc()).await?;
        *seen.lock() = Some(c.get());
        Ok(())
    })
    .unwrap();

    assert_eq!(counter.get(), 3);
    assert_eq!(*observed.lock(), Some(3));
    assert_eq!(handle.state(), CoroutineState::Completed);
}

#[test]
fn disjunction_resumes_once_on_first_fire() {
    let (a, fire_a) = signal();
    let (b, fire_b) = signal();
    let outcomes = captured();
    let sink = Arc::clone(&outcomes);

    let handle = invoke(move |co| async move {
        let outcome = co.wait(a | b).await?;
        sink.lock().push(outcome);
        co.wait(Never::new()).await?;
        Ok(())
    })
    .unwrap();

    fire_a.fire(CallbackResult::from_args(["A"]).with_named("button", 1));
    fire_b.fire(CallbackResult::from_args(["B"]));

    let outcomes = outcomes.lock();
    assert_eq!(outcomes.len(), 1);
    let slots = outcomes[0].slots().unwrap();
    assert_eq!(slots.len(), 2);
    let a_result = slots[0].as_ref().and_then(Outcome::result).unwrap();
    assert_eq!(a_result.arg(0), Some(&json!("A")));
    assert_eq!(a_result.named("button"), Some(&json!(1)));
    assert!(slots[1].is_none());
    assert_eq!(handle.state(), CoroutineState::Suspended);
}

#[test]
fn and_binds_tighter_than_or() {
    // A & B | C: needs both A and B, C never fires
    let ev_loop = ManualLoop::ordered();
    let done = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&done);
    let wait_on = ev_loop.event("A") & ev_loop.event("B") | ev_loop.event("C");
    invoke(move |co| async move {
        co.wait(wait_on).await?;
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    assert!(ev_loop.fire("A"));
    assert_eq!(done.load(Ordering::SeqCst), 0);
    assert!(ev_loop.fire("B"));
    assert_eq!(done.load(Ordering::SeqCst), 1);

    // A | B & C: A alone is enough
    let ev_loop = ManualLoop::ordered();
    let done = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&done);
    let wait_on = ev_loop.event("A") | ev_loop.event("B") & ev_loop.event("C");
    invoke(move |co| async move {
        co.wait(wait_on).await?;
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    assert!(ev_loop.fire("A"));
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[test]
fn disjunction_of_immediates_populates_first_slot() {
    let outcomes = captured();
    let sink = Arc::clone(&outcomes);

    invoke(move |co| async move {
        let outcome = co
            .wait(
                Immediate::with(CallbackResult::from_args([1]))
                    | Immediate::with(CallbackResult::from_args([2]))
                    | Immediate::with(CallbackResult::from_args([3])),
            )
            .await?;
        sink.lock().push(outcome);
        Ok(())
    })
    .unwrap();

    let outcomes = outcomes.lock();
    assert_eq!(outcomes[0].fired_indices(), vec![0]);
    assert_eq!(outcomes[0].slots().map(<[_]>::len), Some(3));
}

#[test]
fn conjunction_of_nevers_never_resumes() {
    let handle = invoke(|co| async move {
        co.wait(all_of([Never::new(), Never::new(), Never::new()]))
            .await?;
        Ok(())
    })
    .unwrap();

    assert_eq!(handle.state(), CoroutineState::Suspended);
}

#[test]
fn duplicate_fires_never_double_resume() {
    let steps = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&steps);
    let (other, fire_other) = signal();

    let handle = invoke(move |co| async move {
        co.wait(DoubleFire::new(CallbackResult::new()) & other).await?;
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    assert_eq!(steps.load(Ordering::SeqCst), 0);
    fire_other.fire_empty();
    assert_eq!(steps.load(Ordering::SeqCst), 1);
    assert_eq!(handle.state(), CoroutineState::Completed);
}

// ============================================================================
// SYNCHRONOUS RESUMES
// ============================================================================

#[test]
fn disjunction_of_incs_resumes_after_first_inc() {
    let counter = Counter::new();
    let readings = Arc::new(Mutex::new(Vec::new()));
    let (c, sink) = (counter.clone(), Arc::clone(&readings));

    let handle = invoke(move |co| async move {
        co.wait(c.inc() | c.inc()).await?;
        sink.lock().push(c.get());
        co.wait(c.inc() | c.inc() | c.inc()).await?;
        sink.lock().push(c.get());
        co.wait(any_of([c.inc(), c.inc(), c.inc()])).await?;
        sink.lock().push(c.get());
        Ok(())
    })
    .unwrap();

    assert_eq!(*readings.lock(), vec![1, 2, 3]);
    // Losing children are still armed, after the body has moved on.
    assert_eq!(counter.get(), 8);
    assert_eq!(handle.state(), CoroutineState::Completed);
}

#[test]
fn mixed_operators_resume_as_soon_as_resolved() {
    let counter = Counter::new();
    let readings = Arc::new(Mutex::new(Vec::new()));
    let (c, sink) = (counter.clone(), Arc::clone(&readings));

    invoke(move |co| async move {
        // Leftmost inc alone resolves it: +1
        co.wait(c.inc() | c.inc() & c.inc()).await?;
        sink.lock().push(c.get());
        // Both incs of the conjunction resolve it: +2
        co.wait(c.inc() & c.inc() | c.inc()).await?;
        sink.lock().push(c.get());
        Ok(())
    })
    .unwrap();

    assert_eq!(*readings.lock(), vec![1, 3]);
    assert_eq!(counter.get(), 6);
}

#[test]
fn queued_resumes_see_every_sibling_armed() {
    let counter = Counter::new();
    let readings = Arc::new(Mutex::new(Vec::new()));
    let (c, sink) = (counter.clone(), Arc::clone(&readings));
    let config = DriverConfig::named("queued").with_max_reentry_depth(0);

    invoke_with(config, move |co| async move {
        co.wait(c.inc() | c.inc()).await?;
        sink.lock().push(c.get());
        Ok(())
    })
    .unwrap();

    assert_eq!(*readings.lock(), vec![2]);
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[test]
fn cancel_on_conjunction_runs_cleanup_once() {
    let ev_loop = ManualLoop::ordered();
    let cleanups = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&cleanups);
    let wait_on = ev_loop.event("a") & ev_loop.event("b");

    let handle = invoke(move |co| async move {
        let result = co.wait(wait_on).await;
        if let Err(err) = &result {
            if err.is_cancelled() {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }
        result.map(|_| ())
    })
    .unwrap();

    assert_eq!(ev_loop.pending(), 2);
    handle.cancel();
    assert_eq!(handle.state(), CoroutineState::Cancelled);
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert_eq!(ev_loop.pending(), 0);

    handle.cancel();
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert_eq!(handle.state(), CoroutineState::Cancelled);
}

#[test]
fn cancel_on_disjunction_deregisters_signals() {
    let (a, fire_a) = signal();
    let (b, fire_b) = signal();
    let handle = invoke(move |co| async move {
        co.wait(a | b).await?;
        Ok(())
    })
    .unwrap();

    handle.cancel();
    assert!(!fire_a.is_armed());
    assert!(!fire_b.is_armed());
    assert!(!fire_a.fire_empty());
}

#[test]
fn cleanup_that_waits_again_is_cut_short() {
    let reached = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&reached);
    let handle = invoke(move |co| async move {
        if co.wait(Never::new()).await.is_err() {
            // Waiting during cleanup parks forever; the driver drops the body.
            co.wait(Never::new()).await?;
            seen.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    })
    .unwrap();

    handle.cancel();
    assert_eq!(handle.state(), CoroutineState::Cancelled);
    assert_eq!(reached.load(Ordering::SeqCst), 0);
}

// ============================================================================
// MANUAL STEPPING
// ============================================================================

#[test]
fn never_is_driven_by_hand() {
    let outcomes = captured();
    let sink = Arc::clone(&outcomes);
    let handle = invoke(move |co| async move {
        let outcome = co.wait(Never::new()).await?;
        sink.lock().push(outcome);
        Ok(())
    })
    .unwrap();

    assert!(handle.resume_with(CallbackResult::from_args(["manual"])));
    assert_eq!(handle.state(), CoroutineState::Completed);
    assert_eq!(
        outcomes.lock()[0].result().and_then(|r| r.arg(0)),
        Some(&json!("manual"))
    );
}

// ============================================================================
// NESTED COROUTINES
// ============================================================================

#[test]
fn nested_body_hides_intermediate_steps() {
    const STEPS: usize = 5;
    let ev_loop = ManualLoop::ordered();
    let progress = Arc::new(AtomicUsize::new(0));
    let outer_resumes = Arc::new(AtomicUsize::new(0));

    let nested = NestedCoroutine::from_fn(
        |co, (ev_loop, progress): (ManualLoop, Arc<AtomicUsize>)| async move {
            for step in 0..STEPS {
                co.wait(ev_loop.event(format!("step-{step}"))).await?;
                progress.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        },
        (ev_loop.clone(), Arc::clone(&progress)),
    );
    let (side, _fire_side) = signal();
    let seen = Arc::clone(&outer_resumes);
    let handle = invoke(move |co| async move {
        co.wait(nested | side).await?;
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    for step in 0..STEPS {
        assert_eq!(outer_resumes.load(Ordering::SeqCst), 0);
        assert_eq!(ev_loop.step(), Some(format!("step-{step}")));
    }
    assert_eq!(progress.load(Ordering::SeqCst), STEPS);
    assert_eq!(outer_resumes.load(Ordering::SeqCst), 1);
    assert_eq!(handle.state(), CoroutineState::Completed);
}

#[test]
fn fan_out_waits_for_every_nested_body() {
    let ev_loop = ManualLoop::shuffled(11);
    let children: Vec<_> = (0..4)
        .map(|lane| {
            NestedCoroutine::from_fn(
                |co, (ev_loop, lane): (ManualLoop, usize)| async move {
                    co.wait(ev_loop.event(format!("{lane}-1"))).await?;
                    co.wait(ev_loop.event(format!("{lane}-2"))).await?;
                    Ok(())
                },
                (ev_loop.clone(), lane),
            )
            .boxed()
        })
        .collect();

    let outcomes = captured();
    let sink = Arc::clone(&outcomes);
    let handle = invoke(move |co| async move {
        let outcome = co.wait(all_of(children)).await?;
        sink.lock().push(outcome);
        Ok(())
    })
    .unwrap();

    assert_eq!(ev_loop.run_until_idle(64), Ok(8));
    assert_eq!(handle.state(), CoroutineState::Completed);
    assert_eq!(outcomes.lock()[0].fired_indices(), vec![0, 1, 2, 3]);
}

#[test]
fn nested_failure_propagates_to_outer() {
    let failing = NestedCoroutine::new(Coroutine::new(|co| async move {
        co.wait(Immediate::new()).await?;
        Err(CoroutineError::body("lane crashed"))
    }));

    let result = invoke(move |co| async move {
        co.wait(any_of([failing.boxed(), Never::new().boxed()]))
            .await?;
        Ok(())
    });

    match result {
        Err(err) => assert_eq!(err.to_string(), "Coroutine body failed: lane crashed"),
        Ok(handle) => panic!("expected failure, handle is {:?}", handle.state()),
    }
}

#[test]
fn cancelling_fan_out_cancels_every_lane() {
    let ev_loop = ManualLoop::ordered();
    let lane_cleanups = Arc::new(AtomicUsize::new(0));
    let children: Vec<_> = (0..3)
        .map(|lane| {
            NestedCoroutine::from_fn(
                |co, (ev_loop, lane, cleanups): (ManualLoop, usize, Arc<AtomicUsize>)| async move {
                    let result = co.wait(ev_loop.event(format!("lane-{lane}"))).await;
                    if result.is_err() {
                        cleanups.fetch_add(1, Ordering::SeqCst);
                    }
                    result.map(|_| ())
                },
                (ev_loop.clone(), lane, Arc::clone(&lane_cleanups)),
            )
        })
        .collect();

    let handle = invoke(move |co| async move {
        co.wait(all_of(children)).await?;
        Ok(())
    })
    .unwrap();
    assert_eq!(ev_loop.pending(), 3);

    // One lane finishes; the other two are still parked.
    assert!(ev_loop.fire("lane-1"));
    handle.cancel();

    assert_eq!(lane_cleanups.load(Ordering::SeqCst), 2);
    assert_eq!(ev_loop.pending(), 0);
    assert_eq!(handle.state(), CoroutineState::Cancelled);
}
