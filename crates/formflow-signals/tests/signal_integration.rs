//! Integration tests for the form signal set.
//!
//! Tests cover: payload delivery, filtering inside receivers, receiver
//! ordering, isolation between form instances, and re-entrant disconnects.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use formflow_signals::{FieldBlurred, FormSignals, Signal, StepChanged, ValueChanged};

// ═════════════════════════════════════════════════════════════════════
// 1. Payload delivery
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_value_changed_receives_payload() {
    let signals = FormSignals::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let r = received.clone();

    signals.value_changed.connect(
        "capture",
        Arc::new(move |event: &ValueChanged| {
            r.lock().unwrap().push(event.clone());
        }),
    );

    signals.value_changed.send(&ValueChanged {
        field: "email".to_string(),
        value: serde_json::json!("jane@example.com"),
    });

    let recorded = received.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].field, "email");
    assert_eq!(recorded[0].value, serde_json::json!("jane@example.com"));
}

// ═════════════════════════════════════════════════════════════════════
// 2. Receivers filter on payload contents
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_blur_receiver_filters_errors() {
    let signals = FormSignals::new();
    let errors = Arc::new(AtomicUsize::new(0));
    let e = errors.clone();

    signals.field_blurred.connect(
        "error_counter",
        Arc::new(move |event: &FieldBlurred| {
            if event.error.is_some() {
                e.fetch_add(1, Ordering::SeqCst);
            }
        }),
    );

    signals.field_blurred.send(&FieldBlurred {
        field: "name".to_string(),
        error: None,
    });
    signals.field_blurred.send(&FieldBlurred {
        field: "email".to_string(),
        error: Some("Invalid email address".to_string()),
    });

    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

// ═════════════════════════════════════════════════════════════════════
// 3. Multiple receivers fire in registration order
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_multiple_receivers_fire_in_order() {
    let signal: Signal<StepChanged> = Signal::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for name in ["first", "second", "third"] {
        let o = order.clone();
        signal.connect(
            name,
            Arc::new(move |_: &StepChanged| {
                o.lock().unwrap().push(name);
            }),
        );
    }

    assert_eq!(signal.send(&StepChanged { from: 0, to: 1 }), 3);
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

// ═════════════════════════════════════════════════════════════════════
// 4. Two forms never share receivers
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_form_instances_are_isolated() {
    let a = FormSignals::new();
    let b = FormSignals::new();
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();

    a.step_changed.connect(
        "listener",
        Arc::new(move |_: &StepChanged| {
            c.fetch_add(1, Ordering::SeqCst);
        }),
    );

    b.step_changed.send(&StepChanged { from: 1, to: 2 });
    assert_eq!(count.load(Ordering::SeqCst), 0);

    a.step_changed.send(&StepChanged { from: 1, to: 2 });
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

// ═════════════════════════════════════════════════════════════════════
// 5. A receiver may disconnect itself while being dispatched
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_receiver_can_disconnect_during_send() {
    let signal: Arc<Signal<()>> = Arc::new(Signal::new());
    let count = Arc::new(AtomicUsize::new(0));

    let s = Arc::downgrade(&signal);
    let c = count.clone();
    signal.connect(
        "once",
        Arc::new(move |(): &()| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(signal) = s.upgrade() {
                signal.disconnect("once");
            }
        }),
    );

    signal.send(&());
    signal.send(&());
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(signal.receiver_count(), 0);
}
