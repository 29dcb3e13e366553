use std::cell::RefCell;
use std::rc::Rc;

use arcade_engine::error::EngineError;
use arcade_engine::messaging::*;

#[derive(Debug, PartialEq)]
enum Event {
    Scored(u32),
    Died,
    Restart,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum EventKind {
    Scored,
    Died,
    Restart,
}

impl Message for Event {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            Event::Scored(_) => EventKind::Scored,
            Event::Died => EventKind::Died,
            Event::Restart => EventKind::Restart,
        }
    }
}

fn log() -> Rc<RefCell<Vec<String>>> {
    Rc::new(RefCell::new(Vec::new()))
}

// ── Delivery ──────────────────────────────────────────────────────────────────

#[test]
fn handlers_run_in_subscription_order() {
    let mut bus = MessageBus::<Event>::new();
    let seen = log();
    let (a, b) = (Rc::clone(&seen), Rc::clone(&seen));
    bus.subscribe(EventKind::Scored, move |m, _| a.borrow_mut().push(format!("h1 {m:?}")));
    bus.subscribe(EventKind::Scored, move |m, _| b.borrow_mut().push(format!("h2 {m:?}")));

    bus.publish(&Event::Scored(7));
    assert_eq!(*seen.borrow(), vec!["h1 Scored(7)", "h2 Scored(7)"]);
}

#[test]
fn only_matching_kind_is_delivered() {
    let mut bus = MessageBus::<Event>::new();
    let seen = log();
    let s = Rc::clone(&seen);
    bus.subscribe(EventKind::Died, move |_, _| s.borrow_mut().push("died".into()));

    bus.publish(&Event::Scored(1));
    assert!(seen.borrow().is_empty());
    bus.publish(&Event::Died);
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn publish_without_subscribers_is_noop() {
    let mut bus = MessageBus::<Event>::new();
    bus.publish(&Event::Restart);
    assert_eq!(bus.subscriber_count(EventKind::Restart), 0);
}

#[test]
fn subscriber_count_per_kind() {
    let mut bus = MessageBus::<Event>::new();
    bus.subscribe(EventKind::Scored, |_, _| {});
    bus.subscribe(EventKind::Scored, |_, _| {});
    bus.subscribe(EventKind::Died, |_, _| {});
    assert_eq!(bus.subscriber_count(EventKind::Scored), 2);
    assert_eq!(bus.subscriber_count(EventKind::Died), 1);
}

#[test]
fn subscription_ids_are_distinct() {
    let mut bus = MessageBus::<Event>::new();
    let a = bus.subscribe(EventKind::Scored, |_, _| {});
    let b = bus.subscribe(EventKind::Scored, |_, _| {});
    assert_ne!(a, b);
}

// ── Unsubscribe ───────────────────────────────────────────────────────────────

#[test]
fn unsubscribe_is_rejected_and_handler_stays() {
    let mut bus = MessageBus::<Event>::new();
    let seen = log();
    let s = Rc::clone(&seen);
    let id = bus.subscribe(EventKind::Died, move |_, _| s.borrow_mut().push("died".into()));

    let err = bus.unsubscribe(id).unwrap_err();
    assert!(matches!(err, EngineError::UnsubscribeUnsupported));

    bus.publish(&Event::Died);
    assert_eq!(seen.borrow().len(), 1);
}

// ── Re-entrancy ───────────────────────────────────────────────────────────────

#[test]
fn handler_can_publish_nested_message() {
    let mut bus = MessageBus::<Event>::new();
    let seen = log();
    let (a, b, c) = (Rc::clone(&seen), Rc::clone(&seen), Rc::clone(&seen));
    bus.subscribe(EventKind::Died, move |_, bus| {
        a.borrow_mut().push("died".into());
        bus.publish(&Event::Restart);
        a.borrow_mut().push("died done".into());
    });
    bus.subscribe(EventKind::Restart, move |_, _| b.borrow_mut().push("restart".into()));
    bus.subscribe(EventKind::Died, move |_, _| c.borrow_mut().push("second died".into()));

    bus.publish(&Event::Died);
    assert_eq!(*seen.borrow(), vec!["died", "restart", "died done", "second died"]);
}

#[test]
fn subscription_during_publish_applies_next_time() {
    let mut bus = MessageBus::<Event>::new();
    let seen = log();
    let s = Rc::clone(&seen);
    bus.subscribe(EventKind::Scored, move |_, bus| {
        let inner = Rc::clone(&s);
        bus.subscribe(EventKind::Scored, move |_, _| inner.borrow_mut().push("late".into()));
    });

    bus.publish(&Event::Scored(1));
    assert!(seen.borrow().is_empty());
    bus.publish(&Event::Scored(2));
    assert_eq!(*seen.borrow(), vec!["late"]);
}

#[test]
fn unit_message_routes_to_single_kind() {
    let mut bus = MessageBus::<()>::new();
    let hits = Rc::new(RefCell::new(0));
    let h = Rc::clone(&hits);
    bus.subscribe((), move |_, _| *h.borrow_mut() += 1);
    bus.publish(&());
    bus.publish(&());
    assert_eq!(*hits.borrow(), 2);
}
