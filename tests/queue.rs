// MIT/Apache2 License

use gui_events::{
    config::QueueConfig,
    event::{Event, EventClass, EventKind, MouseAction, PeerEvent, PeerFlags, PeerPayload, Priority, SourceId},
    geometry::{update_rect, Point},
    queue::{Coalesce, EventFilter, EventQueue, FilterAction},
    Error,
};
use std::{
    any::Any,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

const WAIT: Duration = Duration::from_secs(5);

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn manual() -> EventQueue {
    EventQueue::new(QueueConfig::manual(), |_ev: Event| {})
}

fn drain(queue: &EventQueue) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = queue.pop_timeout(Duration::from_millis(0)).unwrap() {
        events.push(event);
    }
    events
}

fn custom_ids(events: &[Event]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e.kind() {
            EventKind::Custom(n) => Some(*n),
            _ => None,
        })
        .collect()
}

fn mouse(source: SourceId, action: MouseAction, x: i32, y: i32) -> Event {
    Event::mouse(source, action, Point::new(x, y))
}

#[derive(Debug)]
struct Tick;

impl PeerPayload for Tick {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
struct Counter(u32);

impl PeerPayload for Counter {
    fn coalesce(&self, newer: &dyn PeerPayload) -> Option<Arc<dyn PeerPayload>> {
        let newer = newer.as_any().downcast_ref::<Counter>()?;
        Some(Arc::new(Counter(self.0 + newer.0)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn lanes_drain_by_priority_then_fifo() {
    init();
    let queue = manual();
    let source = SourceId::next();

    queue.post(Event::paint(source, update_rect(0, 0, 1, 1))).unwrap();
    queue.post(Event::custom(source, 1)).unwrap();
    queue
        .post(Event::peer(source, PeerEvent::new(PeerFlags::PRIORITY, Tick)))
        .unwrap();
    queue.post(Event::custom(source, 2)).unwrap();
    queue
        .post(Event::peer(source, PeerEvent::new(PeerFlags::ULTIMATE, Tick)))
        .unwrap();
    queue.post(Event::custom(source, 3)).unwrap();

    let events = drain(&queue);
    let priorities: Vec<Priority> = events.iter().map(Event::priority).collect();
    assert_eq!(
        priorities,
        vec![
            Priority::Ultimate,
            Priority::High,
            Priority::Normal,
            Priority::Normal,
            Priority::Normal,
            Priority::Low
        ]
    );
    assert_eq!(custom_ids(&events), vec![1, 2, 3]);
}

#[test]
fn high_priority_pops_before_normal() {
    let queue = manual();
    let source = SourceId::next();
    queue
        .post(Event::peer(source, PeerEvent::new(PeerFlags::PRIORITY, Tick)))
        .unwrap();
    queue.post(Event::custom(source, 7)).unwrap();

    assert_eq!(queue.pop_blocking().unwrap().priority(), Priority::High);
    assert_eq!(queue.pop_blocking().unwrap().priority(), Priority::Normal);
    assert!(queue.is_empty());
}

#[test]
fn low_flag_selects_low_lane() {
    let queue = manual();
    let source = SourceId::next();
    queue
        .post(Event::peer(source, PeerEvent::new(PeerFlags::LOW, Tick)))
        .unwrap();
    queue.post(Event::custom(source, 1)).unwrap();

    let events = drain(&queue);
    assert_eq!(events[0].priority(), Priority::Normal);
    assert_eq!(events[1].priority(), Priority::Low);
}

#[test]
fn paint_containing_the_pending_one_replaces_it() {
    let queue = manual();
    let source = SourceId::next();
    queue.post(Event::paint(source, update_rect(10, 10, 10, 10))).unwrap();
    queue.post(Event::paint(source, update_rect(0, 0, 100, 100))).unwrap();
    assert_eq!(queue.len(), 1);

    // already covered
    queue.post(Event::paint(source, update_rect(5, 5, 5, 5))).unwrap();
    assert_eq!(queue.len(), 1);

    let event = queue.pop_blocking().unwrap();
    match event.kind() {
        EventKind::Paint { rect, .. } => assert_eq!(*rect, update_rect(0, 0, 100, 100)),
        other => panic!("expected a paint event, got {:?}", other),
    }
}

#[test]
fn disjoint_paints_and_other_sources_stay_separate() {
    let queue = manual();
    let (a, b) = (SourceId::next(), SourceId::next());
    queue.post(Event::paint(a, update_rect(0, 0, 10, 10))).unwrap();
    queue.post(Event::paint(a, update_rect(50, 50, 10, 10))).unwrap();
    queue.post(Event::paint(b, update_rect(0, 0, 10, 10))).unwrap();
    // paint and update use separate slots
    queue.post(Event::update(b, update_rect(0, 0, 10, 10))).unwrap();
    assert_eq!(queue.len(), 4);
}

#[test]
fn mouse_motion_keeps_only_the_latest() {
    let queue = manual();
    let source = SourceId::next();
    for x in 0..5 {
        queue.post(mouse(source, MouseAction::Moved, x, 0)).unwrap();
    }
    assert_eq!(queue.len(), 1);

    match queue.pop_blocking().unwrap().kind() {
        EventKind::Mouse(m) => assert_eq!(m.position, Point::new(4, 0)),
        other => panic!("expected a mouse event, got {:?}", other),
    }
}

#[test]
fn coalescing_never_reorders_kinds() {
    let queue = manual();
    let source = SourceId::next();
    queue.post(mouse(source, MouseAction::Moved, 1, 1)).unwrap();
    queue.post(Event::custom(source, 1)).unwrap();
    queue.post(mouse(source, MouseAction::Moved, 2, 2)).unwrap();

    let events = drain(&queue);
    assert_eq!(events.len(), 3);
    assert!(matches!(events[1].kind(), EventKind::Custom(1)));
}

#[test]
fn peer_payloads_merge() {
    let queue = manual();
    let source = SourceId::next();
    queue
        .post(Event::peer(source, PeerEvent::new(PeerFlags::NONE, Counter(1))))
        .unwrap();
    queue
        .post(Event::peer(source, PeerEvent::new(PeerFlags::NONE, Counter(2))))
        .unwrap();
    // no merge into a different lane
    queue
        .post(Event::peer(source, PeerEvent::new(PeerFlags::PRIORITY, Counter(4))))
        .unwrap();
    assert_eq!(queue.len(), 2);

    let events = drain(&queue);
    let totals: Vec<u32> = events
        .iter()
        .filter_map(|e| match e.kind() {
            EventKind::Peer(peer) => peer.payload().as_any().downcast_ref::<Counter>().map(|c| c.0),
            _ => None,
        })
        .collect();
    assert_eq!(totals, vec![4, 3]);
}

#[test]
fn source_coalescer_can_veto() {
    let queue = manual();
    let (vetoed, normal) = (SourceId::next(), SourceId::next());
    queue.set_source_coalescer(vetoed, |_pending: &Event, _newer: &Event| Coalesce::KeepBoth);

    for source in [vetoed, normal] {
        queue.post(mouse(source, MouseAction::Dragged, 0, 0)).unwrap();
        queue.post(mouse(source, MouseAction::Dragged, 1, 1)).unwrap();
    }
    assert_eq!(queue.len(), 3);

    queue.remove_source_coalescer(vetoed);
    queue.post(mouse(vetoed, MouseAction::Dragged, 2, 2)).unwrap();
    assert_eq!(queue.len(), 3);
}

#[test]
fn coalescing_can_be_disabled() {
    let queue = EventQueue::new(
        QueueConfig::manual().with_coalescing(false),
        |_ev: Event| {},
    );
    let source = SourceId::next();
    queue.post(mouse(source, MouseAction::Moved, 0, 0)).unwrap();
    queue.post(mouse(source, MouseAction::Moved, 1, 1)).unwrap();
    assert_eq!(queue.len(), 2);
}

#[test]
fn posting_twice_is_rejected() {
    let queue = manual();
    queue.post(Event::custom(SourceId::next(), 1)).unwrap();
    let event = queue.pop_blocking().unwrap();
    assert!(event.is_posted());
    assert!(matches!(queue.post(event), Err(Error::InvalidEvent(_))));
    assert!(queue.is_empty());
}

#[test]
fn push_then_pop_round_trips() {
    init();
    let bottom = manual();
    let source = SourceId::next();
    bottom.post(Event::custom(source, 1)).unwrap();
    bottom.post(Event::paint(source, update_rect(0, 0, 5, 5))).unwrap();
    bottom.post(Event::custom(source, 2)).unwrap();

    let top = bottom.push().unwrap();
    assert_eq!(bottom.depth(), 2);
    assert!(top.is_top());
    assert!(!bottom.is_top());
    assert_eq!(top.len(), 3);

    // posts through any handle land on top, and the moved paint still coalesces
    bottom.post(Event::custom(source, 3)).unwrap();
    top.post(Event::paint(source, update_rect(0, 0, 50, 50))).unwrap();
    assert_eq!(top.len(), 4);

    top.pop().unwrap();
    assert!(!top.is_attached());
    assert!(matches!(
        top.post(Event::custom(source, 4)),
        Err(Error::QueueDetached)
    ));
    assert!(matches!(bottom.pop(), Err(Error::EmptyQueueStack)));

    let events = drain(&bottom);
    assert_eq!(custom_ids(&events), vec![1, 2, 3]);
    assert_eq!(events.len(), 4);
    assert!(matches!(events[3].kind(), EventKind::Paint { rect, .. } if *rect == update_rect(0, 0, 50, 50)));
}

#[test]
fn peek_does_not_remove() {
    let queue = manual();
    let source = SourceId::next();
    queue.post(Event::custom(source, 1)).unwrap();
    queue
        .post(Event::peer(source, PeerEvent::new(PeerFlags::PRIORITY, Tick)))
        .unwrap();

    assert_eq!(queue.peek(Event::priority).unwrap(), Some(Priority::High));
    assert!(queue
        .peek_class(EventClass::Custom, Event::id)
        .unwrap()
        .is_some());
    assert!(queue.peek_class(EventClass::Key, Event::id).unwrap().is_none());
    assert_eq!(queue.len(), 2);
}

#[test]
fn remove_source_events_purges_and_releases() {
    let queue = manual();
    let (gone, kept) = (SourceId::next(), SourceId::next());
    queue.post(mouse(gone, MouseAction::Moved, 0, 0)).unwrap();
    queue.post(Event::custom(kept, 1)).unwrap();
    queue.post(Event::custom(gone, 2)).unwrap();

    assert_eq!(queue.remove_source_events(gone).unwrap(), 2);
    assert_eq!(custom_ids(&drain(&queue)), vec![1]);

    // the cache no longer points at the removed move
    queue.post(mouse(gone, MouseAction::Moved, 1, 1)).unwrap();
    assert_eq!(queue.len(), 1);
}

#[test]
fn pending_invocations_are_released_when_the_stack_closes() {
    let queue = manual();
    let captured = Arc::new(());
    let held = Arc::clone(&captured);
    queue.invoke_later(move || drop(held)).unwrap();
    assert_eq!(Arc::strong_count(&captured), 2);

    drop(queue);
    assert_eq!(Arc::strong_count(&captured), 1);
}

#[test]
fn worker_dispatches_in_post_order() {
    init();
    let (tx, rx) = flume::unbounded();
    let queue = EventQueue::new(
        QueueConfig::default().with_thread_name("test-dispatch"),
        move |ev: Event| {
            let name = thread::current().name().map(String::from);
            let _ = tx.send((ev.id(), name));
        },
    );

    let source = SourceId::next();
    let mut ids = Vec::new();
    for n in 0..10 {
        let event = Event::custom(source, n);
        ids.push(event.id());
        queue.post(event).unwrap();
    }

    for id in ids {
        let (got, name) = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(got, id);
        assert_eq!(name.as_deref(), Some("test-dispatch"));
    }
    assert!(queue.owns_dispatch_worker());
    assert!(!queue.is_dispatch_thread());
}

#[test]
fn panicking_delivery_does_not_stop_the_worker() {
    init();
    let (tx, rx) = flume::unbounded();
    let queue = EventQueue::new(QueueConfig::default(), move |ev: Event| {
        if let EventKind::Custom(0) = ev.kind() {
            panic!("bad listener");
        }
        let _ = tx.send(ev.id());
    });

    let source = SourceId::next();
    queue.post(Event::custom(source, 0)).unwrap();
    let good = Event::custom(source, 1);
    let id = good.id();
    queue.post(good).unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), id);
}

#[test]
fn panicking_filter_does_not_stop_the_worker() {
    init();
    let (tx, rx) = flume::unbounded();
    let queue = EventQueue::new(QueueConfig::default(), move |ev: Event| {
        if let EventKind::Custom(n) = ev.kind() {
            let _ = tx.send(*n);
        }
    });

    let (hit_tx, hit_rx) = flume::bounded(1);
    let filter: Arc<dyn EventFilter> = Arc::new(move |ev: &Event| -> FilterAction {
        if let EventKind::Custom(0) = ev.kind() {
            let _ = hit_tx.send(());
            panic!("bad filter");
        }
        FilterAction::Accept
    });

    let secondary = queue.secondary_loop();
    let waiting = secondary.clone();
    let waiter = thread::spawn(move || waiting.enter(|| true, Some(filter)).unwrap());
    assert!(wait_until(|| secondary.is_running()));

    let source = SourceId::next();
    queue.post(Event::custom(source, 0)).unwrap();
    hit_rx.recv_timeout(WAIT).unwrap();
    assert!(secondary.exit());
    assert!(waiter.join().unwrap());

    queue.post(Event::custom(source, 1)).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 1);
    assert!(queue.owns_dispatch_worker());
}

#[test]
fn invoke_and_wait_runs_on_the_worker() {
    let queue = EventQueue::new(QueueConfig::default(), |_ev: Event| {});
    let counter = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&counter);
    let q = queue.clone();

    queue
        .invoke_and_wait(move || {
            assert!(q.is_dispatch_thread());
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    assert!(matches!(
        queue.invoke_and_wait(|| panic!("boom")),
        Err(Error::InvocationPanicked)
    ));
}

#[test]
fn invoke_and_wait_fails_fast_on_the_dispatch_thread() {
    let queue = EventQueue::new(QueueConfig::default(), |_ev: Event| {});
    let (tx, rx) = flume::bounded(1);
    let q = queue.clone();

    queue
        .invoke_later(move || {
            let res = q.invoke_and_wait(|| {});
            let _ = tx.send(matches!(res, Err(Error::InvokeFromDispatchThread)));
        })
        .unwrap();
    assert!(rx.recv_timeout(WAIT).unwrap());
}

#[test]
fn dropped_invocation_wakes_the_waiter() {
    let queue = manual();
    let q = queue.clone();
    let waiter = thread::spawn(move || q.invoke_and_wait(|| {}));

    for _ in 0..500 {
        if !queue.is_empty() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(queue.remove_source_events(SourceId::TOOLKIT).unwrap(), 1);

    let res = waiter.join().unwrap();
    assert!(matches!(res, Err(Error::InvocationDropped)));
}

#[test]
fn shutdown_wakeup_interrupts_a_blocking_pop() {
    let queue = manual();
    // nobody waits yet: a no-op
    queue.wakeup(false);

    let (tx, rx) = flume::bounded(1);
    let q = queue.clone();
    thread::spawn(move || {
        let _ = tx.send(q.pop_blocking().map(|_| ()));
    });

    let mut res = None;
    for _ in 0..500 {
        queue.wakeup(true);
        if let Ok(r) = rx.recv_timeout(Duration::from_millis(10)) {
            res = Some(r);
            break;
        }
    }
    assert!(matches!(res, Some(Err(Error::ShutDown))));
}

fn wait_until<F: Fn() -> bool>(f: F) -> bool {
    for _ in 0..500 {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn retired_worker_is_restarted_by_the_next_post() {
    let (tx, rx) = flume::unbounded();
    let queue = EventQueue::new(
        QueueConfig::default().with_idle_timeout(Some(Duration::from_millis(20))),
        move |ev: Event| {
            let _ = tx.send(ev.id());
        },
    );
    let source = SourceId::next();

    let first = Event::custom(source, 1);
    let id = first.id();
    queue.post(first).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), id);
    assert!(wait_until(|| !queue.owns_dispatch_worker()));

    let second = Event::custom(source, 2);
    let id = second.id();
    queue.post(second).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), id);

    // a shutdown wakeup retires the worker as well
    queue.wakeup(true);
    assert!(wait_until(|| !queue.owns_dispatch_worker()));
    assert!(queue.is_idle());
}
