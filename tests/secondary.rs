// MIT/Apache2 License

use gui_events::{
    config::QueueConfig,
    event::{Event, EventKind, SourceId},
    queue::{EventFilter, EventQueue, FilterAction},
};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn recording(config: QueueConfig) -> (EventQueue, Arc<Mutex<Vec<u32>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let queue = EventQueue::new(config, move |ev: Event| {
        if let EventKind::Custom(n) = ev.kind() {
            s.lock().unwrap().push(*n);
        }
    });
    (queue, seen)
}

#[test]
fn pumps_until_the_predicate_turns_false() {
    init();
    let (queue, seen) = recording(QueueConfig::manual());
    let source = SourceId::next();
    let done = Arc::new(AtomicBool::new(false));

    queue.post(Event::custom(source, 1)).unwrap();
    let d = Arc::clone(&done);
    queue.invoke_later(move || d.store(true, Ordering::SeqCst)).unwrap();
    queue.post(Event::custom(source, 2)).unwrap();

    let secondary = queue.secondary_loop();
    let entered = secondary
        .enter(|| !done.load(Ordering::SeqCst), None)
        .unwrap();
    assert!(entered);
    assert!(!secondary.is_running());

    // the predicate is checked between events, so the event after the invocation waits
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(queue.len(), 1);
}

#[test]
fn reentry_is_refused() {
    let (queue, _) = recording(QueueConfig::manual());
    let secondary = queue.secondary_loop();
    let inner = secondary.clone();
    let (tx, rx) = flume::bounded(1);

    queue
        .invoke_later(move || {
            let _ = tx.send(inner.enter(|| true, None).ok());
            inner.exit();
        })
        .unwrap();

    assert!(secondary.enter(|| true, None).unwrap());
    assert_eq!(rx.try_recv().unwrap(), Some(false));
}

#[test]
fn panicking_predicate_uninstalls_the_loop() {
    init();
    let (queue, seen) = recording(QueueConfig::manual());
    let secondary = queue.secondary_loop();
    let rejecting: Arc<dyn EventFilter> = Arc::new(|_ev: &Event| FilterAction::Reject);

    let panicked = panic::catch_unwind(AssertUnwindSafe(|| {
        secondary.enter(|| panic!("bad predicate"), Some(Arc::clone(&rejecting)))
    }));
    assert!(panicked.is_err());
    assert!(!secondary.is_running());

    // the filter went away with the loop
    queue.post(Event::custom(SourceId::next(), 4)).unwrap();
    let event = queue.pop_timeout(Duration::from_millis(0)).unwrap().unwrap();
    queue.dispatch_event(event);
    assert_eq!(*seen.lock().unwrap(), vec![4]);
}

#[test]
fn exit_without_a_running_loop_is_a_no_op() {
    let (queue, _) = recording(QueueConfig::manual());
    let secondary = queue.secondary_loop();
    assert!(!secondary.exit());
    assert!(!secondary.is_running());
}

#[test]
fn filter_rejects_events_while_running() {
    let (queue, seen) = recording(QueueConfig::manual());
    let source = SourceId::next();
    let filter: Arc<dyn EventFilter> = Arc::new(|ev: &Event| match ev.kind() {
        EventKind::Custom(13) => FilterAction::Reject,
        _ => FilterAction::Accept,
    });

    let secondary = queue.secondary_loop();
    let exit = secondary.clone();
    queue.post(Event::custom(source, 12)).unwrap();
    queue.post(Event::custom(source, 13)).unwrap();
    queue.post(Event::custom(source, 14)).unwrap();
    queue
        .invoke_later(move || {
            exit.exit();
        })
        .unwrap();

    assert!(secondary.enter(|| true, Some(filter)).unwrap());
    assert_eq!(*seen.lock().unwrap(), vec![12, 14]);

    // the filter is gone with the loop
    queue.post(Event::custom(source, 13)).unwrap();
    let event = queue.pop_blocking().unwrap();
    queue.dispatch_event(event);
    assert_eq!(*seen.lock().unwrap(), vec![12, 14, 13]);
}

#[test]
fn exit_from_another_thread_wakes_a_waiting_loop() {
    init();
    let (queue, _) = recording(QueueConfig::default());
    let secondary = queue.secondary_loop();
    let remote = secondary.clone();

    let exiter = thread::spawn(move || {
        for _ in 0..500 {
            if remote.exit() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    });

    // not the dispatch thread, so this waits while the worker keeps dispatching
    assert!(secondary.enter(|| true, None).unwrap());
    assert!(exiter.join().unwrap());
}

#[test]
fn waiting_loop_sees_events_dispatched_by_the_worker() {
    let (queue, seen) = recording(QueueConfig::default());
    let source = SourceId::next();
    let secondary = queue.secondary_loop();

    let q = queue.clone();
    let poster = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        for n in 0..3 {
            q.post(Event::custom(source, n)).unwrap();
        }
    });

    let watched = Arc::clone(&seen);
    assert!(secondary
        .enter(move || watched.lock().unwrap().len() < 3, None)
        .unwrap());
    poster.join().unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
}
