// MIT/Apache2 License

use gui_events::{
    config::{ModalityConfig, QueueConfig},
    event::{DeliveryTarget, Event, EventClass, EventKind, EventLoopAction, KeyAction, SourceId, WindowEventKind},
    modal::{ModalityType, WindowPeer, WindowSpec},
    runtime::Runtime,
    Error,
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

type Log = Arc<Mutex<Vec<(SourceId, EventClass)>>>;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn manual_runtime() -> Runtime {
    init();
    Runtime::with_config(QueueConfig::manual(), ModalityConfig::default())
}

fn recorder(log: &Log, id: SourceId) -> DeliveryTarget {
    let log = Arc::clone(log);
    DeliveryTarget::window(move |ev: &Event| log.lock().unwrap().push((id, ev.class())))
}

#[derive(Default)]
struct RaisePeer {
    raised: AtomicUsize,
}

impl WindowPeer for RaisePeer {
    fn set_blocked(&self, _blocked: bool) {}

    fn to_front(&self) {
        self.raised.fetch_add(1, Ordering::SeqCst);
    }
}

fn window_and_dialog(runtime: &Runtime, log: &Log) -> (SourceId, SourceId, Arc<RaisePeer>) {
    let (window, dialog) = (SourceId::next(), SourceId::next());
    let peer = Arc::new(RaisePeer::default());
    runtime.register_window(window, recorder(log, window), WindowSpec::new());
    runtime
        .register_dialog(
            dialog,
            recorder(log, dialog),
            WindowSpec::new().shared_peer(peer.clone()),
            ModalityType::ApplicationModal,
        )
        .unwrap();
    runtime.show_window(window).unwrap();
    (window, dialog, peer)
}

#[test]
fn modal_dialog_filters_input_until_hidden() {
    let runtime = manual_runtime();
    let log: Log = Arc::default();
    let (window, dialog, peer) = window_and_dialog(&runtime, &log);

    runtime
        .post(Event::key(window, KeyAction::Pressed, 13, 1))
        .unwrap();
    runtime.post(Event::custom(window, 7)).unwrap();
    runtime
        .post(Event::window(window, WindowEventKind::Activated))
        .unwrap();
    runtime.post(Event::key(dialog, KeyAction::Pressed, 13, 2)).unwrap();
    let hider = runtime.clone();
    runtime
        .invoke_later(move || hider.hide_window(dialog).unwrap())
        .unwrap();

    runtime.show_dialog(dialog).unwrap();

    assert!(!runtime.modality().is_visible(dialog));
    assert!(!runtime.modality().is_blocked(window));
    assert_eq!(peer.raised.load(Ordering::SeqCst), 1);
    assert_eq!(
        *log.lock().unwrap(),
        vec![(window, EventClass::Custom), (dialog, EventClass::Key)]
    );

    // the filter is gone with the loop
    runtime
        .post(Event::key(window, KeyAction::Pressed, 13, 3))
        .unwrap();
    assert_eq!(runtime.dispatch_pending(Duration::from_millis(0)).unwrap(), 1);
    assert_eq!(log.lock().unwrap().last(), Some(&(window, EventClass::Key)));
}

#[test]
fn showing_a_dialog_twice_is_refused() {
    let runtime = manual_runtime();
    let log: Log = Arc::default();
    let (_window, dialog, _peer) = window_and_dialog(&runtime, &log);
    let nested = Arc::new(Mutex::new(None));

    let inner = runtime.clone();
    let result = Arc::clone(&nested);
    runtime
        .invoke_later(move || {
            *result.lock().unwrap() = Some(inner.show_dialog(dialog));
            inner.hide_window(dialog).unwrap();
        })
        .unwrap();

    runtime.show_dialog(dialog).unwrap();
    assert!(matches!(
        nested.lock().unwrap().take(),
        Some(Err(Error::SecondaryLoopActive))
    ));
}

#[test]
fn modeless_dialogs_return_immediately() {
    let runtime = manual_runtime();
    let log: Log = Arc::default();
    let palette = SourceId::next();
    runtime
        .register_dialog(
            palette,
            recorder(&log, palette),
            WindowSpec::new(),
            ModalityType::Modeless,
        )
        .unwrap();

    runtime.show_dialog(palette).unwrap();
    assert!(runtime.modality().is_visible(palette));
    assert!(runtime.modality().modal_dialogs().is_empty());
}

#[test]
fn unknown_windows_and_refused_dialogs() {
    let runtime = manual_runtime();
    let log: Log = Arc::default();
    let ghost = SourceId::next();
    assert!(matches!(
        runtime.show_dialog(ghost),
        Err(Error::UnknownWindow(id)) if id == ghost
    ));

    let toolkit = SourceId::next();
    assert!(matches!(
        runtime.register_dialog(
            toolkit,
            recorder(&log, toolkit),
            WindowSpec::new(),
            ModalityType::ToolkitModal
        ),
        Err(Error::Security(_))
    ));
    assert!(!runtime.is_registered(toolkit));
    assert!(!runtime.modality().is_registered(toolkit));
}

#[test]
fn peekers_can_consume_events() {
    let runtime = manual_runtime();
    let log: Log = Arc::default();
    let window = SourceId::next();
    runtime.register_window(window, recorder(&log, window), WindowSpec::new());
    let peeked = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&peeked);
    runtime.add_peeker_owned(move |_runtime, event| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(match event.kind() {
            EventKind::Custom(99) => EventLoopAction::Break,
            _ => EventLoopAction::Continue,
        })
    });

    runtime.post(Event::custom(window, 99)).unwrap();
    runtime.post(Event::custom(window, 1)).unwrap();
    assert_eq!(runtime.dispatch_pending(Duration::from_millis(0)).unwrap(), 2);

    assert_eq!(peeked.load(Ordering::SeqCst), 2);
    assert_eq!(*log.lock().unwrap(), vec![(window, EventClass::Custom)]);
}

#[test]
fn unregistering_drops_pending_events() {
    let runtime = manual_runtime();
    let log: Log = Arc::default();
    let (window, button) = (SourceId::next(), SourceId::next());
    runtime.register_window(window, recorder(&log, window), WindowSpec::new());
    let button_log = Arc::clone(&log);
    runtime.register_target(
        button,
        DeliveryTarget::component(window, move |ev: &Event| {
            button_log.lock().unwrap().push((button, ev.class()))
        }),
    );

    runtime.type_ahead().enqueue(5, button);
    runtime.post(Event::custom(button, 1)).unwrap();
    runtime.post(Event::custom(window, 2)).unwrap();
    runtime.unregister_target(button).unwrap();

    assert!(!runtime.is_registered(button));
    assert!(!runtime.type_ahead().has_marker(button));
    assert_eq!(runtime.dispatch_pending(Duration::from_millis(0)).unwrap(), 1);
    assert_eq!(*log.lock().unwrap(), vec![(window, EventClass::Custom)]);
}

#[test]
fn invoke_and_wait_fails_fast_while_pumping_by_hand() {
    let runtime = manual_runtime();
    let window = SourceId::next();
    let outcome = Arc::new(Mutex::new(None));

    let inner = runtime.clone();
    let result = Arc::clone(&outcome);
    runtime.register_window(
        window,
        DeliveryTarget::window(move |_ev: &Event| {
            *result.lock().unwrap() = Some(inner.invoke_and_wait(|| ()));
        }),
        WindowSpec::new(),
    );

    runtime.post(Event::custom(window, 1)).unwrap();
    assert_eq!(runtime.dispatch_pending(Duration::from_millis(0)).unwrap(), 1);
    assert!(matches!(
        outcome.lock().unwrap().take(),
        Some(Err(Error::InvokeFromDispatchThread))
    ));
    assert!(runtime.queue().is_empty());
    assert!(!runtime.queue().is_dispatch_thread());
}

#[test]
fn events_without_a_target_are_dropped() {
    let runtime = manual_runtime();
    runtime.post(Event::custom(SourceId::next(), 1)).unwrap();
    assert_eq!(runtime.dispatch_pending(Duration::from_millis(0)).unwrap(), 1);
}

#[test]
fn show_dialog_waits_while_the_worker_dispatches() {
    init();
    let runtime = Runtime::new();
    let log: Log = Arc::default();
    let (window, dialog, _peer) = window_and_dialog(&runtime, &log);

    let poster = runtime.clone();
    let background = thread::spawn(move || {
        while !poster.modality().is_visible(dialog) {
            thread::sleep(Duration::from_millis(5));
        }
        poster.post(Event::custom(window, 1)).unwrap();
        poster
            .post(Event::key(window, KeyAction::Pressed, 13, 1))
            .unwrap();
        // runs after both events above
        poster.invoke_and_wait(|| ()).unwrap();
        poster.hide_window(dialog).unwrap();
    });

    // only returns once the background thread hides the dialog
    runtime.show_dialog(dialog).unwrap();
    background.join().unwrap();

    assert!(!runtime.modality().is_visible(dialog));
    let log = log.lock().unwrap();
    assert!(log.contains(&(window, EventClass::Custom)));
}
