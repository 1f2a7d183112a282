//! Integration tests for the agent's control loop.
//!
//! The loop never returns; every test ends it with a reboot request,
//! which the panicking restart port turns into a finished test thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::mock_ports::{PanicRestart, RecordingSink, ScriptedListener, fast_config};

use ota_agent::adapters::flash_slots::FlashSlotAdapter;
use ota_agent::app::events::AgentEvent;
use ota_agent::app::service::UpdateAgent;
use ota_agent::connectivity::ConnectivitySignal;

fn spawn_agent(listener: ScriptedListener, connectivity: Arc<ConnectivitySignal>) -> (JoinHandle<()>, RecordingSink) {
    let sink = RecordingSink::new();
    let agent = UpdateAgent::new(
        fast_config(),
        connectivity,
        listener,
        FlashSlotAdapter::new(),
        sink.clone(),
        PanicRestart,
    );
    let handle = thread::spawn(move || -> () { agent.run() });
    (handle, sink)
}

fn reachable() -> Arc<ConnectivitySignal> {
    let signal = Arc::new(ConnectivitySignal::new());
    signal.set_reachable(true);
    signal
}

/// Wait for the agent thread to restart (panic) within a deadline.
fn expect_restart(handle: JoinHandle<()>) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.is_finished() {
        assert!(Instant::now() < deadline, "agent did not restart in time");
        thread::sleep(Duration::from_millis(5));
    }
    assert!(handle.join().is_err(), "loop must end through the restart port");
}

#[test]
fn waits_for_connectivity_before_binding() {
    let (listener, tally) = ScriptedListener::new();
    let connectivity = Arc::new(ConnectivitySignal::new());
    let (handle, sink) = spawn_agent(listener.request(b"!*"), Arc::clone(&connectivity));

    thread::sleep(Duration::from_millis(100));
    assert_eq!(tally.binds(), 0, "must not listen while unreachable");
    assert!(!handle.is_finished());

    connectivity.set_reachable(true);
    expect_restart(handle);
    assert_eq!(tally.binds(), 1);
    assert_eq!(tally.replies(), vec!["OK\r\n"]);
    assert_eq!(
        sink.count(|e| matches!(e, AgentEvent::RebootScheduled { .. })),
        1
    );
}

#[test]
fn bind_failures_are_retried() {
    let (listener, tally) = ScriptedListener::new();
    let (handle, _) = spawn_agent(listener.fail_binds(3).request(b"!*"), reachable());

    expect_restart(handle);
    assert_eq!(tally.bind_failures.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(tally.binds(), 1);
}

#[test]
fn accept_failure_tears_down_and_rebinds() {
    let (listener, tally) = ScriptedListener::new();
    let (handle, _) = spawn_agent(listener.accept_error().request(b"!*"), reachable());

    expect_restart(handle);
    assert_eq!(tally.binds(), 2);
    assert_eq!(tally.unbinds(), 1);
    assert_eq!(tally.replies(), vec!["OK\r\n"]);
}

#[test]
fn connection_errors_keep_the_listener() {
    let (listener, tally) = ScriptedListener::new();
    let listener = listener.broken_read().broken_write(b"?").request(b"!*");
    let (handle, _) = spawn_agent(listener, reachable());

    expect_restart(handle);
    assert_eq!(tally.binds(), 1);
    assert_eq!(tally.unbinds(), 0);
    assert_eq!(tally.replies(), vec!["", "", "OK\r\n"]);
}

#[test]
fn reboot_is_terminal() {
    let (listener, tally) = ScriptedListener::new();
    let listener = listener.requests(&[b"![", b"!00", b"!]", b"!*", b"?"]);
    let (handle, sink) = spawn_agent(listener, reachable());

    expect_restart(handle);
    assert_eq!(tally.replies(), vec!["OK\r\n"; 4], "nothing is served after a reboot reply");
    assert!(!sink.events().iter().any(|e| matches!(e, AgentEvent::Status(_))));
}
