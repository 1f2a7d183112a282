//! Integration tests for the connection → command → update-session chain.
//!
//! Each test scripts a sequence of client connections and steps the agent
//! through them with `serve_next`, one connection per call, the way the
//! control loop does.

use std::sync::Arc;

use crate::mock_ports::{PanicRestart, RecordingSink, ScriptedListener, fast_config};

use ota_agent::adapters::flash_slots::FlashSlotAdapter;
use ota_agent::app::events::AgentEvent;
use ota_agent::app::ports::{SlotError, SlotStore};
use ota_agent::app::service::UpdateAgent;
use ota_agent::config::AgentConfig;
use ota_agent::connectivity::ConnectivitySignal;
use ota_agent::error::LinkError;
use ota_agent::rpc::ota::{OtaError, SessionState};
use ota_agent::rpc::server::Served;

type Agent = UpdateAgent<ScriptedListener, FlashSlotAdapter, RecordingSink, PanicRestart>;

fn agent_with(config: AgentConfig, listener: ScriptedListener, store: FlashSlotAdapter) -> (Agent, RecordingSink) {
    let sink = RecordingSink::new();
    let connectivity = Arc::new(ConnectivitySignal::new());
    connectivity.set_reachable(true);
    let agent = UpdateAgent::new(config, connectivity, listener, store, sink.clone(), PanicRestart);
    (agent, sink)
}

fn agent(listener: ScriptedListener) -> (Agent, RecordingSink) {
    agent_with(fast_config(), listener, FlashSlotAdapter::new())
}

fn serve_all(agent: &mut Agent, n: usize) -> Vec<Result<Served, LinkError>> {
    (0..n).map(|_| agent.serve_next()).collect()
}

// ── Scenario A: full upload ───────────────────────────────────

#[test]
fn full_upload_lands_in_inactive_slot() {
    let (listener, tally) = ScriptedListener::new();
    let listener = listener.requests(&[b"![", b"!48656C\r\n", b"!6C6F", b"!]"]);
    let (mut agent, sink) = agent(listener);

    for r in serve_all(&mut agent, 4) {
        assert_eq!(r, Ok(Served::Continue));
    }
    assert_eq!(tally.replies(), vec!["OK\r\n"; 4]);

    let store = agent.engine().ota().store();
    assert_eq!(store.sim_image(1), Some(&b"Hello"[..]));
    assert_eq!(store.boot_slot().map(|s| s.index), Some(1));
    assert_eq!(agent.engine().ota().current_state().state, SessionState::Idle);
    assert_eq!(
        sink.count(|e| matches!(e, AgentEvent::ChunkWritten { .. })),
        2
    );
}

// ── Scenario B: malformed chunk mid-session ───────────────────

#[test]
fn malformed_chunk_is_rejected_and_session_survives() {
    let (listener, tally) = ScriptedListener::new();
    let listener = listener.requests(&[b"![", b"!0G", b"!00", b"!]"]);
    let (mut agent, sink) = agent(listener);

    serve_all(&mut agent, 4);
    assert_eq!(
        tally.replies(),
        vec!["OK\r\n", "OTA_ERROR 4\r\n", "OK\r\n", "OK\r\n"]
    );
    assert_eq!(agent.engine().ota().store().sim_image(1), Some(&[0u8][..]));
    assert!(sink.events().iter().any(|e| matches!(
        e,
        AgentEvent::CommandRejected { error: OtaError::DecodeError, code: 4 }
    )));
}

#[test]
fn odd_length_chunk_writes_nothing() {
    let (listener, tally) = ScriptedListener::new();
    let listener = listener.requests(&[b"![", b"!ABC"]);
    let (mut agent, _) = agent(listener);

    serve_all(&mut agent, 2);
    assert_eq!(tally.replies()[1], "OTA_ERROR 4\r\n");
    let snap = agent.engine().ota().current_state();
    assert_eq!(snap.state, SessionState::Writing);
    assert_eq!(snap.bytes_written, 0);
}

// ── Scenario D: commands outside a session ────────────────────

#[test]
fn end_without_begin_is_code_5() {
    let (listener, tally) = ScriptedListener::new();
    let (mut agent, _) = agent(listener.request(b"!]"));

    assert_eq!(agent.serve_next(), Ok(Served::Continue));
    assert_eq!(tally.replies(), vec!["OTA_ERROR 5\r\n"]);
    assert_eq!(agent.engine().ota().current_state().state, SessionState::Idle);
}

#[test]
fn chunk_without_begin_is_code_4() {
    let (listener, tally) = ScriptedListener::new();
    let (mut agent, _) = agent(listener.request(b"!DEADBEEF"));

    agent.serve_next().unwrap();
    assert_eq!(tally.replies(), vec!["OTA_ERROR 4\r\n"]);
    assert_eq!(agent.engine().ota().current_state().bytes_written, 0);
}

#[test]
fn unknown_and_empty_requests_get_ok() {
    let (listener, tally) = ScriptedListener::new();
    let (mut agent, sink) = agent(listener.requests(&[b"hello", b""]));

    serve_all(&mut agent, 2);
    assert_eq!(tally.replies(), vec!["OK\r\n", "OK\r\n"]);
    assert!(sink.events().is_empty());
}

// ── Slot failures ─────────────────────────────────────────────

#[test]
fn begin_without_spare_slot_is_code_1() {
    let (listener, tally) = ScriptedListener::new();
    let mut store = FlashSlotAdapter::new();
    store.sim_remove_spare_slot();
    let (mut agent, _) = agent_with(fast_config(), listener.request(b"!["), store);

    agent.serve_next().unwrap();
    assert_eq!(tally.replies(), vec!["OTA_ERROR 1\r\n"]);
}

#[test]
fn begin_on_unpreparable_slot_is_code_2() {
    let (listener, tally) = ScriptedListener::new();
    let mut store = FlashSlotAdapter::new();
    store.sim_fail_open(SlotError::NotActivatable);
    let (mut agent, _) = agent_with(fast_config(), listener.request(b"!["), store);

    agent.serve_next().unwrap();
    assert_eq!(tally.replies(), vec!["OTA_ERROR 2\r\n"]);
}

#[test]
fn storage_fault_fails_session_until_next_begin() {
    let (listener, tally) = ScriptedListener::new();
    let mut store = FlashSlotAdapter::new();
    store.sim_fail_append_after(1);
    let listener = listener.requests(&[b"![", b"!0011", b"!22", b"![", b"!22", b"!]"]);
    let (mut agent, sink) = agent_with(fast_config(), listener, store);

    serve_all(&mut agent, 3);
    assert_eq!(
        tally.replies(),
        vec!["OK\r\n", "OTA_ERROR 4\r\n", "OTA_ERROR 4\r\n"]
    );
    assert_eq!(
        agent.engine().ota().current_state().state,
        SessionState::Error(OtaError::WriteFailed)
    );
    assert_eq!(
        sink.count(|e| matches!(e, AgentEvent::SessionFailed(OtaError::WriteFailed))),
        1
    );

    // A fresh begin recovers and the next upload succeeds.
    serve_all(&mut agent, 3);
    assert_eq!(&tally.replies()[3..], ["OK\r\n", "OK\r\n", "OK\r\n"]);
    assert_eq!(agent.engine().ota().store().sim_image(1), Some(&[0x22u8][..]));
}

#[test]
fn end_with_no_data_is_code_5() {
    let (listener, tally) = ScriptedListener::new();
    let (mut agent, _) = agent(listener.requests(&[b"![", b"!]"]));

    serve_all(&mut agent, 2);
    assert_eq!(tally.replies(), vec!["OK\r\n", "OTA_ERROR 5\r\n"]);
    assert!(matches!(
        agent.engine().ota().current_state().state,
        SessionState::Error(_)
    ));
}

// ── Request framing ───────────────────────────────────────────

#[test]
fn oversized_request_is_truncated() {
    let (listener, tally) = ScriptedListener::new();
    let config = AgentConfig {
        max_request_len: 8,
        ..fast_config()
    };
    // Cut to "!0011223" by the 8-byte buffer; refused without writing.
    let listener = listener.requests(&[b"![", b"!0011223344"]);
    let (mut agent, _) = agent_with(config, listener, FlashSlotAdapter::new());

    serve_all(&mut agent, 2);
    assert_eq!(tally.replies(), vec!["OK\r\n", "OTA_ERROR 4\r\n"]);
}

#[test]
fn cut_chunk_is_refused_even_when_it_looks_well_formed() {
    let (listener, tally) = ScriptedListener::new();
    let config = AgentConfig {
        max_request_len: 5,
        ..fast_config()
    };
    // "!0102" is what fits: valid hex, but not the chunk that was sent.
    let listener = listener.requests(&[b"![", b"!0102030405", b"!]"]);
    let (mut agent, sink) = agent_with(config, listener, FlashSlotAdapter::new());

    serve_all(&mut agent, 3);
    assert_eq!(
        tally.replies(),
        vec!["OK\r\n", "OTA_ERROR 4\r\n", "OTA_ERROR 5\r\n"]
    );
    let store = agent.engine().ota().store();
    assert_eq!(store.sim_image(1), None);
    assert_eq!(store.boot_slot().map(|s| s.index), Some(0));
    assert_eq!(sink.count(|e| matches!(e, AgentEvent::ChunkWritten { .. })), 0);
}

#[test]
fn full_buffer_with_complete_first_line_is_served() {
    let (listener, tally) = ScriptedListener::new();
    let config = AgentConfig {
        max_request_len: 6,
        ..fast_config()
    };
    let listener = listener.requests(&[b"![", b"!AB\n!]", b"!]"]);
    let (mut agent, _) = agent_with(config, listener, FlashSlotAdapter::new());

    serve_all(&mut agent, 3);
    assert_eq!(tally.replies(), vec!["OK\r\n"; 3]);
    assert_eq!(agent.engine().ota().store().sim_image(1), Some(&[0xABu8][..]));
}

#[test]
fn only_first_line_is_interpreted() {
    let (listener, tally) = ScriptedListener::new();
    let (mut agent, _) = agent(listener.requests(&[b"![\r\n!]\r\n", b"!AA\r\n!*"]));

    serve_all(&mut agent, 2);
    assert_eq!(tally.replies(), vec!["OK\r\n", "OK\r\n"]);
    assert_eq!(agent.engine().ota().current_state().state, SessionState::Writing);
    assert!(!agent.engine().reboot_pending());
}

// ── Status dump ───────────────────────────────────────────────

#[test]
fn status_query_reports_session() {
    let (listener, tally) = ScriptedListener::new();
    let (mut agent, sink) = agent(listener.requests(&[b"![", b"!CAFE", b"?"]));

    serve_all(&mut agent, 3);
    assert_eq!(tally.replies()[2], "OK\r\n");
    let events = sink.events();
    let Some(AgentEvent::Status(report)) = events.last() else {
        panic!("expected a status event, got {:?}", events.last());
    };
    assert_eq!(report.state, SessionState::Writing);
    assert_eq!(report.bytes_written, 2);
    assert!(report.reachable);
    assert_eq!(report.target_slot.as_ref().map(|s| s.index), Some(1));
    assert_eq!(report.running_slot.as_ref().map(|s| s.index), Some(0));
}

// ── Link failures ─────────────────────────────────────────────

#[test]
fn read_failure_is_reported_and_leaves_session_alone() {
    let (listener, tally) = ScriptedListener::new();
    let (mut agent, _) = agent(listener.broken_read().request(b"?"));

    assert_eq!(agent.serve_next(), Err(LinkError::Read));
    assert_eq!(tally.replies(), vec![""]);
    assert_eq!(agent.engine().ota().current_state().state, SessionState::Idle);

    assert_eq!(agent.serve_next(), Ok(Served::Continue));
}

#[test]
fn lost_reply_still_applies_command() {
    let (listener, _tally) = ScriptedListener::new();
    let (mut agent, _) = agent(listener.broken_write(b"!["));

    assert_eq!(agent.serve_next(), Err(LinkError::Write));
    assert_eq!(agent.engine().ota().current_state().state, SessionState::Writing);
}

#[test]
fn lost_reply_does_not_cancel_reboot() {
    let (listener, _tally) = ScriptedListener::new();
    let (mut agent, _) = agent(listener.broken_write(b"!*"));

    assert_eq!(agent.serve_next(), Ok(Served::Reboot));
}

#[test]
fn accept_failure_is_classified() {
    let (listener, _tally) = ScriptedListener::new();
    let (mut agent, _) = agent(listener.accept_error());

    assert_eq!(agent.serve_next(), Err(LinkError::Accept));
}

// ── Scenario C (reply half) ───────────────────────────────────

#[test]
fn reboot_request_is_answered_before_restart() {
    let (listener, tally) = ScriptedListener::new();
    let (mut agent, _) = agent(listener.requests(&[b"![", b"!*"]));

    assert_eq!(agent.serve_next(), Ok(Served::Continue));
    assert_eq!(agent.serve_next(), Ok(Served::Reboot));
    assert_eq!(tally.replies(), vec!["OK\r\n", "OK\r\n"]);
    assert!(agent.engine().reboot_pending());
}
