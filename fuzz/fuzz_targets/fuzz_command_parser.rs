//! Fuzz target: request classification and dispatch.
//!
//! Feeds arbitrary requests through `Command::parse` and a full
//! `CommandEngine` backed by the in-memory slot store. Every request must
//! produce exactly one well-formed reply without panicking.
//!
//! cargo fuzz run fuzz_command_parser

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use ota_agent::adapters::flash_slots::FlashSlotAdapter;
use ota_agent::app::events::AgentEvent;
use ota_agent::app::ports::EventSink;
use ota_agent::connectivity::ConnectivitySignal;
use ota_agent::rpc::command::{Command, Reply};
use ota_agent::rpc::engine::CommandEngine;

struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &AgentEvent) {}
}

fuzz_target!(|data: &[u8]| {
    if let Command::WriteChunk(hex) = Command::parse(data) {
        assert!(hex.len() < data.len(), "payload must exclude the '!' prefix");
    }

    let mut engine = CommandEngine::new(FlashSlotAdapter::new(), Arc::new(ConnectivitySignal::new()));
    // Open a session first so chunk payloads reach the decoder.
    let _ = engine.handle(b"![", &mut NullSink);
    let reply = engine.handle(data, &mut NullSink);
    let rendered = reply.render();
    assert!(rendered.ends_with("\r\n"));
    if let Reply::OtaError(code) = reply {
        assert!((1..=5).contains(&code), "unexpected code {}", code);
    }
});
