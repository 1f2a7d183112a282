//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing agent events to the `log` facade
//! (UART / USB-CDC on the device, stderr on the host). The `?` status
//! dump is rendered as one JSON line so it can be scraped off the console.

use log::{info, warn};

use crate::app::events::AgentEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AgentEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AgentEvent) {
        match event {
            AgentEvent::SessionStarted { slot } => {
                info!("OTA | session started | target {}", slot);
            }
            AgentEvent::ChunkWritten { len, total } => {
                info!("OTA | chunk {} bytes | total {}", len, total);
            }
            AgentEvent::SessionFinished { slot, bytes } => {
                info!("OTA | session finished | {} bytes | next boot {}", bytes, slot);
            }
            AgentEvent::SessionFailed(e) => {
                warn!("OTA | session failed | {}", e);
            }
            AgentEvent::CommandRejected { error, code } => {
                warn!("RPC | rejected with OTA_ERROR {} | {}", code, error);
            }
            AgentEvent::Status(report) => match serde_json::to_string(report) {
                Ok(json) => info!("STATUS | {}", json),
                Err(e) => warn!("STATUS | serialization failed: {}", e),
            },
            AgentEvent::RebootScheduled { grace_ms } => {
                info!("SYS | restarting in {} ms", grace_ms);
            }
        }
    }
}
