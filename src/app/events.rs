//! Outbound agent events.
//!
//! The command engine and control loop emit these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide where they go: serial log today, a collector later.

use serde::Serialize;

use super::ports::SlotInfo;
use crate::rpc::ota::{OtaError, SessionState};

/// Structured events emitted by the update core.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// An update session opened a write handle on `slot`.
    SessionStarted { slot: SlotInfo },

    /// A chunk was appended; `total` is the running byte count.
    ChunkWritten { len: usize, total: u32 },

    /// The image was finalized and `slot` is the next boot target.
    SessionFinished { slot: SlotInfo, bytes: u32 },

    /// A storage failure moved the session to `Error`.
    SessionFailed(OtaError),

    /// A command was answered with `OTA_ERROR <code>`.
    CommandRejected { error: OtaError, code: u8 },

    /// Diagnostic dump requested with `?`.
    Status(StatusReport),

    /// The device restarts after the reply has left.
    RebootScheduled { grace_ms: u32 },
}

/// Point-in-time diagnostic snapshot of the update core.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub firmware_version: &'static str,
    pub state: SessionState,
    pub bytes_written: u32,
    pub target_slot: Option<SlotInfo>,
    pub running_slot: Option<SlotInfo>,
    pub boot_slot: Option<SlotInfo>,
    pub next_slot: Option<SlotInfo>,
    pub reachable: bool,
}
