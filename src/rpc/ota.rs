//! OTA firmware update session: hex chunks streamed into the inactive slot.
//!
//! Flow: begin → N × hex chunk → end → (restart on request)
//!
//! The image arrives as many small commands, each on its own connection,
//! so the manager carries the target slot and running offset across calls.
//! Exactly one session exists per process; it is owned by the single
//! control-loop worker and needs no locking.
//!
//! ```text
//! Idle ──begin──▶ Writing ──chunk ok / bad hex──▶ Writing
//!   ▲               │  │
//!   │     end ok    │  └──storage fault / end fail──▶ Error
//!   └───────────────┘                                  │
//!                         Writing ◀──begin (recovery)──┘
//! ```

use core::fmt;

use log::{info, warn};
use serde::Serialize;

use super::codec::{self, HexError};
use crate::app::events::StatusReport;
use crate::app::ports::{SlotError, SlotInfo, SlotStore};
use crate::config::MAX_REQUEST_LEN;

/// Staging buffer for one decoded chunk. A request can hold at most
/// `MAX_REQUEST_LEN` hex digits, i.e. half as many bytes.
const OTA_STAGING_BUF_SIZE: usize = MAX_REQUEST_LEN / 2;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OtaError {
    /// No inactive slot exists.
    PartitionNotFound,
    /// The inactive slot cannot be prepared for writing.
    PartitionNotActivatable,
    /// Opening the write session failed.
    BeginFailed,
    /// The chunk is not valid hex. Session state is unchanged.
    DecodeError,
    /// Appending to the slot failed.
    WriteFailed,
    /// A chunk arrived with no session open.
    WriteWithoutSession,
    /// Verification or activation failed.
    FinalizeFailed,
    /// End was requested with no session open.
    EndWithoutSession,
}

impl OtaError {
    /// Stable numeric code carried in `OTA_ERROR <code>` replies.
    pub const fn code(self) -> u8 {
        match self {
            Self::PartitionNotFound => 1,
            Self::PartitionNotActivatable => 2,
            Self::BeginFailed => 3,
            Self::DecodeError | Self::WriteFailed | Self::WriteWithoutSession => 4,
            Self::FinalizeFailed | Self::EndWithoutSession => 5,
        }
    }
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PartitionNotFound => write!(f, "no inactive OTA partition available"),
            Self::PartitionNotActivatable => write!(f, "OTA partition cannot be prepared"),
            Self::BeginFailed => write!(f, "OTA begin failed"),
            Self::DecodeError => write!(f, "malformed hex chunk"),
            Self::WriteFailed => write!(f, "OTA write failed"),
            Self::WriteWithoutSession => write!(f, "chunk received with no update in progress"),
            Self::FinalizeFailed => write!(f, "OTA finalize failed"),
            Self::EndWithoutSession => write!(f, "end received with no update in progress"),
        }
    }
}

// ── State machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Writing,
    Finalizing,
    /// Terminal until the next successful begin.
    Error(OtaError),
}

/// Side-effect-free view of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub bytes_written: u32,
}

// ── Manager ───────────────────────────────────────────────────

/// OTA firmware update manager.
///
/// Generic over the [`SlotStore`] port: the device build plugs in the
/// `esp-ota` backed adapter, host builds and tests an in-memory one.
pub struct OtaManager<S: SlotStore> {
    store: S,
    state: SessionState,
    target_slot: Option<SlotInfo>,
    writer: Option<S::Writer>,
    bytes_written: u32,
    staging_buf: [u8; OTA_STAGING_BUF_SIZE],
}

impl<S: SlotStore> OtaManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: SessionState::Idle,
            target_slot: None,
            writer: None,
            bytes_written: 0,
            staging_buf: [0u8; OTA_STAGING_BUF_SIZE],
        }
    }

    pub fn current_state(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            bytes_written: self.bytes_written,
        }
    }

    /// True while an upload is underway.
    pub fn in_progress(&self) -> bool {
        matches!(self.state, SessionState::Writing | SessionState::Finalizing)
    }

    pub fn target_slot(&self) -> Option<&SlotInfo> {
        self.target_slot.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Open a session on the inactive slot.
    ///
    /// Restarts from scratch if a session is already writing; the previous
    /// write handle is dropped, which abandons it. If the new session then
    /// cannot be opened, the state moves to `Error` rather than staying in
    /// `Writing` with no handle.
    pub fn begin_update(&mut self) -> Result<(), OtaError> {
        let discarded = self.writer.take().is_some();
        if discarded {
            warn!("OTA: begin while writing, discarding {} bytes", self.bytes_written);
            self.target_slot = None;
            self.bytes_written = 0;
        }

        match self.open_session() {
            Ok((slot, writer)) => {
                info!("OTA: begin, writing to {}", slot);
                self.writer = Some(writer);
                self.target_slot = Some(slot);
                self.bytes_written = 0;
                self.state = SessionState::Writing;
                Ok(())
            }
            // The old session is already gone, so `Writing` would be a lie.
            Err(e) if discarded => {
                self.fail(e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn open_session(&mut self) -> Result<(SlotInfo, S::Writer), OtaError> {
        let slot = self.store.select_inactive_slot().map_err(|e| {
            warn!("OTA: no update slot: {}", e);
            OtaError::PartitionNotFound
        })?;

        let writer = self.store.open_for_write(&slot).map_err(|e| {
            warn!("OTA: open {} failed: {}", slot.label, e);
            match e {
                SlotError::NotActivatable => OtaError::PartitionNotActivatable,
                _ => OtaError::BeginFailed,
            }
        })?;
        Ok((slot, writer))
    }

    /// Decode one hex line and append it at the current offset.
    ///
    /// Malformed hex leaves the session untouched so the chunk can be
    /// resent. A storage fault ends the session in `Error`.
    pub fn write_hex_chunk(&mut self, hex: impl AsRef<[u8]>) -> Result<(), OtaError> {
        if self.state != SessionState::Writing {
            return Err(OtaError::WriteWithoutSession);
        }
        let Some(writer) = self.writer.as_mut() else {
            return Err(OtaError::WriteWithoutSession);
        };

        let data = codec::decode_into(hex.as_ref(), &mut self.staging_buf).map_err(
            |e: HexError| {
                warn!("OTA: chunk rejected at offset {}: {}", self.bytes_written, e);
                OtaError::DecodeError
            },
        )?;
        let len = data.len();

        if let Err(e) = self.store.append(writer, data) {
            warn!("OTA: write at offset {} failed: {}", self.bytes_written, e);
            self.fail(OtaError::WriteFailed);
            return Err(OtaError::WriteFailed);
        }

        self.bytes_written += len as u32;
        Ok(())
    }

    /// Finalize the image and make the target slot the next boot target.
    pub fn end_update(&mut self) -> Result<(), OtaError> {
        if self.state != SessionState::Writing {
            return Err(OtaError::EndWithoutSession);
        }
        self.state = SessionState::Finalizing;

        let Some(writer) = self.writer.take() else {
            warn!("OTA: finalize with no write handle");
            self.fail(OtaError::FinalizeFailed);
            return Err(OtaError::FinalizeFailed);
        };
        if self.bytes_written == 0 {
            warn!("OTA: finalize of an empty image");
            drop(writer);
            self.fail(OtaError::FinalizeFailed);
            return Err(OtaError::FinalizeFailed);
        }

        if let Err(e) = self.store.finalize_and_activate(writer) {
            warn!("OTA: finalize failed: {}", e);
            self.fail(OtaError::FinalizeFailed);
            return Err(OtaError::FinalizeFailed);
        }

        self.state = SessionState::Idle;
        info!(
            "OTA: {} bytes finalized, next boot from {}",
            self.bytes_written,
            self.target_slot.as_ref().map_or("?", |s| s.label.as_str())
        );
        Ok(())
    }

    /// Gather the diagnostic dump for a status query.
    pub fn status_report(&self, reachable: bool) -> StatusReport {
        StatusReport {
            firmware_version: crate::FIRMWARE_VERSION,
            state: self.state,
            bytes_written: self.bytes_written,
            target_slot: self.target_slot.clone(),
            running_slot: self.store.running_slot(),
            boot_slot: self.store.boot_slot(),
            next_slot: self.store.select_inactive_slot().ok(),
            reachable,
        }
    }

    fn fail(&mut self, error: OtaError) {
        self.writer = None;
        self.state = SessionState::Error(error);
    }
}

// ── Tests ─────────────────────────────────────────────────────
