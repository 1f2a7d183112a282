//! Port traits: the hexagonal boundary between the update core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ OtaManager / CommandEngine / UpdateAgent
//! ```
//!
//! Driven adapters (flash slots, event sinks, restart) implement these
//! traits. The core consumes them via generics, so the update logic never
//! touches partitions or the chip directly.
//!
//! The byte-stream connection ports live next to the protocol in
//! [`crate::rpc::transport`].

use core::fmt;

use serde::Serialize;

// ───────────────────────────────────────────────────────────────
// Slot store port (driven adapter: domain ↔ flash partitions)
// ───────────────────────────────────────────────────────────────

/// Identity of one firmware slot (an OTA app partition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
    /// OTA slot index (`ota_0` → 0).
    pub index: u8,
    /// Partition-table label.
    pub label: heapless::String<16>,
    /// Flash offset of the slot.
    pub address: u32,
    /// Slot capacity in bytes.
    pub size: u32,
}

impl fmt::Display for SlotInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ 0x{:08x} ({} bytes)", self.label, self.address, self.size)
    }
}

/// Storage slot provider.
///
/// An update session opens one write handle on the inactive slot, appends
/// to it sequentially and hands it back for finalization. Dropping a
/// handle without finalizing it abandons the write.
pub trait SlotStore {
    /// Open write session on one slot.
    type Writer;

    /// Pick the slot that is not currently running.
    fn select_inactive_slot(&self) -> Result<SlotInfo, SlotError>;

    /// Prepare `slot` for writing and return its write handle.
    fn open_for_write(&mut self, slot: &SlotInfo) -> Result<Self::Writer, SlotError>;

    /// Append `bytes` at the handle's current offset.
    fn append(&mut self, writer: &mut Self::Writer, bytes: &[u8]) -> Result<(), SlotError>;

    /// Close the handle, verify the image and mark the slot as the next
    /// boot target.
    fn finalize_and_activate(&mut self, writer: Self::Writer) -> Result<(), SlotError>;

    /// Slot the firmware is executing from.
    fn running_slot(&self) -> Option<SlotInfo>;

    /// Slot the bootloader will pick on the next restart.
    fn boot_slot(&self) -> Option<SlotInfo>;
}

/// Errors from [`SlotStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    /// No inactive slot exists in the partition table.
    NotFound,
    /// The slot exists but cannot be prepared for writing.
    NotActivatable,
    /// The write would run past the end of the slot.
    Full,
    /// Flash I/O fault.
    Io,
    /// The written image failed platform verification.
    InvalidImage,
    /// The boot target could not be switched.
    ActivateFailed,
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no inactive slot"),
            Self::NotActivatable => write!(f, "slot cannot be prepared"),
            Self::Full => write!(f, "slot full"),
            Self::Io => write!(f, "flash I/O error"),
            Self::InvalidImage => write!(f, "image verification failed"),
            Self::ActivateFailed => write!(f, "set boot slot failed"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / diagnostics)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AgentEvent`](super::events::AgentEvent)s
/// through this port, including the status dump requested by `?`.
/// Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AgentEvent);
}

// ───────────────────────────────────────────────────────────────
// Restart port (driven adapter: domain → chip reset)
// ───────────────────────────────────────────────────────────────

/// Restart trigger. Once called, the device is going down.
pub trait RestartPort {
    fn restart_device(&mut self) -> !;
}
