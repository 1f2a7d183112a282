//! Firmware slot adapter.
//!
//! Implements [`SlotStore`]: the hexagonal boundary for the OTA app
//! partitions.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: partition-table lookups via `esp-idf-sys`,
//!   image writes and boot switching via the `esp-ota` crate.
//! - **all other targets**: two in-memory slots with fault injection for
//!   host-side tests and the simulation binary.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{SlotError, SlotInfo, SlotStore};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ───────────────────────────────────────────────────────────────
// Write handle
// ───────────────────────────────────────────────────────────────

/// Open write session on one slot.
pub struct SlotWriter {
    slot: SlotInfo,
    #[cfg(target_os = "espidf")]
    update: esp_ota::OtaUpdate,
    #[cfg(not(target_os = "espidf"))]
    image: Vec<u8>,
}

impl SlotWriter {
    pub fn slot(&self) -> &SlotInfo {
        &self.slot
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

/// Simulated slot size; matches a 1.5 MB `ota_N` partition.
#[cfg(not(target_os = "espidf"))]
const SIM_SLOT_SIZE: u32 = 0x18_0000;

#[cfg(not(target_os = "espidf"))]
const SIM_SLOT_BASE: u32 = 0x1_0000;

pub struct FlashSlotAdapter {
    /// Simulation: committed image per slot.
    #[cfg(not(target_os = "espidf"))]
    sim_images: [Option<Vec<u8>>; 2],
    /// Simulation: image of the currently open write handle.
    #[cfg(not(target_os = "espidf"))]
    sim_pending: Option<Vec<u8>>,
    #[cfg(not(target_os = "espidf"))]
    sim_running: u8,
    #[cfg(not(target_os = "espidf"))]
    sim_boot: u8,
    #[cfg(not(target_os = "espidf"))]
    sim_slot_count: u8,
    #[cfg(not(target_os = "espidf"))]
    sim_slot_size: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_open_fault: Option<SlotError>,
    #[cfg(not(target_os = "espidf"))]
    sim_append_limit: Option<usize>,
    #[cfg(not(target_os = "espidf"))]
    sim_activation_fault: bool,
}

impl FlashSlotAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        Self {}
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            sim_images: [None, None],
            sim_pending: None,
            sim_running: 0,
            sim_boot: 0,
            sim_slot_count: 2,
            sim_slot_size: SIM_SLOT_SIZE,
            sim_open_fault: None,
            sim_append_limit: None,
            sim_activation_fault: false,
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    /// Build a [`SlotInfo`] from a partition-table entry.
    ///
    /// # Safety
    ///
    /// `part` must be null or point to an entry of the partition table,
    /// which lives for the whole program.
    #[cfg(target_os = "espidf")]
    unsafe fn slot_info(part: *const esp_partition_t) -> Option<SlotInfo> {
        if part.is_null() {
            return None;
        }
        // SAFETY: non-null partition pointers returned by esp_ota_* refer to
        // the static partition table.
        let part = unsafe { &*part };
        let mut label = heapless::String::new();
        for &c in part.label.iter().take_while(|&&c| c != 0) {
            let _ = label.push(c as u8 as char);
        }
        let index = part
            .subtype
            .saturating_sub(esp_partition_subtype_t_ESP_PARTITION_SUBTYPE_APP_OTA_MIN)
            as u8;
        Some(SlotInfo {
            index,
            label,
            address: part.address,
            size: part.size,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn sim_slot(&self, index: u8) -> SlotInfo {
        let mut label = heapless::String::new();
        let _ = core::fmt::Write::write_fmt(&mut label, format_args!("ota_{}", index));
        SlotInfo {
            index,
            label,
            address: SIM_SLOT_BASE + u32::from(index) * SIM_SLOT_SIZE,
            size: self.sim_slot_size,
        }
    }
}

impl Default for FlashSlotAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation controls (host only)
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl FlashSlotAdapter {
    /// Committed image of slot `index`.
    pub fn sim_image(&self, index: u8) -> Option<&[u8]> {
        self.sim_images.get(index as usize)?.as_deref()
    }

    /// Bytes appended through the open write handle so far.
    pub fn pending_image(&self) -> Option<&[u8]> {
        self.sim_pending.as_deref()
    }

    /// Leave only the running slot in the partition table.
    pub fn sim_remove_spare_slot(&mut self) {
        self.sim_slot_count = 1;
    }

    /// Shrink every slot to `size` bytes.
    pub fn sim_set_slot_size(&mut self, size: u32) {
        self.sim_slot_size = size;
    }

    /// Make every following `open_for_write` fail with `error`.
    pub fn sim_fail_open(&mut self, error: SlotError) {
        self.sim_open_fault = Some(error);
    }

    /// Fail any append that would take the image past `limit` bytes.
    pub fn sim_fail_append_after(&mut self, limit: usize) {
        self.sim_append_limit = Some(limit);
    }

    pub fn sim_fail_activation(&mut self, fail: bool) {
        self.sim_activation_fault = fail;
    }

    pub fn sim_clear_faults(&mut self) {
        self.sim_open_fault = None;
        self.sim_append_limit = None;
        self.sim_activation_fault = false;
    }

    /// Simulated restart: the boot slot becomes the running slot.
    pub fn sim_reboot(&mut self) {
        self.sim_running = self.sim_boot;
    }
}

// ───────────────────────────────────────────────────────────────
// SlotStore
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl SlotStore for FlashSlotAdapter {
    type Writer = SlotWriter;

    fn select_inactive_slot(&self) -> Result<SlotInfo, SlotError> {
        // SAFETY: partition-table lookups only read static flash metadata.
        let next = unsafe { esp_ota_get_next_update_partition(core::ptr::null()) };
        unsafe { Self::slot_info(next) }.ok_or(SlotError::NotFound)
    }

    fn open_for_write(&mut self, slot: &SlotInfo) -> Result<SlotWriter, SlotError> {
        if self.running_slot().is_some_and(|r| r.address == slot.address) {
            return Err(SlotError::NotActivatable);
        }
        let update = esp_ota::OtaUpdate::begin().map_err(|e| {
            warn!("esp-ota begin failed: {:?}", e);
            SlotError::Io
        })?;
        info!("Slots: erased {} for writing", slot.label);
        Ok(SlotWriter {
            slot: slot.clone(),
            update,
        })
    }

    fn append(&mut self, writer: &mut SlotWriter, bytes: &[u8]) -> Result<(), SlotError> {
        writer.update.write(bytes).map_err(|e| {
            warn!("esp-ota write failed: {:?}", e);
            SlotError::Io
        })
    }

    fn finalize_and_activate(&mut self, writer: SlotWriter) -> Result<(), SlotError> {
        let mut completed = writer.update.finalize().map_err(|e| {
            warn!("esp-ota finalize failed: {:?}", e);
            SlotError::InvalidImage
        })?;
        completed.set_as_boot_partition().map_err(|e| {
            warn!("esp-ota set_as_boot_partition failed: {:?}", e);
            SlotError::ActivateFailed
        })?;
        info!("Slots: {} marked as boot partition", writer.slot.label);
        Ok(())
    }

    fn running_slot(&self) -> Option<SlotInfo> {
        // SAFETY: see select_inactive_slot.
        unsafe { Self::slot_info(esp_ota_get_running_partition()) }
    }

    fn boot_slot(&self) -> Option<SlotInfo> {
        // SAFETY: see select_inactive_slot.
        unsafe { Self::slot_info(esp_ota_get_boot_partition()) }
    }
}

#[cfg(not(target_os = "espidf"))]
impl SlotStore for FlashSlotAdapter {
    type Writer = SlotWriter;

    fn select_inactive_slot(&self) -> Result<SlotInfo, SlotError> {
        if self.sim_slot_count < 2 {
            return Err(SlotError::NotFound);
        }
        Ok(self.sim_slot(1 - self.sim_running))
    }

    fn open_for_write(&mut self, slot: &SlotInfo) -> Result<SlotWriter, SlotError> {
        if let Some(e) = self.sim_open_fault {
            return Err(e);
        }
        if slot.index == self.sim_running {
            return Err(SlotError::NotActivatable);
        }
        self.sim_pending = Some(Vec::new());
        info!("Slots(sim): erased {} for writing", slot.label);
        Ok(SlotWriter {
            slot: slot.clone(),
            image: Vec::new(),
        })
    }

    fn append(&mut self, writer: &mut SlotWriter, bytes: &[u8]) -> Result<(), SlotError> {
        let new_len = writer.image.len() + bytes.len();
        if new_len > writer.slot.size as usize {
            return Err(SlotError::Full);
        }
        if self.sim_append_limit.is_some_and(|limit| new_len > limit) {
            return Err(SlotError::Io);
        }
        writer.image.extend_from_slice(bytes);
        self.sim_pending = Some(writer.image.clone());
        Ok(())
    }

    fn finalize_and_activate(&mut self, writer: SlotWriter) -> Result<(), SlotError> {
        self.sim_pending = None;
        if writer.image.is_empty() {
            return Err(SlotError::InvalidImage);
        }
        if self.sim_activation_fault {
            return Err(SlotError::ActivateFailed);
        }
        let index = writer.slot.index;
        self.sim_images[index as usize] = Some(writer.image);
        self.sim_boot = index;
        info!("Slots(sim): {} marked as boot partition", writer.slot.label);
        Ok(())
    }

    fn running_slot(&self) -> Option<SlotInfo> {
        Some(self.sim_slot(self.sim_running))
    }

    fn boot_slot(&self) -> Option<SlotInfo> {
        Some(self.sim_slot(self.sim_boot))
    }
}
