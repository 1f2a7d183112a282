//! OTA agent library.
//!
//! Exposes the update core, the command channel and the adapters for
//! integration testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod rpc;

#[cfg(target_os = "espidf")]
mod esp_link_shims;

pub use error::{Error, Result};

/// Firmware version reported in the boot banner and status dumps.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");
