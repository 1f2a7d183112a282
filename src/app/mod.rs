//! Application core: update orchestration behind port traits.
//!
//! The [`service::UpdateAgent`] is the process's control loop: it gates
//! the command channel on connectivity, serves one connection at a time
//! and performs the terminal restart. All interaction with flash, the
//! network and the chip happens through the **port traits** defined in
//! [`ports`] and [`crate::rpc::transport`], keeping this layer testable
//! without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
