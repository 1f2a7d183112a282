//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock ports. All tests run on the host with no real hardware
//! or network required.

#![cfg(not(target_os = "espidf"))]

mod run_loop_tests;
mod session_tests;
