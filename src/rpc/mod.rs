//! Command-channel subsystem.
//!
//! One request per connection, one reply per request. Requests are short
//! ASCII commands; firmware data travels as hex text.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    Command channel                        │
//! │                                                           │
//! │  ┌───────────┐   ┌──────────┐   ┌──────────────────────┐ │
//! │  │ Transport │──▶│ Command  │──▶│ Engine (dispatcher)  │ │
//! │  │ (trait)   │   │ (parse)  │   │  → OtaManager        │ │
//! │  └───────────┘   └──────────┘   └──────────┬───────────┘ │
//! │       ▲                                    │             │
//! │       │          ┌──────────┐              │             │
//! │       └──────────│  Reply   │◀─────────────┘             │
//! │                  │ (render) │                            │
//! │                  └──────────┘                            │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod command;
pub mod engine;
pub mod ota;
pub mod server;
pub mod transport;
