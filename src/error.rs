//! Unified error types for the OTA agent.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! top-level startup and control-loop error handling uniform. All variants
//! are `Copy` so they can be passed through the command path without
//! allocation.

use core::fmt;

use crate::config::ConfigError;
use crate::rpc::ota::OtaError;

// ---------------------------------------------------------------------------
// Top-level agent error
// ---------------------------------------------------------------------------

/// Every fallible operation in the agent funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An update-session operation failed.
    Ota(OtaError),
    /// The control connection failed at the socket level.
    Link(LinkError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// Platform initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ota(e) => write!(f, "ota: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<OtaError> for Error {
    fn from(e: OtaError) -> Self {
        Self::Ota(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::Malformed => Self::Config("malformed config document"),
            ConfigError::IoError => Self::Config("config file unreadable"),
        }
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

/// Connection-level failures on the command channel.
///
/// These never reach the update session: the control loop logs them,
/// backs off, and keeps serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The listening socket could not be bound.
    Bind,
    /// Accepting a client failed.
    Accept,
    /// Reading the request failed before the peer finished sending.
    Read,
    /// Writing the reply failed.
    Write,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind => write!(f, "bind failed"),
            Self::Accept => write!(f, "accept failed"),
            Self::Read => write!(f, "read failed"),
            Self::Write => write!(f, "write failed"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Agent-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
