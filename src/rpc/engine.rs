//! Command dispatcher.
//!
//! Turns one request into one update-manager call and one reply. Owns the
//! single update session and the pending-reboot flag; both live exactly as
//! long as the control loop that owns the engine.

use std::sync::Arc;

use log::{debug, info};

use super::command::{Command, Reply};
use super::ota::{OtaError, OtaManager};
use crate::app::events::AgentEvent;
use crate::app::ports::{EventSink, SlotStore};
use crate::connectivity::ConnectivitySignal;

pub struct CommandEngine<S: SlotStore> {
    ota: OtaManager<S>,
    connectivity: Arc<ConnectivitySignal>,
    reboot_pending: bool,
}

impl<S: SlotStore> CommandEngine<S> {
    pub fn new(store: S, connectivity: Arc<ConnectivitySignal>) -> Self {
        Self {
            ota: OtaManager::new(store),
            connectivity,
            reboot_pending: false,
        }
    }

    /// Process one request and build its reply.
    pub fn handle(&mut self, request: &[u8], sink: &mut impl EventSink) -> Reply {
        let command = Command::parse(request);
        debug!("RPC: {:?}", command);
        self.dispatch(command, sink)
    }

    /// Process a request whose first line was cut off by the size limit.
    ///
    /// A cut chunk is rejected as malformed without touching the slot;
    /// writing its prefix would shift every byte that follows. Other
    /// commands are decided by their first bytes and run as usual.
    pub fn handle_truncated(&mut self, request: &[u8], sink: &mut impl EventSink) -> Reply {
        let command = Command::parse(request);
        debug!("RPC: {:?} (truncated)", command);
        if let Command::WriteChunk(_) = command {
            return reject(OtaError::DecodeError, sink);
        }
        self.dispatch(command, sink)
    }

    fn dispatch(&mut self, command: Command<'_>, sink: &mut impl EventSink) -> Reply {
        let result = match command {
            Command::BeginUpdate => self.ota.begin_update().map(|()| {
                if let Some(slot) = self.ota.target_slot() {
                    sink.emit(&AgentEvent::SessionStarted { slot: slot.clone() });
                }
            }),
            Command::WriteChunk(hex) => self.ota.write_hex_chunk(hex).map(|()| {
                sink.emit(&AgentEvent::ChunkWritten {
                    len: hex.len() / 2,
                    total: self.ota.current_state().bytes_written,
                });
            }),
            Command::EndUpdate => self.ota.end_update().map(|()| {
                if let Some(slot) = self.ota.target_slot() {
                    sink.emit(&AgentEvent::SessionFinished {
                        slot: slot.clone(),
                        bytes: self.ota.current_state().bytes_written,
                    });
                }
            }),
            Command::RequestReboot => {
                info!("RPC: reboot requested");
                self.reboot_pending = true;
                Ok(())
            }
            Command::QueryStatus => {
                let report = self.ota.status_report(self.connectivity.is_reachable());
                sink.emit(&AgentEvent::Status(report));
                Ok(())
            }
            Command::Unrecognized => Ok(()),
        };

        match result {
            Ok(()) => Reply::Ok,
            Err(error) => {
                if is_storage_failure(error) {
                    sink.emit(&AgentEvent::SessionFailed(error));
                }
                reject(error, sink)
            }
        }
    }

    /// Set once a reboot command has been answered; never cleared.
    pub fn reboot_pending(&self) -> bool {
        self.reboot_pending
    }

    pub fn ota(&self) -> &OtaManager<S> {
        &self.ota
    }

    pub fn ota_mut(&mut self) -> &mut OtaManager<S> {
        &mut self.ota
    }
}

fn reject(error: OtaError, sink: &mut impl EventSink) -> Reply {
    let code = error.code();
    sink.emit(&AgentEvent::CommandRejected { error, code });
    Reply::OtaError(code)
}

fn is_storage_failure(error: OtaError) -> bool {
    matches!(error, OtaError::WriteFailed | OtaError::FinalizeFailed)
}
