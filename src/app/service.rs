//! Update agent: the hexagonal core's control loop.
//!
//! [`UpdateAgent`] owns the command engine (and with it the single update
//! session), the listening transport and the outbound ports. It runs on
//! one dedicated worker and serves exactly one connection at a time, so
//! the session is never touched concurrently.
//!
//! ```text
//!  ConnectivitySignal ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                         │      UpdateAgent        │
//!  StreamListener ◀──────▶│ accept · serve · reboot │ ──▶ RestartPort
//!                         └───────────┬────────────┘
//!                                     ▼
//!                           CommandEngine → OtaManager → SlotStore
//! ```

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use super::events::AgentEvent;
use super::ports::{EventSink, RestartPort, SlotStore};
use crate::config::AgentConfig;
use crate::connectivity::ConnectivitySignal;
use crate::error::LinkError;
use crate::rpc::engine::CommandEngine;
use crate::rpc::server::{self, Served};
use crate::rpc::transport::StreamListener;

// ───────────────────────────────────────────────────────────────
// UpdateAgent
// ───────────────────────────────────────────────────────────────

/// The agent orchestrates the command channel and the update session.
pub struct UpdateAgent<L, S, E, R>
where
    L: StreamListener,
    S: SlotStore,
    E: EventSink,
    R: RestartPort,
{
    config: AgentConfig,
    connectivity: Arc<ConnectivitySignal>,
    listener: L,
    engine: CommandEngine<S>,
    sink: E,
    restart: R,
    request_buf: Vec<u8>,
}

impl<L, S, E, R> UpdateAgent<L, S, E, R>
where
    L: StreamListener,
    S: SlotStore,
    E: EventSink,
    R: RestartPort,
{
    pub fn new(
        config: AgentConfig,
        connectivity: Arc<ConnectivitySignal>,
        listener: L,
        store: S,
        sink: E,
        restart: R,
    ) -> Self {
        let request_buf = vec![0u8; config.max_request_len];
        let engine = CommandEngine::new(store, Arc::clone(&connectivity));
        Self {
            config,
            connectivity,
            listener,
            engine,
            sink,
            restart,
            request_buf,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Serve the command channel forever.
    ///
    /// Waits for connectivity, binds, then accepts and serves clients one
    /// by one. Bind and accept failures tear the listener down and start
    /// over after a backoff. The only exit is the restart that follows a
    /// reboot request.
    pub fn run(mut self) -> ! {
        info!("Agent: control loop started (port {})", self.config.listen_port);
        loop {
            self.connectivity.wait_until_reachable();

            if let Err(e) = self.listener.bind(self.config.listen_port) {
                warn!("NET: {} on port {}: {}", LinkError::Bind, self.config.listen_port, e);
                self.backoff();
                continue;
            }

            loop {
                match self.serve_next() {
                    Ok(Served::Continue) => {}
                    Ok(Served::Reboot) => self.reboot(),
                    Err(LinkError::Accept) => {
                        self.backoff();
                        break;
                    }
                    Err(_) => self.backoff(),
                }
            }

            self.listener.unbind();
            std::thread::sleep(Duration::from_millis(u64::from(self.config.rebind_delay_ms)));
        }
    }

    /// Accept one client and serve it.
    ///
    /// The listener must already be bound.
    pub fn serve_next(&mut self) -> Result<Served, LinkError> {
        let conn = self.listener.accept().map_err(|e| {
            warn!("NET: accept failed: {}", e);
            LinkError::Accept
        })?;
        server::serve_connection(conn, &mut self.request_buf, &mut self.engine, &mut self.sink)
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn engine(&self) -> &CommandEngine<S> {
        &self.engine
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    // ── Internal ──────────────────────────────────────────────

    /// Terminal action: give the reply time to leave, then restart.
    /// Not cancellable once entered.
    fn reboot(&mut self) -> ! {
        let grace_ms = self.config.reboot_grace_ms;
        self.sink.emit(&AgentEvent::RebootScheduled { grace_ms });
        info!("Agent: reboot in {} ms", grace_ms);
        std::thread::sleep(Duration::from_millis(u64::from(grace_ms)));
        self.restart.restart_device()
    }

    fn backoff(&self) {
        std::thread::sleep(Duration::from_millis(u64::from(self.config.io_retry_backoff_ms)));
    }
}

/// Spawn the control loop on a dedicated worker thread.
///
/// The agent is built by `build` on the worker itself, so the slot
/// store's platform handles never cross threads.
pub fn spawn<F, L, S, E, R>(stack_size: usize, build: F) -> std::io::Result<std::thread::JoinHandle<()>>
where
    F: FnOnce() -> UpdateAgent<L, S, E, R> + Send + 'static,
    L: StreamListener,
    S: SlotStore,
    E: EventSink,
    R: RestartPort,
{
    std::thread::Builder::new()
        .name("ota-net".into())
        .stack_size(stack_size)
        .spawn(move || build().run())
}
