//! Network reachability flag shared between the connectivity provider
//! and the control-loop worker.
//!
//! ```text
//! ┌──────────────────┐  set_reachable  ┌────────────────────┐
//! │ WiFi event / poll│───────────────▶│ ConnectivitySignal │
//! │ (own context)    │                 │ AtomicBool + Signal│
//! └──────────────────┘                 └─────────┬──────────┘
//!                                                │ wait_until_reachable
//!                                                ▼
//!                                       ┌────────────────────┐
//!                                       │ Control-loop worker│
//!                                       └────────────────────┘
//! ```
//!
//! Single writer, any number of readers. Only one thread may block in
//! [`ConnectivitySignal::wait_until_reachable`] at a time.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

pub struct ConnectivitySignal {
    reachable: AtomicBool,
    changed: Signal<CriticalSectionRawMutex, ()>,
}

impl ConnectivitySignal {
    pub const fn new() -> Self {
        Self {
            reachable: AtomicBool::new(false),
            changed: Signal::new(),
        }
    }

    /// Called by the connectivity provider on every link state change.
    pub fn set_reachable(&self, reachable: bool) {
        let previous = self.reachable.swap(reachable, Ordering::AcqRel);
        if previous != reachable {
            log::info!("NET: link {}", if reachable { "up" } else { "down" });
        }
        self.changed.signal(());
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    /// Block the calling thread until the link is reachable.
    ///
    /// Returns immediately if it already is. A change raised between the
    /// check and the wait stays latched in the signal, so it is not lost.
    pub fn wait_until_reachable(&self) {
        while !self.is_reachable() {
            futures_lite::future::block_on(self.changed.wait());
        }
    }
}

impl Default for ConnectivitySignal {
    fn default() -> Self {
        Self::new()
    }
}
