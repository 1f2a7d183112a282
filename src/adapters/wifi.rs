//! WiFi station-mode link adapter.
//!
//! Drives the station interface and publishes reachability into the
//! shared [`ConnectivitySignal`], which gates the command channel.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Reconnection policy
//!
//! On link loss the adapter waits an exponential backoff (2 s → 4 s →
//! 8 s … capped at 60 s) between reconnect attempts. The driver accepts a
//! connect request before association completes, so an attempt that has
//! not brought the interface up within the connect timeout (15 s by
//! default) is abandoned and counts as a failed attempt.

use core::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::connectivity::ConnectivitySignal;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl core::error::Error for WifiError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    /// Association requested at `since`, waiting for the interface to come up.
    Connecting { since: Instant },
    Up,
    Reconnecting { attempt: u32 },
}

const INITIAL_BACKOFF_SECS: u32 = 2;
const MAX_BACKOFF_SECS: u32 = 60;
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

fn validate_ssid(ssid: &str) -> Result<(), WifiError> {
    if ssid.is_empty() || ssid.len() > 32 || !ssid.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        return Err(WifiError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), WifiError> {
    if !password.is_empty() && !(8..=64).contains(&password.len()) {
        return Err(WifiError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi link
// ───────────────────────────────────────────────────────────────

pub struct WifiLink {
    signal: Arc<ConnectivitySignal>,
    state: LinkState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_secs: u32,
    connect_timeout: Duration,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim_up: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_failed_connects: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_link_held_down: bool,
}

impl WifiLink {
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        signal: Arc<ConnectivitySignal>,
    ) -> Result<Self, esp_idf_svc::sys::EspError> {
        let wifi = EspWifi::new(modem, sysloop, Some(nvs))?;
        Ok(Self {
            signal,
            state: LinkState::Down,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: INITIAL_BACKOFF_SECS,
            connect_timeout: CONNECT_TIMEOUT,
            wifi,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(signal: Arc<ConnectivitySignal>) -> Self {
        Self {
            signal,
            state: LinkState::Down,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: INITIAL_BACKOFF_SECS,
            connect_timeout: CONNECT_TIMEOUT,
            sim_up: false,
            sim_failed_connects: 0,
            sim_link_held_down: false,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn backoff_secs(&self) -> u32 {
        self.backoff_secs
    }

    /// How long an accepted connect request may take to bring the link up.
    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }

    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), WifiError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|()| WifiError::InvalidSsid)?;
        self.password.clear();
        self.password.push_str(password).map_err(|()| WifiError::InvalidPassword)?;
        info!("WiFi: credentials set (SSID='{}')", self.ssid);
        Ok(())
    }

    /// Start associating with the configured access point.
    pub fn connect(&mut self) -> Result<(), WifiError> {
        if self.ssid.is_empty() {
            return Err(WifiError::NoCredentials);
        }
        info!("WiFi: connecting to '{}'", self.ssid);
        match self.platform_connect() {
            Ok(()) => {
                self.state = LinkState::Connecting { since: Instant::now() };
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connect failed: {}", e);
                self.state = LinkState::Reconnecting { attempt: 0 };
                Err(e)
            }
        }
    }

    /// Advance the link state machine and publish reachability.
    pub fn poll(&mut self) {
        match self.state {
            LinkState::Down => {}
            LinkState::Connecting { since } => {
                if self.platform_link_up() {
                    self.state = LinkState::Up;
                    self.backoff_secs = INITIAL_BACKOFF_SECS;
                    info!("WiFi: link up");
                    self.signal.set_reachable(true);
                } else if since.elapsed() >= self.connect_timeout {
                    warn!("WiFi: no link after {:?}, giving up on this attempt", self.connect_timeout);
                    self.platform_disconnect();
                    self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
                    self.state = LinkState::Reconnecting { attempt: 0 };
                }
            }
            LinkState::Up => {
                if !self.platform_link_up() {
                    warn!("WiFi: connection lost, entering reconnect");
                    self.signal.set_reachable(false);
                    self.state = LinkState::Reconnecting { attempt: 0 };
                }
            }
            LinkState::Reconnecting { attempt } => {
                info!("WiFi: reconnect attempt {} (backoff {}s)", attempt, self.backoff_secs);
                match self.platform_connect() {
                    Ok(()) => self.state = LinkState::Connecting { since: Instant::now() },
                    Err(_) => {
                        self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
                        self.state = LinkState::Reconnecting { attempt: attempt + 1 };
                    }
                }
            }
        }
    }

    /// How long to wait before the next [`poll`](Self::poll).
    pub fn poll_interval(&self) -> Duration {
        match self.state {
            LinkState::Reconnecting { .. } => Duration::from_secs(u64::from(self.backoff_secs)),
            _ => POLL_INTERVAL,
        }
    }

    /// Supervise the link forever on the calling thread.
    pub fn monitor(mut self) -> ! {
        loop {
            self.poll();
            std::thread::sleep(self.poll_interval());
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.as_str().try_into().map_err(|_| WifiError::InvalidSsid)?,
            password: self.password.as_str().try_into().map_err(|_| WifiError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });
        self.wifi.set_configuration(&config).map_err(|e| {
            error!("WiFi: set_configuration: {}", e);
            WifiError::ConnectionFailed
        })?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|e| {
                error!("WiFi: start: {}", e);
                WifiError::ConnectionFailed
            })?;
        }
        self.wifi.connect().map_err(|e| {
            warn!("WiFi: connect: {}", e);
            WifiError::ConnectionFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        if self.sim_failed_connects > 0 {
            self.sim_failed_connects -= 1;
            warn!("WiFi(sim): simulated association failure");
            return Err(WifiError::ConnectionFailed);
        }
        self.sim_up = !self.sim_link_held_down;
        info!("WiFi(sim): associated with '{}'", self.ssid);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim_up = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_link_up(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.sta_netif().is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_link_up(&self) -> bool {
        self.sim_up
    }

    // ── Simulation knobs ──────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self) {
        self.sim_up = false;
    }

    /// Accept connect requests but keep the interface down, like an
    /// access point that never completes association.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_hold_link_down(&mut self, held: bool) {
        self.sim_link_held_down = held;
    }

    /// Make the next `n` association attempts fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_connects(&mut self, n: u32) {
        self.sim_failed_connects = n;
    }
}
