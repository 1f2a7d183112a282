//! OTA agent: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  TcpTransport      FlashSlotAdapter   LogEventSink             │
//! │  (StreamListener)  (SlotStore)        (EventSink)              │
//! │  WifiLink          SystemRestart                               │
//! │  (connectivity)    (RestartPort)                               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          UpdateAgent (worker thread "ota-net")         │    │
//! │  │  CommandEngine · OtaManager                            │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Main thread: WiFi link supervision                            │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use ota_agent::adapters::flash_slots::FlashSlotAdapter;
use ota_agent::adapters::log_sink::LogEventSink;
use ota_agent::adapters::restart::SystemRestart;
use ota_agent::adapters::tcp_transport::TcpTransport;
use ota_agent::adapters::wifi::WifiLink;
use ota_agent::app::service::{self, UpdateAgent};
use ota_agent::config::AgentConfig;
use ota_agent::connectivity::ConnectivitySignal;

/// Worker stack: the request buffer is heap-allocated, the rest is small.
const AGENT_STACK_SIZE: usize = 32 * 1024;

// Build-time station credentials.
const WIFI_SSID: &str = match option_env!("OTA_WIFI_SSID") {
    Some(ssid) => ssid,
    None => "ota-agent",
};
const WIFI_PASSWORD: &str = match option_env!("OTA_WIFI_PASSWORD") {
    Some(password) => password,
    None => "",
};

fn banner() {
    info!("╔══════════════════════════════════════╗");
    info!("║  OTA agent v{:<25}║", ota_agent::FIRMWARE_VERSION);
    info!("╚══════════════════════════════════════╝");
}

// ── Device ────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn main() -> Result<()> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    banner();

    let config = AgentConfig::default();
    config.validate().map_err(ota_agent::Error::from)?;

    let connectivity = Arc::new(ConnectivitySignal::new());

    let peripherals = Peripherals::take().map_err(|_| ota_agent::Error::Init("peripherals already taken"))?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let mut link = WifiLink::new(peripherals.modem, sysloop, nvs, Arc::clone(&connectivity))?;
    link.set_credentials(WIFI_SSID, WIFI_PASSWORD)?;
    if let Err(e) = link.connect() {
        warn!("WiFi: initial connect failed ({}), retrying in background", e);
    }

    service::spawn(AGENT_STACK_SIZE, move || {
        UpdateAgent::new(
            config,
            connectivity,
            TcpTransport::new(),
            FlashSlotAdapter::new(),
            LogEventSink::new(),
            SystemRestart::new(),
        )
    })
    .context("spawning ota-net worker")?;

    link.monitor()
}

// ── Host simulation ───────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    banner();

    let config = load_config()?;
    let connectivity = Arc::new(ConnectivitySignal::new());

    let mut link = WifiLink::new(Arc::clone(&connectivity));
    link.set_credentials(WIFI_SSID, WIFI_PASSWORD)?;
    if let Err(e) = link.connect() {
        warn!("WiFi: initial connect failed ({}), retrying in background", e);
    }

    service::spawn(AGENT_STACK_SIZE, move || {
        UpdateAgent::new(
            config,
            connectivity,
            TcpTransport::new(),
            FlashSlotAdapter::new(),
            LogEventSink::new(),
            SystemRestart::new(),
        )
    })
    .context("spawning ota-net worker")?;

    link.monitor()
}

/// Defaults, or the JSON document named by `OTA_AGENT_CONFIG`.
#[cfg(not(target_os = "espidf"))]
fn load_config() -> Result<AgentConfig> {
    let Ok(path) = std::env::var("OTA_AGENT_CONFIG") else {
        return Ok(AgentConfig::default());
    };
    let config = AgentConfig::load(&path)
        .map_err(ota_agent::Error::from)
        .with_context(|| format!("loading config from {}", path))?;
    info!("Config loaded from {}", path);
    Ok(config)
}
