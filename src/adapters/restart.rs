//! Restart adapter: soft-reset the chip (device) or end the process (host).

use log::info;

use crate::app::ports::RestartPort;

#[derive(Default)]
pub struct SystemRestart;

impl SystemRestart {
    pub fn new() -> Self {
        Self
    }
}

impl RestartPort for SystemRestart {
    #[cfg(target_os = "espidf")]
    fn restart_device(&mut self) -> ! {
        info!("SYS: restarting");
        esp_ota::restart();
    }

    /// No hardware to reset; the process exits so a supervisor can
    /// relaunch it, the same way the chip comes back from the boot slot.
    #[cfg(not(target_os = "espidf"))]
    fn restart_device(&mut self) -> ! {
        info!("SYS(sim): restart requested, exiting");
        std::process::exit(0);
    }
}
