//! Enable/disable controller.
//!
//! Availability is `hardware_ready && !device_idle`. Only real transitions
//! of that value are announced. A shut-down scheduler is never available
//! and announces nothing further.

use tracing::{debug, info};

use super::RangingScheduler;
use crate::domain::{FailureKind, RttState};

impl RangingScheduler {
    pub fn is_available(&self) -> bool {
        !self.shut_down && self.hardware_ready && !self.device_idle
    }

    pub fn set_hardware_available(&mut self, ready: bool) {
        let was_available = self.is_available();
        self.hardware_ready = ready;
        self.on_availability_changed(was_available);
    }

    pub fn set_device_idle(&mut self, idle: bool) {
        let was_available = self.is_available();
        self.device_idle = idle;
        self.on_availability_changed(was_available);
    }

    fn on_availability_changed(&mut self, was_available: bool) {
        let available = self.is_available();
        if available == was_available {
            debug!(
                hardware_ready = self.hardware_ready,
                device_idle = self.device_idle,
                "[rtt] availability unchanged"
            );
            return;
        }

        if available {
            info!("[rtt] ranging enabled");
            self.ports.announcer.announce(RttState::Enabled);
            self.schedule_next();
            return;
        }

        info!(
            hardware_ready = self.hardware_ready,
            device_idle = self.device_idle,
            queued = self.queue.len(),
            "[rtt] ranging disabled"
        );
        self.ports.announcer.announce(RttState::Disabled);
        self.fail_all(FailureKind::ResourceUnavailable);
    }
}
