use serde::{Deserialize, Serialize};

/// A single phase countdown in whole seconds.
///
/// `remaining_secs` never exceeds `configured_secs`, and the timer is never
/// running at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTimer {
    remaining_secs: u64,
    configured_secs: u64,
    running: bool,
}

impl RoundTimer {
    /// A stopped countdown with its full duration left.
    pub fn armed(secs: u64) -> Self {
        Self {
            remaining_secs: secs,
            configured_secs: secs,
            running: false,
        }
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn configured_secs(&self) -> u64 {
        self.configured_secs
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn rearm(&mut self, secs: u64) {
        *self = Self::armed(secs);
    }

    /// Returns false when there is nothing left to count.
    pub(crate) fn start(&mut self) -> bool {
        if self.running || self.remaining_secs == 0 {
            return false;
        }
        self.running = true;
        true
    }

    pub(crate) fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    /// Count one second down. Returns true when this call reached zero,
    /// in which case the timer is stopped.
    pub(crate) fn tick_down(&mut self) -> bool {
        if !self.running || self.remaining_secs == 0 {
            return false;
        }
        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            self.running = false;
            return true;
        }
        false
    }

    /// 0.0 .. 1.0 progress of this countdown.
    pub fn progress_fraction(&self) -> f64 {
        if self.configured_secs == 0 {
            return 1.0;
        }
        let elapsed = self.configured_secs.saturating_sub(self.remaining_secs) as f64;
        (elapsed / self.configured_secs as f64).clamp(0.0, 1.0)
    }
}

/// Render seconds as `mm:ss`. Minutes keep counting past 59.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
