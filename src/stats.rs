/*!
 * Per-run delivery statistics
 */

use std::time::{Duration, Instant};
use tracing::info;

/// Counters for one delivery run
#[derive(Debug, Clone)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub empty_polls: u64,
    pub retries: u64,
    pub page_flips: u64,
    pub fetches: u64,
    started: Instant,
}

impl DeliveryStats {
    pub fn new() -> Self {
        Self {
            delivered: 0,
            empty_polls: 0,
            retries: 0,
            page_flips: 0,
            fetches: 0,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Delivered events per second over the whole run
    pub fn events_per_sec(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.delivered as f64 / secs
        } else {
            0.0
        }
    }

    /// Log the summary line written when the loop exits
    pub fn log_summary(&self, reason: &str) {
        info!(
            reason,
            delivered = self.delivered,
            empty_polls = self.empty_polls,
            retries = self.retries,
            page_flips = self.page_flips,
            fetches = self.fetches,
            elapsed = %format_duration(self.elapsed().as_millis() as u64),
            rate = %format!("{:.1}/s", self.events_per_sec()),
            "Delivery finished"
        );
    }
}

impl Default for DeliveryStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Format duration into human-readable format
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        return format!("{}ms", ms);
    }

    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
