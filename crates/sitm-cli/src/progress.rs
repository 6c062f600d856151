//! Progress bars for transfer operations.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use sitm_transfer::ProgressSink;
use std::time::Duration;

/// Hands out progress bars, or hidden ones when output is disabled
pub struct ProgressManager {
    multi: MultiProgress,
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            enabled,
        }
    }

    /// Bar driven by completion percentages
    pub fn create_percent_bar(&self, label: &str) -> PercentBar {
        if !self.enabled {
            return PercentBar(ProgressBar::hidden());
        }

        let pb = self.multi.add(ProgressBar::new(100));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_message(label.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        PercentBar(pb)
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new(true)
    }
}

/// A bar that accepts percentages from the transfer library
pub struct PercentBar(ProgressBar);

impl PercentBar {
    pub fn finish(&self) {
        self.0.finish_and_clear();
    }

    pub fn abandon(&self) {
        self.0.abandon();
    }
}

impl ProgressSink for PercentBar {
    fn report(&self, percent: f64) {
        self.0.set_position(percent.clamp(0.0, 100.0).round() as u64);
    }
}

/// Helper to format bytes for display
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
