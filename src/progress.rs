//! Terminal progress reporting

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use qflasher_core::progress::FlashProgress;
use std::time::Duration;

/// Progress reporter using indicatif
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
    name: String,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
            name: String::new(),
        }
    }

    fn create_bar(&mut self, total: u64, template: &str) {
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(self.name.clone());
        self.current_bar = Some(pb);
    }

    fn create_spinner(&mut self, message: String) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
    }

    fn finish(&mut self, success: bool) {
        if let Some(pb) = self.current_bar.take() {
            let status = if success { "done" } else { "FAILED" };
            pb.finish_with_message(format!("{} {}", self.name, status));
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashProgress for IndicatifProgress {
    fn image_started(&mut self, name: &str) {
        self.finish(true);
        self.name = name.to_string();
        self.create_spinner(format!("Sending {}...", name));
    }

    fn image_progress(&mut self, percent: u32) {
        if self.current_bar.as_ref().is_some_and(|pb| pb.length().is_none()) {
            if let Some(pb) = self.current_bar.take() {
                pb.finish_and_clear();
            }
            self.create_bar(
                100,
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
            );
        }
        if let Some(pb) = &self.current_bar {
            pb.set_position(u64::from(percent.min(100)));
        }
    }

    fn image_finished(&mut self, success: bool) {
        self.finish(success);
    }

    fn transfer_started(&mut self, name: &str, total_bytes: u64) {
        self.finish(true);
        self.name = name.to_string();
        self.create_bar(
            total_bytes,
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
        );
    }

    fn transfer_progress(&mut self, bytes_sent: u64) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(bytes_sent);
        }
    }

    fn transfer_finished(&mut self, success: bool) {
        self.finish(success);
    }
}
