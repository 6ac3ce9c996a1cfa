//! Progress reporting for long-running maintenance actions
//!
//! Provides a spinner line for scrub/balance percentages and the walker's
//! current directory, plus the styled per-action headers.

use crate::supervisor::Progress;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Placeholder shown when a job's progress could not be queried
pub const UNKNOWN_PROGRESS: &str = "???";

/// Spinner line showing the status of the running action
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a spinner drawn on stderr
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A reporter that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Current status message
    pub fn status(&self) -> String {
        self.bar.message()
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Render one progress figure: `12.3%: [0 error(s)]`
pub fn format_progress(progress: Option<Progress>) -> String {
    match progress {
        Some(p) => format!("{:.1}%: [{} error(s)]", p.percent(), format_number(p.errors)),
        None => format!("{UNKNOWN_PROGRESS}%"),
    }
}

/// Render `[devid]: 12.3%: [0 error(s)]` for each device
pub fn format_device_progress<I>(devices: I) -> String
where
    I: IntoIterator<Item = (u64, Option<Progress>)>,
{
    devices
        .into_iter()
        .map(|(devid, progress)| format!("[{devid}]: {}", format_progress(progress)))
        .collect::<Vec<_>>()
        .join("  ")
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Human readable byte count
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, BINARY)
}

/// Print the header shown before an action starts on a mountpoint
pub fn print_header(action: &str, mountpoint: &Path) {
    println!(
        "{} {}:",
        style(action).cyan().bold(),
        style(mountpoint.display()).bold()
    );
}

/// Print the version banner
pub fn print_version() {
    println!(
        "{} version {}",
        style(env!("CARGO_PKG_NAME")).cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("License: GNU GPL version 3");
}
