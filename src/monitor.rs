//! Surfacing of the transfer progress and of the device responses.
//!
//! The boot protocol state machine never prints anything itself. It reports
//! to a [`Monitor`], which decides how (and whether) to present it.

use std::time::Duration;

use console::style;
use hexplay::HexViewBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use log::{log_enabled, Level::Debug};

use crate::boot_protocol::ResponseLine;

/// Observer of an image transfer.
///
/// Only [`response`](Monitor::response) is mandatory, all other notifications
/// default to doing nothing.
pub trait Monitor {
    /// A non-empty line was received from the device.
    fn response(&mut self, line: &ResponseLine);

    /// The image size was declared to the bootloader.
    fn declared(&mut self, _size: usize) {}

    /// The `reboot` command was sent, waiting `delay` before retrying.
    fn rebooting(&mut self, _delay: Duration) {}

    /// The settle delay is over.
    fn settled(&mut self) {}

    /// The payload is about to be written.
    fn sending(&mut self, _size: usize) {}

    /// The payload was written and flushed.
    fn payload_sent(&mut self, _size: usize) {}
}

/// [`Monitor`] printing to the terminal.
#[derive(Default)]
pub struct ConsoleMonitor {
    spinner: Option<ProgressBar>,
}

impl ConsoleMonitor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Monitor for ConsoleMonitor {
    fn response(&mut self, line: &ResponseLine) {
        println!("[BL] 📟 Response from device: {}", style(line.text()).cyan());

        // Dump the raw line in a hex table for debugging
        if log_enabled!(Debug) {
            let view = HexViewBuilder::new(line.raw())
                .address_offset(0)
                .row_width(16)
                .finish();
            println!("{}", view);
        }
    }

    fn declared(&mut self, size: usize) {
        println!("[BL] 📏 Declared image size {}", style(size).green());
    }

    fn rebooting(&mut self, delay: Duration) {
        println!("{}", style("[BL] 🙁 No answer from the bootloader").yellow());

        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(120);
        pb.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])
                .template("[BL] {spinner:.blue} {msg}"),
        );
        pb.set_message(format!(
            "🔁 Rebooting the device, retrying in {}s...",
            style(delay.as_secs_f32()).dim()
        ));
        self.spinner = Some(pb);
    }

    fn settled(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_with_message("🔁 Retrying the handshake");
        }
    }

    fn sending(&mut self, _size: usize) {
        println!("[BL] ⏩ File transmitting...");
    }

    fn payload_sent(&mut self, _size: usize) {
        println!("[BL] ⏩ File transmitted.");
    }
}

// =============================================================================
// Test support
// =============================================================================

/// Everything a [`RecordingMonitor`] was told, in order.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Note {
    Response(String),
    Declared(usize),
    Rebooting(Duration),
    Settled,
    Sending(usize),
    PayloadSent(usize),
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingMonitor {
    pub notes: Vec<Note>,
}

#[cfg(test)]
impl RecordingMonitor {
    pub fn responses(&self) -> Vec<&str> {
        self.notes
            .iter()
            .filter_map(|n| match n {
                Note::Response(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
impl Monitor for RecordingMonitor {
    fn response(&mut self, line: &ResponseLine) {
        self.notes.push(Note::Response(line.text().to_owned()));
    }

    fn declared(&mut self, size: usize) {
        self.notes.push(Note::Declared(size));
    }

    fn rebooting(&mut self, delay: Duration) {
        self.notes.push(Note::Rebooting(delay));
    }

    fn settled(&mut self) {
        self.notes.push(Note::Settled);
    }

    fn sending(&mut self, size: usize) {
        self.notes.push(Note::Sending(size));
    }

    fn payload_sent(&mut self, size: usize) {
        self.notes.push(Note::PayloadSent(size));
    }
}
