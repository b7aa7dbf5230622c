//! Reading the bootloader's responses line by line.

use std::io;

use log::trace;

use crate::monitor::Monitor;
use crate::transport::Transport;

// =============================================================================
// Public Interface
// =============================================================================

/// A single line received from the device.
///
/// The raw bytes are decoded once; matching and display both work on the
/// decoded text, never on a representation of the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    raw: Vec<u8>,
    text: String,
}

impl ResponseLine {
    /// Decode `raw` as UTF-8, replacing invalid sequences, and trim the line
    /// terminator.
    pub fn decode(raw: Vec<u8>) -> Self {
        let text = String::from_utf8_lossy(&raw)
            .trim_end_matches(&['\r', '\n'][..])
            .to_owned();
        ResponseLine { raw, text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The bytes as they came off the wire.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Byte offset of `pattern` in the decoded text.
    pub fn find(&self, pattern: &str) -> Option<usize> {
        self.text.find(pattern)
    }
}

/// Result of waiting for the bootloader's acknowledgement.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// A line contained the expected text, at this offset of the line.
    Acknowledged(usize),
    /// A read timed out before any line contained the expected text.
    TimedOut,
}

impl HandshakeOutcome {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, HandshakeOutcome::Acknowledged(_))
    }
}

/// Read lines until one contains `target` or until a read comes back empty.
///
/// Every non-empty line is handed to `monitor` before it is tested. Without a
/// `target` this drains the device output up to the first timeout and always
/// returns [`HandshakeOutcome::TimedOut`].
///
/// The timeout applies to each read separately; a device that keeps talking
/// keeps the scan going.
pub fn scan_until(
    transport: &mut dyn Transport,
    target: Option<&str>,
    monitor: &mut dyn Monitor,
) -> io::Result<HandshakeOutcome> {
    loop {
        let raw = transport.read_line()?;
        if raw.is_empty() {
            trace!("read timed out");
            return Ok(HandshakeOutcome::TimedOut);
        }

        let line = ResponseLine::decode(raw);
        trace!("<- {:?}", line.text());
        monitor.response(&line);

        if let Some(offset) = target.and_then(|t| line.find(t)) {
            return Ok(HandshakeOutcome::Acknowledged(offset));
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::RecordingMonitor;
    use crate::transport::mock::MockTransport;

    #[test]
    fn decode_trims_terminators() {
        let line = ResponseLine::decode(b"Image size=\r\n".to_vec());
        assert_eq!(line.text(), "Image size=");
        assert_eq!(line.raw(), b"Image size=\r\n");
    }

    #[test]
    fn decode_tolerates_invalid_utf8() {
        let line = ResponseLine::decode(b"\xffReceiving 8 bytes...\n".to_vec());
        assert_eq!(line.text(), "\u{fffd}Receiving 8 bytes...");
        assert_eq!(line.find("Receiving 8 bytes..."), Some(3));
    }

    #[test]
    fn stops_at_the_matching_line() {
        let mut transport = MockTransport::with_script(vec![
            "rpi3-baremetal-lab2-bootloader$ lkr_uart\r\n",
            "Image size=1024\r\n",
            "  Receiving 1024 bytes...\n",
            "never read\n",
        ]);
        let mut monitor = RecordingMonitor::default();

        let outcome =
            scan_until(&mut transport, Some("Receiving 1024 bytes..."), &mut monitor).unwrap();

        assert_eq!(outcome, HandshakeOutcome::Acknowledged(2));
        assert_eq!(transport.reads, 3);
        assert_eq!(transport.remaining(), 1);
        assert_eq!(
            monitor.responses(),
            vec![
                "rpi3-baremetal-lab2-bootloader$ lkr_uart",
                "Image size=1024",
                "  Receiving 1024 bytes...",
            ]
        );
    }

    #[test]
    fn times_out_after_the_given_lines() {
        let mut transport = MockTransport::with_script(vec![
            "Image size=\r\n",
            "Receiving 102 bytes...\n",
            "",
            "after the timeout\n",
        ]);
        let mut monitor = RecordingMonitor::default();

        let outcome =
            scan_until(&mut transport, Some("Receiving 1024 bytes..."), &mut monitor).unwrap();

        assert_eq!(outcome, HandshakeOutcome::TimedOut);
        assert!(!outcome.is_acknowledged());
        assert_eq!(transport.reads, 3);
        assert_eq!(monitor.responses().len(), 2);
    }

    #[test]
    fn drain_surfaces_everything_until_timeout() {
        let mut transport = MockTransport::with_script(vec![
            "1024 of bytes received from uart. \r\n",
            "Receiving 1024 bytes...\n",
        ]);
        let mut monitor = RecordingMonitor::default();

        let outcome = scan_until(&mut transport, None, &mut monitor).unwrap();

        assert_eq!(outcome, HandshakeOutcome::TimedOut);
        assert_eq!(transport.reads, 3);
        assert_eq!(monitor.responses().len(), 2);
    }

    #[test]
    fn partial_line_still_matches() {
        let mut transport = MockTransport::with_script(vec!["Receiving 7 bytes..."]);
        let mut monitor = RecordingMonitor::default();

        let outcome = scan_until(&mut transport, Some("Receiving 7 bytes..."), &mut monitor);
        assert_eq!(outcome.unwrap(), HandshakeOutcome::Acknowledged(0));
    }
}
