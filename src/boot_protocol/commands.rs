//! Wire grammar understood by the bootloader's shell.
//!
//! Every command starts with two backspaces, which wipe whatever partial input
//! the shell may be holding, and ends with a newline. The bytes sent here must
//! match the bootloader exactly.

use std::io;

use log::debug;

use crate::transport::Transport;

/// Erases pending shell input before a command.
pub const CONTROL_PREFIX: &[u8] = b"\x08\x08";

/// Shell command that makes the bootloader receive a kernel over the UART.
pub const LOAD_COMMAND: &str = "lkr_uart";

/// Shell command that resets the device through its watchdog.
pub const REBOOT_COMMAND: &str = "reboot";

/// `\b\blkr_uart\n`
pub fn load_command() -> Vec<u8> {
    command(LOAD_COMMAND)
}

/// `\b\breboot\n`
pub fn reboot_command() -> Vec<u8> {
    command(REBOOT_COMMAND)
}

/// The image size as the bootloader reads it: plain decimal, newline
/// terminated.
pub fn size_line(size: usize) -> Vec<u8> {
    format!("{}\n", size).into_bytes()
}

/// Text the bootloader prints once it accepted a size and waits for the
/// payload.
pub fn ack_pattern(size: usize) -> String {
    format!("Receiving {} bytes...", size)
}

/// Send the load command followed by the image size and flush them out.
pub fn declare_size(transport: &mut dyn Transport, size: usize) -> io::Result<()> {
    debug!("declaring image size {}", size);
    transport.write_all(&load_command())?;
    transport.write_all(&size_line(size))?;
    transport.flush()
}

/// Send the reboot command and flush it out.
pub fn request_reboot(transport: &mut dyn Transport) -> io::Result<()> {
    debug!("requesting a reboot");
    transport.write_all(&reboot_command())?;
    transport.flush()
}

fn command(name: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(CONTROL_PREFIX.len() + name.len() + 1);
    bytes.extend_from_slice(CONTROL_PREFIX);
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(b'\n');
    bytes
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[test]
    fn commands_match_the_bootloader_grammar() {
        assert_eq!(load_command(), b"\x08\x08lkr_uart\n");
        assert_eq!(reboot_command(), b"\x08\x08reboot\n");
        assert_eq!(ack_pattern(1024), "Receiving 1024 bytes...");
    }

    #[test]
    fn size_line_parses_back() {
        for &size in &[0, 1, 9, 10, 99, 100, 1024, 65_535, 8_388_608, usize::MAX] {
            let line = size_line(size);
            let text = std::str::from_utf8(&line).unwrap();
            assert!(text.ends_with('\n'));
            let digits = text.trim_end_matches('\n');
            assert!(digits.bytes().all(|b| b.is_ascii_digit()), "{:?}", digits);
            assert!(size == 0 || !digits.starts_with('0'), "{:?}", digits);
            assert_eq!(digits.parse::<usize>().unwrap(), size);
        }
    }

    #[test]
    fn declare_size_writes_then_flushes() {
        let mut transport = MockTransport::default();
        declare_size(&mut transport, 4096).unwrap();
        assert_eq!(transport.written(), b"\x08\x08lkr_uart\n4096\n");
        assert_eq!(transport.flushes, 1);
        assert_eq!(transport.reads, 0);
    }

    #[test]
    fn request_reboot_writes_then_flushes() {
        let mut transport = MockTransport::default();
        request_reboot(&mut transport).unwrap();
        assert_eq!(transport.written(), b"\x08\x08reboot\n");
        assert_eq!(transport.flushes, 1);
    }
}
