//! Errors that can end an image transfer.
//!
//! Only a handshake timeout is ever recovered from, and only once, inside the
//! boot protocol state machine. Everything that reaches the caller is final.

use std::io;

use thiserror::Error;

/// The reasons an `lkrsend` invocation can fail.
#[derive(Debug, Error)]
pub enum Error {
    /// No kernel image path was configured.
    #[error("no kernel image was given")]
    MissingImage,

    /// The kernel image could not be read from disk.
    #[error("could not read `{path}`: {source}")]
    Image {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The kernel image is empty. The bootloader refuses a zero size and never
    /// acknowledges it.
    #[error("`{0}` is empty, the bootloader does not accept a zero image size")]
    EmptyImage(String),

    /// The bootloader did not acknowledge the size declaration, neither on the
    /// first attempt nor after the reboot.
    #[error("handshake timeout after reboot retry")]
    HandshakeTimeout {
        /// The image size that was declared on both attempts.
        size: usize,
    },

    /// The serial port could not be opened or configured.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Writing to or reading from the transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

impl Error {
    /// Process exit status for this error: `1` for bad arguments or an
    /// unusable image, `2` for a failed handshake, `3` for transport errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MissingImage | Error::Image { .. } | Error::EmptyImage(_) => 1,
            Error::HandshakeTimeout { .. } => 2,
            Error::Serial(_) | Error::Transport(_) => 3,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn exit_codes() {
    assert_eq!(Error::MissingImage.exit_code(), 1);
    assert_eq!(Error::EmptyImage("kernel8.img".into()).exit_code(), 1);
    assert_eq!(Error::HandshakeTimeout { size: 12 }.exit_code(), 2);
    let broken = io::Error::new(io::ErrorKind::BrokenPipe, "device gone");
    assert_eq!(Error::from(broken).exit_code(), 3);
}

#[test]
fn handshake_timeout_message() {
    let error = Error::HandshakeTimeout { size: 1024 };
    assert_eq!(error.to_string(), "handshake timeout after reboot retry");
}
