//! The byte-stream endpoint used to talk to the bootloader.
//!
//! The boot protocol only needs three capabilities from the link: writing
//! bytes, flushing them out, and reading one line bounded by the link's read
//! timeout. They are captured by the [`Transport`] trait so the protocol can
//! be driven by a real serial port or by a scripted one in tests.

#[macro_use]
mod macros;

mod serial;

#[cfg(test)]
pub(crate) mod mock;

use std::io;

pub use serial::{open_and_setup_port, SerialTransport};

/// Capabilities the boot protocol requires from the link to the device.
pub trait Transport {
    /// Write all of `bytes`, blocking until the link accepts them.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Push out anything buffered on the way to the device.
    fn flush(&mut self) -> io::Result<()>;

    /// Read one line, terminator included.
    ///
    /// An empty result means the read timeout elapsed without any data. A
    /// line cut short by the timeout is returned as is, without terminator.
    fn read_line(&mut self) -> io::Result<Vec<u8>>;
}
