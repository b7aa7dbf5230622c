//! Serial port backed [`Transport`](super::Transport).

use std::fmt;
use std::io::{self, prelude::*, BufReader};

use log::{debug, info, trace};
use serialport::{ClearBuffer, SerialPort};

use super::Transport;
use crate::Settings;

//==============================================================================
// Public Interface
//==============================================================================

/// Open the serial port described by `settings` and configure it for the
/// bootloader.
///
/// The port is opened exactly once. Failing to open it is fatal for the
/// transfer, there is no waiting for the device to show up.
pub fn open_and_setup_port(settings: &Settings) -> Result<Box<dyn SerialPort>, serialport::Error> {
    debug!("Opening {}", settings.path);
    let port = serialport::new(&settings.path, settings.baud_rate)
        .data_bits(settings.data_bits)
        .stop_bits(settings.stop_bits)
        .parity(settings.parity)
        .flow_control(settings.flow_control)
        .timeout(settings.read_timeout)
        .open()?;

    let baud_rate = port.baud_rate()?;
    if baud_rate != settings.baud_rate {
        // Some drivers silently fall back to another rate when the requested
        // one is not supported.
        return Err(serialport::Error::new(
            serialport::ErrorKind::InvalidInput,
            format!(
                "baud rate {} was not accepted by the port (got {})",
                settings.baud_rate, baud_rate
            ),
        ));
    }

    info!(
        "Connected to {} at {} baud",
        port.name().unwrap_or_else(|| settings.path.clone()),
        baud_rate
    );
    debug!("data_bits    : {:#?}", port.data_bits()?);
    debug!("stop_bits    : {:#?}", port.stop_bits()?);
    debug!("parity       : {:#?}", port.parity()?);
    debug!("flow control : {:#?}", port.flow_control()?);
    debug!("read timeout : {:?}", port.timeout());

    // Drop whatever the device printed before we got here, it must not be
    // taken for an answer to our commands.
    port.clear(ClearBuffer::All)?;

    Ok(port)
}

/// A [`Transport`] over an open serial port.
///
/// Reads are line buffered on top of the byte oriented port. The port's own
/// read timeout bounds every line read.
pub struct SerialTransport {
    reader: BufReader<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        SerialTransport {
            reader: BufReader::new(port),
        }
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        trace!("{} bytes to serial port", bytes.len());
        self.reader.get_mut().write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.reader.get_mut().flush()
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(_) => {}
            // The bytes received before the timeout stay in `line`.
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e),
        }
        trace!("{} bytes read from serial port", line.len());
        Ok(line)
    }
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = self.reader.get_ref();
        debug_fmt_serialport!(port, f).finish()
    }
}
