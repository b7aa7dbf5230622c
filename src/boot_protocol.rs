//! `lkrsend` image transfer protocol.
//!
//! **Example** - Pushing an image over an already open transport:
//! ```no_run
//! use lkrsend::{self as ls, boot_protocol as bp, ConsoleMonitor, ImagePayload};
//!
//! let settings = ls::SettingsBuilder::new()
//!     .path("/dev/ttyUSB0")
//!     .kernel_image("kernel8.img")
//!     .finalize();
//! let port = ls::open_and_setup_port(&settings)?;
//! let mut transport = ls::SerialTransport::new(port);
//! let payload = ImagePayload::load("kernel8.img")?;
//!
//! let engine = bp::factory(&settings);
//! let transfer = engine.run_transfer(&mut transport, &payload, &mut ConsoleMonitor::new())?;
//! println!("{} bytes sent", transfer.bytes_sent);
//! # Ok::<(), ls::Error>(())
//! ```

pub mod commands;

mod events;
mod scanner;
mod state_machine;
mod states;

pub use scanner::{scan_until, HandshakeOutcome, ResponseLine};
pub use state_machine::{declare_and_handshake, factory, HandshakeEngine, Transfer};
