//! `lkrsend` pushes a kernel image to a UART bootloader over a serial
//! connection, for rapid iteration on bare-metal kernels without swapping SD
//! cards.
//!
//! The bootloader on the other side runs a small shell. `lkrsend` types the
//! `lkr_uart` command into it, declares the image size in decimal, and waits
//! for the bootloader to confirm with `Receiving <size> bytes...` before
//! pushing the raw image. When the confirmation does not come, the device is
//! told to `reboot`, given time to come back, and the handshake is tried once
//! more.
//!
//! The transfer is implemented as a state machine. State machines are
//! implemented in terms of **states** and **transitions** between them with
//! the following characteristics:
//!
//! * Can only be in one state at any time.
//! * Each state can have its own associated data if needed.
//! * It is possible to have some shared data between **all** states.
//! * Transitions between states are triggered via typed **events** and follow
//!   defined semantics.
//! * Only explicitly defined transitions should be permitted and as many errors
//!   should be detected at **compile-time**.
//! * Transitioning from one state to another consumes the original state and
//!   renders it unusable. Any transition back to that state would create a new
//!   state.
//! * Data can be transferred from one state to the next by attaching it to the
//!   transition event. Such data is statically defined as part of the event
//!   type.
//!
//! The implementation of state transitions leverages `rust`'s `From` and `Into`
//! pattern. Only transitions for which the `From` trait is implemented are
//! authorized and any other transition would be detected at compile-time as an
//! error.

pub mod boot_protocol;
mod error;
mod image;
mod monitor;
pub mod session;
mod settings;
mod transport;

pub use boot_protocol::{HandshakeEngine, HandshakeOutcome, ResponseLine, Transfer};
pub use error::Error;
pub use image::{ImagePayload, PREVIEW_LEN};
pub use monitor::{ConsoleMonitor, Monitor};
pub use settings::{
    Settings, SettingsBuilder, DEFAULT_BAUD_RATE, DEFAULT_PORT, DEFAULT_READ_TIMEOUT,
    DEFAULT_SETTLE_DELAY,
};
pub use transport::{open_and_setup_port, SerialTransport, Transport};
