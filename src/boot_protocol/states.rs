//! States for the `lkrsend` image transfer state machine.
//!
//! This modules is private and restricted to the
//! [`boot_protocol`](crate::boot_protocol) scope. The public interface of the
//! image transfer state machine is provided by
//! [`boot_protocol`](crate::boot_protocol).
//!
//! ```ignore
//! use super::states::*;
//! ```
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use std::{fmt, io, thread, time::Duration};

use log::{debug, info, warn};

use super::commands::{ack_pattern, declare_size, request_reboot};
use super::events::*;
use super::scanner::{scan_until, HandshakeOutcome};
use crate::{error::Error, image::ImagePayload, monitor::Monitor, transport::Transport};

/// How many times the device is rebooted to get a second chance at the
/// handshake.
pub(crate) const MAX_REBOOTS: u8 = 1;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Data shared by all states for the duration of one transfer.
pub(crate) struct Session<'a> {
    pub transport: &'a mut dyn Transport,
    pub monitor: &'a mut dyn Monitor,
    pub payload: &'a ImagePayload,
    /// Declared to the bootloader on every handshake. Taken from the payload
    /// once, when the session starts.
    pub image_size: usize,
    pub settle_delay: Duration,

    pub handshakes: u8,
    pub reboots: u8,
    pub ack_offset: Option<usize>,
    pub bytes_sent: usize,
}
impl<'a> Session<'a> {
    pub fn new(
        transport: &'a mut dyn Transport,
        monitor: &'a mut dyn Monitor,
        payload: &'a ImagePayload,
        settle_delay: Duration,
    ) -> Self {
        Session {
            transport,
            monitor,
            image_size: payload.len(),
            payload,
            settle_delay,
            handshakes: 0,
            reboots: 0,
            ack_offset: None,
            bytes_sent: 0,
        }
    }
}
impl fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("image_size", &self.image_size)
            .field("settle_delay", &self.settle_delay)
            .field("handshakes", &self.handshakes)
            .field("reboots", &self.reboots)
            .field("ack_offset", &self.ack_offset)
            .field("bytes_sent", &self.bytes_sent)
            .finish()
    }
}

/// Trait adding the ability for a state to be `run` after a transition into it.
pub(crate) trait Runnable {
    /// A state implements this method so it can be `run` after the state
    /// machine transitions into it.
    ///
    /// During this call, the state can do any work that needs to be done and
    /// when finished, requests a transition to a `new state` by returning the
    /// appropriate `event`. The `state` and the `event` are consumed to create
    /// the `new state` using the corresponding [`From`] trait implementation
    /// (provided such implementation exists).
    fn run(&mut self, session: &mut Session<'_>) -> Event;
}

// Idle State ==================================================================

/// The initial state of the image transfer state machine.
///
///  * **[`DeclareSizeEvent`] => [`SizeDeclaredState`]** always, nothing has
///    been sent yet.
#[derive(Debug)]
pub(crate) struct IdleState {}
impl Runnable for IdleState {
    fn run(&mut self, session: &mut Session<'_>) -> Event {
        info!("=> Idle");
        debug!("{:#?}", session);
        Event::DeclareSize(DeclareSizeEvent {})
    }
}

// SizeDeclared State ==========================================================

/// A `state` where the load command and the image size are written to the
/// bootloader.
///
///  * **[`AwaitAckEvent`] => [`AwaitingAckState`]** once the declaration is
///    flushed,
///  * **[`DoneEvent`] => [`DoneState`]** on a transport error.
#[derive(Debug)]
pub(crate) struct SizeDeclaredState {}
impl Runnable for SizeDeclaredState {
    fn run(&mut self, session: &mut Session<'_>) -> Event {
        info!("=> Size Declared");
        session.handshakes += 1;

        if let Err(e) = declare_size(session.transport, session.image_size) {
            return Event::failed(e);
        }
        session.monitor.declared(session.image_size);

        Event::AwaitAck(AwaitAckEvent {
            pattern: ack_pattern(session.image_size),
        })
    }
}

// AwaitingAck State ===========================================================

/// A `state` where the responses of the bootloader are scanned for the
/// acknowledgement of the declared size.
///
///  * **[`SendPayloadEvent`] => [`SendingState`]** when the acknowledgement
///    arrived,
///  * **[`RebootEvent`] => [`RebootingState`]** when a read timed out first and
///    the device was not rebooted yet,
///  * **[`DoneEvent`] => [`DoneState`]** when a read timed out first after the
///    reboot, or on a transport error.
#[derive(Debug)]
pub(crate) struct AwaitingAckState {
    /// The text that acknowledges the declared size.
    pub pattern: String,
}
impl Runnable for AwaitingAckState {
    fn run(&mut self, session: &mut Session<'_>) -> Event {
        info!("=> Awaiting Ack");

        match scan_until(session.transport, Some(self.pattern.as_str()), session.monitor) {
            Ok(HandshakeOutcome::Acknowledged(ack_offset)) => {
                Event::SendPayload(SendPayloadEvent { ack_offset })
            }
            Ok(HandshakeOutcome::TimedOut) if session.reboots < MAX_REBOOTS => {
                warn!("no `{}` from the bootloader", self.pattern);
                Event::Reboot(RebootEvent {})
            }
            Ok(HandshakeOutcome::TimedOut) => {
                warn!("no `{}` from the bootloader after reboot", self.pattern);
                Event::failed(Error::HandshakeTimeout {
                    size: session.image_size,
                })
            }
            Err(e) => Event::failed(e),
        }
    }
}

// Rebooting State =============================================================

/// A `state` where the device is asked to reboot, then given the settle delay
/// to come back to its bootloader shell.
///
/// The wait is an unconditional sleep.
///
///  * **[`DeclareSizeEvent`] => [`SizeDeclaredState`]** after the settle delay,
///  * **[`DoneEvent`] => [`DoneState`]** on a transport error.
#[derive(Debug)]
pub(crate) struct RebootingState {}
impl Runnable for RebootingState {
    fn run(&mut self, session: &mut Session<'_>) -> Event {
        info!("=> Rebooting");
        session.reboots += 1;

        if let Err(e) = request_reboot(session.transport) {
            return Event::failed(e);
        }
        session.monitor.rebooting(session.settle_delay);
        thread::sleep(session.settle_delay);
        session.monitor.settled();

        Event::DeclareSize(DeclareSizeEvent {})
    }
}

// Sending State ===============================================================

/// A `state` where the whole image is pushed in one write, with no framing.
///
///  * **[`DrainEvent`] => [`DrainingState`]** once the payload is flushed,
///  * **[`DoneEvent`] => [`DoneState`]** on a transport error.
#[derive(Debug)]
pub(crate) struct SendingState {
    pub ack_offset: usize,
}
impl Runnable for SendingState {
    fn run(&mut self, session: &mut Session<'_>) -> Event {
        info!("=> Sending");
        session.ack_offset = Some(self.ack_offset);

        let size = session.payload.len();
        session.monitor.sending(size);
        if let Err(e) = push_payload(session) {
            return Event::failed(e);
        }
        session.bytes_sent = size;
        session.monitor.payload_sent(size);

        Event::Drain(DrainEvent {})
    }
}

fn push_payload(session: &mut Session<'_>) -> io::Result<()> {
    session.transport.write_all(session.payload.as_bytes())?;
    session.transport.flush()
}

// Draining State ==============================================================

/// A `state` where whatever the device prints after receiving the image is
/// surfaced, until a read times out.
///
///  * **[`DoneEvent`] => [`DoneState`]** always; a transport error here is
///    still reported.
#[derive(Debug)]
pub(crate) struct DrainingState {}
impl Runnable for DrainingState {
    fn run(&mut self, session: &mut Session<'_>) -> Event {
        info!("=> Draining");
        match scan_until(session.transport, None, session.monitor) {
            Ok(_) => Event::Done(DoneEvent { error: None }),
            Err(e) => Event::failed(e),
        }
    }
}

// Done State ==================================================================

/// Reached when the transfer completes and is about to terminate (normally or
/// abnormally).
///
/// This state goes into a 2-phase execution. During the initial phase, it runs
/// like any other state to do its own things like logging the result. It then
/// triggers the [`ExitEvent`] to cause the state machine to terminate and
/// exit.
#[derive(Debug)]
pub(crate) struct DoneState {
    /// The reason of an abnormal completion, `None` on success.
    pub error: Option<Error>,
    /// When `true` instructs the state machine to exit its event loop.
    pub should_exit: bool,
}
impl Runnable for DoneState {
    fn run(&mut self, session: &mut Session<'_>) -> Event {
        match &self.error {
            None => info!(
                "=> Done with no errors, {} bytes after {} handshake(s)",
                session.bytes_sent, session.handshakes
            ),
            Some(e) => info!("=> Done with errors: {}", e),
        }
        Event::Exit(ExitEvent {
            error: self.error.take(),
        })
    }
}
