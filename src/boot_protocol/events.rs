//! Events for the `lkrsend` image transfer state machine.
//!
//! This modules is private and restricted to the
//! [`boot_protocol`](crate::boot_protocol) scope. The public interface of the
//! image transfer state machine is provided by
//! [`boot_protocol`](crate::boot_protocol).
//!
//! ```ignore
//! use super::events::*;
//! ```
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use crate::error::Error;

// =============================================================================
// Crate-Public Interface
// =============================================================================

// DeclareSizeEvent ============================================================

/// Event fired to trigger a transition to [`SizeDeclaredState`].
///
/// This event can happen under one of the following circumstances:
///
///  1. While at the [`IdleState`], to start the first handshake.
///  2. While at the [`RebootingState`], once the device had time to restart,
///     to start the second and last handshake.
#[derive(Debug)]
pub(crate) struct DeclareSizeEvent {}

// AwaitAckEvent ===============================================================

/// Event fired to trigger a transition to [`AwaitingAckState`], after the
/// size declaration was written and flushed.
#[derive(Debug)]
pub(crate) struct AwaitAckEvent {
    /// The text that acknowledges the declared size. Moved to the next state.
    pub pattern: String,
}

// RebootEvent =================================================================

/// Event fired to trigger a transition to [`RebootingState`] when the first
/// handshake timed out.
#[derive(Debug)]
pub(crate) struct RebootEvent {}

// SendPayloadEvent ============================================================

/// Event fired to trigger a transition to [`SendingState`] once the bootloader
/// acknowledged the declared size.
#[derive(Debug)]
pub(crate) struct SendPayloadEvent {
    /// Where the acknowledgement text was found in the response line.
    pub ack_offset: usize,
}

// DrainEvent ==================================================================

/// Event fired to trigger a transition to [`DrainingState`] after the payload
/// was pushed.
#[derive(Debug)]
pub(crate) struct DrainEvent {}

// DoneEvent ===================================================================

/// Event fired when the transfer completes and is about to terminate. It
/// triggers a transition to the [`DoneState`].
///
/// This event can happen at any state due to normal termination, an
/// unacknowledged retry, or a transport error.
#[derive(Debug)]
pub(crate) struct DoneEvent {
    /// The reason of an abnormal completion, `None` on success.
    pub error: Option<Error>,
}

// ExitEvent ===================================================================

/// The last event that can be triggered in the state machine and will result
/// in the event loop terminating, handing back the transfer result to the
/// caller.
#[derive(Debug)]
pub(crate) struct ExitEvent {
    pub error: Option<Error>,
}

// Events enum ==================================================================

/// Events that can be triggered within the image transfer state machine.
///
/// Each possible value holds an `event`, which in turn may hold additional data
/// for the state transition. Such data is passed by the origin state for
/// potential use by the target state.
#[derive(Debug)]
pub(crate) enum Event {
    DeclareSize(DeclareSizeEvent),
    AwaitAck(AwaitAckEvent),
    Reboot(RebootEvent),
    SendPayload(SendPayloadEvent),
    Drain(DrainEvent),
    Done(DoneEvent),
    Exit(ExitEvent),
}

impl Event {
    /// Shortcut for the fatal end of a transfer.
    pub fn failed(error: impl Into<Error>) -> Self {
        Event::Done(DoneEvent {
            error: Some(error.into()),
        })
    }
}
