//! `lkrsend` image transfer state machine.
//!
//! A transfer starts by declaring the image size to the bootloader and waiting
//! for it to confirm. If the confirmation does not come before a read times
//! out, the device is rebooted, given some time to settle, and the handshake
//! is tried one more time. Only a confirmed size is followed by the image.
//!
//! The following state diagram summarizes the different states and transitions
//! of a transfer:
//!
//! ```text
//!                  START
//!                    |
//!                    v
//!                .-------.
//!                | Idle  |
//!                '-------'
//!                    |
//!                    v
//!           .----------------.
//!           | Size Declared  |<--------------.
//!           '----------------'               |
//!                    |                       |
//!                    v                       |
//!           .----------------.  timeout  .-----------.
//!           |  Awaiting Ack  |---------->| Rebooting |
//!           '----------------'  (once)   '-----------'
//!              |          |
//!            acked     timeout
//!              |      (after reboot)
//!              v          |
//!         .---------.     |
//!         | Sending |     |
//!         '---------'     |
//!              |          |
//!              v          |
//!        .----------.     |
//!        | Draining |     |
//!        '----------'     |
//!              |          |
//!              v          v
//!           .----------------.
//!           |      Done      |
//!           '----------------'
//!                    |
//!                    v
//!                   END
//! ```
//!
//! Any transport error moves straight to `Done` and ends the transfer.

use std::time::Duration;

use super::commands::{ack_pattern, declare_size};
use super::events::*;
use super::scanner::{scan_until, HandshakeOutcome};
use super::states::*;
use crate::{error::Error, image::ImagePayload, monitor::Monitor, transport::Transport, Settings};

// =============================================================================
// Public Interface
// =============================================================================

/// What a successful transfer did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Payload bytes written, always the full image.
    pub bytes_sent: usize,
    /// Size declarations sent, `1` or `2`.
    pub handshakes: u8,
    /// Reboot commands sent, `0` or `1`.
    pub reboots: u8,
    /// Offset of the acknowledgement text in its response line.
    pub ack_offset: usize,
}

/// The handshake protocol engine. Use the `factory()` function to get an
/// instance then run a transfer by calling its `run_transfer()` method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeEngine {
    settle_delay: Duration,
}
impl HandshakeEngine {
    pub fn new(settle_delay: Duration) -> Self {
        HandshakeEngine { settle_delay }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Push `payload` to the bootloader on the other side of `transport`.
    ///
    /// The state machine event loop runs until the `Done` state is reached and
    /// its `should_exit` flag is set. A handshake timeout is retried once after
    /// a reboot; the payload is never sent unless its size was acknowledged.
    pub fn run_transfer(
        &self,
        transport: &mut dyn Transport,
        payload: &ImagePayload,
        monitor: &mut dyn Monitor,
    ) -> Result<Transfer, Error> {
        let mut session = Session::new(transport, monitor, payload, self.settle_delay);
        // The machine naturally starts in the `Idle` state.
        let mut sm = ProtocolStates::Idle(IdleState {});
        loop {
            sm = sm.step(&mut session);
            if let ProtocolStates::Done(done) = &mut sm {
                if done.should_exit {
                    return match done.error.take() {
                        Some(e) => Err(e),
                        None => Ok(Transfer {
                            bytes_sent: session.bytes_sent,
                            handshakes: session.handshakes,
                            reboots: session.reboots,
                            ack_offset: session.ack_offset.unwrap_or_default(),
                        }),
                    };
                }
            }
        }
    }
}

/// Factory function for the handshake protocol engine, configured from
/// `settings`.
pub fn factory(settings: &Settings) -> HandshakeEngine {
    HandshakeEngine::new(settings.settle_delay)
}

/// Declare `image_size` to the bootloader and wait for its acknowledgement.
///
/// This is a single handshake attempt: no reboot and no retry. Calling it
/// again with the same size sends exactly the same bytes.
pub fn declare_and_handshake(
    transport: &mut dyn Transport,
    image_size: usize,
    monitor: &mut dyn Monitor,
) -> Result<HandshakeOutcome, Error> {
    declare_size(transport, image_size)?;
    monitor.declared(image_size);
    let pattern = ack_pattern(image_size);
    Ok(scan_until(transport, Some(pattern.as_str()), monitor)?)
}

// =============================================================================
// Private stuff
// =============================================================================

/// An enum wrapper around the states of the image transfer state machine. It
/// provides a simpler and more intuitive model for manipulating states and
/// their transitions.
enum ProtocolStates {
    Idle(IdleState),
    SizeDeclared(SizeDeclaredState),
    AwaitingAck(AwaitingAckState),
    Rebooting(RebootingState),
    Sending(SendingState),
    Draining(DrainingState),
    Done(DoneState),
}
impl ProtocolStates {
    /// The unit of work in the state machine event loop. It runs the current
    /// state and decides the next transition from the event it fires. State
    /// transitions from events are implemented using the rust `From`/`Into`
    /// pattern. Most of the potential errors of state/event/transition
    /// mismatches can be caught at compile time.
    fn step(&mut self, session: &mut Session<'_>) -> Self {
        match self {
            ProtocolStates::Idle(state) => {
                let event = state.run(session);
                match event {
                    Event::DeclareSize(ev) => ProtocolStates::SizeDeclared(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            ProtocolStates::SizeDeclared(state) => {
                let event = state.run(session);
                match event {
                    Event::AwaitAck(ev) => ProtocolStates::AwaitingAck(ev.into()),
                    Event::Done(ev) => ProtocolStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            ProtocolStates::AwaitingAck(state) => {
                let event = state.run(session);
                match event {
                    Event::SendPayload(ev) => ProtocolStates::Sending(ev.into()),
                    Event::Reboot(ev) => ProtocolStates::Rebooting(ev.into()),
                    Event::Done(ev) => ProtocolStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            ProtocolStates::Rebooting(state) => {
                let event = state.run(session);
                match event {
                    Event::DeclareSize(ev) => ProtocolStates::SizeDeclared(ev.into()),
                    Event::Done(ev) => ProtocolStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            ProtocolStates::Sending(state) => {
                let event = state.run(session);
                match event {
                    Event::Drain(ev) => ProtocolStates::Draining(ev.into()),
                    Event::Done(ev) => ProtocolStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            ProtocolStates::Draining(state) => {
                let event = state.run(session);
                match event {
                    Event::Done(ev) => ProtocolStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            ProtocolStates::Done(state) => {
                let event = state.run(session);
                match event {
                    Event::Exit(ev) => ProtocolStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<DeclareSizeEvent> for SizeDeclaredState {
    fn from(_: DeclareSizeEvent) -> SizeDeclaredState {
        SizeDeclaredState {}
    }
}

impl From<AwaitAckEvent> for AwaitingAckState {
    fn from(event: AwaitAckEvent) -> AwaitingAckState {
        AwaitingAckState {
            pattern: event.pattern,
        }
    }
}

impl From<RebootEvent> for RebootingState {
    fn from(_: RebootEvent) -> RebootingState {
        RebootingState {}
    }
}

impl From<SendPayloadEvent> for SendingState {
    fn from(event: SendPayloadEvent) -> SendingState {
        SendingState {
            ack_offset: event.ack_offset,
        }
    }
}

impl From<DrainEvent> for DrainingState {
    fn from(_: DrainEvent) -> DrainingState {
        DrainingState {}
    }
}

impl From<DoneEvent> for DoneState {
    fn from(event: DoneEvent) -> DoneState {
        DoneState {
            error: event.error,
            should_exit: false,
        }
    }
}
impl From<ExitEvent> for DoneState {
    fn from(event: ExitEvent) -> DoneState {
        DoneState {
            error: event.error,
            should_exit: true,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::monitor::{Note, RecordingMonitor};
    use crate::transport::mock::MockTransport;

    const SETTLE: Duration = Duration::from_millis(25);

    fn image(len: usize) -> ImagePayload {
        (0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>().into()
    }

    fn declaration(size: usize) -> Vec<u8> {
        format!("\x08\x08lkr_uart\n{}\n", size).into_bytes()
    }

    #[test]
    fn immediate_ack_sends_the_payload_once() {
        let payload = image(1024);
        let mut transport = MockTransport::with_script(vec![
            "lkr_uart\r\n",
            "Image size=1024\r\n",
            "Receiving 1024 bytes...\n",
            "1024 of bytes received from uart. First 20 bytes received (HEX): 00 01\r\n",
        ]);
        let mut monitor = RecordingMonitor::default();

        let transfer = HandshakeEngine::new(SETTLE)
            .run_transfer(&mut transport, &payload, &mut monitor)
            .unwrap();

        assert_eq!(
            transfer,
            Transfer {
                bytes_sent: 1024,
                handshakes: 1,
                reboots: 0,
                ack_offset: 0,
            }
        );
        assert_eq!(transport.writes.len(), 3);
        assert_eq!(transport.writes[..2].concat(), declaration(1024));
        assert_eq!(transport.writes[2], payload.as_bytes());
        assert_eq!(transport.count(b"reboot"), 0);
        assert_eq!(transport.flushes, 2);
        // The trailing line is drained, then a read times out.
        assert_eq!(transport.remaining(), 0);
        assert_eq!(monitor.responses().len(), 4);
        assert!(!monitor.notes.contains(&Note::Settled));
    }

    #[test]
    fn ack_after_reboot_succeeds() {
        let payload = image(1024);
        let mut transport = MockTransport::with_script(vec![
            "",
            "Rebooting...\r\n",
            "Receiving 1024 bytes...\n",
        ]);
        let mut monitor = RecordingMonitor::default();

        let started = Instant::now();
        let transfer = HandshakeEngine::new(SETTLE)
            .run_transfer(&mut transport, &payload, &mut monitor)
            .unwrap();

        assert!(started.elapsed() >= SETTLE);
        assert_eq!(transfer.handshakes, 2);
        assert_eq!(transfer.reboots, 1);
        assert_eq!(transfer.bytes_sent, 1024);

        let mut expected = declaration(1024);
        expected.extend_from_slice(b"\x08\x08reboot\n");
        expected.extend_from_slice(&declaration(1024));
        expected.extend_from_slice(payload.as_bytes());
        assert_eq!(transport.written(), expected);
        assert_eq!(transport.count(b"\x08\x08reboot\n"), 1);
        assert_eq!(
            monitor.notes,
            vec![
                Note::Declared(1024),
                Note::Rebooting(SETTLE),
                Note::Settled,
                Note::Declared(1024),
                Note::Response("Rebooting...".into()),
                Note::Response("Receiving 1024 bytes...".into()),
                Note::Sending(1024),
                Note::PayloadSent(1024),
            ]
        );
    }

    #[test]
    fn no_ack_on_either_attempt_fails_without_payload() {
        let payload = image(1024);
        let mut transport = MockTransport::with_script(vec!["Image size=1024\r\n", ""]);
        let mut monitor = RecordingMonitor::default();

        let started = Instant::now();
        let result = HandshakeEngine::new(SETTLE).run_transfer(&mut transport, &payload, &mut monitor);

        assert!(started.elapsed() >= SETTLE);
        match result {
            Err(Error::HandshakeTimeout { size }) => assert_eq!(size, 1024),
            other => panic!("unexpected result {:?}", other),
        }
        let mut expected = declaration(1024);
        expected.extend_from_slice(b"\x08\x08reboot\n");
        expected.extend_from_slice(&declaration(1024));
        assert_eq!(transport.written(), expected);
        assert_eq!(transport.count(b"\x08\x08reboot\n"), 1);
        // Two scans, each ended by one timed out read.
        assert_eq!(transport.reads, 3);
        assert!(!monitor
            .notes
            .iter()
            .any(|n| matches!(n, Note::Sending(_) | Note::PayloadSent(_))));
    }

    #[test]
    fn ack_for_another_size_is_ignored() {
        let payload = image(64);
        let mut transport = MockTransport::with_script(vec!["Receiving 6400 bytes...\n"]);
        let mut monitor = RecordingMonitor::default();

        let started = Instant::now();
        let result =
            HandshakeEngine::new(Duration::ZERO).run_transfer(&mut transport, &payload, &mut monitor);

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(result, Err(Error::HandshakeTimeout { size: 64 })));
        assert_eq!(transport.written().len(), 2 * declaration(64).len() + 9);
    }

    #[test]
    fn write_failure_is_fatal() {
        let payload = image(16);
        let mut transport = MockTransport::with_script(Vec::<&str>::new());
        transport.fail_write_at = Some(0);
        let mut monitor = RecordingMonitor::default();

        let result = HandshakeEngine::new(SETTLE).run_transfer(&mut transport, &payload, &mut monitor);

        match result {
            Err(Error::Transport(e)) => assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(transport.writes.is_empty());
        assert_eq!(transport.reads, 0);
        assert!(monitor.notes.is_empty());
    }

    #[test]
    fn payload_write_failure_is_not_retried() {
        let payload = image(16);
        let mut transport = MockTransport::with_script(vec!["Receiving 16 bytes...\n"]);
        transport.fail_write_at = Some(2);
        let mut monitor = RecordingMonitor::default();

        let result = HandshakeEngine::new(SETTLE).run_transfer(&mut transport, &payload, &mut monitor);

        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(transport.written(), declaration(16));
        assert_eq!(transport.count(b"reboot"), 0);
    }

    #[test]
    fn repeated_handshakes_send_identical_bytes() {
        let mut transport = MockTransport::default();
        let mut monitor = RecordingMonitor::default();

        let first = declare_and_handshake(&mut transport, 2048, &mut monitor).unwrap();
        let second = declare_and_handshake(&mut transport, 2048, &mut monitor).unwrap();

        assert_eq!(first, HandshakeOutcome::TimedOut);
        assert_eq!(second, HandshakeOutcome::TimedOut);
        assert_eq!(transport.writes.len(), 4);
        assert_eq!(transport.writes[..2], transport.writes[2..]);
        assert_eq!(transport.writes[..2].concat(), declaration(2048));
    }

    #[test]
    fn handshake_reports_the_ack_offset() {
        let mut transport = MockTransport::with_script(vec!["> Receiving 5 bytes...\n"]);
        let mut monitor = RecordingMonitor::default();

        let outcome = declare_and_handshake(&mut transport, 5, &mut monitor).unwrap();
        assert_eq!(outcome, HandshakeOutcome::Acknowledged(2));
    }

    #[test]
    fn factory_takes_the_settle_delay() {
        let settings = crate::SettingsBuilder::new()
            .settle_delay(Duration::from_millis(1500))
            .finalize();
        assert_eq!(factory(&settings).settle_delay(), Duration::from_millis(1500));
    }
}
