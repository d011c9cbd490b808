//! Request/confirm handshake with the motor controller
//!
//! Each payload goes through one round:
//!
//! ```text
//! Await-Request ──(line contains request token)──► Send-Payload
//!       ▲                                               │
//!       └─ read, sleep, repeat                          ▼
//!                                   Await-Confirmation ──(confirmation token)──► Done
//! ```
//!
//! Two rounds are run per goal, always in this order:
//!
//! | Round   | Request | Confirm | Payload            |
//! |---------|---------|---------|--------------------|
//! | Timing  | `DT`    | `OK1`   | sampling interval  |
//! | Payload | `DATA`  | `OK2`   | velocity sequence  |
//!
//! Tokens are matched by substring, so firmware that decorates its status
//! lines (`"> DT?"`) still works. Every wait is bounded by `max_polls` reads;
//! running out yields [`Error::HandshakeTimeout`].

use crate::config::HandshakeConfig;
use crate::controller::ControllerState;
use crate::error::{Error, Result};
use crate::link::PeripheralLink;
use std::thread;
use std::time::Duration;

/// Token pair for one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeRound {
    pub name: &'static str,
    pub request_token: &'static str,
    pub confirmation_token: &'static str,
}

pub const TIMING_ROUND: HandshakeRound = HandshakeRound {
    name: "timing",
    request_token: "DT",
    confirmation_token: "OK1",
};

pub const PAYLOAD_ROUND: HandshakeRound = HandshakeRound {
    name: "payload",
    request_token: "DATA",
    confirmation_token: "OK2",
};

/// Poll-based handshake runner
#[derive(Debug, Clone)]
pub struct HandshakeEngine {
    poll_interval: Duration,
    max_polls: u32,
}

impl HandshakeEngine {
    pub fn new(poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            poll_interval,
            max_polls: max_polls.max(1),
        }
    }

    pub fn from_config(config: &HandshakeConfig) -> Self {
        Self::new(config.poll_interval(), config.max_polls)
    }

    /// Send `state.dt` through the `DT`/`OK1` round
    pub fn run_timing_exchange(
        &self,
        link: &mut PeripheralLink,
        state: &ControllerState,
    ) -> Result<()> {
        let dt = state.dt;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(Error::InvariantViolation(format!(
                "dt must be greater than 0 before sending, got {}",
                dt
            )));
        }

        log::info!("Sending dt to peripheral");
        self.run_handshake(link, &TIMING_ROUND, |link| link.send_dt(dt))
    }

    /// Send `state.velocities` through the `DATA`/`OK2` round
    pub fn run_payload_exchange(
        &self,
        link: &mut PeripheralLink,
        state: &ControllerState,
    ) -> Result<()> {
        if state.velocities.is_empty() {
            return Err(Error::InvariantViolation(
                "velocities must be planned before a DATA exchange".into(),
            ));
        }

        log::info!(
            "Sending {} velocities to peripheral",
            state.velocities.len()
        );
        self.run_handshake(link, &PAYLOAD_ROUND, |link| {
            link.send_velocities(&state.velocities)
        })
    }

    /// Run one request/confirm round with the given payload sender
    pub fn run_handshake<F>(
        &self,
        link: &mut PeripheralLink,
        round: &HandshakeRound,
        send: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut PeripheralLink) -> Result<()>,
    {
        log::debug!(
            "Handshake {}: awaiting '{}'",
            round.name,
            round.request_token
        );
        self.await_token(link, round.request_token)?;

        send(link)?;

        log::debug!(
            "Handshake {}: awaiting '{}'",
            round.name,
            round.confirmation_token
        );
        self.await_token(link, round.confirmation_token)?;

        log::info!("Handshake {} complete", round.name);
        Ok(())
    }

    /// Read and sleep until a line contains `token`
    fn await_token(&self, link: &mut PeripheralLink, token: &'static str) -> Result<String> {
        for poll in 1..=self.max_polls {
            let line = link.read_line()?;
            thread::sleep(self.poll_interval);

            if line.contains(token) {
                log::trace!("Matched '{}' on poll {}: {:?}", token, poll, line);
                return Ok(line);
            }
            if !line.is_empty() {
                log::trace!("Ignoring peripheral line while awaiting '{}': {:?}", token, line);
            }
        }

        Err(Error::HandshakeTimeout {
            token,
            polls: self.max_polls,
        })
    }
}

impl Default for HandshakeEngine {
    fn default() -> Self {
        Self::from_config(&HandshakeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::VelocityCommand;
    use crate::transport::{MockTransport, TranscriptEvent};

    fn engine() -> HandshakeEngine {
        HandshakeEngine::new(Duration::ZERO, 50)
    }

    fn state(dt: f64, n: usize) -> ControllerState {
        ControllerState {
            dt,
            velocities: vec![VelocityCommand::new(0.1, 0.0, 0.0); n],
        }
    }

    #[test]
    fn test_zero_dt_fails_before_io() {
        let mock = MockTransport::with_lines(["DT", "OK1"]);
        let mut link = PeripheralLink::new(Box::new(mock.clone()));

        let err = engine()
            .run_timing_exchange(&mut link, &state(0.0, 1))
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert!(mock.transcript().is_empty());
        assert_eq!(mock.pending_lines(), 2);
    }

    #[test]
    fn test_empty_velocities_fail_before_io() {
        let mock = MockTransport::with_lines(["DATA", "OK2"]);
        let mut link = PeripheralLink::new(Box::new(mock.clone()));

        let err = engine()
            .run_payload_exchange(&mut link, &state(0.1, 0))
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert!(mock.transcript().is_empty());
    }

    #[test]
    fn test_timing_exchange_ignores_noise() {
        let mock = MockTransport::with_lines(["booting", "", "ready: DT?", "ack OK1"]);
        let mut link = PeripheralLink::new(Box::new(mock.clone()));

        engine()
            .run_timing_exchange(&mut link, &state(0.25, 1))
            .unwrap();
        assert_eq!(mock.written_string(), "0.250000\n");
        assert_eq!(mock.pending_lines(), 0);
    }

    #[test]
    fn test_payload_sent_only_after_ok1() {
        let mock = MockTransport::with_lines(["DT", "OK1", "DATA", "OK2"]);
        let mut link = PeripheralLink::new(Box::new(mock.clone()));
        let engine = engine();
        let state = state(0.1, 3);

        engine.run_timing_exchange(&mut link, &state).unwrap();
        engine.run_payload_exchange(&mut link, &state).unwrap();

        let transcript = mock.transcript();
        let payload_write = transcript
            .iter()
            .position(|e| matches!(e, TranscriptEvent::Write(b) if b.ends_with(b"END\n")))
            .unwrap();
        let ok1_read = transcript
            .iter()
            .position(|e| matches!(e, TranscriptEvent::Read(b) if b.starts_with(b"OK1")))
            .unwrap();
        let dt_write = transcript
            .iter()
            .position(|e| matches!(e, TranscriptEvent::Write(b) if b == b"0.100000\n"))
            .unwrap();
        assert!(dt_write < ok1_read);
        assert!(ok1_read < payload_write);
    }

    #[test]
    fn test_missing_confirmation_times_out() {
        let mock = MockTransport::with_lines(["DT"]);
        let mut link = PeripheralLink::new(Box::new(mock.clone()));

        let err = HandshakeEngine::new(Duration::ZERO, 5)
            .run_timing_exchange(&mut link, &state(0.1, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::HandshakeTimeout {
                token: "OK1",
                polls: 5
            }
        ));
        // dt was still delivered before the confirmation wait
        assert_eq!(mock.written_string(), "0.100000\n");
    }

    #[test]
    fn test_request_never_arrives_sends_nothing() {
        let mock = MockTransport::new();
        let mut link = PeripheralLink::new(Box::new(mock.clone()));

        let err = HandshakeEngine::new(Duration::ZERO, 3)
            .run_payload_exchange(&mut link, &state(0.1, 2))
            .unwrap_err();
        assert!(matches!(err, Error::HandshakeTimeout { token: "DATA", .. }));
        assert!(mock.get_written().is_empty());
    }

    #[test]
    fn test_read_failure_propagates() {
        let mock = MockTransport::new();
        mock.fail_reads(std::io::ErrorKind::BrokenPipe);
        let mut link = PeripheralLink::new(Box::new(mock));

        let err = engine()
            .run_timing_exchange(&mut link, &state(0.1, 1))
            .unwrap_err();
        assert!(err.is_transport_failure());
    }

    #[test]
    fn test_generic_round_with_custom_sender() {
        let mock = MockTransport::with_lines(["PING", "PONG"]);
        let mut link = PeripheralLink::new(Box::new(mock.clone()));
        let round = HandshakeRound {
            name: "probe",
            request_token: "PING",
            confirmation_token: "PONG",
        };

        let mut sent = false;
        engine()
            .run_handshake(&mut link, &round, |_| {
                sent = true;
                Ok(())
            })
            .unwrap();
        assert!(sent);
    }
}
