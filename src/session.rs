//! Networked session loop
//!
//! ```text
//! NoClient ─accept─► ClientConnected ─line─► MessageReceived (ack, decode)
//!    ▲                     ▲                         │
//!    │                     │                         ▼
//!    └───── Idle ◄─────────┴── ack ◄── Handshaking ◄── Planning
//! ```
//!
//! Every iteration ends with the idle throttle. Any error ends the loop with
//! [`SessionOutcome::Failed`]; there is no per-message recovery.

use crate::codec::{self, DecodeMode};
use crate::config::BridgeConfig;
use crate::controller::OmniController;
use crate::error::{Error, Result};
use crate::handshake::HandshakeEngine;
use crate::server::HostListener;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep, so a shutdown request is noticed promptly
const IDLE_SLICE: Duration = Duration::from_millis(100);

/// Current phase, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    AwaitingClient,
    Processing,
    Degraded,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::AwaitingClient => "awaiting client",
            SessionStatus::Processing => "processing",
            SessionStatus::Degraded => "degraded",
        };
        f.write_str(name)
    }
}

/// How the session loop ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// Shutdown requested
    Completed,
    /// Unrecoverable error; the supervisor decides what happens next
    Failed(Error),
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed)
    }
}

/// Per-session timing and codec settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub idle_interval: Duration,
    pub decode_mode: DecodeMode,
}

impl SessionSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            idle_interval: config.session.idle_interval(),
            decode_mode: config.session.decode_mode(),
        }
    }
}

/// Drives one listener and one controller until shutdown or failure
pub struct SessionLoop<'s, 'g, L: HostListener + ?Sized> {
    listener: &'s mut L,
    controller: &'s mut OmniController<'g>,
    engine: &'s HandshakeEngine,
    settings: SessionSettings,
    running: Arc<AtomicBool>,
    status: SessionStatus,
    goals_delivered: u64,
}

impl<'s, 'g, L: HostListener + ?Sized> SessionLoop<'s, 'g, L> {
    pub fn new(
        listener: &'s mut L,
        controller: &'s mut OmniController<'g>,
        engine: &'s HandshakeEngine,
        settings: SessionSettings,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            listener,
            controller,
            engine,
            settings,
            running,
            status: SessionStatus::AwaitingClient,
            goals_delivered: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Goals that completed both handshake rounds
    pub fn goals_delivered(&self) -> u64 {
        self.goals_delivered
    }

    /// Run until the running flag clears or an iteration fails
    pub fn run(&mut self) -> SessionOutcome {
        log::info!("Session loop started");

        while self.running.load(Ordering::Relaxed) {
            if let Err(e) = self.step() {
                log::error!("Session failed while {}: {}", self.status, e);
                return SessionOutcome::Failed(e);
            }
            self.idle();
        }

        log::info!(
            "Session loop stopped after {} delivered goals",
            self.goals_delivered
        );
        SessionOutcome::Completed
    }

    /// One loop iteration, without the idle throttle
    pub fn step(&mut self) -> Result<()> {
        if !self.listener.has_client() {
            self.set_status(SessionStatus::AwaitingClient);
            log::info!("No client connected. Attempting to accept a new connection...");
            self.listener.accept_connection()?;
            return Ok(());
        }

        let Some(message) = self.listener.receive_message()? else {
            return Ok(());
        };

        self.set_status(SessionStatus::Processing);
        log::info!("Received from host: {}", message);
        self.listener.send_confirmation()?;

        let goal = codec::decode_with(&message, self.settings.decode_mode)?;
        self.controller.plan(&goal)?;
        self.controller.deliver(self.engine)?;

        self.listener.send_confirmation()?;
        self.goals_delivered += 1;
        Ok(())
    }

    fn idle(&mut self) {
        self.set_status(SessionStatus::Idle);
        let deadline = Instant::now() + self.settings.idle_interval;
        loop {
            let now = Instant::now();
            if now >= deadline || !self.running.load(Ordering::Relaxed) {
                break;
            }
            thread::sleep((deadline - now).min(IDLE_SLICE));
        }
        log::debug!("Waiting for next message...");
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.status != status {
            log::debug!("Session status: {} -> {}", self.status, status);
            self.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::PeripheralLink;
    use crate::trajectory::CubicTrajectory;
    use crate::transport::MockTransport;
    use std::collections::VecDeque;

    /// Listener that is always connected and replays queued messages
    #[derive(Default)]
    struct QueueListener {
        messages: VecDeque<String>,
        acks: usize,
    }

    impl HostListener for QueueListener {
        fn accept_connection(&mut self) -> Result<bool> {
            Ok(true)
        }
        fn has_client(&self) -> bool {
            true
        }
        fn receive_message(&mut self) -> Result<Option<String>> {
            Ok(self.messages.pop_front())
        }
        fn send_confirmation(&mut self) -> Result<()> {
            self.acks += 1;
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            idle_interval: Duration::ZERO,
            decode_mode: DecodeMode::Positional,
        }
    }

    #[test]
    fn test_step_without_message_is_noop() {
        let generator = CubicTrajectory::new();
        let mock = MockTransport::new();
        let link = PeripheralLink::new(Box::new(mock.clone()));
        let mut controller = OmniController::new(link, &generator);
        let engine = HandshakeEngine::new(Duration::ZERO, 5);
        let mut listener = QueueListener::default();

        let mut session = SessionLoop::new(
            &mut listener,
            &mut controller,
            &engine,
            settings(),
            Arc::new(AtomicBool::new(true)),
        );
        assert_eq!(session.status(), SessionStatus::AwaitingClient);
        session.step().unwrap();
        assert_eq!(session.goals_delivered(), 0);
        assert!(mock.transcript().is_empty());
        drop(session);
        assert_eq!(listener.acks, 0);
    }

    #[test]
    fn test_malformed_message_fails_after_first_ack() {
        let generator = CubicTrajectory::new();
        let mock = MockTransport::with_lines(["DT", "OK1", "DATA", "OK2"]);
        let link = PeripheralLink::new(Box::new(mock.clone()));
        let mut controller = OmniController::new(link, &generator);
        let engine = HandshakeEngine::new(Duration::ZERO, 5);
        let mut listener = QueueListener::default();
        listener.messages.push_back("x:abc,y:0,o:0,dt:0.1,t_max:1".into());

        let outcome = SessionLoop::new(
            &mut listener,
            &mut controller,
            &engine,
            settings(),
            Arc::new(AtomicBool::new(true)),
        )
        .run();

        assert!(matches!(
            outcome,
            SessionOutcome::Failed(Error::MalformedMessage(_))
        ));
        assert_eq!(listener.acks, 1);
        assert!(mock.get_written().is_empty());
    }

    #[test]
    fn test_strict_mode_rejects_swapped_labels() {
        let generator = CubicTrajectory::new();
        let mock = MockTransport::new();
        let mut controller = OmniController::new(PeripheralLink::new(Box::new(mock)), &generator);
        let engine = HandshakeEngine::new(Duration::ZERO, 5);
        let mut listener = QueueListener::default();
        listener.messages.push_back("y:0,x:0,o:0,dt:0.1,t_max:1".into());

        let mut session = SessionLoop::new(
            &mut listener,
            &mut controller,
            &engine,
            SessionSettings {
                idle_interval: Duration::ZERO,
                decode_mode: DecodeMode::Strict,
            },
            Arc::new(AtomicBool::new(true)),
        );
        assert!(matches!(
            session.step(),
            Err(Error::MalformedMessage(_))
        ));
        assert_eq!(session.status(), SessionStatus::Processing);
    }

    #[test]
    fn test_cleared_flag_completes_immediately() {
        let generator = CubicTrajectory::new();
        let mut controller =
            OmniController::new(PeripheralLink::new(Box::new(MockTransport::new())), &generator);
        let engine = HandshakeEngine::default();
        let mut listener = QueueListener::default();

        let outcome = SessionLoop::new(
            &mut listener,
            &mut controller,
            &engine,
            settings(),
            Arc::new(AtomicBool::new(false)),
        )
        .run();
        assert!(outcome.is_completed());
    }
}
