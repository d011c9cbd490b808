//! Resilience supervisor
//!
//! Owns every resource of a run. The networked session gets a listener and a
//! controller on the primary port. If it ends with
//! [`SessionOutcome::Failed`], the networked controller is released and a
//! single local fallback goal is delivered on the fallback port. Every
//! transport and listener that was opened is closed before [`Supervisor::run`]
//! returns, whichever path was taken.

use crate::codec;
use crate::config::BridgeConfig;
use crate::controller::OmniController;
use crate::error::Result;
use crate::handshake::HandshakeEngine;
use crate::link::PeripheralLink;
use crate::server::HostListener;
use crate::session::{SessionLoop, SessionOutcome, SessionSettings, SessionStatus};
use crate::trajectory::TrajectoryGenerator;
use crate::transport::Transport;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Path the supervisor finished on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Networked session ended on shutdown request
    Networked,
    /// Networked session failed; the local fallback goal was delivered
    Fallback,
}

/// Top-level owner of listener, controllers and handshake settings
pub struct Supervisor<'g> {
    config: BridgeConfig,
    generator: &'g dyn TrajectoryGenerator,
    engine: HandshakeEngine,
    running: Arc<AtomicBool>,
}

impl<'g> Supervisor<'g> {
    pub fn new(
        config: BridgeConfig,
        generator: &'g dyn TrajectoryGenerator,
        running: Arc<AtomicBool>,
    ) -> Self {
        let engine = HandshakeEngine::from_config(&config.handshake);
        Self {
            config,
            generator,
            engine,
            running,
        }
    }

    /// Run the networked session, falling back to one local goal on failure.
    ///
    /// `open_transport` is called with a port name; `bind_listener` once with
    /// the configuration. An error from the fallback itself is returned as is.
    pub fn run<O, B, L>(&self, mut open_transport: O, bind_listener: B) -> Result<RunMode>
    where
        O: FnMut(&str) -> Result<Box<dyn Transport>>,
        B: FnOnce(&BridgeConfig) -> Result<L>,
        L: HostListener,
    {
        let mut listener: Option<L> = None;
        let mut controller: Option<OmniController<'g>> = None;

        let outcome = self.run_networked(
            &mut open_transport,
            bind_listener,
            &mut listener,
            &mut controller,
        );
        if let Some(controller) = controller.as_mut() {
            release_controller(controller, "networked");
        }

        let result = match outcome {
            SessionOutcome::Completed => Ok(RunMode::Networked),
            SessionOutcome::Failed(reason) => {
                log::warn!(
                    "Networked session failed ({}); status {}, running local fallback",
                    reason,
                    SessionStatus::Degraded
                );
                self.run_local(&mut open_transport)
                    .map(|()| RunMode::Fallback)
            }
        };

        if let Some(mut listener) = listener.take() {
            match listener.close() {
                Ok(()) => log::info!("Network listener released"),
                Err(e) => log::error!("Failed to release network listener: {}", e),
            }
        }

        result
    }

    fn run_networked<O, B, L>(
        &self,
        open_transport: &mut O,
        bind_listener: B,
        listener: &mut Option<L>,
        controller: &mut Option<OmniController<'g>>,
    ) -> SessionOutcome
    where
        O: FnMut(&str) -> Result<Box<dyn Transport>>,
        B: FnOnce(&BridgeConfig) -> Result<L>,
        L: HostListener,
    {
        let listener = match bind_listener(&self.config) {
            Ok(l) => listener.insert(l),
            Err(e) => return SessionOutcome::Failed(e),
        };

        let transport = match open_transport(&self.config.peripheral.port) {
            Ok(t) => t,
            Err(e) => return SessionOutcome::Failed(e),
        };
        let controller =
            controller.insert(OmniController::new(PeripheralLink::new(transport), self.generator));

        SessionLoop::new(
            listener,
            controller,
            &self.engine,
            SessionSettings::from_config(&self.config),
            Arc::clone(&self.running),
        )
        .run()
    }

    /// Deliver the configured fallback goal once on the fallback port
    pub fn run_local<O>(&self, mut open_transport: O) -> Result<()>
    where
        O: FnMut(&str) -> Result<Box<dyn Transport>>,
    {
        let goal = codec::decode(&self.config.fallback.goal)?;
        let port = &self.config.peripheral.fallback_port;
        log::info!("Local session on {} with goal {}", port, goal);

        let transport = open_transport(port)?;
        let mut controller = OmniController::new(PeripheralLink::new(transport), self.generator);

        let result = deliver_once(&mut controller, &goal, &self.engine);
        release_controller(&mut controller, "fallback");

        match &result {
            Ok(()) => log::info!("Local session done"),
            Err(e) => log::error!("Local session failed: {}", e),
        }
        result
    }
}

fn deliver_once(
    controller: &mut OmniController<'_>,
    goal: &codec::GoalMessage,
    engine: &HandshakeEngine,
) -> Result<()> {
    controller.plan(goal)?;
    controller.deliver(engine)
}

fn release_controller(controller: &mut OmniController<'_>, label: &str) {
    match controller.close() {
        Ok(()) => log::info!("Released {} peripheral link", label),
        Err(e) => log::error!("Failed to release {} peripheral link: {}", label, e),
    }
}
