//! Omni-base controller: planning state plus the peripheral link

use crate::codec::GoalMessage;
use crate::error::{Error, Result};
use crate::handshake::HandshakeEngine;
use crate::link::PeripheralLink;
use crate::trajectory::{TrajectoryGenerator, VelocityCommand};

/// Planned output awaiting delivery
///
/// Replaced wholesale by every successful [`OmniController::plan`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControllerState {
    /// Authoritative sampling interval (s)
    pub dt: f64,
    /// One command per tick
    pub velocities: Vec<VelocityCommand>,
}

/// Owns one peripheral link and the state planned for it
pub struct OmniController<'g> {
    link: PeripheralLink,
    generator: &'g dyn TrajectoryGenerator,
    state: ControllerState,
}

impl<'g> OmniController<'g> {
    pub fn new(link: PeripheralLink, generator: &'g dyn TrajectoryGenerator) -> Self {
        Self {
            link,
            generator,
            state: ControllerState::default(),
        }
    }

    /// Plan velocities for `goal`, replacing any previous state.
    ///
    /// On failure the previous state is left untouched.
    pub fn plan(&mut self, goal: &GoalMessage) -> Result<&ControllerState> {
        let trajectory = self
            .generator
            .generate(&goal.pose(), goal.t_max, goal.dt_request)
            .map_err(|e| {
                if matches!(e, Error::PlanningFailed(_)) {
                    e
                } else {
                    Error::PlanningFailed(e.to_string())
                }
            })?;

        if trajectory.dt != goal.dt_request {
            log::debug!(
                "Generator adjusted dt from {} to {}",
                goal.dt_request,
                trajectory.dt
            );
        }

        self.state = ControllerState {
            dt: trajectory.dt,
            velocities: trajectory.velocities,
        };
        log::info!(
            "Planned {} velocities at dt={:.4}s over {:.2}s",
            self.state.velocities.len(),
            self.state.dt,
            goal.t_max
        );
        Ok(&self.state)
    }

    /// Run the timing exchange, then the payload exchange
    pub fn deliver(&mut self, engine: &HandshakeEngine) -> Result<()> {
        log::info!("-Communication with peripheral-");
        engine.run_timing_exchange(&mut self.link, &self.state)?;
        engine.run_payload_exchange(&mut self.link, &self.state)?;
        log::info!("-END Communication with peripheral-");
        Ok(())
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Release the peripheral link
    pub fn close(&mut self) -> Result<()> {
        self.link.close()
    }
}
