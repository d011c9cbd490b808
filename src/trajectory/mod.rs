//! Trajectory generation seam
//!
//! The bridge only needs a sampling interval and an ordered list of
//! per-tick velocities. How those are produced is up to the
//! [`TrajectoryGenerator`] implementation.

mod cubic;

pub use cubic::CubicTrajectory;

use crate::error::Result;

/// 2D pose of the omni base (x, y in m, o in rad)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub o: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, o: f64) -> Self {
        Self { x, y, o }
    }
}

/// Velocity set-point for one sampling tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityCommand {
    /// Linear velocity along x (m/s)
    pub vx: f64,
    /// Linear velocity along y (m/s)
    pub vy: f64,
    /// Angular velocity (rad/s)
    pub wz: f64,
}

impl VelocityCommand {
    pub fn new(vx: f64, vy: f64, wz: f64) -> Self {
        Self { vx, vy, wz }
    }
}

/// Sampled trajectory returned by a generator
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// Sampled poses; not forwarded to the peripheral
    pub positions: Vec<Pose>,
    /// One velocity per tick, in time order
    pub velocities: Vec<VelocityCommand>,
    /// Sampling interval actually used (s)
    pub dt: f64,
}

/// Converts a goal pose and timing budget into a sampled velocity sequence
pub trait TrajectoryGenerator {
    /// Plan from the current origin to `goal` within `t_max` seconds.
    ///
    /// `dt` is a request; implementations may adjust it and must report the
    /// value they used in [`Trajectory::dt`]. Errors should be
    /// [`Error::PlanningFailed`](crate::Error::PlanningFailed).
    fn generate(&self, goal: &Pose, t_max: f64, dt: f64) -> Result<Trajectory>;
}

impl<F> TrajectoryGenerator for F
where
    F: Fn(&Pose, f64, f64) -> Result<Trajectory>,
{
    fn generate(&self, goal: &Pose, t_max: f64, dt: f64) -> Result<Trajectory> {
        self(goal, t_max, dt)
    }
}
