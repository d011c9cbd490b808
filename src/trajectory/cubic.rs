//! Rest-to-rest cubic trajectory
//!
//! Each axis follows `p(t) = d * (3s² - 2s³)` with `s = t / T`, which starts
//! and ends with zero velocity. The velocity is `v(t) = d * 6s(1 - s) / T`.

use super::{Pose, Trajectory, TrajectoryGenerator, VelocityCommand};
use crate::error::{Error, Result};

/// Upper bound on samples per trajectory (peripheral buffer size)
const DEFAULT_MAX_SAMPLES: usize = 10_000;

/// Cubic point-to-point generator starting from the origin at rest
#[derive(Debug, Clone)]
pub struct CubicTrajectory {
    max_samples: usize,
}

impl CubicTrajectory {
    pub fn new() -> Self {
        Self {
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }

    /// Limit the number of ticks a single plan may produce
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }
}

impl Default for CubicTrajectory {
    fn default() -> Self {
        Self::new()
    }
}

impl TrajectoryGenerator for CubicTrajectory {
    fn generate(&self, goal: &Pose, t_max: f64, dt: f64) -> Result<Trajectory> {
        if !(t_max.is_finite() && t_max > 0.0) {
            return Err(Error::PlanningFailed(format!(
                "time horizon must be positive, got {}",
                t_max
            )));
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(Error::PlanningFailed(format!(
                "sampling interval must be positive, got {}",
                dt
            )));
        }
        if dt > t_max {
            return Err(Error::PlanningFailed(format!(
                "sampling interval {} exceeds horizon {}",
                dt, t_max
            )));
        }

        // Stretch dt so the horizon is an integer number of ticks.
        // Check the limit before casting, the cast saturates.
        let ticks = (t_max / dt - 1e-9).ceil().max(1.0);
        if ticks + 1.0 > self.max_samples as f64 {
            return Err(Error::PlanningFailed(format!(
                "{} samples exceed limit of {}",
                ticks + 1.0,
                self.max_samples
            )));
        }
        let steps = ticks as usize;
        let dt = t_max / steps as f64;

        let mut positions = Vec::with_capacity(steps + 1);
        let mut velocities = Vec::with_capacity(steps + 1);
        for k in 0..=steps {
            let s = k as f64 / steps as f64;
            let shape = 3.0 * s * s - 2.0 * s * s * s;
            let rate = 6.0 * s * (1.0 - s) / t_max;

            positions.push(Pose::new(goal.x * shape, goal.y * shape, goal.o * shape));
            velocities.push(VelocityCommand::new(
                goal.x * rate,
                goal.y * rate,
                goal.o * rate,
            ));
        }

        log::debug!(
            "Cubic trajectory: {} samples at dt={:.4}s to ({:.3}, {:.3}, {:.3})",
            velocities.len(),
            dt,
            goal.x,
            goal.y,
            goal.o
        );

        Ok(Trajectory {
            positions,
            velocities,
            dt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sample_count_and_dt() {
        let traj = CubicTrajectory::new()
            .generate(&Pose::new(1.0, 0.0, 0.0), 1.0, 0.1)
            .unwrap();
        assert_eq!(traj.velocities.len(), 11);
        assert_eq!(traj.positions.len(), 11);
        assert_relative_eq!(traj.dt, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_dt_adjusted_to_divide_horizon() {
        let traj = CubicTrajectory::new()
            .generate(&Pose::new(1.0, 0.0, 0.0), 1.0, 0.3)
            .unwrap();
        // ceil(1.0 / 0.3) = 4 ticks
        assert_eq!(traj.velocities.len(), 5);
        assert_relative_eq!(traj.dt, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_rest_to_rest_and_reaches_goal() {
        let goal = Pose::new(0.5, -0.2, 1.0);
        let traj = CubicTrajectory::new().generate(&goal, 2.0, 0.05).unwrap();

        let first = traj.velocities.first().unwrap();
        let last = traj.velocities.last().unwrap();
        assert_relative_eq!(first.vx, 0.0);
        assert_relative_eq!(last.vx, 0.0, epsilon = 1e-12);
        assert_relative_eq!(last.wz, 0.0, epsilon = 1e-12);

        let end = traj.positions.last().unwrap();
        assert_relative_eq!(end.x, goal.x, epsilon = 1e-12);
        assert_relative_eq!(end.y, goal.y, epsilon = 1e-12);
        assert_relative_eq!(end.o, goal.o, epsilon = 1e-12);

        // Peak velocity at mid-horizon is 1.5 * d / T
        let mid = traj.velocities[traj.velocities.len() / 2];
        assert_relative_eq!(mid.vx, 1.5 * goal.x / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_integrated_velocity_matches_displacement() {
        let goal = Pose::new(1.2, 0.4, -0.6);
        let traj = CubicTrajectory::new().generate(&goal, 3.0, 0.01).unwrap();

        // Trapezoidal integration
        let dist: f64 = traj
            .velocities
            .windows(2)
            .map(|w| 0.5 * (w[0].vx + w[1].vx) * traj.dt)
            .sum();
        assert_relative_eq!(dist, goal.x, epsilon = 1e-3);
    }

    #[test]
    fn test_invalid_timing_rejected() {
        let g = CubicTrajectory::new();
        let pose = Pose::default();
        assert!(matches!(
            g.generate(&pose, 0.0, 0.1),
            Err(Error::PlanningFailed(_))
        ));
        assert!(matches!(
            g.generate(&pose, 1.0, 0.0),
            Err(Error::PlanningFailed(_))
        ));
        assert!(matches!(
            g.generate(&pose, 1.0, 2.0),
            Err(Error::PlanningFailed(_))
        ));
    }

    #[test]
    fn test_sample_limit() {
        let g = CubicTrajectory::new().with_max_samples(10);
        let err = g.generate(&Pose::new(1.0, 0.0, 0.0), 1.0, 0.1).unwrap_err();
        assert!(matches!(err, Error::PlanningFailed(_)));
    }

    #[test]
    fn test_huge_horizon_ratio_rejected() {
        let g = CubicTrajectory::new();
        let err = g.generate(&Pose::default(), 1e10, 1e-10).unwrap_err();
        assert!(matches!(err, Error::PlanningFailed(_)));

        let err = g.generate(&Pose::default(), f64::MAX, 1e-300).unwrap_err();
        assert!(matches!(err, Error::PlanningFailed(_)));
    }
}
