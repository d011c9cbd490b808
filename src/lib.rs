//! GatiBridge - goal-to-velocity bridge for an omnidirectional robot base
//!
//! A planning host sends a target pose and timing budget over TCP. The bridge
//! plans a velocity trajectory and streams it to the motor controller using a
//! two-round request/confirm handshake (`DT`/`OK1`, then `DATA`/`OK2`).
//!
//! ## Layout
//!
//! - [`codec`]: goal message parsing
//! - [`controller`]: trajectory planning state and delivery
//! - [`handshake`]: poll-based request/confirm rounds
//! - [`session`]: networked session loop
//! - [`supervisor`]: fallback policy and resource ownership
//! - [`transport`], [`link`], [`server`]: peripheral and network I/O

pub mod codec;
pub mod config;
pub mod controller;
pub mod error;
pub mod handshake;
pub mod link;
pub mod server;
pub mod session;
pub mod supervisor;
pub mod trajectory;
pub mod transport;

// Re-export commonly used types
pub use codec::{DecodeMode, GoalMessage};
pub use config::BridgeConfig;
pub use controller::{ControllerState, OmniController};
pub use error::{Error, Result};
pub use handshake::HandshakeEngine;
pub use link::PeripheralLink;
pub use server::{HostListener, TcpHostServer};
pub use session::{SessionLoop, SessionOutcome, SessionStatus};
pub use supervisor::{RunMode, Supervisor};
pub use trajectory::{CubicTrajectory, Pose, Trajectory, TrajectoryGenerator, VelocityCommand};
pub use transport::{MockTransport, SerialTransport, Transport};
