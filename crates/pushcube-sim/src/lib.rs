//! Simulation seams for the cube-push task.
//!
//! The task drives a batched scene through
//! [`SimulationBackend`](backend::SimulationBackend) and an arm through
//! [`RobotAgent`](robot::RobotAgent). [`HeadlessScene`] keeps actors as ECS
//! entities without dynamics. [`So100Arm`] tracks joint targets and computes
//! its tool point with forward kinematics.

pub mod actor;
pub mod backend;
pub mod chain;
pub mod components;
pub mod headless;
pub mod robot;
pub mod so100;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        actor::{ActorDesc, ActorId, BodyRef, BodyType, Geometry, LinkId, PhysicalMaterial, ShapeDesc},
        backend::{DirectionalLight, SimulationBackend},
        headless::HeadlessScene,
        robot::RobotAgent,
        so100::{SO100_UID, So100Arm},
    };
}

pub use headless::HeadlessScene;
pub use so100::So100Arm;
