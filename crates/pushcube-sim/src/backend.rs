//! Engine-agnostic simulation backend trait.
//!
//! The task never talks to a physics engine directly. It builds actors,
//! moves them, queries contacts and configures lights through
//! [`SimulationBackend`], and any engine (GPU-batched or not) can sit behind
//! it. [`HeadlessScene`](crate::headless::HeadlessScene) is the in-process
//! implementation used by tests and the CLI.

use bevy::math::Vec3;
use pushcube_core::error::SimError;
use pushcube_core::types::Pose;

use crate::actor::{ActorDesc, ActorId, BodyRef};

// ---------------------------------------------------------------------------
// DirectionalLight
// ---------------------------------------------------------------------------

/// Scene-wide directional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: [f32; 3],
    pub shadow: bool,
    pub shadow_scale: f32,
    pub shadow_map_size: u32,
}

impl DirectionalLight {
    /// White light without shadows.
    #[must_use]
    pub const fn new(direction: Vec3) -> Self {
        Self {
            direction,
            color: [1.0, 1.0, 1.0],
            shadow: false,
            shadow_scale: 5.0,
            shadow_map_size: 2048,
        }
    }

    #[must_use]
    pub const fn with_shadow(mut self, scale: f32, map_size: u32) -> Self {
        self.shadow = true;
        self.shadow_scale = scale;
        self.shadow_map_size = map_size;
        self
    }
}

// ---------------------------------------------------------------------------
// SimulationBackend
// ---------------------------------------------------------------------------

/// Batched scene that the task drives.
///
/// Every method that takes `env_idx` addresses a subset of the `num_envs`
/// parallel slots; the matching `poses` slice has one entry per index, or a
/// single entry that is broadcast to all of them.
pub trait SimulationBackend: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Number of parallel scene slots.
    fn num_envs(&self) -> usize;

    /// Build one actor from its recipe.
    fn build_actor(&mut self, desc: ActorDesc) -> Result<ActorId, SimError>;

    /// Combine per-slot actors with disjoint slot sets into one handle.
    fn merge_actors(&mut self, parts: &[ActorId], name: &str) -> Result<ActorId, SimError>;

    /// Look up an actor by name.
    fn actor_by_name(&self, name: &str) -> Option<ActorId>;

    /// Slots an actor exists in, ascending.
    fn actor_slots(&self, actor: ActorId) -> Result<Vec<usize>, SimError>;

    /// Write poses for the given slots.
    fn set_poses(&mut self, actor: ActorId, env_idx: &[usize], poses: &[Pose])
    -> Result<(), SimError>;

    /// Current poses, one per slot the actor exists in.
    fn poses(&self, actor: ActorId) -> Result<Vec<Pose>, SimError>;

    /// Contact force on `a` from `b`, one vector per slot.
    fn pairwise_contact_forces(&self, a: BodyRef, b: BodyRef) -> Result<Vec<Vec3>, SimError>;

    fn set_ambient_light(&mut self, slot: usize, rgb: [f32; 3]) -> Result<(), SimError>;

    fn add_directional_light(&mut self, light: DirectionalLight);

    /// Advance the simulation by one physics step.
    fn step(&mut self, dt: f32);

    /// Whether state lives on a batched GPU pipeline.
    fn is_gpu(&self) -> bool;

    /// Push pose writes made outside the step pipeline to the device.
    fn sync_gpu_state(&mut self);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trait_is_object_safe() {
        fn _accepts_boxed(_: Box<dyn SimulationBackend>) {}
    }

    #[test]
    fn trait_is_send_sync() {
        fn _assert_send_sync<T: Send + Sync>() {}
        _assert_send_sync::<Box<dyn SimulationBackend>>();
    }

    #[test]
    fn directional_light_defaults_white_without_shadow() {
        let light = DirectionalLight::new(Vec3::NEG_Z);
        assert_eq!(light.color, [1.0; 3]);
        assert!(!light.shadow);
    }

    #[test]
    fn directional_light_with_shadow() {
        let light = DirectionalLight::new(Vec3::new(1.0, 1.0, -1.0)).with_shadow(5.0, 2048);
        assert!(light.shadow);
        assert_eq!(light.shadow_map_size, 2048);
        assert!((light.shadow_scale - 5.0).abs() < f32::EPSILON);
    }
}
