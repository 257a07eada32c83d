//! Headless kinematic scene.
//!
//! [`HeadlessScene`] stores every (actor, slot) pair as an entity in a bevy
//! [`World`]. It does not integrate dynamics or detect collisions: poses are
//! whatever was last written, and contact forces are whatever the caller
//! injected with [`HeadlessScene::set_contact_force`].

use std::collections::HashMap;

use bevy::math::Vec3;
use bevy::prelude::{Entity, World};
use pushcube_core::error::SimError;
use pushcube_core::types::{Pose, Rgba};
use tracing::debug;

use crate::actor::{ActorDesc, ActorId, BodyRef, BodyType, ShapeDesc};
use crate::backend::{DirectionalLight, SimulationBackend};
use crate::components::{ActorMember, Body, BodyPose, RenderColor, SceneSlot, Shapes};

/// Ambient light of a freshly created scene.
const DEFAULT_AMBIENT: [f32; 3] = [0.0, 0.0, 0.0];

#[derive(Debug)]
struct ActorRecord {
    name: String,
    /// `(slot, entity)`, sorted by slot.
    entities: Vec<(usize, Entity)>,
}

// ---------------------------------------------------------------------------
// HeadlessScene
// ---------------------------------------------------------------------------

/// In-process [`SimulationBackend`] backed by a bevy ECS world.
pub struct HeadlessScene {
    world: World,
    num_envs: usize,
    actors: Vec<ActorRecord>,
    names: HashMap<String, ActorId>,
    contacts: HashMap<(BodyRef, BodyRef), Vec<Vec3>>,
    ambient: Vec<[f32; 3]>,
    directional_lights: Vec<DirectionalLight>,
    gpu: bool,
    gpu_syncs: usize,
    physics_steps: u64,
    elapsed: f32,
}

impl HeadlessScene {
    /// Empty scene with `num_envs` slots.
    #[must_use]
    pub fn new(num_envs: usize) -> Self {
        Self {
            world: World::new(),
            num_envs,
            actors: Vec::new(),
            names: HashMap::new(),
            contacts: HashMap::new(),
            ambient: vec![DEFAULT_AMBIENT; num_envs],
            directional_lights: Vec::new(),
            gpu: false,
            gpu_syncs: 0,
            physics_steps: 0,
            elapsed: 0.0,
        }
    }

    /// Report the scene as GPU-batched. Only changes what
    /// [`is_gpu`](SimulationBackend::is_gpu) returns.
    #[must_use]
    pub const fn with_gpu(mut self, gpu: bool) -> Self {
        self.gpu = gpu;
        self
    }

    fn check_slot(&self, slot: usize) -> Result<(), SimError> {
        if slot >= self.num_envs {
            return Err(SimError::SlotOutOfRange {
                slot,
                num_envs: self.num_envs,
            });
        }
        Ok(())
    }

    fn record(&self, actor: ActorId) -> Result<&ActorRecord, SimError> {
        self.actors
            .get(actor.0)
            .ok_or_else(|| SimError::ActorNotFound(format!("#{}", actor.0)))
    }

    fn check_body(&self, body: BodyRef) -> Result<(), SimError> {
        if let BodyRef::Actor(actor) = body {
            self.record(actor)?;
        }
        Ok(())
    }

    fn entity(&self, actor: ActorId, slot: usize) -> Result<Entity, SimError> {
        let record = self.record(actor)?;
        record
            .entities
            .binary_search_by_key(&slot, |(s, _)| *s)
            .map(|i| record.entities[i].1)
            .map_err(|_| SimError::SlotOutOfRange {
                slot,
                num_envs: self.num_envs,
            })
    }

    fn register(&mut self, name: &str, entities: Vec<(usize, Entity)>) -> Result<ActorId, SimError> {
        if self.names.contains_key(name) {
            return Err(SimError::DuplicateActor(name.into()));
        }
        let id = ActorId(self.actors.len());
        self.actors.push(ActorRecord {
            name: name.into(),
            entities,
        });
        self.names.insert(name.into(), id);
        Ok(id)
    }

    // -- Test and inspection hooks ------------------------------------------

    /// Set the force on `a` from `b` in one slot. The reverse query returns
    /// the negated force.
    pub fn set_contact_force(
        &mut self,
        a: BodyRef,
        b: BodyRef,
        slot: usize,
        force: Vec3,
    ) -> Result<(), SimError> {
        self.check_slot(slot)?;
        self.check_body(a)?;
        self.check_body(b)?;
        let num_envs = self.num_envs;
        if let Some(reverse) = self.contacts.get_mut(&(b, a)) {
            reverse[slot] = -force;
        } else {
            self.contacts
                .entry((a, b))
                .or_insert_with(|| vec![Vec3::ZERO; num_envs])[slot] = force;
        }
        Ok(())
    }

    /// Shapes of an actor in one slot.
    pub fn shapes(&self, actor: ActorId, slot: usize) -> Result<&[ShapeDesc], SimError> {
        let entity = self.entity(actor, slot)?;
        Ok(self
            .world
            .get::<Shapes>(entity)
            .map_or(&[][..], |shapes| shapes.0.as_slice()))
    }

    /// Visual color per slot the actor exists in.
    pub fn colors(&self, actor: ActorId) -> Result<Vec<Option<Rgba>>, SimError> {
        Ok(self
            .record(actor)?
            .entities
            .iter()
            .map(|(_, entity)| self.world.get::<RenderColor>(*entity).map(|c| c.0))
            .collect())
    }

    pub fn body_type(&self, actor: ActorId) -> Result<BodyType, SimError> {
        let record = self.record(actor)?;
        let (_, entity) = record
            .entities
            .first()
            .ok_or_else(|| SimError::ActorNotFound(record.name.clone()))?;
        Ok(self
            .world
            .get::<Body>(*entity)
            .map_or(BodyType::Dynamic, |body| body.0))
    }

    #[must_use]
    pub fn ambient_light(&self, slot: usize) -> Option<[f32; 3]> {
        self.ambient.get(slot).copied()
    }

    #[must_use]
    pub fn directional_lights(&self) -> &[DirectionalLight] {
        &self.directional_lights
    }

    /// Number of [`sync_gpu_state`](SimulationBackend::sync_gpu_state) calls.
    #[must_use]
    pub const fn gpu_sync_count(&self) -> usize {
        self.gpu_syncs
    }

    #[must_use]
    pub const fn physics_steps(&self) -> u64 {
        self.physics_steps
    }

    /// Simulated time in seconds.
    #[must_use]
    pub const fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

impl SimulationBackend for HeadlessScene {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "headless"
    }

    fn num_envs(&self) -> usize {
        self.num_envs
    }

    fn build_actor(&mut self, desc: ActorDesc) -> Result<ActorId, SimError> {
        desc.validate()?;
        let mut slots = desc
            .scene_idxs
            .clone()
            .unwrap_or_else(|| (0..self.num_envs).collect());
        slots.sort_unstable();
        slots.dedup();
        for slot in &slots {
            self.check_slot(*slot)?;
        }
        if self.names.contains_key(&desc.name) {
            return Err(SimError::DuplicateActor(desc.name));
        }

        let id = ActorId(self.actors.len());
        let color = desc.visual_color();
        let entities = slots
            .iter()
            .map(|slot| {
                let mut entity = self.world.spawn((
                    ActorMember(id),
                    SceneSlot(*slot),
                    BodyPose(desc.initial_pose),
                    Body(desc.body_type),
                    Shapes(desc.shapes.clone()),
                ));
                if let Some(color) = color {
                    entity.insert(RenderColor(color));
                }
                (*slot, entity.id())
            })
            .collect();
        debug!(name = %desc.name, slots = slots.len(), "built actor");
        self.register(&desc.name, entities)
    }

    fn merge_actors(&mut self, parts: &[ActorId], name: &str) -> Result<ActorId, SimError> {
        let mut entities = Vec::new();
        for part in parts {
            entities.extend(self.record(*part)?.entities.iter().copied());
        }
        entities.sort_unstable_by_key(|(slot, _)| *slot);
        if entities.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(SimError::InvalidGeometry(format!(
                "cannot merge into {name}: parts share a scene slot"
            )));
        }
        self.register(name, entities)
    }

    fn actor_by_name(&self, name: &str) -> Option<ActorId> {
        self.names.get(name).copied()
    }

    fn actor_slots(&self, actor: ActorId) -> Result<Vec<usize>, SimError> {
        Ok(self.record(actor)?.entities.iter().map(|(s, _)| *s).collect())
    }

    fn set_poses(
        &mut self,
        actor: ActorId,
        env_idx: &[usize],
        poses: &[Pose],
    ) -> Result<(), SimError> {
        if poses.len() != 1 && poses.len() != env_idx.len() {
            return Err(SimError::LengthMismatch {
                what: "poses",
                expected: env_idx.len(),
                got: poses.len(),
            });
        }
        let targets = env_idx
            .iter()
            .map(|slot| self.entity(actor, *slot))
            .collect::<Result<Vec<_>, _>>()?;
        for (i, entity) in targets.into_iter().enumerate() {
            let pose = if poses.len() == 1 { poses[0] } else { poses[i] };
            if let Some(mut body_pose) = self.world.get_mut::<BodyPose>(entity) {
                body_pose.0 = pose;
            }
        }
        Ok(())
    }

    fn poses(&self, actor: ActorId) -> Result<Vec<Pose>, SimError> {
        Ok(self
            .record(actor)?
            .entities
            .iter()
            .map(|(_, entity)| {
                self.world
                    .get::<BodyPose>(*entity)
                    .map_or(Pose::IDENTITY, |p| p.0)
            })
            .collect())
    }

    fn pairwise_contact_forces(&self, a: BodyRef, b: BodyRef) -> Result<Vec<Vec3>, SimError> {
        self.check_body(a)?;
        self.check_body(b)?;
        if let Some(forces) = self.contacts.get(&(a, b)) {
            return Ok(forces.clone());
        }
        if let Some(forces) = self.contacts.get(&(b, a)) {
            return Ok(forces.iter().map(|f| -*f).collect());
        }
        Ok(vec![Vec3::ZERO; self.num_envs])
    }

    fn set_ambient_light(&mut self, slot: usize, rgb: [f32; 3]) -> Result<(), SimError> {
        self.check_slot(slot)?;
        self.ambient[slot] = rgb;
        Ok(())
    }

    fn add_directional_light(&mut self, light: DirectionalLight) {
        self.directional_lights.push(light);
    }

    fn step(&mut self, dt: f32) {
        self.physics_steps += 1;
        self.elapsed += dt;
    }

    fn is_gpu(&self) -> bool {
        self.gpu
    }

    fn sync_gpu_state(&mut self) {
        self.gpu_syncs += 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{LinkId, PhysicalMaterial};

    fn cube(slot: usize) -> ActorDesc {
        ActorDesc::new(format!("cube-{slot}"))
            .with_box_collision(Vec3::splat(0.01), PhysicalMaterial::default(), 200.0)
            .with_box_visual(Vec3::splat(0.01), Rgba::RED)
            .with_initial_pose(Pose::from_translation(Vec3::new(0.0, 0.0, 0.01)))
            .with_scene_idxs(vec![slot])
    }

    #[test]
    fn build_actor_in_every_slot_by_default() {
        let mut scene = HeadlessScene::new(3);
        let id = scene
            .build_actor(ActorDesc::new("goal").with_body_type(BodyType::Kinematic))
            .unwrap();
        assert_eq!(scene.actor_slots(id).unwrap(), vec![0, 1, 2]);
        assert_eq!(scene.poses(id).unwrap().len(), 3);
        assert_eq!(scene.body_type(id).unwrap(), BodyType::Kinematic);
        assert_eq!(scene.actor_by_name("goal"), Some(id));
    }

    #[test]
    fn build_actor_rejects_out_of_range_slot() {
        let mut scene = HeadlessScene::new(2);
        assert!(matches!(
            scene.build_actor(cube(2)),
            Err(SimError::SlotOutOfRange { slot: 2, .. })
        ));
    }

    #[test]
    fn build_actor_rejects_duplicate_name() {
        let mut scene = HeadlessScene::new(1);
        scene.build_actor(cube(0)).unwrap();
        assert!(matches!(
            scene.build_actor(cube(0)),
            Err(SimError::DuplicateActor(_))
        ));
    }

    #[test]
    fn merged_actor_addresses_all_slots() {
        let mut scene = HeadlessScene::new(3);
        let parts: Vec<_> = (0..3).map(|i| scene.build_actor(cube(i)).unwrap()).collect();
        let merged = scene.merge_actors(&parts, "cube").unwrap();
        assert_eq!(scene.actor_slots(merged).unwrap(), vec![0, 1, 2]);
        assert_eq!(scene.actor_by_name("cube"), Some(merged));

        let target = Pose::from_translation(Vec3::new(0.3, 0.1, 0.02));
        scene.set_poses(merged, &[1], &[target]).unwrap();
        assert_eq!(scene.poses(merged).unwrap()[1], target);
        assert_eq!(scene.poses(parts[1]).unwrap()[0], target);
        assert_ne!(scene.poses(merged).unwrap()[0], target);
    }

    #[test]
    fn merge_rejects_overlapping_slots() {
        let mut scene = HeadlessScene::new(2);
        let a = scene.build_actor(cube(0)).unwrap();
        let b = scene
            .build_actor(ActorDesc::new("other").with_scene_idxs(vec![0]))
            .unwrap();
        assert!(scene.merge_actors(&[a, b], "bad").is_err());
    }

    #[test]
    fn set_poses_broadcasts_single_pose() {
        let mut scene = HeadlessScene::new(3);
        let table = scene.build_actor(ActorDesc::new("table")).unwrap();
        let pose = Pose::from_yaw(Vec3::new(0.617, 0.0, -0.92), 1.0);
        scene.set_poses(table, &[0, 2], &[pose]).unwrap();
        let poses = scene.poses(table).unwrap();
        assert_eq!(poses[0], pose);
        assert_eq!(poses[1], Pose::IDENTITY);
        assert_eq!(poses[2], pose);
    }

    #[test]
    fn set_poses_length_mismatch() {
        let mut scene = HeadlessScene::new(3);
        let table = scene.build_actor(ActorDesc::new("table")).unwrap();
        let err = scene
            .set_poses(table, &[0, 1, 2], &[Pose::IDENTITY, Pose::IDENTITY])
            .unwrap_err();
        assert!(matches!(err, SimError::LengthMismatch { expected: 3, got: 2, .. }));
    }

    #[test]
    fn unknown_actor_errors() {
        let scene = HeadlessScene::new(1);
        assert!(matches!(
            scene.poses(ActorId(9)),
            Err(SimError::ActorNotFound(_))
        ));
    }

    #[test]
    fn contact_forces_default_to_zero_and_are_antisymmetric() {
        let mut scene = HeadlessScene::new(2);
        let table = scene.build_actor(ActorDesc::new("table")).unwrap();
        let finger = BodyRef::Link(LinkId(5));
        assert_eq!(
            scene
                .pairwise_contact_forces(finger, table.into())
                .unwrap(),
            vec![Vec3::ZERO; 2]
        );

        scene
            .set_contact_force(finger, table.into(), 1, Vec3::new(0.0, 0.0, 0.5))
            .unwrap();
        let forward = scene.pairwise_contact_forces(finger, table.into()).unwrap();
        let reverse = scene.pairwise_contact_forces(table.into(), finger).unwrap();
        assert_eq!(forward[1], Vec3::new(0.0, 0.0, 0.5));
        assert_eq!(reverse[1], Vec3::new(0.0, 0.0, -0.5));
        assert_eq!(forward[0], Vec3::ZERO);
    }

    #[test]
    fn colors_follow_visual_shape() {
        let mut scene = HeadlessScene::new(1);
        let id = scene.build_actor(cube(0)).unwrap();
        assert_eq!(scene.colors(id).unwrap(), vec![Some(Rgba::RED)]);
        assert_eq!(scene.shapes(id, 0).unwrap().len(), 2);
    }

    #[test]
    fn lights_and_gpu_bookkeeping() {
        let mut scene = HeadlessScene::new(2).with_gpu(true);
        scene.set_ambient_light(1, [0.3, 0.3, 0.3]).unwrap();
        assert_eq!(scene.ambient_light(1), Some([0.3, 0.3, 0.3]));
        assert!(scene.set_ambient_light(2, [0.3; 3]).is_err());

        scene.add_directional_light(DirectionalLight::new(Vec3::NEG_Z));
        assert_eq!(scene.directional_lights().len(), 1);

        assert!(scene.is_gpu());
        scene.sync_gpu_state();
        assert_eq!(scene.gpu_sync_count(), 1);

        scene.step(0.01);
        scene.step(0.01);
        assert_eq!(scene.physics_steps(), 2);
        assert!((scene.elapsed() - 0.02).abs() < 1e-6);
    }
}
