//! ECS components of the headless scene.
//!
//! Every (actor, slot) pair is one entity. Merged actors reuse the entities
//! of their parts.

use bevy::prelude::*;
use pushcube_core::types::{Pose, Rgba};

use crate::actor::{ActorId, BodyType, ShapeDesc};

/// Actor the entity belongs to.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorMember(pub ActorId);

/// Scene slot of the entity.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneSlot(pub usize);

/// World pose of the entity.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct BodyPose(pub Pose);

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Body(pub BodyType);

/// Collision and visual shapes.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Shapes(pub Vec<ShapeDesc>);

/// Base color of the visual shapes.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct RenderColor(pub Rgba);
