//! Actor descriptors.
//!
//! An [`ActorDesc`] is the backend-independent recipe for one rigid actor:
//! its collision and visual shapes, body type, initial pose and the scene
//! slots it exists in. Backends turn it into whatever they simulate.

use bevy::math::Vec3;
use pushcube_core::error::SimError;
use pushcube_core::types::{Pose, Rgba};

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Handle to an actor owned by a [`SimulationBackend`](crate::backend::SimulationBackend).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub usize);

/// Handle to one link of a [`RobotAgent`](crate::robot::RobotAgent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub usize);

/// Anything that can take part in a contact query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyRef {
    Actor(ActorId),
    Link(LinkId),
}

impl From<ActorId> for BodyRef {
    fn from(id: ActorId) -> Self {
        Self::Actor(id)
    }
}

impl From<LinkId> for BodyRef {
    fn from(id: LinkId) -> Self {
        Self::Link(id)
    }
}

// ---------------------------------------------------------------------------
// BodyType
// ---------------------------------------------------------------------------

/// How the backend moves the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyType {
    /// Never moves.
    Static,
    /// Moved only by explicit pose writes.
    Kinematic,
    /// Moved by the solver.
    #[default]
    Dynamic,
}

// ---------------------------------------------------------------------------
// Geometry / material
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    Box { half_size: Vec3 },
    /// Cylinder along the local x axis.
    Cylinder { radius: f32, half_length: f32 },
    /// Infinite plane with +z normal.
    Plane,
}

impl Geometry {
    fn validate(&self) -> Result<(), SimError> {
        match *self {
            Self::Box { half_size } => {
                if !half_size.is_finite() || half_size.min_element() <= 0.0 {
                    return Err(SimError::InvalidGeometry(format!(
                        "box half size must be positive, got {half_size}"
                    )));
                }
            }
            Self::Cylinder {
                radius,
                half_length,
            } => {
                if !(is_positive(radius) && is_positive(half_length)) {
                    return Err(SimError::InvalidGeometry(format!(
                        "cylinder radius ({radius}) and half length ({half_length}) must be positive"
                    )));
                }
            }
            Self::Plane => {}
        }
        Ok(())
    }
}

fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

/// Surface material of a collision shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalMaterial {
    pub static_friction: f32,
    pub dynamic_friction: f32,
    pub restitution: f32,
}

impl PhysicalMaterial {
    /// Same static and dynamic friction.
    #[must_use]
    pub const fn new(friction: f32, restitution: f32) -> Self {
        Self {
            static_friction: friction,
            dynamic_friction: friction,
            restitution,
        }
    }
}

impl Default for PhysicalMaterial {
    fn default() -> Self {
        Self::new(0.3, 0.0)
    }
}

/// One shape attached to an actor.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeDesc {
    Collision {
        geometry: Geometry,
        local_pose: Pose,
        material: PhysicalMaterial,
        density: f32,
    },
    Visual {
        geometry: Geometry,
        local_pose: Pose,
        color: Rgba,
    },
}

impl ShapeDesc {
    #[must_use]
    pub const fn geometry(&self) -> &Geometry {
        match self {
            Self::Collision { geometry, .. } | Self::Visual { geometry, .. } => geometry,
        }
    }
}

// ---------------------------------------------------------------------------
// ActorDesc
// ---------------------------------------------------------------------------

/// Recipe for one actor.
///
/// # Example
///
/// ```
/// use bevy::math::Vec3;
/// use pushcube_core::types::{Pose, Rgba};
/// use pushcube_sim::actor::{ActorDesc, PhysicalMaterial};
///
/// let cube = ActorDesc::new("cube-0")
///     .with_box_collision(Vec3::splat(0.0125), PhysicalMaterial::new(0.3, 0.0), 200.0)
///     .with_box_visual(Vec3::splat(0.0125), Rgba::RED)
///     .with_initial_pose(Pose::from_translation(Vec3::new(0.0, 0.0, 0.0125)))
///     .with_scene_idxs(vec![0]);
/// assert_eq!(cube.shapes.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ActorDesc {
    pub name: String,
    pub shapes: Vec<ShapeDesc>,
    pub body_type: BodyType,
    pub initial_pose: Pose,
    /// Slots the actor is built in; `None` means every slot.
    pub scene_idxs: Option<Vec<usize>>,
}

impl ActorDesc {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shapes: Vec::new(),
            body_type: BodyType::Dynamic,
            initial_pose: Pose::IDENTITY,
            scene_idxs: None,
        }
    }

    #[must_use]
    pub fn with_shape(mut self, shape: ShapeDesc) -> Self {
        self.shapes.push(shape);
        self
    }

    #[must_use]
    pub fn with_box_collision(
        self,
        half_size: Vec3,
        material: PhysicalMaterial,
        density: f32,
    ) -> Self {
        self.with_shape(ShapeDesc::Collision {
            geometry: Geometry::Box { half_size },
            local_pose: Pose::IDENTITY,
            material,
            density,
        })
    }

    #[must_use]
    pub fn with_box_visual(self, half_size: Vec3, color: Rgba) -> Self {
        self.with_shape(ShapeDesc::Visual {
            geometry: Geometry::Box { half_size },
            local_pose: Pose::IDENTITY,
            color,
        })
    }

    #[must_use]
    pub fn with_cylinder_visual(self, radius: f32, half_length: f32, color: Rgba) -> Self {
        self.with_shape(ShapeDesc::Visual {
            geometry: Geometry::Cylinder {
                radius,
                half_length,
            },
            local_pose: Pose::IDENTITY,
            color,
        })
    }

    #[must_use]
    pub const fn with_body_type(mut self, body_type: BodyType) -> Self {
        self.body_type = body_type;
        self
    }

    #[must_use]
    pub const fn with_initial_pose(mut self, pose: Pose) -> Self {
        self.initial_pose = pose;
        self
    }

    #[must_use]
    pub fn with_scene_idxs(mut self, scene_idxs: Vec<usize>) -> Self {
        self.scene_idxs = Some(scene_idxs);
        self
    }

    /// Color of the first visual shape, if any.
    #[must_use]
    pub fn visual_color(&self) -> Option<Rgba> {
        self.shapes.iter().find_map(|shape| match shape {
            ShapeDesc::Visual { color, .. } => Some(*color),
            ShapeDesc::Collision { .. } => None,
        })
    }

    /// Check names, geometry and densities. Slot indices are checked by the
    /// backend, which knows the batch size.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.name.is_empty() {
            return Err(SimError::InvalidGeometry("actor name must not be empty".into()));
        }
        for shape in &self.shapes {
            shape.geometry().validate()?;
            if let ShapeDesc::Collision { density, .. } = shape {
                if !is_positive(*density) {
                    return Err(SimError::InvalidGeometry(format!(
                        "{}: density must be positive, got {density}",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let desc = ActorDesc::new("camera_mount");
        assert!(desc.shapes.is_empty());
        assert_eq!(desc.body_type, BodyType::Dynamic);
        assert_eq!(desc.initial_pose, Pose::IDENTITY);
        assert!(desc.scene_idxs.is_none());
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn visual_color_finds_first_visual() {
        let desc = ActorDesc::new("goal")
            .with_cylinder_visual(0.01, 5e-6, Rgba::WHITE)
            .with_body_type(BodyType::Kinematic);
        assert_eq!(desc.visual_color(), Some(Rgba::WHITE));
        assert_eq!(ActorDesc::new("x").visual_color(), None);
    }

    #[test]
    fn zero_box_rejected() {
        let desc = ActorDesc::new("bad").with_box_visual(Vec3::new(0.1, 0.0, 0.1), Rgba::RED);
        assert!(matches!(desc.validate(), Err(SimError::InvalidGeometry(_))));
    }

    #[test]
    fn non_positive_density_rejected() {
        let desc = ActorDesc::new("bad").with_box_collision(
            Vec3::splat(0.01),
            PhysicalMaterial::default(),
            0.0,
        );
        assert!(desc.validate().is_err());
    }

    #[test]
    fn flat_cylinder_accepted() {
        let desc = ActorDesc::new("goal").with_cylinder_visual(0.01, 5e-6, Rgba::WHITE);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        assert!(ActorDesc::new("").validate().is_err());
    }

    #[test]
    fn body_ref_from_handles() {
        assert_eq!(BodyRef::from(ActorId(2)), BodyRef::Actor(ActorId(2)));
        assert_eq!(BodyRef::from(LinkId(5)), BodyRef::Link(LinkId(5)));
    }

    #[test]
    fn material_uses_same_friction() {
        let m = PhysicalMaterial::new(0.42, 0.0);
        assert!((m.static_friction - m.dynamic_friction).abs() < f32::EPSILON);
    }
}
