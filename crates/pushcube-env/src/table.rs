//! Table-top scene: a static table and the ground plane below it.

use std::f32::consts::FRAC_PI_2;

use bevy::math::Vec3;
use pushcube_core::error::SimError;
use pushcube_core::types::{Pose, Rgba};
use pushcube_sim::actor::{ActorDesc, ActorId, BodyType, Geometry, PhysicalMaterial, ShapeDesc};
use pushcube_sim::backend::SimulationBackend;

/// Table top extents (length, width, height) in meters.
pub const TABLE_SIZE: [f32; 3] = [2.418, 1.209, 0.919_642_9];

/// Table pose the scene builder resets to.
const DEFAULT_TABLE_X: f32 = -0.12;

const TABLE_COLOR: Rgba = Rgba([0.85, 0.78, 0.66, 1.0]);
const GROUND_COLOR: Rgba = Rgba([0.5, 0.5, 0.5, 1.0]);

/// Handles of the table scene actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableScene {
    pub table: ActorId,
    pub ground: ActorId,
}

impl TableScene {
    /// Build the table and the ground in every slot.
    ///
    /// The table origin sits at the center of its top face, so the top is at
    /// `z = 0` once the table is placed at its default height.
    pub fn build(backend: &mut dyn SimulationBackend) -> Result<Self, SimError> {
        let half = Vec3::from_array(TABLE_SIZE) / 2.0;
        let offset = Pose::from_translation(Vec3::new(0.0, 0.0, half.z));
        let table = backend.build_actor(
            ActorDesc::new("table-workspace")
                .with_body_type(BodyType::Static)
                .with_shape(ShapeDesc::Collision {
                    geometry: Geometry::Box { half_size: half },
                    local_pose: offset,
                    material: PhysicalMaterial::default(),
                    density: 1000.0,
                })
                .with_shape(ShapeDesc::Visual {
                    geometry: Geometry::Box { half_size: half },
                    local_pose: offset,
                    color: TABLE_COLOR,
                })
                .with_initial_pose(Self::default_table_pose()),
        )?;
        let ground = backend.build_actor(
            ActorDesc::new("ground")
                .with_body_type(BodyType::Static)
                .with_shape(ShapeDesc::Collision {
                    geometry: Geometry::Plane,
                    local_pose: Pose::IDENTITY,
                    material: PhysicalMaterial::default(),
                    density: 1000.0,
                })
                .with_shape(ShapeDesc::Visual {
                    geometry: Geometry::Plane,
                    local_pose: Pose::IDENTITY,
                    color: GROUND_COLOR,
                })
                .with_initial_pose(Self::ground_pose()),
        )?;
        Ok(Self { table, ground })
    }

    /// Table pose before the task moves it.
    #[must_use]
    pub fn default_table_pose() -> Pose {
        Pose::from_yaw(Vec3::new(DEFAULT_TABLE_X, 0.0, -TABLE_SIZE[2]), FRAC_PI_2)
    }

    #[must_use]
    pub fn ground_pose() -> Pose {
        Pose::from_translation(Vec3::new(0.0, 0.0, -TABLE_SIZE[2]))
    }

    /// Put the table and the ground back at their default poses in the
    /// selected slots.
    pub fn initialize(
        &self,
        backend: &mut dyn SimulationBackend,
        env_idx: &[usize],
    ) -> Result<(), SimError> {
        backend.set_poses(self.table, env_idx, &[Self::default_table_pose()])?;
        backend.set_poses(self.ground, env_idx, &[Self::ground_pose()])
    }
}
