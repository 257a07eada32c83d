//! The SO100 cube-push task.
//!
//! An SO100 arm pushes a small cube onto a flat goal marker placed 0.1 m
//! past the cube along +x. Every slot of the batch gets its own cube
//! (half size, friction and color drawn at load time), its own camera mount
//! pose, and its own episode draws.
//!
//! Randomness comes from two seeded sources:
//!
//! - load time: one generator per slot, drawn in the order cube half size,
//!   cube color, cube friction, robot link colors, camera fov, ambient light;
//! - episodes: one generator per slot, drawn per reset in the order joint
//!   noise, cube xy, cube yaw, camera mount pose.
//!
//! Per-step camera jitter uses a single task-level generator.

use std::f32::consts::{FRAC_PI_2, PI};

use bevy::math::{Quat, Vec3};
use pushcube_core::error::{ConfigError, PushCubeError, SimError};
use pushcube_core::seed::{BatchedRng, SeedHierarchy, sample_normal, sample_uniform};
use pushcube_core::types::{Action, ActionSpace, Observation, Pose, Rgba};
use pushcube_domain_rand::camera::CameraPoseSampler;
use pushcube_domain_rand::randomizers::{
    AmbientLighting, CubeProperties, CubeRandomizer, RobotColorPlan,
};
use pushcube_sim::actor::{ActorDesc, ActorId, BodyType, PhysicalMaterial};
use pushcube_sim::backend::{DirectionalLight, SimulationBackend};
use pushcube_sim::robot::RobotAgent;
use pushcube_sim::{HeadlessScene, So100Arm};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::config::{PushCubeConfig, RewardMode};
use crate::controller::JointPositionController;
use crate::sensors::{
    CameraConfig, GreenscreenOverlay, KeptObject, base_camera_config, render_camera_config,
};
use crate::table::{TABLE_SIZE, TableScene};
use crate::task::{AgentObs, EvalInfo, ExtraObs, TaskEnvironment};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Radius of the goal marker; also the success distance.
pub const GOAL_RADIUS: f32 = 0.01;
const GOAL_HALF_LENGTH: f32 = 5e-6;
/// Goal marker height above the table top.
const GOAL_HEIGHT: f32 = 1e-3;
/// Goal offset from the cube along +x, excluding [`GOAL_RADIUS`].
const GOAL_OFFSET: f32 = 0.1;

/// Joint configuration episodes start from, before noise.
pub const REST_QPOS: [f32; 6] = [0.0, 0.0, 0.0, FRAC_PI_2, FRAC_PI_2, 0.0];

const CUBE_DENSITY: f32 = 200.0;

/// Joint speed norm below which the arm counts as static.
const STATIC_QVEL: f32 = 0.2;
/// Finger-table contact force that counts as touching.
const CONTACT_FORCE: f32 = 1e-2;
/// Reach distance at which the placement reward kicks in.
const REACH_THRESHOLD: f32 = 0.02;
/// Gap kept between the tool and the cube's -x face when reaching.
const REACH_GAP: f32 = 0.01;
/// Penalty for touching the table with a finger.
const TABLE_PENALTY: f32 = 2.0;
const SUCCESS_REWARD: f32 = crate::task::MAX_DENSE_REWARD;

/// Robot base pose in every slot.
#[must_use]
pub fn robot_base_pose() -> Pose {
    Pose::from_yaw(Vec3::ZERO, FRAC_PI_2)
}

/// Table pose that puts the robot base on the table edge.
#[must_use]
pub fn table_pose() -> Pose {
    Pose::from_yaw(Vec3::new(-0.12 + 0.737, 0.0, -TABLE_SIZE[2]), FRAC_PI_2)
}

/// Goal marker orientation: the cylinder axis turned to face up.
fn goal_rotation() -> Quat {
    Quat::from_rotation_y(FRAC_PI_2)
}

// ---------------------------------------------------------------------------
// LoadedScene
// ---------------------------------------------------------------------------

/// Everything built by `load_scene`.
#[derive(Debug, Clone)]
pub struct LoadedScene {
    pub seed: u64,
    pub table: TableScene,
    pub cube: ActorId,
    pub goal_region: ActorId,
    pub camera_mount: ActorId,
    pub cube_properties: CubeProperties,
    pub ambient: AmbientLighting,
    pub robot_colors: RobotColorPlan,
    pub sensors: Vec<CameraConfig>,
    pub human_render_camera: CameraConfig,
}

// ---------------------------------------------------------------------------
// PushCubeEnv
// ---------------------------------------------------------------------------

/// Batched cube-push task over a simulation backend and a robot.
pub struct PushCubeEnv<B = HeadlessScene, R = So100Arm> {
    config: PushCubeConfig,
    backend: B,
    robot: R,
    controller: JointPositionController,
    camera_sampler: CameraPoseSampler,
    greenscreen: GreenscreenOverlay,
    scene: Option<LoadedScene>,
    episode_rng: BatchedRng,
    camera_rng: ChaCha8Rng,
}

impl PushCubeEnv {
    /// Task on a fresh [`HeadlessScene`] with an [`So100Arm`].
    pub fn headless(config: PushCubeConfig) -> Result<Self, PushCubeError> {
        let backend = HeadlessScene::new(config.num_envs);
        Self::new(config, backend, So100Arm::new())
    }
}

impl<B: SimulationBackend, R: RobotAgent> PushCubeEnv<B, R> {
    /// Validate `config` against the collaborators and set up the task.
    /// Nothing is built until [`load_scene`](TaskEnvironment::load_scene).
    pub fn new(config: PushCubeConfig, backend: B, robot: R) -> Result<Self, PushCubeError> {
        config.validate()?;
        if robot.uid() != config.robot_uids {
            return Err(ConfigError::Unsupported {
                kind: "robot",
                value: robot.uid().to_string(),
            }
            .into());
        }
        if robot.dof() != REST_QPOS.len() {
            return Err(SimError::LengthMismatch {
                what: "robot dof",
                expected: REST_QPOS.len(),
                got: robot.dof(),
            }
            .into());
        }
        if backend.num_envs() != config.num_envs {
            return Err(ConfigError::InvalidValue {
                field: "push_cube.num_envs".into(),
                message: format!(
                    "backend '{}' has {} slots, config asks for {}",
                    backend.name(),
                    backend.num_envs(),
                    config.num_envs
                ),
            }
            .into());
        }

        let camera_sampler = CameraPoseSampler::new(
            config.base_camera_settings,
            &config.domain_randomization_config,
            config.domain_randomization,
        );
        let controller =
            JointPositionController::new(config.control_mode, robot.joint_limits(), config.num_envs);
        let greenscreen = GreenscreenOverlay::new(config.greenscreen_overlay_path.as_deref());
        let seeds = SeedHierarchy::default();
        Ok(Self {
            episode_rng: seeds.batched("episode", config.num_envs),
            camera_rng: seeds.rng("camera"),
            config,
            backend,
            robot,
            controller,
            camera_sampler,
            greenscreen,
            scene: None,
        })
    }

    // -- Accessors -----------------------------------------------------------

    #[must_use]
    pub const fn config(&self) -> &PushCubeConfig {
        &self.config
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[must_use]
    pub const fn robot(&self) -> &R {
        &self.robot
    }

    #[must_use]
    pub const fn controller(&self) -> &JointPositionController {
        &self.controller
    }

    #[must_use]
    pub const fn camera_sampler(&self) -> &CameraPoseSampler {
        &self.camera_sampler
    }

    #[must_use]
    pub const fn greenscreen(&self) -> &GreenscreenOverlay {
        &self.greenscreen
    }

    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.scene.is_some()
    }

    /// The built scene, or [`SimError::SceneNotLoaded`].
    pub fn scene(&self) -> Result<&LoadedScene, SimError> {
        self.scene.as_ref().ok_or(SimError::SceneNotLoaded)
    }

    #[must_use]
    pub fn action_space(&self) -> ActionSpace {
        self.controller.action_space()
    }

    /// Restart the episode and per-step camera generators from `seed`.
    /// Load-time draws are not affected.
    pub fn reseed(&mut self, seed: u64) {
        let seeds = SeedHierarchy::new(seed);
        self.episode_rng = seeds.batched("episode", self.config.num_envs);
        self.camera_rng = seeds.rng("camera");
    }

    /// `n` camera mount poses drawn from the per-step generator.
    #[must_use]
    pub fn sample_camera_poses(&mut self, n: usize) -> Vec<Pose> {
        self.camera_sampler.sample(n, &mut self.camera_rng)
    }

    fn all_slots(&self) -> Vec<usize> {
        (0..self.config.num_envs).collect()
    }

    fn check_slots(&self, env_idx: &[usize]) -> Result<(), SimError> {
        if let Some(slot) = env_idx.iter().find(|s| **s >= self.config.num_envs) {
            return Err(SimError::SlotOutOfRange {
                slot: *slot,
                num_envs: self.config.num_envs,
            });
        }
        Ok(())
    }

    // -- Loading -------------------------------------------------------------

    fn build_cubes(&mut self, cubes: &CubeProperties) -> Result<ActorId, SimError> {
        let parts = (0..cubes.len())
            .map(|slot| {
                let half = Vec3::splat(cubes.half_sizes[slot]);
                self.backend.build_actor(
                    ActorDesc::new(format!("cube-{slot}"))
                        .with_box_collision(
                            half,
                            PhysicalMaterial::new(cubes.frictions[slot], 0.0),
                            CUBE_DENSITY,
                        )
                        .with_box_visual(half, cubes.colors[slot])
                        .with_initial_pose(Pose::from_translation(Vec3::new(0.0, 0.0, half.z)))
                        .with_scene_idxs(vec![slot]),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.backend.merge_actors(&parts, "cube")
    }

    fn apply_robot_colors(&mut self, plan: &RobotColorPlan) -> Result<(), SimError> {
        let links = self.robot.links();
        match plan {
            RobotColorPlan::Keep => {}
            RobotColorPlan::Uniform(color) => {
                for slot in 0..self.config.num_envs {
                    for link in &links {
                        self.robot.set_link_color(slot, *link, *color)?;
                    }
                }
            }
            RobotColorPlan::PerSlot(colors) => {
                for (slot, slot_colors) in colors.iter().enumerate() {
                    for (link, color) in links.iter().zip(slot_colors) {
                        self.robot.set_link_color(slot, *link, *color)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn load_lighting(&mut self, ambient: &AmbientLighting) -> Result<(), SimError> {
        for slot in 0..self.config.num_envs {
            if let Some(rgb) = ambient.color(slot) {
                self.backend.set_ambient_light(slot, rgb)?;
            }
        }
        self.backend.add_directional_light(
            DirectionalLight::new(Vec3::new(1.0, 1.0, -1.0)).with_shadow(5.0, 2048),
        );
        self.backend
            .add_directional_light(DirectionalLight::new(Vec3::new(0.0, 0.0, -1.0)));
        Ok(())
    }

    // -- Stepping ------------------------------------------------------------

    /// Apply one control step: camera jitter, controller targets, then
    /// `sim_freq / control_freq` physics substeps.
    pub fn step_control(&mut self, actions: &[Action]) -> Result<(), PushCubeError> {
        self.scene()?;
        self.before_control_step()?;
        let targets = self.controller.set_action(actions, &self.robot.qpos())?;
        let all = self.all_slots();
        self.robot.set_drive_targets(&all, &targets)?;
        let dt = self.config.sim.sim_dt();
        for _ in 0..self.config.sim.substeps() {
            self.robot.advance(dt);
            self.backend.step(dt);
        }
        Ok(())
    }

    /// Reward per slot according to the configured [`RewardMode`].
    pub fn compute_reward(&self, info: &EvalInfo) -> Result<Vec<f32>, PushCubeError> {
        match self.config.reward_mode {
            RewardMode::Sparse => Ok(info
                .success
                .iter()
                .map(|s| if *s { 1.0 } else { 0.0 })
                .collect()),
            RewardMode::Dense => self.compute_dense_reward(info),
            RewardMode::NormalizedDense => self.compute_normalized_dense_reward(info),
            RewardMode::None => Ok(vec![0.0; self.config.num_envs]),
        }
    }

    /// Flat observation per slot for the configured observation mode.
    pub fn observations(&self, info: &EvalInfo) -> Result<Vec<Observation>, PushCubeError> {
        if self.config.obs_mode.is_empty() {
            return Ok(vec![Observation::new(Vec::new()); self.config.num_envs]);
        }
        let obs = self.observe(info)?;
        Ok((0..self.config.num_envs).map(|slot| obs.flatten(slot)).collect())
    }
}

impl<B: SimulationBackend, R: RobotAgent> TaskEnvironment for PushCubeEnv<B, R> {
    fn num_envs(&self) -> usize {
        self.config.num_envs
    }

    fn load_scene(&mut self, seed: u64) -> Result<(), PushCubeError> {
        if self.scene.is_some() {
            return Err(SimError::SceneAlreadyLoaded.into());
        }
        let num_envs = self.config.num_envs;
        let randomize = self.config.domain_randomization;
        let dr = self.config.domain_randomization_config.clone();
        info!(seed, num_envs, randomize, "loading push-cube scene");

        let mut load_rng = SeedHierarchy::new(seed).batched("load", num_envs);
        let cube_randomizer =
            CubeRandomizer::from_config(&dr).map_err(|e| ConfigError::InvalidValue {
                field: "push_cube.domain_randomization_config".into(),
                message: e.to_string(),
            })?;
        let cube_properties = if randomize {
            cube_randomizer.sample(&mut load_rng)
        } else {
            cube_randomizer.nominal(num_envs)
        };
        let robot_colors = RobotColorPlan::resolve(
            dr.robot_color,
            randomize,
            self.robot.links().len(),
            &mut load_rng,
        );

        self.robot.load(
            num_envs,
            robot_base_pose(),
            robot_colors.needs_separate_build(),
        )?;
        let table = TableScene::build(&mut self.backend)?;
        let cube = self.build_cubes(&cube_properties)?;
        let goal_region = self.backend.build_actor(
            ActorDesc::new("goal_region")
                .with_cylinder_visual(GOAL_RADIUS, GOAL_HALF_LENGTH, Rgba::WHITE)
                .with_body_type(BodyType::Kinematic)
                .with_initial_pose(Pose::from_translation(Vec3::new(0.0, 0.0, GOAL_HEIGHT))),
        )?;
        let camera_mount = self.backend.build_actor(
            ActorDesc::new("camera_mount")
                .with_body_type(BodyType::Kinematic)
                .with_initial_pose(self.camera_sampler.fixed_pose()),
        )?;
        self.apply_robot_colors(&robot_colors)?;

        let fovs = self.camera_sampler.sample_fovs(&mut load_rng);
        let ambient = AmbientLighting::plan(randomize, dr.randomize_lighting, &mut load_rng);
        self.load_lighting(&ambient)?;

        self.greenscreen
            .keep(KeptObject::Robot(self.robot.uid().to_string()));
        self.greenscreen.keep(KeptObject::Actor(cube));

        self.scene = Some(LoadedScene {
            seed,
            table,
            cube,
            goal_region,
            camera_mount,
            cube_properties,
            ambient,
            robot_colors,
            sensors: vec![base_camera_config(fovs, camera_mount)],
            human_render_camera: render_camera_config(self.camera_sampler.settings(), num_envs),
        });
        self.reseed(seed);
        debug!(cube = cube.0, goal = goal_region.0, mount = camera_mount.0, "scene loaded");
        Ok(())
    }

    fn initialize_episode(&mut self, env_idx: &[usize]) -> Result<(), PushCubeError> {
        self.check_slots(env_idx)?;
        let scene = self.scene()?.clone();
        scene.table.initialize(&mut self.backend, env_idx)?;
        self.backend.set_poses(scene.table.table, env_idx, &[table_pose()])?;

        let base_poses = self.robot.base_pose();
        let noise = self.config.domain_randomization_config.initial_qpos_noise_scale;
        let [spawn_x, spawn_y] = self.config.spawn_box_pos;
        let half_extent = self.config.spawn_box_half_size;

        let mut qpos = Vec::with_capacity(env_idx.len());
        let mut cube_poses = Vec::with_capacity(env_idx.len());
        let mut goal_poses = Vec::with_capacity(env_idx.len());
        let mut mount_poses = Vec::with_capacity(env_idx.len());
        for slot in env_idx {
            let rng = &mut self.episode_rng[*slot];
            qpos.push(
                REST_QPOS
                    .iter()
                    .map(|q| q + sample_normal(rng, 0.0, noise))
                    .collect::<Vec<_>>(),
            );

            let center = base_poses
                .get(*slot)
                .map_or(Vec3::ZERO, |pose| pose.p)
                + Vec3::new(spawn_x, spawn_y, 0.0);
            let x = center.x + sample_uniform(rng, -half_extent, half_extent);
            let y = center.y + sample_uniform(rng, -half_extent, half_extent);
            let yaw = sample_uniform(rng, -PI, PI);
            let cube_p = Vec3::new(x, y, scene.cube_properties.half_sizes[*slot]);
            cube_poses.push(Pose::from_yaw(cube_p, yaw));

            let mut goal_p = cube_p + Vec3::new(GOAL_OFFSET + GOAL_RADIUS, 0.0, 0.0);
            goal_p.z = GOAL_HEIGHT;
            goal_poses.push(Pose::new(goal_p, goal_rotation()));

            mount_poses.extend(self.camera_sampler.sample(1, rng));
        }

        self.robot.set_qpos(env_idx, &qpos)?;
        self.robot.set_base_pose(env_idx, robot_base_pose())?;
        self.backend.set_poses(scene.cube, env_idx, &cube_poses)?;
        self.backend
            .set_poses(scene.goal_region, env_idx, &goal_poses)?;
        self.backend
            .set_poses(scene.camera_mount, env_idx, &mount_poses)?;
        self.controller.reset(env_idx, &qpos)?;
        debug!(slots = ?env_idx, "initialized episodes");
        Ok(())
    }

    fn before_control_step(&mut self) -> Result<(), PushCubeError> {
        if !self.camera_sampler.is_randomized() {
            return Ok(());
        }
        let mount = self.scene()?.camera_mount;
        let poses = self.sample_camera_poses(self.config.num_envs);
        let all = self.all_slots();
        self.backend.set_poses(mount, &all, &poses)?;
        if self.backend.is_gpu() {
            self.backend.sync_gpu_state();
        }
        Ok(())
    }

    fn obs_agent(&self) -> Result<AgentObs, PushCubeError> {
        Ok(AgentObs {
            qpos: self.robot.qpos(),
            controller: self.controller.state().map(<[Vec<f32>]>::to_vec),
        })
    }

    fn obs_extra(&self, _info: &EvalInfo) -> Result<ExtraObs, PushCubeError> {
        let scene = self.scene()?;
        let tcp_pos = self.robot.tcp_pos();
        let cube_poses = self.backend.poses(scene.cube)?;
        let tcp_to_obj = cube_poses
            .iter()
            .zip(&tcp_pos)
            .map(|(cube, tcp)| cube.p - *tcp)
            .collect();
        let (obj_pose, goal_pos) = if self.config.obs_mode.includes_state() {
            let goals = self.backend.poses(scene.goal_region)?;
            (Some(cube_poses), Some(goals.iter().map(|g| g.p).collect()))
        } else {
            (None, None)
        };
        Ok(ExtraObs {
            tcp_pos,
            tcp_to_obj,
            obj_pose,
            goal_pos,
        })
    }

    fn evaluate(&self) -> Result<EvalInfo, PushCubeError> {
        let scene = self.scene()?;
        let cubes = self.backend.poses(scene.cube)?;
        let goals = self.backend.poses(scene.goal_region)?;
        let qvel = self.robot.qvel();
        let success = cubes
            .iter()
            .zip(&goals)
            .zip(&qvel)
            .map(|((cube, goal), qvel)| {
                let in_region = cube.xy().distance(goal.xy()) < GOAL_RADIUS;
                let speed = qvel.iter().map(|v| v * v).sum::<f32>().sqrt();
                in_region && speed < STATIC_QVEL
            })
            .collect();

        let (finger1, finger2) = self.robot.finger_links();
        let table = scene.table.table;
        let left = self
            .backend
            .pairwise_contact_forces(finger1.into(), table.into())?;
        let right = self
            .backend
            .pairwise_contact_forces(finger2.into(), table.into())?;
        let touching_table = left
            .iter()
            .zip(&right)
            .map(|(l, r)| l.length() >= CONTACT_FORCE || r.length() >= CONTACT_FORCE)
            .collect();

        Ok(EvalInfo {
            success,
            touching_table,
        })
    }

    fn compute_dense_reward(&self, info: &EvalInfo) -> Result<Vec<f32>, PushCubeError> {
        let scene = self.scene()?;
        let cubes = self.backend.poses(scene.cube)?;
        let goals = self.backend.poses(scene.goal_region)?;
        let tcp = self.robot.tcp_pos();
        Ok((0..self.config.num_envs)
            .map(|slot| {
                if info.success.get(slot).copied().unwrap_or(false) {
                    return SUCCESS_REWARD;
                }
                let half = scene.cube_properties.half_sizes[slot];
                let reach_target = cubes[slot].p - Vec3::new(half + REACH_GAP, 0.0, 0.0);
                let reaching = reach_target.distance(tcp[slot]);
                let mut reward = 1.0 - (5.0 * reaching).tanh();
                if reaching < REACH_THRESHOLD {
                    let obj_dist = cubes[slot].xy().distance(goals[slot].xy());
                    reward += 1.0 - (5.0 * obj_dist).tanh();
                }
                if info.touching_table.get(slot).copied().unwrap_or(false) {
                    reward -= TABLE_PENALTY;
                }
                reward
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
