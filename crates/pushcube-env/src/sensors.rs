//! Camera sensor configs and the greenscreen overlay record.
//!
//! Images are produced by the rendering side of the simulation backend;
//! this module only describes the cameras the task asks for.

use std::path::{Path, PathBuf};

use pushcube_core::types::Pose;
use pushcube_domain_rand::camera::BaseCameraSettings;
use pushcube_sim::actor::ActorId;
use tracing::warn;

pub const BASE_CAMERA_UID: &str = "base_camera";
pub const RENDER_CAMERA_UID: &str = "render_camera";

const BASE_CAMERA_RESOLUTION: u32 = 128;
const RENDER_CAMERA_RESOLUTION: u32 = 512;
const NEAR: f32 = 0.01;
const FAR: f32 = 100.0;

// ---------------------------------------------------------------------------
// CameraConfig
// ---------------------------------------------------------------------------

/// One pinhole camera, batched over slots.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub uid: &'static str,
    /// Pose relative to `mount`, or in the world when unmounted.
    pub pose: Pose,
    pub width: u32,
    pub height: u32,
    /// Vertical field of view in radians, one per slot.
    pub fov: Vec<f32>,
    pub near: f32,
    pub far: f32,
    pub mount: Option<ActorId>,
}

impl CameraConfig {
    /// Field of view of one slot.
    #[must_use]
    pub fn fov(&self, slot: usize) -> Option<f32> {
        self.fov.get(slot).copied()
    }
}

/// Observation camera attached to the camera mount, with per-slot fov.
#[must_use]
pub fn base_camera_config(fovs: Vec<f32>, mount: ActorId) -> CameraConfig {
    CameraConfig {
        uid: BASE_CAMERA_UID,
        pose: Pose::IDENTITY,
        width: BASE_CAMERA_RESOLUTION,
        height: BASE_CAMERA_RESOLUTION,
        fov: fovs,
        near: NEAR,
        far: FAR,
        mount: Some(mount),
    }
}

/// Visualization camera at the nominal base camera viewpoint.
#[must_use]
pub fn render_camera_config(settings: &BaseCameraSettings, num_envs: usize) -> CameraConfig {
    CameraConfig {
        uid: RENDER_CAMERA_UID,
        pose: settings.nominal_pose(),
        width: RENDER_CAMERA_RESOLUTION,
        height: RENDER_CAMERA_RESOLUTION,
        fov: vec![settings.fov; num_envs],
        near: NEAR,
        far: FAR,
        mount: None,
    }
}

// ---------------------------------------------------------------------------
// Greenscreen
// ---------------------------------------------------------------------------

/// How camera images are composited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayMode {
    None,
    /// Replace everything but the kept objects with the image at `path`.
    Image { camera: &'static str, path: PathBuf },
}

/// Objects rendered on top of the greenscreen image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeptObject {
    Robot(String),
    Actor(ActorId),
}

/// Greenscreen overlay settings for the base camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreenscreenOverlay {
    mode: OverlayMode,
    kept: Vec<KeptObject>,
}

impl GreenscreenOverlay {
    /// Overlay for `path`; with no path the overlay is disabled and a
    /// warning is logged.
    #[must_use]
    pub fn new(path: Option<&Path>) -> Self {
        let mode = match path {
            Some(path) => OverlayMode::Image {
                camera: BASE_CAMERA_UID,
                path: path.to_path_buf(),
            },
            None => {
                warn!("No greenscreen overlay path provided, no greenscreen will be used");
                OverlayMode::None
            }
        };
        Self {
            mode,
            kept: Vec::new(),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> &OverlayMode {
        &self.mode
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self.mode, OverlayMode::Image { .. })
    }

    /// Exclude `object` from greenscreening.
    pub fn keep(&mut self, object: KeptObject) {
        if !self.kept.contains(&object) {
            self.kept.push(object);
        }
    }

    #[must_use]
    pub fn kept(&self) -> &[KeptObject] {
        &self.kept
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
