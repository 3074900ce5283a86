use std::f32::consts::{PI, TAU};

use assetview_scene::PerspectiveCamera;
use glam::Vec3;

use crate::action::PointerAction;

const EPS: f32 = 1e-6;

/// Spherical coordinates around the orbit target, Y up.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Spherical {
    radius: f32,
    /// Polar angle from +Y.
    phi: f32,
    /// Azimuth around Y, measured from +Z.
    theta: f32,
}

impl Spherical {
    fn from_offset(v: Vec3) -> Self {
        let radius = v.length();
        if radius == 0.0 {
            return Self::default();
        }
        Self {
            radius,
            phi: (v.y / radius).clamp(-1.0, 1.0).acos(),
            theta: v.x.atan2(v.z),
        }
    }

    fn to_offset(self) -> Vec3 {
        let ring = self.phi.sin() * self.radius;
        Vec3::new(
            ring * self.theta.sin(),
            self.phi.cos() * self.radius,
            ring * self.theta.cos(),
        )
    }
}

/// Damped orbit controls keeping the camera aimed at a target.
///
/// Actions accumulate into pending deltas; [`update`](Self::update) applies a
/// fraction of them each frame when damping is enabled, so motion eases out
/// over several frames after input stops.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Radians from +Y.
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    attached: bool,
    delta: Spherical,
    scale: f32,
    pan_offset: Vec3,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            enable_damping: false,
            damping_factor: 0.05,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            attached: false,
            delta: Spherical::default(),
            scale: 1.0,
            pan_offset: Vec3::ZERO,
        }
    }
}

impl OrbitControls {
    /// Undamped, unbounded controls orbiting `target`.
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    /// Ease motion out over several frames; `factor` is the share applied per update.
    pub fn with_damping(mut self, factor: f32) -> Self {
        self.enable_damping = true;
        self.damping_factor = factor;
        self
    }

    pub fn with_distance_range(mut self, min: f32, max: f32) -> Self {
        self.min_distance = min;
        self.max_distance = max;
        self
    }

    /// Polar bounds in radians from +Y.
    pub fn with_polar_range(mut self, min: f32, max: f32) -> Self {
        self.min_polar_angle = min;
        self.max_polar_angle = max;
        self
    }

    /// Start accepting pointer actions.
    pub fn attach(&mut self) {
        self.attached = true;
    }

    /// Stop accepting pointer actions and drop any pending motion.
    pub fn dispose(&mut self) {
        self.attached = false;
        self.delta = Spherical::default();
        self.scale = 1.0;
        self.pan_offset = Vec3::ZERO;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Queue an action. `viewport_height` is the render surface height in pixels.
    pub fn handle(&mut self, action: PointerAction, camera: &PerspectiveCamera, viewport_height: u32) {
        if !self.attached || action.is_noop() {
            return;
        }
        let height = viewport_height.max(1) as f32;
        match action {
            PointerAction::Rotate { dx, dy } => {
                self.delta.theta -= TAU * dx / height * self.rotate_speed;
                self.delta.phi -= TAU * dy / height * self.rotate_speed;
            }
            PointerAction::Zoom(steps) => {
                self.scale *= 0.95_f32.powf(self.zoom_speed).powf(steps);
            }
            PointerAction::Pan { dx, dy } => {
                let offset = camera.position - self.target;
                let target_distance =
                    offset.length() * (camera.fov_degrees.to_radians() / 2.0).tan();
                let forward = camera.forward();
                let right = forward.cross(Vec3::Y).normalize_or(Vec3::X);
                let up = right.cross(forward);
                let scale = 2.0 * target_distance / height * self.pan_speed;
                self.pan_offset += -right * dx * scale + up * dy * scale;
            }
        }
    }

    /// Advance one step: apply pending motion, enforce distance and polar
    /// bounds, and re-aim the camera. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let mut s = Spherical::from_offset(camera.position - self.target);

        let step = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };
        s.theta += self.delta.theta * step;
        s.phi += self.delta.phi * step;
        s.phi = s
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPS, PI - EPS);
        s.radius = (s.radius * self.scale).clamp(self.min_distance, self.max_distance);
        self.target += self.pan_offset * step;

        let previous = camera.position;
        camera.position = self.target + s.to_offset();
        camera.look_at(self.target);

        if self.enable_damping {
            self.delta.theta *= 1.0 - self.damping_factor;
            self.delta.phi *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.delta = Spherical::default();
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        let moved = previous.distance_squared(camera.position) > EPS;
        if moved {
            tracing::trace!(position = ?camera.position, "orbit camera moved");
        }
        moved
    }
}
