//! Orbit camera around the scene origin.
//!
//! The orbit radius is never stored: it is recomputed from the live position
//! every time it is needed, so externally driven moves (capture legs, host
//! resets) stay consistent with user orbiting.

use glam::{Mat4, Vec3};

use crate::params::BASE_CAMERA_DISTANCE;

const DAMPING: f32 = 0.05;
const ROTATE_SPEED: f32 = 0.3;
// Keep the camera off the poles so look-at stays well defined.
const PITCH_LIMIT: f32 = 1.45;

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub position: Vec3,
    /// Vertical field of view in degrees.
    pub fov_deg: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
}

impl OrbitCamera {
    pub fn new(fov_deg: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 10.0),
            fov_deg,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
        }
    }

    /// Heading around the vertical axis, degrees; 0 looks down -Z from +Z.
    pub fn heading_deg(&self) -> f32 {
        self.position.x.atan2(self.position.z).to_degrees()
    }

    /// Planar distance from the target to the camera, from the live position.
    pub fn horizontal_radius(&self) -> f32 {
        (self.position.x * self.position.x + self.position.z * self.position.z).sqrt()
    }

    /// Place the camera at `heading` degrees on the current horizontal
    /// radius, height unchanged.
    pub fn set_heading_deg(&mut self, heading: f32) {
        let radius = self.horizontal_radius();
        let radians = heading.to_radians();
        self.position.x = radians.sin() * radius;
        self.position.z = radians.cos() * radius;
    }

    /// Accumulate a user drag into the damped orbit velocities.
    pub fn apply_drag(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw_velocity += delta_yaw * ROTATE_SPEED;
        self.pitch_velocity += delta_pitch * ROTATE_SPEED;
    }

    /// Advance the damped orbit one frame.
    pub fn update(&mut self) {
        if self.yaw_velocity.abs() < 1e-5 && self.pitch_velocity.abs() < 1e-5 {
            return;
        }
        self.orbit(self.yaw_velocity, self.pitch_velocity);
        self.yaw_velocity *= 1.0 - DAMPING;
        self.pitch_velocity *= 1.0 - DAMPING;
    }

    /// Rotate the position about the origin, preserving distance.
    pub fn orbit(&mut self, delta_yaw_deg: f32, delta_pitch_deg: f32) {
        let radius = self.position.length().max(1e-4);
        let mut yaw = self.position.x.atan2(self.position.z);
        let mut pitch = (self.position.y / radius).clamp(-1.0, 1.0).asin();

        yaw += delta_yaw_deg.to_radians();
        pitch = (pitch + delta_pitch_deg.to_radians()).clamp(-PITCH_LIMIT, PITCH_LIMIT);

        self.position = Vec3::new(
            pitch.cos() * yaw.sin() * radius,
            pitch.sin() * radius,
            pitch.cos() * yaw.cos() * radius,
        );
    }

    /// Deterministic home position compensating for FOV and depth settings.
    ///
    /// The 1/tan(fov/2) factor keeps apparent framing constant as the FOV
    /// changes; half the maximum displacement plus the Z offset keeps the
    /// relief inside the frame.
    pub fn reset_home(&mut self, depth_strength: f32, z_offset: f32) {
        let max_displacement = 2.5 * depth_strength;
        let fov_compensation = 1.0 / (self.fov_deg.to_radians() / 2.0).tan();
        let distance = BASE_CAMERA_DISTANCE * fov_compensation + max_displacement * 0.5 + z_offset;
        self.position = Vec3::new(0.0, 0.0, distance);
        self.yaw_velocity = 0.0;
        self.pitch_velocity = 0.0;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_deg.to_radians(), aspect.max(1e-4), 0.1, 1000.0)
    }
}
