//! Live render parameters shared between the sync channel and the renderer.
//!
//! All values are plain scalars applied in place; the renderer reads them
//! every frame. The displacement scale and the mesh resting position are
//! derived here so the shader, the camera reset and the tests agree on one
//! definition.

use crate::events::UpdateParams;

/// Multiplier from the host's depth-strength slider to the shader's
/// displacement scale.
pub const DEPTH_SCALE_FACTOR: f32 = 5.0;

/// Camera distance at 90 degrees FOV, before compensation.
pub const BASE_CAMERA_DISTANCE: f32 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    /// Displacement strength, host range [0, 2].
    pub depth_strength: f32,
    /// Depth-of-field strength, host range [0, 1].
    pub dof_strength: f32,
    /// Normalized in-focus depth, host range [0, 1].
    pub focus_distance: f32,
    /// Mesh pivot offset along the view axis, host range [-5, 5].
    pub z_offset: f32,
    /// Vertical field of view in degrees, host range [5, 120].
    pub camera_fov: f32,
    /// Frames per quilt capture, host range [1, 48].
    pub quilts_num: u32,
    /// Total angular span of a quilt in degrees, host range [2, 180].
    pub quilts_angle_range: f32,
    /// Capture edge length in pixels (the host maps its 0-3 slider to
    /// 512 * 2^index before sending).
    pub screenshot_size: u32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            depth_strength: 1.5,
            dof_strength: 0.5,
            focus_distance: 0.95,
            z_offset: 0.0,
            camera_fov: 7.0,
            quilts_num: 4,
            quilts_angle_range: 14.0,
            screenshot_size: 1024,
        }
    }
}

impl RenderParams {
    /// Displacement scale fed to the vertex shader.
    pub fn depth_scale(&self) -> f32 {
        DEPTH_SCALE_FACTOR * self.depth_strength
    }

    /// Largest displacement a unit depth sample can produce.
    pub fn max_displacement(&self) -> f32 {
        self.depth_scale() * 0.5
    }

    /// Resting position of the mesh along the view axis. The recentering
    /// term keeps the relief centered on the focus plane as the strength
    /// changes.
    pub fn resting_z(&self) -> f32 {
        self.z_offset - self.depth_strength * 2.5
    }

    /// Apply the scalar fields of an `update` message. All fields present in
    /// one message land before the next frame reads the struct.
    pub fn apply_update(&mut self, update: &UpdateParams) {
        if let Some(v) = update.depth_strength {
            self.depth_strength = v;
        }
        if let Some(v) = update.dof_strength {
            self.dof_strength = v;
        }
        if let Some(v) = update.focus_distance {
            self.focus_distance = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::UpdateParams;

    #[test]
    fn resting_z_tracks_offset_and_strength() {
        let mut p = RenderParams {
            depth_strength: 1.0,
            z_offset: 0.0,
            ..RenderParams::default()
        };
        assert!((p.resting_z() - (-2.5)).abs() < 1e-6);

        p.z_offset = 3.0;
        assert!((p.resting_z() - 0.5).abs() < 1e-6);

        // Increasing strength with the offset held moves the mesh strictly
        // further along the offset axis.
        let before = p.resting_z();
        p.depth_strength = 2.0;
        assert!(p.resting_z() < before);
    }

    #[test]
    fn update_applies_all_present_fields() {
        let mut p = RenderParams::default();
        p.apply_update(&UpdateParams {
            depth_strength: Some(1.0),
            dof_strength: Some(0.0),
            focus_distance: Some(0.5),
        });
        assert_eq!(p.depth_strength, 1.0);
        assert_eq!(p.dof_strength, 0.0);
        assert_eq!(p.focus_distance, 0.5);

        // Absent fields leave previous values untouched.
        p.apply_update(&UpdateParams {
            depth_strength: None,
            dof_strength: Some(0.7),
            focus_distance: None,
        });
        assert_eq!(p.depth_strength, 1.0);
        assert_eq!(p.dof_strength, 0.7);
        assert_eq!(p.focus_distance, 0.5);
    }

    #[test]
    fn depth_scale_is_five_times_strength() {
        let p = RenderParams {
            depth_strength: 1.5,
            ..RenderParams::default()
        };
        assert!((p.depth_scale() - 7.5).abs() < 1e-6);
    }
}
