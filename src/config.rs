use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Result, ensure};
use serde::Deserialize;

use crate::params::RenderParams;

/// Top-level viewer configuration, loaded from YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Address the sync channel listens on for the embedding host.
    pub listen_addr: SocketAddr,
    /// Correlation identifier echoed in `quiltsComplete` batches.
    pub viewer_id: String,
    /// Base URL for resolving image references; the host's `init` message
    /// overrides this at runtime.
    pub api_url: Option<String>,
    pub window_title: String,
    /// Initial parameter values, matching the host panel defaults.
    pub defaults: ParameterDefaults,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ParameterDefaults {
    pub depth_strength: f32,
    pub dof_strength: f32,
    pub focus_distance: f32,
    pub z_offset: f32,
    pub camera_fov: f32,
    pub quilts_num: u32,
    pub quilts_angle_range: f32,
    pub screenshot_size: u32,
}

impl Default for ParameterDefaults {
    fn default() -> Self {
        let p = RenderParams::default();
        Self {
            depth_strength: p.depth_strength,
            dof_strength: p.dof_strength,
            focus_distance: p.focus_distance,
            z_offset: p.z_offset,
            camera_fov: p.camera_fov,
            quilts_num: p.quilts_num,
            quilts_angle_range: p.quilts_angle_range,
            screenshot_size: p.screenshot_size,
        }
    }
}

impl ParameterDefaults {
    pub fn to_params(&self) -> RenderParams {
        RenderParams {
            depth_strength: self.depth_strength,
            dof_strength: self.dof_strength,
            focus_distance: self.focus_distance,
            z_offset: self.z_offset,
            camera_fov: self.camera_fov,
            quilts_num: self.quilts_num,
            quilts_angle_range: self.quilts_angle_range,
            screenshot_size: self.screenshot_size,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9473)),
            viewer_id: "0".to_string(),
            api_url: None,
            window_title: "Depth Quilt Viewer".to_string(),
            defaults: ParameterDefaults::default(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde
    /// defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(!self.viewer_id.is_empty(), "viewer-id must not be empty");
        let d = &self.defaults;
        ensure!(d.quilts_num >= 1, "defaults.quilts-num must be >= 1");
        ensure!(
            d.quilts_angle_range > 0.0,
            "defaults.quilts-angle-range must be positive"
        );
        ensure!(
            (5.0..=120.0).contains(&d.camera_fov),
            "defaults.camera-fov must be within [5, 120]"
        );
        ensure!(
            d.screenshot_size >= 64,
            "defaults.screenshot-size must be at least 64 pixels"
        );
        if let Some(url) = &self.api_url {
            ensure!(!url.is_empty(), "api-url must not be empty when set");
        }
        Ok(self)
    }
}
