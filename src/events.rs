//! Message types crossing task boundaries.
//!
//! `SyncMessage` is the wire protocol spoken with the embedding host: one
//! closed variant per message kind, decoded once at the socket boundary so
//! the viewer dispatches on an exhaustive match instead of string tags.
//! The field names follow the host's JSON exactly.

use serde::{Deserialize, Serialize};

/// Opaque descriptor for a source image; the fields become query parameters
/// of the retrieval URL built against the `init` base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfolder: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ImageRef {
    /// Lowercased extension of the referenced file, if any.
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.filename.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }

    /// Only png/jpg/jpeg are loadable; everything else is silently skipped.
    pub fn is_supported(&self) -> bool {
        matches!(
            self.extension().as_deref(),
            Some("png") | Some("jpg") | Some("jpeg")
        )
    }
}

/// Scalar fields of an `update` message. Fields absent from the JSON leave
/// the current value in place; fields present are applied atomically before
/// the next frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_strength: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dof_strength: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_distance: Option<f32>,
}

/// Inbound host messages, tagged by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncMessage {
    #[serde(rename = "init")]
    Init {
        #[serde(rename = "apiURL")]
        api_url: String,
    },
    #[serde(rename = "update", rename_all = "camelCase")]
    Update {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference_image: Option<ImageRef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        depth_map: Option<ImageRef>,
        #[serde(flatten)]
        params: UpdateParams,
    },
    #[serde(rename = "resetView", rename_all = "camelCase")]
    ResetView { depth_strength: f32 },
    #[serde(rename = "updateZOffset")]
    UpdateZOffset { value: f32 },
    #[serde(rename = "updateCameraFOV")]
    UpdateCameraFov { value: f32 },
    #[serde(rename = "updateQuiltsNum")]
    UpdateQuiltsNum { value: u32 },
    #[serde(rename = "updateQuiltsAngleRange")]
    UpdateQuiltsAngleRange { value: f32 },
    #[serde(rename = "updateScreenshotSize")]
    UpdateScreenshotSize { value: u32 },
    #[serde(rename = "toggleQuilts")]
    ToggleQuilts,
    #[serde(rename = "screenshot")]
    Screenshot,
}

/// Outbound batch of captured frames, correlated to this viewer instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "quiltsComplete")]
pub struct QuiltsComplete {
    /// PNG data URIs in capture order.
    pub imgs: Vec<String>,
    pub id: String,
}

/// Viewer -> loader: resolve and decode a color/depth pair.
#[derive(Debug, Clone)]
pub struct LoadSources {
    pub api_url: String,
    pub reference_image: ImageRef,
    pub depth_map: ImageRef,
    /// Monotonic counter; a result older than the last applied generation is
    /// dropped so a slow fetch never clobbers a newer pair.
    pub generation: u64,
}

/// A decoded RGBA8 image ready for GPU upload.
#[derive(Debug, Clone)]
pub struct PreparedImageCpu {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Loader -> viewer: both sources decoded successfully.
#[derive(Debug)]
pub struct SourcesLoaded {
    pub color: PreparedImageCpu,
    pub depth: PreparedImageCpu,
    pub generation: u64,
}
