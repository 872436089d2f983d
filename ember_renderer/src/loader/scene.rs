/// JSON scene description
///
/// ```json
/// { "pipelines": [ {
///     "pipeline": "PBRMetalness",
///     "vertex file": "shaders/pbr.vert.spv",
///     "fragment file": "shaders/pbr.frag.spv",
///     "objects": [ { "file": "models/vehicle.obj", "winding": true,
///                    "translation": [0, 0, 0], "rotation angle": 90,
///                    "rotation axis": [0, 1, 0], "scale": [1, 1, 1] } ],
///     "texture files": ["diffuse.png", "normal.png", "metalness.png", "roughness.png"]
/// } ] }
/// ```
///
/// Relative file names are resolved against the directory of the scene file.

use std::path::{Path, PathBuf};
use glam::{Mat4, Quat, Vec3};
use serde::Deserialize;
use crate::error::Result;
use crate::pipeline::PbrKind;
use crate::loader::{parse_json, read_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PipelineKind {
    #[serde(rename = "PBRMetalness")]
    PbrMetalness,
    #[serde(rename = "PBRSpecular")]
    PbrSpecular,
}

impl From<PipelineKind> for PbrKind {
    fn from(kind: PipelineKind) -> Self {
        match kind {
            PipelineKind::PbrMetalness => PbrKind::Metalness,
            PipelineKind::PbrSpecular => PbrKind::Specular,
        }
    }
}

fn unit_scale() -> [f32; 3] {
    [1.0; 3]
}

fn y_axis() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}

/// One mesh placed in the world
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectRecord {
    pub file: PathBuf,
    /// Flip triangle winding while loading
    #[serde(default)]
    pub winding: bool,
    #[serde(default)]
    pub translation: [f32; 3],
    /// Degrees
    #[serde(rename = "rotation angle", default)]
    pub rotation_angle: f32,
    #[serde(rename = "rotation axis", default = "y_axis")]
    pub rotation_axis: [f32; 3],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
}

impl ObjectRecord {
    /// Translation · rotation · scale
    pub fn model_matrix(&self) -> Mat4 {
        let rotation = match Vec3::from(self.rotation_axis).try_normalize() {
            Some(axis) => Quat::from_axis_angle(axis, self.rotation_angle.to_radians()),
            None => Quat::IDENTITY,
        };
        Mat4::from_scale_rotation_translation(Vec3::from(self.scale), rotation, Vec3::from(self.translation))
    }
}

/// One pipeline with its shaders, objects and texture maps
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineRecord {
    #[serde(rename = "pipeline")]
    pub kind: PipelineKind,
    #[serde(rename = "vertex file")]
    pub vertex_file: PathBuf,
    #[serde(rename = "fragment file")]
    pub fragment_file: PathBuf,
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
    #[serde(rename = "texture files", default)]
    pub texture_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneDescription {
    pub pipelines: Vec<PipelineRecord>,
}

impl SceneDescription {
    pub fn from_json_str(json: &str) -> Result<Self> {
        parse_json(json, Path::new("<memory>"))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }
}

/// `file` as-is when absolute, otherwise relative to `base_dir`
pub fn resolve(base_dir: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        base_dir.join(file)
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
