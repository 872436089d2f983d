/// Renderer configuration
///
/// Every field has a default, so a config file only needs to name what it
/// changes. Load with `from_file` or `from_json_str`, then `validate()`.

use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::device::{ClearValue, Format};
use crate::loader::{parse_json, read_json};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Number of frames recorded ahead of the GPU
    pub max_frames_in_flight: usize,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: u32,
    /// Timeout for every fence wait, in nanoseconds
    pub fence_timeout_ns: u64,
    pub enable_anisotropy: bool,
    /// Depth formats to try, most preferred first
    pub depth_format_candidates: Vec<Format>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_frames_in_flight: 2,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_depth: 1.0,
            clear_stencil: 0,
            fence_timeout_ns: u64::MAX,
            enable_anisotropy: true,
            depth_format_candidates: vec![
                Format::D32_SFLOAT,
                Format::D32_SFLOAT_S8_UINT,
                Format::D24_UNORM_S8_UINT,
            ],
        }
    }
}

impl RendererConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        parse_json(json, Path::new("<memory>"))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_frames_in_flight == 0 {
            return Err(Error::InvalidState("max_frames_in_flight must be at least 1".to_string()));
        }
        if self.depth_format_candidates.is_empty() {
            return Err(Error::InvalidState("depth_format_candidates is empty".to_string()));
        }
        if let Some(format) = self.depth_format_candidates.iter().find(|f| !f.is_depth()) {
            return Err(Error::UnsupportedFormat(format!("{:?} is not a depth format", format)));
        }
        Ok(())
    }

    /// Clear values for a color + depth render pass, in attachment order
    pub fn clear_values(&self) -> [ClearValue; 2] {
        [
            ClearValue::Color(self.clear_color),
            ClearValue::DepthStencil { depth: self.clear_depth, stencil: self.clear_stencil },
        ]
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
