//! File loaders: OBJ geometry and JSON scene descriptions
//!
//! Every failure here is recoverable (`Error::Io` or `Error::Parse`).

pub mod obj;
pub mod scene;

pub use obj::{load_obj, parse_obj, ObjGeometry};
pub use scene::{ObjectRecord, PipelineKind, PipelineRecord, SceneDescription};

use std::path::Path;
use serde::de::DeserializeOwned;
use crate::error::{Error, Result};

/// Deserialize JSON text; `origin` names the source in errors
pub(crate) fn parse_json<T: DeserializeOwned>(text: &str, origin: &Path) -> Result<T> {
    serde_json::from_str(text).map_err(|e| Error::Parse {
        path: origin.to_path_buf(),
        line: Some(e.line()),
        message: e.to_string(),
    })
}

/// Read and deserialize a JSON file
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_json(&text, path)
}
