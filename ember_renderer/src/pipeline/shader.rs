/// SPIR-V shader code loaded from disk

use std::path::{Path, PathBuf};
use crate::error::{Error, Result};

/// First word of every little-endian SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Entry point every stage is compiled with
pub const ENTRY_POINT: &str = "main";

/// Validated SPIR-V words plus the file they came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCode {
    words: Vec<u32>,
    origin: PathBuf,
}

impl ShaderCode {
    /// Read a compiled `.spv` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_bytes(&bytes, path.to_path_buf())
    }

    /// Validate raw bytes; `origin` names the source in errors
    pub fn from_bytes(bytes: &[u8], origin: PathBuf) -> Result<Self> {
        if bytes.is_empty() || bytes.len() % 4 != 0 {
            return Err(Error::Parse {
                path: origin,
                line: None,
                message: format!("SPIR-V size {} is not a non-zero multiple of 4", bytes.len()),
            });
        }

        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        if words[0] != SPIRV_MAGIC {
            return Err(Error::Parse {
                path: origin,
                line: None,
                message: format!("Bad SPIR-V magic {:#010x}", words[0]),
            });
        }
        Ok(Self { words, origin })
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
