/// Image, view and sampler types

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::device::GraphicsDevice;

/// Pixel formats used by the renderer
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    D32_SFLOAT,
    D32_SFLOAT_S8_UINT,
    D24_UNORM_S8_UINT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
}

impl Format {
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            Format::D32_SFLOAT | Format::D32_SFLOAT_S8_UINT | Format::D24_UNORM_S8_UINT
        )
    }

    /// Four 8-bit colour channels, the layout `ImageData` pixels use
    pub fn is_rgba8_color(&self) -> bool {
        matches!(
            self,
            Format::R8G8B8A8_SRGB | Format::R8G8B8A8_UNORM | Format::B8G8R8A8_SRGB | Format::B8G8R8A8_UNORM
        )
    }

    pub fn has_stencil(&self) -> bool {
        matches!(self, Format::D32_SFLOAT_S8_UINT | Format::D24_UNORM_S8_UINT)
    }

    /// Size in bytes of one texel or vertex element
    pub fn size_bytes(&self) -> u32 {
        match self {
            Format::R8G8B8A8_SRGB
            | Format::R8G8B8A8_UNORM
            | Format::B8G8R8A8_SRGB
            | Format::B8G8R8A8_UNORM
            | Format::D32_SFLOAT
            | Format::D24_UNORM_S8_UINT => 4,
            Format::D32_SFLOAT_S8_UINT | Format::R32G32_SFLOAT => 8,
            Format::R32G32B32_SFLOAT => 12,
            Format::R32G32B32A32_SFLOAT => 16,
        }
    }
}

/// Image layouts known to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    TransferDstOptimal,
    ShaderReadOnlyOptimal,
    DepthStencilAttachmentOptimal,
    ColorAttachmentOptimal,
    PresentSrc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTiling {
    Optimal,
    Linear,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 0x0000_0001;
        const TRANSFER_DST = 0x0000_0002;
        const SAMPLED = 0x0000_0004;
        const COLOR_ATTACHMENT = 0x0000_0010;
        const DEPTH_STENCIL_ATTACHMENT = 0x0000_0020;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspect: u32 {
        const COLOR = 0x0000_0001;
        const DEPTH = 0x0000_0002;
        const STENCIL = 0x0000_0004;
    }
}

bitflags! {
    /// Format capabilities for a given tiling
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatFeature: u32 {
        const SAMPLED_IMAGE = 0x0000_0001;
        const COLOR_ATTACHMENT = 0x0000_0080;
        const DEPTH_STENCIL_ATTACHMENT = 0x0000_0200;
        const TRANSFER_SRC = 0x0000_4000;
        const TRANSFER_DST = 0x0000_8000;
    }
}

/// Descriptor for creating a 2D, single-mip, single-sample image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCreateDesc {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub tiling: ImageTiling,
    pub usage: ImageUsage,
}

/// Descriptor for creating a 2D image view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageViewCreateDesc {
    pub image: crate::device::ImageHandle,
    pub format: Format,
    pub aspect: ImageAspect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerAddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderColor {
    IntOpaqueBlack,
    FloatOpaqueBlack,
}

/// Sampler parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_mode: Filter,
    pub address_mode: SamplerAddressMode,
    /// `Some(max)` enables anisotropic filtering
    pub max_anisotropy: Option<f32>,
    pub border_color: BorderColor,
    pub min_lod: f32,
    pub max_lod: f32,
    pub mip_lod_bias: f32,
}

impl SamplerDesc {
    /// Linear filtering, repeat addressing, anisotropy at `max_anisotropy`
    pub fn linear_repeat(max_anisotropy: Option<f32>) -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_mode: Filter::Linear,
            address_mode: SamplerAddressMode::Repeat,
            max_anisotropy,
            border_color: BorderColor::IntOpaqueBlack,
            min_lod: 0.0,
            max_lod: 0.0,
            mip_lod_bias: 0.0,
        }
    }
}

/// Pick the first candidate whose features for `tiling` contain `features`
pub fn find_supported_format(
    device: &dyn GraphicsDevice,
    candidates: &[Format],
    tiling: ImageTiling,
    features: FormatFeature,
) -> Result<Format> {
    candidates
        .iter()
        .copied()
        .find(|&format| device.format_features(format, tiling).contains(features))
        .ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "none of {:?} supports {:?} with {:?} tiling",
                candidates, features, tiling
            ))
        })
}
