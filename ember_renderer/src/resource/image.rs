/// Images: decoded pixel data, staged uploads and device-local GPU images
///
/// ```text
/// ImageData::load ──▶ StagedImage::new ──▶ StagedImage::initialize ──▶ GpuImage
///  (RGBA8 pixels)     (host staging buffer)  (image, copy, view, sampler)
/// ```
///
/// A `GpuImage` owns its image, memory, view and optional sampler and releases
/// them in reverse creation order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::error::{Error, Result};
use crate::device::{
    find_memory_type, find_supported_format, BufferUsage, DeviceMemoryHandle, Extent2D, Format,
    FormatFeature, GraphicsDevice, ImageAspect, ImageCreateDesc, ImageHandle, ImageLayout,
    ImageTiling, ImageUsage, ImageViewCreateDesc, ImageViewHandle, MemoryProperty, SamplerDesc,
    SamplerHandle,
};
use crate::command::TransientCommandExecutor;
use crate::resource::buffer::GpuBuffer;
use crate::{engine_debug, engine_error};

// ===== IMAGE DATA =====

/// Decoded 8-bit RGBA pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl ImageData {
    /// Decode any supported image file to RGBA8
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::decode(&bytes, path.to_path_buf())
    }

    /// Decode an in-memory encoded image; `origin` names it in errors
    pub fn decode(bytes: &[u8], origin: PathBuf) -> Result<Self> {
        let decoded = ::image::load_from_memory(bytes).map_err(|e| Error::Parse {
            path: origin,
            line: None,
            message: e.to_string(),
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    /// Wrap raw RGBA8 pixels; `pixels.len()` must equal `width * height * 4`
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource("Image extent must be non-zero".to_string()));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(Error::InvalidResource(format!(
                "Expected {} bytes of RGBA8 pixels for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    /// Single-colour image
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Result<Self> {
        let pixels = color.repeat(width as usize * height as usize);
        Self::from_rgba8(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

// ===== GPU IMAGE =====

/// Device-local image with memory, view and optional sampler
pub struct GpuImage {
    device: Arc<dyn GraphicsDevice>,
    image: ImageHandle,
    memory: DeviceMemoryHandle,
    view: ImageViewHandle,
    sampler: SamplerHandle,
    format: Format,
    extent: Extent2D,
    layout: ImageLayout,
}

impl GpuImage {
    /// Create the image and bind device-local memory; view and sampler come later
    fn allocate(
        device: Arc<dyn GraphicsDevice>,
        extent: Extent2D,
        format: Format,
        usage: ImageUsage,
    ) -> Result<Self> {
        let image = device
            .create_image(&ImageCreateDesc {
                width: extent.width,
                height: extent.height,
                format,
                tiling: ImageTiling::Optimal,
                usage,
            })
            .inspect_err(|e| engine_error!("ember::GpuImage", "Failed to create image: {}", e))?;

        // From here on Drop releases whatever was created
        let mut gpu_image = Self {
            device,
            image,
            memory: DeviceMemoryHandle::NULL,
            view: ImageViewHandle::NULL,
            sampler: SamplerHandle::NULL,
            format,
            extent,
            layout: ImageLayout::Undefined,
        };

        let requirements = gpu_image.device.image_memory_requirements(image);
        let type_index = find_memory_type(
            gpu_image.device.memory_properties(),
            requirements.memory_type_bits,
            MemoryProperty::DEVICE_LOCAL,
        )?;
        gpu_image.memory = gpu_image.device.allocate_memory(requirements.size, type_index)?;
        gpu_image.device.bind_image_memory(image, gpu_image.memory, 0)?;
        Ok(gpu_image)
    }

    fn create_view(&mut self, aspect: ImageAspect) -> Result<()> {
        self.view = self
            .device
            .create_image_view(&ImageViewCreateDesc { image: self.image, format: self.format, aspect })
            .inspect_err(|e| engine_error!("ember::GpuImage", "Failed to create image view: {}", e))?;
        Ok(())
    }

    fn transition(&mut self, executor: &TransientCommandExecutor, new: ImageLayout) -> Result<()> {
        executor.transition_image_layout(self.image, self.format, self.layout, new)?;
        self.layout = new;
        Ok(())
    }

    /// Depth attachment: negotiate the format, create image and view, move to attachment layout
    pub fn new_depth(
        device: Arc<dyn GraphicsDevice>,
        executor: &TransientCommandExecutor,
        extent: Extent2D,
        candidates: &[Format],
    ) -> Result<Self> {
        let format = find_supported_format(
            device.as_ref(),
            candidates,
            ImageTiling::Optimal,
            FormatFeature::DEPTH_STENCIL_ATTACHMENT,
        )
        .inspect_err(|e| engine_error!("ember::GpuImage", "No depth format: {}", e))?;

        let mut depth = Self::allocate(device, extent, format, ImageUsage::DEPTH_STENCIL_ATTACHMENT)?;
        depth.create_view(ImageAspect::DEPTH)?;
        depth.transition(executor, ImageLayout::DepthStencilAttachmentOptimal)?;

        engine_debug!("ember::GpuImage", "Depth buffer {}x{} ({:?})", extent.width, extent.height, format);
        Ok(depth)
    }

    pub fn image(&self) -> ImageHandle {
        self.image
    }

    pub fn memory(&self) -> DeviceMemoryHandle {
        self.memory
    }

    pub fn view(&self) -> ImageViewHandle {
        self.view
    }

    /// Null for images created without a sampler (depth targets)
    pub fn sampler(&self) -> SamplerHandle {
        self.sampler
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn layout(&self) -> ImageLayout {
        self.layout
    }

    /// Aspect covered by this image's view
    pub fn aspect(&self) -> ImageAspect {
        if self.format.is_depth() {
            ImageAspect::DEPTH
        } else {
            ImageAspect::COLOR
        }
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        if !self.sampler.is_null() {
            self.device.destroy_sampler(self.sampler);
        }
        if !self.view.is_null() {
            self.device.destroy_image_view(self.view);
        }
        self.device.destroy_image(self.image);
        if !self.memory.is_null() {
            self.device.free_memory(self.memory);
        }
    }
}

// ===== STAGED IMAGE =====

/// Pixels copied into a host-visible staging buffer, waiting for upload
pub struct StagedImage {
    device: Arc<dyn GraphicsDevice>,
    staging: GpuBuffer,
    width: u32,
    height: u32,
}

impl StagedImage {
    pub fn new(device: Arc<dyn GraphicsDevice>, data: &ImageData) -> Result<Self> {
        let staging = GpuBuffer::new(
            Arc::clone(&device),
            data.pixels().len() as u64,
            BufferUsage::TRANSFER_SRC,
            MemoryProperty::HOST_VISIBLE | MemoryProperty::HOST_COHERENT,
        )?;
        staging.upload(data.pixels())?;
        Ok(Self { device, staging, width: data.width(), height: data.height() })
    }

    /// Decode a file and stage its pixels
    pub fn from_file(device: Arc<dyn GraphicsDevice>, path: impl AsRef<Path>) -> Result<Self> {
        let data = ImageData::load(path)?;
        Self::new(device, &data)
    }

    pub fn extent(&self) -> Extent2D {
        Extent2D { width: self.width, height: self.height }
    }

    /// Upload into a sampled image using the default linear/repeat sampler
    pub fn initialize(self, executor: &TransientCommandExecutor, format: Format) -> Result<GpuImage> {
        let limits = self.device.limits();
        let anisotropy = limits.sampler_anisotropy.then_some(limits.max_sampler_anisotropy);
        self.initialize_with_sampler(executor, format, &SamplerDesc::linear_repeat(anisotropy))
    }

    /// Upload into a sampled image, then create its view and `sampler`
    ///
    /// The staging buffer is released once the copy has completed. `format`
    /// must be an 8-bit four-channel colour format matching the staged pixels.
    pub fn initialize_with_sampler(
        self,
        executor: &TransientCommandExecutor,
        format: Format,
        sampler: &SamplerDesc,
    ) -> Result<GpuImage> {
        if !format.is_rgba8_color() {
            engine_error!("ember::GpuImage", "Cannot upload RGBA8 pixels as {:?}", format);
            return Err(Error::UnsupportedFormat(format!(
                "{:?} is not an 8-bit four-channel colour format",
                format
            )));
        }
        let extent = self.extent();
        let StagedImage { device, staging, .. } = self;

        let mut image = GpuImage::allocate(device, extent, format, ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED)?;
        image.transition(executor, ImageLayout::TransferDstOptimal)?;
        executor.copy_buffer_to_image(staging.handle(), image.image, extent.width, extent.height, ImageAspect::COLOR)?;
        image.transition(executor, ImageLayout::ShaderReadOnlyOptimal)?;
        staging.destroy();

        image.create_view(ImageAspect::COLOR)?;
        image.sampler = image
            .device
            .create_sampler(sampler)
            .inspect_err(|e| engine_error!("ember::GpuImage", "Failed to create sampler: {}", e))?;

        engine_debug!("ember::GpuImage", "Uploaded {}x{} texture ({:?})", extent.width, extent.height, format);
        Ok(image)
    }
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
