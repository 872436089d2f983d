/// Core → Vulkan conversions
///
/// Enums map one-to-one. Flag types in the core share Vulkan's bit values, so
/// they convert through `from_raw(bits)`.

use ash::vk;
use ember_renderer::ember::{Error, Result};
use ember_renderer::ember::device::{
    AccessFlags, BorderColor, BufferUsage, ColorComponents, CommandBufferUsage, CommandPoolFlags,
    CompareOp, CullMode, DescriptorType, Filter, Format, FormatFeature, FrontFace,
    ImageAspect, ImageLayout, ImageTiling, ImageUsage, IndexType, MemoryProperty, PipelineStage,
    PolygonMode, PrimitiveTopology, Rect2D, SamplerAddressMode, ShaderStage, VertexInputRate,
    Viewport,
};
use ember_renderer::{engine_err, engine_error};

// ===== ENUMS =====

pub fn format_to_vk(format: Format) -> vk::Format {
    match format {
        Format::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        Format::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        Format::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        Format::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        Format::D32_SFLOAT => vk::Format::D32_SFLOAT,
        Format::D32_SFLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
        Format::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        Format::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        Format::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
        Format::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
    }
}

/// Reverse of `format_to_vk`, for formats reported by a swapchain or surface
pub fn format_from_vk(format: vk::Format) -> Result<Format> {
    match format {
        vk::Format::R8G8B8A8_SRGB => Ok(Format::R8G8B8A8_SRGB),
        vk::Format::R8G8B8A8_UNORM => Ok(Format::R8G8B8A8_UNORM),
        vk::Format::B8G8R8A8_SRGB => Ok(Format::B8G8R8A8_SRGB),
        vk::Format::B8G8R8A8_UNORM => Ok(Format::B8G8R8A8_UNORM),
        vk::Format::D32_SFLOAT => Ok(Format::D32_SFLOAT),
        vk::Format::D32_SFLOAT_S8_UINT => Ok(Format::D32_SFLOAT_S8_UINT),
        vk::Format::D24_UNORM_S8_UINT => Ok(Format::D24_UNORM_S8_UINT),
        vk::Format::R32G32_SFLOAT => Ok(Format::R32G32_SFLOAT),
        vk::Format::R32G32B32_SFLOAT => Ok(Format::R32G32B32_SFLOAT),
        vk::Format::R32G32B32A32_SFLOAT => Ok(Format::R32G32B32A32_SFLOAT),
        other => Err(Error::UnsupportedFormat(format!("{:?}", other))),
    }
}

pub fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::TransferDstOptimal => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::ShaderReadOnlyOptimal => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::DepthStencilAttachmentOptimal => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::ColorAttachmentOptimal => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn image_tiling_to_vk(tiling: ImageTiling) -> vk::ImageTiling {
    match tiling {
        ImageTiling::Optimal => vk::ImageTiling::OPTIMAL,
        ImageTiling::Linear => vk::ImageTiling::LINEAR,
    }
}

pub fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub fn mipmap_mode_to_vk(filter: Filter) -> vk::SamplerMipmapMode {
    match filter {
        Filter::Nearest => vk::SamplerMipmapMode::NEAREST,
        Filter::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn address_mode_to_vk(mode: SamplerAddressMode) -> vk::SamplerAddressMode {
    match mode {
        SamplerAddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        SamplerAddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        SamplerAddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
    }
}

pub fn border_color_to_vk(color: BorderColor) -> vk::BorderColor {
    match color {
        BorderColor::IntOpaqueBlack => vk::BorderColor::INT_OPAQUE_BLACK,
        BorderColor::FloatOpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
    }
}

pub fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

pub fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

// ===== PIPELINE STATE =====

pub fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
    }
}

pub fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub fn polygon_mode_to_vk(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
        PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

pub fn compare_op_to_vk(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

pub fn vertex_input_rate_to_vk(rate: VertexInputRate) -> vk::VertexInputRate {
    match rate {
        VertexInputRate::Vertex => vk::VertexInputRate::VERTEX,
        VertexInputRate::Instance => vk::VertexInputRate::INSTANCE,
    }
}

pub fn sample_count_to_vk(count: u32) -> Result<vk::SampleCountFlags> {
    match count {
        1 => Ok(vk::SampleCountFlags::TYPE_1),
        2 => Ok(vk::SampleCountFlags::TYPE_2),
        4 => Ok(vk::SampleCountFlags::TYPE_4),
        8 => Ok(vk::SampleCountFlags::TYPE_8),
        other => Err(Error::InvalidResource(format!("Unsupported sample count {}", other))),
    }
}

// ===== FLAGS =====

pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    vk::BufferUsageFlags::from_raw(usage.bits())
}

pub fn image_usage_to_vk(usage: ImageUsage) -> vk::ImageUsageFlags {
    vk::ImageUsageFlags::from_raw(usage.bits())
}

pub fn image_aspect_to_vk(aspect: ImageAspect) -> vk::ImageAspectFlags {
    vk::ImageAspectFlags::from_raw(aspect.bits())
}

pub fn pipeline_stage_to_vk(stage: PipelineStage) -> vk::PipelineStageFlags {
    vk::PipelineStageFlags::from_raw(stage.bits())
}

pub fn access_to_vk(access: AccessFlags) -> vk::AccessFlags {
    vk::AccessFlags::from_raw(access.bits())
}

pub fn shader_stage_to_vk(stages: ShaderStage) -> vk::ShaderStageFlags {
    vk::ShaderStageFlags::from_raw(stages.bits())
}

pub fn color_components_to_vk(mask: ColorComponents) -> vk::ColorComponentFlags {
    vk::ColorComponentFlags::from_raw(mask.bits())
}

pub fn command_pool_flags_to_vk(flags: CommandPoolFlags) -> vk::CommandPoolCreateFlags {
    vk::CommandPoolCreateFlags::from_raw(flags.bits())
}

pub fn command_buffer_usage_to_vk(usage: CommandBufferUsage) -> vk::CommandBufferUsageFlags {
    vk::CommandBufferUsageFlags::from_raw(usage.bits())
}

/// Unknown Vulkan bits (e.g. `PROTECTED`) are dropped
pub fn memory_property_from_vk(flags: vk::MemoryPropertyFlags) -> MemoryProperty {
    MemoryProperty::from_bits_truncate(flags.as_raw())
}

pub fn format_feature_from_vk(flags: vk::FormatFeatureFlags) -> FormatFeature {
    FormatFeature::from_bits_truncate(flags.as_raw())
}

// ===== STRUCTS =====

pub fn rect_to_vk(rect: &Rect2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: rect.x, y: rect.y },
        extent: vk::Extent2D { width: rect.width, height: rect.height },
    }
}

pub fn viewport_to_vk(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x,
        y: viewport.y,
        width: viewport.width,
        height: viewport.height,
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    }
}

/// Whole single-mip, single-layer subresource range
pub fn subresource_range(aspect: ImageAspect) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: image_aspect_to_vk(aspect),
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

// ===== ERRORS =====

/// Map a failed Vulkan call to an engine error, logging it
///
/// Device and host allocation failures become `Error::OutOfMemory`.
pub fn vk_error(operation: &str, result: vk::Result) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            engine_error!("ember::vulkan", "{} failed: {:?}", operation, result);
            Error::OutOfMemory
        }
        _ => engine_err!("ember::vulkan", "{} failed: {:?}", operation, result),
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
