/// GraphicsDevice trait: the logical-device seam consumed by every component
///
/// Implemented by `ember_renderer_vulkan::VulkanDevice` on top of ash, and by the
/// resource-tracking mock used in unit tests. Methods mirror the Vulkan calls
/// one-to-one; ownership and lifecycle rules are enforced by the resource types
/// layered on top, not here.

use crate::error::Result;
use crate::device::*;

/// Physical device limits the core relies on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceLimits {
    /// Maximum sampler anisotropy
    pub max_sampler_anisotropy: f32,
    /// Whether the samplerAnisotropy feature is enabled on the device
    pub sampler_anisotropy: bool,
    pub max_push_constants_size: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_sampler_anisotropy: 16.0,
            sampler_anisotropy: true,
            max_push_constants_size: 128,
        }
    }
}

pub trait GraphicsDevice: Send + Sync {
    // ===== CAPABILITIES =====

    fn memory_properties(&self) -> &MemoryProperties;

    fn limits(&self) -> DeviceLimits;

    /// Features supported by `format` for the given tiling
    fn format_features(&self, format: Format, tiling: ImageTiling) -> FormatFeature;

    fn graphics_queue(&self) -> QueueHandle;

    fn graphics_queue_family(&self) -> u32;

    // ===== BUFFERS AND MEMORY =====

    fn create_buffer(&self, desc: &BufferCreateDesc) -> Result<BufferHandle>;

    fn destroy_buffer(&self, buffer: BufferHandle);

    fn buffer_memory_requirements(&self, buffer: BufferHandle) -> MemoryRequirements;

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<DeviceMemoryHandle>;

    fn free_memory(&self, memory: DeviceMemoryHandle);

    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: DeviceMemoryHandle, offset: u64) -> Result<()>;

    /// Map `size` bytes of `memory` starting at `offset`
    fn map_memory(&self, memory: DeviceMemoryHandle, offset: u64, size: u64) -> Result<MappedMemory>;

    fn unmap_memory(&self, memory: DeviceMemoryHandle);

    // ===== IMAGES =====

    fn create_image(&self, desc: &ImageCreateDesc) -> Result<ImageHandle>;

    fn destroy_image(&self, image: ImageHandle);

    fn image_memory_requirements(&self, image: ImageHandle) -> MemoryRequirements;

    fn bind_image_memory(&self, image: ImageHandle, memory: DeviceMemoryHandle, offset: u64) -> Result<()>;

    fn create_image_view(&self, desc: &ImageViewCreateDesc) -> Result<ImageViewHandle>;

    fn destroy_image_view(&self, view: ImageViewHandle);

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle>;

    fn destroy_sampler(&self, sampler: SamplerHandle);

    // ===== COMMAND POOLS AND BUFFERS =====

    fn create_command_pool(&self, queue_family: u32, flags: CommandPoolFlags) -> Result<CommandPoolHandle>;

    /// Destroys the pool and implicitly frees every command buffer allocated from it
    fn destroy_command_pool(&self, pool: CommandPoolHandle);

    /// Allocate `count` primary command buffers
    fn allocate_command_buffers(&self, pool: CommandPoolHandle, count: u32) -> Result<Vec<CommandBufferHandle>>;

    fn free_command_buffers(&self, pool: CommandPoolHandle, command_buffers: &[CommandBufferHandle]);

    fn reset_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()>;

    fn begin_command_buffer(&self, command_buffer: CommandBufferHandle, usage: CommandBufferUsage) -> Result<()>;

    fn end_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()>;

    // ===== SUBMISSION AND SYNCHRONIZATION =====

    fn queue_submit(&self, queue: QueueHandle, submits: &[SubmitDesc<'_>], fence: Option<FenceHandle>) -> Result<()>;

    fn queue_wait_idle(&self, queue: QueueHandle) -> Result<()>;

    fn device_wait_idle(&self) -> Result<()>;

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle>;

    fn destroy_fence(&self, fence: FenceHandle);

    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<()>;

    fn reset_fence(&self, fence: FenceHandle) -> Result<()>;

    /// True when the fence is signaled
    fn fence_status(&self, fence: FenceHandle) -> Result<bool>;

    fn create_semaphore(&self) -> Result<SemaphoreHandle>;

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle);

    // ===== COMMAND RECORDING =====

    fn cmd_copy_buffer(&self, cb: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopy]);

    fn cmd_copy_buffer_to_image(
        &self,
        cb: CommandBufferHandle,
        src: BufferHandle,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        region: &BufferImageCopy,
    );

    fn cmd_pipeline_barrier(
        &self,
        cb: CommandBufferHandle,
        src_stage: PipelineStage,
        dst_stage: PipelineStage,
        image_barriers: &[ImageBarrier],
    );

    fn cmd_begin_render_pass(&self, cb: CommandBufferHandle, begin: &RenderPassBegin);

    fn cmd_end_render_pass(&self, cb: CommandBufferHandle);

    fn cmd_bind_pipeline(&self, cb: CommandBufferHandle, pipeline: PipelineHandle);

    fn cmd_set_viewport(&self, cb: CommandBufferHandle, viewport: &Viewport);

    fn cmd_set_scissor(&self, cb: CommandBufferHandle, scissor: &Rect2D);

    fn cmd_bind_descriptor_set(
        &self,
        cb: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
    );

    fn cmd_bind_vertex_buffer(&self, cb: CommandBufferHandle, buffer: BufferHandle, offset: u64);

    fn cmd_bind_index_buffer(&self, cb: CommandBufferHandle, buffer: BufferHandle, offset: u64, index_type: IndexType);

    fn cmd_push_constants(
        &self,
        cb: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStage,
        offset: u32,
        data: &[u8],
    );

    fn cmd_draw_indexed(
        &self,
        cb: CommandBufferHandle,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBinding]) -> Result<DescriptorSetLayoutHandle>;

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle);

    fn create_descriptor_pool(&self, max_sets: u32, sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle>;

    /// Destroys the pool and implicitly frees every set allocated from it
    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle);

    /// Allocate one set per entry of `layouts`
    fn allocate_descriptor_sets(
        &self,
        pool: DescriptorPoolHandle,
        layouts: &[DescriptorSetLayoutHandle],
    ) -> Result<Vec<DescriptorSetHandle>>;

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]);

    // ===== PIPELINES =====

    /// Create a shader module from SPIR-V words
    fn create_shader_module(&self, code: &[u32]) -> Result<ShaderModuleHandle>;

    fn destroy_shader_module(&self, module: ShaderModuleHandle);

    fn create_pipeline_layout(
        &self,
        set_layouts: &[DescriptorSetLayoutHandle],
        push_constant_ranges: &[PushConstantRange],
    ) -> Result<PipelineLayoutHandle>;

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle);

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle>;

    fn destroy_pipeline(&self, pipeline: PipelineHandle);
}
