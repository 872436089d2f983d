/// VulkanDevice - `GraphicsDevice` on top of ash
///
/// Wraps an externally created instance and logical device. The device only
/// issues Vulkan calls; object ownership stays with the core resource types,
/// and the instance/device themselves stay with whoever created them.

use std::ffi::CString;
use std::sync::Mutex;
use ash::vk;
use ash::vk::Handle;
use ember_renderer::ember::{Error, Result};
use ember_renderer::ember::device::*;
use ember_renderer::ember::pipeline::ENTRY_POINT;
use ember_renderer::{engine_debug, engine_error, engine_info};

use crate::vulkan_format::*;
use crate::vulkan_shader::ensure_entry_point;

fn vk_handle<H: Handle>(raw: u64) -> H {
    H::from_raw(raw)
}

pub struct VulkanDevice {
    instance: ash::Instance,
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    memory_properties: MemoryProperties,
    limits: DeviceLimits,
    graphics_queue: QueueHandle,
    graphics_queue_family: u32,
    /// Queue access must be externally synchronized
    queue_lock: Mutex<()>,
}

impl VulkanDevice {
    /// Wrap `device`, fetching queue 0 of `queue_family_index`
    ///
    /// `sampler_anisotropy` must match what was enabled at device creation.
    pub fn new(
        instance: &ash::Instance,
        device: &ash::Device,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        sampler_anisotropy: bool,
    ) -> Self {
        let (memory_properties, limits, queue) = unsafe {
            let vk_memory = instance.get_physical_device_memory_properties(physical_device);
            let properties = instance.get_physical_device_properties(physical_device);
            let queue = device.get_device_queue(queue_family_index, 0);

            let memory_types = vk_memory.memory_types[..vk_memory.memory_type_count as usize]
                .iter()
                .map(|memory_type| MemoryType {
                    property_flags: memory_property_from_vk(memory_type.property_flags),
                    heap_index: memory_type.heap_index,
                })
                .collect();

            let limits = DeviceLimits {
                max_sampler_anisotropy: properties.limits.max_sampler_anisotropy,
                sampler_anisotropy,
                max_push_constants_size: properties.limits.max_push_constants_size,
            };
            (MemoryProperties { memory_types }, limits, queue)
        };

        engine_info!(
            "ember::vulkan",
            "VulkanDevice ready: {} memory types, queue family {}",
            memory_properties.memory_types.len(),
            queue_family_index
        );

        Self {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            memory_properties,
            limits,
            graphics_queue: QueueHandle::from_raw(queue.as_raw()),
            graphics_queue_family: queue_family_index,
            queue_lock: Mutex::new(()),
        }
    }

    /// The wrapped ash device, for objects the trait does not cover
    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    fn lock_queue(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.queue_lock
            .lock()
            .map_err(|_| Error::BackendError("Queue lock poisoned".to_string()))
    }
}

impl GraphicsDevice for VulkanDevice {
    // ===== CAPABILITIES =====

    fn memory_properties(&self) -> &MemoryProperties {
        &self.memory_properties
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn format_features(&self, format: Format, tiling: ImageTiling) -> FormatFeature {
        let properties = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format_to_vk(format))
        };
        match tiling {
            ImageTiling::Optimal => format_feature_from_vk(properties.optimal_tiling_features),
            ImageTiling::Linear => format_feature_from_vk(properties.linear_tiling_features),
        }
    }

    fn graphics_queue(&self) -> QueueHandle {
        self.graphics_queue
    }

    fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    // ===== BUFFERS AND MEMORY =====

    fn create_buffer(&self, desc: &BufferCreateDesc) -> Result<BufferHandle> {
        let info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(buffer_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&info, None) }
            .map_err(|e| vk_error("vkCreateBuffer", e))?;
        Ok(BufferHandle::from_raw(buffer.as_raw()))
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        unsafe { self.device.destroy_buffer(vk_handle(buffer.as_raw()), None) }
    }

    fn buffer_memory_requirements(&self, buffer: BufferHandle) -> MemoryRequirements {
        let requirements = unsafe { self.device.get_buffer_memory_requirements(vk_handle(buffer.as_raw())) };
        MemoryRequirements {
            size: requirements.size,
            alignment: requirements.alignment,
            memory_type_bits: requirements.memory_type_bits,
        }
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<DeviceMemoryHandle> {
        let info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type_index);
        let memory = unsafe { self.device.allocate_memory(&info, None) }
            .map_err(|e| vk_error("vkAllocateMemory", e))?;
        Ok(DeviceMemoryHandle::from_raw(memory.as_raw()))
    }

    fn free_memory(&self, memory: DeviceMemoryHandle) {
        unsafe { self.device.free_memory(vk_handle(memory.as_raw()), None) }
    }

    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: DeviceMemoryHandle, offset: u64) -> Result<()> {
        unsafe {
            self.device
                .bind_buffer_memory(vk_handle(buffer.as_raw()), vk_handle(memory.as_raw()), offset)
        }
        .map_err(|e| vk_error("vkBindBufferMemory", e))
    }

    fn map_memory(&self, memory: DeviceMemoryHandle, offset: u64, size: u64) -> Result<MappedMemory> {
        let ptr = unsafe {
            self.device
                .map_memory(vk_handle(memory.as_raw()), offset, size, vk::MemoryMapFlags::empty())
        }
        .map_err(|e| vk_error("vkMapMemory", e))?;

        unsafe { MappedMemory::new(ptr.cast::<u8>(), size) }
            .ok_or_else(|| Error::BackendError("vkMapMemory returned a null pointer".to_string()))
    }

    fn unmap_memory(&self, memory: DeviceMemoryHandle) {
        unsafe { self.device.unmap_memory(vk_handle(memory.as_raw())) }
    }

    // ===== IMAGES =====

    fn create_image(&self, desc: &ImageCreateDesc) -> Result<ImageHandle> {
        let info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
            .mip_levels(1)
            .array_layers(1)
            .format(format_to_vk(desc.format))
            .tiling(image_tiling_to_vk(desc.tiling))
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(image_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);
        let image = unsafe { self.device.create_image(&info, None) }
            .map_err(|e| vk_error("vkCreateImage", e))?;
        Ok(ImageHandle::from_raw(image.as_raw()))
    }

    fn destroy_image(&self, image: ImageHandle) {
        unsafe { self.device.destroy_image(vk_handle(image.as_raw()), None) }
    }

    fn image_memory_requirements(&self, image: ImageHandle) -> MemoryRequirements {
        let requirements = unsafe { self.device.get_image_memory_requirements(vk_handle(image.as_raw())) };
        MemoryRequirements {
            size: requirements.size,
            alignment: requirements.alignment,
            memory_type_bits: requirements.memory_type_bits,
        }
    }

    fn bind_image_memory(&self, image: ImageHandle, memory: DeviceMemoryHandle, offset: u64) -> Result<()> {
        unsafe {
            self.device
                .bind_image_memory(vk_handle(image.as_raw()), vk_handle(memory.as_raw()), offset)
        }
        .map_err(|e| vk_error("vkBindImageMemory", e))
    }

    fn create_image_view(&self, desc: &ImageViewCreateDesc) -> Result<ImageViewHandle> {
        let info = vk::ImageViewCreateInfo::default()
            .image(vk_handle(desc.image.as_raw()))
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format_to_vk(desc.format))
            .subresource_range(subresource_range(desc.aspect));
        let view = unsafe { self.device.create_image_view(&info, None) }
            .map_err(|e| vk_error("vkCreateImageView", e))?;
        Ok(ImageViewHandle::from_raw(view.as_raw()))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        unsafe { self.device.destroy_image_view(vk_handle(view.as_raw()), None) }
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        let address_mode = address_mode_to_vk(desc.address_mode);
        let info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(mipmap_mode_to_vk(desc.mipmap_mode))
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(desc.max_anisotropy.is_some())
            .max_anisotropy(desc.max_anisotropy.unwrap_or(1.0))
            .border_color(border_color_to_vk(desc.border_color))
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mip_lod_bias(desc.mip_lod_bias)
            .min_lod(desc.min_lod)
            .max_lod(desc.max_lod);
        let sampler = unsafe { self.device.create_sampler(&info, None) }
            .map_err(|e| vk_error("vkCreateSampler", e))?;
        Ok(SamplerHandle::from_raw(sampler.as_raw()))
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        unsafe { self.device.destroy_sampler(vk_handle(sampler.as_raw()), None) }
    }

    // ===== COMMAND POOLS AND BUFFERS =====

    fn create_command_pool(&self, queue_family: u32, flags: CommandPoolFlags) -> Result<CommandPoolHandle> {
        let info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(command_pool_flags_to_vk(flags));
        let pool = unsafe { self.device.create_command_pool(&info, None) }
            .map_err(|e| vk_error("vkCreateCommandPool", e))?;
        Ok(CommandPoolHandle::from_raw(pool.as_raw()))
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        unsafe { self.device.destroy_command_pool(vk_handle(pool.as_raw()), None) }
    }

    fn allocate_command_buffers(&self, pool: CommandPoolHandle, count: u32) -> Result<Vec<CommandBufferHandle>> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(vk_handle(pool.as_raw()))
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        let buffers = unsafe { self.device.allocate_command_buffers(&info) }
            .map_err(|e| vk_error("vkAllocateCommandBuffers", e))?;
        Ok(buffers.into_iter().map(|cb| CommandBufferHandle::from_raw(cb.as_raw())).collect())
    }

    fn free_command_buffers(&self, pool: CommandPoolHandle, command_buffers: &[CommandBufferHandle]) {
        let buffers: Vec<vk::CommandBuffer> = command_buffers.iter().map(|cb| vk_handle(cb.as_raw())).collect();
        unsafe { self.device.free_command_buffers(vk_handle(pool.as_raw()), &buffers) }
    }

    fn reset_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        unsafe {
            self.device
                .reset_command_buffer(vk_handle(command_buffer.as_raw()), vk::CommandBufferResetFlags::empty())
        }
        .map_err(|e| vk_error("vkResetCommandBuffer", e))
    }

    fn begin_command_buffer(&self, command_buffer: CommandBufferHandle, usage: CommandBufferUsage) -> Result<()> {
        let info = vk::CommandBufferBeginInfo::default().flags(command_buffer_usage_to_vk(usage));
        unsafe { self.device.begin_command_buffer(vk_handle(command_buffer.as_raw()), &info) }
            .map_err(|e| vk_error("vkBeginCommandBuffer", e))
    }

    fn end_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        unsafe { self.device.end_command_buffer(vk_handle(command_buffer.as_raw())) }
            .map_err(|e| vk_error("vkEndCommandBuffer", e))
    }

    // ===== SUBMISSION AND SYNCHRONIZATION =====

    fn queue_submit(&self, queue: QueueHandle, submits: &[SubmitDesc<'_>], fence: Option<FenceHandle>) -> Result<()> {
        struct Batch {
            waits: Vec<vk::Semaphore>,
            stages: Vec<vk::PipelineStageFlags>,
            command_buffers: Vec<vk::CommandBuffer>,
            signals: Vec<vk::Semaphore>,
        }

        let batches: Vec<Batch> = submits
            .iter()
            .map(|submit| Batch {
                waits: submit.wait_semaphores.iter().map(|(s, _)| vk_handle(s.as_raw())).collect(),
                stages: submit.wait_semaphores.iter().map(|(_, stage)| pipeline_stage_to_vk(*stage)).collect(),
                command_buffers: submit.command_buffers.iter().map(|cb| vk_handle(cb.as_raw())).collect(),
                signals: submit.signal_semaphores.iter().map(|s| vk_handle(s.as_raw())).collect(),
            })
            .collect();

        let infos: Vec<vk::SubmitInfo> = batches
            .iter()
            .map(|batch| {
                vk::SubmitInfo::default()
                    .wait_semaphores(&batch.waits)
                    .wait_dst_stage_mask(&batch.stages)
                    .command_buffers(&batch.command_buffers)
                    .signal_semaphores(&batch.signals)
            })
            .collect();

        let fence = fence.map_or(vk::Fence::null(), |f| vk_handle(f.as_raw()));
        let _guard = self.lock_queue()?;
        unsafe { self.device.queue_submit(vk_handle(queue.as_raw()), &infos, fence) }
            .map_err(|e| vk_error("vkQueueSubmit", e))
    }

    fn queue_wait_idle(&self, queue: QueueHandle) -> Result<()> {
        let _guard = self.lock_queue()?;
        unsafe { self.device.queue_wait_idle(vk_handle(queue.as_raw())) }
            .map_err(|e| vk_error("vkQueueWaitIdle", e))
    }

    fn device_wait_idle(&self) -> Result<()> {
        let _guard = self.lock_queue()?;
        unsafe { self.device.device_wait_idle() }.map_err(|e| vk_error("vkDeviceWaitIdle", e))
    }

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { self.device.create_fence(&info, None) }
            .map_err(|e| vk_error("vkCreateFence", e))?;
        Ok(FenceHandle::from_raw(fence.as_raw()))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        unsafe { self.device.destroy_fence(vk_handle(fence.as_raw()), None) }
    }

    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<()> {
        unsafe { self.device.wait_for_fences(&[vk_handle(fence.as_raw())], true, timeout_ns) }
            .map_err(|e| vk_error("vkWaitForFences", e))
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        unsafe { self.device.reset_fences(&[vk_handle(fence.as_raw())]) }
            .map_err(|e| vk_error("vkResetFences", e))
    }

    fn fence_status(&self, fence: FenceHandle) -> Result<bool> {
        unsafe { self.device.get_fence_status(vk_handle(fence.as_raw())) }
            .map_err(|e| vk_error("vkGetFenceStatus", e))
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let semaphore = unsafe { self.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| vk_error("vkCreateSemaphore", e))?;
        Ok(SemaphoreHandle::from_raw(semaphore.as_raw()))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        unsafe { self.device.destroy_semaphore(vk_handle(semaphore.as_raw()), None) }
    }

    // ===== COMMAND RECORDING =====

    fn cmd_copy_buffer(&self, cb: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopy]) {
        let regions: Vec<vk::BufferCopy> = regions
            .iter()
            .map(|r| vk::BufferCopy { src_offset: r.src_offset, dst_offset: r.dst_offset, size: r.size })
            .collect();
        unsafe {
            self.device.cmd_copy_buffer(
                vk_handle(cb.as_raw()),
                vk_handle(src.as_raw()),
                vk_handle(dst.as_raw()),
                &regions,
            )
        }
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cb: CommandBufferHandle,
        src: BufferHandle,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        region: &BufferImageCopy,
    ) {
        let copy = vk::BufferImageCopy {
            buffer_offset: region.buffer_offset,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: image_aspect_to_vk(region.aspect),
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D { width: region.width, height: region.height, depth: 1 },
        };
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                vk_handle(cb.as_raw()),
                vk_handle(src.as_raw()),
                vk_handle(dst.as_raw()),
                image_layout_to_vk(dst_layout),
                &[copy],
            )
        }
    }

    fn cmd_pipeline_barrier(
        &self,
        cb: CommandBufferHandle,
        src_stage: PipelineStage,
        dst_stage: PipelineStage,
        image_barriers: &[ImageBarrier],
    ) {
        let barriers: Vec<vk::ImageMemoryBarrier> = image_barriers
            .iter()
            .map(|barrier| {
                vk::ImageMemoryBarrier::default()
                    .old_layout(image_layout_to_vk(barrier.old_layout))
                    .new_layout(image_layout_to_vk(barrier.new_layout))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(vk_handle(barrier.image.as_raw()))
                    .subresource_range(subresource_range(barrier.aspect))
                    .src_access_mask(access_to_vk(barrier.src_access))
                    .dst_access_mask(access_to_vk(barrier.dst_access))
            })
            .collect();
        unsafe {
            self.device.cmd_pipeline_barrier(
                vk_handle(cb.as_raw()),
                pipeline_stage_to_vk(src_stage),
                pipeline_stage_to_vk(dst_stage),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &barriers,
            )
        }
    }

    fn cmd_begin_render_pass(&self, cb: CommandBufferHandle, begin: &RenderPassBegin) {
        let clear_values: Vec<vk::ClearValue> = begin
            .clear_values
            .iter()
            .map(|value| match *value {
                ClearValue::Color(color) => vk::ClearValue { color: vk::ClearColorValue { float32: color } },
                ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
                },
            })
            .collect();
        let info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_handle(begin.render_pass.as_raw()))
            .framebuffer(vk_handle(begin.framebuffer.as_raw()))
            .render_area(rect_to_vk(&begin.render_area))
            .clear_values(&clear_values);
        unsafe {
            self.device
                .cmd_begin_render_pass(vk_handle(cb.as_raw()), &info, vk::SubpassContents::INLINE)
        }
    }

    fn cmd_end_render_pass(&self, cb: CommandBufferHandle) {
        unsafe { self.device.cmd_end_render_pass(vk_handle(cb.as_raw())) }
    }

    fn cmd_bind_pipeline(&self, cb: CommandBufferHandle, pipeline: PipelineHandle) {
        unsafe {
            self.device.cmd_bind_pipeline(
                vk_handle(cb.as_raw()),
                vk::PipelineBindPoint::GRAPHICS,
                vk_handle(pipeline.as_raw()),
            )
        }
    }

    fn cmd_set_viewport(&self, cb: CommandBufferHandle, viewport: &Viewport) {
        unsafe { self.device.cmd_set_viewport(vk_handle(cb.as_raw()), 0, &[viewport_to_vk(viewport)]) }
    }

    fn cmd_set_scissor(&self, cb: CommandBufferHandle, scissor: &Rect2D) {
        unsafe { self.device.cmd_set_scissor(vk_handle(cb.as_raw()), 0, &[rect_to_vk(scissor)]) }
    }

    fn cmd_bind_descriptor_set(
        &self,
        cb: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                vk_handle(cb.as_raw()),
                vk::PipelineBindPoint::GRAPHICS,
                vk_handle(layout.as_raw()),
                set_index,
                &[vk_handle(set.as_raw())],
                &[],
            )
        }
    }

    fn cmd_bind_vertex_buffer(&self, cb: CommandBufferHandle, buffer: BufferHandle, offset: u64) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(vk_handle(cb.as_raw()), 0, &[vk_handle(buffer.as_raw())], &[offset])
        }
    }

    fn cmd_bind_index_buffer(&self, cb: CommandBufferHandle, buffer: BufferHandle, offset: u64, index_type: IndexType) {
        unsafe {
            self.device.cmd_bind_index_buffer(
                vk_handle(cb.as_raw()),
                vk_handle(buffer.as_raw()),
                offset,
                index_type_to_vk(index_type),
            )
        }
    }

    fn cmd_push_constants(
        &self,
        cb: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStage,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device.cmd_push_constants(
                vk_handle(cb.as_raw()),
                vk_handle(layout.as_raw()),
                shader_stage_to_vk(stages),
                offset,
                data,
            )
        }
    }

    fn cmd_draw_indexed(
        &self,
        cb: CommandBufferHandle,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(
                vk_handle(cb.as_raw()),
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        }
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBinding]) -> Result<DescriptorSetLayoutHandle> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(descriptor_type_to_vk(binding.descriptor_type))
                    .descriptor_count(binding.count)
                    .stage_flags(shader_stage_to_vk(binding.stages))
            })
            .collect();
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe { self.device.create_descriptor_set_layout(&info, None) }
            .map_err(|e| vk_error("vkCreateDescriptorSetLayout", e))?;
        Ok(DescriptorSetLayoutHandle::from_raw(layout.as_raw()))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        unsafe { self.device.destroy_descriptor_set_layout(vk_handle(layout.as_raw()), None) }
    }

    fn create_descriptor_pool(&self, max_sets: u32, sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle> {
        let sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .map(|size| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(size.descriptor_type),
                descriptor_count: size.count,
            })
            .collect();
        let info = vk::DescriptorPoolCreateInfo::default().pool_sizes(&sizes).max_sets(max_sets);
        let pool = unsafe { self.device.create_descriptor_pool(&info, None) }
            .map_err(|e| vk_error("vkCreateDescriptorPool", e))?;
        Ok(DescriptorPoolHandle::from_raw(pool.as_raw()))
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        unsafe { self.device.destroy_descriptor_pool(vk_handle(pool.as_raw()), None) }
    }

    fn allocate_descriptor_sets(
        &self,
        pool: DescriptorPoolHandle,
        layouts: &[DescriptorSetLayoutHandle],
    ) -> Result<Vec<DescriptorSetHandle>> {
        let layouts: Vec<vk::DescriptorSetLayout> = layouts.iter().map(|l| vk_handle(l.as_raw())).collect();
        let info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(vk_handle(pool.as_raw()))
            .set_layouts(&layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&info) }
            .map_err(|e| vk_error("vkAllocateDescriptorSets", e))?;
        Ok(sets.into_iter().map(|set| DescriptorSetHandle::from_raw(set.as_raw())).collect())
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        enum WriteInfo {
            Buffer([vk::DescriptorBufferInfo; 1]),
            Image([vk::DescriptorImageInfo; 1]),
        }

        let infos: Vec<WriteInfo> = writes
            .iter()
            .map(|write| match write.resource {
                DescriptorResource::UniformBuffer { buffer, offset, range } => WriteInfo::Buffer([
                    vk::DescriptorBufferInfo { buffer: vk_handle(buffer.as_raw()), offset, range },
                ]),
                DescriptorResource::CombinedImageSampler { view, sampler, layout } => WriteInfo::Image([
                    vk::DescriptorImageInfo {
                        sampler: vk_handle(sampler.as_raw()),
                        image_view: vk_handle(view.as_raw()),
                        image_layout: image_layout_to_vk(layout),
                    },
                ]),
            })
            .collect();

        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .zip(&infos)
            .map(|(write, info)| {
                let vk_write = vk::WriteDescriptorSet::default()
                    .dst_set(vk_handle(write.set.as_raw()))
                    .dst_binding(write.binding)
                    .dst_array_element(0);
                match info {
                    WriteInfo::Buffer(buffer) => vk_write
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(buffer),
                    WriteInfo::Image(image) => vk_write
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(image),
                }
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&vk_writes, &[]) }
    }

    // ===== PIPELINES =====

    fn create_shader_module(&self, code: &[u32]) -> Result<ShaderModuleHandle> {
        ensure_entry_point(code, ENTRY_POINT)?;
        let info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe { self.device.create_shader_module(&info, None) }
            .map_err(|e| vk_error("vkCreateShaderModule", e))?;
        engine_debug!("ember::vulkan", "Shader module created ({} words)", code.len());
        Ok(ShaderModuleHandle::from_raw(module.as_raw()))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        unsafe { self.device.destroy_shader_module(vk_handle(module.as_raw()), None) }
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[DescriptorSetLayoutHandle],
        push_constant_ranges: &[PushConstantRange],
    ) -> Result<PipelineLayoutHandle> {
        let set_layouts: Vec<vk::DescriptorSetLayout> = set_layouts.iter().map(|l| vk_handle(l.as_raw())).collect();
        let ranges: Vec<vk::PushConstantRange> = push_constant_ranges
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: shader_stage_to_vk(range.stages),
                offset: range.offset,
                size: range.size,
            })
            .collect();
        let info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&ranges);
        let layout = unsafe { self.device.create_pipeline_layout(&info, None) }
            .map_err(|e| vk_error("vkCreatePipelineLayout", e))?;
        Ok(PipelineLayoutHandle::from_raw(layout.as_raw()))
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        unsafe { self.device.destroy_pipeline_layout(vk_handle(layout.as_raw()), None) }
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle> {
        let entry_point = CString::new(desc.entry_point.as_str())
            .map_err(|_| Error::InvalidResource(format!("Invalid entry point name '{}'", desc.entry_point)))?;

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vk_handle(desc.vertex_shader.as_raw()))
                .name(&entry_point),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(vk_handle(desc.fragment_shader.as_raw()))
                .name(&entry_point),
        ];

        // Vertex input state
        let vertex_bindings = [vk::VertexInputBindingDescription {
            binding: desc.vertex_layout.binding,
            stride: desc.vertex_layout.stride,
            input_rate: vertex_input_rate_to_vk(desc.vertex_layout.input_rate),
        }];
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: desc.vertex_layout.binding,
                format: format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);

        // Viewport state (dynamic)
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(desc.rasterization.polygon_mode))
            .line_width(desc.rasterization.line_width)
            .cull_mode(cull_mode_to_vk(desc.rasterization.cull_mode))
            .front_face(front_face_to_vk(desc.rasterization.front_face))
            .depth_bias_enable(false);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth.test_enable)
            .depth_write_enable(desc.depth.write_enable)
            .depth_compare_op(compare_op_to_vk(desc.depth.compare_op))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(sample_count_to_vk(desc.sample_count)?);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(color_components_to_vk(desc.color_write_mask))
            .blend_enable(false);
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&color_blend_attachment));

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(vk_handle(desc.layout.as_raw()))
            .render_pass(vk_handle(desc.render_pass.as_raw()))
            .subpass(desc.subpass);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        }
        .map_err(|(_, e)| vk_error("vkCreateGraphicsPipelines", e))?;

        match pipelines.first() {
            Some(pipeline) => Ok(PipelineHandle::from_raw(pipeline.as_raw())),
            None => {
                engine_error!("ember::vulkan", "vkCreateGraphicsPipelines returned no pipeline");
                Err(Error::BackendError("No pipeline created".to_string()))
            }
        }
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        unsafe { self.device.destroy_pipeline(vk_handle(pipeline.as_raw()), None) }
    }
}
