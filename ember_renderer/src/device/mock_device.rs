/// Mock graphics device for unit testing (no GPU required)
///
/// Tracks every object in a generation-checked slot map, so a stale handle
/// never aliases a newer object. Destroying an unknown handle, recording into
/// a command buffer that is not recording, or freeing memory still bound to a
/// live buffer is logged as a violation instead of panicking, and tests assert
/// `violations()` is empty.
///
/// Submissions execute instantly: buffer copies move bytes between the bound
/// memories, barriers update the tracked image layout, and the submit fence
/// becomes signaled.

use std::sync::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use slotmap::{DefaultKey, Key, KeyData, SlotMap};
use crate::error::{Error, Result};
use crate::device::*;

/// Object categories tracked by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Buffer,
    Memory,
    Image,
    ImageView,
    Sampler,
    CommandPool,
    CommandBuffer,
    Fence,
    Semaphore,
    DescriptorSetLayout,
    DescriptorPool,
    DescriptorSet,
    ShaderModule,
    PipelineLayout,
    Pipeline,
    RenderPass,
    Framebuffer,
}

/// A command recorded into a mock command buffer
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    CopyBuffer { src: BufferHandle, dst: BufferHandle, regions: Vec<BufferCopy> },
    CopyBufferToImage { src: BufferHandle, dst: ImageHandle, layout: ImageLayout, region: BufferImageCopy },
    PipelineBarrier { src_stage: PipelineStage, dst_stage: PipelineStage, barriers: Vec<ImageBarrier> },
    BeginRenderPass(RenderPassBegin),
    EndRenderPass,
    BindPipeline(PipelineHandle),
    SetViewport(Viewport),
    SetScissor(Rect2D),
    BindDescriptorSet { layout: PipelineLayoutHandle, set_index: u32, set: DescriptorSetHandle },
    BindVertexBuffer { buffer: BufferHandle, offset: u64 },
    BindIndexBuffer { buffer: BufferHandle, offset: u64, index_type: IndexType },
    PushConstants { layout: PipelineLayoutHandle, stages: ShaderStage, offset: u32, data: Vec<u8> },
    DrawIndexed { index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32 },
}

/// One recorded `queue_submit` batch
#[derive(Debug, Clone)]
pub struct Submission {
    pub queue: QueueHandle,
    pub command_buffers: Vec<CommandBufferHandle>,
    /// Commands of each command buffer at submit time
    pub commands: Vec<Vec<RecordedCommand>>,
    pub wait_semaphores: Vec<(SemaphoreHandle, PipelineStage)>,
    pub signal_semaphores: Vec<SemaphoreHandle>,
    pub fence: Option<FenceHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCommandBufferState {
    Initial,
    Recording,
    Executable,
    Pending,
}

enum ObjectData {
    Plain,
    Buffer { size: u64, binding: Option<(u64, u64)> },
    Memory { bytes: Box<[u8]>, type_index: u32, mapped: bool },
    Image { desc: ImageCreateDesc, layout: ImageLayout, binding: Option<u64>, contents: Vec<u8> },
    ImageView { image: u64 },
    CommandPool { flags: CommandPoolFlags },
    CommandBuffer { pool: u64, state: MockCommandBufferState, commands: Vec<RecordedCommand> },
    Fence { signaled: bool },
    DescriptorSetLayout { bindings: Vec<DescriptorBinding> },
    DescriptorPool { sets_left: u32, remaining: FxHashMap<DescriptorType, u32> },
    DescriptorSet { pool: u64, layout: u64, writes: FxHashMap<u32, DescriptorResource> },
    PipelineLayout { set_layouts: Vec<DescriptorSetLayoutHandle>, ranges: Vec<PushConstantRange> },
    Pipeline { desc: GraphicsPipelineDesc },
}

struct MockObject {
    kind: ObjectKind,
    data: ObjectData,
}

#[derive(Default)]
struct MockState {
    objects: SlotMap<DefaultKey, MockObject>,
    created: FxHashMap<ObjectKind, usize>,
    destroyed: Vec<(ObjectKind, u64)>,
    submissions: Vec<Submission>,
    violations: Vec<String>,
    fail_next: Vec<&'static str>,
    queue_wait_idle_calls: usize,
    device_wait_idle_calls: usize,
}

fn key_of(raw: u64) -> DefaultKey {
    DefaultKey::from(KeyData::from_ffi(raw))
}

impl MockState {
    fn insert(&mut self, kind: ObjectKind, data: ObjectData) -> u64 {
        *self.created.entry(kind).or_insert(0) += 1;
        self.objects.insert(MockObject { kind, data }).data().as_ffi()
    }

    fn take_failure(&mut self, op: &'static str) -> Result<()> {
        if let Some(pos) = self.fail_next.iter().position(|&name| name == op) {
            self.fail_next.remove(pos);
            return Err(Error::BackendError(format!("injected failure: {}", op)));
        }
        Ok(())
    }

    fn get(&self, raw: u64, kind: ObjectKind) -> Option<&MockObject> {
        self.objects.get(key_of(raw)).filter(|object| object.kind == kind)
    }

    fn get_mut(&mut self, raw: u64, kind: ObjectKind) -> Option<&mut MockObject> {
        self.objects.get_mut(key_of(raw)).filter(|object| object.kind == kind)
    }

    fn is_live(&self, raw: u64, kind: ObjectKind) -> bool {
        self.get(raw, kind).is_some()
    }

    /// Record a violation when `raw` is not a live object of `kind`
    fn check_live(&mut self, raw: u64, kind: ObjectKind, context: &str) -> bool {
        if self.is_live(raw, kind) {
            true
        } else {
            self.violations.push(format!("{}: {:?} {:#x} is not alive", context, kind, raw));
            false
        }
    }

    fn require_live(&self, raw: u64, kind: ObjectKind, context: &str) -> Result<()> {
        if self.is_live(raw, kind) {
            Ok(())
        } else {
            Err(Error::InvalidResource(format!("{}: {:?} {:#x} is not alive", context, kind, raw)))
        }
    }

    fn release(&mut self, raw: u64, kind: ObjectKind, context: &str) -> Option<MockObject> {
        if raw == 0 {
            return None;
        }
        if !self.check_live(raw, kind, context) {
            return None;
        }
        self.destroyed.push((kind, raw));
        self.objects.remove(key_of(raw))
    }

    /// Remove every child whose parent link points at `parent`
    fn release_children(&mut self, kind: ObjectKind, parent: u64) {
        let children: Vec<DefaultKey> = self
            .objects
            .iter()
            .filter(|(_, object)| match &object.data {
                ObjectData::CommandBuffer { pool, .. } => kind == ObjectKind::CommandBuffer && *pool == parent,
                ObjectData::DescriptorSet { pool, .. } => kind == ObjectKind::DescriptorSet && *pool == parent,
                _ => false,
            })
            .map(|(key, _)| key)
            .collect();
        for key in children {
            self.destroyed.push((kind, key.data().as_ffi()));
            self.objects.remove(key);
        }
    }

    /// Record a command, flagging buffers that are not recording
    fn record(&mut self, cb: CommandBufferHandle, command: RecordedCommand) {
        match self.get_mut(cb.as_raw(), ObjectKind::CommandBuffer) {
            Some(MockObject {
                data: ObjectData::CommandBuffer { state, commands, .. },
                ..
            }) => {
                if *state != MockCommandBufferState::Recording {
                    let state = *state;
                    self.violations.push(format!(
                        "recording {:?} into command buffer in state {:?}",
                        command, state
                    ));
                    return;
                }
                commands.push(command);
            }
            _ => self
                .violations
                .push(format!("recording into dead command buffer {:#x}", cb.as_raw())),
        }
    }

    fn buffer_binding(&self, buffer: BufferHandle) -> Option<(u64, u64, u64)> {
        match self.get(buffer.as_raw(), ObjectKind::Buffer) {
            Some(MockObject { data: ObjectData::Buffer { size, binding: Some((memory, offset)) }, .. }) => {
                Some((*memory, *offset, *size))
            }
            _ => None,
        }
    }

    fn read_memory(&self, memory: u64, offset: u64, len: u64) -> Option<Vec<u8>> {
        match self.get(memory, ObjectKind::Memory) {
            Some(MockObject { data: ObjectData::Memory { bytes, .. }, .. }) => {
                let start = offset as usize;
                let end = start.checked_add(len as usize)?;
                bytes.get(start..end).map(|slice| slice.to_vec())
            }
            _ => None,
        }
    }

    fn write_memory(&mut self, memory: u64, offset: u64, data: &[u8]) -> bool {
        match self.get_mut(memory, ObjectKind::Memory) {
            Some(MockObject { data: ObjectData::Memory { bytes, .. }, .. }) => {
                let start = offset as usize;
                match bytes.get_mut(start..start + data.len()) {
                    Some(target) => {
                        target.copy_from_slice(data);
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }

    /// Simulate GPU execution of one recorded command
    fn execute(&mut self, command: &RecordedCommand) {
        match command {
            RecordedCommand::CopyBuffer { src, dst, regions } => {
                let (Some(src_bind), Some(dst_bind)) = (self.buffer_binding(*src), self.buffer_binding(*dst)) else {
                    self.violations.push("copy_buffer with unbound or dead buffer".to_string());
                    return;
                };
                for region in regions {
                    if region.src_offset + region.size > src_bind.2 || region.dst_offset + region.size > dst_bind.2 {
                        self.violations.push(format!("copy_buffer region {:?} out of bounds", region));
                        continue;
                    }
                    let bytes = self.read_memory(src_bind.0, src_bind.1 + region.src_offset, region.size);
                    match bytes {
                        Some(bytes) => {
                            self.write_memory(dst_bind.0, dst_bind.1 + region.dst_offset, &bytes);
                        }
                        None => self.violations.push("copy_buffer source read failed".to_string()),
                    }
                }
            }
            RecordedCommand::CopyBufferToImage { src, dst, layout, region } => {
                let Some(src_bind) = self.buffer_binding(*src) else {
                    self.violations.push("copy_buffer_to_image with unbound source".to_string());
                    return;
                };
                let len = region.width as u64 * region.height as u64 * 4;
                let bytes = self
                    .read_memory(src_bind.0, src_bind.1 + region.buffer_offset, len)
                    .unwrap_or_default();
                let mut violation = None;
                match self.get_mut(dst.as_raw(), ObjectKind::Image) {
                    Some(MockObject { data: ObjectData::Image { layout: current, contents, .. }, .. }) => {
                        if *current != *layout || *layout != ImageLayout::TransferDstOptimal {
                            violation = Some(format!(
                                "copy_buffer_to_image into image in layout {:?} (declared {:?})",
                                current, layout
                            ));
                        }
                        *contents = bytes;
                    }
                    _ => violation = Some("copy_buffer_to_image into dead image".to_string()),
                }
                if let Some(violation) = violation {
                    self.violations.push(violation);
                }
            }
            RecordedCommand::PipelineBarrier { barriers, .. } => {
                for barrier in barriers {
                    let mut violation = None;
                    match self.get_mut(barrier.image.as_raw(), ObjectKind::Image) {
                        Some(MockObject { data: ObjectData::Image { layout, .. }, .. }) => {
                            if barrier.old_layout != ImageLayout::Undefined && barrier.old_layout != *layout {
                                violation = Some(format!(
                                    "barrier expects {:?} but image is in {:?}",
                                    barrier.old_layout, layout
                                ));
                            }
                            *layout = barrier.new_layout;
                        }
                        _ => violation = Some("barrier on dead image".to_string()),
                    }
                    if let Some(violation) = violation {
                        self.violations.push(violation);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Resource-tracking mock implementing [`GraphicsDevice`]
pub struct MockGraphicsDevice {
    state: Mutex<MockState>,
    memory_properties: MemoryProperties,
    limits: DeviceLimits,
    memory_type_bits: u32,
    unsupported_formats: Vec<Format>,
}

impl MockGraphicsDevice {
    /// Device with one DEVICE_LOCAL type and one HOST_VISIBLE|HOST_COHERENT type
    pub fn new() -> Self {
        Self::with_memory_types(vec![
            MemoryProperty::DEVICE_LOCAL,
            MemoryProperty::HOST_VISIBLE | MemoryProperty::HOST_COHERENT,
        ])
    }

    pub fn with_memory_types(types: Vec<MemoryProperty>) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            memory_properties: MemoryProperties {
                memory_types: types
                    .into_iter()
                    .map(|property_flags| MemoryType { property_flags, heap_index: 0 })
                    .collect(),
            },
            limits: DeviceLimits::default(),
            memory_type_bits: u32::MAX,
            unsupported_formats: Vec::new(),
        }
    }

    /// Restrict the memory types reported in every requirement query
    pub fn with_memory_type_bits(mut self, bits: u32) -> Self {
        self.memory_type_bits = bits;
        self
    }

    /// Report no features at all for `format`
    pub fn without_format(mut self, format: Format) -> Self {
        self.unsupported_formats.push(format);
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ===== TEST INSPECTION =====

    /// Make the next call to the named trait method fail
    pub fn fail_next(&self, op: &'static str) {
        self.state().fail_next.push(op);
    }

    pub fn violations(&self) -> Vec<String> {
        self.state().violations.clone()
    }

    pub fn live_count(&self, kind: ObjectKind) -> usize {
        self.state().objects.values().filter(|object| object.kind == kind).count()
    }

    pub fn live_total(&self) -> usize {
        self.state().objects.len()
    }

    /// Live objects grouped by kind (for leak diagnostics)
    pub fn live_summary(&self) -> FxHashMap<ObjectKind, usize> {
        let mut summary = FxHashMap::default();
        for object in self.state().objects.values() {
            *summary.entry(object.kind).or_insert(0) += 1;
        }
        summary
    }

    pub fn is_alive(&self, raw: u64) -> bool {
        self.state().objects.contains_key(key_of(raw))
    }

    pub fn created_count(&self, kind: ObjectKind) -> usize {
        self.state().created.get(&kind).copied().unwrap_or(0)
    }

    /// Destruction order, including implicit frees by pool destruction
    pub fn destroyed(&self) -> Vec<(ObjectKind, u64)> {
        self.state().destroyed.clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }

    pub fn recorded_commands(&self, cb: CommandBufferHandle) -> Vec<RecordedCommand> {
        match self.state().get(cb.as_raw(), ObjectKind::CommandBuffer) {
            Some(MockObject { data: ObjectData::CommandBuffer { commands, .. }, .. }) => commands.clone(),
            _ => Vec::new(),
        }
    }

    pub fn command_buffer_state(&self, cb: CommandBufferHandle) -> Option<MockCommandBufferState> {
        match self.state().get(cb.as_raw(), ObjectKind::CommandBuffer) {
            Some(MockObject { data: ObjectData::CommandBuffer { state, .. }, .. }) => Some(*state),
            _ => None,
        }
    }

    pub fn memory_contents(&self, memory: DeviceMemoryHandle) -> Vec<u8> {
        match self.state().get(memory.as_raw(), ObjectKind::Memory) {
            Some(MockObject { data: ObjectData::Memory { bytes, .. }, .. }) => bytes.to_vec(),
            _ => Vec::new(),
        }
    }

    /// Bytes of the memory range bound to `buffer`
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Vec<u8> {
        let state = self.state();
        state
            .buffer_binding(buffer)
            .and_then(|(memory, offset, size)| state.read_memory(memory, offset, size))
            .unwrap_or_default()
    }

    pub fn buffer_memory(&self, buffer: BufferHandle) -> Option<DeviceMemoryHandle> {
        self.state()
            .buffer_binding(buffer)
            .map(|(memory, _, _)| DeviceMemoryHandle::from_raw(memory))
    }

    pub fn is_mapped(&self, memory: DeviceMemoryHandle) -> bool {
        matches!(
            self.state().get(memory.as_raw(), ObjectKind::Memory),
            Some(MockObject { data: ObjectData::Memory { mapped: true, .. }, .. })
        )
    }

    pub fn image_layout(&self, image: ImageHandle) -> Option<ImageLayout> {
        match self.state().get(image.as_raw(), ObjectKind::Image) {
            Some(MockObject { data: ObjectData::Image { layout, .. }, .. }) => Some(*layout),
            _ => None,
        }
    }

    pub fn image_contents(&self, image: ImageHandle) -> Vec<u8> {
        match self.state().get(image.as_raw(), ObjectKind::Image) {
            Some(MockObject { data: ObjectData::Image { contents, .. }, .. }) => contents.clone(),
            _ => Vec::new(),
        }
    }

    pub fn image_desc(&self, image: ImageHandle) -> Option<ImageCreateDesc> {
        match self.state().get(image.as_raw(), ObjectKind::Image) {
            Some(MockObject { data: ObjectData::Image { desc, .. }, .. }) => Some(*desc),
            _ => None,
        }
    }

    pub fn descriptor_resource(&self, set: DescriptorSetHandle, binding: u32) -> Option<DescriptorResource> {
        match self.state().get(set.as_raw(), ObjectKind::DescriptorSet) {
            Some(MockObject { data: ObjectData::DescriptorSet { writes, .. }, .. }) => writes.get(&binding).copied(),
            _ => None,
        }
    }

    pub fn descriptor_set_layout_bindings(&self, layout: DescriptorSetLayoutHandle) -> Vec<DescriptorBinding> {
        match self.state().get(layout.as_raw(), ObjectKind::DescriptorSetLayout) {
            Some(MockObject { data: ObjectData::DescriptorSetLayout { bindings }, .. }) => bindings.clone(),
            _ => Vec::new(),
        }
    }

    pub fn pipeline_layout_ranges(&self, layout: PipelineLayoutHandle) -> Vec<PushConstantRange> {
        match self.state().get(layout.as_raw(), ObjectKind::PipelineLayout) {
            Some(MockObject { data: ObjectData::PipelineLayout { ranges, .. }, .. }) => ranges.clone(),
            _ => Vec::new(),
        }
    }

    pub fn pipeline_layout_set_layouts(&self, layout: PipelineLayoutHandle) -> Vec<DescriptorSetLayoutHandle> {
        match self.state().get(layout.as_raw(), ObjectKind::PipelineLayout) {
            Some(MockObject { data: ObjectData::PipelineLayout { set_layouts, .. }, .. }) => set_layouts.clone(),
            _ => Vec::new(),
        }
    }

    pub fn pipeline_desc(&self, pipeline: PipelineHandle) -> Option<GraphicsPipelineDesc> {
        match self.state().get(pipeline.as_raw(), ObjectKind::Pipeline) {
            Some(MockObject { data: ObjectData::Pipeline { desc }, .. }) => Some(desc.clone()),
            _ => None,
        }
    }

    pub fn queue_wait_idle_calls(&self) -> usize {
        self.state().queue_wait_idle_calls
    }

    pub fn device_wait_idle_calls(&self) -> usize {
        self.state().device_wait_idle_calls
    }

    // ===== EXTERNALLY OWNED OBJECTS =====

    /// Stand-in for the externally created render pass
    pub fn create_render_pass(&self) -> RenderPassHandle {
        RenderPassHandle::from_raw(self.state().insert(ObjectKind::RenderPass, ObjectData::Plain))
    }

    pub fn destroy_render_pass(&self, render_pass: RenderPassHandle) {
        self.state().release(render_pass.as_raw(), ObjectKind::RenderPass, "destroy_render_pass");
    }

    pub fn create_framebuffer(&self) -> FramebufferHandle {
        FramebufferHandle::from_raw(self.state().insert(ObjectKind::Framebuffer, ObjectData::Plain))
    }

    pub fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) {
        self.state().release(framebuffer.as_raw(), ObjectKind::Framebuffer, "destroy_framebuffer");
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn memory_requirements(size: u64, bits: u32) -> MemoryRequirements {
    // Drivers round allocations up; 256 mimics a common alignment
    let alignment = 256;
    MemoryRequirements {
        size: size.div_ceil(alignment).max(1) * alignment,
        alignment,
        memory_type_bits: bits,
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    // ===== CAPABILITIES =====

    fn memory_properties(&self) -> &MemoryProperties {
        &self.memory_properties
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn format_features(&self, format: Format, tiling: ImageTiling) -> FormatFeature {
        if self.unsupported_formats.contains(&format) || tiling == ImageTiling::Linear {
            return FormatFeature::empty();
        }
        if format.is_depth() {
            FormatFeature::DEPTH_STENCIL_ATTACHMENT | FormatFeature::TRANSFER_DST
        } else {
            FormatFeature::SAMPLED_IMAGE
                | FormatFeature::COLOR_ATTACHMENT
                | FormatFeature::TRANSFER_SRC
                | FormatFeature::TRANSFER_DST
        }
    }

    fn graphics_queue(&self) -> QueueHandle {
        QueueHandle::from_raw(0x51)
    }

    fn graphics_queue_family(&self) -> u32 {
        0
    }

    // ===== BUFFERS AND MEMORY =====

    fn create_buffer(&self, desc: &BufferCreateDesc) -> Result<BufferHandle> {
        let mut state = self.state();
        state.take_failure("create_buffer")?;
        if desc.size == 0 {
            return Err(Error::InvalidResource("buffer size must be non-zero".to_string()));
        }
        let raw = state.insert(ObjectKind::Buffer, ObjectData::Buffer { size: desc.size, binding: None });
        Ok(BufferHandle::from_raw(raw))
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        self.state().release(buffer.as_raw(), ObjectKind::Buffer, "destroy_buffer");
    }

    fn buffer_memory_requirements(&self, buffer: BufferHandle) -> MemoryRequirements {
        let size = match self.state().get(buffer.as_raw(), ObjectKind::Buffer) {
            Some(MockObject { data: ObjectData::Buffer { size, .. }, .. }) => *size,
            _ => 0,
        };
        memory_requirements(size, self.memory_type_bits)
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<DeviceMemoryHandle> {
        let mut state = self.state();
        state.take_failure("allocate_memory")?;
        if memory_type_index as usize >= self.memory_properties.memory_types.len() {
            return Err(Error::InvalidResource(format!("memory type {} does not exist", memory_type_index)));
        }
        let raw = state.insert(
            ObjectKind::Memory,
            ObjectData::Memory {
                bytes: vec![0u8; size as usize].into_boxed_slice(),
                type_index: memory_type_index,
                mapped: false,
            },
        );
        Ok(DeviceMemoryHandle::from_raw(raw))
    }

    fn free_memory(&self, memory: DeviceMemoryHandle) {
        let mut state = self.state();
        let raw = memory.as_raw();
        let still_bound = state.objects.values().any(|object| match &object.data {
            ObjectData::Buffer { binding: Some((bound, _)), .. } => *bound == raw,
            ObjectData::Image { binding: Some(bound), .. } => *bound == raw,
            _ => false,
        });
        if still_bound {
            state.violations.push(format!("memory {:#x} freed while still bound to a live object", raw));
        }
        state.release(raw, ObjectKind::Memory, "free_memory");
    }

    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: DeviceMemoryHandle, offset: u64) -> Result<()> {
        let mut state = self.state();
        state.take_failure("bind_buffer_memory")?;
        state.require_live(memory.as_raw(), ObjectKind::Memory, "bind_buffer_memory")?;
        match state.get_mut(buffer.as_raw(), ObjectKind::Buffer) {
            Some(MockObject { data: ObjectData::Buffer { binding, .. }, .. }) => {
                if binding.is_some() {
                    return Err(Error::InvalidResource("buffer already bound to memory".to_string()));
                }
                *binding = Some((memory.as_raw(), offset));
                Ok(())
            }
            _ => Err(Error::InvalidResource("bind_buffer_memory on dead buffer".to_string())),
        }
    }

    fn map_memory(&self, memory: DeviceMemoryHandle, offset: u64, size: u64) -> Result<MappedMemory> {
        let mut state = self.state();
        state.take_failure("map_memory")?;
        let host_visible = |index: u32| {
            self.memory_properties.memory_types[index as usize]
                .property_flags
                .contains(MemoryProperty::HOST_VISIBLE)
        };
        match state.get_mut(memory.as_raw(), ObjectKind::Memory) {
            Some(MockObject { data: ObjectData::Memory { bytes, type_index, mapped }, .. }) => {
                if *mapped {
                    return Err(Error::InvalidState("memory is already mapped".to_string()));
                }
                if !host_visible(*type_index) {
                    return Err(Error::InvalidState("memory type is not HOST_VISIBLE".to_string()));
                }
                if offset + size > bytes.len() as u64 {
                    return Err(Error::InvalidResource("map range exceeds allocation".to_string()));
                }
                *mapped = true;
                // Boxed storage never moves while the object is alive
                let ptr = unsafe { bytes.as_mut_ptr().add(offset as usize) };
                unsafe { MappedMemory::new(ptr, size) }
                    .ok_or_else(|| Error::BackendError("null mapping".to_string()))
            }
            _ => Err(Error::InvalidResource("map_memory on dead memory".to_string())),
        }
    }

    fn unmap_memory(&self, memory: DeviceMemoryHandle) {
        let mut state = self.state();
        let violation = match state.get_mut(memory.as_raw(), ObjectKind::Memory) {
            Some(MockObject { data: ObjectData::Memory { mapped, .. }, .. }) => {
                let was_mapped = *mapped;
                *mapped = false;
                (!was_mapped).then(|| "unmap_memory on memory that is not mapped".to_string())
            }
            _ => Some("unmap_memory on dead memory".to_string()),
        };
        if let Some(violation) = violation {
            state.violations.push(violation);
        }
    }

    // ===== IMAGES =====

    fn create_image(&self, desc: &ImageCreateDesc) -> Result<ImageHandle> {
        let mut state = self.state();
        state.take_failure("create_image")?;
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource("image extent must be non-zero".to_string()));
        }
        let raw = state.insert(
            ObjectKind::Image,
            ObjectData::Image { desc: *desc, layout: ImageLayout::Undefined, binding: None, contents: Vec::new() },
        );
        Ok(ImageHandle::from_raw(raw))
    }

    fn destroy_image(&self, image: ImageHandle) {
        let mut state = self.state();
        let raw = image.as_raw();
        let has_view = state
            .objects
            .values()
            .any(|object| matches!(object.data, ObjectData::ImageView { image } if image == raw));
        if has_view {
            state.violations.push(format!("image {:#x} destroyed before its view", raw));
        }
        state.release(raw, ObjectKind::Image, "destroy_image");
    }

    fn image_memory_requirements(&self, image: ImageHandle) -> MemoryRequirements {
        let size = self
            .image_desc(image)
            .map(|desc| desc.width as u64 * desc.height as u64 * desc.format.size_bytes() as u64)
            .unwrap_or(0);
        memory_requirements(size, self.memory_type_bits)
    }

    fn bind_image_memory(&self, image: ImageHandle, memory: DeviceMemoryHandle, _offset: u64) -> Result<()> {
        let mut state = self.state();
        state.take_failure("bind_image_memory")?;
        state.require_live(memory.as_raw(), ObjectKind::Memory, "bind_image_memory")?;
        match state.get_mut(image.as_raw(), ObjectKind::Image) {
            Some(MockObject { data: ObjectData::Image { binding, .. }, .. }) => {
                *binding = Some(memory.as_raw());
                Ok(())
            }
            _ => Err(Error::InvalidResource("bind_image_memory on dead image".to_string())),
        }
    }

    fn create_image_view(&self, desc: &ImageViewCreateDesc) -> Result<ImageViewHandle> {
        let mut state = self.state();
        state.take_failure("create_image_view")?;
        state.require_live(desc.image.as_raw(), ObjectKind::Image, "create_image_view")?;
        let raw = state.insert(ObjectKind::ImageView, ObjectData::ImageView { image: desc.image.as_raw() });
        Ok(ImageViewHandle::from_raw(raw))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        self.state().release(view.as_raw(), ObjectKind::ImageView, "destroy_image_view");
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        let mut state = self.state();
        state.take_failure("create_sampler")?;
        if let Some(max) = desc.max_anisotropy {
            if max > self.limits.max_sampler_anisotropy {
                return Err(Error::InvalidResource("anisotropy above device limit".to_string()));
            }
        }
        Ok(SamplerHandle::from_raw(state.insert(ObjectKind::Sampler, ObjectData::Plain)))
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        self.state().release(sampler.as_raw(), ObjectKind::Sampler, "destroy_sampler");
    }

    // ===== COMMAND POOLS AND BUFFERS =====

    fn create_command_pool(&self, _queue_family: u32, flags: CommandPoolFlags) -> Result<CommandPoolHandle> {
        let mut state = self.state();
        state.take_failure("create_command_pool")?;
        Ok(CommandPoolHandle::from_raw(state.insert(ObjectKind::CommandPool, ObjectData::CommandPool { flags })))
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        let mut state = self.state();
        if pool.is_null() || !state.check_live(pool.as_raw(), ObjectKind::CommandPool, "destroy_command_pool") {
            return;
        }
        state.release_children(ObjectKind::CommandBuffer, pool.as_raw());
        state.release(pool.as_raw(), ObjectKind::CommandPool, "destroy_command_pool");
    }

    fn allocate_command_buffers(&self, pool: CommandPoolHandle, count: u32) -> Result<Vec<CommandBufferHandle>> {
        let mut state = self.state();
        state.take_failure("allocate_command_buffers")?;
        state.require_live(pool.as_raw(), ObjectKind::CommandPool, "allocate_command_buffers")?;
        Ok((0..count)
            .map(|_| {
                CommandBufferHandle::from_raw(state.insert(
                    ObjectKind::CommandBuffer,
                    ObjectData::CommandBuffer {
                        pool: pool.as_raw(),
                        state: MockCommandBufferState::Initial,
                        commands: Vec::new(),
                    },
                ))
            })
            .collect())
    }

    fn free_command_buffers(&self, _pool: CommandPoolHandle, command_buffers: &[CommandBufferHandle]) {
        let mut state = self.state();
        for cb in command_buffers {
            state.release(cb.as_raw(), ObjectKind::CommandBuffer, "free_command_buffers");
        }
    }

    fn reset_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        let mut state = self.state();
        state.take_failure("reset_command_buffer")?;
        let pool = match state.get(command_buffer.as_raw(), ObjectKind::CommandBuffer) {
            Some(MockObject { data: ObjectData::CommandBuffer { pool, .. }, .. }) => *pool,
            _ => return Err(Error::InvalidResource("reset of dead command buffer".to_string())),
        };
        let resettable = matches!(
            state.get(pool, ObjectKind::CommandPool),
            Some(MockObject { data: ObjectData::CommandPool { flags }, .. })
                if flags.contains(CommandPoolFlags::RESET_COMMAND_BUFFER)
        );
        if !resettable {
            return Err(Error::InvalidState("pool was not created with RESET_COMMAND_BUFFER".to_string()));
        }
        if let Some(MockObject { data: ObjectData::CommandBuffer { state: cb_state, commands, .. }, .. }) =
            state.get_mut(command_buffer.as_raw(), ObjectKind::CommandBuffer)
        {
            *cb_state = MockCommandBufferState::Initial;
            commands.clear();
        }
        Ok(())
    }

    fn begin_command_buffer(&self, command_buffer: CommandBufferHandle, _usage: CommandBufferUsage) -> Result<()> {
        let mut state = self.state();
        state.take_failure("begin_command_buffer")?;
        match state.get_mut(command_buffer.as_raw(), ObjectKind::CommandBuffer) {
            Some(MockObject { data: ObjectData::CommandBuffer { state: cb_state, .. }, .. }) => {
                if *cb_state != MockCommandBufferState::Initial {
                    return Err(Error::InvalidState(format!("begin in state {:?}", cb_state)));
                }
                *cb_state = MockCommandBufferState::Recording;
                Ok(())
            }
            _ => Err(Error::InvalidResource("begin on dead command buffer".to_string())),
        }
    }

    fn end_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        let mut state = self.state();
        state.take_failure("end_command_buffer")?;
        match state.get_mut(command_buffer.as_raw(), ObjectKind::CommandBuffer) {
            Some(MockObject { data: ObjectData::CommandBuffer { state: cb_state, .. }, .. }) => {
                if *cb_state != MockCommandBufferState::Recording {
                    return Err(Error::InvalidState(format!("end in state {:?}", cb_state)));
                }
                *cb_state = MockCommandBufferState::Executable;
                Ok(())
            }
            _ => Err(Error::InvalidResource("end on dead command buffer".to_string())),
        }
    }

    // ===== SUBMISSION AND SYNCHRONIZATION =====

    fn queue_submit(&self, queue: QueueHandle, submits: &[SubmitDesc<'_>], fence: Option<FenceHandle>) -> Result<()> {
        let mut state = self.state();
        state.take_failure("queue_submit")?;

        if let Some(fence) = fence {
            match state.get(fence.as_raw(), ObjectKind::Fence) {
                Some(MockObject { data: ObjectData::Fence { signaled: false }, .. }) => {}
                Some(_) => return Err(Error::InvalidState("submit with a fence that is already signaled".to_string())),
                None => return Err(Error::InvalidResource("submit with dead fence".to_string())),
            }
        }

        for (index, submit) in submits.iter().enumerate() {
            let mut batch = Vec::with_capacity(submit.command_buffers.len());
            for cb in submit.command_buffers {
                let commands = match state.get_mut(cb.as_raw(), ObjectKind::CommandBuffer) {
                    Some(MockObject { data: ObjectData::CommandBuffer { state: cb_state, commands, .. }, .. }) => {
                        if *cb_state != MockCommandBufferState::Executable {
                            return Err(Error::InvalidState(format!("submit of command buffer in state {:?}", cb_state)));
                        }
                        *cb_state = MockCommandBufferState::Pending;
                        commands.clone()
                    }
                    _ => return Err(Error::InvalidResource("submit of dead command buffer".to_string())),
                };
                for command in &commands {
                    state.execute(command);
                }
                batch.push(commands);
            }
            state.submissions.push(Submission {
                queue,
                command_buffers: submit.command_buffers.to_vec(),
                commands: batch,
                wait_semaphores: submit.wait_semaphores.to_vec(),
                signal_semaphores: submit.signal_semaphores.to_vec(),
                // The fence belongs to the last batch
                fence: if index + 1 == submits.len() { fence } else { None },
            });
        }

        if let Some(fence) = fence {
            if let Some(MockObject { data: ObjectData::Fence { signaled }, .. }) =
                state.get_mut(fence.as_raw(), ObjectKind::Fence)
            {
                *signaled = true;
            }
        }
        Ok(())
    }

    fn queue_wait_idle(&self, _queue: QueueHandle) -> Result<()> {
        let mut state = self.state();
        state.take_failure("queue_wait_idle")?;
        state.queue_wait_idle_calls += 1;
        Ok(())
    }

    fn device_wait_idle(&self) -> Result<()> {
        let mut state = self.state();
        state.take_failure("device_wait_idle")?;
        state.device_wait_idle_calls += 1;
        Ok(())
    }

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let mut state = self.state();
        state.take_failure("create_fence")?;
        Ok(FenceHandle::from_raw(state.insert(ObjectKind::Fence, ObjectData::Fence { signaled })))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        self.state().release(fence.as_raw(), ObjectKind::Fence, "destroy_fence");
    }

    fn wait_for_fence(&self, fence: FenceHandle, _timeout_ns: u64) -> Result<()> {
        let mut state = self.state();
        state.take_failure("wait_for_fence")?;
        match state.get(fence.as_raw(), ObjectKind::Fence) {
            Some(MockObject { data: ObjectData::Fence { signaled: true }, .. }) => Ok(()),
            // Nothing pending can ever signal it: a real device would hang
            Some(_) => Err(Error::BackendError("timeout waiting for unsignaled fence".to_string())),
            None => Err(Error::InvalidResource("wait on dead fence".to_string())),
        }
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        let mut state = self.state();
        state.take_failure("reset_fence")?;
        match state.get_mut(fence.as_raw(), ObjectKind::Fence) {
            Some(MockObject { data: ObjectData::Fence { signaled }, .. }) => {
                *signaled = false;
                Ok(())
            }
            _ => Err(Error::InvalidResource("reset of dead fence".to_string())),
        }
    }

    fn fence_status(&self, fence: FenceHandle) -> Result<bool> {
        match self.state().get(fence.as_raw(), ObjectKind::Fence) {
            Some(MockObject { data: ObjectData::Fence { signaled }, .. }) => Ok(*signaled),
            _ => Err(Error::InvalidResource("status of dead fence".to_string())),
        }
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let mut state = self.state();
        state.take_failure("create_semaphore")?;
        Ok(SemaphoreHandle::from_raw(state.insert(ObjectKind::Semaphore, ObjectData::Plain)))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        self.state().release(semaphore.as_raw(), ObjectKind::Semaphore, "destroy_semaphore");
    }

    // ===== COMMAND RECORDING =====

    fn cmd_copy_buffer(&self, cb: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopy]) {
        let mut state = self.state();
        state.check_live(src.as_raw(), ObjectKind::Buffer, "cmd_copy_buffer");
        state.check_live(dst.as_raw(), ObjectKind::Buffer, "cmd_copy_buffer");
        state.record(cb, RecordedCommand::CopyBuffer { src, dst, regions: regions.to_vec() });
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cb: CommandBufferHandle,
        src: BufferHandle,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        region: &BufferImageCopy,
    ) {
        let mut state = self.state();
        state.check_live(src.as_raw(), ObjectKind::Buffer, "cmd_copy_buffer_to_image");
        state.check_live(dst.as_raw(), ObjectKind::Image, "cmd_copy_buffer_to_image");
        state.record(cb, RecordedCommand::CopyBufferToImage { src, dst, layout: dst_layout, region: *region });
    }

    fn cmd_pipeline_barrier(
        &self,
        cb: CommandBufferHandle,
        src_stage: PipelineStage,
        dst_stage: PipelineStage,
        image_barriers: &[ImageBarrier],
    ) {
        let mut state = self.state();
        for barrier in image_barriers {
            state.check_live(barrier.image.as_raw(), ObjectKind::Image, "cmd_pipeline_barrier");
        }
        state.record(cb, RecordedCommand::PipelineBarrier { src_stage, dst_stage, barriers: image_barriers.to_vec() });
    }

    fn cmd_begin_render_pass(&self, cb: CommandBufferHandle, begin: &RenderPassBegin) {
        let mut state = self.state();
        state.check_live(begin.render_pass.as_raw(), ObjectKind::RenderPass, "cmd_begin_render_pass");
        state.check_live(begin.framebuffer.as_raw(), ObjectKind::Framebuffer, "cmd_begin_render_pass");
        state.record(cb, RecordedCommand::BeginRenderPass(begin.clone()));
    }

    fn cmd_end_render_pass(&self, cb: CommandBufferHandle) {
        self.state().record(cb, RecordedCommand::EndRenderPass);
    }

    fn cmd_bind_pipeline(&self, cb: CommandBufferHandle, pipeline: PipelineHandle) {
        let mut state = self.state();
        state.check_live(pipeline.as_raw(), ObjectKind::Pipeline, "cmd_bind_pipeline");
        state.record(cb, RecordedCommand::BindPipeline(pipeline));
    }

    fn cmd_set_viewport(&self, cb: CommandBufferHandle, viewport: &Viewport) {
        self.state().record(cb, RecordedCommand::SetViewport(*viewport));
    }

    fn cmd_set_scissor(&self, cb: CommandBufferHandle, scissor: &Rect2D) {
        self.state().record(cb, RecordedCommand::SetScissor(*scissor));
    }

    fn cmd_bind_descriptor_set(
        &self,
        cb: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
    ) {
        let mut state = self.state();
        state.check_live(layout.as_raw(), ObjectKind::PipelineLayout, "cmd_bind_descriptor_set");
        state.check_live(set.as_raw(), ObjectKind::DescriptorSet, "cmd_bind_descriptor_set");
        state.record(cb, RecordedCommand::BindDescriptorSet { layout, set_index, set });
    }

    fn cmd_bind_vertex_buffer(&self, cb: CommandBufferHandle, buffer: BufferHandle, offset: u64) {
        let mut state = self.state();
        state.check_live(buffer.as_raw(), ObjectKind::Buffer, "cmd_bind_vertex_buffer");
        state.record(cb, RecordedCommand::BindVertexBuffer { buffer, offset });
    }

    fn cmd_bind_index_buffer(&self, cb: CommandBufferHandle, buffer: BufferHandle, offset: u64, index_type: IndexType) {
        let mut state = self.state();
        state.check_live(buffer.as_raw(), ObjectKind::Buffer, "cmd_bind_index_buffer");
        state.record(cb, RecordedCommand::BindIndexBuffer { buffer, offset, index_type });
    }

    fn cmd_push_constants(
        &self,
        cb: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStage,
        offset: u32,
        data: &[u8],
    ) {
        let mut state = self.state();
        let in_range = match state.get(layout.as_raw(), ObjectKind::PipelineLayout) {
            Some(MockObject { data: ObjectData::PipelineLayout { ranges, .. }, .. }) => ranges.iter().any(|range| {
                range.stages.contains(stages)
                    && offset >= range.offset
                    && offset + data.len() as u32 <= range.offset + range.size
            }),
            _ => false,
        };
        if !in_range {
            state.violations.push(format!(
                "push constants {:?} at {}..{} not covered by the pipeline layout",
                stages,
                offset,
                offset + data.len() as u32
            ));
        }
        state.record(cb, RecordedCommand::PushConstants { layout, stages, offset, data: data.to_vec() });
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
        self.state().record(
            cb,
            RecordedCommand::DrawIndexed { index_count, instance_count, first_index, vertex_offset, first_instance },
        );
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBinding]) -> Result<DescriptorSetLayoutHandle> {
        let mut state = self.state();
        state.take_failure("create_descriptor_set_layout")?;
        let raw = state.insert(
            ObjectKind::DescriptorSetLayout,
            ObjectData::DescriptorSetLayout { bindings: bindings.to_vec() },
        );
        Ok(DescriptorSetLayoutHandle::from_raw(raw))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        self.state().release(layout.as_raw(), ObjectKind::DescriptorSetLayout, "destroy_descriptor_set_layout");
    }

    fn create_descriptor_pool(&self, max_sets: u32, sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle> {
        let mut state = self.state();
        state.take_failure("create_descriptor_pool")?;
        let mut remaining = FxHashMap::default();
        for size in sizes {
            *remaining.entry(size.descriptor_type).or_insert(0) += size.count;
        }
        let raw = state.insert(ObjectKind::DescriptorPool, ObjectData::DescriptorPool { sets_left: max_sets, remaining });
        Ok(DescriptorPoolHandle::from_raw(raw))
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        let mut state = self.state();
        if pool.is_null() || !state.check_live(pool.as_raw(), ObjectKind::DescriptorPool, "destroy_descriptor_pool") {
            return;
        }
        state.release_children(ObjectKind::DescriptorSet, pool.as_raw());
        state.release(pool.as_raw(), ObjectKind::DescriptorPool, "destroy_descriptor_pool");
    }

    fn allocate_descriptor_sets(
        &self,
        pool: DescriptorPoolHandle,
        layouts: &[DescriptorSetLayoutHandle],
    ) -> Result<Vec<DescriptorSetHandle>> {
        let mut state = self.state();
        state.take_failure("allocate_descriptor_sets")?;

        // Descriptor demand of the whole request
        let mut demand: FxHashMap<DescriptorType, u32> = FxHashMap::default();
        for layout in layouts {
            match state.get(layout.as_raw(), ObjectKind::DescriptorSetLayout) {
                Some(MockObject { data: ObjectData::DescriptorSetLayout { bindings }, .. }) => {
                    for binding in bindings {
                        *demand.entry(binding.descriptor_type).or_insert(0) += binding.count;
                    }
                }
                _ => return Err(Error::InvalidResource("allocate with dead set layout".to_string())),
            }
        }

        match state.get_mut(pool.as_raw(), ObjectKind::DescriptorPool) {
            Some(MockObject { data: ObjectData::DescriptorPool { sets_left, remaining }, .. }) => {
                if layouts.len() as u32 > *sets_left {
                    return Err(Error::OutOfMemory);
                }
                for (descriptor_type, count) in &demand {
                    if remaining.get(descriptor_type).copied().unwrap_or(0) < *count {
                        return Err(Error::OutOfMemory);
                    }
                }
                *sets_left -= layouts.len() as u32;
                for (descriptor_type, count) in &demand {
                    if let Some(left) = remaining.get_mut(descriptor_type) {
                        *left -= count;
                    }
                }
            }
            _ => return Err(Error::InvalidResource("allocate from dead descriptor pool".to_string())),
        }

        Ok(layouts
            .iter()
            .map(|layout| {
                DescriptorSetHandle::from_raw(state.insert(
                    ObjectKind::DescriptorSet,
                    ObjectData::DescriptorSet { pool: pool.as_raw(), layout: layout.as_raw(), writes: FxHashMap::default() },
                ))
            })
            .collect())
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        let mut state = self.state();
        for write in writes {
            let layout = match state.get(write.set.as_raw(), ObjectKind::DescriptorSet) {
                Some(MockObject { data: ObjectData::DescriptorSet { layout, .. }, .. }) => *layout,
                _ => {
                    state.violations.push(format!("write to dead descriptor set {:#x}", write.set.as_raw()));
                    continue;
                }
            };
            let expected = match state.get(layout, ObjectKind::DescriptorSetLayout) {
                Some(MockObject { data: ObjectData::DescriptorSetLayout { bindings }, .. }) => bindings
                    .iter()
                    .find(|binding| binding.binding == write.binding)
                    .map(|binding| binding.descriptor_type),
                _ => None,
            };
            let actual = match write.resource {
                DescriptorResource::UniformBuffer { .. } => DescriptorType::UniformBuffer,
                DescriptorResource::CombinedImageSampler { .. } => DescriptorType::CombinedImageSampler,
            };
            if expected != Some(actual) {
                state.violations.push(format!(
                    "descriptor write of {:?} to binding {} declared as {:?}",
                    actual, write.binding, expected
                ));
                continue;
            }
            if let Some(MockObject { data: ObjectData::DescriptorSet { writes: stored, .. }, .. }) =
                state.get_mut(write.set.as_raw(), ObjectKind::DescriptorSet)
            {
                stored.insert(write.binding, write.resource);
            }
        }
    }

    // ===== PIPELINES =====

    fn create_shader_module(&self, code: &[u32]) -> Result<ShaderModuleHandle> {
        let mut state = self.state();
        state.take_failure("create_shader_module")?;
        if code.first() != Some(&0x0723_0203) {
            return Err(Error::InvalidResource("shader code is not SPIR-V".to_string()));
        }
        Ok(ShaderModuleHandle::from_raw(state.insert(ObjectKind::ShaderModule, ObjectData::Plain)))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        self.state().release(module.as_raw(), ObjectKind::ShaderModule, "destroy_shader_module");
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[DescriptorSetLayoutHandle],
        push_constant_ranges: &[PushConstantRange],
    ) -> Result<PipelineLayoutHandle> {
        let mut state = self.state();
        state.take_failure("create_pipeline_layout")?;
        for layout in set_layouts {
            state.require_live(layout.as_raw(), ObjectKind::DescriptorSetLayout, "create_pipeline_layout")?;
        }
        let raw = state.insert(
            ObjectKind::PipelineLayout,
            ObjectData::PipelineLayout { set_layouts: set_layouts.to_vec(), ranges: push_constant_ranges.to_vec() },
        );
        Ok(PipelineLayoutHandle::from_raw(raw))
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        self.state().release(layout.as_raw(), ObjectKind::PipelineLayout, "destroy_pipeline_layout");
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle> {
        let mut state = self.state();
        state.take_failure("create_graphics_pipeline")?;
        state.require_live(desc.vertex_shader.as_raw(), ObjectKind::ShaderModule, "create_graphics_pipeline")?;
        state.require_live(desc.fragment_shader.as_raw(), ObjectKind::ShaderModule, "create_graphics_pipeline")?;
        state.require_live(desc.layout.as_raw(), ObjectKind::PipelineLayout, "create_graphics_pipeline")?;
        state.require_live(desc.render_pass.as_raw(), ObjectKind::RenderPass, "create_graphics_pipeline")?;
        let raw = state.insert(ObjectKind::Pipeline, ObjectData::Pipeline { desc: desc.clone() });
        Ok(PipelineHandle::from_raw(raw))
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        self.state().release(pipeline.as_raw(), ObjectKind::Pipeline, "destroy_pipeline");
    }
}

#[cfg(test)]
#[path = "mock_device_tests.rs"]
mod tests;
