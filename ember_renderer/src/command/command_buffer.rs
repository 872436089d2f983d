/// Command pool and command buffer wrappers
///
/// `CommandBuffer` tracks its recording state and refuses to record outside
/// `begin`/`end`, or to end while a render pass is still open. The handle is
/// owned by the pool it was allocated from; destroying the pool frees it.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::device::{
    BufferCopy, BufferHandle, BufferImageCopy, CommandBufferHandle, CommandBufferUsage,
    CommandPoolFlags, CommandPoolHandle, DescriptorSetHandle, GraphicsDevice, ImageBarrier,
    ImageHandle, ImageLayout, IndexType, PipelineHandle, PipelineLayoutHandle, PipelineStage,
    QueueHandle, Rect2D, RenderPassBegin, ShaderStage, SubmitDesc, SubmitSync, Viewport,
};
use crate::engine_error;

/// Lifecycle of a command buffer as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferState {
    Initial,
    Recording,
    Executable,
    Submitted,
}

// ===== COMMAND POOL =====

/// Owned command pool
pub struct CommandPool {
    device: Arc<dyn GraphicsDevice>,
    handle: CommandPoolHandle,
    flags: CommandPoolFlags,
}

impl CommandPool {
    /// Create a pool on the device's graphics queue family
    pub fn new(device: Arc<dyn GraphicsDevice>, flags: CommandPoolFlags) -> Result<Self> {
        let handle = device
            .create_command_pool(device.graphics_queue_family(), flags)
            .inspect_err(|e| engine_error!("ember::CommandPool", "Failed to create command pool: {}", e))?;
        Ok(Self { device, handle, flags })
    }

    pub fn handle(&self) -> CommandPoolHandle {
        self.handle
    }

    pub fn flags(&self) -> CommandPoolFlags {
        self.flags
    }

    /// Allocate `count` primary command buffers
    pub fn allocate(&self, count: u32) -> Result<Vec<CommandBuffer>> {
        let handles = self
            .device
            .allocate_command_buffers(self.handle, count)
            .inspect_err(|e| engine_error!("ember::CommandPool", "Failed to allocate command buffers: {}", e))?;
        Ok(handles
            .into_iter()
            .map(|handle| CommandBuffer::new(Arc::clone(&self.device), handle))
            .collect())
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        self.device.destroy_command_pool(self.handle);
    }
}

// ===== COMMAND BUFFER =====

/// Primary command buffer with recording-state checks
pub struct CommandBuffer {
    device: Arc<dyn GraphicsDevice>,
    handle: CommandBufferHandle,
    state: CommandBufferState,
    in_render_pass: bool,
}

impl CommandBuffer {
    pub(crate) fn new(device: Arc<dyn GraphicsDevice>, handle: CommandBufferHandle) -> Self {
        Self {
            device,
            handle,
            state: CommandBufferState::Initial,
            in_render_pass: false,
        }
    }

    pub fn handle(&self) -> CommandBufferHandle {
        self.handle
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CommandBufferState::Recording
    }

    /// Return the buffer to the initial state (pool needs RESET_COMMAND_BUFFER)
    pub fn reset(&mut self) -> Result<()> {
        self.device
            .reset_command_buffer(self.handle)
            .inspect_err(|e| engine_error!("ember::CommandBuffer", "Failed to reset command buffer: {}", e))?;
        self.state = CommandBufferState::Initial;
        self.in_render_pass = false;
        Ok(())
    }

    pub fn begin(&mut self, usage: CommandBufferUsage) -> Result<()> {
        if self.state != CommandBufferState::Initial {
            return Err(Error::InvalidState(format!("Cannot begin command buffer in state {:?}", self.state)));
        }
        self.device
            .begin_command_buffer(self.handle, usage)
            .inspect_err(|e| engine_error!("ember::CommandBuffer", "Failed to begin command buffer: {}", e))?;
        self.state = CommandBufferState::Recording;
        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            return Err(Error::InvalidState("Render pass not ended before ending command buffer".to_string()));
        }
        self.device
            .end_command_buffer(self.handle)
            .inspect_err(|e| engine_error!("ember::CommandBuffer", "Failed to end command buffer: {}", e))?;
        self.state = CommandBufferState::Executable;
        Ok(())
    }

    /// Submit this buffer alone to `queue`
    pub fn submit(&mut self, queue: QueueHandle, sync: SubmitSync<'_>) -> Result<()> {
        if self.state != CommandBufferState::Executable {
            return Err(Error::InvalidState(format!("Cannot submit command buffer in state {:?}", self.state)));
        }
        let command_buffers = [self.handle];
        let submit = SubmitDesc {
            wait_semaphores: sync.wait_semaphores,
            command_buffers: &command_buffers,
            signal_semaphores: sync.signal_semaphores,
        };
        self.device
            .queue_submit(queue, &[submit], sync.fence)
            .inspect_err(|e| engine_error!("ember::CommandBuffer", "Failed to submit command buffer: {}", e))?;
        self.state = CommandBufferState::Submitted;
        Ok(())
    }

    fn ensure_recording(&self) -> Result<()> {
        if self.state != CommandBufferState::Recording {
            return Err(Error::InvalidState(format!("Command buffer not recording (state {:?})", self.state)));
        }
        Ok(())
    }

    // ===== TRANSFER =====

    pub fn copy_buffer(&mut self, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopy]) -> Result<()> {
        self.ensure_recording()?;
        self.device.cmd_copy_buffer(self.handle, src, dst, regions);
        Ok(())
    }

    pub fn copy_buffer_to_image(
        &mut self,
        src: BufferHandle,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        region: &BufferImageCopy,
    ) -> Result<()> {
        self.ensure_recording()?;
        self.device.cmd_copy_buffer_to_image(self.handle, src, dst, dst_layout, region);
        Ok(())
    }

    pub fn pipeline_barrier(
        &mut self,
        src_stage: PipelineStage,
        dst_stage: PipelineStage,
        image_barriers: &[ImageBarrier],
    ) -> Result<()> {
        self.ensure_recording()?;
        self.device.cmd_pipeline_barrier(self.handle, src_stage, dst_stage, image_barriers);
        Ok(())
    }

    // ===== RENDER PASS =====

    pub fn begin_render_pass(&mut self, begin: &RenderPassBegin) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            return Err(Error::InvalidState("Already inside a render pass".to_string()));
        }
        self.device.cmd_begin_render_pass(self.handle, begin);
        self.in_render_pass = true;
        Ok(())
    }

    pub fn end_render_pass(&mut self) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_render_pass {
            return Err(Error::InvalidState("No render pass in progress".to_string()));
        }
        self.device.cmd_end_render_pass(self.handle);
        self.in_render_pass = false;
        Ok(())
    }

    // ===== DRAW STATE =====

    pub fn bind_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()> {
        self.ensure_recording()?;
        self.device.cmd_bind_pipeline(self.handle, pipeline);
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.ensure_recording()?;
        self.device.cmd_set_viewport(self.handle, viewport);
        Ok(())
    }

    pub fn set_scissor(&mut self, scissor: &Rect2D) -> Result<()> {
        self.ensure_recording()?;
        self.device.cmd_set_scissor(self.handle, scissor);
        Ok(())
    }

    pub fn bind_descriptor_set(
        &mut self,
        layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
    ) -> Result<()> {
        self.ensure_recording()?;
        self.device.cmd_bind_descriptor_set(self.handle, layout, set_index, set);
        Ok(())
    }

    pub fn bind_vertex_buffer(&mut self, buffer: BufferHandle, offset: u64) -> Result<()> {
        self.ensure_recording()?;
        self.device.cmd_bind_vertex_buffer(self.handle, buffer, offset);
        Ok(())
    }

    pub fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: u64, index_type: IndexType) -> Result<()> {
        self.ensure_recording()?;
        self.device.cmd_bind_index_buffer(self.handle, buffer, offset, index_type);
        Ok(())
    }

    pub fn push_constants(
        &mut self,
        layout: PipelineLayoutHandle,
        stages: ShaderStage,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.ensure_recording()?;
        self.device.cmd_push_constants(self.handle, layout, stages, offset, data);
        Ok(())
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_render_pass {
            return Err(Error::InvalidState("draw_indexed outside a render pass".to_string()));
        }
        self.device
            .cmd_draw_indexed(self.handle, index_count, instance_count, first_index, vertex_offset, first_instance);
        Ok(())
    }
}

#[cfg(test)]
#[path = "command_buffer_tests.rs"]
mod tests;
