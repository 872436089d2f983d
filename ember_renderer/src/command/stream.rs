/// Persistent per-frame command stream
///
/// One primary command buffer per frame in flight, each paired with an
/// image-available semaphore, a render-finished semaphore and an in-flight
/// fence created signaled. Frames rotate round-robin; a slot is only reused
/// after its fence confirms the GPU finished the previous use.
///
/// ```text
/// begin_frame ──▶ record_frame ──▶ submit ──▶ (next slot)
///   wait fence     reset, begin,     reset fence,
///                  render pass, f    queue submit
/// ```

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::device::{
    ClearValue, CommandBufferUsage, CommandPoolFlags, Extent2D, FenceHandle, FramebufferHandle,
    GraphicsDevice, PipelineStage, Rect2D, RenderPassBegin, RenderPassHandle, SemaphoreHandle,
    SubmitSync,
};
use crate::command::command_buffer::{CommandBuffer, CommandPool};
use crate::{engine_debug, engine_error, engine_warn};

/// Render pass and framebuffer a frame is recorded into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub render_pass: RenderPassHandle,
    pub framebuffer: FramebufferHandle,
    pub extent: Extent2D,
}

/// How a frame submission synchronizes with presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSync {
    /// Wait on image-available at COLOR_ATTACHMENT_OUTPUT, signal render-finished
    Presentable,
    /// No semaphores; only the in-flight fence
    Offscreen,
}

struct FrameSlot {
    command_buffer: CommandBuffer,
    image_available: SemaphoreHandle,
    render_finished: SemaphoreHandle,
    in_flight: FenceHandle,
}

/// Fence-gated round-robin over `frame_count` command buffers
pub struct PersistentCommandStream {
    device: Arc<dyn GraphicsDevice>,
    frames: Vec<FrameSlot>,
    // Owns every slot's command buffer
    _pool: CommandPool,
    current: usize,
    recorded: bool,
    fence_timeout_ns: u64,
}

impl PersistentCommandStream {
    pub fn new(device: Arc<dyn GraphicsDevice>, frame_count: usize) -> Result<Self> {
        Self::with_timeout(device, frame_count, u64::MAX)
    }

    pub fn with_timeout(device: Arc<dyn GraphicsDevice>, frame_count: usize, fence_timeout_ns: u64) -> Result<Self> {
        if frame_count == 0 {
            return Err(Error::InvalidResource("frame_count must be at least 1".to_string()));
        }

        let pool = CommandPool::new(Arc::clone(&device), CommandPoolFlags::RESET_COMMAND_BUFFER)?;
        let buffers = pool.allocate(frame_count as u32)?;

        let mut stream = Self {
            device,
            frames: Vec::with_capacity(frame_count),
            _pool: pool,
            current: 0,
            recorded: false,
            fence_timeout_ns,
        };

        // Sync objects created so far are released by Drop on early return
        for command_buffer in buffers {
            let image_available = stream.device.create_semaphore()?;
            let render_finished = match stream.device.create_semaphore() {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    stream.device.destroy_semaphore(image_available);
                    return Err(e);
                }
            };
            let in_flight = match stream.device.create_fence(true) {
                Ok(fence) => fence,
                Err(e) => {
                    stream.device.destroy_semaphore(image_available);
                    stream.device.destroy_semaphore(render_finished);
                    return Err(e);
                }
            };
            stream.frames.push(FrameSlot { command_buffer, image_available, render_finished, in_flight });
        }

        engine_debug!("ember::PersistentCommandStream", "Created stream with {} frames in flight", frame_count);
        Ok(stream)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Index of the slot the next frame is recorded into
    pub fn frame_index(&self) -> usize {
        self.current
    }

    /// Semaphore to signal when acquiring the swapchain image for this frame
    pub fn image_available(&self) -> SemaphoreHandle {
        self.frames[self.current].image_available
    }

    /// Semaphore the presentation engine waits on for this frame
    pub fn render_finished(&self) -> SemaphoreHandle {
        self.frames[self.current].render_finished
    }

    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.frames[self.current].command_buffer
    }

    /// Wait until the current slot's previous submission completed
    pub fn begin_frame(&mut self) -> Result<usize> {
        let fence = self.frames[self.current].in_flight;
        self.device
            .wait_for_fence(fence, self.fence_timeout_ns)
            .inspect_err(|e| engine_error!("ember::PersistentCommandStream", "In-flight fence wait failed: {}", e))?;
        Ok(self.current)
    }

    /// Record the current slot: one render pass around `record`
    pub fn record_frame<F>(&mut self, target: &RenderTarget, clear_values: &[ClearValue], record: F) -> Result<()>
    where
        F: FnOnce(&mut CommandBuffer, usize) -> Result<()>,
    {
        let frame_index = self.current;
        let cmd = &mut self.frames[frame_index].command_buffer;
        self.recorded = false;

        cmd.reset()?;
        cmd.begin(CommandBufferUsage::empty())?;
        cmd.begin_render_pass(&RenderPassBegin {
            render_pass: target.render_pass,
            framebuffer: target.framebuffer,
            render_area: Rect2D::from_extent(target.extent),
            clear_values: clear_values.to_vec(),
        })?;
        record(cmd, frame_index)?;
        cmd.end_render_pass()?;
        cmd.end()?;

        self.recorded = true;
        Ok(())
    }

    /// Submit the recorded slot and advance to the next one
    pub fn submit(&mut self, sync: FrameSync) -> Result<()> {
        if !self.recorded {
            return Err(Error::InvalidState("submit without a recorded frame".to_string()));
        }

        let queue = self.device.graphics_queue();
        let slot = &mut self.frames[self.current];
        let waits = [(slot.image_available, PipelineStage::COLOR_ATTACHMENT_OUTPUT)];
        let signals = [slot.render_finished];
        let submit_sync = match sync {
            FrameSync::Presentable => SubmitSync {
                wait_semaphores: &waits,
                signal_semaphores: &signals,
                fence: Some(slot.in_flight),
            },
            FrameSync::Offscreen => SubmitSync { fence: Some(slot.in_flight), ..Default::default() },
        };

        self.device.reset_fence(slot.in_flight)?;
        if let Err(e) = slot.command_buffer.submit(queue, submit_sync) {
            self.replace_in_flight_fence();
            return Err(e);
        }

        self.recorded = false;
        self.current = (self.current + 1) % self.frames.len();
        Ok(())
    }

    /// The reset fence of a failed submission is never signaled; swap in a
    /// signaled one so the next `begin_frame` on this slot does not block
    fn replace_in_flight_fence(&mut self) {
        let slot = &mut self.frames[self.current];
        match self.device.create_fence(true) {
            Ok(fence) => {
                self.device.destroy_fence(slot.in_flight);
                slot.in_flight = fence;
            }
            Err(e) => engine_error!(
                "ember::PersistentCommandStream",
                "Failed to replace in-flight fence after failed submit: {}",
                e
            ),
        }
    }
}

impl Drop for PersistentCommandStream {
    fn drop(&mut self) {
        if let Err(e) = self.device.device_wait_idle() {
            engine_warn!("ember::PersistentCommandStream", "device_wait_idle failed on drop: {}", e);
        }
        for slot in self.frames.drain(..) {
            self.device.destroy_semaphore(slot.image_available);
            self.device.destroy_semaphore(slot.render_finished);
            self.device.destroy_fence(slot.in_flight);
        }
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
