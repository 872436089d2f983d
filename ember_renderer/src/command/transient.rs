/// Transient command executor for one-off GPU work (copies, layout transitions)
///
/// A single long-lived pool on the graphics family hands out reusable
/// (command buffer, fence) slots. Each operation checks out a slot, records
/// exactly one operation, submits with the slot's fence and returns a
/// [`TransientSubmission`] ticket; waiting on (or dropping) the ticket blocks
/// on the fence and recycles the slot. `execute` submits and waits at once, so
/// resources used by the operation may be freed as soon as it returns.
///
/// The executor is shared between threads. Buffers allocated from one pool
/// must not be recorded concurrently, so the pool lock is held from reset to
/// end of every recording; only the queue submission and the fence wait run
/// outside it. A recording closure must therefore not call back into the
/// same executor.

use std::sync::{Arc, Mutex, MutexGuard};
use crate::error::Result;
use crate::device::{
    BufferCopy, BufferHandle, BufferImageCopy, CommandBufferUsage, CommandPoolFlags, FenceHandle,
    Format, GraphicsDevice, ImageAspect, ImageHandle, ImageLayout, QueueHandle, SubmitSync,
};
use crate::command::command_buffer::{CommandBuffer, CommandPool};
use crate::command::layout::transition_barrier;
use crate::{engine_debug, engine_error, engine_warn};

struct TransientSlot {
    command_buffer: CommandBuffer,
    fence: FenceHandle,
}

/// Executor for synchronous one-time-submit command buffers
pub struct TransientCommandExecutor {
    device: Arc<dyn GraphicsDevice>,
    queue: QueueHandle,
    /// Locked while allocating from the pool or recording any of its buffers
    pool: Mutex<CommandPool>,
    free: Mutex<Vec<TransientSlot>>,
    /// Every fence ever created, destroyed on drop
    fences: Mutex<Vec<FenceHandle>>,
    fence_timeout_ns: u64,
}

impl TransientCommandExecutor {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Result<Self> {
        Self::with_timeout(device, u64::MAX)
    }

    /// Executor whose fence waits give up after `fence_timeout_ns`
    pub fn with_timeout(device: Arc<dyn GraphicsDevice>, fence_timeout_ns: u64) -> Result<Self> {
        let pool = CommandPool::new(
            Arc::clone(&device),
            CommandPoolFlags::TRANSIENT | CommandPoolFlags::RESET_COMMAND_BUFFER,
        )?;
        Ok(Self {
            queue: device.graphics_queue(),
            device,
            pool: Mutex::new(pool),
            free: Mutex::new(Vec::new()),
            fences: Mutex::new(Vec::new()),
            fence_timeout_ns,
        })
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// Number of idle slots ready for reuse
    pub fn idle_slots(&self) -> usize {
        lock(&self.free).len()
    }

    fn checkout(&self) -> Result<TransientSlot> {
        if let Some(slot) = lock(&self.free).pop() {
            return Ok(slot);
        }

        let fence = self.device.create_fence(false)?;
        let allocated = lock(&self.pool).allocate(1);
        let mut buffers = match allocated {
            Ok(buffers) => buffers,
            Err(e) => {
                self.device.destroy_fence(fence);
                return Err(e);
            }
        };
        lock(&self.fences).push(fence);
        engine_debug!("ember::TransientCommandExecutor", "Allocated transient slot");
        match buffers.pop() {
            Some(command_buffer) => Ok(TransientSlot { command_buffer, fence }),
            None => Err(crate::engine_err!(
                "ember::TransientCommandExecutor",
                "Device returned no command buffer"
            )),
        }
    }

    fn release(&self, slot: TransientSlot) {
        lock(&self.free).push(slot);
    }

    /// Record `record` into a fresh one-time-submit buffer and submit it
    pub fn submit<F>(&self, record: F) -> Result<TransientSubmission<'_>>
    where
        F: FnOnce(&mut CommandBuffer) -> Result<()>,
    {
        let mut slot = self.checkout()?;

        let recorded = {
            let _pool = lock(&self.pool);
            (|| {
                slot.command_buffer.reset()?;
                slot.command_buffer.begin(CommandBufferUsage::ONE_TIME_SUBMIT)?;
                record(&mut slot.command_buffer)?;
                slot.command_buffer.end()
            })()
        };
        let submitted = recorded.and_then(|()| {
            slot.command_buffer.submit(
                self.queue,
                SubmitSync { fence: Some(slot.fence), ..Default::default() },
            )
        });

        match submitted {
            Ok(()) => Ok(TransientSubmission { executor: self, slot: Some(slot) }),
            Err(e) => {
                // Nothing was submitted: the fence is still unsignaled
                self.release(slot);
                Err(e)
            }
        }
    }

    /// Submit and block until the GPU has finished
    pub fn execute<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&mut CommandBuffer) -> Result<()>,
    {
        self.submit(record)?.wait()
    }

    /// Copy `size` bytes from the start of `src` to the start of `dst`
    pub fn copy_buffer(&self, src: BufferHandle, dst: BufferHandle, size: u64) -> Result<()> {
        self.execute(|cmd| cmd.copy_buffer(src, dst, &[BufferCopy { src_offset: 0, dst_offset: 0, size }]))
    }

    /// Copy tightly packed pixels into an image in TRANSFER_DST layout
    pub fn copy_buffer_to_image(
        &self,
        src: BufferHandle,
        image: ImageHandle,
        width: u32,
        height: u32,
        aspect: ImageAspect,
    ) -> Result<()> {
        let region = BufferImageCopy { buffer_offset: 0, width, height, aspect };
        self.execute(|cmd| cmd.copy_buffer_to_image(src, image, ImageLayout::TransferDstOptimal, &region))
    }

    /// Record one barrier from the transition table
    pub fn transition_image_layout(
        &self,
        image: ImageHandle,
        format: Format,
        old: ImageLayout,
        new: ImageLayout,
    ) -> Result<()> {
        let (barrier, src_stage, dst_stage) = transition_barrier(image, format, old, new)
            .inspect_err(|e| engine_error!("ember::TransientCommandExecutor", "{}", e))?;
        self.execute(|cmd| cmd.pipeline_barrier(src_stage, dst_stage, &[barrier]))
    }
}

impl Drop for TransientCommandExecutor {
    fn drop(&mut self) {
        if let Err(e) = self.device.queue_wait_idle(self.queue) {
            engine_warn!("ember::TransientCommandExecutor", "queue_wait_idle failed on drop: {}", e);
        }
        lock(&self.free).clear();
        for fence in lock(&self.fences).drain(..) {
            self.device.destroy_fence(fence);
        }
        // The pool (and with it every command buffer) is destroyed when it drops
    }
}

/// Ticket for an in-flight transient submission
///
/// Dropping the ticket without calling [`wait`](Self::wait) still blocks on
/// the fence; errors are then only logged.
pub struct TransientSubmission<'a> {
    executor: &'a TransientCommandExecutor,
    slot: Option<TransientSlot>,
}

impl TransientSubmission<'_> {
    /// True once the GPU has finished the work
    pub fn is_complete(&self) -> Result<bool> {
        match &self.slot {
            Some(slot) => self.executor.device.fence_status(slot.fence),
            None => Ok(true),
        }
    }

    /// Block until the work is done and recycle the slot
    pub fn wait(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        let Some(slot) = self.slot.take() else {
            return Ok(());
        };
        let device = &self.executor.device;
        device
            .wait_for_fence(slot.fence, self.executor.fence_timeout_ns)
            .inspect_err(|e| engine_error!("ember::TransientCommandExecutor", "Fence wait failed: {}", e))?;
        device.reset_fence(slot.fence)?;
        self.executor.release(slot);
        Ok(())
    }
}

impl Drop for TransientSubmission<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            engine_warn!("ember::TransientSubmission", "Dropped submission did not complete: {}", e);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
#[path = "transient_tests.rs"]
mod tests;
