/// Command recording and submission types

use bitflags::bitflags;
use crate::device::{
    CommandBufferHandle, FenceHandle, FramebufferHandle, ImageAspect, ImageHandle,
    ImageLayout, RenderPassHandle, SemaphoreHandle,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommandPoolFlags: u32 {
        /// Command buffers are short-lived
        const TRANSIENT = 0x0000_0001;
        /// Command buffers can be reset individually
        const RESET_COMMAND_BUFFER = 0x0000_0002;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommandBufferUsage: u32 {
        const ONE_TIME_SUBMIT = 0x0000_0001;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStage: u32 {
        const TOP_OF_PIPE = 0x0000_0001;
        const VERTEX_SHADER = 0x0000_0008;
        const FRAGMENT_SHADER = 0x0000_0080;
        const EARLY_FRAGMENT_TESTS = 0x0000_0100;
        const LATE_FRAGMENT_TESTS = 0x0000_0200;
        const COLOR_ATTACHMENT_OUTPUT = 0x0000_0400;
        const TRANSFER = 0x0000_1000;
        const BOTTOM_OF_PIPE = 0x0000_2000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const UNIFORM_READ = 0x0000_0008;
        const SHADER_READ = 0x0000_0020;
        const COLOR_ATTACHMENT_WRITE = 0x0000_0100;
        const DEPTH_STENCIL_ATTACHMENT_READ = 0x0000_0200;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 0x0000_0400;
        const TRANSFER_READ = 0x0000_0800;
        const TRANSFER_WRITE = 0x0000_1000;
    }
}

/// Image memory barrier performing a layout transition (ignored queue family)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier {
    pub image: ImageHandle,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub aspect: ImageAspect,
}

/// Tightly packed buffer → image copy covering the whole image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferImageCopy {
    pub buffer_offset: u64,
    pub width: u32,
    pub height: u32,
    pub aspect: ImageAspect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-extent viewport with depth range 0..1
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn from_extent(extent: Extent2D) -> Self {
        Self { x: 0, y: 0, width: extent.width, height: extent.height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// Parameters of `cmd_begin_render_pass` (inline subpass contents)
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassBegin {
    pub render_pass: RenderPassHandle,
    pub framebuffer: FramebufferHandle,
    pub render_area: Rect2D,
    pub clear_values: Vec<ClearValue>,
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices (max 65535 vertices)
    U16,
    U32,
}

impl IndexType {
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// One batch of a queue submission
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitDesc<'a> {
    /// Semaphores waited on, paired with the stage that waits
    pub wait_semaphores: &'a [(SemaphoreHandle, PipelineStage)],
    pub command_buffers: &'a [CommandBufferHandle],
    pub signal_semaphores: &'a [SemaphoreHandle],
}

/// Everything needed to submit and later wait on a submission
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitSync<'a> {
    pub wait_semaphores: &'a [(SemaphoreHandle, PipelineStage)],
    pub signal_semaphores: &'a [SemaphoreHandle],
    pub fence: Option<FenceHandle>,
}
