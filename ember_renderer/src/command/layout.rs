/// Image layout transition table
///
/// Only the transitions the renderer performs are known. Each entry fixes the
/// access masks and pipeline stages of the barrier; any other pair is an error.

use crate::error::{Error, Result};
use crate::device::{AccessFlags, Format, ImageAspect, ImageBarrier, ImageHandle, ImageLayout, PipelineStage};

/// Access masks and stages of one supported layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub src_stage: PipelineStage,
    pub dst_stage: PipelineStage,
}

/// Look up the barrier parameters for `old` → `new`
pub fn layout_transition(old: ImageLayout, new: ImageLayout) -> Result<TransitionMasks> {
    use ImageLayout::*;

    match (old, new) {
        (Undefined, TransferDstOptimal) => Ok(TransitionMasks {
            src_access: AccessFlags::empty(),
            dst_access: AccessFlags::TRANSFER_WRITE,
            src_stage: PipelineStage::TOP_OF_PIPE,
            dst_stage: PipelineStage::TRANSFER,
        }),
        (TransferDstOptimal, ShaderReadOnlyOptimal) => Ok(TransitionMasks {
            src_access: AccessFlags::TRANSFER_WRITE,
            dst_access: AccessFlags::SHADER_READ,
            src_stage: PipelineStage::TRANSFER,
            dst_stage: PipelineStage::FRAGMENT_SHADER,
        }),
        (Undefined, DepthStencilAttachmentOptimal) => Ok(TransitionMasks {
            src_access: AccessFlags::empty(),
            dst_access: AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            src_stage: PipelineStage::TOP_OF_PIPE,
            dst_stage: PipelineStage::EARLY_FRAGMENT_TESTS,
        }),
        _ => Err(Error::UnsupportedLayoutTransition { old, new }),
    }
}

/// Aspect touched by a transition into `new` for an image of `format`
pub fn transition_aspect(format: Format, new: ImageLayout) -> ImageAspect {
    if new == ImageLayout::DepthStencilAttachmentOptimal {
        if format.has_stencil() {
            ImageAspect::DEPTH | ImageAspect::STENCIL
        } else {
            ImageAspect::DEPTH
        }
    } else {
        ImageAspect::COLOR
    }
}

/// Build the barrier and stage pair for a supported transition
pub fn transition_barrier(
    image: ImageHandle,
    format: Format,
    old: ImageLayout,
    new: ImageLayout,
) -> Result<(ImageBarrier, PipelineStage, PipelineStage)> {
    let masks = layout_transition(old, new)?;
    let barrier = ImageBarrier {
        image,
        old_layout: old,
        new_layout: new,
        src_access: masks.src_access,
        dst_access: masks.dst_access,
        aspect: transition_aspect(format, new),
    };
    Ok((barrier, masks.src_stage, masks.dst_stage))
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
