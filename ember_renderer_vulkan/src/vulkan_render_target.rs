/// VulkanRenderTarget - render pass plus one framebuffer per color view
///
/// Color is cleared and stored, depth is cleared and discarded. The caller
/// owns the image views and must keep them alive while the target exists.

use ash::vk;
use ash::vk::Handle;
use ember_renderer::ember::{Error, Result};
use ember_renderer::ember::command::RenderTarget;
use ember_renderer::ember::device::{
    Extent2D, Format, FramebufferHandle, ImageLayout, ImageViewHandle, RenderPassHandle,
};
use ember_renderer::engine_debug;

use crate::vulkan_device::VulkanDevice;
use crate::vulkan_format::{format_to_vk, image_layout_to_vk, vk_error};

/// Attachment formats and sizes of a render target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetDesc {
    pub color_format: Format,
    /// Layout the color attachment ends the pass in
    pub color_final_layout: ImageLayout,
    pub depth_format: Option<Format>,
    pub extent: Extent2D,
}

pub struct VulkanRenderTarget {
    device: ash::Device,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    extent: Extent2D,
}

impl VulkanRenderTarget {
    /// Create the render pass and one framebuffer per entry of `color_views`
    ///
    /// `depth_view` is shared by every framebuffer and is required exactly
    /// when `desc.depth_format` is set.
    pub fn new(
        device: &VulkanDevice,
        desc: &RenderTargetDesc,
        color_views: &[ImageViewHandle],
        depth_view: Option<ImageViewHandle>,
    ) -> Result<Self> {
        if desc.depth_format.is_some() != depth_view.is_some() {
            return Err(Error::InvalidResource(
                "Depth view must be given exactly when a depth format is set".to_string(),
            ));
        }
        if color_views.is_empty() {
            return Err(Error::InvalidResource("Render target needs at least one color view".to_string()));
        }

        let mut target = Self {
            device: device.raw().clone(),
            render_pass: Self::create_render_pass(device.raw(), desc)?,
            framebuffers: Vec::with_capacity(color_views.len()),
            extent: desc.extent,
        };

        // Partially built targets are released by Drop
        for color_view in color_views {
            let mut attachments = vec![vk::ImageView::from_raw(color_view.as_raw())];
            if let Some(depth_view) = depth_view {
                attachments.push(vk::ImageView::from_raw(depth_view.as_raw()));
            }
            let info = vk::FramebufferCreateInfo::default()
                .render_pass(target.render_pass)
                .attachments(&attachments)
                .width(desc.extent.width)
                .height(desc.extent.height)
                .layers(1);
            let framebuffer = unsafe { target.device.create_framebuffer(&info, None) }
                .map_err(|e| vk_error("vkCreateFramebuffer", e))?;
            target.framebuffers.push(framebuffer);
        }

        engine_debug!(
            "ember::vulkan",
            "Render target {}x{} with {} framebuffers",
            desc.extent.width,
            desc.extent.height,
            target.framebuffers.len()
        );
        Ok(target)
    }

    fn create_render_pass(device: &ash::Device, desc: &RenderTargetDesc) -> Result<vk::RenderPass> {
        let mut attachments = vec![vk::AttachmentDescription::default()
            .format(format_to_vk(desc.color_format))
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(image_layout_to_vk(desc.color_final_layout))];

        let color_ref = vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        let depth_ref = vk::AttachmentReference::default()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&color_ref));

        let mut stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        let mut access = vk::AccessFlags::COLOR_ATTACHMENT_WRITE;

        if let Some(depth_format) = desc.depth_format {
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(format_to_vk(depth_format))
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            );
            subpass = subpass.depth_stencil_attachment(&depth_ref);
            stages |= vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
            access |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
        }

        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stages)
            .dst_access_mask(access);

        let info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        unsafe { device.create_render_pass(&info, None) }.map_err(|e| vk_error("vkCreateRenderPass", e))
    }

    pub fn render_pass(&self) -> RenderPassHandle {
        RenderPassHandle::from_raw(self.render_pass.as_raw())
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    /// Target for recording into framebuffer `index`
    pub fn target(&self, index: usize) -> Result<RenderTarget> {
        let framebuffer = self.framebuffers.get(index).ok_or_else(|| {
            Error::InvalidResource(format!(
                "Framebuffer index {} out of range ({} framebuffers)",
                index,
                self.framebuffers.len()
            ))
        })?;
        Ok(RenderTarget {
            render_pass: self.render_pass(),
            framebuffer: FramebufferHandle::from_raw(framebuffer.as_raw()),
            extent: self.extent,
        })
    }
}

impl Drop for VulkanRenderTarget {
    fn drop(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
