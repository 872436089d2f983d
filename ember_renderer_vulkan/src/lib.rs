/*!
# Ember Renderer - Vulkan Backend

Vulkan implementation of `ember_renderer`'s `GraphicsDevice`, built on ash.

- **VulkanDevice**: every device call, with errors logged and mapped
- **VulkanRenderTarget**: render pass plus framebuffers for recording frames
- **HeadlessContext**: surface-less instance and device for GPU tests
- **vulkan_format**: conversions from core types to Vulkan
*/

mod vulkan_device;
mod vulkan_render_target;
mod vulkan_shader;
mod headless;
pub mod vulkan_format;

pub use vulkan_device::VulkanDevice;
pub use vulkan_render_target::{RenderTargetDesc, VulkanRenderTarget};
pub use vulkan_shader::{ensure_entry_point, entry_point_names};
pub use headless::HeadlessContext;

// Re-export ash so callers build instances against the same version
pub use ash;
