/// Typed GPU object handles
///
/// Every handle is a `Copy` newtype over the backend's raw 64-bit value. A handle
/// never owns its object: ownership lives in the resource types (`GpuBuffer`,
/// `GpuImage`, ...) that destroy the object on drop.

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
            pub struct $name(u64);

            impl $name {
                /// The null handle
                pub const NULL: Self = Self(0);

                pub const fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                pub const fn as_raw(self) -> u64 {
                    self.0
                }

                pub const fn is_null(self) -> bool {
                    self.0 == 0
                }
            }
        )*
    };
}

define_handle!(
    /// `VkBuffer`
    BufferHandle,
    /// `VkDeviceMemory`
    DeviceMemoryHandle,
    /// `VkImage`
    ImageHandle,
    /// `VkImageView`
    ImageViewHandle,
    /// `VkSampler`
    SamplerHandle,
    /// `VkCommandPool`
    CommandPoolHandle,
    /// `VkCommandBuffer`
    CommandBufferHandle,
    /// `VkQueue`
    QueueHandle,
    /// `VkFence`
    FenceHandle,
    /// `VkSemaphore`
    SemaphoreHandle,
    /// `VkDescriptorSetLayout`
    DescriptorSetLayoutHandle,
    /// `VkDescriptorPool`
    DescriptorPoolHandle,
    /// `VkDescriptorSet`
    DescriptorSetHandle,
    /// `VkShaderModule`
    ShaderModuleHandle,
    /// `VkPipelineLayout`
    PipelineLayoutHandle,
    /// `VkPipeline`
    PipelineHandle,
    /// `VkRenderPass`
    RenderPassHandle,
    /// `VkFramebuffer`
    FramebufferHandle,
);
