/// Descriptor set types

use bitflags::bitflags;
use crate::device::{
    BufferHandle, DescriptorSetHandle, ImageLayout, ImageViewHandle, SamplerHandle,
};

bitflags! {
    /// Shader stages that can access a binding or push-constant range
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStage: u32 {
        const VERTEX = 0x0000_0001;
        const FRAGMENT = 0x0000_0010;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    CombinedImageSampler,
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: ShaderStage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolSize {
    pub descriptor_type: DescriptorType,
    pub count: u32,
}

/// Resource written into a descriptor binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResource {
    UniformBuffer {
        buffer: BufferHandle,
        offset: u64,
        range: u64,
    },
    CombinedImageSampler {
        view: ImageViewHandle,
        sampler: SamplerHandle,
        layout: ImageLayout,
    },
}

/// One descriptor write (array element 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorWrite {
    pub set: DescriptorSetHandle,
    pub binding: u32,
    pub resource: DescriptorResource,
}
