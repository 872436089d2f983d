/// Per-frame descriptor sets with persistently mapped uniform buffers
///
/// Layout: binding 0 is the uniform block, bindings 1..=N are combined
/// image-samplers (fragment stage), one per texture. The pool is sized for
/// exactly `frame_count` sets; each set is written once at creation and never
/// rewritten. Per-frame uniform updates copy straight into the mapped buffer
/// of that frame, so callers must only update a frame whose previous GPU use
/// has completed (the frame stream's fence guarantees it).

use std::sync::Arc;
use bytemuck::Pod;
use crate::error::{Error, Result};
use crate::device::{
    BufferUsage, DescriptorBinding, DescriptorPoolHandle, DescriptorPoolSize, DescriptorResource,
    DescriptorSetHandle, DescriptorSetLayoutHandle, DescriptorType, DescriptorWrite,
    GraphicsDevice, ImageLayout, MemoryProperty, PipelineLayoutHandle, ShaderStage,
};
use crate::command::CommandBuffer;
use crate::resource::buffer::GpuBuffer;
use crate::resource::image::GpuImage;
use crate::resource::vertex::UniformLayout;
use crate::{engine_debug, engine_error};

pub struct DescriptorResourceSet {
    device: Arc<dyn GraphicsDevice>,
    layout: DescriptorSetLayoutHandle,
    pool: DescriptorPoolHandle,
    sets: Vec<DescriptorSetHandle>,
    uniform_buffers: Vec<GpuBuffer>,
    uniform_layout: UniformLayout,
    texture_count: u32,
}

impl DescriptorResourceSet {
    /// Create layout, pool, per-frame uniform buffers and sets, and write every set
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        uniform_layout: UniformLayout,
        frame_count: usize,
        textures: &[&GpuImage],
    ) -> Result<Self> {
        if frame_count == 0 {
            return Err(Error::InvalidResource("frame_count must be at least 1".to_string()));
        }
        if uniform_layout.size == 0 {
            return Err(Error::InvalidResource("Uniform block size must be non-zero".to_string()));
        }
        if let Some(texture) = textures.iter().find(|texture| texture.sampler().is_null()) {
            return Err(Error::InvalidResource(format!(
                "Texture {:?} has no sampler and cannot be bound",
                texture.image()
            )));
        }

        let frames = frame_count as u32;
        let texture_count = textures.len() as u32;

        // ========== LAYOUT ==========
        let mut bindings = vec![DescriptorBinding {
            binding: 0,
            descriptor_type: DescriptorType::UniformBuffer,
            count: 1,
            stages: uniform_layout.stages,
        }];
        bindings.extend((0..texture_count).map(|index| DescriptorBinding {
            binding: index + 1,
            descriptor_type: DescriptorType::CombinedImageSampler,
            count: 1,
            stages: ShaderStage::FRAGMENT,
        }));

        let layout = device
            .create_descriptor_set_layout(&bindings)
            .inspect_err(|e| engine_error!("ember::DescriptorResourceSet", "Failed to create set layout: {}", e))?;

        // Drop releases whatever is created from here on
        let mut resources = Self {
            device,
            layout,
            pool: DescriptorPoolHandle::NULL,
            sets: Vec::new(),
            uniform_buffers: Vec::with_capacity(frame_count),
            uniform_layout,
            texture_count,
        };

        // ========== POOL ==========
        let mut sizes = vec![DescriptorPoolSize { descriptor_type: DescriptorType::UniformBuffer, count: frames }];
        if texture_count > 0 {
            sizes.push(DescriptorPoolSize {
                descriptor_type: DescriptorType::CombinedImageSampler,
                count: frames * texture_count,
            });
        }
        resources.pool = resources
            .device
            .create_descriptor_pool(frames, &sizes)
            .inspect_err(|e| engine_error!("ember::DescriptorResourceSet", "Failed to create pool: {}", e))?;

        // ========== UNIFORM BUFFERS ==========
        for _ in 0..frame_count {
            let mut buffer = GpuBuffer::new(
                Arc::clone(&resources.device),
                uniform_layout.size,
                BufferUsage::UNIFORM,
                MemoryProperty::HOST_VISIBLE | MemoryProperty::HOST_COHERENT,
            )?;
            buffer.map_persistent()?;
            resources.uniform_buffers.push(buffer);
        }

        // ========== SETS ==========
        let layouts = vec![layout; frame_count];
        resources.sets = resources
            .device
            .allocate_descriptor_sets(resources.pool, &layouts)
            .inspect_err(|e| engine_error!("ember::DescriptorResourceSet", "Failed to allocate sets: {}", e))?;

        let mut writes = Vec::with_capacity(frame_count * (1 + textures.len()));
        for (set, buffer) in resources.sets.iter().zip(&resources.uniform_buffers) {
            writes.push(DescriptorWrite {
                set: *set,
                binding: 0,
                resource: DescriptorResource::UniformBuffer {
                    buffer: buffer.handle(),
                    offset: 0,
                    range: uniform_layout.size,
                },
            });
            for (index, texture) in textures.iter().enumerate() {
                writes.push(DescriptorWrite {
                    set: *set,
                    binding: index as u32 + 1,
                    resource: DescriptorResource::CombinedImageSampler {
                        view: texture.view(),
                        sampler: texture.sampler(),
                        layout: ImageLayout::ShaderReadOnlyOptimal,
                    },
                });
            }
        }
        resources.device.update_descriptor_sets(&writes);

        engine_debug!(
            "ember::DescriptorResourceSet",
            "Created {} descriptor sets ({} byte uniform, {} textures)",
            frame_count,
            uniform_layout.size,
            texture_count
        );
        Ok(resources)
    }

    pub fn layout(&self) -> DescriptorSetLayoutHandle {
        self.layout
    }

    pub fn frame_count(&self) -> usize {
        self.sets.len()
    }

    pub fn texture_count(&self) -> u32 {
        self.texture_count
    }

    pub fn uniform_layout(&self) -> UniformLayout {
        self.uniform_layout
    }

    pub fn set(&self, frame_index: usize) -> Option<DescriptorSetHandle> {
        self.sets.get(frame_index).copied()
    }

    pub fn uniform_buffer(&self, frame_index: usize) -> Option<&GpuBuffer> {
        self.uniform_buffers.get(frame_index)
    }

    /// Copy `data` into frame `frame_index`'s uniform buffer
    pub fn set_ubo(&self, frame_index: usize, data: &[u8]) -> Result<()> {
        let buffer = self.uniform_buffers.get(frame_index).ok_or_else(|| {
            Error::InvalidResource(format!(
                "Frame index {} out of range ({} frames)",
                frame_index,
                self.uniform_buffers.len()
            ))
        })?;
        if data.len() as u64 > self.uniform_layout.size {
            return Err(Error::InvalidResource(format!(
                "Uniform data of {} bytes exceeds block size {}",
                data.len(),
                self.uniform_layout.size
            )));
        }
        buffer.write_mapped(0, data)
    }

    /// Typed variant of [`set_ubo`](Self::set_ubo)
    pub fn set_uniform<T: Pod>(&self, frame_index: usize, value: &T) -> Result<()> {
        self.set_ubo(frame_index, bytemuck::bytes_of(value))
    }

    /// Bind frame `frame_index`'s set at set index 0
    pub fn bind(&self, cmd: &mut CommandBuffer, pipeline_layout: PipelineLayoutHandle, frame_index: usize) -> Result<()> {
        let set = self.set(frame_index).ok_or_else(|| {
            Error::InvalidResource(format!("Frame index {} out of range ({} frames)", frame_index, self.sets.len()))
        })?;
        cmd.bind_descriptor_set(pipeline_layout, 0, set)
    }
}

impl Drop for DescriptorResourceSet {
    fn drop(&mut self) {
        self.uniform_buffers.clear();
        if !self.pool.is_null() {
            // Frees every set allocated from it
            self.device.destroy_descriptor_pool(self.pool);
        }
        self.device.destroy_descriptor_set_layout(self.layout);
    }
}

#[cfg(test)]
#[path = "descriptor_set_tests.rs"]
mod tests;
