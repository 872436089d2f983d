/// Indexed mesh in device-local vertex and index buffers
///
/// Indices are stored as 16-bit values, so a mesh holds at most
/// [`MAX_INDEX_COUNT`] indices referencing at most [`MAX_VERTEX_COUNT`]
/// vertices. Input that does not fit is rejected rather than truncated.

use std::sync::Arc;
use glam::Mat4;
use crate::error::{Error, Result};
use crate::device::{BufferUsage, GraphicsDevice, IndexType, PipelineLayoutHandle, ShaderStage, VertexLayout};
use crate::command::{CommandBuffer, TransientCommandExecutor};
use crate::resource::buffer::GpuBuffer;
use crate::resource::vertex::Vertex;
use crate::{engine_debug, engine_error};

/// Largest index list a mesh accepts
pub const MAX_INDEX_COUNT: usize = u16::MAX as usize;

/// Largest vertex list addressable with 16-bit indices
pub const MAX_VERTEX_COUNT: usize = u16::MAX as usize + 1;

/// Size of the model matrix pushed before each draw
pub const MODEL_PUSH_SIZE: u32 = std::mem::size_of::<Mat4>() as u32;

pub struct Mesh {
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    vertex_layout: VertexLayout,
    vertex_count: u32,
    index_count: u32,
    model: Mat4,
}

impl Mesh {
    /// Validate the geometry and upload it through staging buffers
    pub fn upload<V: Vertex>(
        device: Arc<dyn GraphicsDevice>,
        executor: &TransientCommandExecutor,
        vertices: &[V],
        indices: &[u32],
    ) -> Result<Self> {
        let indices = validate(vertices.len(), indices)
            .inspect_err(|e| engine_error!("ember::Mesh", "Rejected geometry: {}", e))?;

        let vertex_buffer = GpuBuffer::new_staged(
            Arc::clone(&device),
            executor,
            bytemuck::cast_slice(vertices),
            BufferUsage::VERTEX,
        )?;
        let index_buffer = GpuBuffer::new_staged(
            device,
            executor,
            bytemuck::cast_slice(&indices),
            BufferUsage::INDEX,
        )?;

        engine_debug!("ember::Mesh", "Uploaded mesh: {} vertices, {} indices", vertices.len(), indices.len());

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_layout: V::layout(),
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
            model: Mat4::IDENTITY,
        })
    }

    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_buffer(&self) -> &GpuBuffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &GpuBuffer {
        &self.index_buffer
    }

    pub fn model(&self) -> Mat4 {
        self.model
    }

    pub fn set_model(&mut self, model: Mat4) {
        self.model = model;
    }

    /// Bind buffers, push the model matrix and issue one indexed draw
    pub fn draw(&self, cmd: &mut CommandBuffer, pipeline_layout: PipelineLayoutHandle) -> Result<()> {
        cmd.bind_vertex_buffer(self.vertex_buffer.handle(), 0)?;
        cmd.bind_index_buffer(self.index_buffer.handle(), 0, IndexType::U16)?;
        cmd.push_constants(pipeline_layout, ShaderStage::VERTEX, 0, bytemuck::bytes_of(&self.model))?;
        cmd.draw_indexed(self.index_count, 1, 0, 0, 0)
    }
}

/// Check counts and ranges, then narrow to 16-bit indices
fn validate(vertex_count: usize, indices: &[u32]) -> Result<Vec<u16>> {
    if vertex_count == 0 || indices.is_empty() {
        return Err(Error::InvalidResource("Mesh needs at least one vertex and one index".to_string()));
    }
    if indices.len() > MAX_INDEX_COUNT {
        return Err(Error::InvalidResource(format!(
            "{} indices exceed the 16-bit limit of {}",
            indices.len(),
            MAX_INDEX_COUNT
        )));
    }
    if vertex_count > MAX_VERTEX_COUNT {
        return Err(Error::InvalidResource(format!(
            "{} vertices cannot be addressed with 16-bit indices",
            vertex_count
        )));
    }
    if let Some((position, index)) = indices.iter().enumerate().find(|(_, &index)| index as usize >= vertex_count) {
        return Err(Error::InvalidResource(format!(
            "Index {} at position {} out of range ({} vertices)",
            index, position, vertex_count
        )));
    }
    Ok(indices.iter().map(|&index| index as u16).collect())
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
