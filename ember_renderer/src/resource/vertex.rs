/// Vertex formats and uniform layouts as runtime data
///
/// Each vertex type is a `#[repr(C)]` plain-old-data struct that also reports
/// its own [`VertexLayout`]. Pipelines and meshes store the layout value, so a
/// single pipeline type serves every vertex format.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use crate::device::{Format, ShaderStage, VertexAttribute, VertexLayout};

/// A vertex that can be uploaded as-is and described to a pipeline
pub trait Vertex: Pod {
    fn layout() -> VertexLayout;
}

fn attribute(location: u32, format: Format, offset: usize) -> VertexAttribute {
    VertexAttribute { location, format, offset: offset as u32 }
}

/// Position and per-vertex colour
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: Vec3,
    pub color: Vec3,
}

impl Vertex for ColorVertex {
    fn layout() -> VertexLayout {
        VertexLayout::new(
            std::mem::size_of::<Self>() as u32,
            vec![
                attribute(0, Format::R32G32B32_SFLOAT, std::mem::offset_of!(Self, position)),
                attribute(1, Format::R32G32B32_SFLOAT, std::mem::offset_of!(Self, color)),
            ],
        )
    }
}

/// Position and texture coordinate
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct TexturedVertex {
    pub position: Vec3,
    pub uv: Vec2,
}

impl Vertex for TexturedVertex {
    fn layout() -> VertexLayout {
        VertexLayout::new(
            std::mem::size_of::<Self>() as u32,
            vec![
                attribute(0, Format::R32G32B32_SFLOAT, std::mem::offset_of!(Self, position)),
                attribute(1, Format::R32G32_SFLOAT, std::mem::offset_of!(Self, uv)),
            ],
        )
    }
}

/// Vertex for normal-mapped PBR shading
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PbrVertex {
    pub position: Vec3,
    pub uv: Vec2,
    pub normal: Vec3,
    pub tangent: Vec3,
}

impl Vertex for PbrVertex {
    fn layout() -> VertexLayout {
        VertexLayout::new(
            std::mem::size_of::<Self>() as u32,
            vec![
                attribute(0, Format::R32G32B32_SFLOAT, std::mem::offset_of!(Self, position)),
                attribute(1, Format::R32G32_SFLOAT, std::mem::offset_of!(Self, uv)),
                attribute(2, Format::R32G32B32_SFLOAT, std::mem::offset_of!(Self, normal)),
                attribute(3, Format::R32G32B32_SFLOAT, std::mem::offset_of!(Self, tangent)),
            ],
        )
    }
}

// ===== UNIFORMS =====

/// Size and visibility of the uniform block at binding 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLayout {
    pub size: u64,
    pub stages: ShaderStage,
}

impl UniformLayout {
    /// Layout of a `Pod` uniform struct visible to the vertex stage
    pub fn of<T: Pod>() -> Self {
        Self { size: std::mem::size_of::<T>() as u64, stages: ShaderStage::VERTEX }
    }

    pub fn with_stages(mut self, stages: ShaderStage) -> Self {
        self.stages = stages;
        self
    }
}

/// Per-frame camera uniform
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct ViewProjection {
    pub proj: Mat4,
    pub view: Mat4,
}

impl ViewProjection {
    /// Right-handed look-at camera with a Vulkan clip-space projection (Y down, depth 0..1)
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut proj = Mat4::perspective_rh(fov_y_radians, aspect, near, far);
        proj.y_axis.y *= -1.0;
        Self { proj, view: Mat4::look_at_rh(eye, target, up) }
    }
}

#[cfg(test)]
#[path = "vertex_tests.rs"]
mod tests;
