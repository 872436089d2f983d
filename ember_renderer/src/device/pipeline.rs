/// Graphics pipeline descriptor types

use bitflags::bitflags;
use crate::device::{
    Format, PipelineLayoutHandle, RenderPassHandle, ShaderModuleHandle, ShaderStage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

/// One vertex attribute inside an interleaved binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute location in shader
    pub location: u32,
    pub format: Format,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Runtime description of an interleaved vertex buffer
///
/// Pipelines and meshes carry this as data, so one pipeline type serves
/// every vertex format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub binding: u32,
    /// Stride in bytes between consecutive vertices
    pub stride: u32,
    pub input_rate: VertexInputRate,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Per-vertex layout on binding 0
    pub fn new(stride: u32, attributes: Vec<VertexAttribute>) -> Self {
        Self {
            binding: 0,
            stride,
            input_rate: VertexInputRate::Vertex,
            attributes,
        }
    }
}

/// Push constant range declared on a pipeline layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: ShaderStage,
    /// Offset in bytes
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    Always,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorComponents: u32 {
        const R = 0x1;
        const G = 0x2;
        const B = 0x4;
        const A = 0x8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizationState {
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub line_width: f32,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            line_width: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    pub test_enable: bool,
    pub write_enable: bool,
    pub compare_op: CompareOp,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test_enable: true,
            write_enable: true,
            compare_op: CompareOp::Less,
        }
    }
}

/// Everything `create_graphics_pipeline` needs
///
/// Viewport and scissor are always dynamic state; blending is disabled
/// and all color components are written.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineDesc {
    pub vertex_shader: ShaderModuleHandle,
    pub fragment_shader: ShaderModuleHandle,
    /// Entry point name for both stages
    pub entry_point: String,
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationState,
    pub depth: DepthState,
    pub sample_count: u32,
    pub color_write_mask: ColorComponents,
    pub layout: PipelineLayoutHandle,
    pub render_pass: RenderPassHandle,
    pub subpass: u32,
}
