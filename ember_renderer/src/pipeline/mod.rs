//! Shaders and graphics pipelines

pub mod shader;
pub mod render_pipeline;

pub use shader::{ShaderCode, ENTRY_POINT, SPIRV_MAGIC};
pub use render_pipeline::{PbrKind, PipelineState, RenderMode, RenderPipeline};
