//! GPU resources
//!
//! Every type here exclusively owns the device objects it creates and
//! releases them on drop, in reverse creation order.

pub mod buffer;
pub mod image;
pub mod vertex;
pub mod mesh;
pub mod descriptor_set;

pub use buffer::GpuBuffer;
pub use image::{GpuImage, ImageData, StagedImage};
pub use vertex::{ColorVertex, PbrVertex, TexturedVertex, UniformLayout, Vertex, ViewProjection};
pub use mesh::{Mesh, MAX_INDEX_COUNT, MAX_VERTEX_COUNT, MODEL_PUSH_SIZE};
pub use descriptor_set::DescriptorResourceSet;
