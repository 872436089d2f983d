/// Graphics pipeline owning its meshes, textures and per-frame descriptor sets
///
/// ```text
/// Unconfigured ──load_shaders──▶ ShadersLoaded ──initialize──▶ Initialized ──clean_up──▶ Destroyed
/// ```
///
/// Meshes can be attached at any point before destruction; textures only
/// before `initialize`, since they are written into the descriptor sets once.
/// Fixed-function state is not configurable: triangle lists, back-face
/// culling with counter-clockwise front faces, one sample, no blending,
/// depth test and write with LESS, dynamic viewport and scissor.

use std::path::Path;
use std::sync::Arc;
use bytemuck::Pod;
use crate::error::{Error, Result};
use crate::device::{
    ColorComponents, DepthState, Extent2D, GraphicsDevice, GraphicsPipelineDesc, PipelineHandle,
    PipelineLayoutHandle, PrimitiveTopology, PushConstantRange, RasterizationState, Rect2D,
    ShaderModuleHandle, ShaderStage, VertexLayout, Viewport,
};
use crate::command::{CommandBuffer, RenderTarget};
use crate::pipeline::shader::{ShaderCode, ENTRY_POINT};
use crate::resource::{
    DescriptorResourceSet, GpuImage, Mesh, PbrVertex, UniformLayout, Vertex, ViewProjection, MODEL_PUSH_SIZE,
};
use crate::{engine_debug, engine_error, engine_info};

/// Lifecycle of a [`RenderPipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Unconfigured,
    ShadersLoaded,
    Initialized,
    Destroyed,
}

/// Which PBR texture convention a pipeline follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PbrKind {
    Metalness,
    Specular,
}

impl PbrKind {
    /// Conventional texture maps, in binding order (binding 1 onwards)
    ///
    /// The first map is colour data and is uploaded as sRGB; the rest are
    /// linear. Pipelines accept any number of maps.
    pub fn texture_names(self) -> &'static [&'static str] {
        match self {
            PbrKind::Metalness => &["diffuse", "normal", "metalness", "roughness"],
            PbrKind::Specular => &["diffuse", "normal", "gloss", "specular"],
        }
    }
}

/// Debug output selected by the fragment shader
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    #[default]
    Combined = 0,
    Albedo = 1,
    Normal = 2,
    Specular = 3,
}

impl RenderMode {
    const COUNT: u32 = 4;

    pub fn from_index(index: u32) -> Self {
        match index % Self::COUNT {
            0 => RenderMode::Combined,
            1 => RenderMode::Albedo,
            2 => RenderMode::Normal,
            _ => RenderMode::Specular,
        }
    }

    pub fn next(self) -> Self {
        Self::from_index(self as u32 + 1)
    }
}

/// Size of the render mode pushed to the fragment stage
const RENDER_MODE_PUSH_SIZE: u32 = std::mem::size_of::<u32>() as u32;

pub struct RenderPipeline {
    device: Arc<dyn GraphicsDevice>,
    state: PipelineState,
    kind: Option<PbrKind>,
    vertex_layout: VertexLayout,
    uniform_layout: UniformLayout,
    render_mode: Option<RenderMode>,

    vertex_shader: Option<ShaderCode>,
    fragment_shader: Option<ShaderCode>,

    meshes: Vec<Mesh>,
    textures: Vec<GpuImage>,
    descriptor_set: Option<DescriptorResourceSet>,
    layout: PipelineLayoutHandle,
    pipeline: PipelineHandle,
}

impl RenderPipeline {
    /// Pipeline for vertices of type `V` with a uniform block of `uniform_layout`
    pub fn new<V: Vertex>(device: Arc<dyn GraphicsDevice>, uniform_layout: UniformLayout) -> Self {
        Self::with_layouts(device, V::layout(), uniform_layout)
    }

    /// Pipeline from runtime vertex and uniform layouts
    pub fn with_layouts(
        device: Arc<dyn GraphicsDevice>,
        vertex_layout: VertexLayout,
        uniform_layout: UniformLayout,
    ) -> Self {
        Self {
            device,
            state: PipelineState::Unconfigured,
            kind: None,
            vertex_layout,
            uniform_layout,
            render_mode: None,
            vertex_shader: None,
            fragment_shader: None,
            meshes: Vec::new(),
            textures: Vec::new(),
            descriptor_set: None,
            layout: PipelineLayoutHandle::NULL,
            pipeline: PipelineHandle::NULL,
        }
    }

    /// PBR pipeline: [`PbrVertex`] input, [`ViewProjection`] uniforms, render modes enabled
    pub fn pbr(device: Arc<dyn GraphicsDevice>, kind: PbrKind) -> Self {
        let mut pipeline = Self::new::<PbrVertex>(device, UniformLayout::of::<ViewProjection>());
        pipeline.kind = Some(kind);
        pipeline.render_mode = Some(RenderMode::Combined);
        pipeline
    }

    // ===== ACCESSORS =====

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn kind(&self) -> Option<PbrKind> {
        self.kind
    }

    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    pub fn uniform_layout(&self) -> UniformLayout {
        self.uniform_layout
    }

    /// `None` when the pipeline has no render modes
    pub fn render_mode(&self) -> Option<RenderMode> {
        self.render_mode
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn meshes_mut(&mut self) -> &mut [Mesh] {
        &mut self.meshes
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn handle(&self) -> PipelineHandle {
        self.pipeline
    }

    pub fn layout(&self) -> PipelineLayoutHandle {
        self.layout
    }

    pub fn descriptor_set(&self) -> Option<&DescriptorResourceSet> {
        self.descriptor_set.as_ref()
    }

    /// Push constant ranges: model matrix for the vertex stage, then the render mode
    pub fn push_constant_ranges(&self) -> Vec<PushConstantRange> {
        let mut ranges = vec![PushConstantRange { stages: ShaderStage::VERTEX, offset: 0, size: MODEL_PUSH_SIZE }];
        if self.render_mode.is_some() {
            ranges.push(PushConstantRange {
                stages: ShaderStage::FRAGMENT,
                offset: MODEL_PUSH_SIZE,
                size: RENDER_MODE_PUSH_SIZE,
            });
        }
        ranges
    }

    // ===== CONFIGURATION =====

    fn ensure_configurable(&self, what: &str) -> Result<()> {
        match self.state {
            PipelineState::Unconfigured | PipelineState::ShadersLoaded => Ok(()),
            state => Err(Error::InvalidState(format!("Cannot {} in state {:?}", what, state))),
        }
    }

    /// Read both SPIR-V files
    pub fn load_shaders(&mut self, vertex_path: impl AsRef<Path>, fragment_path: impl AsRef<Path>) -> Result<()> {
        self.ensure_configurable("load shaders")?;
        let vertex = ShaderCode::load(vertex_path)?;
        let fragment = ShaderCode::load(fragment_path)?;
        self.set_shaders(vertex, fragment)
    }

    pub fn set_shaders(&mut self, vertex: ShaderCode, fragment: ShaderCode) -> Result<()> {
        self.ensure_configurable("set shaders")?;
        self.vertex_shader = Some(vertex);
        self.fragment_shader = Some(fragment);
        self.state = PipelineState::ShadersLoaded;
        Ok(())
    }

    /// Attach a mesh; it is drawn after every mesh attached before it
    pub fn add_mesh(&mut self, mesh: Mesh) -> Result<()> {
        if self.state == PipelineState::Destroyed {
            return Err(Error::InvalidState("Cannot add a mesh to a destroyed pipeline".to_string()));
        }
        if mesh.vertex_layout() != &self.vertex_layout {
            return Err(Error::InvalidResource(format!(
                "Mesh vertex stride {} does not match pipeline layout (stride {})",
                mesh.vertex_layout().stride,
                self.vertex_layout.stride
            )));
        }
        self.meshes.push(mesh);
        Ok(())
    }

    /// Attach a sampled texture at the next combined image-sampler binding
    pub fn add_texture(&mut self, texture: GpuImage) -> Result<()> {
        self.ensure_configurable("add a texture")?;
        self.textures.push(texture);
        Ok(())
    }

    // ===== INITIALIZATION =====

    /// Create descriptor sets, pipeline layout and pipeline for `frame_count` frames
    ///
    /// On failure every object created here is released and the pipeline
    /// stays in `ShadersLoaded`.
    pub fn initialize(&mut self, target: &RenderTarget, frame_count: usize) -> Result<()> {
        if self.state != PipelineState::ShadersLoaded {
            return Err(Error::InvalidState(format!("Cannot initialize in state {:?}", self.state)));
        }

        let result = self.create_gpu_objects(target, frame_count);
        if result.is_err() {
            self.release_gpu_objects();
            return result;
        }

        self.state = PipelineState::Initialized;
        engine_info!(
            "ember::RenderPipeline",
            "Pipeline ready: {} meshes, {} textures, {} frames",
            self.meshes.len(),
            self.textures.len(),
            frame_count
        );
        Ok(())
    }

    fn create_gpu_objects(&mut self, target: &RenderTarget, frame_count: usize) -> Result<()> {
        let (vertex_code, fragment_code) = match (&self.vertex_shader, &self.fragment_shader) {
            (Some(vertex), Some(fragment)) => (vertex, fragment),
            _ => return Err(Error::InvalidState("Shaders are not loaded".to_string())),
        };

        let vertex_module = self
            .device
            .create_shader_module(vertex_code.words())
            .inspect_err(|e| engine_error!("ember::RenderPipeline", "Vertex shader {:?}: {}", vertex_code.origin(), e))?;
        let fragment_module = match self.device.create_shader_module(fragment_code.words()) {
            Ok(module) => module,
            Err(e) => {
                engine_error!("ember::RenderPipeline", "Fragment shader {:?}: {}", fragment_code.origin(), e);
                self.device.destroy_shader_module(vertex_module);
                return Err(e);
            }
        };

        // Modules are only needed while the pipeline is being created
        let result = self.create_pipeline(target, frame_count, vertex_module, fragment_module);
        self.device.destroy_shader_module(vertex_module);
        self.device.destroy_shader_module(fragment_module);
        result
    }

    fn create_pipeline(
        &mut self,
        target: &RenderTarget,
        frame_count: usize,
        vertex_shader: ShaderModuleHandle,
        fragment_shader: ShaderModuleHandle,
    ) -> Result<()> {
        let textures: Vec<&GpuImage> = self.textures.iter().collect();
        let descriptor_set =
            DescriptorResourceSet::new(Arc::clone(&self.device), self.uniform_layout, frame_count, &textures)?;
        let set_layout = descriptor_set.layout();
        self.descriptor_set = Some(descriptor_set);

        self.layout = self
            .device
            .create_pipeline_layout(&[set_layout], &self.push_constant_ranges())
            .inspect_err(|e| engine_error!("ember::RenderPipeline", "Failed to create pipeline layout: {}", e))?;

        let desc = GraphicsPipelineDesc {
            vertex_shader,
            fragment_shader,
            entry_point: ENTRY_POINT.to_string(),
            vertex_layout: self.vertex_layout.clone(),
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth: DepthState::default(),
            sample_count: 1,
            color_write_mask: ColorComponents::all(),
            layout: self.layout,
            render_pass: target.render_pass,
            subpass: 0,
        };
        self.pipeline = self
            .device
            .create_graphics_pipeline(&desc)
            .inspect_err(|e| engine_error!("ember::RenderPipeline", "Failed to create graphics pipeline: {}", e))?;
        Ok(())
    }

    fn release_gpu_objects(&mut self) {
        if !self.pipeline.is_null() {
            self.device.destroy_pipeline(self.pipeline);
            self.pipeline = PipelineHandle::NULL;
        }
        if !self.layout.is_null() {
            self.device.destroy_pipeline_layout(self.layout);
            self.layout = PipelineLayoutHandle::NULL;
        }
        self.descriptor_set = None;
    }

    // ===== PER FRAME =====

    fn descriptor_set_ready(&self) -> Result<&DescriptorResourceSet> {
        match (&self.state, &self.descriptor_set) {
            (PipelineState::Initialized, Some(set)) => Ok(set),
            _ => Err(Error::InvalidState(format!("Pipeline not initialized (state {:?})", self.state))),
        }
    }

    /// Record every attached mesh for frame `frame_index`
    pub fn record(&self, cmd: &mut CommandBuffer, extent: Extent2D, frame_index: usize) -> Result<()> {
        let descriptor_set = self.descriptor_set_ready()?;

        cmd.bind_pipeline(self.pipeline)?;
        cmd.set_viewport(&Viewport::from_extent(extent))?;
        cmd.set_scissor(&Rect2D::from_extent(extent))?;
        descriptor_set.bind(cmd, self.layout, frame_index)?;

        if let Some(mode) = self.render_mode {
            cmd.push_constants(self.layout, ShaderStage::FRAGMENT, MODEL_PUSH_SIZE, bytemuck::bytes_of(&(mode as u32)))?;
        }

        for mesh in &self.meshes {
            mesh.draw(cmd, self.layout)?;
        }
        Ok(())
    }

    /// Copy raw uniform bytes into frame `frame_index`'s buffer
    pub fn set_ubo(&self, frame_index: usize, data: &[u8]) -> Result<()> {
        self.descriptor_set_ready()?.set_ubo(frame_index, data)
    }

    pub fn set_uniform<T: Pod>(&self, frame_index: usize, value: &T) -> Result<()> {
        self.descriptor_set_ready()?.set_uniform(frame_index, value)
    }

    /// Advance Combined → Albedo → Normal → Specular → Combined
    pub fn cycle_render_mode(&mut self) -> Option<RenderMode> {
        self.render_mode = self.render_mode.map(RenderMode::next);
        if let Some(mode) = self.render_mode {
            engine_debug!("ember::RenderPipeline", "Render mode {:?}", mode);
        }
        self.render_mode
    }

    // ===== DESTRUCTION =====

    /// Release meshes, pipeline, pipeline layout, descriptor sets, then textures
    ///
    /// Safe to call more than once; the GPU must no longer use any of them.
    pub fn clean_up(&mut self) {
        if self.state == PipelineState::Destroyed {
            return;
        }
        self.meshes.clear();
        self.release_gpu_objects();
        self.textures.clear();
        self.vertex_shader = None;
        self.fragment_shader = None;
        self.state = PipelineState::Destroyed;
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        self.clean_up();
    }
}

#[cfg(test)]
#[path = "render_pipeline_tests.rs"]
mod tests;
