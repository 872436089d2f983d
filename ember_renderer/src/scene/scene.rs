/// Scene: the pipelines built from a scene description
///
/// Each pipeline owns its meshes and textures. The scene remembers every
/// mesh's placement from the description so animation can be applied on top
/// of it without drift.

use std::path::Path;
use std::sync::Arc;
use glam::Mat4;
use crate::error::Result;
use crate::device::{Extent2D, Format, GraphicsDevice};
use crate::command::{CommandBuffer, RenderTarget, TransientCommandExecutor};
use crate::loader::{load_obj, scene::resolve, PipelineRecord, SceneDescription};
use crate::pipeline::{RenderMode, RenderPipeline};
use crate::resource::{Mesh, StagedImage, ViewProjection};
use crate::scene::AnimationClock;
use crate::engine_info;

pub struct Scene {
    pipelines: Vec<RenderPipeline>,
    /// Placement of every mesh, per pipeline, in insertion order
    base_models: Vec<Vec<Mat4>>,
}

impl Scene {
    /// Load every pipeline, mesh and texture the description names
    ///
    /// Relative paths resolve against `base_dir`. Anything built before a
    /// failure is released on return.
    pub fn build(
        device: Arc<dyn GraphicsDevice>,
        executor: &TransientCommandExecutor,
        description: &SceneDescription,
        base_dir: &Path,
        target: &RenderTarget,
        frame_count: usize,
    ) -> Result<Self> {
        let mut scene = Self { pipelines: Vec::new(), base_models: Vec::new() };

        for record in &description.pipelines {
            let (pipeline, models) = build_pipeline(&device, executor, record, base_dir, target, frame_count)?;
            scene.pipelines.push(pipeline);
            scene.base_models.push(models);
        }

        engine_info!(
            "ember::Scene",
            "Scene built: {} pipelines, {} meshes",
            scene.pipelines.len(),
            scene.mesh_count()
        );
        Ok(scene)
    }

    /// Read a scene file and build it relative to the file's directory
    pub fn load(
        device: Arc<dyn GraphicsDevice>,
        executor: &TransientCommandExecutor,
        path: impl AsRef<Path>,
        target: &RenderTarget,
        frame_count: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let description = SceneDescription::from_file(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::build(device, executor, &description, base_dir, target, frame_count)
    }

    pub fn pipelines(&self) -> &[RenderPipeline] {
        &self.pipelines
    }

    pub fn mesh_count(&self) -> usize {
        self.pipelines.iter().map(|pipeline| pipeline.meshes().len()).sum()
    }

    /// Record every pipeline in order
    pub fn record(&self, cmd: &mut CommandBuffer, extent: Extent2D, frame_index: usize) -> Result<()> {
        for pipeline in &self.pipelines {
            pipeline.record(cmd, extent, frame_index)?;
        }
        Ok(())
    }

    /// Upload the camera for frame `frame_index` into every pipeline
    pub fn set_view_projection(&self, frame_index: usize, view_projection: &ViewProjection) -> Result<()> {
        for pipeline in &self.pipelines {
            pipeline.set_uniform(frame_index, view_projection)?;
        }
        Ok(())
    }

    /// Advance the render mode of every pipeline; returns the first pipeline's new mode
    pub fn cycle_render_mode(&mut self) -> Option<RenderMode> {
        self.pipelines
            .iter_mut()
            .map(RenderPipeline::cycle_render_mode)
            .fold(None, |first, mode| first.or(mode))
    }

    /// Spin every mesh around its local Y axis by the clock's angle
    pub fn update(&mut self, clock: &AnimationClock) {
        let spin = Mat4::from_rotation_y(clock.angle());
        for (pipeline, models) in self.pipelines.iter_mut().zip(&self.base_models) {
            for (mesh, base) in pipeline.meshes_mut().iter_mut().zip(models) {
                mesh.set_model(*base * spin);
            }
        }
    }
}

fn build_pipeline(
    device: &Arc<dyn GraphicsDevice>,
    executor: &TransientCommandExecutor,
    record: &PipelineRecord,
    base_dir: &Path,
    target: &RenderTarget,
    frame_count: usize,
) -> Result<(RenderPipeline, Vec<Mat4>)> {
    let mut pipeline = RenderPipeline::pbr(Arc::clone(device), record.kind.into());
    pipeline.load_shaders(resolve(base_dir, &record.vertex_file), resolve(base_dir, &record.fragment_file))?;

    let mut models = Vec::with_capacity(record.objects.len());
    for object in &record.objects {
        let geometry = load_obj(resolve(base_dir, &object.file), object.winding)?;
        let mut mesh = Mesh::upload(Arc::clone(device), executor, &geometry.vertices, &geometry.indices)?;
        let model = object.model_matrix();
        mesh.set_model(model);
        pipeline.add_mesh(mesh)?;
        models.push(model);
    }

    // Diffuse holds colour data; every other map is linear
    for (index, file) in record.texture_files.iter().enumerate() {
        let format = if index == 0 { Format::R8G8B8A8_SRGB } else { Format::R8G8B8A8_UNORM };
        let texture = StagedImage::from_file(Arc::clone(device), resolve(base_dir, file))?.initialize(executor, format)?;
        pipeline.add_texture(texture)?;
    }

    pipeline.initialize(target, frame_count)?;
    Ok((pipeline, models))
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
