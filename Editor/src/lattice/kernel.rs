//! Render-world execution of the deformation passes.
//!
//! The main world queues [`KernelPassRequest`]s on [`KernelDispatch`]; they are
//! extracted every frame, bound in `PrepareBindGroups` and drawn as fullscreen
//! triangles into the float targets by [`KernelNode`], before any camera runs.
//! The shared shading parameters of the material programs travel the same way
//! and are written straight into their parameter textures.

use bevy::core_pipeline::fullscreen_vertex_shader::fullscreen_shader_vertex_state;
use bevy::prelude::*;
use bevy::render::extract_resource::{ExtractResource, ExtractResourcePlugin};
use bevy::render::graph::CameraDriverLabel;
use bevy::render::render_asset::RenderAssets;
use bevy::render::render_graph::{self, RenderGraph, RenderLabel};
use bevy::render::render_resource::binding_types::{texture_2d, uniform_buffer};
use bevy::render::render_resource::{
    BindGroup, BindGroupEntries, BindGroupLayout, BindGroupLayoutEntries, CachedRenderPipelineId, ColorTargetState,
    ColorWrites, Extent3d, FragmentState, ImageCopyTexture, ImageDataLayout, LoadOp, MultisampleState, Operations, PipelineCache, PrimitiveState,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipelineDescriptor, ShaderDefVal, ShaderStages, ShaderType, Origin3d, TextureAspect,
    SpecializedRenderPipeline, SpecializedRenderPipelines, StoreOp, TextureDescriptor, TextureDimension,
    TextureFormat, TextureSampleType, TextureUsages, TextureView, TextureViewDescriptor, UniformBuffer,
};
use bevy::render::renderer::{RenderContext, RenderDevice, RenderQueue};
use bevy::render::{Render, RenderApp, RenderSet};
use lattice_engine::api::KernelPass;
use lattice_engine::NoiseDepth;

use super::materials::PARAM_TEXELS;

pub const KERNEL_SHADER: &str = "shaders/lattice_kernel.wgsl";

#[derive(Clone, Copy, Debug, Default, PartialEq, ShaderType)]
pub struct KernelUniform {
    pub size: Vec4,
    pub grid: Vec4,
    pub noise: Vec4,
    pub displace: Vec4,
}

/// Compile-time variant of the deformation program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub pass: KernelPass,
    pub warp: bool,
    pub depth: NoiseDepth,
}

impl KernelKey {
    fn shader_defs(&self) -> Vec<ShaderDefVal> {
        let pass = match self.pass {
            KernelPass::Position => "POSITION_PASS",
            KernelPass::NormalA => "NORMAL_A_PASS",
            KernelPass::NormalB => "NORMAL_B_PASS",
        };
        let mut defs = vec![pass.into(), self.depth.keyword().into()];
        if self.warp {
            defs.push("ENABLE_WARP".into());
        }
        defs
    }
}

#[derive(Clone, Debug)]
pub struct KernelPassRequest {
    pub key: KernelKey,
    pub uniform: KernelUniform,
    pub source: Option<Handle<Image>>,
    pub target: Handle<Image>,
}

/// New contents for a program's parameter texture.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamUpload {
    pub target: Handle<Image>,
    pub texels: [Vec4; PARAM_TEXELS as usize],
}

/// Passes to run this frame, in submission order, and parameter writes.
#[derive(Resource, Clone, Debug, Default, ExtractResource)]
pub struct KernelDispatch {
    pub passes: Vec<KernelPassRequest>,
    pub params: Vec<ParamUpload>,
}

impl KernelDispatch {
    /// Queues a parameter write, replacing an earlier one for the same texture.
    pub fn upload_params(&mut self, upload: ParamUpload) {
        match self.params.iter_mut().find(|queued| queued.target == upload.target) {
            Some(queued) => *queued = upload,
            None => self.params.push(upload),
        }
    }

    pub fn clear(&mut self) {
        self.passes.clear();
        self.params.clear();
    }
}

#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct KernelPassLabel;

pub struct KernelPlugin;

impl Plugin for KernelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<KernelDispatch>()
            .add_plugins(ExtractResourcePlugin::<KernelDispatch>::default());

        let Ok(render_app) = app.get_sub_app_mut(RenderApp) else {
            return;
        };
        render_app
            .init_resource::<SpecializedRenderPipelines<KernelPipeline>>()
            .init_resource::<PreparedKernelPasses>()
            .add_systems(
                Render,
                (
                    write_program_params.in_set(RenderSet::PrepareResources),
                    prepare_kernel_passes.in_set(RenderSet::PrepareBindGroups),
                ),
            );

        let mut graph = render_app.world.resource_mut::<RenderGraph>();
        graph.add_node(KernelPassLabel, KernelNode);
        graph.add_node_edge(KernelPassLabel, CameraDriverLabel);
    }

    fn finish(&self, app: &mut App) {
        if let Ok(render_app) = app.get_sub_app_mut(RenderApp) {
            render_app.init_resource::<KernelPipeline>();
        }
    }
}

#[derive(Resource)]
pub struct KernelPipeline {
    layout: BindGroupLayout,
    shader: Handle<Shader>,
    /// Bound as the source of passes that read nothing.
    empty_source: TextureView,
}

impl FromWorld for KernelPipeline {
    fn from_world(world: &mut World) -> Self {
        let render_device = world.resource::<RenderDevice>();
        let layout = render_device.create_bind_group_layout(
            "lattice_kernel_layout",
            &BindGroupLayoutEntries::sequential(
                ShaderStages::FRAGMENT,
                (
                    uniform_buffer::<KernelUniform>(false),
                    texture_2d(TextureSampleType::Float { filterable: false }),
                ),
            ),
        );
        let empty = render_device.create_texture(&TextureDescriptor {
            label: Some("lattice_kernel_empty_source"),
            size: Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba32Float,
            usage: TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let empty_source = empty.create_view(&TextureViewDescriptor::default());
        let shader = world.resource::<AssetServer>().load(KERNEL_SHADER);
        Self { layout, shader, empty_source }
    }
}

impl SpecializedRenderPipeline for KernelPipeline {
    type Key = KernelKey;

    fn specialize(&self, key: Self::Key) -> RenderPipelineDescriptor {
        RenderPipelineDescriptor {
            label: Some(format!("lattice_kernel_{:?}", key.pass).into()),
            layout: vec![self.layout.clone()],
            push_constant_ranges: Vec::new(),
            vertex: fullscreen_shader_vertex_state(),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState::default(),
            fragment: Some(FragmentState {
                shader: self.shader.clone(),
                shader_defs: key.shader_defs(),
                entry_point: "fragment".into(),
                targets: vec![Some(ColorTargetState {
                    format: TextureFormat::Rgba32Float,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })],
            }),
        }
    }
}

struct PreparedPass {
    pipeline: CachedRenderPipelineId,
    bind_group: BindGroup,
    target: TextureView,
}

#[derive(Resource, Default)]
struct PreparedKernelPasses {
    passes: Vec<PreparedPass>,
}

/// Writes the queued parameters into their textures. Textures that are not
/// uploaded yet are skipped; the parameters are queued again next frame.
fn write_program_params(
    dispatch: Res<KernelDispatch>,
    images: Res<RenderAssets<Image>>,
    render_queue: Res<RenderQueue>,
) {
    for upload in &dispatch.params {
        let Some(image) = images.get(&upload.target) else {
            continue;
        };
        let bytes: Vec<u8> =
            upload.texels.iter().flat_map(|texel| texel.to_array()).flat_map(f32::to_le_bytes).collect();
        render_queue.write_texture(
            ImageCopyTexture {
                texture: &image.texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            &bytes,
            ImageDataLayout { offset: 0, bytes_per_row: Some(PARAM_TEXELS * 16), rows_per_image: None },
            Extent3d { width: PARAM_TEXELS, height: 1, depth_or_array_layers: 1 },
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn prepare_kernel_passes(
    dispatch: Res<KernelDispatch>,
    kernel_pipeline: Res<KernelPipeline>,
    mut pipelines: ResMut<SpecializedRenderPipelines<KernelPipeline>>,
    pipeline_cache: Res<PipelineCache>,
    images: Res<RenderAssets<Image>>,
    render_device: Res<RenderDevice>,
    render_queue: Res<RenderQueue>,
    mut prepared: ResMut<PreparedKernelPasses>,
) {
    prepared.passes.clear();
    for request in &dispatch.passes {
        let Some(target) = images.get(&request.target) else {
            // Not uploaded yet; a partial chain would read stale data.
            prepared.passes.clear();
            return;
        };
        let source = match &request.source {
            Some(handle) => match images.get(handle) {
                Some(image) => &image.texture_view,
                None => {
                    prepared.passes.clear();
                    return;
                }
            },
            None => &kernel_pipeline.empty_source,
        };

        let mut uniform = UniformBuffer::from(request.uniform);
        uniform.write_buffer(&render_device, &render_queue);
        let Some(binding) = uniform.binding() else {
            prepared.passes.clear();
            return;
        };
        let bind_group = render_device.create_bind_group(
            "lattice_kernel_bind_group",
            &kernel_pipeline.layout,
            &BindGroupEntries::sequential((binding, source)),
        );
        prepared.passes.push(PreparedPass {
            pipeline: pipelines.specialize(&pipeline_cache, &kernel_pipeline, request.key),
            bind_group,
            target: target.texture_view.clone(),
        });
    }
}

#[derive(Default)]
struct KernelNode;

impl render_graph::Node for KernelNode {
    fn run(
        &self,
        _graph: &mut render_graph::RenderGraphContext,
        render_context: &mut RenderContext,
        world: &World,
    ) -> Result<(), render_graph::NodeRunError> {
        let pipeline_cache = world.resource::<PipelineCache>();
        let prepared = world.resource::<PreparedKernelPasses>();

        // Later passes read earlier targets, so run the whole chain or nothing.
        let mut ready = Vec::with_capacity(prepared.passes.len());
        for pass in &prepared.passes {
            let Some(pipeline) = pipeline_cache.get_render_pipeline(pass.pipeline) else {
                return Ok(());
            };
            ready.push((pipeline, pass));
        }

        for (pipeline, pass) in ready {
            let mut render_pass = render_context.begin_tracked_render_pass(RenderPassDescriptor {
                label: Some("lattice_kernel_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &pass.target,
                    resolve_target: None,
                    ops: Operations { load: LoadOp::Clear(Default::default()), store: StoreOp::Store },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_render_pipeline(pipeline);
            render_pass.set_bind_group(0, &pass.bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_defs_name_pass_depth_and_warp() {
        let key = KernelKey { pass: KernelPass::NormalB, warp: true, depth: NoiseDepth::Two };
        let expected: Vec<ShaderDefVal> = vec!["NORMAL_B_PASS".into(), "DEPTH2".into(), "ENABLE_WARP".into()];
        assert_eq!(key.shader_defs(), expected);

        let plain = KernelKey { pass: KernelPass::Position, warp: false, depth: NoiseDepth::Five };
        let expected: Vec<ShaderDefVal> = vec!["POSITION_PASS".into(), "DEPTH5".into()];
        assert_eq!(plain.shader_defs(), expected);
    }

    #[test]
    fn later_param_writes_replace_earlier_ones() {
        let mut dispatch = KernelDispatch::default();
        let target = Handle::weak_from_u128(7);
        dispatch.upload_params(ParamUpload { target: target.clone(), texels: [Vec4::ONE; 4] });
        dispatch.upload_params(ParamUpload { target: Handle::weak_from_u128(8), texels: [Vec4::ZERO; 4] });
        dispatch.upload_params(ParamUpload { target: target.clone(), texels: [Vec4::X; 4] });

        assert_eq!(dispatch.params.len(), 2);
        assert_eq!(dispatch.params[0].target, target);
        assert_eq!(dispatch.params[0].texels, [Vec4::X; 4]);

        dispatch.clear();
        assert!(dispatch.params.is_empty());
    }
}
