use bevy::pbr::{MaterialPipeline, MaterialPipelineKey};
use bevy::prelude::*;
use bevy::render::mesh::MeshVertexBufferLayout;
use bevy::render::render_resource::{
    AsBindGroup, RenderPipelineDescriptor, ShaderRef, ShaderType, SpecializedMeshPipelineError,
};

pub const SURFACE_SHADER: &str = "shaders/lattice_surface.wgsl";
pub const SURFACE_PREPASS_SHADER: &str = "shaders/lattice_prepass.wgsl";
pub const LINE_SHADER: &str = "shaders/lattice_line.wgsl";
pub const DEBUG_SHADER: &str = "shaders/lattice_debug.wgsl";

/// Texels in a program's parameter texture.
///
/// Surface: color, (metallic, smoothness, occlusion strength, 0), map params.
/// Line: color.
pub const PARAM_TEXELS: u32 = 4;

/// The only per-draw data: where the segment starts in the buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, ShaderType)]
pub struct SegmentUniform {
    pub uv_offset: Vec4,
}

impl SegmentUniform {
    pub fn new(uv_offset: Vec2) -> Self {
        Self { uv_offset: uv_offset.extend(0.0).extend(0.0) }
    }
}

/// Which optional maps a surface variant samples. Doubles as the pipeline key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SurfaceFeatures {
    pub albedo_map: bool,
    pub normal_map: bool,
    pub occlusion_map: bool,
}

impl From<&SurfaceMaterial> for SurfaceFeatures {
    fn from(material: &SurfaceMaterial) -> Self {
        material.features
    }
}

/// Lit surface of one segment. Vertex positions and normals come from the
/// deformation buffers, the mesh only carries lookup coordinates. Shading
/// parameters live in the program's parameter texture, shared by every
/// segment, so they can change without touching this asset.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone, PartialEq)]
#[bind_group_data(SurfaceFeatures)]
pub struct SurfaceMaterial {
    #[uniform(0)]
    pub segment: SegmentUniform,
    #[texture(1, sample_type = "float", filterable = false)]
    pub params: Option<Handle<Image>>,
    #[texture(2, sample_type = "float", filterable = false)]
    pub position: Option<Handle<Image>>,
    #[texture(3, sample_type = "float", filterable = false)]
    pub normal: Option<Handle<Image>>,
    #[texture(4)]
    #[sampler(5)]
    pub albedo_map: Option<Handle<Image>>,
    #[texture(6)]
    #[sampler(7)]
    pub normal_map: Option<Handle<Image>>,
    #[texture(8)]
    #[sampler(9)]
    pub occlusion_map: Option<Handle<Image>>,
    pub features: SurfaceFeatures,
}

impl Material for SurfaceMaterial {
    fn vertex_shader() -> ShaderRef {
        SURFACE_SHADER.into()
    }

    fn fragment_shader() -> ShaderRef {
        SURFACE_SHADER.into()
    }

    fn prepass_vertex_shader() -> ShaderRef {
        SURFACE_PREPASS_SHADER.into()
    }

    fn specialize(
        _pipeline: &MaterialPipeline<Self>,
        descriptor: &mut RenderPipelineDescriptor,
        layout: &MeshVertexBufferLayout,
        key: MaterialPipelineKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        let vertex_layout = layout.get_layout(&[
            Mesh::ATTRIBUTE_POSITION.at_shader_location(0),
            Mesh::ATTRIBUTE_UV_0.at_shader_location(1),
            Mesh::ATTRIBUTE_UV_1.at_shader_location(2),
        ])?;
        descriptor.vertex.buffers = vec![vertex_layout];

        if let Some(fragment) = descriptor.fragment.as_mut() {
            let features = key.bind_group_data;
            for (enabled, def) in [
                (features.albedo_map, "ALBEDO_MAP"),
                (features.normal_map, "NORMAL_MAP"),
                (features.occlusion_map, "OCCLUSION_MAP"),
            ] {
                if enabled {
                    fragment.shader_defs.push(def.into());
                }
            }
        }
        Ok(())
    }
}

/// Unlit wireframe of one segment. The color comes from the parameter texture.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone, PartialEq)]
pub struct LineMaterial {
    #[uniform(0)]
    pub segment: SegmentUniform,
    #[texture(1, sample_type = "float", filterable = false)]
    pub params: Option<Handle<Image>>,
    #[texture(2, sample_type = "float", filterable = false)]
    pub position: Option<Handle<Image>>,
    /// The line color is translucent.
    pub blend: bool,
}

impl Material for LineMaterial {
    fn vertex_shader() -> ShaderRef {
        LINE_SHADER.into()
    }

    fn fragment_shader() -> ShaderRef {
        LINE_SHADER.into()
    }

    fn alpha_mode(&self) -> AlphaMode {
        if self.blend {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        }
    }

    // Pulls the wireframe in front of the surface it shares vertices with.
    fn depth_bias(&self) -> f32 {
        2.0
    }

    fn specialize(
        _pipeline: &MaterialPipeline<Self>,
        descriptor: &mut RenderPipelineDescriptor,
        layout: &MeshVertexBufferLayout,
        _key: MaterialPipelineKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        let vertex_layout = layout.get_layout(&[
            Mesh::ATTRIBUTE_POSITION.at_shader_location(0),
            Mesh::ATTRIBUTE_UV_0.at_shader_location(1),
        ])?;
        descriptor.vertex.buffers = vec![vertex_layout];
        Ok(())
    }
}

/// Raw view of a deformation buffer for the debug overlay.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone, PartialEq)]
pub struct DebugMaterial {
    #[texture(0, sample_type = "float", filterable = false)]
    pub buffer: Handle<Image>,
}

impl UiMaterial for DebugMaterial {
    fn fragment_shader() -> ShaderRef {
        DEBUG_SHADER.into()
    }
}
