//! [`GpuDevice`] on top of bevy assets.
//!
//! Deformation buffers are float images, programs are parameter blocks in
//! [`ProgramStore`], and draws and thumbnails are recorded into
//! [`FrameCommands`] for the reconcile systems to turn into entities. Blits
//! are queued on [`KernelDispatch`] and executed in the render world.
//!
//! Surface and line programs own a small parameter texture holding their
//! shared values. Every parameter change queues a write of that texture, so
//! the per-segment materials only change when bindings do.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::{Extent3d, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages};
use bevy::render::renderer::RenderDevice;
use bevy::render::texture::{ImageAddressMode, ImageFilterMode, ImageSampler, ImageSamplerDescriptor};
use bevy::utils::HashMap;
use lattice_engine::api::{
    Backend, BufferDescriptor, BufferFormat, BufferSlot, DrawCall, FilterMode, FloatParam, GpuDevice, GpuError,
    KernelPass, ProgramDescriptor, ProgramKind, ScreenRect, ShadowSettings, Submesh, Switch, TextureSlot,
    VectorParam, WrapMode,
};
use lattice_engine::{NoiseDepth, TileGeometry};

use super::kernel::{KernelDispatch, KernelKey, KernelPassRequest, KernelUniform, ParamUpload};
use super::materials::{LineMaterial, SegmentUniform, SurfaceFeatures, SurfaceMaterial, PARAM_TEXELS};

/// Fallback when no render device is reachable from the main world.
const DEFAULT_MAX_TEXTURE_DIMENSION: u32 = 8192;

#[derive(Debug)]
pub struct BevyBackend;

impl Backend for BevyBackend {
    type Buffer = Handle<Image>;
    type Program = ProgramId;
    type Texture = Handle<Image>;
    type Mesh = TileMesh;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(u32);

/// One mesh asset per submesh; the wireframe needs its own topology.
#[derive(Debug, Clone)]
pub struct TileMesh {
    pub submeshes: [Handle<Mesh>; 3],
}

#[derive(Debug, Clone, Default)]
pub struct KernelState {
    pub size: Vec4,
    pub grid: Vec4,
    pub noise: Vec4,
    pub displace: Vec4,
    pub warp: bool,
    pub depths: [bool; 5],
}

impl KernelState {
    pub fn uniform(&self) -> KernelUniform {
        KernelUniform { size: self.size, grid: self.grid, noise: self.noise, displace: self.displace }
    }

    /// The enabled depth variant, if exactly one is enabled.
    pub fn depth(&self) -> Option<NoiseDepth> {
        let mut enabled = NoiseDepth::ALL.iter().zip(self.depths).filter(|(_, on)| *on);
        match (enabled.next(), enabled.next()) {
            (Some((depth, _)), None) => Some(*depth),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SurfaceState {
    pub color: Vec4,
    pub pbr: Vec4,
    pub map_params: Vec4,
    pub occlusion_strength: f32,
    pub params: Option<Handle<Image>>,
    pub position: Option<Handle<Image>>,
    pub normal: Option<Handle<Image>>,
    pub albedo_map: Option<Handle<Image>>,
    pub normal_map: Option<Handle<Image>>,
    pub occlusion_map: Option<Handle<Image>>,
    pub features: SurfaceFeatures,
}

impl SurfaceState {
    fn texels(&self) -> [Vec4; PARAM_TEXELS as usize] {
        [self.color, Vec4::new(self.pbr.x, self.pbr.y, self.occlusion_strength, 0.0), self.map_params, Vec4::ZERO]
    }

    pub fn material(&self, uv_offset: Vec2) -> SurfaceMaterial {
        // A variant switched on without its map bound falls back to the plain one.
        let features = SurfaceFeatures {
            albedo_map: self.features.albedo_map && self.albedo_map.is_some(),
            normal_map: self.features.normal_map && self.normal_map.is_some(),
            occlusion_map: self.features.occlusion_map && self.occlusion_map.is_some(),
        };
        SurfaceMaterial {
            segment: SegmentUniform::new(uv_offset),
            params: self.params.clone(),
            position: self.position.clone(),
            normal: self.normal.clone(),
            albedo_map: self.albedo_map.clone().filter(|_| features.albedo_map),
            normal_map: self.normal_map.clone().filter(|_| features.normal_map),
            occlusion_map: self.occlusion_map.clone().filter(|_| features.occlusion_map),
            features,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineState {
    pub color: Vec4,
    pub params: Option<Handle<Image>>,
    pub position: Option<Handle<Image>>,
}

impl LineState {
    fn texels(&self) -> [Vec4; PARAM_TEXELS as usize] {
        [self.color, Vec4::ZERO, Vec4::ZERO, Vec4::ZERO]
    }

    pub fn material(&self, uv_offset: Vec2) -> LineMaterial {
        LineMaterial {
            segment: SegmentUniform::new(uv_offset),
            params: self.params.clone(),
            position: self.position.clone(),
            blend: self.color.w < 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ProgramState {
    Kernel(KernelState),
    Surface(SurfaceState),
    Line(LineState),
    Debug,
}

#[derive(Resource, Debug, Default)]
pub struct ProgramStore {
    programs: HashMap<ProgramId, ProgramState>,
    next_id: u32,
}

impl ProgramStore {
    pub fn get(&self, id: ProgramId) -> Option<&ProgramState> {
        self.programs.get(&id)
    }

    fn insert(&mut self, state: ProgramState) -> ProgramId {
        self.next_id += 1;
        let id = ProgramId(self.next_id);
        self.programs.insert(id, state);
        id
    }
}

#[derive(Debug, Clone)]
pub enum DrawMaterial {
    Surface(SurfaceMaterial),
    Line(LineMaterial),
}

#[derive(Debug, Clone)]
pub struct DrawRequest {
    pub mesh: Handle<Mesh>,
    pub material: DrawMaterial,
    pub transform: Transform,
    pub shadows: ShadowSettings,
}

#[derive(Debug, Clone)]
pub struct ThumbnailRequest {
    pub rect: ScreenRect,
    pub buffer: Handle<Image>,
}

/// Everything the lattices asked to have on screen this frame.
#[derive(Resource, Debug, Default)]
pub struct FrameCommands {
    pub draws: Vec<DrawRequest>,
    pub thumbnails: Vec<ThumbnailRequest>,
}

impl FrameCommands {
    pub fn clear(&mut self) {
        self.draws.clear();
        self.thumbnails.clear();
    }
}

pub struct BevyDevice<'a> {
    pub images: &'a mut Assets<Image>,
    pub meshes: &'a mut Assets<Mesh>,
    pub programs: &'a mut ProgramStore,
    pub frame: &'a mut FrameCommands,
    pub dispatch: &'a mut KernelDispatch,
    pub max_texture_dimension: u32,
}

/// The resources a [`BevyDevice`] borrows, as one system parameter.
#[derive(SystemParam)]
pub struct DeviceParams<'w> {
    images: ResMut<'w, Assets<Image>>,
    meshes: ResMut<'w, Assets<Mesh>>,
    programs: ResMut<'w, ProgramStore>,
    frame: ResMut<'w, FrameCommands>,
    dispatch: ResMut<'w, KernelDispatch>,
    render_device: Option<Res<'w, RenderDevice>>,
}

impl<'w> DeviceParams<'w> {
    pub fn device(&mut self) -> BevyDevice<'_> {
        let max_texture_dimension = self
            .render_device
            .as_ref()
            .map_or(DEFAULT_MAX_TEXTURE_DIMENSION, |device| device.limits().max_texture_dimension_2d);
        BevyDevice {
            images: &mut self.images,
            meshes: &mut self.meshes,
            programs: &mut self.programs,
            frame: &mut self.frame,
            dispatch: &mut self.dispatch,
            max_texture_dimension,
        }
    }

    /// Starts a new frame: drops last frame's draws, kernel passes and
    /// parameter writes.
    pub fn begin_frame(&mut self) {
        self.frame.clear();
        self.dispatch.clear();
    }
}

fn params_image() -> Image {
    let size = Extent3d { width: PARAM_TEXELS, height: 1, depth_or_array_layers: 1 };
    let mut image = Image {
        texture_descriptor: TextureDescriptor {
            label: Some("lattice_params"),
            size,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba32Float,
            mip_level_count: 1,
            sample_count: 1,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        },
        asset_usage: RenderAssetUsages::RENDER_WORLD,
        ..default()
    };
    image.resize(size);
    image
}

fn buffer_image(desc: &BufferDescriptor) -> Image {
    let format = match desc.format {
        BufferFormat::Rgba32Float => TextureFormat::Rgba32Float,
    };
    let filter = match desc.filter {
        FilterMode::Point => ImageFilterMode::Nearest,
    };
    let address_mode = match desc.wrap {
        WrapMode::Repeat => ImageAddressMode::Repeat,
    };
    let size = Extent3d { width: desc.width, height: desc.height, depth_or_array_layers: 1 };
    let mut image = Image {
        texture_descriptor: TextureDescriptor {
            label: Some("lattice_buffer"),
            size,
            dimension: TextureDimension::D2,
            format,
            mip_level_count: 1,
            sample_count: 1,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST | TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        },
        sampler: ImageSampler::Descriptor(ImageSamplerDescriptor {
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter,
            min_filter: filter,
            ..default()
        }),
        asset_usage: RenderAssetUsages::RENDER_WORLD,
        ..default()
    };
    image.resize(size);
    image
}

fn submesh_asset(geometry: &TileGeometry, submesh: Submesh) -> Mesh {
    let topology = match submesh {
        Submesh::Lines => PrimitiveTopology::LineList,
        Submesh::SurfaceA | Submesh::SurfaceB => PrimitiveTopology::TriangleList,
    };
    Mesh::new(topology, RenderAssetUsages::RENDER_WORLD)
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, geometry.positions.clone())
        .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, geometry.position_uvs.clone())
        .with_inserted_attribute(Mesh::ATTRIBUTE_UV_1, geometry.normal_uvs.clone())
        .with_inserted_indices(Indices::U32(geometry.submeshes[submesh.index()].clone()))
}

const SUBMESHES: [Submesh; 3] = [Submesh::SurfaceA, Submesh::SurfaceB, Submesh::Lines];

impl BevyDevice<'_> {
    fn program_mut(&mut self, program: &ProgramId) -> Option<&mut ProgramState> {
        self.programs.programs.get_mut(program)
    }

    /// Queues the program's current shared values for its parameter texture.
    fn queue_params(&mut self, program: &ProgramId) {
        let upload = match self.programs.get(*program) {
            Some(ProgramState::Surface(surface)) => surface.params.clone().map(|target| (target, surface.texels())),
            Some(ProgramState::Line(line)) => line.params.clone().map(|target| (target, line.texels())),
            _ => None,
        };
        if let Some((target, texels)) = upload {
            self.dispatch.upload_params(ParamUpload { target, texels });
        }
    }
}

impl GpuDevice<BevyBackend> for BevyDevice<'_> {
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> Result<Handle<Image>, GpuError> {
        let limit = self.max_texture_dimension;
        if desc.width > limit || desc.height > limit {
            return Err(GpuError::TooLarge { width: desc.width, height: desc.height, limit });
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::Backend(format!("empty {}x{} buffer", desc.width, desc.height)));
        }
        Ok(self.images.add(buffer_image(desc)))
    }

    fn destroy_buffer(&mut self, buffer: Handle<Image>) {
        self.images.remove(&buffer);
    }

    fn create_program(&mut self, desc: &ProgramDescriptor) -> Result<ProgramId, GpuError> {
        let state = match desc.kind {
            ProgramKind::Kernel => ProgramState::Kernel(KernelState::default()),
            ProgramKind::Surface => ProgramState::Surface(SurfaceState {
                params: Some(self.images.add(params_image())),
                ..default()
            }),
            ProgramKind::Line => {
                ProgramState::Line(LineState { params: Some(self.images.add(params_image())), ..default() })
            }
            ProgramKind::Debug => ProgramState::Debug,
        };
        Ok(self.programs.insert(state))
    }

    fn destroy_program(&mut self, program: ProgramId) {
        let params = match self.programs.programs.remove(&program) {
            Some(ProgramState::Surface(surface)) => surface.params,
            Some(ProgramState::Line(line)) => line.params,
            _ => None,
        };
        if let Some(params) = params {
            self.images.remove(&params);
        }
    }

    fn upload_mesh(&mut self, geometry: &TileGeometry) -> Result<TileMesh, GpuError> {
        let submeshes = SUBMESHES.map(|submesh| self.meshes.add(submesh_asset(geometry, submesh)));
        Ok(TileMesh { submeshes })
    }

    fn update_mesh(&mut self, mesh: &mut TileMesh, geometry: &TileGeometry) -> Result<(), GpuError> {
        for (handle, submesh) in mesh.submeshes.iter().zip(SUBMESHES) {
            self.meshes.insert(handle, submesh_asset(geometry, submesh));
        }
        Ok(())
    }

    fn destroy_mesh(&mut self, mesh: TileMesh) {
        for handle in &mesh.submeshes {
            self.meshes.remove(handle);
        }
    }

    fn set_vector(&mut self, program: &ProgramId, param: VectorParam, value: Vec4) {
        match (self.program_mut(program), param) {
            (Some(ProgramState::Kernel(kernel)), VectorParam::Size) => kernel.size = value,
            (Some(ProgramState::Kernel(kernel)), VectorParam::Grid) => kernel.grid = value,
            (Some(ProgramState::Kernel(kernel)), VectorParam::Noise) => kernel.noise = value,
            (Some(ProgramState::Kernel(kernel)), VectorParam::Displace) => kernel.displace = value,
            (Some(ProgramState::Surface(surface)), VectorParam::Color) => surface.color = value,
            (Some(ProgramState::Surface(surface)), VectorParam::PbrParams) => surface.pbr = value,
            (Some(ProgramState::Surface(surface)), VectorParam::MapParams) => surface.map_params = value,
            (Some(ProgramState::Line(line)), VectorParam::Color) => line.color = value,
            _ => return,
        }
        self.queue_params(program);
    }

    fn set_float(&mut self, program: &ProgramId, param: FloatParam, value: f32) {
        match (self.program_mut(program), param) {
            (Some(ProgramState::Surface(surface)), FloatParam::OcclusionStrength) => surface.occlusion_strength = value,
            _ => return,
        }
        self.queue_params(program);
    }

    fn set_switch(&mut self, program: &ProgramId, switch: Switch, enabled: bool) {
        match (self.program_mut(program), switch) {
            (Some(ProgramState::Kernel(kernel)), Switch::Warp) => kernel.warp = enabled,
            (Some(ProgramState::Kernel(kernel)), Switch::Depth(depth)) => {
                kernel.depths[depth.octaves() as usize - 1] = enabled;
            }
            (Some(ProgramState::Surface(surface)), Switch::AlbedoMap) => surface.features.albedo_map = enabled,
            (Some(ProgramState::Surface(surface)), Switch::NormalMap) => surface.features.normal_map = enabled,
            (Some(ProgramState::Surface(surface)), Switch::OcclusionMap) => surface.features.occlusion_map = enabled,
            _ => {}
        }
    }

    fn bind_buffer(&mut self, program: &ProgramId, slot: BufferSlot, buffer: &Handle<Image>) {
        match (self.program_mut(program), slot) {
            (Some(ProgramState::Surface(surface)), BufferSlot::Position) => surface.position = Some(buffer.clone()),
            (Some(ProgramState::Surface(surface)), BufferSlot::Normal) => surface.normal = Some(buffer.clone()),
            (Some(ProgramState::Line(line)), BufferSlot::Position) => line.position = Some(buffer.clone()),
            _ => {}
        }
    }

    fn bind_texture(&mut self, program: &ProgramId, slot: TextureSlot, texture: Option<&Handle<Image>>) {
        if let Some(ProgramState::Surface(surface)) = self.program_mut(program) {
            let texture = texture.cloned();
            match slot {
                TextureSlot::Albedo => surface.albedo_map = texture,
                TextureSlot::NormalMap => surface.normal_map = texture,
                TextureSlot::Occlusion => surface.occlusion_map = texture,
            }
        }
    }

    fn blit(&mut self, program: &ProgramId, pass: KernelPass, source: Option<&Handle<Image>>, target: &Handle<Image>) {
        let Some(ProgramState::Kernel(kernel)) = self.programs.get(*program) else {
            warn!("blit with a non-kernel program {program:?}");
            return;
        };
        let Some(depth) = kernel.depth() else {
            warn!("kernel {program:?} has no single depth variant enabled, skipping {pass:?}");
            return;
        };
        let request = KernelPassRequest {
            key: KernelKey { pass, warp: kernel.warp, depth },
            uniform: kernel.uniform(),
            source: source.cloned(),
            target: target.clone(),
        };
        self.dispatch.passes.push(request);
    }

    fn draw_mesh(&mut self, call: DrawCall<'_, BevyBackend>) {
        let material = match self.programs.get(*call.program) {
            Some(ProgramState::Surface(surface)) => DrawMaterial::Surface(surface.material(call.params.uv_offset)),
            Some(ProgramState::Line(line)) => DrawMaterial::Line(line.material(call.params.uv_offset)),
            _ => return,
        };
        self.frame.draws.push(DrawRequest {
            mesh: call.mesh.submeshes[call.submesh.index()].clone(),
            material,
            transform: Transform::from_translation(call.placement.translation).with_rotation(call.placement.rotation),
            shadows: call.shadows,
        });
    }

    fn draw_texture(&mut self, rect: ScreenRect, buffer: &Handle<Image>, program: &ProgramId) {
        if matches!(self.programs.get(*program), Some(ProgramState::Debug)) {
            self.frame.thumbnails.push(ThumbnailRequest { rect, buffer: buffer.clone() });
        }
    }
}
