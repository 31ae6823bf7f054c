use glam::{Quat, Vec2, Vec3, Vec4};
use thiserror::Error;

use crate::config::NoiseDepth;
use crate::mesh::TileGeometry;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GpuError {
    #[error("out of GPU memory allocating {0}")]
    OutOfMemory(String),
    #[error("{width}x{height} buffer exceeds the device limit of {limit}")]
    TooLarge { width: u32, height: u32, limit: u32 },
    #[error("backend error: {0}")]
    Backend(String),
}

/// Handle types a device hands out. Kept separate from [`GpuDevice`] so the
/// pipeline can store handles while the device itself only lives for a frame.
pub trait Backend: 'static {
    type Buffer: Clone + PartialEq + std::fmt::Debug;
    type Program: Clone + PartialEq + std::fmt::Debug;
    type Texture: Clone + PartialEq + std::fmt::Debug;
    type Mesh: std::fmt::Debug;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferFormat {
    Rgba32Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: BufferFormat,
    pub filter: FilterMode,
    pub wrap: WrapMode,
    /// Never persisted with the scene.
    pub transient: bool,
}

impl BufferDescriptor {
    /// Vertex data surface: exact per-texel values, wrapping past the edges.
    pub fn vertex_data(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: BufferFormat::Rgba32Float,
            filter: FilterMode::Point,
            wrap: WrapMode::Repeat,
            transient: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Kernel,
    Surface,
    Line,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramDescriptor {
    pub kind: ProgramKind,
    pub transient: bool,
}

impl ProgramDescriptor {
    pub const fn transient(kind: ProgramKind) -> Self {
        Self { kind, transient: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorParam {
    /// Physical extent (x, z).
    Size,
    /// (columns, total rows).
    Grid,
    /// (frequency, offset.x, offset.y).
    Noise,
    /// (elevation, clamp min, clamp max, elevation * warp).
    Displace,
    Color,
    /// (metallic, smoothness).
    PbrParams,
    /// (offset.x, 0, offset.y, map scale).
    MapParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatParam {
    OcclusionStrength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    Position,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Albedo,
    NormalMap,
    Occlusion,
}

/// Compile-time program variant switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Switch {
    Warp,
    Depth(NoiseDepth),
    AlbedoMap,
    NormalMap,
    OcclusionMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KernelPass {
    Position = 0,
    NormalA = 1,
    NormalB = 2,
}

impl KernelPass {
    pub const ALL: [KernelPass; 3] = [KernelPass::Position, KernelPass::NormalA, KernelPass::NormalB];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Submesh {
    SurfaceA = 0,
    SurfaceB = 1,
    Lines = 2,
}

impl Submesh {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Per-draw parameter block, applied to a single draw without touching the
/// program's shared parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrawParams {
    pub uv_offset: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Placement {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShadowSettings {
    pub cast: bool,
    pub receive: bool,
}

impl ShadowSettings {
    pub const NONE: ShadowSettings = ShadowSettings { cast: false, receive: false };
}

pub struct DrawCall<'a, B: Backend> {
    pub mesh: &'a B::Mesh,
    pub submesh: Submesh,
    pub program: &'a B::Program,
    pub placement: Placement,
    pub params: DrawParams,
    pub shadows: ShadowSettings,
}

/// Screen-space rectangle in logical pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// The command surface the pipeline drives. Implementations may execute
/// immediately or record for later submission, but must preserve submission
/// order between blits that read and write the same buffer.
pub trait GpuDevice<B: Backend> {
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> Result<B::Buffer, GpuError>;
    fn destroy_buffer(&mut self, buffer: B::Buffer);

    fn create_program(&mut self, desc: &ProgramDescriptor) -> Result<B::Program, GpuError>;
    fn destroy_program(&mut self, program: B::Program);

    fn upload_mesh(&mut self, geometry: &TileGeometry) -> Result<B::Mesh, GpuError>;
    fn update_mesh(&mut self, mesh: &mut B::Mesh, geometry: &TileGeometry) -> Result<(), GpuError>;
    fn destroy_mesh(&mut self, mesh: B::Mesh);

    fn set_vector(&mut self, program: &B::Program, param: VectorParam, value: Vec4);
    fn set_float(&mut self, program: &B::Program, param: FloatParam, value: f32);
    fn set_switch(&mut self, program: &B::Program, switch: Switch, enabled: bool);
    fn bind_buffer(&mut self, program: &B::Program, slot: BufferSlot, buffer: &B::Buffer);
    fn bind_texture(&mut self, program: &B::Program, slot: TextureSlot, texture: Option<&B::Texture>);

    /// Full-surface evaluation of `program`'s `pass` into `target`.
    fn blit(
        &mut self,
        program: &B::Program,
        pass: KernelPass,
        source: Option<&B::Buffer>,
        target: &B::Buffer,
    );

    fn draw_mesh(&mut self, call: DrawCall<'_, B>);

    fn draw_texture(&mut self, rect: ScreenRect, buffer: &B::Buffer, program: &B::Program);
}
