//! A device that executes nothing and records every command, for headless
//! hosts and tests.

use glam::{Vec2, Vec4};

use crate::api::{
    Backend, BufferDescriptor, BufferSlot, DrawCall, FloatParam, GpuDevice, GpuError, KernelPass, Placement,
    ProgramDescriptor, ProgramKind, ScreenRect, ShadowSettings, Submesh, Switch, TextureSlot, VectorParam,
};
use crate::mesh::TileGeometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

#[derive(Debug)]
pub struct RecordingBackend;

impl Backend for RecordingBackend {
    type Buffer = BufferId;
    type Program = ProgramId;
    type Texture = TextureId;
    type Mesh = MeshId;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateBuffer { id: BufferId, desc: BufferDescriptor },
    DestroyBuffer(BufferId),
    CreateProgram { id: ProgramId, kind: ProgramKind },
    DestroyProgram(ProgramId),
    UploadMesh { id: MeshId, vertices: usize },
    UpdateMesh { id: MeshId, vertices: usize },
    DestroyMesh(MeshId),
    SetVector { program: ProgramId, param: VectorParam, value: Vec4 },
    SetFloat { program: ProgramId, param: FloatParam, value: f32 },
    SetSwitch { program: ProgramId, switch: Switch, enabled: bool },
    BindBuffer { program: ProgramId, slot: BufferSlot, buffer: BufferId },
    BindTexture { program: ProgramId, slot: TextureSlot, texture: Option<TextureId> },
    Blit { program: ProgramId, pass: KernelPass, source: Option<BufferId>, target: BufferId },
    Draw {
        mesh: MeshId,
        submesh: Submesh,
        program: ProgramId,
        placement: Placement,
        uv_offset: Vec2,
        shadows: ShadowSettings,
    },
    DrawTexture { rect: ScreenRect, buffer: BufferId, program: ProgramId },
}

#[derive(Debug, Default)]
pub struct RecordingDevice {
    pub commands: Vec<Command>,
    next_id: u32,
    /// Number of buffer allocations that succeed before every further one
    /// fails with [`GpuError::OutOfMemory`].
    pub buffer_budget: Option<usize>,
    buffers_created: usize,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer_budget(budget: usize) -> Self {
        Self { buffer_budget: Some(budget), ..Self::default() }
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn take(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draws(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().filter(|c| matches!(c, Command::Draw { .. }))
    }

    pub fn count(&self, predicate: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }
}

impl GpuDevice<RecordingBackend> for RecordingDevice {
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> Result<BufferId, GpuError> {
        if self.buffer_budget.is_some_and(|budget| self.buffers_created >= budget) {
            return Err(GpuError::OutOfMemory(format!("{}x{} buffer", desc.width, desc.height)));
        }
        self.buffers_created += 1;
        let id = BufferId(self.next());
        self.commands.push(Command::CreateBuffer { id, desc: *desc });
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.commands.push(Command::DestroyBuffer(buffer));
    }

    fn create_program(&mut self, desc: &ProgramDescriptor) -> Result<ProgramId, GpuError> {
        let id = ProgramId(self.next());
        self.commands.push(Command::CreateProgram { id, kind: desc.kind });
        Ok(id)
    }

    fn destroy_program(&mut self, program: ProgramId) {
        self.commands.push(Command::DestroyProgram(program));
    }

    fn upload_mesh(&mut self, geometry: &TileGeometry) -> Result<MeshId, GpuError> {
        let id = MeshId(self.next());
        self.commands.push(Command::UploadMesh { id, vertices: geometry.vertex_count() });
        Ok(id)
    }

    fn update_mesh(&mut self, mesh: &mut MeshId, geometry: &TileGeometry) -> Result<(), GpuError> {
        self.commands.push(Command::UpdateMesh { id: *mesh, vertices: geometry.vertex_count() });
        Ok(())
    }

    fn destroy_mesh(&mut self, mesh: MeshId) {
        self.commands.push(Command::DestroyMesh(mesh));
    }

    fn set_vector(&mut self, program: &ProgramId, param: VectorParam, value: Vec4) {
        self.commands.push(Command::SetVector { program: *program, param, value });
    }

    fn set_float(&mut self, program: &ProgramId, param: FloatParam, value: f32) {
        self.commands.push(Command::SetFloat { program: *program, param, value });
    }

    fn set_switch(&mut self, program: &ProgramId, switch: Switch, enabled: bool) {
        self.commands.push(Command::SetSwitch { program: *program, switch, enabled });
    }

    fn bind_buffer(&mut self, program: &ProgramId, slot: BufferSlot, buffer: &BufferId) {
        self.commands.push(Command::BindBuffer { program: *program, slot, buffer: *buffer });
    }

    fn bind_texture(&mut self, program: &ProgramId, slot: TextureSlot, texture: Option<&TextureId>) {
        self.commands.push(Command::BindTexture { program: *program, slot, texture: texture.copied() });
    }

    fn blit(&mut self, program: &ProgramId, pass: KernelPass, source: Option<&BufferId>, target: &BufferId) {
        self.commands.push(Command::Blit { program: *program, pass, source: source.copied(), target: *target });
    }

    fn draw_mesh(&mut self, call: DrawCall<'_, RecordingBackend>) {
        self.commands.push(Command::Draw {
            mesh: *call.mesh,
            submesh: call.submesh,
            program: *call.program,
            placement: call.placement,
            uv_offset: call.params.uv_offset,
            shadows: call.shadows,
        });
    }

    fn draw_texture(&mut self, rect: ScreenRect, buffer: &BufferId, program: &ProgramId) {
        self.commands.push(Command::DrawTexture { rect, buffer: *buffer, program: *program });
    }
}
