//! GPU resource pool.
//!
//! Buffers depend on the grid dimensions and are recreated on every reset.
//! Programs are dimension independent: they are created once, lazily, and
//! only destroyed on teardown.

use log::{debug, warn};

use crate::api::{Backend, BufferDescriptor, BufferSlot, GpuDevice, ProgramDescriptor, ProgramKind};
use crate::config::LatticeConfig;
use crate::error::Result;
use crate::mesh::MeshTemplate;
use crate::plan::GeometryPlan;

#[derive(Debug)]
pub struct BufferSet<B: Backend> {
    pub position: Option<B::Buffer>,
    pub normal_a: Option<B::Buffer>,
    pub normal_b: Option<B::Buffer>,
}

impl<B: Backend> Default for BufferSet<B> {
    fn default() -> Self {
        Self { position: None, normal_a: None, normal_b: None }
    }
}

impl<B: Backend> BufferSet<B> {
    /// Destroys whatever exists, then allocates all three at the plan's size.
    pub fn recreate<D: GpuDevice<B>>(&mut self, device: &mut D, plan: &GeometryPlan) -> Result<()> {
        self.destroy(device);
        let desc = BufferDescriptor::vertex_data(plan.buffer_width(), plan.buffer_height());
        self.position = Some(device.create_buffer(&desc)?);
        self.normal_a = Some(device.create_buffer(&desc)?);
        self.normal_b = Some(device.create_buffer(&desc)?);
        Ok(())
    }

    pub fn destroy<D: GpuDevice<B>>(&mut self, device: &mut D) {
        for slot in [&mut self.position, &mut self.normal_a, &mut self.normal_b] {
            if let Some(buffer) = slot.take() {
                device.destroy_buffer(buffer);
            }
        }
    }

    pub fn all(&self) -> Option<(&B::Buffer, &B::Buffer, &B::Buffer)> {
        Some((self.position.as_ref()?, self.normal_a.as_ref()?, self.normal_b.as_ref()?))
    }
}

#[derive(Debug)]
pub struct ProgramSet<B: Backend> {
    pub kernel: Option<B::Program>,
    pub surface_a: Option<B::Program>,
    pub surface_b: Option<B::Program>,
    pub line: Option<B::Program>,
    pub debug: Option<B::Program>,
}

impl<B: Backend> Default for ProgramSet<B> {
    fn default() -> Self {
        Self { kernel: None, surface_a: None, surface_b: None, line: None, debug: None }
    }
}

impl<B: Backend> ProgramSet<B> {
    /// Creates only the programs that are missing.
    pub fn ensure<D: GpuDevice<B>>(&mut self, device: &mut D) -> Result<()> {
        let slots = [
            (&mut self.kernel, ProgramKind::Kernel),
            (&mut self.surface_a, ProgramKind::Surface),
            (&mut self.surface_b, ProgramKind::Surface),
            (&mut self.line, ProgramKind::Line),
            (&mut self.debug, ProgramKind::Debug),
        ];
        for (slot, kind) in slots {
            if slot.is_none() {
                *slot = Some(device.create_program(&ProgramDescriptor::transient(kind))?);
            }
        }
        Ok(())
    }

    pub fn destroy<D: GpuDevice<B>>(&mut self, device: &mut D) {
        let slots = [&mut self.kernel, &mut self.surface_a, &mut self.surface_b, &mut self.line, &mut self.debug];
        for slot in slots {
            if let Some(program) = slot.take() {
                device.destroy_program(program);
            }
        }
    }
}

/// Everything the lattice allocates on the device.
#[derive(Debug)]
pub struct ResourcePool<B: Backend, M> {
    pub(crate) plan: Option<GeometryPlan>,
    pub(crate) mesh: Option<M>,
    pub(crate) buffers: BufferSet<B>,
    pub(crate) programs: ProgramSet<B>,
}

impl<B: Backend, M> Default for ResourcePool<B, M> {
    fn default() -> Self {
        Self { plan: None, mesh: None, buffers: BufferSet::default(), programs: ProgramSet::default() }
    }
}

impl<B: Backend, M: MeshTemplate<B>> ResourcePool<B, M> {
    pub fn plan(&self) -> Option<&GeometryPlan> {
        self.plan.as_ref()
    }

    pub fn mesh(&self) -> Option<&M> {
        self.mesh.as_ref()
    }

    pub fn buffers(&self) -> &BufferSet<B> {
        &self.buffers
    }

    pub fn programs(&self) -> &ProgramSet<B> {
        &self.programs
    }

    pub fn reset<D: GpuDevice<B>>(&mut self, device: &mut D, config: &LatticeConfig) -> Result<GeometryPlan> {
        let plan = GeometryPlan::new(config.columns, config.rows);
        if plan.is_degenerate() {
            warn!(
                "{}x{} lattice leaves no rows per segment; nothing will be drawn",
                plan.columns,
                plan.rows
            );
        }

        match self.mesh.as_mut() {
            Some(mesh) => mesh.rebuild(device, &plan)?,
            None => self.mesh = Some(M::create(device, &plan)?),
        }
        self.plan = Some(plan);

        self.buffers.recreate(device, &plan)?;
        self.programs.ensure(device)?;
        self.bind_buffers(device);

        debug!(
            "lattice resources rebuilt: {} columns, {} rows in {} segment(s), buffers {}x{}",
            plan.columns,
            plan.total_rows,
            plan.segment_count,
            plan.buffer_width(),
            plan.buffer_height()
        );
        Ok(plan)
    }

    fn bind_buffers<D: GpuDevice<B>>(&self, device: &mut D) {
        let Some((position, normal_a, normal_b)) = self.buffers.all() else { return };
        let p = &self.programs;
        if let Some(surface) = &p.surface_a {
            device.bind_buffer(surface, BufferSlot::Position, position);
            device.bind_buffer(surface, BufferSlot::Normal, normal_a);
        }
        if let Some(surface) = &p.surface_b {
            device.bind_buffer(surface, BufferSlot::Position, position);
            device.bind_buffer(surface, BufferSlot::Normal, normal_b);
        }
        if let Some(line) = &p.line {
            device.bind_buffer(line, BufferSlot::Position, position);
        }
    }

    /// Safe to call repeatedly and with nothing allocated.
    pub fn teardown<D: GpuDevice<B>>(&mut self, device: &mut D) {
        if let Some(mesh) = self.mesh.take() {
            mesh.release(device);
        }
        self.buffers.destroy(device);
        self.programs.destroy(device);
        self.plan = None;
    }
}
