use glam::Vec4;
use log::debug;

use crate::api::{
    Backend, DrawCall, DrawParams, FloatParam, GpuDevice, KernelPass, Placement, ShadowSettings, Submesh,
    Switch, TextureSlot, VectorParam,
};
use crate::config::{LatticeConfig, NoiseDepth};
use crate::error::Result;
use crate::mesh::{BulkMesh, MeshTemplate};
use crate::overlay::DebugOverlay;
use crate::plan::GeometryPlan;
use crate::pool::ResourcePool;

/// Externally owned texture maps, resolved by the host from the config paths.
pub struct SurfaceMaps<'a, B: Backend> {
    pub albedo: Option<&'a B::Texture>,
    pub normal: Option<&'a B::Texture>,
    pub occlusion: Option<&'a B::Texture>,
}

impl<B: Backend> Default for SurfaceMaps<'_, B> {
    fn default() -> Self {
        Self { albedo: None, normal: None, occlusion: None }
    }
}

impl<B: Backend> Clone for SurfaceMaps<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: Backend> Copy for SurfaceMaps<'_, B> {}

/// What the host hands the pipeline every frame.
pub struct FrameContext<'a, B: Backend> {
    pub config: &'a LatticeConfig,
    pub placement: Placement,
    pub maps: SurfaceMaps<'a, B>,
}

impl<'a, B: Backend> FrameContext<'a, B> {
    pub fn new(config: &'a LatticeConfig) -> Self {
        Self { config, placement: Placement::default(), maps: SurfaceMaps::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub reset: bool,
    pub segments: u32,
    pub draws: u32,
}

/// Callbacks the host environment drives. The renderer never schedules itself.
pub trait LatticeHooks<B: Backend> {
    fn on_frame<D: GpuDevice<B>>(&mut self, device: &mut D, ctx: &FrameContext<'_, B>) -> Result<FrameStats>;
    fn on_repaint<D: GpuDevice<B>>(&mut self, device: &mut D, config: &LatticeConfig);
    fn on_teardown<D: GpuDevice<B>>(&mut self, device: &mut D);
    fn on_config_changed(&mut self);
}

/// Drives one lattice: rebuilds resources when stale, runs the deformation
/// passes and issues the segment draws.
#[derive(Debug)]
pub struct LatticeRenderer<B: Backend, M = BulkMesh<B>> {
    pool: ResourcePool<B, M>,
    needs_reset: bool,
    overlay: DebugOverlay,
}

impl<B: Backend, M: MeshTemplate<B>> Default for LatticeRenderer<B, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend, M: MeshTemplate<B>> LatticeRenderer<B, M> {
    pub fn new() -> Self {
        Self { pool: ResourcePool::default(), needs_reset: true, overlay: DebugOverlay::default() }
    }

    pub fn notify_config_change(&mut self) {
        self.needs_reset = true;
    }

    pub fn needs_reset(&self) -> bool {
        self.needs_reset
    }

    pub fn pool(&self) -> &ResourcePool<B, M> {
        &self.pool
    }

    pub fn plan(&self) -> Option<&GeometryPlan> {
        self.pool.plan()
    }

    pub fn columns(&self) -> Option<u32> {
        self.plan().map(|p| p.columns)
    }

    /// Rows actually rendered, which segmentation may truncate.
    pub fn rows(&self) -> Option<u32> {
        self.plan().map(|p| p.total_rows)
    }

    pub fn overlay_mut(&mut self) -> &mut DebugOverlay {
        &mut self.overlay
    }

    pub fn reset_resources<D: GpuDevice<B>>(&mut self, device: &mut D, config: &LatticeConfig) -> Result<()> {
        self.pool.reset(device, config)?;
        self.needs_reset = false;
        Ok(())
    }

    pub fn frame<D: GpuDevice<B>>(&mut self, device: &mut D, ctx: &FrameContext<'_, B>) -> Result<FrameStats> {
        let mut stats = FrameStats::default();
        if self.needs_reset {
            self.reset_resources(device, ctx.config)?;
            stats.reset = true;
        }

        let (Some(plan), Some(mesh)) = (self.pool.plan, self.pool.mesh.as_ref()) else {
            return Ok(stats);
        };
        let Some((position, normal_a, normal_b)) = self.pool.buffers.all() else {
            return Ok(stats);
        };
        let programs = &self.pool.programs;
        let (Some(kernel), Some(surface_a), Some(surface_b), Some(line)) =
            (&programs.kernel, &programs.surface_a, &programs.surface_b, &programs.line)
        else {
            return Ok(stats);
        };

        let config = ctx.config;
        push_kernel_params(device, kernel, config, &plan);

        // Normal passes read the positions written just before.
        device.blit(kernel, KernelPass::Position, None, position);
        device.blit(kernel, KernelPass::NormalA, Some(position), normal_a);
        device.blit(kernel, KernelPass::NormalB, Some(position), normal_b);

        push_surface_params(device, surface_a, config, &ctx.maps);
        push_surface_params(device, surface_b, config, &ctx.maps);
        device.set_vector(line, VectorParam::Color, config.line_color);

        let surface_shadows = ShadowSettings { cast: config.cast_shadows, receive: config.receive_shadows };
        let draw_lines = config.draws_lines();

        for start in plan.segment_starts() {
            let params = DrawParams { uv_offset: plan.segment_uv_offset(start) };
            let draw = |submesh, program, shadows| DrawCall {
                mesh: mesh.mesh(),
                submesh,
                program,
                placement: ctx.placement,
                params,
                shadows,
            };

            device.draw_mesh(draw(Submesh::SurfaceA, surface_a, surface_shadows));
            device.draw_mesh(draw(Submesh::SurfaceB, surface_b, surface_shadows));
            stats.draws += 2;

            if draw_lines {
                device.draw_mesh(draw(Submesh::Lines, line, ShadowSettings::NONE));
                stats.draws += 1;
            }
            stats.segments += 1;
        }

        Ok(stats)
    }

    /// Draws the debug thumbnails when enabled. Purely observational.
    pub fn repaint<D: GpuDevice<B>>(&mut self, device: &mut D, config: &LatticeConfig) {
        if config.debug {
            self.overlay.draw(device, &self.pool.buffers, self.pool.programs.debug.as_ref());
        }
    }

    pub fn teardown<D: GpuDevice<B>>(&mut self, device: &mut D) {
        if self.pool.plan.is_some() {
            debug!("releasing lattice resources");
        }
        self.pool.teardown(device);
        self.needs_reset = true;
    }
}

impl<B: Backend, M: MeshTemplate<B>> LatticeHooks<B> for LatticeRenderer<B, M> {
    fn on_frame<D: GpuDevice<B>>(&mut self, device: &mut D, ctx: &FrameContext<'_, B>) -> Result<FrameStats> {
        self.frame(device, ctx)
    }

    fn on_repaint<D: GpuDevice<B>>(&mut self, device: &mut D, config: &LatticeConfig) {
        self.repaint(device, config)
    }

    fn on_teardown<D: GpuDevice<B>>(&mut self, device: &mut D) {
        self.teardown(device)
    }

    fn on_config_changed(&mut self) {
        self.notify_config_change()
    }
}

fn push_kernel_params<B: Backend, D: GpuDevice<B>>(
    device: &mut D,
    kernel: &B::Program,
    config: &LatticeConfig,
    plan: &GeometryPlan,
) {
    let offset = config.noise_offset;
    device.set_vector(kernel, VectorParam::Size, config.size.extend(0.0).extend(0.0));
    device.set_vector(
        kernel,
        VectorParam::Grid,
        Vec4::new(plan.columns as f32, plan.total_rows as f32, 0.0, 0.0),
    );
    device.set_vector(kernel, VectorParam::Noise, Vec4::new(config.noise_frequency, offset.x, offset.y, 0.0));
    device.set_vector(
        kernel,
        VectorParam::Displace,
        Vec4::new(
            config.noise_elevation,
            config.noise_clamp_min,
            config.noise_clamp_max,
            config.noise_elevation * config.noise_warp,
        ),
    );

    device.set_switch(kernel, Switch::Warp, config.noise_warp > 0.0);
    for depth in NoiseDepth::ALL {
        device.set_switch(kernel, Switch::Depth(depth), depth == config.noise_depth);
    }
}

fn push_surface_params<B: Backend, D: GpuDevice<B>>(
    device: &mut D,
    surface: &B::Program,
    config: &LatticeConfig,
    maps: &SurfaceMaps<'_, B>,
) {
    device.set_vector(surface, VectorParam::Color, config.surface_color);
    device.set_vector(surface, VectorParam::PbrParams, Vec4::new(config.metallic, config.smoothness, 0.0, 0.0));

    device.bind_texture(surface, TextureSlot::Albedo, maps.albedo);
    device.set_switch(surface, Switch::AlbedoMap, maps.albedo.is_some());

    device.bind_texture(surface, TextureSlot::NormalMap, maps.normal);
    device.set_switch(surface, Switch::NormalMap, maps.normal.is_some());

    device.bind_texture(surface, TextureSlot::Occlusion, maps.occlusion);
    if maps.occlusion.is_some() {
        device.set_float(surface, FloatParam::OcclusionStrength, config.occlusion_strength);
    }
    device.set_switch(surface, Switch::OcclusionMap, maps.occlusion.is_some());

    let offset = config.noise_offset;
    device.set_vector(surface, VectorParam::MapParams, Vec4::new(offset.x, 0.0, offset.y, config.map_scale));
}
