use bevy::app::AppExit;
use bevy::prelude::*;
use bevy::render::view::VisibilitySystems;
use bevy::transform::TransformSystem;
use bevy::utils::{HashMap, HashSet};
use lattice_engine::api::Placement;
use lattice_engine::overlay::THUMBNAIL_SIZE;
use lattice_engine::{FrameContext, LatticeConfig, LatticeHooks, LatticeRenderer, SurfaceMaps};

pub mod device;
pub mod draws;
pub mod kernel;
pub mod materials;

use device::{BevyBackend, DeviceParams, FrameCommands, ProgramStore};
use draws::{sync_draw_slots, sync_thumbnails, DrawSlots};
use kernel::KernelPlugin;
use materials::{DebugMaterial, LineMaterial, SurfaceMaterial};

/// A deformed lattice, positioned by the entity's transform.
#[derive(Component, Debug, Clone, Default, Deref, DerefMut)]
pub struct Lattice(pub LatticeConfig);

/// Texture maps resolved from the config's asset paths.
#[derive(Component, Debug, Clone, Default)]
pub struct LatticeMaps {
    pub albedo: Option<Handle<Image>>,
    pub normal: Option<Handle<Image>>,
    pub occlusion: Option<Handle<Image>>,
    sources: [Option<String>; 3],
}

impl LatticeMaps {
    fn surface_maps(&self) -> SurfaceMaps<'_, BevyBackend> {
        SurfaceMaps { albedo: self.albedo.as_ref(), normal: self.normal.as_ref(), occlusion: self.occlusion.as_ref() }
    }
}

/// Scrolls the noise field, in noise units per second.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct NoiseScroll(pub Vec2);

#[derive(Bundle, Default)]
pub struct LatticeBundle {
    pub lattice: Lattice,
    pub maps: LatticeMaps,
    pub spatial: SpatialBundle,
}

impl LatticeBundle {
    pub fn new(config: LatticeConfig) -> Self {
        Self { lattice: Lattice(config), ..default() }
    }
}

/// Grid dimensions changed; the lattice's resources must be rebuilt.
#[derive(Event, Debug, Clone, Copy)]
pub struct LatticeConfigChanged {
    pub entity: Entity,
}

#[derive(Resource, Default)]
pub struct LatticeRenderers {
    renderers: HashMap<Entity, LatticeRenderer<BevyBackend>>,
    /// Lattices whose last rebuild failed; left alone until their config changes.
    failed: HashSet<Entity>,
}

impl LatticeRenderers {
    pub fn get(&self, entity: Entity) -> Option<&LatticeRenderer<BevyBackend>> {
        self.renderers.get(&entity)
    }

    pub fn has_failed(&self, entity: Entity) -> bool {
        self.failed.contains(&entity)
    }
}

pub struct LatticePlugin;

impl Plugin for LatticePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            KernelPlugin,
            MaterialPlugin::<SurfaceMaterial>::default(),
            MaterialPlugin::<LineMaterial> { prepass_enabled: false, shadows_enabled: false, ..default() },
            UiMaterialPlugin::<DebugMaterial>::default(),
        ))
        .init_resource::<ProgramStore>()
        .init_resource::<FrameCommands>()
        .init_resource::<DrawSlots>()
        .init_resource::<LatticeRenderers>()
        .add_event::<LatticeConfigChanged>()
        .add_systems(Update, (scroll_noise, load_surface_maps).chain())
        .add_systems(
            PostUpdate,
            (
                (teardown_removed_lattices, apply_config_changes),
                drive_lattices,
                (sync_draw_slots, sync_thumbnails),
            )
                .chain()
                .after(TransformSystem::TransformPropagate)
                .before(VisibilitySystems::CheckVisibility),
        )
        .add_systems(Last, teardown_on_exit);
    }
}

fn scroll_noise(time: Res<Time>, mut lattices: Query<(&NoiseScroll, &mut Lattice)>) {
    for (scroll, mut lattice) in &mut lattices {
        if scroll.0 != Vec2::ZERO {
            lattice.noise_offset += scroll.0 * time.delta_seconds();
        }
    }
}

fn load_surface_maps(asset_server: Res<AssetServer>, mut lattices: Query<(&Lattice, &mut LatticeMaps), Changed<Lattice>>) {
    for (lattice, mut maps) in &mut lattices {
        let wanted = [lattice.albedo_map.clone(), lattice.normal_map.clone(), lattice.occlusion_map.clone()];
        if maps.sources == wanted {
            continue;
        }
        let load = |path: &Option<String>| path.as_ref().filter(|p| !p.is_empty()).map(|p| asset_server.load(p.clone()));
        maps.albedo = load(&wanted[0]);
        maps.normal = load(&wanted[1]);
        maps.occlusion = load(&wanted[2]);
        maps.sources = wanted;
    }
}

fn apply_config_changes(mut events: EventReader<LatticeConfigChanged>, mut renderers: ResMut<LatticeRenderers>) {
    for event in events.read() {
        renderers.failed.remove(&event.entity);
        if let Some(renderer) = renderers.renderers.get_mut(&event.entity) {
            renderer.on_config_changed();
        }
    }
}

fn drive_lattices(
    mut renderers: ResMut<LatticeRenderers>,
    lattices: Query<(Entity, &Lattice, &GlobalTransform, Option<&LatticeMaps>)>,
    mut params: DeviceParams,
) {
    params.begin_frame();
    let mut device = params.device();
    let LatticeRenderers { renderers, failed } = &mut *renderers;

    for (index, (entity, lattice, global, maps)) in lattices.iter().enumerate() {
        if failed.contains(&entity) {
            continue;
        }
        let renderer = renderers.entry(entity).or_default();
        let (_, rotation, translation) = global.to_scale_rotation_translation();
        let ctx = FrameContext {
            config: &lattice.0,
            placement: Placement { translation, rotation },
            maps: maps.map(LatticeMaps::surface_maps).unwrap_or_default(),
        };

        match renderer.on_frame(&mut device, &ctx) {
            Ok(stats) if stats.reset => {
                if let Some(plan) = renderer.plan() {
                    info!(
                        "lattice {entity:?} rebuilt: {}x{} in {} segment(s) of {} rows",
                        plan.columns, plan.total_rows, plan.segment_count, plan.rows_per_segment
                    );
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("lattice {entity:?} could not be rebuilt: {e}");
                failed.insert(entity);
                continue;
            }
        }

        // Stack the overlays of several lattices.
        renderer.overlay_mut().origin = (0.0, index as f32 * THUMBNAIL_SIZE);
        renderer.on_repaint(&mut device, &lattice.0);
    }
}

fn teardown_removed_lattices(
    mut removed: RemovedComponents<Lattice>,
    mut renderers: ResMut<LatticeRenderers>,
    mut params: DeviceParams,
) {
    for entity in removed.read() {
        renderers.failed.remove(&entity);
        if let Some(mut renderer) = renderers.renderers.remove(&entity) {
            renderer.on_teardown(&mut params.device());
            debug!("lattice {entity:?} released");
        }
    }
}

fn teardown_on_exit(mut exit: EventReader<AppExit>, mut renderers: ResMut<LatticeRenderers>, mut params: DeviceParams) {
    if exit.read().next().is_none() {
        return;
    }
    let mut device = params.device();
    for (_, mut renderer) in renderers.renderers.drain() {
        renderer.on_teardown(&mut device);
    }
    renderers.failed.clear();
}
