//! Turns the recorded draws and thumbnails into pooled entities.
//!
//! Each draw slot owns its own material asset so per-draw parameters (the
//! segment offset) never leak between segments. Shared shading parameters sit
//! in the program's parameter texture, so a slot's material is only rewritten
//! when its bindings change. Slots beyond this frame's draw count are hidden,
//! not despawned.

use bevy::pbr::{NotShadowCaster, NotShadowReceiver};
use bevy::prelude::*;
use bevy::render::view::NoFrustumCulling;
use lattice_engine::api::ShadowSettings;

use super::device::{DrawMaterial, DrawRequest, FrameCommands};
use super::materials::{DebugMaterial, LineMaterial, SurfaceMaterial};

#[derive(Component)]
pub struct DrawSlot;

#[derive(Component)]
pub struct ThumbnailSlot;

#[derive(Resource, Default)]
pub struct DrawSlots {
    surfaces: Vec<Entity>,
    lines: Vec<Entity>,
    thumbnails: Vec<Entity>,
}

fn set_shadows(commands: &mut Commands, entity: Entity, shadows: ShadowSettings) {
    let mut entity = commands.entity(entity);
    if shadows.cast {
        entity.remove::<NotShadowCaster>();
    } else {
        entity.insert(NotShadowCaster);
    }
    if shadows.receive {
        entity.remove::<NotShadowReceiver>();
    } else {
        entity.insert(NotShadowReceiver);
    }
}

fn slot_bundle<M: Material>(request: &DrawRequest, material: Handle<M>) -> impl Bundle {
    (
        MaterialMeshBundle {
            mesh: request.mesh.clone(),
            material,
            transform: request.transform,
            global_transform: GlobalTransform::from(request.transform),
            ..default()
        },
        // Vertices are displaced on the GPU, the mesh bounds mean nothing.
        NoFrustumCulling,
        DrawSlot,
    )
}

type SlotItem<M> = (
    &'static mut Handle<Mesh>,
    &'static Handle<M>,
    &'static mut Transform,
    &'static mut GlobalTransform,
    &'static mut Visibility,
    Has<NotShadowCaster>,
    Has<NotShadowReceiver>,
);

pub fn sync_draw_slots(
    mut commands: Commands,
    frame: Res<FrameCommands>,
    mut slots: ResMut<DrawSlots>,
    mut surface_materials: ResMut<Assets<SurfaceMaterial>>,
    mut line_materials: ResMut<Assets<LineMaterial>>,
    mut surfaces: Query<SlotItem<SurfaceMaterial>, Without<Handle<LineMaterial>>>,
    mut lines: Query<SlotItem<LineMaterial>, Without<Handle<SurfaceMaterial>>>,
) {
    let (mut surface_index, mut line_index) = (0, 0);

    for request in &frame.draws {
        match &request.material {
            DrawMaterial::Surface(material) => {
                let slot = slots.surfaces.get(surface_index).copied();
                surface_index += 1;
                let existing = match slot {
                    Some(entity) => surfaces.get_mut(entity).ok().map(|item| (entity, item)),
                    None => None,
                };
                match existing {
                    Some((entity, (mesh, handle, transform, global, visibility, no_cast, no_receive))) => {
                        if surface_materials.get(handle) != Some(material) {
                            if let Some(slot_material) = surface_materials.get_mut(handle) {
                                *slot_material = material.clone();
                            }
                        }
                        update_slot(request, mesh, transform, global, visibility);
                        if no_cast == request.shadows.cast || no_receive == request.shadows.receive {
                            set_shadows(&mut commands, entity, request.shadows);
                        }
                    }
                    None => {
                        let handle = surface_materials.add(material.clone());
                        let entity = commands.spawn(slot_bundle(request, handle)).id();
                        set_shadows(&mut commands, entity, request.shadows);
                        slots.surfaces.push(entity);
                    }
                }
            }
            DrawMaterial::Line(material) => {
                let slot = slots.lines.get(line_index).copied();
                line_index += 1;
                let existing = match slot {
                    Some(entity) => lines.get_mut(entity).ok().map(|item| (entity, item)),
                    None => None,
                };
                match existing {
                    Some((entity, (mesh, handle, transform, global, visibility, no_cast, no_receive))) => {
                        if line_materials.get(handle) != Some(material) {
                            if let Some(slot_material) = line_materials.get_mut(handle) {
                                *slot_material = material.clone();
                            }
                        }
                        update_slot(request, mesh, transform, global, visibility);
                        if no_cast == request.shadows.cast || no_receive == request.shadows.receive {
                            set_shadows(&mut commands, entity, request.shadows);
                        }
                    }
                    None => {
                        let handle = line_materials.add(material.clone());
                        let entity = commands.spawn(slot_bundle(request, handle)).id();
                        set_shadows(&mut commands, entity, request.shadows);
                        slots.lines.push(entity);
                    }
                }
            }
        }
    }

    for entity in slots.surfaces.iter().skip(surface_index) {
        if let Ok((_, _, _, _, visibility, _, _)) = surfaces.get_mut(*entity) {
            hide(visibility);
        }
    }
    for entity in slots.lines.iter().skip(line_index) {
        if let Ok((_, _, _, _, visibility, _, _)) = lines.get_mut(*entity) {
            hide(visibility);
        }
    }
}

fn hide(mut visibility: Mut<Visibility>) {
    if *visibility != Visibility::Hidden {
        *visibility = Visibility::Hidden;
    }
}

fn update_slot(
    request: &DrawRequest,
    mut mesh: Mut<Handle<Mesh>>,
    mut transform: Mut<Transform>,
    mut global: Mut<GlobalTransform>,
    mut visibility: Mut<Visibility>,
) {
    if *mesh != request.mesh {
        *mesh = request.mesh.clone();
    }
    if *transform != request.transform {
        *transform = request.transform;
        // Propagation has already run this frame.
        *global = GlobalTransform::from(request.transform);
    }
    if *visibility != Visibility::Inherited {
        *visibility = Visibility::Inherited;
    }
}

pub fn sync_thumbnails(
    mut commands: Commands,
    frame: Res<FrameCommands>,
    mut slots: ResMut<DrawSlots>,
    mut materials: ResMut<Assets<DebugMaterial>>,
    mut nodes: Query<(&mut Style, &Handle<DebugMaterial>, &mut Visibility), With<ThumbnailSlot>>,
) {
    for (index, thumbnail) in frame.thumbnails.iter().enumerate() {
        let style = Style {
            position_type: PositionType::Absolute,
            left: Val::Px(thumbnail.rect.x),
            top: Val::Px(thumbnail.rect.y),
            width: Val::Px(thumbnail.rect.width),
            height: Val::Px(thumbnail.rect.height),
            ..default()
        };
        let material = DebugMaterial { buffer: thumbnail.buffer.clone() };

        let existing = match slots.thumbnails.get(index) {
            Some(entity) => nodes.get_mut(*entity).ok(),
            None => None,
        };
        match existing {
            Some((mut node_style, handle, mut visibility)) => {
                if materials.get(handle) != Some(&material) {
                    if let Some(slot_material) = materials.get_mut(handle) {
                        *slot_material = material;
                    }
                }
                if node_style.left != style.left || node_style.top != style.top || node_style.width != style.width {
                    *node_style = style;
                }
                if *visibility != Visibility::Inherited {
                    *visibility = Visibility::Inherited;
                }
            }
            None => {
                let entity = commands
                    .spawn((MaterialNodeBundle { style, material: materials.add(material), ..default() }, ThumbnailSlot))
                    .id();
                slots.thumbnails.push(entity);
            }
        }
    }

    for entity in slots.thumbnails.iter().skip(frame.thumbnails.len()) {
        if let Ok((_, _, visibility)) = nodes.get_mut(*entity) {
            hide(visibility);
        }
    }
}
