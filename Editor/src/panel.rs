use anyhow::Context;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};
use lattice_engine::plan::{MAX_GRID, MIN_GRID};
use lattice_engine::{LatticeConfig, NoiseDepth};

use crate::lattice::{Lattice, LatticeConfigChanged, LatticeRenderers, NoiseScroll};
use crate::ui_strings::UiStrings;
use crate::{preview, EditorState};

pub fn lattice_panel(
    mut contexts: EguiContexts,
    mut state: ResMut<EditorState>,
    mut lattices: Query<(Entity, &mut Lattice, Option<&mut NoiseScroll>)>,
    renderers: Res<LatticeRenderers>,
    mut changed: EventWriter<LatticeConfigChanged>,
) {
    let Ok((entity, mut lattice, scroll)) = lattices.get_single_mut() else {
        return;
    };
    let text = state.ui.clone();
    let ctx = contexts.ctx_mut();

    // Edit a copy so the component is only touched when something moved.
    let mut config = lattice.0.clone();
    let mut velocity = scroll.as_ref().map(|s| s.0);

    egui::SidePanel::right("lattice_panel").default_width(300.0).show(ctx, |ui| {
        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.heading(&text.lattice_panel.title);
            preset_ui(ui, &mut state, &mut config, &text);
            ui.separator();

            grid_ui(ui, &mut config, &text);
            match renderers.get(entity).and_then(|r| r.plan()) {
                _ if renderers.has_failed(entity) => {
                    ui.colored_label(egui::Color32::LIGHT_RED, &text.lattice_panel.failed);
                }
                Some(plan) => {
                    ui.label(format!(
                        "{}: {} x {} ({}x{})",
                        text.lattice_panel.segments,
                        plan.segment_count,
                        plan.rows_per_segment,
                        plan.columns,
                        plan.total_rows
                    ));
                }
                None => {}
            }

            noise_ui(ui, &mut config, velocity.as_mut(), &text);
            surface_ui(ui, &mut config, &text);
            maps_ui(ui, &mut config, &text);
            ui.checkbox(&mut config.debug, &text.lattice_panel.debug);

            ui.separator();
            preview::preview_ui(ui, &mut state, &config, &text);
        });
    });

    if let (Some(mut scroll), Some(velocity)) = (scroll, velocity) {
        if scroll.0 != velocity {
            scroll.0 = velocity;
        }
    }

    let grid_changed = config.columns != lattice.columns || config.rows != lattice.rows;
    if config != lattice.0 {
        lattice.0 = config;
    }
    if grid_changed {
        changed.send(LatticeConfigChanged { entity });
    }
}

fn preset_ui(ui: &mut egui::Ui, state: &mut EditorState, config: &mut LatticeConfig, text: &UiStrings) {
    ui.horizontal(|ui| {
        ui.label(&text.preset.title);
        ui.text_edit_singleline(&mut state.preset_path);
    });
    ui.horizontal(|ui| {
        if ui.button(&text.preset.save).clicked() {
            let path = state.preset_path.clone();
            state.status = Some(match config.save(&path).with_context(|| format!("saving preset {path}")) {
                Ok(()) => {
                    info!("saved preset to {path}");
                    text.preset.saved.clone()
                }
                Err(e) => {
                    warn!("{e:#}");
                    format!("{e:#}")
                }
            });
        }
        if ui.button(&text.preset.load).clicked() {
            let path = state.preset_path.clone();
            state.status = Some(match LatticeConfig::load(&path).with_context(|| format!("loading preset {path}")) {
                Ok(loaded) => {
                    info!("loaded preset from {path}");
                    *config = loaded;
                    config.sanitize();
                    text.preset.loaded.clone()
                }
                Err(e) => {
                    warn!("{e:#}");
                    format!("{e:#}")
                }
            });
        }
    });
    if let Some(status) = &state.status {
        ui.small(status);
    }
}

fn grid_ui(ui: &mut egui::Ui, config: &mut LatticeConfig, text: &UiStrings) {
    let t = &text.lattice_panel;
    let range = MIN_GRID as i32..=MAX_GRID as i32;
    egui::CollapsingHeader::new(&t.grid).default_open(true).show(ui, |ui| {
        ui.add(egui::Slider::new(&mut config.columns, range.clone()).logarithmic(true).text(&t.columns));
        ui.add(egui::Slider::new(&mut config.rows, range).logarithmic(true).text(&t.rows));
        ui.horizontal(|ui| {
            ui.label(&t.size);
            ui.add(egui::DragValue::new(&mut config.size.x).speed(0.1).clamp_range(0.1..=1000.0));
            ui.add(egui::DragValue::new(&mut config.size.y).speed(0.1).clamp_range(0.1..=1000.0));
        });
    });
}

fn noise_ui(ui: &mut egui::Ui, config: &mut LatticeConfig, velocity: Option<&mut Vec2>, text: &UiStrings) {
    let t = &text.lattice_panel;
    egui::CollapsingHeader::new(&t.noise).default_open(true).show(ui, |ui| {
        ui.horizontal(|ui| {
            ui.label(&t.offset);
            ui.add(egui::DragValue::new(&mut config.noise_offset.x).speed(0.05));
            ui.add(egui::DragValue::new(&mut config.noise_offset.y).speed(0.05));
            if ui.button(&t.randomize).clicked() {
                config.randomize_noise_offset(&mut rand::thread_rng());
            }
        });
        if let Some(velocity) = velocity {
            ui.horizontal(|ui| {
                ui.label(&t.scroll);
                ui.add(egui::DragValue::new(&mut velocity.x).speed(0.01));
                ui.add(egui::DragValue::new(&mut velocity.y).speed(0.01));
            });
        }
        ui.add(egui::Slider::new(&mut config.noise_frequency, 0.0..=4.0).text(&t.frequency));

        let mut depth = u8::from(config.noise_depth);
        if ui.add(egui::Slider::new(&mut depth, 1..=5).text(&t.depth)).changed() {
            config.noise_depth = NoiseDepth::saturating(u32::from(depth));
        }

        ui.horizontal(|ui| {
            ui.label(&t.clamp);
            ui.add(egui::DragValue::new(&mut config.noise_clamp_min).speed(0.01));
            ui.add(egui::DragValue::new(&mut config.noise_clamp_max).speed(0.01));
        });
        ui.add(egui::Slider::new(&mut config.noise_elevation, 0.0..=5.0).text(&t.elevation));
        ui.add(egui::Slider::new(&mut config.noise_warp, 0.0..=1.0).text(&t.warp));
    });
}

fn color_edit(ui: &mut egui::Ui, label: &str, color: &mut Vec4) {
    ui.horizontal(|ui| {
        let mut rgba = color.to_array();
        if ui.color_edit_button_rgba_unmultiplied(&mut rgba).changed() {
            *color = Vec4::from_array(rgba);
        }
        ui.label(label);
    });
}

fn surface_ui(ui: &mut egui::Ui, config: &mut LatticeConfig, text: &UiStrings) {
    let t = &text.lattice_panel;
    egui::CollapsingHeader::new(&t.surface).default_open(true).show(ui, |ui| {
        color_edit(ui, &t.surface_color, &mut config.surface_color);
        color_edit(ui, &t.line_color, &mut config.line_color);
        ui.add(egui::Slider::new(&mut config.metallic, 0.0..=1.0).text(&t.metallic));
        ui.add(egui::Slider::new(&mut config.smoothness, 0.0..=1.0).text(&t.smoothness));
        ui.checkbox(&mut config.cast_shadows, &t.cast_shadows);
        ui.checkbox(&mut config.receive_shadows, &t.receive_shadows);
    });
}

/// Commits on focus loss so half-typed paths never reach the asset server.
fn map_path(ui: &mut egui::Ui, label: &str, path: &mut Option<String>) {
    ui.horizontal(|ui| {
        ui.label(label);
        let id = ui.make_persistent_id(label);
        let mut buffer = ui
            .data_mut(|d| d.get_temp::<String>(id))
            .unwrap_or_else(|| path.clone().unwrap_or_default());
        let response = ui.text_edit_singleline(&mut buffer);
        if response.lost_focus() {
            let trimmed = buffer.trim();
            *path = (!trimmed.is_empty()).then(|| trimmed.to_string());
            ui.data_mut(|d| d.remove::<String>(id));
        } else if response.has_focus() {
            ui.data_mut(|d| d.insert_temp(id, buffer));
        }
    });
}

fn maps_ui(ui: &mut egui::Ui, config: &mut LatticeConfig, text: &UiStrings) {
    let t = &text.lattice_panel;
    egui::CollapsingHeader::new(&t.maps).default_open(false).show(ui, |ui| {
        map_path(ui, &t.albedo_map, &mut config.albedo_map);
        map_path(ui, &t.normal_map, &mut config.normal_map);
        map_path(ui, &t.occlusion_map, &mut config.occlusion_map);
        ui.add(egui::Slider::new(&mut config.occlusion_strength, 0.0..=1.0).text(&t.occlusion_strength));
        ui.add(egui::Slider::new(&mut config.map_scale, 0.01..=10.0).logarithmic(true).text(&t.map_scale));
    });
}
