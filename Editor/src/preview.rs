use bevy_egui::egui;
use lattice_engine::sampling::ElevationSampler;
use lattice_engine::LatticeConfig;

use crate::ui_strings::UiStrings;
use crate::EditorState;

/// Grey-scale elevation over the lattice extent, `range` mapped to black..white.
fn elevation_image(config: &LatticeConfig, width: u32, height: u32) -> (egui::ColorImage, (f32, f32)) {
    let sampler = ElevationSampler::new(config);
    let data = sampler.sample_grid(width, height);
    let (lo, hi) = sampler.range();
    let span = (hi - lo).max(f32::EPSILON);

    let mut img = egui::ColorImage::new([width as usize, height as usize], egui::Color32::BLACK);
    for (pixel, v) in img.pixels.iter_mut().zip(&data) {
        let v = (((v - lo) / span).clamp(0.0, 1.0) * 255.0) as u8;
        *pixel = egui::Color32::from_gray(v);
    }
    (img, (lo, hi))
}

fn generate(ctx: &egui::Context, state: &mut EditorState, config: &LatticeConfig) {
    let w = state.preview_w.max(16);
    let h = state.preview_h.max(16);
    let (img, range) = elevation_image(config, w, h);
    state.preview = Some(ctx.load_texture("elevation_preview", img, egui::TextureOptions::NEAREST));
    state.preview_range = range;
}

fn show_preview(ui: &mut egui::Ui, state: &EditorState, ui_text: &UiStrings) {
    let Some(tex) = &state.preview else {
        return;
    };
    let (lo, hi) = state.preview_range;
    ui.label(format!("{}: {lo:.2} .. {hi:.2}", ui_text.preview.range));
    let tex_size = tex.size_vec2();
    let available = ui.available_size_before_wrap();
    let scale = (available.x / tex_size.x).min(available.y / tex_size.y).min(1.0);
    ui.image(egui::load::SizedTexture::new(tex.id(), tex_size * scale));
}

pub fn preview_ui(ui: &mut egui::Ui, state: &mut EditorState, config: &LatticeConfig, ui_text: &UiStrings) {
    ui.heading(&ui_text.preview.title);

    ui.horizontal(|ui| {
        ui.label(&ui_text.preview.resolution);
        ui.add(egui::Slider::new(&mut state.preview_w, 32..=1024).text(&ui_text.preview.width_short));
        ui.add(egui::Slider::new(&mut state.preview_h, 32..=1024).text(&ui_text.preview.height_short));
    });

    ui.horizontal(|ui| {
        if ui.button(&ui_text.preview.generate).clicked() {
            generate(ui.ctx(), state, config);
        }
        if ui.button(&ui_text.preview.open_window).clicked() {
            state.show_preview_window = true;
        }
    });

    if !state.show_preview_window {
        show_preview(ui, state, ui_text);
        return;
    }

    let mut open = true;
    egui::Window::new(&ui_text.preview.window_title)
        .open(&mut open)
        .resizable(true)
        .vscroll(true)
        .hscroll(true)
        .show(ui.ctx(), |ui| {
            if ui.button(&ui_text.preview.generate).clicked() {
                generate(ui.ctx(), state, config);
            }
            show_preview(ui, state, ui_text);
        });
    if !open {
        state.show_preview_window = false;
    }
}
