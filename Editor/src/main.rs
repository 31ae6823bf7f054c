use bevy::prelude::*;
use bevy_egui::{egui, EguiPlugin};
use lattice_engine::LatticeConfig;

mod lattice;
mod panel;
mod preview;
mod ui_strings;

use lattice::{LatticeBundle, LatticePlugin, NoiseScroll};
use ui_strings::UiStrings;

const UI_STRINGS_PATH: &str = "assets/ui_strings.json";
const DEFAULT_PRESET_PATH: &str = "assets/lattice.ron";

#[derive(Resource)]
struct EditorState {
    ui: UiStrings,
    /// Why `ui` fell back to the built-in strings, reported once logging is up.
    ui_load_error: Option<String>,
    preset_path: String,
    status: Option<String>,
    preview_w: u32,
    preview_h: u32,
    preview: Option<egui::TextureHandle>,
    preview_range: (f32, f32),
    show_preview_window: bool,
}

impl EditorState {
    fn new() -> Self {
        let (ui, ui_load_error) = match ui_strings::load_from_file(UI_STRINGS_PATH) {
            Ok(ui) => (ui, None),
            Err(e) => (UiStrings::default(), Some(format!("{UI_STRINGS_PATH}: {e}"))),
        };
        Self {
            ui,
            ui_load_error,
            preset_path: DEFAULT_PRESET_PATH.to_string(),
            status: None,
            preview_w: 256,
            preview_h: 256,
            preview: None,
            preview_range: (0.0, 0.0),
            show_preview_window: false,
        }
    }
}

fn setup_lighting(mut commands: Commands) {
    commands.insert_resource(AmbientLight {
        color: Color::rgb(0.4, 0.4, 0.45),
        brightness: 150.0,
    });

    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight {
            color: Color::rgb(1.0, 0.95, 0.8),
            illuminance: 10000.0,
            shadows_enabled: true,
            ..default()
        },
        transform: Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.9, 0.5, 0.0)),
        ..default()
    });
}

fn setup_scene(mut commands: Commands, mut state: ResMut<EditorState>) {
    if let Some(e) = state.ui_load_error.take() {
        warn!("using built-in UI strings: {e}");
    }

    let config = match LatticeConfig::load(&state.preset_path) {
        Ok(mut config) => {
            config.sanitize();
            info!("loaded lattice preset {}", state.preset_path);
            config
        }
        Err(e) => {
            warn!("no usable preset at {} ({e}), using defaults", state.preset_path);
            LatticeConfig::default()
        }
    };

    let extent = config.size.max_element();
    commands.spawn(Camera3dBundle {
        transform: Transform::from_xyz(0.0, extent * 0.6, extent * 1.1).looking_at(Vec3::ZERO, Vec3::Y),
        ..default()
    });
    commands.spawn((LatticeBundle::new(config), NoiseScroll(Vec2::new(0.0, 0.1))));
}

fn main() {
    let state = EditorState::new();
    let title = state.ui.app.window_title.clone();

    App::new()
        .insert_resource(ClearColor(Color::rgb(0.08, 0.08, 0.1)))
        .insert_resource(state)
        .add_plugins((
            DefaultPlugins.set(WindowPlugin {
                primary_window: Some(Window { title, ..default() }),
                ..default()
            }),
            EguiPlugin,
            LatticePlugin,
        ))
        .add_systems(Startup, (setup_lighting, setup_scene))
        .add_systems(Update, panel::lattice_panel)
        .run();
}
