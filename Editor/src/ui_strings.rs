use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UiStrings {
    pub app: AppStrings,
    pub preset: PresetStrings,
    pub lattice_panel: LatticePanelStrings,
    pub preview: PreviewStrings,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppStrings {
    pub window_title: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PresetStrings {
    pub title: String,
    pub save: String,
    pub load: String,
    pub saved: String,
    pub loaded: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LatticePanelStrings {
    pub title: String,
    pub grid: String,
    pub columns: String,
    pub rows: String,
    pub size: String,
    pub noise: String,
    pub offset: String,
    pub randomize: String,
    pub scroll: String,
    pub frequency: String,
    pub depth: String,
    pub clamp: String,
    pub elevation: String,
    pub warp: String,
    pub surface: String,
    pub surface_color: String,
    pub line_color: String,
    pub metallic: String,
    pub smoothness: String,
    pub cast_shadows: String,
    pub receive_shadows: String,
    pub maps: String,
    pub albedo_map: String,
    pub normal_map: String,
    pub occlusion_map: String,
    pub occlusion_strength: String,
    pub map_scale: String,
    pub debug: String,
    pub segments: String,
    pub failed: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PreviewStrings {
    pub title: String,
    pub resolution: String,
    pub generate: String,
    pub width_short: String,
    pub height_short: String,
    pub open_window: String,
    pub window_title: String,
    pub range: String,
}

impl Default for UiStrings {
    fn default() -> Self {
        Self {
            app: AppStrings {
                window_title: "Lattice Editor".to_string(),
            },
            preset: PresetStrings {
                title: "Preset".to_string(),
                save: "Save".to_string(),
                load: "Load".to_string(),
                saved: "Preset saved".to_string(),
                loaded: "Preset loaded".to_string(),
            },
            lattice_panel: LatticePanelStrings {
                title: "Lattice".to_string(),
                grid: "Grid".to_string(),
                columns: "Columns".to_string(),
                rows: "Rows".to_string(),
                size: "Size".to_string(),
                noise: "Noise".to_string(),
                offset: "Offset".to_string(),
                randomize: "Randomize".to_string(),
                scroll: "Scroll".to_string(),
                frequency: "Frequency".to_string(),
                depth: "Depth".to_string(),
                clamp: "Clamp".to_string(),
                elevation: "Elevation".to_string(),
                warp: "Warp".to_string(),
                surface: "Surface".to_string(),
                surface_color: "Surface color".to_string(),
                line_color: "Line color".to_string(),
                metallic: "Metallic".to_string(),
                smoothness: "Smoothness".to_string(),
                cast_shadows: "Cast shadows".to_string(),
                receive_shadows: "Receive shadows".to_string(),
                maps: "Maps".to_string(),
                albedo_map: "Albedo".to_string(),
                normal_map: "Normal".to_string(),
                occlusion_map: "Occlusion".to_string(),
                occlusion_strength: "Occlusion strength".to_string(),
                map_scale: "Map scale".to_string(),
                debug: "Show buffers".to_string(),
                segments: "Segments".to_string(),
                failed: "Rebuild failed, change the grid to retry".to_string(),
            },
            preview: PreviewStrings {
                title: "Elevation".to_string(),
                resolution: "Resolution".to_string(),
                generate: "Generate".to_string(),
                width_short: "W".to_string(),
                height_short: "H".to_string(),
                open_window: "Open Preview Window".to_string(),
                window_title: "Elevation Preview".to_string(),
                range: "Range".to_string(),
            },
        }
    }
}

pub fn load_from_file(path: &str) -> anyhow::Result<UiStrings> {
    let s = std::fs::read_to_string(path)?;
    let ui: UiStrings = serde_json::from_str(&s)?;
    Ok(ui)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_keep_defaults() {
        let ui: UiStrings = serde_json::from_str(r#"{ "preset": { "save": "Sichern" } }"#).unwrap();
        assert_eq!(ui.preset.save, "Sichern");
        assert_eq!(ui.lattice_panel.columns, "Columns");
        // A section that is present but partial only keeps what it names.
        assert_eq!(ui.preset.load, "");
    }
}
