use std::path::Path;

use glam::{Vec2, Vec4};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;
use crate::plan::clamp_grid;

/// Octave count of the noise accumulation. Each value selects one precompiled
/// kernel variant, so exactly one is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NoiseDepth {
    One = 1,
    Two = 2,
    Three = 3,
    #[default]
    Four = 4,
    Five = 5,
}

impl NoiseDepth {
    pub const ALL: [NoiseDepth; 5] =
        [NoiseDepth::One, NoiseDepth::Two, NoiseDepth::Three, NoiseDepth::Four, NoiseDepth::Five];

    pub fn octaves(self) -> u32 {
        self as u32
    }

    /// Nearest valid depth for an arbitrary octave count.
    pub fn saturating(octaves: u32) -> Self {
        match octaves {
            0 | 1 => NoiseDepth::One,
            2 => NoiseDepth::Two,
            3 => NoiseDepth::Three,
            4 => NoiseDepth::Four,
            _ => NoiseDepth::Five,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            NoiseDepth::One => "DEPTH1",
            NoiseDepth::Two => "DEPTH2",
            NoiseDepth::Three => "DEPTH3",
            NoiseDepth::Four => "DEPTH4",
            NoiseDepth::Five => "DEPTH5",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("noise depth must be within 1..=5, got {0}")]
pub struct InvalidDepth(pub u8);

impl TryFrom<u8> for NoiseDepth {
    type Error = InvalidDepth;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(NoiseDepth::One),
            2 => Ok(NoiseDepth::Two),
            3 => Ok(NoiseDepth::Three),
            4 => Ok(NoiseDepth::Four),
            5 => Ok(NoiseDepth::Five),
            other => Err(InvalidDepth(other)),
        }
    }
}

impl From<NoiseDepth> for u8 {
    fn from(depth: NoiseDepth) -> u8 {
        depth as u8
    }
}

/// Parameters of one lattice. Persisted by the host; the renderer only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    /// Raw counts; the planner clamps them into the supported range.
    pub columns: i32,
    pub rows: i32,
    pub size: Vec2,

    pub noise_offset: Vec2,
    pub noise_frequency: f32,
    pub noise_depth: NoiseDepth,
    pub noise_clamp_min: f32,
    pub noise_clamp_max: f32,
    pub noise_elevation: f32,
    /// 0..=1
    pub noise_warp: f32,

    /// Linear RGBA.
    pub surface_color: Vec4,
    /// Linear RGBA; zero alpha disables the wireframe.
    pub line_color: Vec4,
    pub metallic: f32,
    pub smoothness: f32,
    pub cast_shadows: bool,
    pub receive_shadows: bool,

    pub albedo_map: Option<String>,
    pub normal_map: Option<String>,
    pub occlusion_map: Option<String>,
    pub occlusion_strength: f32,
    pub map_scale: f32,

    pub debug: bool,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            columns: 100,
            rows: 100,
            size: Vec2::splat(10.0),
            noise_offset: Vec2::ZERO,
            noise_frequency: 2.0,
            noise_depth: NoiseDepth::Four,
            noise_clamp_min: -1.5,
            noise_clamp_max: 1.5,
            noise_elevation: 0.5,
            noise_warp: 0.1,
            surface_color: Vec4::ONE,
            line_color: Vec4::new(0.0, 0.0, 0.0, 0.4),
            metallic: 0.5,
            smoothness: 0.5,
            cast_shadows: false,
            receive_shadows: false,
            albedo_map: None,
            normal_map: None,
            occlusion_map: None,
            occlusion_strength: 0.0,
            map_scale: 1.0,
            debug: false,
        }
    }
}

impl LatticeConfig {
    /// Clamps the grid counts into the supported range. Other fields are
    /// bounded by the editing surface.
    pub fn sanitize(&mut self) {
        self.columns = clamp_grid(self.columns) as i32;
        self.rows = clamp_grid(self.rows) as i32;
    }

    pub fn draws_lines(&self) -> bool {
        self.line_color.w > 0.0
    }

    pub fn randomize_noise_offset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.noise_offset = Vec2::new(rng.gen_range(-1000.0..1000.0), rng.gen_range(-1000.0..1000.0));
    }

    pub fn from_ron_str(s: &str) -> Result<Self> {
        Ok(ron::from_str(s)?)
    }

    pub fn to_ron_string(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_ron_str(&s)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::GeometryPlan;

    #[test]
    fn sanitize_clamps_grid_only() {
        let mut c = LatticeConfig { columns: 1, rows: 9000, noise_warp: 3.0, ..Default::default() };
        c.sanitize();
        assert_eq!((c.columns, c.rows), (4, 4096));
        assert_eq!(c.noise_warp, 3.0);
    }

    #[test]
    fn partial_ron_fills_defaults() {
        let c = LatticeConfig::from_ron_str("(columns: 240, noise_depth: 2)").unwrap();
        assert_eq!(c.columns, 240);
        assert_eq!(c.rows, 100);
        assert_eq!(c.noise_depth, NoiseDepth::Two);
    }

    #[test]
    fn negative_grid_counts_load_and_clamp() {
        let mut c = LatticeConfig::from_ron_str("(columns: -5, rows: 100)").unwrap();
        assert_eq!(c.columns, -5);
        assert_eq!(GeometryPlan::new(c.columns, c.rows).columns, 4);
        c.sanitize();
        assert_eq!((c.columns, c.rows), (4, 100));
    }

    #[test]
    fn depth_out_of_range_is_rejected() {
        assert!(LatticeConfig::from_ron_str("(noise_depth: 6)").is_err());
        assert!(LatticeConfig::from_ron_str("(noise_depth: 0)").is_err());
    }

    #[test]
    fn ron_preserves_maps() {
        let c = LatticeConfig { albedo_map: Some("textures/rock.png".into()), debug: true, ..Default::default() };
        let back = LatticeConfig::from_ron_str(&c.to_ron_string().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn invalid_depth_is_a_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(NoiseDepth::try_from(7u8).unwrap_err());
        assert_eq!(err.to_string(), "noise depth must be within 1..=5, got 7");
        assert_eq!(NoiseDepth::default(), NoiseDepth::Four);
    }

    #[test]
    fn saturating_depth() {
        assert_eq!(NoiseDepth::saturating(0), NoiseDepth::One);
        assert_eq!(NoiseDepth::saturating(3), NoiseDepth::Three);
        assert_eq!(NoiseDepth::saturating(42), NoiseDepth::Five);
    }

    #[test]
    fn zero_alpha_line_color_disables_lines() {
        let mut c = LatticeConfig::default();
        assert!(c.draws_lines());
        c.line_color.w = 0.0;
        assert!(!c.draws_lines());
    }
}
