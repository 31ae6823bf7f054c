//! CPU approximation of the displacement field, for previews only. The
//! renderer never deforms geometry on the CPU.

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};

use crate::config::LatticeConfig;

pub struct ElevationSampler {
    height: FastNoiseLite,
    warp: Option<FastNoiseLite>,
    offset: (f32, f32),
    clamp: (f32, f32),
    elevation: f32,
    warp_strength: f32,
    size: (f32, f32),
}

impl ElevationSampler {
    pub fn new(config: &LatticeConfig) -> Self {
        let mut height = FastNoiseLite::with_seed(0);
        height.set_noise_type(Some(NoiseType::OpenSimplex2));
        height.set_frequency(Some(config.noise_frequency));
        height.set_fractal_type(Some(FractalType::FBm));
        height.set_fractal_octaves(Some(config.noise_depth.octaves() as i32));

        let warp = (config.noise_warp > 0.0).then(|| {
            let mut f = FastNoiseLite::with_seed(1);
            f.set_noise_type(Some(NoiseType::OpenSimplex2));
            f.set_frequency(Some(config.noise_frequency));
            f
        });

        Self {
            height,
            warp,
            offset: (config.noise_offset.x, config.noise_offset.y),
            clamp: (config.noise_clamp_min, config.noise_clamp_max),
            elevation: config.noise_elevation,
            warp_strength: config.noise_elevation * config.noise_warp,
            size: (config.size.x, config.size.y),
        }
    }

    /// Displacement at lattice-local (x, z).
    pub fn sample(&self, x: f32, z: f32) -> f32 {
        let (mut nx, mut nz) = (x + self.offset.0, z + self.offset.1);
        if let Some(warp) = &self.warp {
            nx += warp.get_noise_2d(nx, nz) * self.warp_strength;
            nz += warp.get_noise_2d(nz + 31.7, nx - 17.3) * self.warp_strength;
        }
        let (lo, hi) = self.clamp;
        let n = self.height.get_noise_2d(nx, nz);
        n.max(lo).min(hi) * self.elevation
    }

    /// Row-major `width * height` samples covering the configured extent.
    pub fn sample_grid(&self, width: u32, height: u32) -> Vec<f32> {
        let mut data = Vec::with_capacity((width * height) as usize);
        let (sx, sz) = self.size;
        let step_x = sx / width.saturating_sub(1).max(1) as f32;
        let step_z = sz / height.saturating_sub(1).max(1) as f32;
        for y in 0..height {
            for x in 0..width {
                let wx = x as f32 * step_x - sx * 0.5;
                let wz = y as f32 * step_z - sz * 0.5;
                data.push(self.sample(wx, wz));
            }
        }
        data
    }

    /// Bounds of the displacement: `elevation * [clamp_min, clamp_max]`.
    pub fn range(&self) -> (f32, f32) {
        let a = self.clamp.0 * self.elevation;
        let b = self.clamp.1 * self.elevation;
        (a.min(b), a.max(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_within_clamped_range() {
        let config = LatticeConfig { noise_clamp_min: -0.2, noise_clamp_max: 0.3, ..Default::default() };
        let sampler = ElevationSampler::new(&config);
        let (lo, hi) = sampler.range();
        for v in sampler.sample_grid(32, 32) {
            assert!(v >= lo - 1e-6 && v <= hi + 1e-6, "{v} outside {lo}..{hi}");
        }
    }

    #[test]
    fn grid_has_requested_size() {
        let sampler = ElevationSampler::new(&LatticeConfig::default());
        assert_eq!(sampler.sample_grid(17, 9).len(), 17 * 9);
    }

    #[test]
    fn zero_elevation_is_flat() {
        let config = LatticeConfig { noise_elevation: 0.0, ..Default::default() };
        let sampler = ElevationSampler::new(&config);
        assert!(sampler.sample_grid(8, 8).iter().all(|v| *v == 0.0));
    }
}
