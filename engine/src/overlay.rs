use crate::api::{Backend, GpuDevice, ScreenRect};
use crate::pool::BufferSet;

pub const THUMBNAIL_SIZE: f32 = 64.0;

/// Screen-space thumbnails of the position and normal buffers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugOverlay {
    pub origin: (f32, f32),
    pub size: f32,
}

impl Default for DebugOverlay {
    fn default() -> Self {
        Self { origin: (0.0, 0.0), size: THUMBNAIL_SIZE }
    }
}

impl DebugOverlay {
    /// Rectangle of the `index`-th thumbnail, left to right.
    pub fn thumbnail(&self, index: usize) -> ScreenRect {
        ScreenRect {
            x: self.origin.0 + index as f32 * self.size,
            y: self.origin.1,
            width: self.size,
            height: self.size,
        }
    }

    pub fn draw<B: Backend, D: GpuDevice<B>>(
        &self,
        device: &mut D,
        buffers: &BufferSet<B>,
        program: Option<&B::Program>,
    ) {
        let Some(program) = program else { return };
        let slots = [&buffers.position, &buffers.normal_a, &buffers.normal_b];
        for (index, buffer) in slots.into_iter().enumerate() {
            if let Some(buffer) = buffer {
                device.draw_texture(self.thumbnail(index), buffer, program);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnails_are_side_by_side() {
        let overlay = DebugOverlay::default();
        let rects: Vec<_> = (0..3).map(|i| overlay.thumbnail(i)).collect();
        assert_eq!(rects[0].x, 0.0);
        assert_eq!(rects[1].x, 64.0);
        assert_eq!(rects[2].x, 128.0);
        assert!(rects.iter().all(|r| r.y == 0.0 && r.width == 64.0 && r.height == 64.0));
    }
}
