use glam::{UVec2, Vec2};

pub const MIN_GRID: u32 = 4;
pub const MAX_GRID: u32 = 4096;

/// Per-draw vertex ceiling of the target hardware.
pub const VERTEX_CEILING: u32 = 65_000;

/// Two flat-shaded triangles per cell, three unshared vertices each.
/// Must agree with the tile layout in [`crate::mesh`].
pub const VERTICES_PER_CELL: u32 = 6;

/// Grid dimensions after clamping and segmentation. Sole authority for
/// buffer sizes and the draw loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryPlan {
    pub columns: u32,
    /// Clamped requested rows; `total_rows` may be smaller after segmentation.
    pub rows: u32,
    pub rows_per_segment: u32,
    pub total_rows: u32,
    pub segment_count: u32,
}

impl GeometryPlan {
    /// Takes the raw, possibly negative, counts stored in the config.
    pub fn new(columns: i32, rows: i32) -> Self {
        let columns = clamp_grid(columns);
        let rows = clamp_grid(rows);

        let total_vertices = (columns + 1) * (rows + 1) * VERTICES_PER_CELL;
        let segment_count = total_vertices / VERTEX_CEILING + 1;

        // Segment starts must keep row parity, hence the even rounding.
        let rows_per_segment = if segment_count > 1 { (rows / segment_count) / 2 * 2 } else { rows };

        Self {
            columns,
            rows,
            rows_per_segment,
            total_rows: rows_per_segment * segment_count,
            segment_count,
        }
    }

    pub fn total_vertex_count(&self) -> u32 {
        (self.columns + 1) * (self.rows + 1) * VERTICES_PER_CELL
    }

    pub fn buffer_width(&self) -> u32 {
        (self.columns + 1) * 2
    }

    pub fn buffer_height(&self) -> u32 {
        self.total_rows + 1
    }

    pub fn buffer_size(&self) -> UVec2 {
        UVec2::new(self.buffer_width(), self.buffer_height())
    }

    /// Too many columns for the requested rows: nothing can be drawn.
    pub fn is_degenerate(&self) -> bool {
        self.rows_per_segment == 0
    }

    /// First buffer row of every segment, in draw order.
    pub fn segment_starts(&self) -> impl Iterator<Item = u32> {
        let step = self.rows_per_segment.max(1) as usize;
        let end = if self.is_degenerate() { 0 } else { self.total_rows };
        (0..end).step_by(step)
    }

    /// Half-texel-centred sampling offset for the segment starting at `start`.
    pub fn segment_uv_offset(&self, start: u32) -> Vec2 {
        Vec2::new(
            0.5 / self.buffer_width() as f32,
            (0.5 + start as f32) / self.buffer_height() as f32,
        )
    }
}

/// Clamps a raw grid count into `MIN_GRID..=MAX_GRID`.
pub fn clamp_grid(count: i32) -> u32 {
    count.clamp(MIN_GRID as i32, MAX_GRID as i32) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_fits_one_segment() {
        let plan = GeometryPlan::new(100, 100);
        assert_eq!(plan.total_vertex_count(), 61_206);
        assert_eq!(plan.segment_count, 1);
        assert_eq!(plan.rows_per_segment, 100);
        assert_eq!(plan.total_rows, 100);
        assert_eq!(plan.buffer_size(), UVec2::new(202, 101));
    }

    #[test]
    fn single_segment_keeps_odd_rows() {
        let plan = GeometryPlan::new(10, 7);
        assert_eq!(plan.segment_count, 1);
        assert_eq!(plan.rows_per_segment, 7);
        assert_eq!(plan.segment_starts().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn three_segments_truncate_rows() {
        // (C+1)*101*6 in [130000, 195000) gives three segments.
        let plan = GeometryPlan::new(250, 100);
        assert_eq!(plan.segment_count, 3);
        assert_eq!(plan.rows_per_segment, 32);
        assert_eq!(plan.total_rows, 96);
        assert_eq!(plan.segment_starts().collect::<Vec<_>>(), vec![0, 32, 64]);
    }

    #[test]
    fn degenerate_plan_draws_nothing() {
        let plan = GeometryPlan::new(4096, 5);
        assert_eq!(plan.segment_count, 3);
        assert!(plan.is_degenerate());
        assert_eq!(plan.total_rows, 0);
        assert_eq!(plan.segment_starts().count(), 0);
        assert_eq!(plan.buffer_height(), 1);
    }

    #[test]
    fn negative_counts_clamp_to_minimum() {
        let plan = GeometryPlan::new(-5, i32::MIN);
        assert_eq!((plan.columns, plan.rows), (MIN_GRID, MIN_GRID));
        assert_eq!(plan, GeometryPlan::new(4, 4));
    }

    #[test]
    fn uv_offset_is_texel_centred() {
        let plan = GeometryPlan::new(250, 100);
        let uv = plan.segment_uv_offset(32);
        assert_eq!(uv.x, 0.5 / 502.0);
        assert_eq!(uv.y, 32.5 / 97.0);
    }
}
