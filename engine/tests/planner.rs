use lattice_engine::plan::{GeometryPlan, MAX_GRID, MIN_GRID, VERTEX_CEILING};
use proptest::prelude::*;

proptest! {
    #[test]
    fn plan_is_clamped_and_segmented(columns in 1i32..=10_000, rows in 1i32..=10_000) {
        let plan = GeometryPlan::new(columns, rows);

        prop_assert!((MIN_GRID..=MAX_GRID).contains(&plan.columns));
        prop_assert!((MIN_GRID..=MAX_GRID).contains(&plan.rows));
        prop_assert_eq!(plan.segment_count, plan.total_vertex_count() / VERTEX_CEILING + 1);
        prop_assert_eq!(plan.total_rows, plan.rows_per_segment * plan.segment_count);
        prop_assert!(plan.total_rows <= plan.rows);
        if plan.segment_count > 1 {
            prop_assert_eq!(plan.rows_per_segment % 2, 0);
        } else {
            prop_assert_eq!(plan.rows_per_segment, plan.rows);
        }
    }

    #[test]
    fn draw_loop_lands_on_total_rows(columns in 1i32..=10_000, rows in 1i32..=10_000) {
        let plan = GeometryPlan::new(columns, rows);
        let starts: Vec<u32> = plan.segment_starts().collect();
        if plan.is_degenerate() {
            prop_assert!(starts.is_empty());
        } else {
            prop_assert_eq!(starts.len() as u32, plan.segment_count);
            prop_assert_eq!(starts.last().copied().unwrap() + plan.rows_per_segment, plan.total_rows);
        }
    }

    #[test]
    fn planning_is_idempotent(columns in 1i32..=10_000, rows in 1i32..=10_000) {
        let first = GeometryPlan::new(columns, rows);
        let second = GeometryPlan::new(first.columns as i32, first.rows as i32);
        prop_assert_eq!(first, second);
        prop_assert_eq!(first, GeometryPlan::new(columns, rows));
    }
}

#[test]
fn buffer_dimensions_follow_plan() {
    for (c, r) in [(4, 4), (100, 100), (250, 100), (4096, 4096), (1, 1)] {
        let plan = GeometryPlan::new(c, r);
        assert_eq!(plan.buffer_width(), (plan.columns + 1) * 2);
        assert_eq!(plan.buffer_height(), plan.total_rows + 1);
    }
}

#[test]
fn largest_grid_splits_into_many_segments() {
    let plan = GeometryPlan::new(4096, 4096);
    assert_eq!(plan.segment_count, 4097 * 4097 * 6 / 65_000 + 1);
    assert_eq!(plan.rows_per_segment % 2, 0);
    assert!(plan.rows_per_segment > 0);
}
