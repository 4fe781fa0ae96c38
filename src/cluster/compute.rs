//! Per-cell range test of every selected capsule.

use glam::{UVec3, Vec3};
use rayon::prelude::*;

use super::builder::ClusterAssigner;
use super::grid::ClusterGrid;
use super::lists::ClusterLists;
use crate::capsule::CapsuleVolume;
use crate::util::aabb::Aabb;

/// Visits each cell and appends every capsule whose influence volume may
/// reach it.
///
/// A capsule is accepted when its depth span overlaps the cell's slice,
/// its box overlaps the cell's box, and its axis lies within
/// `influence_radius + half diagonal` of the cell's centre.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeTest;

/// View depth interval of a capsule's influence volume.
pub(super) fn depth_span(grid: &ClusterGrid, capsule: &CapsuleVolume) -> (f32, f32) {
    let d1 = grid.view_depth(capsule.point1);
    let d2 = grid.view_depth(capsule.point2);
    (
        d1.min(d2) - capsule.influence_radius,
        d1.max(d2) + capsule.influence_radius,
    )
}

/// One cell's depth slice and world-space box.
#[derive(Debug, Clone, Copy)]
pub(super) struct CellVolume {
    near: f32,
    far: f32,
    bounds: Aabb,
    centre: Vec3,
    half_diagonal: f32,
}

impl CellVolume {
    pub(super) fn new(grid: &ClusterGrid, cell: UVec3) -> Self {
        let slice_depth = grid.range() / grid.resolution().z as f32;
        let near = cell.z as f32 * slice_depth;
        let bounds = grid.cell_bounds(cell);
        Self {
            near,
            far: near + slice_depth,
            bounds,
            centre: bounds.center(),
            half_diagonal: bounds.size().length() * 0.5,
        }
    }

    /// Whether a capsule whose influence spans view depths `span` may
    /// reach this cell. Never rejects a capsule that does.
    pub(super) fn admits(&self, capsule: &CapsuleVolume, (lo, hi): (f32, f32)) -> bool {
        hi >= self.near
            && lo <= self.far
            && self.bounds.intersects(&capsule.bounds)
            && capsule.distance_to_axis(self.centre) <= capsule.influence_radius + self.half_diagonal
    }
}

impl RangeTest {
    fn test_cell(
        grid: &ClusterGrid,
        cell_index: usize,
        capsules: &[CapsuleVolume],
        spans: &[(f32, f32)],
        lists: &ClusterLists,
    ) {
        let volume = CellVolume::new(grid, grid.cell_at(cell_index));
        for (i, (capsule, &span)) in capsules.iter().zip(spans).enumerate() {
            if volume.admits(capsule, span) {
                let _ = lists.push(cell_index, i as u32);
            }
        }
    }
}

impl ClusterAssigner for RangeTest {
    fn assign(
        &self,
        grid: &ClusterGrid,
        capsules: &[CapsuleVolume],
        lists: &ClusterLists,
        parallel: bool,
    ) {
        if capsules.is_empty() || grid.range() <= 0.0 {
            return;
        }
        let spans: Vec<(f32, f32)> = capsules.iter().map(|c| depth_span(grid, c)).collect();

        if parallel {
            (0..grid.cell_count())
                .into_par_iter()
                .for_each(|cell| Self::test_cell(grid, cell, capsules, &spans, lists));
        } else {
            for cell in 0..grid.cell_count() {
                Self::test_cell(grid, cell, capsules, &spans, lists);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::test_scene::camera;

    #[test]
    fn depth_span_includes_influence() {
        let grid = ClusterGrid::new(&camera(), UVec3::splat(8), 8.0);
        let capsule = CapsuleVolume::new(Vec3::new(1.0, 0.0, -2.0), Vec3::new(0.0, 1.0, -5.0), 0.5);
        let (lo, hi) = depth_span(&grid, &capsule);
        assert!((lo - 1.5).abs() < 1e-5);
        assert!((hi - 5.5).abs() < 1e-5);
    }

    #[test]
    fn far_off_axis_capsule_is_rejected_by_the_distance_test() {
        let grid = ClusterGrid::new(&camera(), UVec3::splat(8), 8.0);
        let lists = ClusterLists::new(grid.cell_count(), 4);
        // Diagonal segment whose box spans many cells the segment misses.
        let capsule =
            CapsuleVolume::new(Vec3::new(-3.0, -3.0, -4.0), Vec3::new(3.0, 3.0, -4.0), 0.05);
        RangeTest.assign(&grid, &[capsule], &lists, false);

        let hit = |x, y, z| lists.count(grid.cell_index(UVec3::new(x, y, z))) > 0;
        assert!(hit(4, 4, 3) || hit(4, 4, 4));
        // Opposite corners of the diagonal stay empty.
        assert!(!hit(0, 7, 3) && !hit(0, 7, 4));
        assert!(!hit(7, 0, 3) && !hit(7, 0, 4));
    }

    #[test]
    fn parallel_and_sequential_give_the_same_cell_lists() {
        let grid = ClusterGrid::new(&camera(), UVec3::splat(8), 8.0);
        let capsules: Vec<CapsuleVolume> = (0..12)
            .map(|i| {
                let t = i as f32;
                CapsuleVolume::new(
                    Vec3::new(t * 0.3 - 1.5, -0.4, -1.0 - t * 0.5),
                    Vec3::new(t * 0.3 - 1.2, 0.6, -1.5 - t * 0.5),
                    0.3,
                )
            })
            .collect();
        let a = ClusterLists::new(grid.cell_count(), 16);
        let b = ClusterLists::new(grid.cell_count(), 16);
        RangeTest.assign(&grid, &capsules, &a, false);
        RangeTest.assign(&grid, &capsules, &b, true);
        for cell in 0..grid.cell_count() {
            let seq: Vec<u32> = a.iter_cell(cell).collect();
            let par: Vec<u32> = b.iter_cell(cell).collect();
            assert_eq!(seq, par, "cell {cell}");
        }
    }
}
