//! Capsule-to-cell assignment.
//!
//! The builder resets the lists, then hands the selected capsules to one of
//! two interchangeable strategies. Both append through
//! [`ClusterLists::push`] and differ only in how they find the cells a
//! capsule touches:
//!
//! - [`Rasterizer`] walks the screen tiles under each capsule and clips
//!   it against each tile for the slices it reaches. Cost follows the cells capsules cover.
//! - [`RangeTest`] visits every cell and tests every capsule against it.
//!   Cost follows cells × capsules, so it suits coarse grids.
//!
//! Both cover every cell a capsule's influence volume touches and may
//! over-report cells near its surface. The conservative rasterizer's cells
//! are always a subset of the range test's, so the merged structures agree
//! up to that over-report.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::compute::RangeTest;
use super::grid::ClusterGrid;
use super::lists::ClusterLists;
use super::raster::Rasterizer;
use crate::capsule::CapsuleVolume;

/// How capsules are assigned to cells.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringMethod {
    /// Rasterize each capsule's influence volume into the grid tile by
    /// tile.
    #[default]
    Rasterizer,
    /// Range-test every capsule against every cell.
    Compute,
}

/// Inputs controlling one build pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSettings {
    /// Assignment strategy.
    pub method: ClusteringMethod,
    /// Rasterizer only: cover every tile a capsule touches instead of only
    /// tiles whose centre it covers.
    pub conservative: bool,
    /// Fan the assignment out over rayon.
    pub parallel: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            method: ClusteringMethod::Rasterizer,
            conservative: true,
            parallel: true,
        }
    }
}

/// A strategy that appends every `(cell, capsule)` overlap to the lists.
pub trait ClusterAssigner: Send + Sync {
    /// Append each capsule (by its index in `capsules`) to every cell of
    /// `grid` its influence volume may overlap.
    fn assign(
        &self,
        grid: &ClusterGrid,
        capsules: &[CapsuleVolume],
        lists: &ClusterLists,
        parallel: bool,
    );
}

/// Outcome of one build pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Appends that landed in the record pool.
    pub records_used: usize,
    /// Appends the frame asked for, including dropped ones.
    pub records_requested: u32,
    /// Appends dropped because the record pool was full.
    pub dropped: u32,
}

impl BuildReport {
    /// Whether the record pool overflowed.
    #[must_use]
    pub fn overflowed(&self) -> bool {
        self.dropped > 0
    }
}

/// Reset `lists` and rebuild them for `capsules`.
///
/// `lists` must have been sized for `grid.cell_count()` cells.
pub fn build(
    grid: &ClusterGrid,
    capsules: &[CapsuleVolume],
    lists: &mut ClusterLists,
    settings: &BuildSettings,
) -> BuildReport {
    debug_assert_eq!(lists.cell_count(), grid.cell_count());
    lists.reset();

    let lists = &*lists;
    match settings.method {
        ClusteringMethod::Rasterizer => Rasterizer {
            conservative: settings.conservative,
        }
        .assign(grid, capsules, lists, settings.parallel),
        ClusteringMethod::Compute => {
            RangeTest.assign(grid, capsules, lists, settings.parallel);
        }
    }

    BuildReport {
        records_used: lists.records_used(),
        records_requested: lists.records_requested(),
        dropped: lists.dropped(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use glam::{IVec3, UVec3, Vec3};

    use super::*;
    use crate::cluster::merge::MergedClusters;
    use crate::select::test_scene::camera;

    /// Sorted `(cell, capsule)` pairs in the lists.
    pub(crate) fn assignments(lists: &ClusterLists) -> Vec<(usize, u32)> {
        let mut pairs: Vec<(usize, u32)> = (0..lists.cell_count())
            .flat_map(|cell| lists.iter_cell(cell).map(move |capsule| (cell, capsule)))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    /// Sphere of influence 0.5 centred on a tile/slice corner of the
    /// 8×8×8 test grid (camera at origin, 90° FOV, range 8).
    pub(crate) fn corner_sphere() -> CapsuleVolume {
        let centre = Vec3::new(0.0, 0.0, -4.0);
        CapsuleVolume::new(centre, centre, 0.5)
    }

    /// Forty short slanted capsules spread through the 8×8×8 test grid.
    pub(crate) fn scattered() -> Vec<CapsuleVolume> {
        (0..40)
            .map(|i| {
                let t = i as f32;
                let x = (t * 0.37).sin() * 2.0;
                let y = (t * 0.73).cos() * 1.5;
                let z = -1.0 - (t * 0.17) % 6.5;
                CapsuleVolume::new(Vec3::new(x, y, z), Vec3::new(x + 0.4, y - 0.2, z - 0.6), 0.35)
            })
            .collect()
    }

    /// Sorted `(cell, capsule)` pairs holding sample points of each
    /// influence volume: `steps + 1` points along the axis, each with a
    /// lattice of offsets just inside the radius.
    fn sampled_cells(
        grid: &ClusterGrid,
        capsules: &[CapsuleVolume],
        steps: u32,
    ) -> Vec<(usize, u32)> {
        let lattice: Vec<IVec3> = (-3..=3)
            .flat_map(|x| (-3..=3).flat_map(move |y| (-3..=3).map(move |z| IVec3::new(x, y, z))))
            .filter(|offset| offset.length_squared() <= 9)
            .collect();
        let mut pairs = Vec::new();
        for (i, capsule) in capsules.iter().enumerate() {
            let spacing = capsule.influence_radius * 0.99 / 3.0;
            for k in 0..=steps {
                let centre = capsule.point1.lerp(capsule.point2, k as f32 / steps as f32);
                for offset in &lattice {
                    if let Some(cell) = grid.cell_of(centre + offset.as_vec3() * spacing) {
                        pairs.push((grid.cell_index(cell), i as u32));
                    }
                }
            }
        }
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }

    fn grid8() -> ClusterGrid {
        ClusterGrid::new(&camera(), UVec3::splat(8), 8.0)
    }

    fn is_subset(small: &[(usize, u32)], large: &[(usize, u32)]) -> bool {
        small.iter().all(|pair| large.binary_search(pair).is_ok())
    }

    fn expected_block(grid: &ClusterGrid) -> Vec<(usize, u32)> {
        let mut cells: Vec<(usize, u32)> = (3..5)
            .flat_map(|z| (3..5).flat_map(move |y| (3..5).map(move |x| UVec3::new(x, y, z))))
            .map(|cell| (grid.cell_index(cell), 0))
            .collect();
        cells.sort_unstable();
        cells
    }

    fn all_settings() -> Vec<BuildSettings> {
        let mut out = Vec::new();
        for method in [ClusteringMethod::Rasterizer, ClusteringMethod::Compute] {
            for conservative in [true, false] {
                for parallel in [true, false] {
                    out.push(BuildSettings {
                        method,
                        conservative,
                        parallel,
                    });
                }
            }
        }
        out
    }

    /// Settings that cover every touched cell: the conservative rasterizer
    /// and the range test.
    fn covering_settings() -> Vec<BuildSettings> {
        all_settings()
            .into_iter()
            .filter(|s| s.conservative || s.method == ClusteringMethod::Compute)
            .collect()
    }

    #[test]
    fn sphere_spanning_2x2x2_cells_hits_exactly_those() {
        let grid = grid8();
        let mut lists = ClusterLists::new(grid.cell_count(), 4);
        for settings in covering_settings() {
            let report = build(&grid, &[corner_sphere()], &mut lists, &settings);
            assert_eq!(assignments(&lists), expected_block(&grid), "{settings:?}");
            assert_eq!(report.records_used, 8);
            assert!(!report.overflowed());
        }
    }

    #[test]
    fn no_capsules_leaves_every_cell_empty() {
        let grid = grid8();
        let mut lists = ClusterLists::new(grid.cell_count(), 4);
        // Dirty the lists first; build must reset them.
        assert!(lists.push(0, 7));
        for settings in all_settings() {
            let report = build(&grid, &[], &mut lists, &settings);
            assert_eq!(report, BuildReport::default());
            assert!((0..grid.cell_count()).all(|c| lists.count(c) == 0));
        }
    }

    #[test]
    fn capsule_outside_the_grid_is_ignored() {
        let grid = grid8();
        let mut lists = ClusterLists::new(grid.cell_count(), 4);
        let behind = CapsuleVolume::new(Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.0, 1.0, 3.0), 0.5);
        let too_far = CapsuleVolume::new(Vec3::new(0.0, 0.0, -20.0), Vec3::new(0.0, 0.0, -30.0), 0.5);
        for settings in all_settings() {
            let report = build(&grid, &[behind, too_far], &mut lists, &settings);
            assert_eq!(report.records_requested, 0, "{settings:?}");
        }
    }

    #[test]
    fn strategies_cover_a_long_capsule() {
        let grid = grid8();
        let mut lists = ClusterLists::new(grid.cell_count(), 8);
        let diagonal =
            CapsuleVolume::new(Vec3::new(-2.0, -1.0, -2.5), Vec3::new(2.5, 1.5, -6.5), 0.3);

        // Every cell containing a point of the segment must be hit.
        let required: Vec<usize> = (0..=200)
            .filter_map(|i| {
                let t = i as f32 / 200.0;
                grid.cell_of(diagonal.point1.lerp(diagonal.point2, t))
            })
            .map(|cell| grid.cell_index(cell))
            .collect();
        assert!(!required.is_empty());

        for method in [ClusteringMethod::Rasterizer, ClusteringMethod::Compute] {
            let settings = BuildSettings {
                method,
                ..BuildSettings::default()
            };
            let _ = build(&grid, &[diagonal], &mut lists, &settings);
            for &cell in &required {
                assert_eq!(lists.count(cell), 1, "{method:?} missed cell {cell}");
            }
        }
    }

    #[test]
    fn centre_coverage_needs_a_tile_centre() {
        let grid = grid8();
        let mut lists = ClusterLists::new(grid.cell_count(), 4);
        let settings = BuildSettings {
            conservative: false,
            ..BuildSettings::default()
        };
        // The corner sphere sits between four tile centres without reaching
        // any of them.
        let report = build(&grid, &[corner_sphere()], &mut lists, &settings);
        assert_eq!(report.records_requested, 0);

        let wider = CapsuleVolume::new(Vec3::new(0.0, 0.0, -4.0), Vec3::new(0.0, 0.0, -4.0), 0.75);
        let _ = build(&grid, &[wider], &mut lists, &settings);
        assert_eq!(assignments(&lists), expected_block(&grid));
    }

    #[test]
    fn rasterizer_stays_between_samples_and_range_test() {
        let grid = grid8();
        // A limb-like capsule crossing the view diagonally.
        let diagonal =
            [CapsuleVolume::new(Vec3::new(-2.0, -1.0, -2.5), Vec3::new(2.5, 1.5, -6.5), 0.3)];
        let mut lists = ClusterLists::new(grid.cell_count(), 8);

        let _ = build(&grid, &diagonal, &mut lists, &BuildSettings::default());
        let raster = assignments(&lists);
        let settings = BuildSettings {
            method: ClusteringMethod::Compute,
            ..BuildSettings::default()
        };
        let _ = build(&grid, &diagonal, &mut lists, &settings);
        let compute = assignments(&lists);
        let sampled = sampled_cells(&grid, &diagonal, 24);

        assert!(is_subset(&sampled, &raster));
        assert!(is_subset(&raster, &compute));
        assert!(raster.len() < compute.len());
        // Over-report stays within half the touched cells.
        assert!(raster.len() <= sampled.len() * 3 / 2, "{} vs {}", raster.len(), sampled.len());
    }

    #[test]
    fn strategies_agree_on_a_scattered_scene() {
        let grid = grid8();
        let capsules = scattered();
        let mut lists = ClusterLists::new(grid.cell_count(), 16);
        let sampled = sampled_cells(&grid, &capsules, 16);

        let mut merged = Vec::new();
        for method in [ClusteringMethod::Rasterizer, ClusteringMethod::Compute] {
            let settings = BuildSettings {
                method,
                ..BuildSettings::default()
            };
            let report = build(&grid, &capsules, &mut lists, &settings);
            assert!(!report.overflowed(), "{method:?}");
            assert!(is_subset(&sampled, &assignments(&lists)), "{method:?}");
            merged.push(MergedClusters::from_lists(&lists, true));
        }

        let (raster, compute) = (&merged[0], &merged[1]);
        assert!(raster.indices().len() < compute.indices().len());
        for cell in 0..grid.cell_count() {
            let wide = compute.capsules_in(cell);
            assert!(
                raster.capsules_in(cell).iter().all(|i| wide.binary_search(i).is_ok()),
                "cell {cell}"
            );
        }
    }

    #[test]
    fn undersized_pool_saturates_deterministically() {
        let grid = grid8();
        // 512 cells × headroom 4 = 2048 records.
        let mut lists = ClusterLists::new(grid.cell_count(), 4);
        let capsules: Vec<CapsuleVolume> = (0..100).map(|_| corner_sphere()).collect();
        // 100 capsules × 8 cells = 800 appends into 2048 records: fits.
        let report = build(&grid, &capsules, &mut lists, &BuildSettings::default());
        assert_eq!(report.records_requested, 800);
        assert!(!report.overflowed());

        let capsules: Vec<CapsuleVolume> = (0..300).map(|_| corner_sphere()).collect();
        for settings in covering_settings() {
            let report = build(&grid, &capsules, &mut lists, &settings);
            assert_eq!(report.records_requested, 2400);
            assert_eq!(report.records_used, 2048);
            assert_eq!(report.dropped, 352);
            let total: u32 = (0..grid.cell_count()).map(|c| lists.count(c)).sum();
            assert_eq!(total, 2048);
        }
    }

    #[test]
    fn sequential_build_is_repeatable() {
        let grid = grid8();
        let mut lists = ClusterLists::new(grid.cell_count(), 8);
        let capsules: Vec<CapsuleVolume> = (0..20)
            .map(|i| {
                let x = (i % 5) as f32 - 2.0;
                let z = -1.0 - (i / 5) as f32 * 1.5;
                CapsuleVolume::new(Vec3::new(x, -0.5, z), Vec3::new(x, 0.5, z), 0.4)
            })
            .collect();
        let settings = BuildSettings {
            parallel: false,
            ..BuildSettings::default()
        };
        let _ = build(&grid, &capsules, &mut lists, &settings);
        let first: Vec<Vec<u32>> = (0..grid.cell_count()).map(|c| lists.iter_cell(c).collect()).collect();
        let _ = build(&grid, &capsules, &mut lists, &settings);
        let second: Vec<Vec<u32>> = (0..grid.cell_count()).map(|c| lists.iter_cell(c).collect()).collect();
        assert_eq!(first, second);
    }
}
