//! Tile-by-tile rasterization of capsule influence volumes into the grid.
//!
//! A capsule's projected box only bounds the screen tiles worth visiting.
//! Within each of those tiles the capsule axis is clipped against the
//! tile's side planes pushed outwards by the influence radius. The clipped
//! piece's depth interval, widened by the radius, gives the slices the
//! capsule may reach in that tile. Every candidate cell then goes through
//! the same test [`RangeTest`](super::compute::RangeTest) applies, so the
//! rasterizer reports a subset of the range test's cells.

use glam::{UVec3, Vec2, Vec3};
use rayon::prelude::*;

use super::builder::ClusterAssigner;
use super::compute::{depth_span, CellVolume};
use super::grid::ClusterGrid;
use super::lists::ClusterLists;
use crate::capsule::CapsuleVolume;
use crate::util::aabb::segment_distance;

/// Covers the cells each capsule's influence volume reaches, one screen
/// tile at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rasterizer {
    /// Cover every tile the capsule touches. When `false` only tiles whose
    /// centre ray passes through the influence volume are covered.
    pub conservative: bool,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self { conservative: true }
    }
}

/// Screen extent of a capsule's projected box in `(u, v)` grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Footprint {
    lo: Vec2,
    hi: Vec2,
}

impl Footprint {
    /// Project the eight corners of the capsule's influence box.
    ///
    /// A box reaching the camera plane covers the whole screen. `None` when
    /// the box lies entirely behind the camera or beyond the grid.
    fn of(grid: &ClusterGrid, capsule: &CapsuleVolume) -> Option<Self> {
        let corners = capsule.bounds.corners();
        let depths = corners.map(|c| grid.view_depth(c));
        let max_depth = depths.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let min_depth = depths.iter().copied().fold(f32::INFINITY, f32::min);
        if max_depth.is_nan() || max_depth <= 0.0 || grid.range() <= 0.0 || min_depth > grid.range() {
            return None;
        }

        if min_depth <= f32::EPSILON {
            return Some(Self {
                lo: Vec2::ZERO,
                hi: Vec2::ONE,
            });
        }

        let mut lo = Vec2::INFINITY;
        let mut hi = Vec2::NEG_INFINITY;
        for corner in corners {
            let coords = grid.grid_coords(corner)?.truncate();
            lo = lo.min(coords);
            hi = hi.max(coords);
        }
        lo.is_finite().then_some(Self { lo, hi })
    }
}

/// Inclusive cell range along one axis, or `None` if nothing is covered.
fn axis_span(lo: f32, hi: f32, resolution: u32, centres_only: bool) -> Option<(u32, u32)> {
    let res = resolution as f32;
    let (first, last) = if centres_only {
        ((lo * res - 0.5).ceil(), (hi * res - 0.5).floor())
    } else {
        ((lo * res).floor(), (hi * res).floor())
    };
    if first > last || last < 0.0 || first >= res {
        return None;
    }
    Some((first.max(0.0) as u32, last.min(res - 1.0) as u32))
}

/// Parameter range `[t0, t1] ⊆ [0, 1]` of the segment `a + t·(b - a)` on
/// which `normal · (p - origin) + offset ≥ 0` holds for every plane.
fn clip_segment(origin: Vec3, a: Vec3, b: Vec3, planes: &[(Vec3, f32)]) -> Option<(f32, f32)> {
    let ab = b - a;
    let (mut t0, mut t1) = (0.0_f32, 1.0_f32);
    for &(normal, offset) in planes {
        let start = normal.dot(a - origin) + offset;
        let rate = normal.dot(ab);
        if rate.abs() <= f32::EPSILON {
            if start < 0.0 {
                return None;
            }
            continue;
        }
        let t = -start / rate;
        if rate > 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

/// View depth interval over which a capsule may reach screen tile `(x, y)`.
fn tile_depths(grid: &ClusterGrid, x: u32, y: u32, capsule: &CapsuleVolume) -> Option<(f32, f32)> {
    let radius = capsule.influence_radius;
    let forward = grid.forward();
    let [left, right, bottom, top] = grid.tile_planes(x, y);
    let planes = [
        (left, radius),
        (right, radius),
        (bottom, radius),
        (top, radius),
        (forward, radius),
        (-forward, grid.range() + radius),
    ];
    let (t0, t1) = clip_segment(grid.eye(), capsule.point1, capsule.point2, &planes)?;
    let axis = capsule.point2 - capsule.point1;
    let d0 = grid.view_depth(capsule.point1 + axis * t0);
    let d1 = grid.view_depth(capsule.point1 + axis * t1);
    Some((d0.min(d1) - radius, d0.max(d1) + radius))
}

/// Whether the ray through the centre of tile `(x, y)` passes through the
/// influence volume before leaving the grid.
fn covers_centre(grid: &ClusterGrid, x: u32, y: u32, capsule: &CapsuleVolume) -> bool {
    let eye = grid.eye();
    let end = eye + grid.tile_centre(x, y) * grid.range();
    segment_distance(eye, end, capsule.point1, capsule.point2) <= capsule.influence_radius
}

impl Rasterizer {
    fn rasterize(&self, grid: &ClusterGrid, index: u32, capsule: &CapsuleVolume, lists: &ClusterLists) {
        let Some(footprint) = Footprint::of(grid, capsule) else {
            return;
        };
        let res = grid.resolution();
        let centres_only = !self.conservative;
        let Some((x0, x1)) = axis_span(footprint.lo.x, footprint.hi.x, res.x, centres_only) else {
            return;
        };
        let Some((y0, y1)) = axis_span(footprint.lo.y, footprint.hi.y, res.y, centres_only) else {
            return;
        };
        let span = depth_span(grid, capsule);

        for y in y0..=y1 {
            for x in x0..=x1 {
                if centres_only && !covers_centre(grid, x, y, capsule) {
                    continue;
                }
                let Some((near, far)) = tile_depths(grid, x, y, capsule) else {
                    continue;
                };
                let Some((z0, z1)) = axis_span(near / grid.range(), far / grid.range(), res.z, false)
                else {
                    continue;
                };
                for z in z0..=z1 {
                    let cell = UVec3::new(x, y, z);
                    if CellVolume::new(grid, cell).admits(capsule, span) {
                        let _ = lists.push(grid.cell_index(cell), index);
                    }
                }
            }
        }
    }
}

impl ClusterAssigner for Rasterizer {
    fn assign(
        &self,
        grid: &ClusterGrid,
        capsules: &[CapsuleVolume],
        lists: &ClusterLists,
        parallel: bool,
    ) {
        if parallel {
            capsules
                .par_iter()
                .enumerate()
                .for_each(|(i, capsule)| self.rasterize(grid, i as u32, capsule, lists));
        } else {
            for (i, capsule) in capsules.iter().enumerate() {
                self.rasterize(grid, i as u32, capsule, lists);
            }
        }
    }
}
