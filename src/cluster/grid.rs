//! Frustum-aligned cluster grid.
//!
//! The grid slices the view frustum into `X × Y` screen tiles and `Z`
//! linear depth slices out to the effective range. A world point `p` at view
//! depth `d` is projected onto the unit-depth plane as `q = (p - eye) / d`
//! and expressed in the basis spanned by the frustum corner rays, giving
//! continuous coordinates `(u, v, w)` in `[0, 1)³` for points inside the
//! grid. Everything a shader needs to repeat the mapping is in
//! [`ClusterGridUniform`].

use glam::{Mat4, UVec3, Vec3, Vec4};

use crate::camera::CameraFrame;
use crate::util::aabb::Aabb;

/// Smallest per-axis grid resolution.
pub const MIN_RESOLUTION: u32 = 8;
/// Largest per-axis grid resolution.
pub const MAX_RESOLUTION: u32 = 128;

/// Clamp each axis of a requested resolution to
/// `[MIN_RESOLUTION, MAX_RESOLUTION]`.
#[must_use]
pub fn clamp_resolution(resolution: UVec3) -> UVec3 {
    resolution.clamp(UVec3::splat(MIN_RESOLUTION), UVec3::splat(MAX_RESOLUTION))
}

/// World-space directions through the four screen corners.
///
/// Order: bottom-left, top-left, top-right, bottom-right. The view
/// translation is zeroed before inverting so only the rotation is undone
/// and the results are directions rather than points.
#[must_use]
pub fn frustum_rays(view: Mat4, projection: Mat4) -> [Vec3; 4] {
    let mut rotation = view;
    rotation.w_axis = Vec4::W;
    let inverse = (projection * rotation).inverse();
    [
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(1.0, -1.0, 1.0),
    ]
    .map(|ndc| inverse.project_point3(ndc).normalize_or_zero())
}

/// Cluster grid derived from the camera for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterGrid {
    resolution: UVec3,
    range: f32,
    depth_to_range: f32,
    eye: Vec3,
    forward: Vec3,
    rays: [Vec3; 4],
    // Rays rescaled to unit forward component: bottom-left corner and the
    // edges towards bottom-right (u) and top-left (v).
    origin: Vec3,
    u_edge: Vec3,
    v_edge: Vec3,
    inv_u_len_sq: f32,
    inv_v_len_sq: f32,
}

impl ClusterGrid {
    /// Derive the grid for `camera`.
    ///
    /// The resolution is clamped per axis and the grid extends to
    /// `min(max_range, camera.far)`.
    #[must_use]
    pub fn new(camera: &CameraFrame, resolution: UVec3, max_range: f32) -> Self {
        let forward = camera.forward.normalize_or(Vec3::NEG_Z);
        let rays = frustum_rays(camera.view, camera.projection);
        let unit_depth = rays.map(|r| {
            let along = r.dot(forward);
            if along.abs() > f32::EPSILON {
                r / along
            } else {
                r
            }
        });
        let origin = unit_depth[0];
        let u_edge = unit_depth[3] - origin;
        let v_edge = unit_depth[1] - origin;
        let max_range = max_range.max(0.0);

        Self {
            resolution: clamp_resolution(resolution),
            range: max_range.min(camera.far).max(0.0),
            depth_to_range: if max_range > 0.0 {
                (camera.far / max_range).max(1.0)
            } else {
                1.0
            },
            eye: camera.position,
            forward,
            rays,
            origin,
            u_edge,
            v_edge,
            inv_u_len_sq: u_edge.length_squared().max(f32::EPSILON).recip(),
            inv_v_len_sq: v_edge.length_squared().max(f32::EPSILON).recip(),
        }
    }

    /// Cells per axis.
    #[must_use]
    pub fn resolution(&self) -> UVec3 {
        self.resolution
    }

    /// Depth covered by the grid.
    #[must_use]
    pub fn range(&self) -> f32 {
        self.range
    }

    /// Unit corner rays (bottom-left, top-left, top-right, bottom-right).
    #[must_use]
    pub fn rays(&self) -> &[Vec3; 4] {
        &self.rays
    }

    /// Total number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        cell_count(self.resolution)
    }

    /// Linear index of a cell: `x + y·X + z·X·Y`.
    #[must_use]
    pub fn cell_index(&self, cell: UVec3) -> usize {
        let r = self.resolution;
        cell.x as usize + r.x as usize * (cell.y as usize + r.y as usize * cell.z as usize)
    }

    /// Inverse of [`Self::cell_index`].
    #[must_use]
    pub fn cell_at(&self, index: usize) -> UVec3 {
        let rx = self.resolution.x as usize;
        let ry = self.resolution.y as usize;
        UVec3::new(
            (index % rx) as u32,
            ((index / rx) % ry) as u32,
            (index / (rx * ry)) as u32,
        )
    }

    /// Camera position.
    #[must_use]
    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    /// Unit camera forward.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    /// View depth of a point (distance along the camera forward).
    #[must_use]
    pub fn view_depth(&self, point: Vec3) -> f32 {
        (point - self.eye).dot(self.forward)
    }

    /// Continuous `(u, v, w)` grid coordinates of a point, unbounded.
    ///
    /// `None` for points at or behind the camera plane.
    #[must_use]
    pub fn grid_coords(&self, point: Vec3) -> Option<Vec3> {
        let depth = self.view_depth(point);
        if depth <= f32::EPSILON {
            return None;
        }
        let q = (point - self.eye) / depth - self.origin;
        let w = if self.range > 0.0 {
            depth / self.range
        } else {
            f32::INFINITY
        };
        Some(Vec3::new(
            q.dot(self.u_edge) * self.inv_u_len_sq,
            q.dot(self.v_edge) * self.inv_v_len_sq,
            w,
        ))
    }

    /// Cell containing a point, or `None` outside the grid.
    #[must_use]
    pub fn cell_of(&self, point: Vec3) -> Option<UVec3> {
        let coords = self.grid_coords(point)?;
        if coords.cmplt(Vec3::ZERO).any() || coords.cmpge(Vec3::ONE).any() {
            return None;
        }
        let scaled = coords * self.resolution.as_vec3();
        Some(scaled.as_uvec3().min(self.resolution - UVec3::ONE))
    }

    /// World point at grid coordinates `(u, v, w)`.
    #[must_use]
    pub fn point_at(&self, coords: Vec3) -> Vec3 {
        let depth = coords.z * self.range;
        self.eye + (self.origin + self.u_edge * coords.x + self.v_edge * coords.y) * depth
    }

    /// The eight world-space corners of a cell.
    #[must_use]
    pub fn cell_corners(&self, cell: UVec3) -> [Vec3; 8] {
        let res = self.resolution.as_vec3();
        let lo = cell.as_vec3() / res;
        let hi = (cell + UVec3::ONE).as_vec3() / res;
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let pick = |bit: usize, a: f32, b: f32| if i & bit == 0 { a } else { b };
            *corner = self.point_at(Vec3::new(
                pick(1, lo.x, hi.x),
                pick(2, lo.y, hi.y),
                pick(4, lo.z, hi.z),
            ));
        }
        corners
    }

    /// World-space box around a cell.
    #[must_use]
    pub fn cell_bounds(&self, cell: UVec3) -> Aabb {
        Aabb::from_points(&self.cell_corners(cell))
    }

    /// Inward unit normals of the side planes of screen tile `(x, y)`:
    /// left, right, bottom, top.
    ///
    /// All four planes pass through the camera position, so a point `p` is
    /// inside the tile's sub-frustum when `normal · (p - eye) ≥ 0` for each.
    #[must_use]
    pub fn tile_planes(&self, x: u32, y: u32) -> [Vec3; 4] {
        let res = self.resolution.as_vec3();
        let (u0, u1) = (x as f32 / res.x, (x + 1) as f32 / res.x);
        let (v0, v1) = (y as f32 / res.y, (y + 1) as f32 / res.y);
        let side = |through: Vec3, along: Vec3, inward: Vec3| {
            let normal = along.cross(through).normalize_or_zero();
            if normal.dot(inward) < 0.0 {
                -normal
            } else {
                normal
            }
        };
        [
            side(self.origin + self.u_edge * u0, self.v_edge, self.u_edge),
            side(self.origin + self.u_edge * u1, self.v_edge, -self.u_edge),
            side(self.origin + self.v_edge * v0, self.u_edge, self.v_edge),
            side(self.origin + self.v_edge * v1, self.u_edge, -self.v_edge),
        ]
    }

    /// Direction through the centre of screen tile `(x, y)`, scaled to a
    /// unit forward component.
    #[must_use]
    pub fn tile_centre(&self, x: u32, y: u32) -> Vec3 {
        let res = self.resolution.as_vec3();
        self.origin
            + self.u_edge * ((x as f32 + 0.5) / res.x)
            + self.v_edge * ((y as f32 + 0.5) / res.y)
    }

    /// Record the consumer needs to repeat the cell mapping on the GPU.
    #[must_use]
    pub fn uniform(&self) -> ClusterGridUniform {
        ClusterGridUniform {
            frustum_rays: self.rays.map(|r| r.extend(0.0).to_array()),
            camera_position: self.eye.to_array(),
            range: self.range,
            camera_forward: self.forward.to_array(),
            depth_to_range: self.depth_to_range,
            resolution: self.resolution.to_array(),
            _pad: 0,
        }
    }
}

/// Total cell count for a resolution.
#[must_use]
pub fn cell_count(resolution: UVec3) -> usize {
    resolution.x as usize * resolution.y as usize * resolution.z as usize
}

/// GPU layout of the grid parameters.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClusterGridUniform {
    /// Unit corner rays (w unused).
    pub frustum_rays: [[f32; 4]; 4],
    /// Camera world-space position.
    pub camera_position: [f32; 3],
    /// Depth covered by the grid.
    pub range: f32,
    /// Camera forward direction.
    pub camera_forward: [f32; 3],
    /// `max(1, far / max_range)`: scales linear depth to grid range.
    pub depth_to_range: f32,
    /// Cells per axis.
    pub resolution: [u32; 3],
    /// Padding for GPU alignment.
    pub _pad: u32,
}
