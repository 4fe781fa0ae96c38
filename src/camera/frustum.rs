//! View frustum for culling
//!
//! Extracts frustum planes from the view-projection matrix and provides
//! an intersection test for axis-aligned boxes.

use glam::{Mat4, Vec3, Vec4};

use crate::util::aabb::Aabb;

/// A plane in 3D space, represented as (normal.x, normal.y, normal.z, distance)
/// where the plane equation is: ax + by + cz + d = 0
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    /// Unit normal pointing into the positive half-space.
    pub normal: Vec3,
    /// Signed distance from origin (`n · p + d = 0`).
    pub distance: f32,
}

impl Plane {
    /// Create a plane from coefficients and normalize it
    #[must_use]
    pub fn from_coefficients(a: f32, b: f32, c: f32, d: f32) -> Self {
        let len = (a * a + b * b + c * c).sqrt();
        if len > 0.0 {
            Self {
                normal: Vec3::new(a / len, b / len, c / len),
                distance: d / len,
            }
        } else {
            Self {
                normal: Vec3::ZERO,
                distance: 0.0,
            }
        }
    }

    fn from_vec4(v: Vec4) -> Self {
        Self::from_coefficients(v.x, v.y, v.z, v.w)
    }

    /// Signed distance from point to plane (positive = in front, negative =
    /// behind)
    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// View frustum consisting of 6 planes
#[derive(Debug, Clone)]
pub struct Frustum {
    /// Six clipping planes: left, right, bottom, top, near, far.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix.
    /// Uses the Gribb/Hartmann method for plane extraction.
    /// Planes point inward (positive half-space is inside the frustum).
    #[must_use]
    pub fn from_view_projection(vp: Mat4) -> Self {
        let row0 = vp.row(0);
        let row1 = vp.row(1);
        let row2 = vp.row(2);
        let row3 = vp.row(3);

        // [0,1] depth (wgpu/Vulkan): the near plane is just row2
        Self {
            planes: [
                Plane::from_vec4(row3 + row0),
                Plane::from_vec4(row3 - row0),
                Plane::from_vec4(row3 + row1),
                Plane::from_vec4(row3 - row1),
                Plane::from_vec4(row2),
                Plane::from_vec4(row3 - row2),
            ],
        }
    }

    /// Test if a box intersects or is inside the frustum.
    ///
    /// For each plane only the corner furthest along the plane normal is
    /// tested; the box is rejected as soon as that corner lies behind any
    /// plane. Boxes straddling a frustum corner may be reported as visible.
    #[inline]
    #[must_use]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let far_corner =
                Vec3::select(plane.normal.cmpge(Vec3::ZERO), aabb.max, aabb.min);
            plane.distance_to_point(far_corner) >= 0.0
        })
    }
}
