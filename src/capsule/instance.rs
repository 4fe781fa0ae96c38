use glam::{Affine3A, Vec3, Vec4};

use crate::util::aabb::{closest_point_on_segment, Aabb};

/// An occluder shaped like a sphere-swept segment.
///
/// The segment runs along the local Z axis from `(0, 0, -size/2)` to
/// `(0, 0, size/2)` and is placed in the world by `transform`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcclusionCapsule {
    transform: Affine3A,
    size: f32,
    radius: f32,
}

impl Default for OcclusionCapsule {
    fn default() -> Self {
        Self {
            transform: Affine3A::IDENTITY,
            size: 1.0,
            radius: 0.1,
        }
    }
}

impl OcclusionCapsule {
    /// Capsule with the given placement. Negative `size`/`radius` clamp to 0.
    #[must_use]
    pub fn new(transform: Affine3A, size: f32, radius: f32) -> Self {
        Self {
            transform,
            size: size.max(0.0),
            radius: radius.max(0.0),
        }
    }

    /// Capsule spanning two world-space points.
    ///
    /// Builds a transform whose local Z axis runs from `a` to `b`.
    #[must_use]
    pub fn between(a: Vec3, b: Vec3, radius: f32) -> Self {
        let axis = b - a;
        let size = axis.length();
        let rotation = if size > f32::EPSILON {
            glam::Quat::from_rotation_arc(Vec3::Z, axis / size)
        } else {
            glam::Quat::IDENTITY
        };
        let transform =
            Affine3A::from_rotation_translation(rotation, (a + b) * 0.5);
        Self::new(transform, size, radius)
    }

    /// Local-to-world placement.
    #[must_use]
    pub fn transform(&self) -> &Affine3A {
        &self.transform
    }

    /// Segment length.
    #[must_use]
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Capsule radius.
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Move the capsule.
    pub fn set_transform(&mut self, transform: Affine3A) {
        self.transform = transform;
    }

    /// Change the segment length (clamped to ≥ 0).
    pub fn set_size(&mut self, size: f32) {
        self.size = size.max(0.0);
    }

    /// Change the radius (clamped to ≥ 0).
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.max(0.0);
    }

    /// First world-space endpoint.
    #[must_use]
    pub fn point1(&self) -> Vec3 {
        self.transform
            .transform_point3(Vec3::new(0.0, 0.0, -self.size * 0.5))
    }

    /// Second world-space endpoint.
    #[must_use]
    pub fn point2(&self) -> Vec3 {
        self.transform
            .transform_point3(Vec3::new(0.0, 0.0, self.size * 0.5))
    }

    /// Derive the per-frame world-space data for a range multiplier.
    #[must_use]
    pub fn cache(&self, range_multiplier: f32) -> CachedCapsule {
        let influence = self.radius + self.radius * range_multiplier;
        CachedCapsule {
            radius: self.radius,
            volume: CapsuleVolume::new(self.point1(), self.point2(), influence),
        }
    }
}

/// World-space influence volume of a capsule: the segment swept by the
/// influence radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapsuleVolume {
    /// First endpoint.
    pub point1: Vec3,
    /// Second endpoint.
    pub point2: Vec3,
    /// Capsule radius expanded by the range multiplier.
    pub influence_radius: f32,
    /// Box enclosing both endpoints expanded by the influence radius.
    pub bounds: Aabb,
}

impl CapsuleVolume {
    /// Volume around the segment `point1`-`point2`.
    #[must_use]
    pub fn new(point1: Vec3, point2: Vec3, influence_radius: f32) -> Self {
        Self {
            point1,
            point2,
            influence_radius,
            bounds: Aabb::around_segment(point1, point2, influence_radius),
        }
    }

    /// Rebuild the volume from an uploaded parameter pair.
    #[must_use]
    pub fn from_params(params1: Vec4, params2: Vec4) -> Self {
        Self::new(params1.truncate(), params2.truncate(), params2.w)
    }

    /// Distance from `p` to the segment (not the surface).
    #[must_use]
    pub fn distance_to_axis(&self, p: Vec3) -> f32 {
        closest_point_on_segment(p, self.point1, self.point2).distance(p)
    }
}

/// Per-frame cache of a capsule's world-space data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedCapsule {
    /// Unexpanded capsule radius.
    pub radius: f32,
    /// Influence volume used for culling and clustering.
    pub volume: CapsuleVolume,
}

impl CachedCapsule {
    /// Sort key: squared distance from `2 × camera` to `point1 + point2`.
    ///
    /// Four times the squared distance from the camera to the segment
    /// midpoint, so it orders identically without the halving.
    #[must_use]
    pub fn sort_key(&self, camera_position_x2: Vec3) -> f32 {
        (camera_position_x2 - (self.volume.point1 + self.volume.point2))
            .length_squared()
    }

    /// The two uploaded records: `(point1, radius)` and
    /// `(point2, influence_radius)`.
    #[must_use]
    pub fn params(&self) -> (Vec4, Vec4) {
        (
            self.volume.point1.extend(self.radius),
            self.volume.point2.extend(self.volume.influence_radius),
        )
    }
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;

    #[test]
    fn endpoints_follow_transform() {
        let capsule = OcclusionCapsule::new(
            Affine3A::from_rotation_translation(
                Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
                Vec3::new(0.0, 1.0, 0.0),
            ),
            2.0,
            0.25,
        );
        assert!((capsule.point1() - Vec3::new(-1.0, 1.0, 0.0)).length() < 1e-5);
        assert!((capsule.point2() - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn negative_dimensions_clamp_to_zero() {
        let mut capsule = OcclusionCapsule::new(Affine3A::IDENTITY, -1.0, -2.0);
        assert_eq!(capsule.size(), 0.0);
        assert_eq!(capsule.radius(), 0.0);
        capsule.set_radius(-0.5);
        capsule.set_size(f32::NAN);
        assert_eq!(capsule.radius(), 0.0);
        assert_eq!(capsule.size(), 0.0);
    }

    #[test]
    fn cache_expands_bounds_by_influence() {
        let capsule = OcclusionCapsule::between(Vec3::ZERO, Vec3::X * 2.0, 0.5);
        let cached = capsule.cache(3.0);
        assert_eq!(cached.volume.influence_radius, 2.0);
        assert!((cached.volume.bounds.min - Vec3::new(-2.0, -2.0, -2.0)).length() < 1e-5);
        assert!((cached.volume.bounds.max - Vec3::new(4.0, 2.0, 2.0)).length() < 1e-5);

        let (p1, p2) = cached.params();
        assert_eq!(p1.w, 0.5);
        assert_eq!(p2.w, 2.0);
        assert_eq!(CapsuleVolume::from_params(p1, p2), cached.volume);
    }

    #[test]
    fn sort_key_is_four_times_midpoint_distance() {
        let capsule =
            OcclusionCapsule::between(Vec3::new(0.0, 0.0, -4.0), Vec3::new(0.0, 0.0, -6.0), 0.1);
        let key = capsule.cache(1.0).sort_key(Vec3::ZERO);
        assert!((key - 4.0 * 25.0).abs() < 1e-3);
    }
}
