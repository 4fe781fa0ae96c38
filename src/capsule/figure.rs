//! Humanoid capsule rigs for synthetic scenes.

use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::OcclusionCapsule;

/// Capsules per [`figure`].
pub const FIGURE_CAPSULES: usize = 6;

/// Standing figure about 1.8 units tall with its feet at `base`, facing
/// `heading` radians around +Y.
///
/// Head, torso, two arms and two legs.
#[must_use]
pub fn figure(base: Vec3, heading: f32) -> [OcclusionCapsule; FIGURE_CAPSULES] {
    let rotation = Quat::from_rotation_y(heading);
    let at = |x: f32, y: f32| base + rotation * Vec3::new(x, y, 0.0);
    [
        OcclusionCapsule::between(at(0.0, 1.62), at(0.0, 1.68), 0.11),
        OcclusionCapsule::between(at(0.0, 0.95), at(0.0, 1.4), 0.17),
        OcclusionCapsule::between(at(-0.24, 1.4), at(-0.28, 0.85), 0.05),
        OcclusionCapsule::between(at(0.24, 1.4), at(0.28, 0.85), 0.05),
        OcclusionCapsule::between(at(-0.1, 0.9), at(-0.11, 0.08), 0.07),
        OcclusionCapsule::between(at(0.1, 0.9), at(0.11, 0.08), 0.07),
    ]
}

/// `people` figures scattered over the square `[-extent, extent]²` of the
/// ground plane. Same seed, same crowd.
#[must_use]
pub fn crowd(people: usize, extent: f32, seed: u64) -> Vec<OcclusionCapsule> {
    let mut rng = StdRng::seed_from_u64(seed);
    let extent = extent.abs().max(f32::EPSILON);
    (0..people)
        .flat_map(|_| {
            let base = Vec3::new(
                rng.random_range(-extent..extent),
                0.0,
                rng.random_range(-extent..extent),
            );
            figure(base, rng.random_range(0.0..std::f32::consts::TAU))
        })
        .collect()
}
