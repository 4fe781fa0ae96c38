//! Per-frame capsule selection: frustum cull, distance sort, budgeted pick.
//!
//! Both variants run the same three steps. Every capsule is cached for the
//! frame and optionally tested against the camera frustum and keyed by
//! distance. The surviving candidates are then ordered and the first
//! `max_count` are emitted as two parameter arrays. [`sequential`] does
//! all of it on the calling thread; [`parallel`] fans the per-capsule work
//! out over rayon and keeps the bounded walk single-threaded. Both produce
//! identical output: ties in the sort key fall back to the capsule's slot
//! in the [`CapsuleSet`].

pub mod parallel;
pub mod sequential;

use std::cmp::Ordering;

use glam::{Vec3, Vec4};

use crate::camera::{CameraFrame, Frustum};
use crate::capsule::{CachedCapsule, CapsuleId, CapsuleSet, CapsuleVolume, OcclusionCapsule};

/// Hard ceiling on the number of capsules a frame can hold.
pub const CAPSULE_CAPACITY: usize = 512;

/// Largest selectable budget.
///
/// One slot below [`CAPSULE_CAPACITY`]: filling every slot produced
/// corrupted clusters downstream and the cause has not been pinned down,
/// so the last slot stays reserved.
pub const MAX_SELECTED: usize = CAPSULE_CAPACITY - 1;

/// Inputs controlling one selection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionSettings {
    /// Budget; clamped to `[0, MAX_SELECTED]`.
    pub max_count: usize,
    /// Influence radius = `radius + radius × range_multiplier`.
    pub range_multiplier: f32,
    /// Drop capsules whose bounds lie outside the camera frustum.
    pub cull: bool,
    /// Order by distance from the camera, nearest first.
    pub sort: bool,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            max_count: 256,
            range_multiplier: 4.0,
            cull: true,
            sort: true,
        }
    }
}

impl SelectionSettings {
    /// Budget after applying the capacity ceiling.
    #[must_use]
    pub fn effective_max_count(&self) -> usize {
        self.max_count.min(MAX_SELECTED)
    }
}

/// The selected working set, in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// `(point1.xyz, radius)` per selected capsule.
    pub params1: Vec<Vec4>,
    /// `(point2.xyz, influence_radius)` per selected capsule.
    pub params2: Vec<Vec4>,
    /// Handle of each selected capsule.
    pub ids: Vec<CapsuleId>,
    /// Capsules that survived culling, before the budget cut.
    pub visible: usize,
}

impl Selection {
    /// Number of selected capsules.
    #[must_use]
    pub fn count(&self) -> usize {
        self.params1.len()
    }

    /// Whether nothing was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params1.is_empty()
    }

    /// Influence volumes rebuilt from the parameter arrays.
    pub fn volumes(&self) -> impl Iterator<Item = CapsuleVolume> + '_ {
        self.params1
            .iter()
            .zip(&self.params2)
            .map(|(&p1, &p2)| CapsuleVolume::from_params(p1, p2))
    }

    fn clear(&mut self) {
        self.params1.clear();
        self.params2.clear();
        self.ids.clear();
        self.visible = 0;
    }
}

/// Run a selection pass with the sequential or the parallel variant.
pub fn select(
    camera: &CameraFrame,
    capsules: &CapsuleSet,
    settings: &SelectionSettings,
    parallel: bool,
    out: &mut Selection,
) {
    if parallel {
        parallel::select(camera, capsules, settings, out);
    } else {
        sequential::select(camera, capsules, settings, out);
    }
}

/// A capsule that survived culling, tagged with its slot and sort key.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    slot: usize,
    key: f32,
    cached: CachedCapsule,
}

/// Read-only per-frame inputs shared by every per-capsule evaluation.
struct FrameContext {
    frustum: Option<Frustum>,
    camera_position_x2: Vec3,
    range_multiplier: f32,
    sort: bool,
}

impl FrameContext {
    fn new(camera: &CameraFrame, settings: &SelectionSettings) -> Self {
        Self {
            frustum: settings
                .cull
                .then(|| Frustum::from_view_projection(camera.view_projection())),
            camera_position_x2: camera.position * 2.0,
            range_multiplier: settings.range_multiplier,
            sort: settings.sort,
        }
    }

    /// Cache, cull and key a single capsule.
    fn evaluate(&self, slot: usize, capsule: &OcclusionCapsule) -> Option<Candidate> {
        let cached = capsule.cache(self.range_multiplier);
        if let Some(frustum) = &self.frustum {
            if !frustum.intersects_aabb(&cached.volume.bounds) {
                return None;
            }
        }
        let key = if self.sort {
            cached.sort_key(self.camera_position_x2)
        } else {
            0.0
        };
        Some(Candidate { slot, key, cached })
    }
}

/// Ascending key, then ascending slot.
fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    a.key.total_cmp(&b.key).then(a.slot.cmp(&b.slot))
}

/// Bounded walk over the ordered candidates.
fn emit(
    candidates: &[Candidate],
    ids: &[CapsuleId],
    settings: &SelectionSettings,
    out: &mut Selection,
) {
    out.clear();
    out.visible = candidates.len();
    let limit = settings.effective_max_count().min(CAPSULE_CAPACITY);
    for candidate in candidates.iter().take(limit) {
        let (p1, p2) = candidate.cached.params();
        out.params1.push(p1);
        out.params2.push(p2);
        out.ids.push(ids[candidate.slot]);
    }
}
