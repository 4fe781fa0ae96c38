//! Data-parallel selection pass.
//!
//! Each capsule is cached, culled and keyed on a rayon worker, writing only
//! its own pre-sized output slot. Survivors are compacted in slot order,
//! sorted in parallel, and walked sequentially for the budget cut.

use rayon::prelude::*;

use super::{compare_candidates, emit, Candidate, FrameContext, Selection, SelectionSettings};
use crate::camera::CameraFrame;
use crate::capsule::CapsuleSet;

/// Cull, sort and pick with the per-capsule work fanned out over rayon.
pub fn select(
    camera: &CameraFrame,
    capsules: &CapsuleSet,
    settings: &SelectionSettings,
    out: &mut Selection,
) {
    let ctx = FrameContext::new(camera, settings);
    let instances = capsules.as_slice();

    let mut slots: Vec<Option<Candidate>> = vec![None; instances.len()];
    slots
        .par_iter_mut()
        .zip(instances.par_iter())
        .enumerate()
        .for_each(|(slot, (result, capsule))| {
            *result = ctx.evaluate(slot, capsule);
        });

    // par_iter_mut joins before returning; everything below sees all slots.
    let mut candidates: Vec<Candidate> = slots.into_iter().flatten().collect();

    if settings.sort {
        candidates.par_sort_unstable_by(compare_candidates);
    }

    emit(&candidates, capsules.ids(), settings, out);
}
