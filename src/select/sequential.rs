//! Single-threaded selection pass.

use super::{compare_candidates, emit, Candidate, FrameContext, Selection, SelectionSettings};
use crate::camera::CameraFrame;
use crate::capsule::CapsuleSet;

/// Cull, sort and pick on the calling thread.
pub fn select(
    camera: &CameraFrame,
    capsules: &CapsuleSet,
    settings: &SelectionSettings,
    out: &mut Selection,
) {
    let ctx = FrameContext::new(camera, settings);

    let mut candidates: Vec<Candidate> = capsules
        .as_slice()
        .iter()
        .enumerate()
        .filter_map(|(slot, capsule)| ctx.evaluate(slot, capsule))
        .collect();

    if settings.sort {
        candidates.sort_unstable_by(compare_candidates);
    }

    emit(&candidates, capsules.ids(), settings, out);
}
