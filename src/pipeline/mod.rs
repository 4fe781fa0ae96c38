//! Per-frame orchestration: select, cluster, merge.
//!
//! [`OcclusionPipeline`] owns everything that outlives a frame: the options,
//! the registered capsules, the cluster list buffers and the last output.
//! A frame is bracketed by [`OcclusionPipeline::begin_frame`], which runs
//! every stage in order, and [`OcclusionPipeline::end_frame`], which folds
//! the frame into the statistics.

mod stats;

use glam::Vec3;
use web_time::Instant;

pub use stats::{byte_count, suggested_headroom, FrameStats, StageTimings};

use crate::camera::CameraFrame;
use crate::capsule::{CapsuleSet, CapsuleVolume};
use crate::cluster::{build, BuildReport, ClusterGrid, ClusterLists, MergedClusters};
use crate::options::{Options, MAX_HEADROOM};
use crate::select::{select, Selection};

/// Result of the last [`OcclusionPipeline::begin_frame`].
#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    selection: Selection,
    grid: Option<ClusterGrid>,
    clusters: MergedClusters,
    report: BuildReport,
    rebuilt: bool,
}

impl FrameOutput {
    /// Selected capsules in emission order.
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Grid the clusters were built on. `None` before the first build.
    #[must_use]
    pub fn grid(&self) -> Option<&ClusterGrid> {
        self.grid.as_ref()
    }

    /// Merged per-cell capsule ranges.
    ///
    /// Indices refer to [`Self::selection`] of the frame that built them.
    #[must_use]
    pub fn clusters(&self) -> &MergedClusters {
        &self.clusters
    }

    /// Build outcome of the frame that produced [`Self::clusters`].
    #[must_use]
    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Whether this frame rebuilt the clusters.
    #[must_use]
    pub fn rebuilt(&self) -> bool {
        self.rebuilt
    }

    /// Selection indices of the capsules that may occlude `point`.
    #[must_use]
    pub fn capsules_near(&self, point: Vec3) -> &[u32] {
        let cell = self
            .grid
            .as_ref()
            .and_then(|grid| grid.cell_of(point).map(|cell| grid.cell_index(cell)));
        match cell {
            Some(cell) => self.clusters.capsules_in(cell),
            None => &[],
        }
    }
}

/// Capsule occlusion clustering for one view.
#[derive(Debug, Default)]
pub struct OcclusionPipeline {
    options: Options,
    capsules: CapsuleSet,
    lists: Option<ClusterLists>,
    volumes: Vec<CapsuleVolume>,
    output: FrameOutput,
    stats: FrameStats,
    pending: bool,
}

impl OcclusionPipeline {
    /// Empty pipeline running on `options`.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Current options, as set (unclamped).
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Mutable options. Changes apply from the next frame.
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    /// Replace the options.
    pub fn set_options(&mut self, options: Options) {
        self.options = options;
    }

    /// Registered capsules.
    #[must_use]
    pub fn capsules(&self) -> &CapsuleSet {
        &self.capsules
    }

    /// Registered capsules, for insertion, removal and edits.
    pub fn capsules_mut(&mut self) -> &mut CapsuleSet {
        &mut self.capsules
    }

    /// Output of the last frame.
    #[must_use]
    pub fn output(&self) -> &FrameOutput {
        &self.output
    }

    /// Statistics as of the last [`Self::end_frame`].
    #[must_use]
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Bytes held by the allocated cluster buffers.
    #[must_use]
    pub fn byte_count(&self) -> usize {
        self.lists.as_ref().map_or(0, |lists| {
            self.output
                .grid
                .map_or(0, |grid| byte_count(grid.resolution(), lists.headroom()))
        })
    }

    /// Zero the cumulative overflow counters.
    pub fn reset_overflow(&mut self) {
        self.stats.total_dropped = 0;
        self.stats.overflow_frames = 0;
    }

    /// Run selection and, unless frozen by `update_clusters`, clustering
    /// and merging for `camera`.
    pub fn begin_frame(&mut self, camera: &CameraFrame) -> &FrameOutput {
        let options = self.options.clamped();
        let parallel = options.selection.parallel;

        let start = Instant::now();
        select(
            camera,
            &self.capsules,
            &options.selection.settings(),
            parallel,
            &mut self.output.selection,
        );
        let selected = Instant::now();

        let mut built = selected;
        self.output.rebuilt = options.clustering.update_clusters;
        if self.output.rebuilt {
            let grid = ClusterGrid::new(
                camera,
                options.clustering.resolution(),
                options.clustering.max_range,
            );
            let lists = ensure_lists(
                &mut self.lists,
                &grid,
                options.clustering.headroom,
            );

            self.volumes.clear();
            self.volumes.extend(self.output.selection.volumes());
            self.output.report = build(
                &grid,
                &self.volumes,
                lists,
                &options.clustering.build_settings(parallel),
            );
            built = Instant::now();

            self.output.clusters.merge(lists, parallel);
            self.output.grid = Some(grid);
        }
        let merged = Instant::now();

        self.stats.timings.record(
            selected.duration_since(start),
            built.duration_since(selected),
            merged.duration_since(built),
        );
        log::trace!(
            "occlusion stages: select {:?}, build {:?}, merge {:?}",
            self.stats.timings.select,
            self.stats.timings.build,
            self.stats.timings.merge,
        );
        log::debug!(
            "occlusion frame: {} active, {} visible, {} selected, {}/{} records",
            self.capsules.len(),
            self.output.selection.visible,
            self.output.selection.count(),
            self.output.report.records_used,
            self.lists.as_ref().map_or(0, ClusterLists::record_capacity),
        );

        self.pending = true;
        &self.output
    }

    /// Fold the frame started by [`Self::begin_frame`] into the statistics.
    ///
    /// Calling it without a matching `begin_frame` does nothing.
    pub fn end_frame(&mut self) {
        if !std::mem::take(&mut self.pending) {
            return;
        }

        let report = self.output.report;
        let cluster_count = self.output.clusters.cell_count();
        let frame_dropped = if self.output.rebuilt { report.dropped } else { 0 };
        if frame_dropped > 0 {
            self.stats.total_dropped += u64::from(frame_dropped);
            self.stats.overflow_frames += 1;
            log::warn!(
                "cluster record pool overflow: dropped {} of {} appends; headroom {} would fit (max {})",
                frame_dropped,
                report.records_requested,
                suggested_headroom(report.records_requested, cluster_count),
                MAX_HEADROOM,
            );
        }

        self.stats.frames += 1;
        self.stats.active_capsules = self.capsules.len();
        self.stats.visible_capsules = self.output.selection.visible;
        self.stats.selected_capsules = self.output.selection.count();
        self.stats.cluster_count = cluster_count;
        self.stats.occupied_clusters = self.output.clusters.occupied_cells();
        self.stats.byte_count = self.byte_count();
        self.stats.records_used = report.records_used;
        self.stats.records_requested = report.records_requested;
        self.stats.record_capacity =
            self.lists.as_ref().map_or(0, ClusterLists::record_capacity);
        self.stats.frame_dropped = frame_dropped;
    }
}

/// Allocate the list buffers, or reallocate them when the grid shape or
/// headroom changed.
fn ensure_lists<'a>(
    slot: &'a mut Option<ClusterLists>,
    grid: &ClusterGrid,
    headroom: u32,
) -> &'a mut ClusterLists {
    let cells = grid.cell_count();
    if !slot.as_ref().is_some_and(|lists| lists.fits(cells, headroom)) {
        let resolution = grid.resolution();
        log::info!(
            "allocating cluster buffers: {}x{}x{} cells, headroom {}, {} bytes",
            resolution.x,
            resolution.y,
            resolution.z,
            headroom,
            byte_count(resolution, headroom),
        );
        *slot = None;
    }
    slot.get_or_insert_with(|| ClusterLists::new(cells, headroom))
}

#[cfg(test)]
mod tests {
    use glam::{Affine3A, UVec3};

    use super::*;
    use crate::capsule::OcclusionCapsule;
    use crate::select::test_scene::camera;

    fn small_options() -> Options {
        let mut options = Options::default();
        options.clustering.resolution = [8, 8, 8];
        options.clustering.max_range = 8.0;
        options.clustering.headroom = 4;
        options
    }

    fn sphere_at(centre: Vec3) -> OcclusionCapsule {
        OcclusionCapsule::new(Affine3A::from_translation(centre), 0.0, 0.1)
    }

    #[test]
    fn no_capsules_gives_empty_clusters() {
        let mut pipeline = OcclusionPipeline::new(small_options());
        let output = pipeline.begin_frame(&camera());
        assert!(output.selection().is_empty());
        assert_eq!(output.clusters().cell_count(), 512);
        assert!(output.clusters().cells().iter().all(|c| c.count == 0));
        assert!(output.clusters().indices().is_empty());
        pipeline.end_frame();
        assert_eq!(pipeline.stats().selected_capsules, 0);
        assert_eq!(pipeline.stats().occupied_clusters, 0);
    }

    #[test]
    fn single_capsule_reaches_its_neighbourhood() {
        let mut pipeline = OcclusionPipeline::new(small_options());
        let id = pipeline.capsules_mut().insert(sphere_at(Vec3::new(0.0, 0.0, -4.0)));
        let output = pipeline.begin_frame(&camera());

        assert_eq!(output.selection().ids, vec![id]);
        assert_eq!(output.selection().params2[0].w, 0.5);
        assert_eq!(output.clusters().occupied_cells(), 8);
        assert_eq!(output.capsules_near(Vec3::new(0.1, 0.1, -4.2)), &[0]);
        assert_eq!(output.capsules_near(Vec3::new(-0.2, 0.3, -3.6)), &[0]);
        assert!(output.capsules_near(Vec3::new(1.5, 0.0, -4.0)).is_empty());
        assert!(output.capsules_near(Vec3::new(0.0, 0.0, 2.0)).is_empty());
    }

    #[test]
    fn undersized_headroom_overflows_observably() {
        let mut options = small_options();
        options.selection.max_capsules = 511;
        let mut pipeline = OcclusionPipeline::new(options);
        for _ in 0..300 {
            let _ = pipeline.capsules_mut().insert(sphere_at(Vec3::new(0.0, 0.0, -4.0)));
        }

        for frame in 1..=2u64 {
            let report = *pipeline.begin_frame(&camera()).report();
            assert_eq!(report.records_requested, 2400);
            assert_eq!(report.dropped, 352);
            pipeline.end_frame();
            assert_eq!(pipeline.stats().frame_dropped, 352);
            assert_eq!(pipeline.stats().total_dropped, 352 * frame);
            assert_eq!(pipeline.stats().overflow_frames, frame);
        }
        assert_eq!(pipeline.stats().records_used, 2048);
        assert_eq!(pipeline.stats().record_capacity, 2048);

        pipeline.reset_overflow();
        assert_eq!(pipeline.stats().total_dropped, 0);
        assert_eq!(pipeline.stats().overflow_frames, 0);

        pipeline.options_mut().clustering.headroom = 5;
        let report = *pipeline.begin_frame(&camera()).report();
        assert!(!report.overflowed());
        pipeline.end_frame();
        assert_eq!(pipeline.stats().total_dropped, 0);
    }

    #[test]
    fn end_frame_without_begin_is_ignored() {
        let mut pipeline = OcclusionPipeline::new(small_options());
        pipeline.end_frame();
        assert_eq!(pipeline.stats().frames, 0);
        let _ = pipeline.begin_frame(&camera());
        pipeline.end_frame();
        pipeline.end_frame();
        assert_eq!(pipeline.stats().frames, 1);
    }

    #[test]
    fn unchanged_input_gives_identical_output() {
        let mut pipeline = OcclusionPipeline::new(small_options());
        for i in 0..30 {
            let t = i as f32;
            let _ = pipeline.capsules_mut().insert(OcclusionCapsule::between(
                Vec3::new((t * 0.7).sin() * 2.0, -0.5, -1.5 - t * 0.2),
                Vec3::new((t * 0.7).sin() * 2.0, 0.8, -1.5 - t * 0.2),
                0.15,
            ));
        }
        let first = pipeline.begin_frame(&camera()).clone();
        let second = pipeline.begin_frame(&camera());
        assert_eq!(second.selection(), first.selection());
        assert_eq!(second.clusters(), first.clusters());
        assert_eq!(second.grid(), first.grid());
    }

    #[test]
    fn frozen_clusters_keep_previous_output() {
        let mut pipeline = OcclusionPipeline::new(small_options());
        let id = pipeline.capsules_mut().insert(sphere_at(Vec3::new(0.0, 0.0, -4.0)));
        let before = pipeline.begin_frame(&camera()).clusters().clone();
        pipeline.end_frame();

        pipeline.options_mut().clustering.update_clusters = false;
        if let Some(capsule) = pipeline.capsules_mut().get_mut(id) {
            capsule.set_transform(Affine3A::from_translation(Vec3::new(0.0, 0.0, -6.0)));
        }
        let output = pipeline.begin_frame(&camera());
        assert!(!output.rebuilt());
        assert_eq!(output.clusters(), &before);
        assert_eq!(output.selection().params1[0].z, -6.0);
    }

    #[test]
    fn buffers_follow_resolution_and_headroom() {
        let mut pipeline = OcclusionPipeline::new(small_options());
        assert_eq!(pipeline.byte_count(), 0);
        let _ = pipeline.begin_frame(&camera());
        pipeline.end_frame();
        assert_eq!(pipeline.stats().byte_count, byte_count(UVec3::splat(8), 4));
        assert_eq!(pipeline.stats().cluster_count, 512);

        pipeline.options_mut().clustering.resolution = [16, 8, 200];
        pipeline.options_mut().clustering.headroom = 1;
        let _ = pipeline.begin_frame(&camera());
        pipeline.end_frame();
        assert_eq!(pipeline.stats().cluster_count, 16 * 8 * 128);
        assert_eq!(pipeline.stats().record_capacity, 16 * 8 * 128 * 4);
        assert_eq!(
            pipeline.stats().byte_count,
            byte_count(UVec3::new(16, 8, 128), 4)
        );
    }
}
