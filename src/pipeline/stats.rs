use glam::UVec3;
use web_time::Duration;

use crate::cluster::grid::cell_count;
use crate::cluster::merge::ClusterCell;

/// Per-stage wall-clock time of the last frame, plus a smoothed total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTimings {
    /// Cull, sort and budget cut.
    pub select: Duration,
    /// Reset and capsule-to-cell assignment.
    pub build: Duration,
    /// Linked lists to dense ranges.
    pub merge: Duration,
    /// Exponential moving average of the frame total, in milliseconds.
    smoothed_ms: f32,
    /// Weight of the newest frame in the average (0.0-1.0).
    smoothing: f32,
}

impl Default for StageTimings {
    fn default() -> Self {
        Self {
            select: Duration::ZERO,
            build: Duration::ZERO,
            merge: Duration::ZERO,
            smoothed_ms: 0.0,
            smoothing: 0.05,
        }
    }
}

impl StageTimings {
    /// Sum of the last frame's stages.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.select + self.build + self.merge
    }

    /// Smoothed frame total in milliseconds.
    #[must_use]
    pub fn smoothed_ms(&self) -> f32 {
        self.smoothed_ms
    }

    pub(super) fn record(&mut self, select: Duration, build: Duration, merge: Duration) {
        self.select = select;
        self.build = build;
        self.merge = merge;
        let ms = self.total().as_secs_f32() * 1000.0;
        self.smoothed_ms = if self.smoothed_ms == 0.0 {
            ms
        } else {
            self.smoothed_ms * (1.0 - self.smoothing) + ms * self.smoothing
        };
    }
}

/// Counters describing the pipeline after the last completed frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// Completed frames.
    pub frames: u64,
    /// Registered capsules.
    pub active_capsules: usize,
    /// Capsules that survived culling.
    pub visible_capsules: usize,
    /// Capsules handed to clustering after the budget cut.
    pub selected_capsules: usize,
    /// Cells in the grid.
    pub cluster_count: usize,
    /// Cells holding at least one capsule.
    pub occupied_clusters: usize,
    /// Bytes held by the cluster buffers.
    pub byte_count: usize,
    /// Records written in the last frame.
    pub records_used: usize,
    /// Records the last frame asked for, including dropped ones.
    pub records_requested: u32,
    /// Size of the record pool.
    pub record_capacity: usize,
    /// Appends dropped in the last frame.
    pub frame_dropped: u32,
    /// Appends dropped since the last overflow reset.
    pub total_dropped: u64,
    /// Frames that overflowed since the last overflow reset.
    pub overflow_frames: u64,
    /// Stage timings of the last frame.
    pub timings: StageTimings,
}

/// Bytes needed by the cluster buffers for a grid shape.
///
/// Covers the screen-tile raster target (`X·Y` 8-byte texels), the merged
/// cells, the per-cell head pointers and counts, the record pool and the
/// record counter.
#[must_use]
pub fn byte_count(resolution: UVec3, headroom: u32) -> usize {
    let word = size_of::<u32>();
    let cells = cell_count(resolution);
    let raster_target = resolution.x as usize * resolution.y as usize * 8;
    let merged = cells * size_of::<ClusterCell>();
    let heads = cells * word;
    let counts = cells * word;
    let records = cells * headroom as usize * word * 2;
    raster_target + merged + heads + counts + records + word
}

/// Smallest headroom that would have held `records_requested` records.
#[must_use]
pub fn suggested_headroom(records_requested: u32, cell_count: usize) -> u32 {
    if cell_count == 0 {
        return 0;
    }
    (records_requested as usize).div_ceil(cell_count) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_count_of_small_grid() {
        // 64·8 + 512·8 + 512·4 + 512·4 + 512·4·8 + 4
        assert_eq!(byte_count(UVec3::splat(8), 4), 25_604);
    }

    #[test]
    fn byte_count_grows_with_headroom() {
        let res = UVec3::new(64, 64, 32);
        let cells = 64 * 64 * 32;
        assert_eq!(byte_count(res, 16) - byte_count(res, 8), cells * 8 * 8);
    }

    #[test]
    fn suggested_headroom_rounds_up() {
        assert_eq!(suggested_headroom(2400, 512), 5);
        assert_eq!(suggested_headroom(2048, 512), 4);
        assert_eq!(suggested_headroom(0, 512), 0);
        assert_eq!(suggested_headroom(10, 0), 0);
    }

    #[test]
    fn timings_smooth_towards_new_frames() {
        let mut timings = StageTimings::default();
        let ms = Duration::from_millis(1);
        timings.record(ms, ms, ms);
        assert_eq!(timings.total(), Duration::from_millis(3));
        assert!((timings.smoothed_ms() - 3.0).abs() < 1e-3);
        timings.record(ms * 10, ms * 10, ms * 10);
        assert!(timings.smoothed_ms() > 3.0 && timings.smoothed_ms() < 30.0);
    }
}
