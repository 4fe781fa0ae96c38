//! Linked lists to dense per-cell ranges.
//!
//! Walks every cell list, prefix-sums the lengths into offsets and copies
//! the capsule indices into one flat array. Within a cell the indices are
//! written in ascending order, so the output does not depend on how
//! concurrent appends interleaved.

use rayon::prelude::*;

use super::lists::ClusterLists;

/// Dense range of one cell in [`MergedClusters::indices`].
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClusterCell {
    /// First index of the cell's range.
    pub offset: u32,
    /// Number of capsules in the cell.
    pub count: u32,
}

/// Randomly indexable cluster structure consumed by the shading pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedClusters {
    cells: Vec<ClusterCell>,
    indices: Vec<u32>,
}

impl MergedClusters {
    /// Empty structure with no cells.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `lists` into a new structure.
    #[must_use]
    pub fn from_lists(lists: &ClusterLists, parallel: bool) -> Self {
        let mut merged = Self::new();
        merged.merge(lists, parallel);
        merged
    }

    /// Rebuild from `lists`, reusing the allocations.
    pub fn merge(&mut self, lists: &ClusterLists, parallel: bool) {
        let cell_count = lists.cell_count();

        self.cells.clear();
        if parallel {
            (0..cell_count)
                .into_par_iter()
                .map(|cell| ClusterCell {
                    offset: 0,
                    count: lists.iter_cell(cell).count() as u32,
                })
                .collect_into_vec(&mut self.cells);
        } else {
            self.cells.extend((0..cell_count).map(|cell| ClusterCell {
                offset: 0,
                count: lists.iter_cell(cell).count() as u32,
            }));
        }

        let mut running = 0u32;
        for cell in &mut self.cells {
            cell.offset = running;
            running += cell.count;
        }

        self.indices.clear();
        if parallel {
            self.indices.par_extend((0..cell_count).into_par_iter().flat_map_iter(|cell| {
                let mut members: Vec<u32> = lists.iter_cell(cell).collect();
                members.sort_unstable();
                members
            }));
        } else {
            for cell in 0..cell_count {
                let start = self.indices.len();
                self.indices.extend(lists.iter_cell(cell));
                self.indices[start..].sort_unstable();
            }
        }
        debug_assert_eq!(self.indices.len(), running as usize);
    }

    /// Drop all cells and indices.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.indices.clear();
    }

    /// Per-cell `(offset, count)` ranges.
    #[must_use]
    pub fn cells(&self) -> &[ClusterCell] {
        &self.cells
    }

    /// Flat capsule indices, grouped by cell.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Capsule indices assigned to `cell`. Empty for out-of-range cells.
    #[must_use]
    pub fn capsules_in(&self, cell: usize) -> &[u32] {
        match self.cells.get(cell) {
            Some(c) => {
                let start = c.offset as usize;
                &self.indices[start..start + c.count as usize]
            }
            None => &[],
        }
    }

    /// Number of cells holding at least one capsule.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.count > 0).count()
    }
}
