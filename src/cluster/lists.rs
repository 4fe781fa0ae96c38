//! Per-cell lock-free linked lists of capsule references.
//!
//! A fixed pool of `(next, capsule)` records is shared by all cells. An
//! append claims a record with `fetch_add` on the global counter, writes the
//! capsule index, swaps the record in as the new head of its cell and links
//! it to the previous head. Any number of threads may append concurrently;
//! the lists are only read after every appender has been joined.
//!
//! When the pool runs out the append is dropped and counted. The lists stay
//! well formed and the overflow is visible through [`ClusterLists::dropped`]
//! and [`ClusterLists::records_requested`].

use std::sync::atomic::{AtomicU32, Ordering};

/// Head/next sentinel marking the end of a list.
pub const EMPTY: u32 = u32::MAX;

/// Per-cell linked lists backed by a shared record pool.
#[derive(Debug)]
pub struct ClusterLists {
    heads: Vec<AtomicU32>,
    counts: Vec<AtomicU32>,
    next: Vec<AtomicU32>,
    capsule: Vec<AtomicU32>,
    counter: AtomicU32,
    dropped: AtomicU32,
    headroom: u32,
}

impl ClusterLists {
    /// Lists for `cell_count` cells with `cell_count × headroom` records.
    #[must_use]
    pub fn new(cell_count: usize, headroom: u32) -> Self {
        let records = cell_count.saturating_mul(headroom as usize).min(EMPTY as usize);
        let fill = |n: usize, value: u32| -> Vec<AtomicU32> {
            (0..n).map(|_| AtomicU32::new(value)).collect()
        };
        Self {
            heads: fill(cell_count, EMPTY),
            counts: fill(cell_count, 0),
            next: fill(records, EMPTY),
            capsule: fill(records, 0),
            counter: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            headroom,
        }
    }

    /// Whether these buffers already fit the requested shape.
    #[must_use]
    pub fn fits(&self, cell_count: usize, headroom: u32) -> bool {
        self.heads.len() == cell_count && self.headroom == headroom
    }

    /// Number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.heads.len()
    }

    /// Size of the shared record pool.
    #[must_use]
    pub fn record_capacity(&self) -> usize {
        self.next.len()
    }

    /// Record pool multiplier per cell.
    #[must_use]
    pub fn headroom(&self) -> u32 {
        self.headroom
    }

    /// Empty every list and rewind the record counter.
    pub fn reset(&mut self) {
        for head in &mut self.heads {
            *head.get_mut() = EMPTY;
        }
        for count in &mut self.counts {
            *count.get_mut() = 0;
        }
        *self.counter.get_mut() = 0;
        *self.dropped.get_mut() = 0;
    }

    /// Append `capsule` to the list of `cell`.
    ///
    /// Returns `false` if the record pool is exhausted; the append is then
    /// dropped and counted.
    pub fn push(&self, cell: usize, capsule: u32) -> bool {
        let slot = self.counter.fetch_add(1, Ordering::Relaxed);
        let index = slot as usize;
        if index >= self.next.len() {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.capsule[index].store(capsule, Ordering::Relaxed);
        let previous = self.heads[cell].swap(slot, Ordering::AcqRel);
        self.next[index].store(previous, Ordering::Release);
        let _ = self.counts[cell].fetch_add(1, Ordering::Relaxed);
        true
    }

    /// First record of a cell's list.
    #[must_use]
    pub fn head(&self, cell: usize) -> Option<u32> {
        let head = self.heads[cell].load(Ordering::Acquire);
        (head != EMPTY).then_some(head)
    }

    /// Running append count of a cell.
    #[must_use]
    pub fn count(&self, cell: usize) -> u32 {
        self.counts[cell].load(Ordering::Relaxed)
    }

    /// Walk a cell's list, yielding capsule indices from newest to oldest.
    #[must_use]
    pub fn iter_cell(&self, cell: usize) -> CellIter<'_> {
        CellIter {
            lists: self,
            cursor: self.heads[cell].load(Ordering::Acquire),
            remaining: self.records_used(),
        }
    }

    /// Appends attempted since the last reset, including dropped ones.
    ///
    /// This is the record pool size the frame would have needed.
    #[must_use]
    pub fn records_requested(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Records actually written since the last reset.
    #[must_use]
    pub fn records_used(&self) -> usize {
        (self.records_requested() as usize).min(self.record_capacity())
    }

    /// Appends dropped since the last reset because the pool was full.
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Bytes held by heads, counts, records and the counter.
    #[must_use]
    pub fn byte_count(&self) -> usize {
        let word = size_of::<u32>();
        self.cell_count() * word * 2 + self.record_capacity() * word * 2 + word
    }
}

/// Iterator over the capsule indices of one cell.
#[derive(Debug)]
pub struct CellIter<'a> {
    lists: &'a ClusterLists,
    cursor: u32,
    // Bounds the walk by the number of written records.
    remaining: usize,
}

impl Iterator for CellIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.cursor == EMPTY || self.remaining == 0 {
            return None;
        }
        let index = self.cursor as usize;
        self.remaining -= 1;
        self.cursor = self.lists.next[index].load(Ordering::Acquire);
        Some(self.lists.capsule[index].load(Ordering::Relaxed))
    }
}
