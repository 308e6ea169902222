//! Module: layer::consistency
//! Responsibility: interleaving appends and scans on one open layer.
//! Does not own: row encoding or filter translation.
//! Boundary: a scan observes every feature appended before each fetch, in
//! id order, and reports end-of-data once per exhaustive pass.

use crate::{db::engine::FragmentRow, model::feature::Feature};
use std::collections::VecDeque;

///
/// SessionState
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SessionState {
    #[default]
    Idle,
    Writing,
    Reading,
}

///
/// FidAllocator
///
/// Feature ids grow monotonically from 1 and are never reused, including
/// across reopen (the last committed id seeds the allocator).
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FidAllocator {
    last: i64,
}

impl FidAllocator {
    #[must_use]
    pub const fn starting_after(last: i64) -> Self {
        Self { last }
    }

    #[must_use]
    pub const fn last(&self) -> i64 {
        self.last
    }

    /// Accept a caller id if it keeps ids increasing, otherwise hand out the
    /// next one. `Err(last)` when the caller id would go backwards.
    pub const fn assign(&mut self, requested: Option<i64>) -> Result<i64, i64> {
        let fid = match requested {
            Some(fid) if fid <= self.last => return Err(self.last),
            Some(fid) => fid,
            None => self.last.saturating_add(1),
        };
        self.last = fid;

        Ok(fid)
    }
}

///
/// WriteBuffer
/// Rows accepted but not yet committed as a fragment.
///

#[derive(Debug)]
pub struct WriteBuffer {
    rows: Vec<FragmentRow>,
    capacity: usize,
}

impl WriteBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, row: FragmentRow) {
        self.rows.push(row);
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.rows.len() >= self.capacity
    }

    pub fn take(&mut self) -> Vec<FragmentRow> {
        std::mem::take(&mut self.rows)
    }
}

///
/// ReadCursor
///
/// Position of a sequential scan. Rows are fetched lazily in ordinal order
/// starting at `next_ordinal`; a fetch that finds nothing ends the pass and
/// the cursor stays exhausted until reset, even if rows are appended later.
///

#[derive(Debug, Default)]
pub struct ReadCursor {
    next_ordinal: u64,
    exhausted: bool,
    pending: VecDeque<Feature>,
}

impl ReadCursor {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub const fn next_ordinal(&self) -> u64 {
        self.next_ordinal
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn pop(&mut self) -> Option<Feature> {
        self.pending.pop_front()
    }

    /// Record one fetched batch. `last_ordinal` is the ordinal of the last
    /// row the engine returned; `None` means the fetch was empty.
    pub fn advance(&mut self, last_ordinal: Option<u64>, features: Vec<Feature>) {
        match last_ordinal {
            Some(ordinal) => self.next_ordinal = ordinal + 1,
            None => self.exhausted = true,
        }
        self.pending.extend(features);
    }

    pub const fn finish(&mut self) {
        self.exhausted = true;
    }
}
