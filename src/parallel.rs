//! Fork-join splitting of CPU-bound index ranges
//!
//! [`ParallelExecutor`] cuts `[0, total)` into contiguous, near-equal ranges
//! and runs one rayon task per range. Every task runs to completion; each
//! returns its own result and the caller merges them after the join, so no
//! shared error list (and no lock) is involved.

#![forbid(unsafe_code)]

use rayon::prelude::*;
use std::ops::Range;

/// Split `[0, total)` into `min(workers, total)` contiguous ranges.
///
/// Base size is `total / workers`; the first `total % workers` ranges get one
/// extra element. Range sizes therefore differ by at most one and the ranges
/// partition the interval exactly. `workers == 0` is treated as one worker.
pub fn split_ranges(total: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1).min(total);
    if workers == 0 {
        return Vec::new();
    }
    let base = total / workers;
    let mut extra = total % workers;

    let mut out = Vec::with_capacity(workers);
    let mut start = 0usize;
    for _ in 0..workers {
        let mut end = start + base;
        if extra > 0 {
            end += 1;
            extra -= 1;
        }
        out.push(start..end);
        start = end;
    }
    debug_assert_eq!(start, total);
    out
}

/// Fork-join executor over index ranges.
#[derive(Clone, Copy, Debug)]
pub struct ParallelExecutor {
    max_workers: usize,
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new(rayon::current_num_threads())
    }
}

impl ParallelExecutor {
    /// Executor that never uses more than `max_workers` ranges (min 1).
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Upper bound on concurrently dispatched ranges.
    #[inline]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// The ranges [`run`](Self::run) would dispatch for `total` iterations.
    #[inline]
    pub fn ranges(&self, total: usize) -> Vec<Range<usize>> {
        split_ranges(total, self.max_workers)
    }

    /// Run `worker(start, end)` once per range and block until all complete.
    ///
    /// Results come back one per range. A range reporting failure does not
    /// stop its siblings.
    pub fn run<T, W>(&self, total: usize, worker: W) -> Vec<T>
    where
        T: Send,
        W: Fn(usize, usize) -> T + Sync,
    {
        self.ranges(total)
            .into_par_iter()
            .map(|r| worker(r.start, r.end))
            .collect()
    }

    /// Run `pred` on every index and collect the indices where it is false.
    ///
    /// Per-range hits are merged after the join and returned sorted.
    pub fn collect_failures<P>(&self, total: usize, pred: P) -> Vec<usize>
    where
        P: Fn(usize) -> bool + Sync,
    {
        let mut bad: Vec<usize> = self
            .run(total, |start, end| {
                (start..end).filter(|&i| !pred(i)).collect::<Vec<_>>()
            })
            .into_iter()
            .flatten()
            .collect();
        bad.sort_unstable();
        bad
    }
}
