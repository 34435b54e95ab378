//! Per-series accumulation handles.
//!
//! A handle owns exactly one mutable cell for one attribute set. Its
//! lifecycle is a single atomic integer: bit 0 is the "unmapped" bit and the
//! higher bits count active references in units of two. Writers that win
//! `acquire` are guaranteed the handle stays mapped until they `release`;
//! eviction succeeds only through `try_unmap`, and only while the handle is
//! idle.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use telemetry_core::MetricValue;

use crate::accumulation::Accumulation;
use crate::cell::AggregationCell;
use crate::exemplar::{Exemplar, ExemplarReservoir};

const UNMAPPED_BIT: u64 = 1;
const REF_INCREMENT: u64 = 2;

pub struct AggregatorHandle {
    cell: AggregationCell,
    lifecycle: AtomicU64,
    has_recordings: AtomicBool,
    reservoir: Option<ExemplarReservoir>,
}

impl AggregatorHandle {
    pub fn new(cell: AggregationCell, with_exemplars: bool) -> Self {
        Self {
            cell,
            lifecycle: AtomicU64::new(0),
            has_recordings: AtomicBool::new(false),
            reservoir: with_exemplars.then(ExemplarReservoir::new),
        }
    }

    /// Take a reference for the duration of one recording. Returns `false`
    /// if the handle has already been unmapped; the caller must still pair
    /// the call with `release` and then re-fetch or create a fresh handle.
    pub fn acquire(&self) -> bool {
        self.lifecycle.fetch_add(REF_INCREMENT, Ordering::AcqRel) & UNMAPPED_BIT == 0
    }

    pub fn release(&self) {
        self.lifecycle.fetch_sub(REF_INCREMENT, Ordering::AcqRel);
    }

    /// The single authorization point for evicting this handle from its
    /// registry: succeeds only when no references are outstanding and the
    /// handle is still mapped, flipping it unmapped permanently.
    pub fn try_unmap(&self) -> bool {
        self.lifecycle
            .compare_exchange(0, UNMAPPED_BIT, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn record(&self, value: MetricValue) {
        self.cell.record(value);
        if let Some(reservoir) = &self.reservoir {
            reservoir.add(Exemplar::new(value, Utc::now()));
        }
        self.has_recordings.store(true, Ordering::Release);
    }

    pub fn record_long(&self, value: i64) {
        self.record(MetricValue::Long(value));
    }

    pub fn record_double(&self, value: f64) {
        self.record(MetricValue::Double(value));
    }

    /// Reset the cell into an immutable accumulation, or `None` when
    /// nothing was recorded since the previous reset. Only the collection
    /// thread may call this. A recording racing with the reset lands in
    /// either the closing or the next interval; at most one recording can be
    /// attributed to the wrong interval, which is accepted.
    pub fn accumulate_then_reset(&self) -> Option<Accumulation> {
        if !self.has_recordings.swap(false, Ordering::AcqRel) {
            return None;
        }
        Some(self.cell.take())
    }

    pub fn collect_exemplars(&self) -> Vec<Exemplar> {
        match &self.reservoir {
            Some(reservoir) => reservoir.collect_and_reset().collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn sum_handle() -> AggregatorHandle {
        AggregatorHandle::new(AggregationCell::long_sum(), false)
    }

    #[test]
    fn test_acquire_release_then_unmap() {
        let handle = sum_handle();

        assert!(handle.acquire());
        // A reference is outstanding, eviction must fail.
        assert!(!handle.try_unmap());
        handle.release();

        assert!(handle.try_unmap());
        // Unmapped is terminal.
        assert!(!handle.try_unmap());
        assert!(!handle.acquire());
        handle.release();
    }

    #[test]
    fn test_accumulate_then_reset_no_data() {
        let handle = sum_handle();
        assert_eq!(handle.accumulate_then_reset(), None);

        handle.record_long(0);
        // Recording a zero is data, unlike never recording.
        assert_eq!(
            handle.accumulate_then_reset(),
            Some(Accumulation::Sum(MetricValue::Long(0)))
        );
        assert_eq!(handle.accumulate_then_reset(), None);
    }

    #[test]
    fn test_sum_of_recordings() {
        let handle = sum_handle();
        for value in [1, 2, 3, 4, 5] {
            handle.record_long(value);
        }

        assert_eq!(
            handle.accumulate_then_reset(),
            Some(Accumulation::Sum(MetricValue::Long(15)))
        );
        assert_eq!(handle.accumulate_then_reset(), None);
    }

    #[test]
    fn test_exemplars_collected_alongside() {
        let handle = AggregatorHandle::new(AggregationCell::long_sum(), true);
        handle.record_long(7);
        handle.record_long(8);

        let exemplars = handle.collect_exemplars();
        assert_eq!(exemplars.len(), 2);
        assert!(handle.collect_exemplars().is_empty());
    }

    #[test]
    fn test_unmap_races_with_writers() {
        let handle = Arc::new(sum_handle());
        let successful_unmaps = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::new();

        for _ in 0..4 {
            let handle = handle.clone();
            workers.push(std::thread::spawn(move || {
                for _ in 0..10_000 {
                    if handle.acquire() {
                        handle.record_long(1);
                    }
                    handle.release();
                }
            }));
        }
        for _ in 0..4 {
            let handle = handle.clone();
            let successful_unmaps = successful_unmaps.clone();
            workers.push(std::thread::spawn(move || {
                for _ in 0..10_000 {
                    if handle.try_unmap() {
                        successful_unmaps.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }

        // At most one eviction ever wins, no matter the interleaving; once
        // the handle is idle the next attempt must win, and never a second.
        let raced = successful_unmaps.load(Ordering::Relaxed);
        assert!(raced <= 1);
        if raced == 0 {
            assert!(handle.try_unmap());
        }
        assert!(!handle.try_unmap());
    }

    proptest! {
        /// Replay a random interleaving of acquire/release/try_unmap and
        /// check the protocol invariants: unmap never succeeds while a
        /// reference is out, and at most one unmap ever succeeds.
        #[test]
        fn prop_lifecycle_interleavings(operations in proptest::collection::vec(0u8..3, 1..64)) {
            let handle = sum_handle();
            let mut live_references = 0u32;
            let mut unmapped = false;

            for operation in operations {
                match operation {
                    0 => {
                        let mapped = handle.acquire();
                        prop_assert_eq!(mapped, !unmapped);
                        live_references += 1;
                    }
                    1 => {
                        if live_references > 0 {
                            handle.release();
                            live_references -= 1;
                        }
                    }
                    _ => {
                        let won = handle.try_unmap();
                        prop_assert_eq!(won, live_references == 0 && !unmapped);
                        if won {
                            unmapped = true;
                        }
                    }
                }
            }
        }
    }
}
