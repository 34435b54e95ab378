//! Lock-free exemplar storage.
//!
//! The reservoir is a singly linked list grown by CAS-prepending nodes.
//! `add` never locks or blocks; `collect_and_reset` swaps the head pointer
//! to empty and hands back the previous chain as a forward-only drain that
//! consumes each node exactly once. Growth between collections is unbounded;
//! capping insertion is the job of an upstream sampling filter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use telemetry_core::MetricValue;

/// A raw measurement retained alongside the aggregate it contributed to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exemplar {
    pub value: MetricValue,
    pub timestamp: DateTime<Utc>,
}

impl Exemplar {
    pub fn new(value: impl Into<MetricValue>, timestamp: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }
}

struct Node {
    exemplar: Exemplar,
    next: *mut Node,
}

#[derive(Default)]
pub struct ExemplarReservoir {
    head: AtomicPtr<Node>,
}

// Nodes are owned exclusively by the list; the head pointer is the only
// shared access path and all traversal happens after a swap detaches it.
unsafe impl Send for ExemplarReservoir {}
unsafe impl Sync for ExemplarReservoir {}

impl ExemplarReservoir {
    pub fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Prepend a measurement, retrying the CAS until it wins.
    pub fn add(&self, exemplar: Exemplar) {
        let node = Box::into_raw(Box::new(Node {
            exemplar,
            next: ptr::null_mut(),
        }));
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            unsafe {
                (*node).next = head;
            }
            match self
                .head
                .compare_exchange_weak(head, node, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(observed) => head = observed,
            }
        }
    }

    /// Detach the current chain and return it as a consume-once sequence,
    /// leaving the reservoir empty. Yields newest-first.
    pub fn collect_and_reset(&self) -> ExemplarDrain {
        ExemplarDrain {
            next: self.head.swap(ptr::null_mut(), Ordering::AcqRel),
        }
    }
}

impl Drop for ExemplarReservoir {
    fn drop(&mut self) {
        // Consume whatever is still linked so the nodes are freed.
        drop(self.collect_and_reset());
    }
}

/// Forward-only, non-restartable traversal of a detached exemplar chain.
pub struct ExemplarDrain {
    next: *mut Node,
}

unsafe impl Send for ExemplarDrain {}

impl Iterator for ExemplarDrain {
    type Item = Exemplar;

    fn next(&mut self) -> Option<Exemplar> {
        if self.next.is_null() {
            return None;
        }
        let node = unsafe { Box::from_raw(self.next) };
        self.next = node.next;
        Some(node.exemplar)
    }
}

impl Drop for ExemplarDrain {
    fn drop(&mut self) {
        for _ in self.by_ref() {}
    }
}
