//! Lane and thread lane set (§4.C/§4.D).
//!
//! A `Lane` is the one generic component used for both the Index and
//! Detail event streams (Design Note §9: one parameterized type, not two
//! hand-written classes) — it owns a [`RingPool`] plus the counters that
//! travel with it. A `ThreadLaneSet` is what the registry hands out per
//! thread: one Index lane, one optional Detail lane, and the bookkeeping
//! the registry needs to find and retire it.

use crate::pool::RingPool;
use crate::ring::RingError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// One event stream (Index or Detail) for a single thread: a ring pool plus
/// the counters a drain cycle or operator dashboard wants alongside it.
pub struct Lane<T> {
    pool: RingPool<T>,
    events_generated: AtomicU64,
    overflow: AtomicU64,
}

impl<T: Copy> Lane<T> {
    pub fn new(ring_count: usize, capacity_per_ring: usize) -> Result<Self, RingError> {
        Ok(Self {
            pool: RingPool::new(ring_count, capacity_per_ring)?,
            events_generated: AtomicU64::new(0),
            overflow: AtomicU64::new(0),
        })
    }

    #[inline]
    pub fn pool(&self) -> &RingPool<T> {
        &self.pool
    }

    /// Writes one event, tracking generated/overflow counters. Producer-only.
    pub fn write(&self, event: &T) -> Result<(), RingError> {
        self.events_generated.fetch_add(1, Ordering::Relaxed);
        match self.pool.write(event) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.overflow.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    #[inline]
    pub fn events_generated(&self) -> u64 {
        self.events_generated.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn overflow_count(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn pending_events(&self) -> u64 {
        self.pool.pending_events()
    }
}

/// Everything the registry hands out for one instrumented thread.
///
/// `#[repr(C, align(64))]` keeps each slot's alignment a multiple of the
/// cache line, so the registry's backing array doesn't false-share
/// neighboring slots — the same concern the teacher's `CacheAligned<T>`
/// addresses, scaled to this core's 64-byte requirement instead of the
/// teacher's 128.
#[repr(C, align(64))]
pub struct ThreadLaneSet {
    pub index: Lane<ada_core::IndexEvent>,
    pub detail: Option<Lane<ada_core::DetailEvent>>,
    pub thread_id: u32,
    pub slot_index: u32,
    active: AtomicBool,
    accepting: AtomicBool,
}

impl ThreadLaneSet {
    pub fn new(
        thread_id: u32,
        slot_index: u32,
        index_ring_count: usize,
        index_ring_capacity: usize,
        detail_ring_count: usize,
        detail_ring_capacity: usize,
    ) -> Result<Self, RingError> {
        let index = Lane::new(index_ring_count, index_ring_capacity)?;
        let detail = if detail_ring_count > 0 {
            Some(Lane::new(detail_ring_count, detail_ring_capacity)?)
        } else {
            None
        };
        Ok(Self {
            index,
            detail,
            thread_id,
            slot_index,
            active: AtomicBool::new(false),
            accepting: AtomicBool::new(true),
        })
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Publishes this slot as ready for iteration by the registry/drain
    /// worker. Must only be called once, after `index`/`detail` are fully
    /// constructed (see `ada-registry`'s claim protocol).
    #[inline]
    pub fn publish(&self) {
        self.active.store(true, Ordering::Release);
    }

    /// Whether producers on this slot should still submit new events.
    /// `true` until the shutdown coordinator marks the slot non-accepting
    /// in step 2 of its sequence; existing events already in the rings are
    /// still drained normally.
    #[inline]
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Marks this slot non-accepting. One-way: there is no `resume`,
    /// matching the shutdown sequence's single pass over active slots.
    #[inline]
    pub fn mark_non_accepting(&self) {
        self.accepting.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ada_core::{EventKind, FunctionId, IndexEvent};

    #[test]
    fn lane_tracks_generated_and_overflow_counters() {
        let lane: Lane<IndexEvent> = Lane::new(2, 4).unwrap();
        for i in 0..16u64 {
            let ev = IndexEvent::new(i, FunctionId::new(0, 0), 1, EventKind::Call, 0);
            let _ = lane.write(&ev);
        }
        assert_eq!(lane.events_generated(), 16);
    }

    #[test]
    fn thread_lane_set_starts_inactive_until_published() {
        let set = ThreadLaneSet::new(123, 0, 2, 8, 1, 4).unwrap();
        assert!(!set.is_active());
        set.publish();
        assert!(set.is_active());
        assert!(set.detail.is_some());
    }

    #[test]
    fn thread_lane_set_without_detail_lane() {
        let set = ThreadLaneSet::new(1, 0, 2, 8, 0, 0).unwrap();
        assert!(set.detail.is_none());
    }

    #[test]
    fn thread_lane_set_starts_accepting_and_is_one_way() {
        let set = ThreadLaneSet::new(1, 0, 2, 8, 0, 0).unwrap();
        assert!(set.is_accepting());
        set.mark_non_accepting();
        assert!(!set.is_accepting());
    }
}
