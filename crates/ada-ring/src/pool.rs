//! Ring pool: rotates a small, fixed set of [`Ring`]s per lane so a drain
//! worker can be consuming one ring while the instrumented thread keeps
//! writing into another (§4.B "Ring pool").
//!
//! The free/submit bookkeeping queues are themselves [`Ring<u32>`]s of ring
//! indices — the same SPSC primitive, reused rather than reimplemented,
//! which is how the teacher's `Channel<T>` built its own producer
//! registry on top of the one ring type it had.

use crate::ring::{Ring, RingError, RingHeaderSnapshot};
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// A fixed set of rings rotated by one producer and drained by one consumer.
///
/// `mark` tracks whether this pool currently holds at least one event the
/// detail-lane controller wants persisted. Internally it is a saturating
/// counter rather than a bare flag (mirroring the original implementation's
/// `events_generated` counter, where "marked" is just "nonzero") so that
/// overlapping mark windows don't clobber each other's signal; the public
/// API stays a clean bool (§4.B, §4.C).
pub struct RingPool<T> {
    rings: Vec<Ring<T>>,
    free: Ring<u32>,
    submit: Ring<u32>,
    // `active` is written by the producer on every rotation and read by the
    // consumer on every drain cycle; `mark` is written by whichever thread
    // spots a policy match and read by the detail controller. Each gets its
    // own cache line so the two handoffs don't false-share, the same split
    // the teacher's `Ring<T>` keeps between its producer-hot and
    // consumer-hot fields.
    active: CachePadded<AtomicU32>,
    exhaustion_count: AtomicU64,
    mark: CachePadded<AtomicU64>,
}

impl<T: Copy> RingPool<T> {
    /// Builds a pool of `ring_count` rings, each with room for
    /// `capacity_per_ring` events. One ring starts active; the rest start
    /// on the free queue.
    pub fn new(ring_count: usize, capacity_per_ring: usize) -> Result<Self, RingError> {
        assert!(ring_count >= 1, "a ring pool needs at least one ring");
        let mut rings = Vec::with_capacity(ring_count);
        for _ in 0..ring_count {
            rings.push(Ring::create_owned(capacity_per_ring)?);
        }
        let free: Ring<u32> = Ring::create_owned(ring_count.max(2))?;
        let submit: Ring<u32> = Ring::create_owned(ring_count.max(2))?;
        for idx in 1..ring_count as u32 {
            free.write(&idx).expect("free queue sized to ring_count");
        }
        Ok(Self {
            rings,
            free,
            submit,
            active: CachePadded::new(AtomicU32::new(0)),
            exhaustion_count: AtomicU64::new(0),
            mark: CachePadded::new(AtomicU64::new(0)),
        })
    }

    #[inline]
    pub fn ring_count(&self) -> usize {
        self.rings.len()
    }

    #[inline]
    pub fn active_index(&self) -> u32 {
        self.active.load(Ordering::Acquire)
    }

    #[inline]
    pub fn active_ring(&self) -> &Ring<T> {
        &self.rings[self.active_index() as usize]
    }

    pub fn ring(&self, index: u32) -> &Ring<T> {
        &self.rings[index as usize]
    }

    /// Diagnostic snapshot of the active ring's header fields.
    #[inline]
    pub fn get_active_header(&self) -> RingHeaderSnapshot {
        self.active_ring().header_snapshot()
    }

    /// Writes `event` into the active ring, rotating to a fresh ring and
    /// retrying once if the active ring is full. Producer-only.
    pub fn write(&self, event: &T) -> Result<(), RingError> {
        match self.active_ring().write(event) {
            Ok(()) => Ok(()),
            Err(RingError::Full) => {
                self.swap_active()?;
                self.active_ring().write(event)
            }
            Err(e) => Err(e),
        }
    }

    /// Retires the current active ring to the submit queue and promotes a
    /// new one, per the original's `ring_pool_swap_active`: take a free
    /// ring if one exists; otherwise, with more than one ring in the pool,
    /// force a free ring into existence by dropping the oldest submitted
    /// ring (`handle_exhaustion`) and retry once. Returns the index of the
    /// ring that was just retired to the submit queue, so a caller like the
    /// detail-lane controller can report which ring a selective dump covers.
    pub fn swap_active(&self) -> Result<u32, RingError> {
        let old_active = self.active_index();
        if let Some(next) = self.try_take_free() {
            self.submit.write(&old_active).map_err(|_| RingError::Full)?;
            self.active.store(next, Ordering::Release);
            return Ok(old_active);
        }
        if self.ring_count() > 1 {
            self.handle_exhaustion();
            if let Some(next) = self.try_take_free() {
                self.submit.write(&old_active).map_err(|_| RingError::Full)?;
                self.active.store(next, Ordering::Release);
                return Ok(old_active);
            }
        }
        Err(RingError::Full)
    }

    fn try_take_free(&self) -> Option<u32> {
        let mut idx = 0u32;
        self.free.read(&mut idx).ok().map(|()| idx)
    }

    /// Drop-oldest exhaustion handling: pop the oldest ring waiting to be
    /// drained and return it straight to the free queue, discarding
    /// whatever it still holds. Counted so operators can see how often
    /// backpressure forced data loss.
    pub fn handle_exhaustion(&self) {
        let mut idx = 0u32;
        if self.submit.read(&mut idx).is_ok() {
            self.exhaustion_count.fetch_add(1, Ordering::Relaxed);
            let _ = self.free.write(&idx);
        }
    }

    #[inline]
    pub fn exhaustion_count(&self) -> u64 {
        self.exhaustion_count.load(Ordering::Relaxed)
    }

    /// Total events still sitting un-drained across every ring in the pool.
    /// Sound without consuming the submit queue: a ring only ever returns to
    /// the free queue once a drain cycle has emptied it, so summing
    /// `available_read` over all rings counts the active ring's pending
    /// writes plus every submitted-but-undrained ring, and nothing else.
    pub fn pending_events(&self) -> u64 {
        self.rings.iter().map(|r| r.available_read() as u64).sum()
    }

    /// Pops the next ring index waiting to be drained, consumer-only.
    pub fn next_submitted(&self) -> Option<u32> {
        let mut idx = 0u32;
        self.submit.read(&mut idx).ok().map(|()| idx)
    }

    /// Number of rings currently waiting in the submit queue, a cheap
    /// pending-work estimate for the weighted-fair scheduler.
    #[inline]
    pub fn pending_submitted(&self) -> usize {
        self.submit.available_read()
    }

    /// Returns a drained ring to the free pool for reuse.
    pub fn release(&self, index: u32) -> Result<(), RingError> {
        self.free.write(&index)
    }

    /// Signals that at least one event bound for this pool matched the
    /// detail-lane mark policy.
    #[inline]
    pub fn mark_detail(&self) {
        self.mark.fetch_add(1, Ordering::Release);
    }

    #[inline]
    pub fn is_detail_marked(&self) -> bool {
        self.mark.load(Ordering::Acquire) > 0
    }

    /// Clears the mark signal, e.g. once a detail window has been closed
    /// and its decision (dump or discard) made.
    #[inline]
    pub fn clear_mark(&self) {
        self.mark.store(0, Ordering::Release);
    }
}
