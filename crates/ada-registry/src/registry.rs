//! Thread registry (§4.E): the fixed-capacity slot table every instrumented
//! thread claims exactly one entry in, and every drain worker iterates.
//!
//! The claim protocol is the teacher's `Channel::register` pattern
//! (`crates/ringmpsc/src/channel.rs`) lifted almost unchanged: an atomic
//! fetch-add reserves an index, and if that index lands past capacity the
//! claim is rolled back with a matching fetch-sub rather than leaving the
//! counter permanently inflated.

use crate::error::RegistryError;
use ada_ring::ThreadLaneSet;
use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

thread_local! {
    /// Caches `(registry identity, slot index)` so a thread that calls
    /// `register` more than once on the same registry short-circuits
    /// straight back to its existing slot instead of claiming a second one.
    /// Keyed by the registry's address since a process may legitimately
    /// construct more than one registry (tests do).
    static SLOT_CACHE: Cell<Option<(usize, u32)>> = const { Cell::new(None) };
}

/// Per-slot ring sizing, applied uniformly to every thread that registers.
#[derive(Debug, Clone, Copy)]
pub struct LaneSizing {
    pub index_ring_count: usize,
    pub index_ring_capacity: usize,
    pub detail_ring_count: usize,
    pub detail_ring_capacity: usize,
}

impl Default for LaneSizing {
    fn default() -> Self {
        Self {
            index_ring_count: 4,
            index_ring_capacity: 4096,
            detail_ring_count: 2,
            detail_ring_capacity: 256,
        }
    }
}

/// Fixed-capacity table of [`ThreadLaneSet`]s, one per registered thread.
///
/// Slots are allocated lazily (a thread that never registers costs nothing
/// but an empty `OnceLock`), but the table itself is sized up front — the
/// registry never grows past the `capacity` passed to [`ThreadRegistry::new`].
/// Slot recycling after thread exit is out of scope for this version (open
/// question, decided in DESIGN.md): once claimed, a slot is never freed.
pub struct ThreadRegistry {
    slots: Vec<OnceLock<ThreadLaneSet>>,
    claimed: AtomicU32,
    sizing: LaneSizing,
}

impl ThreadRegistry {
    pub fn new(capacity: u32, sizing: LaneSizing) -> Self {
        let mut slots = Vec::with_capacity(capacity as usize);
        slots.resize_with(capacity as usize, OnceLock::new);
        Self {
            slots,
            claimed: AtomicU32::new(0),
            sizing,
        }
    }

    #[inline]
    pub fn get_capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    #[inline]
    pub fn get_active_count(&self) -> u32 {
        self.claimed.load(Ordering::Acquire).min(self.get_capacity())
    }

    /// Registers the calling thread, returning its slot index. Idempotent
    /// per-thread via the thread-local cache: calling this again from the
    /// same OS thread on the same registry returns the same index without
    /// claiming a new one.
    pub fn register(&self, thread_id: u32) -> Result<u32, RegistryError> {
        let identity = self as *const Self as usize;
        if let Some(idx) = SLOT_CACHE.with(|c| match c.get() {
            Some((id, idx)) if id == identity => Some(idx),
            _ => None,
        }) {
            return Ok(idx);
        }

        let idx = self.claimed.fetch_add(1, Ordering::AcqRel);
        if idx >= self.get_capacity() {
            self.claimed.fetch_sub(1, Ordering::AcqRel);
            return Err(RegistryError::CapacityExceeded {
                capacity: self.get_capacity(),
            });
        }

        let lane_set = ThreadLaneSet::new(
            thread_id,
            idx,
            self.sizing.index_ring_count,
            self.sizing.index_ring_capacity,
            self.sizing.detail_ring_count,
            self.sizing.detail_ring_capacity,
        )
        .expect("lane sizing validated at registry construction");
        lane_set.publish();
        self.slots[idx as usize]
            .set(lane_set)
            .unwrap_or_else(|_| panic!("slot {idx} claimed twice, claim protocol is broken"));

        SLOT_CACHE.with(|c| c.set(Some((identity, idx))));
        Ok(idx)
    }

    /// Looks up a slot by index. Returns `None` for an index past capacity
    /// or a capacity-reserved-but-not-yet-published slot (the narrow window
    /// between the `fetch_add` and the `OnceLock::set` above).
    pub fn get_thread_at(&self, index: u32) -> Option<&ThreadLaneSet> {
        let slot = self.slots.get(index as usize)?.get()?;
        slot.is_active().then_some(slot)
    }

    /// Iterates every currently-published slot, skipping ones that are
    /// reserved but not yet active and any beyond the high-water mark.
    pub fn iter_active(&self) -> impl Iterator<Item = &ThreadLaneSet> {
        self.slots.iter().filter_map(|s| s.get()).filter(|s| s.is_active())
    }

    /// Read-only handle for a consumer (the drain worker) to walk the
    /// registry. A thin wrapper today since the registry already lives
    /// behind a shared reference/`Arc`, but named to match the contract's
    /// `attach` operation and to leave room for a future cross-process
    /// variant without changing callers.
    pub fn attach(&self) -> &Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizing() -> LaneSizing {
        LaneSizing {
            index_ring_count: 2,
            index_ring_capacity: 8,
            detail_ring_count: 1,
            detail_ring_capacity: 8,
        }
    }

    #[test]
    fn register_assigns_increasing_slots() {
        let registry = ThreadRegistry::new(4, sizing());
        let a = registry.register(11).unwrap();
        assert_eq!(a, 0);
        assert_eq!(registry.get_active_count(), 1);
        let got = registry.get_thread_at(a).unwrap();
        assert_eq!(got.thread_id, 11);
    }

    #[test]
    fn register_past_capacity_fails_and_rolls_back() {
        use std::sync::Arc;
        // Two distinct OS threads so the thread-local claim cache doesn't
        // short-circuit the second registration — that cache is keyed for
        // "one thread registers itself once", not "one thread claims
        // several slots".
        let registry = Arc::new(ThreadRegistry::new(1, sizing()));
        let r1 = Arc::clone(&registry);
        std::thread::spawn(move || r1.register(1).unwrap()).join().unwrap();
        let r2 = Arc::clone(&registry);
        let err = std::thread::spawn(move || r2.register(2))
            .join()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, RegistryError::CapacityExceeded { capacity: 1 }));
        assert_eq!(registry.get_active_count(), 1);
    }

    #[test]
    fn iter_active_skips_nothing_once_published() {
        use std::sync::Arc;
        let registry = Arc::new(ThreadRegistry::new(4, sizing()));
        for tid in [1u32, 2] {
            let r = Arc::clone(&registry);
            std::thread::spawn(move || r.register(tid).unwrap()).join().unwrap();
        }
        let mut ids: Vec<u32> = registry.iter_active().map(|s| s.thread_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn repeated_register_from_same_thread_is_idempotent() {
        let registry = ThreadRegistry::new(4, sizing());
        let first = registry.register(7).unwrap();
        let second = registry.register(7).unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.get_active_count(), 1);
    }

    #[test]
    fn get_thread_at_out_of_range_is_none() {
        let registry = ThreadRegistry::new(2, sizing());
        assert!(registry.get_thread_at(5).is_none());
        assert!(registry.get_thread_at(0).is_none());
    }
}
