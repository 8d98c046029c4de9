//! The drain worker (§4.H): a single cooperative thread that owns the
//! consumer end of every ring in the registry, moving drained batches to
//! an injected [`EventSink`] and returning rings to their free queues.

use crate::config::DrainConfig;
use crate::error::DrainError;
use crate::metrics::DrainMetrics;
use crate::policy::{InnerScheduler, SchedulingPolicy};
use crate::sink::EventSink;
use ada_registry::ThreadRegistry;
use ada_ring::{RingPool, ThreadLaneSet};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const DRAIN_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum WorkerState {
    Running = 0,
    Stopping = 1,
    Stopped = 2,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Stopping,
            2 => Self::Stopped,
            _ => Self::Running,
        }
    }
}

/// Cheap, cloneable handle used to request a stop from another thread
/// (typically the shutdown coordinator) without needing `&mut` access to
/// the worker itself — the same "flip a flag, the owning loop observes it"
/// shape as `ringmpsc_stream::shutdown::ShutdownHandle`.
#[derive(Clone)]
pub struct DrainControl(Arc<AtomicU8>);

impl DrainControl {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(WorkerState::Running as u8)))
    }

    /// Flips the worker to `Stopping` (release). Idempotent.
    pub fn stop(&self) {
        self.0.store(WorkerState::Stopping as u8, Ordering::Release);
    }

    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn mark_stopped(&self) {
        self.0.store(WorkerState::Stopped as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.state() == WorkerState::Stopped
    }
}

fn drain_pool<T: Copy + Default>(
    pool: &RingPool<T>,
    max_rings: usize,
    fairness_quantum: usize,
    unbounded: bool,
    mut append: impl FnMut(&[T]) -> Result<(), DrainError>,
) -> (u64, u64, bool, bool) {
    let mut rings = 0u64;
    let mut events = 0u64;
    let mut writer_failed = false;
    let mut hit_cap = false;
    loop {
        if !unbounded && (rings as usize >= max_rings || events as usize >= fairness_quantum) {
            hit_cap = true;
            break;
        }
        let Some(idx) = pool.next_submitted() else {
            break;
        };
        let ring = pool.ring(idx);
        let mut buf = vec![T::default(); DRAIN_BATCH_SIZE];
        loop {
            let n = ring.read_batch(&mut buf, DRAIN_BATCH_SIZE);
            if n == 0 {
                break;
            }
            events += n as u64;
            if append(&buf[..n]).is_err() {
                writer_failed = true;
            }
        }
        let _ = pool.release(idx);
        rings += 1;
    }
    (rings, events, writer_failed, hit_cap)
}

/// Single-threaded consumer over a [`ThreadRegistry`]: drains both lanes of
/// each active slot per the configured [`SchedulingPolicy`], handing
/// batches to an injected [`EventSink`] (or dropping them, in the `None`
/// case).
pub struct DrainWorker {
    registry: Arc<ThreadRegistry>,
    writer: Option<Arc<dyn EventSink>>,
    policy: SchedulingPolicy,
    config: DrainConfig,
    control: DrainControl,
    cursor: u32,
    credits: Vec<u64>,
    inner_scheduler: Option<InnerScheduler>,
    metrics: DrainMetrics,
}

impl DrainWorker {
    pub fn new(
        registry: Arc<ThreadRegistry>,
        writer: Option<Arc<dyn EventSink>>,
        policy: SchedulingPolicy,
        config: DrainConfig,
    ) -> Self {
        let capacity = registry.get_capacity();
        let inner_scheduler = config.track_inner_fairness.then(|| InnerScheduler::new(capacity));
        Self {
            registry,
            writer,
            policy,
            config,
            control: DrainControl::new(),
            cursor: 0,
            credits: vec![0; capacity as usize],
            inner_scheduler,
            metrics: DrainMetrics::default(),
        }
    }

    /// A cloneable handle another thread can use to request a stop.
    pub fn control(&self) -> DrainControl {
        self.control.clone()
    }

    #[inline]
    pub fn metrics(&self) -> DrainMetrics {
        self.metrics
    }

    #[inline]
    pub fn inner_fairness_index(&self) -> Option<f64> {
        self.inner_scheduler.as_ref().map(InnerScheduler::fairness_index)
    }

    fn drain_slot(&mut self, slot_idx: u32, slot: &ThreadLaneSet, now_ns: u64, unbounded: bool) -> bool {
        let max_rings = self.config.max_batch_size;
        let quantum = self.config.fairness_quantum;

        let index_writer = self.writer.clone();
        let (i_rings, i_events, i_failed, i_cap) = drain_pool(slot.index.pool(), max_rings, quantum, unbounded, |batch| {
            index_writer.as_ref().map_or(Ok(()), |w| w.append_index(batch))
        });

        let (d_rings, d_events, d_failed, d_cap) = if let Some(detail_lane) = &slot.detail {
            let detail_writer = self.writer.clone();
            drain_pool(detail_lane.pool(), max_rings, quantum, unbounded, |batch| {
                detail_writer.as_ref().map_or(Ok(()), |w| w.append_detail(batch))
            })
        } else {
            (0, 0, false, false)
        };

        self.metrics.rings_drained += i_rings + d_rings;
        self.metrics.events_drained += i_events + d_events;
        if i_failed || d_failed {
            self.metrics.writer_failures += 1;
            tracing::warn!(slot = slot_idx, "writer rejected a drained batch");
        }
        if i_cap || d_cap {
            self.metrics.fairness_switches += 1;
        }
        if let Some(sched) = &mut self.inner_scheduler {
            if let Some(index) = sched.record_drain(slot_idx, now_ns, i_events + d_events) {
                tracing::debug!(fairness_index = index, "recomputed drain fairness index");
            }
        }

        i_rings + d_rings > 0
    }

    fn pick_weighted_fair_slot(&self, registry: &ThreadRegistry) -> Option<u32> {
        let mut best: Option<(u32, f64)> = None;
        for slot_idx in 0..registry.get_capacity() {
            let Some(slot) = registry.get_thread_at(slot_idx) else {
                continue;
            };
            let pending = slot.index.pool().pending_submitted()
                + slot.detail.as_ref().map_or(0, |d| d.pool().pending_submitted());
            if pending == 0 {
                continue;
            }
            let credits = self.credits.get(slot_idx as usize).copied().unwrap_or(0);
            let score = credits as f64 / pending as f64;
            if best.is_none_or(|(_, best_score)| score < best_score) {
                best = Some((slot_idx, score));
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Runs one scheduling cycle. Returns `true` if any batch was drained.
    pub fn run_cycle(&mut self, now_ns: u64) -> bool {
        self.metrics.cycles_run += 1;
        let registry = Arc::clone(&self.registry);
        let mut did_work = false;
        match self.policy {
            SchedulingPolicy::RoundRobin => {
                let capacity = registry.get_capacity();
                if capacity == 0 {
                    return false;
                }
                let start = self.cursor;
                for offset in 0..capacity {
                    let slot_idx = (start + offset) % capacity;
                    if let Some(slot) = registry.get_thread_at(slot_idx) {
                        if self.drain_slot(slot_idx, slot, now_ns, false) {
                            did_work = true;
                        }
                    }
                }
                self.cursor = (start + 1) % capacity;
            }
            SchedulingPolicy::WeightedFair => {
                if let Some(slot_idx) = self.pick_weighted_fair_slot(&registry) {
                    if let Some(slot) = registry.get_thread_at(slot_idx) {
                        did_work = self.drain_slot(slot_idx, slot, now_ns, false);
                    }
                    if let Some(c) = self.credits.get_mut(slot_idx as usize) {
                        *c += 1;
                    }
                }
            }
        }
        did_work
    }

    /// Shutdown-mode drain: removes the per-lane cap and runs until every
    /// lane is empty, then once more to close the race between a final
    /// producer write and this check.
    ///
    /// Rotates each slot's active ring into its submit queue first —
    /// `drain_pool` only ever drains submitted rings, so whatever a
    /// producer was still writing into its active ring at the moment of
    /// shutdown would otherwise never reach the writer.
    pub fn final_drain(&mut self, now_ns: u64) {
        let registry = Arc::clone(&self.registry);
        for slot_idx in 0..registry.get_capacity() {
            if let Some(slot) = registry.get_thread_at(slot_idx) {
                let _ = slot.index.pool().swap_active();
                if let Some(detail) = &slot.detail {
                    let _ = detail.pool().swap_active();
                }
            }
        }
        loop {
            let mut any_work = false;
            for slot_idx in 0..registry.get_capacity() {
                if let Some(slot) = registry.get_thread_at(slot_idx) {
                    if self.drain_slot(slot_idx, slot, now_ns, true) {
                        any_work = true;
                    }
                }
            }
            if !any_work {
                break;
            }
        }
        for slot_idx in 0..registry.get_capacity() {
            if let Some(slot) = registry.get_thread_at(slot_idx) {
                self.drain_slot(slot_idx, slot, now_ns, true);
            }
        }
        self.control.mark_stopped();
    }

    /// Cooperative run loop: repeats `run_cycle`, sleeping
    /// `poll_interval_us` after an idle cycle, until [`DrainControl::stop`]
    /// has been observed, at which point it performs a final drain.
    pub fn run_until_stopped(&mut self, now_ns_fn: impl Fn() -> u64) {
        loop {
            if self.control.state() == WorkerState::Stopping {
                self.final_drain(now_ns_fn());
                return;
            }
            let did_work = self.run_cycle(now_ns_fn());
            if !did_work {
                std::thread::sleep(std::time::Duration::from_micros(self.config.poll_interval_us));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ada_core::{DetailEvent, EventKind, FunctionId, IndexEvent};
    use ada_registry::LaneSizing;
    use std::sync::Mutex;

    struct RecordingSink {
        index_batches: Mutex<Vec<usize>>,
        detail_batches: Mutex<Vec<usize>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                index_batches: Mutex::new(Vec::new()),
                detail_batches: Mutex::new(Vec::new()),
            }
        }
    }

    impl EventSink for RecordingSink {
        fn append_index(&self, events: &[IndexEvent]) -> Result<(), DrainError> {
            self.index_batches.lock().unwrap().push(events.len());
            Ok(())
        }

        fn append_detail(&self, events: &[DetailEvent]) -> Result<(), DrainError> {
            self.detail_batches.lock().unwrap().push(events.len());
            Ok(())
        }
    }

    fn sizing() -> LaneSizing {
        LaneSizing {
            index_ring_count: 2,
            index_ring_capacity: 8,
            detail_ring_count: 0,
            detail_ring_capacity: 0,
        }
    }

    #[test]
    fn round_robin_drains_every_active_slot() {
        let registry = Arc::new(ThreadRegistry::new(4, sizing()));
        let t0 = registry.register(11).unwrap();
        let t1 = registry.register(22).unwrap();
        let slot0 = registry.get_thread_at(t0).unwrap();
        let slot1 = registry.get_thread_at(t1).unwrap();
        for i in 0..5u64 {
            let ev = IndexEvent::new(i, FunctionId::new(0, 0), 11, EventKind::Call, 0);
            let _ = slot0.index.write(&ev);
        }
        for i in 0..3u64 {
            let ev = IndexEvent::new(i, FunctionId::new(0, 0), 22, EventKind::Call, 0);
            let _ = slot1.index.write(&ev);
        }
        // force a rotation so there is something in the submit queue
        let _ = slot0.index.pool().swap_active();
        let _ = slot1.index.pool().swap_active();

        let sink = Arc::new(RecordingSink::new());
        let mut worker = DrainWorker::new(registry, Some(sink.clone()), SchedulingPolicy::RoundRobin, DrainConfig::default());
        worker.run_cycle(0);

        let total_index: usize = sink.index_batches.lock().unwrap().iter().sum();
        assert_eq!(total_index, 8);
        assert!(worker.metrics().rings_drained >= 2);
    }

    #[test]
    fn final_drain_empties_everything_and_stops() {
        let registry = Arc::new(ThreadRegistry::new(2, sizing()));
        let t0 = registry.register(1).unwrap();
        let slot0 = registry.get_thread_at(t0).unwrap();
        for i in 0..20u64 {
            let ev = IndexEvent::new(i, FunctionId::new(0, 0), 1, EventKind::Call, 0);
            let _ = slot0.index.write(&ev);
        }
        let mut worker = DrainWorker::new(registry, None, SchedulingPolicy::RoundRobin, DrainConfig::default());
        let handle = worker.control();
        handle.stop();
        worker.final_drain(0);
        assert!(handle.is_stopped());
        assert!(worker.metrics().events_drained > 0);
    }

    #[test]
    fn final_drain_flushes_the_still_active_ring_without_a_prior_rotation() {
        let registry = Arc::new(ThreadRegistry::new(2, sizing()));
        let t0 = registry.register(1).unwrap();
        let slot0 = registry.get_thread_at(t0).unwrap();
        // Far under ring capacity (8): these all land in the active ring,
        // which never rotates into the submit queue on its own.
        for i in 0..5u64 {
            let ev = IndexEvent::new(i, FunctionId::new(0, 0), 1, EventKind::Call, 0);
            slot0.index.write(&ev).unwrap();
        }
        assert_eq!(slot0.index.pending_events(), 5);

        let sink = Arc::new(RecordingSink::new());
        let mut worker = DrainWorker::new(registry, Some(sink.clone()), SchedulingPolicy::RoundRobin, DrainConfig::default());
        worker.final_drain(0);

        let total_index: usize = sink.index_batches.lock().unwrap().iter().sum();
        assert_eq!(total_index, 5);
    }
}
