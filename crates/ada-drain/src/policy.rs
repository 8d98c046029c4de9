//! Scheduling policy (§4.H, Design Note §9 "Polymorphism"): round-robin and
//! weighted-fair selection modeled as a capability enum rather than a
//! trait object — no vtables needed for two fixed strategies, the same
//! call the teacher makes for its drain-scheduler-shaped knobs.

/// Which strategy a [`crate::worker::DrainWorker`] uses to pick threads to
/// visit each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingPolicy {
    /// Visits every active slot once per cycle, starting from a rotating
    /// cursor so no slot is perpetually first or last.
    RoundRobin,
    /// Visits one slot per cycle: whichever active thread minimizes
    /// `credits / pending_work`, then charges it a credit.
    WeightedFair,
}

/// Per-thread scheduling state for the optional inner scheduler (§4.H
/// "Optional per-thread iterator"): priority, last drain time, and a
/// recent-events counter feeding a periodic Jain's fairness index.
///
/// Single-threaded consumer, so these are plain counters rather than
/// atomics — the same "zero atomic overhead for sequential use" the
/// teacher's `BatchMetrics` documents for its own single-consumer counters.
#[derive(Debug, Clone, Copy, Default)]
struct ThreadSchedState {
    priority: u32,
    last_drain_time_ns: u64,
    events_drained_recent: u64,
}

/// Tracks per-thread drain history and recomputes a Jain's fairness index
/// over `events_drained_recent` every 100 iterations.
pub struct InnerScheduler {
    per_thread: Vec<ThreadSchedState>,
    iteration: u64,
    last_fairness_index: f64,
}

impl InnerScheduler {
    pub fn new(capacity: u32) -> Self {
        Self {
            per_thread: vec![ThreadSchedState::default(); capacity as usize],
            iteration: 0,
            last_fairness_index: 1.0,
        }
    }

    pub fn priority(&self, slot: u32) -> u32 {
        self.per_thread.get(slot as usize).map_or(0, |s| s.priority)
    }

    pub fn set_priority(&mut self, slot: u32, priority: u32) {
        if let Some(s) = self.per_thread.get_mut(slot as usize) {
            s.priority = priority;
        }
    }

    pub fn last_drain_time_ns(&self, slot: u32) -> u64 {
        self.per_thread.get(slot as usize).map_or(0, |s| s.last_drain_time_ns)
    }

    /// Records that `slot` drained `events` events at time `now_ns`, then
    /// advances the iteration counter and recomputes the fairness index
    /// every 100th call.
    pub fn record_drain(&mut self, slot: u32, now_ns: u64, events: u64) -> Option<f64> {
        if let Some(s) = self.per_thread.get_mut(slot as usize) {
            s.last_drain_time_ns = now_ns;
            s.events_drained_recent += events;
        }
        self.iteration += 1;
        if self.iteration % 100 == 0 {
            self.last_fairness_index = jains_fairness_index(&self.per_thread);
            for s in &mut self.per_thread {
                s.events_drained_recent = 0;
            }
            Some(self.last_fairness_index)
        } else {
            None
        }
    }

    #[inline]
    pub fn fairness_index(&self) -> f64 {
        self.last_fairness_index
    }
}

/// `J(x) = (Σxᵢ)² / (n · Σxᵢ²)`, the standard fairness measure over a
/// vector of per-consumer shares: `1.0` when every thread got an equal
/// share of drain attention, approaching `1/n` when one thread dominates.
fn jains_fairness_index(threads: &[ThreadSchedState]) -> f64 {
    let n = threads.len();
    if n == 0 {
        return 1.0;
    }
    let sum: f64 = threads.iter().map(|s| s.events_drained_recent as f64).sum();
    if sum == 0.0 {
        return 1.0;
    }
    let sum_sq: f64 = threads.iter().map(|s| (s.events_drained_recent as f64).powi(2)).sum();
    (sum * sum) / (n as f64 * sum_sq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfectly_even_drains_yield_fairness_index_of_one() {
        let mut sched = InnerScheduler::new(4);
        for iter in 0..100 {
            for slot in 0..4 {
                let idx = sched.record_drain(slot, iter, 10);
                if iter == 99 {
                    assert!(idx.is_some());
                }
            }
        }
        assert!((sched.fairness_index() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn one_thread_dominating_lowers_fairness_index() {
        let mut sched = InnerScheduler::new(4);
        for iter in 0..100 {
            sched.record_drain(0, iter, 1000);
            sched.record_drain(1, iter, 1);
            sched.record_drain(2, iter, 1);
            sched.record_drain(3, iter, 1);
        }
        assert!(sched.fairness_index() < 0.5);
    }
}
