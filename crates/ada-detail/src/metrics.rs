/// Cumulative selective-persistence metrics, shaped after
/// `original_source/selective_persistence/metrics.h`'s
/// `SelectivePersistenceMetrics`, returned from `collect_metrics` (§4.G).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DetailMetrics {
    pub events_processed: u64,
    pub marked_events_detected: u64,
    pub selective_dumps_performed: u64,
    pub windows_discarded: u64,
    pub avg_window_duration_ns: f64,
    pub avg_events_per_window: f64,
    pub metadata_write_failures: u64,
}

impl DetailMetrics {
    /// Fraction of processed events that matched the marking policy. The
    /// original exposes this as a derived convenience over the same
    /// counters rather than dedicated state; zero events guards against a
    /// `0/0`.
    #[must_use]
    pub fn mark_rate(&self) -> f64 {
        if self.events_processed == 0 {
            0.0
        } else {
            self.marked_events_detected as f64 / self.events_processed as f64
        }
    }

    /// Fraction of closed windows that resulted in a dump rather than a
    /// discard.
    #[must_use]
    pub fn dump_success_ratio(&self) -> f64 {
        let closed_windows = self.selective_dumps_performed + self.windows_discarded;
        if closed_windows == 0 {
            0.0
        } else {
            self.selective_dumps_performed as f64 / closed_windows as f64
        }
    }

    /// Rough estimate of how much of total event volume ended up persisted
    /// via a selective dump, as a fraction of events processed — a proxy
    /// for the storage/IO overhead the selective-persistence policy adds
    /// over an index-only trace.
    #[must_use]
    pub fn estimated_overhead(&self) -> f64 {
        if self.events_processed == 0 {
            0.0
        } else {
            self.selective_dumps_performed as f64 / self.events_processed as f64
        }
    }
}
