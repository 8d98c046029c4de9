/// Tunables for one drain worker, grounded in
/// `ringmpsc_stream::config::StreamConfig`'s `poll_interval`/`batch_hint`
/// pair — the same "hybrid polling as a safety net" tradeoff, applied here
/// synchronously instead of against a `tokio` stream.
#[derive(Debug, Clone, Copy)]
pub struct DrainConfig {
    /// Maximum rings drained per lane per thread visited in one cycle.
    pub max_batch_size: usize,
    /// Maximum events drained per lane per thread visited in one cycle
    /// before yielding to the next thread, even if more rings are queued.
    pub fairness_quantum: usize,
    /// Sleep duration on an idle cycle (nothing to drain anywhere).
    pub poll_interval_us: u64,
    /// Whether to track the optional per-thread Jain's-fairness scheduler
    /// alongside whichever `SchedulingPolicy` is selected.
    pub track_inner_fairness: bool,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 4,
            fairness_quantum: 4096,
            poll_interval_us: 500,
            track_inner_fairness: false,
        }
    }
}
