/// Cumulative counters for one drain worker. Plain `u64`s, not atomics: the
/// worker is a single cooperative thread, so there's no concurrent writer
/// to guard against, matching the teacher's `BatchMetrics` rationale for
/// sequential-only consumers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainMetrics {
    pub cycles_run: u64,
    pub rings_drained: u64,
    pub events_drained: u64,
    pub writer_failures: u64,
    pub fairness_switches: u64,
}
