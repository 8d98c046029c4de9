//! The one-shot human-readable shutdown summary (§4.J step 6).

use crate::phase::ShutdownReason;
use std::fmt;
use std::time::Duration;

/// Everything `execute`'s final step reports, both as a human-readable
/// [`fmt::Display`] and as plain fields a caller can log structurally.
#[derive(Debug, Clone)]
pub struct ShutdownSummary {
    pub reason: ShutdownReason,
    pub duration: Duration,
    pub total_events_processed: u64,
    pub events_in_flight: u64,
    pub bytes_written: u64,
    pub write_errors: u32,
    pub files_synced: u32,
    pub threads_flushed: u32,
    pub threads_total: u32,
}

impl fmt::Display for ShutdownSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Shutdown Summary ({})", ShutdownReason::label(self.reason.kind()))?;
        writeln!(f, "Duration: {:.3}s", self.duration.as_secs_f64())?;
        writeln!(f, "Total Events Processed: {}", self.total_events_processed)?;
        writeln!(f, "Events In Flight at Shutdown: {}", self.events_in_flight)?;
        writeln!(f, "Bytes Written: {}", self.bytes_written)?;
        writeln!(f, "Write Errors: {}", self.write_errors)?;
        writeln!(f, "Files Synced: {}", self.files_synced)?;
        write!(f, "Threads Flushed: {}/{}", self.threads_flushed, self.threads_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_contains_the_exact_labeled_lines_scenario_6_checks_for() {
        let summary = ShutdownSummary {
            reason: ShutdownReason::Signal(15),
            duration: Duration::from_millis(42),
            total_events_processed: 1234,
            events_in_flight: 8,
            bytes_written: 5678,
            write_errors: 0,
            files_synced: 2,
            threads_flushed: 2,
            threads_total: 2,
        };
        let text = summary.to_string();
        assert!(text.contains("Total Events Processed: 1234"));
        assert!(text.contains("Events In Flight at Shutdown: 8"));
        assert!(text.contains("Files Synced: 2"));
        assert!(text.contains("Threads Flushed: 2/2"));
    }
}
