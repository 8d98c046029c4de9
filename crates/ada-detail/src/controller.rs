//! The detail-lane controller (§4.G): decides whether the ring currently
//! filling should be dumped (persisted) or discarded, tracks per-window
//! counters, and coordinates the non-blocking swap with the ring pool.
//!
//! No direct teacher analogue exists for this windowed mark-and-discard
//! policy; it is built in the teacher's idiom anyway: one atomic state
//! word instead of a mutex (`ringmpsc_stream::shutdown::ShutdownState`),
//! atomic fetch-add counters, and the one legitimate compare-exchange loop
//! in the whole workspace for `first_mark_timestamp_ns`'s set-once-minimum
//! (everywhere else in this workspace gets by CAS-free, per the ring's
//! reserve/commit protocol; this one genuinely needs it).

use crate::error::DetailError;
use crate::metrics::DetailMetrics;
use crate::state::DetailState;
use crate::window::WindowSnapshot;
use ada_core::DetailEvent;
use ada_mark::{MarkPolicy, Probe};
use ada_ring::RingPool;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;

/// Conservative stand-in for the platform's `PATH_MAX`; session directories
/// longer than this are rejected as an I/O failure rather than attempted.
const PATH_MAX: usize = 4096;

struct Cumulative {
    events_processed: AtomicU64,
    marked_events_detected: AtomicU64,
    selective_dumps_performed: AtomicU64,
    windows_discarded: AtomicU64,
    sum_window_duration_ns: AtomicU64,
    sum_events_per_window: AtomicU64,
    metadata_write_failures: AtomicU64,
}

impl Cumulative {
    fn new() -> Self {
        Self {
            events_processed: AtomicU64::new(0),
            marked_events_detected: AtomicU64::new(0),
            selective_dumps_performed: AtomicU64::new(0),
            windows_discarded: AtomicU64::new(0),
            sum_window_duration_ns: AtomicU64::new(0),
            sum_events_per_window: AtomicU64::new(0),
            metadata_write_failures: AtomicU64::new(0),
        }
    }
}

/// Windowed mark-and-discard controller for one detail lane.
pub struct DetailController {
    state: AtomicU8,
    window_id: AtomicU64,
    start_timestamp_ns: AtomicU64,
    total_events: AtomicU64,
    marked_events: AtomicU64,
    first_mark_timestamp_ns: AtomicU64,
    mark_seen: AtomicBool,
    cumulative: Cumulative,
    metadata_path: PathBuf,
    metadata_writer: Mutex<Option<std::io::BufWriter<std::fs::File>>>,
}

impl DetailController {
    /// Opens (or lazily prepares to open) `<session_dir>/window_metadata.jsonl`
    /// and returns a controller in the `Idle` state.
    pub fn new(session_dir: impl AsRef<Path>) -> Result<Self, DetailError> {
        let session_dir = session_dir.as_ref();
        if session_dir.as_os_str().is_empty() {
            return Err(DetailError::InvalidArgument("session_dir must not be empty"));
        }
        if session_dir.as_os_str().len() > PATH_MAX {
            return Err(DetailError::IoFailure(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "session_dir exceeds PATH_MAX",
            )));
        }
        let metadata_path = session_dir.join("window_metadata.jsonl");
        Ok(Self {
            state: AtomicU8::new(DetailState::Idle as u8),
            window_id: AtomicU64::new(0),
            start_timestamp_ns: AtomicU64::new(0),
            total_events: AtomicU64::new(0),
            marked_events: AtomicU64::new(0),
            first_mark_timestamp_ns: AtomicU64::new(0),
            mark_seen: AtomicBool::new(false),
            cumulative: Cumulative::new(),
            metadata_path,
            metadata_writer: Mutex::new(None),
        })
    }

    #[inline]
    fn state(&self) -> DetailState {
        DetailState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    fn set_state(&self, s: DetailState) {
        self.state.store(s as u8, Ordering::Release);
    }

    fn reset_window_locked(&self, t0: u64) {
        self.window_id.fetch_add(1, Ordering::Relaxed);
        self.start_timestamp_ns.store(t0, Ordering::Relaxed);
        self.total_events.store(0, Ordering::Relaxed);
        self.marked_events.store(0, Ordering::Relaxed);
        self.first_mark_timestamp_ns.store(0, Ordering::Relaxed);
        self.mark_seen.store(false, Ordering::Release);
        self.set_state(DetailState::Open);
    }

    /// `IDLE → OPEN`: resets counters and records the window start time.
    pub fn start_window(&self, t0: u64) -> Result<(), DetailError> {
        if self.state() != DetailState::Idle {
            return Err(DetailError::State);
        }
        self.reset_window_locked(t0);
        Ok(())
    }

    /// `OPEN → OPEN`: always bumps `total_events`; if `probe` matches
    /// `policy`, bumps `marked_events`, sets `mark_seen`, set-once-minimums
    /// `first_mark_timestamp_ns`, and signals the pool's sticky mark bit.
    pub fn mark_event(&self, probe: &Probe<'_>, t: u64, policy: &MarkPolicy, pool: &RingPool<DetailEvent>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if !policy.matches(probe) {
            return;
        }
        self.marked_events.fetch_add(1, Ordering::Relaxed);
        self.mark_seen.store(true, Ordering::Release);
        pool.mark_detail();

        let mut current = self.first_mark_timestamp_ns.load(Ordering::Acquire);
        loop {
            let candidate = if current == 0 { t } else { current.min(t) };
            if candidate == current {
                break;
            }
            match self.first_mark_timestamp_ns.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// `OPEN → DUMP_READY` / `OPEN → DISCARD`: call once the active ring has
    /// filled. `t` is used as the re-arm timestamp when the window is
    /// discarded rather than dumped. Returns `true` exactly when a dump
    /// should proceed (mirroring the spec's guard: both "ring is full" and
    /// "mark seen, and the lane's own mark bit still set").
    pub fn should_dump(&self, t: u64, pool: &RingPool<DetailEvent>) -> bool {
        if self.state() != DetailState::Open {
            return false;
        }
        if !pool.active_ring().is_full() {
            return false;
        }
        if self.mark_seen.load(Ordering::Acquire) && pool.is_detail_marked() {
            self.set_state(DetailState::DumpReady);
            true
        } else {
            self.cumulative.windows_discarded.fetch_add(1, Ordering::Relaxed);
            self.reset_window_locked(t);
            false
        }
    }

    /// `DUMP_READY → CLOSED`: snapshots the window. `t1` must be at or
    /// after the window's start time.
    pub fn close_window_for_dump(&self, t1: u64) -> Result<WindowSnapshot, DetailError> {
        if self.state() != DetailState::DumpReady {
            return Err(DetailError::State);
        }
        let start = self.start_timestamp_ns.load(Ordering::Relaxed);
        if t1 < start {
            return Err(DetailError::InvalidArgument("end timestamp precedes window start"));
        }
        let snapshot = WindowSnapshot {
            window_id: self.window_id.load(Ordering::Relaxed),
            start_timestamp_ns: start,
            end_timestamp_ns: t1,
            total_events: self.total_events.load(Ordering::Relaxed),
            marked_events: self.marked_events.load(Ordering::Relaxed),
            first_mark_timestamp_ns: self.first_mark_timestamp_ns.load(Ordering::Relaxed),
            mark_seen: self.mark_seen.load(Ordering::Acquire),
        };
        self.set_state(DetailState::Closed);
        Ok(snapshot)
    }

    /// `CLOSED → DUMPED`: swaps the pool's active ring, returning the
    /// retired ring's index so the caller can hand it to the drain worker.
    pub fn perform_selective_swap(&self, pool: &RingPool<DetailEvent>) -> Result<u32, DetailError> {
        if self.state() != DetailState::Closed {
            return Err(DetailError::State);
        }
        let retired = pool.swap_active().map_err(|_| DetailError::State)?;
        self.set_state(DetailState::Dumped);
        Ok(retired)
    }

    /// `DUMPED → IDLE`: advances cumulative metrics and clears the pool's
    /// mark bit, ready for the next `start_window`.
    pub fn mark_dump_complete(&self, window: &WindowSnapshot, pool: &RingPool<DetailEvent>) -> Result<(), DetailError> {
        if self.state() != DetailState::Dumped {
            return Err(DetailError::State);
        }
        self.cumulative
            .events_processed
            .fetch_add(window.total_events, Ordering::Relaxed);
        self.cumulative
            .marked_events_detected
            .fetch_add(window.marked_events, Ordering::Relaxed);
        self.cumulative.selective_dumps_performed.fetch_add(1, Ordering::Relaxed);
        self.cumulative
            .sum_window_duration_ns
            .fetch_add(window.end_timestamp_ns.saturating_sub(window.start_timestamp_ns), Ordering::Relaxed);
        self.cumulative
            .sum_events_per_window
            .fetch_add(window.total_events, Ordering::Relaxed);
        pool.clear_mark();
        self.set_state(DetailState::Idle);
        Ok(())
    }

    /// Appends one JSON line for `window` to `window_metadata.jsonl`,
    /// opening the writer on first use. Failures bump
    /// `metadata_write_failures` and surface as `IoFailure`.
    pub fn write_window_metadata(&self, window: &WindowSnapshot) -> Result<(), DetailError> {
        let result = (|| -> std::io::Result<()> {
            let mut guard = self.metadata_writer.lock().expect("metadata writer mutex poisoned");
            if guard.is_none() {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.metadata_path)?;
                *guard = Some(std::io::BufWriter::new(file));
            }
            let writer = guard.as_mut().expect("just initialized");
            serde_json::to_writer(&mut *writer, window)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            Ok(())
        })();

        result.map_err(|e| {
            self.cumulative.metadata_write_failures.fetch_add(1, Ordering::Relaxed);
            DetailError::IoFailure(std::io::Error::new(e.kind(), e.to_string()))
        })
    }

    /// Snapshots cumulative metrics. Averages divide by `dumps + discards`,
    /// `0.0` when neither has happened yet.
    pub fn collect_metrics(&self) -> DetailMetrics {
        let dumps = self.cumulative.selective_dumps_performed.load(Ordering::Relaxed);
        let discards = self.cumulative.windows_discarded.load(Ordering::Relaxed);
        let windows = dumps + discards;
        let sum_duration = self.cumulative.sum_window_duration_ns.load(Ordering::Relaxed);
        let sum_events = self.cumulative.sum_events_per_window.load(Ordering::Relaxed);
        DetailMetrics {
            events_processed: self.cumulative.events_processed.load(Ordering::Relaxed),
            marked_events_detected: self.cumulative.marked_events_detected.load(Ordering::Relaxed),
            selective_dumps_performed: dumps,
            windows_discarded: discards,
            avg_window_duration_ns: if windows == 0 { 0.0 } else { sum_duration as f64 / windows as f64 },
            avg_events_per_window: if windows == 0 { 0.0 } else { sum_events as f64 / windows as f64 },
            metadata_write_failures: self.cumulative.metadata_write_failures.load(Ordering::Relaxed),
        }
    }
}
