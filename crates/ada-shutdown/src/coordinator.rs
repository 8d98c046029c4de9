//! The shutdown coordinator (§4.J): drives the phased
//! `IDLE → SIGNAL_RECEIVED → DRAINING → FSYNCING → COMPLETED` sequence,
//! exactly once, no matter how many callers (a signal handler, an explicit
//! API caller, a timer) ask for it.

use crate::error::ShutdownError;
use crate::phase::{ShutdownPhase, ShutdownReason};
use crate::summary::ShutdownSummary;
use ada_drain::DrainControl;
use ada_registry::ThreadRegistry;
use ada_writer::TraceWriter;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicPtr, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long `execute` waits, between checks, for the drain worker to report
/// `DrainControl::is_stopped` before giving up and proceeding anyway.
const STOP_DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(5);
/// Upper bound on how many times `execute` polls before proceeding without
/// confirmation — a drain worker that never stops shouldn't wedge shutdown
/// forever.
const STOP_DRAIN_MAX_POLLS: u32 = 200;

/// Injected operations the coordinator calls during its sequence. Each is
/// optional: a caller that never armed a timer, or never wired a wakeup
/// fd, just leaves the corresponding field `None`.
#[derive(Default)]
pub struct ShutdownHooks {
    pub cancel_timer: Option<Box<dyn Fn() + Send + Sync>>,
    /// Breaks a sleeping main loop out of its wait, e.g. by writing to an
    /// eventfd-like descriptor. Called from `notify_signal`, so it must be
    /// async-signal-safe if that path is actually driven from a signal
    /// handler.
    pub wakeup: Option<Box<dyn Fn() + Send + Sync>>,
}

/// Drives one shutdown sequence for one session. Construct one per
/// controller process; `execute` runs its phased sequence exactly once.
pub struct ShutdownCoordinator {
    phase: AtomicU8,
    executing: AtomicBool,
    request_count: AtomicU64,
    last_signal: AtomicI32,
    last_reason_kind: AtomicU8,
    registry: Arc<ThreadRegistry>,
    drain_control: Option<DrainControl>,
    writer: Option<Arc<TraceWriter>>,
    hooks: ShutdownHooks,
    started_at: Instant,
}

impl ShutdownCoordinator {
    pub fn new(
        registry: Arc<ThreadRegistry>,
        drain_control: Option<DrainControl>,
        writer: Option<Arc<TraceWriter>>,
        hooks: ShutdownHooks,
    ) -> Self {
        Self {
            phase: AtomicU8::new(ShutdownPhase::Idle as u8),
            executing: AtomicBool::new(false),
            request_count: AtomicU64::new(0),
            last_signal: AtomicI32::new(0),
            last_reason_kind: AtomicU8::new(ShutdownReason::Api.kind()),
            registry,
            drain_control,
            writer,
            hooks,
            started_at: Instant::now(),
        }
    }

    #[inline]
    pub fn phase(&self) -> ShutdownPhase {
        ShutdownPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    #[inline]
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn last_signal(&self) -> i32 {
        self.last_signal.load(Ordering::Relaxed)
    }

    fn record_request(&self, reason: ShutdownReason) -> bool {
        let became_owner = self
            .phase
            .compare_exchange(
                ShutdownPhase::Idle as u8,
                ShutdownPhase::SignalReceived as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if let ShutdownReason::Signal(signal) = reason {
            self.last_signal.store(signal, Ordering::Relaxed);
        }
        self.last_reason_kind.store(reason.kind(), Ordering::Relaxed);
        self.request_count.fetch_add(1, Ordering::Relaxed);
        became_owner
    }

    /// The only path meant to run inside an actual signal handler: atomic
    /// loads/stores and an optional wakeup call, nothing else. Idempotent;
    /// a second signal during shutdown just updates `last_signal` and bumps
    /// the request counter without re-entering the phased sequence.
    pub fn notify_signal(&self, signal: i32) {
        self.record_request(ShutdownReason::Signal(signal));
        if let Some(wakeup) = &self.hooks.wakeup {
            wakeup();
        }
    }

    /// Requests shutdown from ordinary (non-signal-handler) code. Returns
    /// `true` if this call is the one that must drive `execute` — i.e. the
    /// first call past `IDLE`. Subsequent calls (including ones racing a
    /// concurrent signal) still update `last_reason`/`last_signal` and the
    /// request counter, matching the idempotent `request_shutdown`
    /// contract, but return `false`.
    pub fn request_shutdown(&self, reason: ShutdownReason) -> bool {
        self.record_request(reason)
    }

    /// Runs the six-step phased sequence exactly once, returning the final
    /// summary. Fails with [`ShutdownError::State`] if shutdown was never
    /// requested, or if another caller is already running (or has already
    /// run) this sequence.
    pub fn execute(&self) -> Result<ShutdownSummary, ShutdownError> {
        if self.phase() == ShutdownPhase::Idle {
            return Err(ShutdownError::State);
        }
        if self.executing.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(ShutdownError::State);
        }

        // Snapshot what the writer has processed so far, and how many
        // events are still sitting un-drained in the rings, before the
        // final drain below moves any of those in-flight events into the
        // writer. "Total Events Processed" and "Events In Flight" are
        // deliberately disjoint counts taken at the same instant, not
        // before/after views of the same number.
        let (total_events_processed, bytes_written) =
            self.writer.as_ref().map_or((0, 0), |w| (w.event_count(), w.bytes_written()));

        // Step 2 (ordered before step 1's cancel here; the sequence's
        // externally observable effects don't depend on which runs first):
        // stop producers from adding more, after snapshotting what they'd
        // already queued.
        let mut threads_total = 0u32;
        let mut events_in_flight = 0u64;
        for slot in self.registry.iter_active() {
            threads_total += 1;
            slot.mark_non_accepting();
            events_in_flight += slot.index.pending_events();
            if let Some(detail) = &slot.detail {
                events_in_flight += detail.pending_events();
            }
        }

        // Step 1: cancel any active timers.
        if let Some(cancel_timer) = &self.hooks.cancel_timer {
            cancel_timer();
        }

        // Step 3: force a final drain, waiting (bounded) for confirmation.
        self.phase.store(ShutdownPhase::Draining as u8, Ordering::Release);
        if let Some(control) = &self.drain_control {
            control.stop();
            let mut polls = 0;
            while !control.is_stopped() && polls < STOP_DRAIN_MAX_POLLS {
                std::thread::sleep(STOP_DRAIN_POLL_INTERVAL);
                polls += 1;
            }
        } else {
            std::thread::sleep(STOP_DRAIN_POLL_INTERVAL);
        }

        let mut threads_flushed = 0u32;
        for slot in self.registry.iter_active() {
            let remaining = slot.index.pending_events() + slot.detail.as_ref().map_or(0, |d| d.pending_events());
            if remaining == 0 {
                threads_flushed += 1;
            }
        }

        // Step 4: fsync the events file, then step 5: finalize the writer
        // (manifest emission, itself tmp+fsync+rename). Each successful
        // sync counts toward `files_synced`.
        self.phase.store(ShutdownPhase::Fsyncing as u8, Ordering::Release);
        let mut files_synced = 0u32;
        let write_errors = if let Some(writer) = &self.writer {
            if writer.flush().is_ok() {
                files_synced += 1;
            }
            if writer.finalize().is_ok() {
                files_synced += 1;
            }
            writer.write_errors()
        } else {
            0
        };

        self.phase.store(ShutdownPhase::Completed as u8, Ordering::Release);

        let summary = ShutdownSummary {
            reason: match self.last_reason_kind.load(Ordering::Relaxed) {
                1 => ShutdownReason::Api,
                2 => ShutdownReason::Timer,
                _ => ShutdownReason::Signal(self.last_signal()),
            },
            duration: self.started_at.elapsed(),
            total_events_processed,
            events_in_flight,
            bytes_written,
            write_errors,
            files_synced,
            threads_flushed,
            threads_total,
        };
        tracing::info!(%summary, "shutdown complete");
        Ok(summary)
    }
}

/// Process-wide pointer the (real) signal handler reads. `install` and
/// `notify_from_signal_handler` are the only two operations on it; both are
/// plain atomic pointer loads/stores.
static MANAGER: AtomicPtr<ShutdownCoordinator> = AtomicPtr::new(std::ptr::null_mut());

/// Publishes `coordinator` as the process-wide manager a signal handler
/// installed via `notify_from_signal_handler` will reach. Leaks the `Arc`'s
/// strong count into the raw pointer deliberately: the coordinator must
/// outlive any signal that can still arrive, which in practice means the
/// lifetime of the process.
pub fn install(coordinator: &Arc<ShutdownCoordinator>) {
    let ptr = Arc::into_raw(Arc::clone(coordinator)) as *mut ShutdownCoordinator;
    let previous = MANAGER.swap(ptr, Ordering::AcqRel);
    if !previous.is_null() {
        // SAFETY: `previous` was produced by an earlier `Arc::into_raw` in
        // this same function, and is no longer reachable through `MANAGER`
        // after the swap above, so reclaiming its strong count here is safe.
        unsafe {
            drop(Arc::from_raw(previous));
        }
    }
}

/// Entry point a real signal handler calls. Async-signal-safe: an atomic
/// pointer load plus whatever `notify_signal` does (atomic stores and an
/// optional injected wakeup call).
pub fn notify_from_signal_handler(signal: i32) {
    let ptr = MANAGER.load(Ordering::Acquire);
    if ptr.is_null() {
        return;
    }
    // SAFETY: `ptr` was published by `install` from a live `Arc` and is
    // never freed while still reachable through `MANAGER`.
    let coordinator = unsafe { &*ptr };
    coordinator.notify_signal(signal);
}
