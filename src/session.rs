//! Wires one of each piece — registry, marking policy, per-slot detail
//! controllers, trace writer, drain worker, shutdown coordinator — into
//! the single handle a real embedding controller process would hold.

use crate::error::SessionError;
use ada_config::TracerConfig;
use ada_core::{DetailEvent, EventKind, FunctionId, IndexEvent};
use ada_detail::DetailController;
use ada_drain::{DrainConfig, DrainWorker, EventSink, SchedulingPolicy};
use ada_mark::{MarkPolicy, Probe};
use ada_registry::{LaneSizing, ThreadRegistry};
use ada_shutdown::{ShutdownCoordinator, ShutdownHooks, ShutdownReason, ShutdownSummary};
use ada_writer::{TraceWriter, TraceWriterConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as u64
}

/// Construction knobs beyond the validated [`TracerConfig`]: things that
/// are process-identity (`pid`) or capacity-planning (`registry_capacity`,
/// `lane_sizing`) rather than recognized tracer options.
#[derive(Clone)]
pub struct SessionConfig {
    pub pid: u32,
    pub session_id: Option<u64>,
    pub registry_capacity: u32,
    pub lane_sizing: LaneSizing,
    pub drain_policy: SchedulingPolicy,
    pub drain_config: DrainConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pid: std::process::id(),
            session_id: None,
            registry_capacity: 64,
            lane_sizing: LaneSizing::default(),
            drain_policy: SchedulingPolicy::RoundRobin,
            drain_config: DrainConfig::default(),
        }
    }
}

/// One running trace session: owns the registry, the compiled marking
/// policy, one [`DetailController`] per slot that has a detail lane, the
/// trace writer, a background drain worker, and the shutdown coordinator
/// that stops all of it.
pub struct Session {
    registry: Arc<ThreadRegistry>,
    policy: Arc<MarkPolicy>,
    writer: Arc<TraceWriter>,
    detail_controllers: Mutex<HashMap<u32, Arc<DetailController>>>,
    shutdown: Arc<ShutdownCoordinator>,
    drain_thread: Mutex<Option<JoinHandle<()>>>,
    next_thread_id: AtomicU64,
}

impl Session {
    /// Validates `config`, opens the trace writer, compiles the marking
    /// policy from its triggers, and starts a background drain worker.
    /// Returns a `Session` ready for `register_thread`/`record_*` calls.
    pub fn start(config: &TracerConfig, session_config: SessionConfig) -> Result<Arc<Self>, SessionError> {
        let writer = Arc::new(TraceWriter::new(TraceWriterConfig {
            output_root: config.output_dir.clone().into(),
            session_label: None,
            pid: session_config.pid,
            session_id: session_config.session_id,
            enable_manifest: true,
        })?);
        writer.write_trace_start(now_ns(), 0, "", &[])?;

        let mark_specs = config.triggers.iter().cloned().filter_map(ada_config::TriggerConfig::into_mark_spec).collect();
        let policy = Arc::new(MarkPolicy::build(mark_specs));

        let registry = Arc::new(ThreadRegistry::new(session_config.registry_capacity, session_config.lane_sizing));

        let sink: Arc<dyn EventSink> = writer.clone();
        let mut worker = DrainWorker::new(
            Arc::clone(&registry),
            Some(sink),
            session_config.drain_policy,
            session_config.drain_config,
        );
        let drain_control = worker.control();
        let drain_thread = std::thread::Builder::new()
            .name("ada-drain".into())
            .spawn(move || worker.run_until_stopped(now_ns))
            .map_err(|_| SessionError::InvalidArgument("failed to spawn drain worker thread"))?;

        let shutdown = Arc::new(ShutdownCoordinator::new(
            Arc::clone(&registry),
            Some(drain_control),
            Some(Arc::clone(&writer)),
            ShutdownHooks::default(),
        ));

        tracing::info!(
            pid = session_config.pid,
            session_id = session_config.session_id,
            output_dir = %config.output_dir,
            "session started"
        );

        Ok(Arc::new(Self {
            registry,
            policy,
            writer,
            detail_controllers: Mutex::new(HashMap::new()),
            shutdown,
            drain_thread: Mutex::new(Some(drain_thread)),
            next_thread_id: AtomicU64::new(1),
        }))
    }

    /// Registers the calling thread, opening a [`DetailController`] for its
    /// slot if it was sized with a detail lane. `thread_id` is whatever the
    /// caller's platform uses to identify the OS thread; idempotent the
    /// same way [`ThreadRegistry::register`] is.
    pub fn register_thread(&self, thread_id: u32) -> Result<u32, SessionError> {
        let slot_idx = self.registry.register(thread_id)?;
        tracing::debug!(thread_id, slot_idx, "thread registered");
        let slot = self
            .registry
            .get_thread_at(slot_idx)
            .expect("just-registered slot is always active");
        if slot.detail.is_some() {
            let mut controllers = self.detail_controllers.lock().expect("detail controller map poisoned");
            if !controllers.contains_key(&slot_idx) {
                // Left `Idle`: `record_detail` opens the first window itself,
                // using that first event's own timestamp as the window
                // start rather than this registration moment's wall clock.
                let controller = Arc::new(DetailController::new(self.writer.session_dir())?);
                controllers.insert(slot_idx, controller);
            }
        }
        Ok(slot_idx)
    }

    /// Writes one Index-lane record for `slot_idx`. A no-op on the data
    /// plane beyond the ring write itself — probing against the marking
    /// policy only happens when a detail lane is present, via
    /// `record_detail`.
    pub fn record_index(&self, slot_idx: u32, function_id: FunctionId, thread_id: u32, kind: EventKind, call_depth: u16) {
        let Some(slot) = self.registry.get_thread_at(slot_idx) else {
            return;
        };
        if !slot.is_accepting() {
            return;
        }
        let event = IndexEvent::new(now_ns(), function_id, thread_id, kind, call_depth);
        let _ = slot.index.write(&event);
    }

    /// Runs one call/return event through the full detail-lane pipeline:
    /// writes the event, checks it against the marking policy, and — once
    /// the active detail ring fills — either hands the window to the drain
    /// worker (marked) or discards it in place and re-arms (unmarked).
    /// A no-op if `slot_idx`'s lane set has no detail lane.
    pub fn record_detail(&self, slot_idx: u32, probe: &Probe<'_>, event: DetailEvent) -> Result<(), SessionError> {
        let Some(slot) = self.registry.get_thread_at(slot_idx) else {
            return Ok(());
        };
        if !slot.is_accepting() {
            return Ok(());
        }
        let Some(lane) = &slot.detail else {
            return Ok(());
        };
        let controller = {
            let controllers = self.detail_controllers.lock().expect("detail controller map poisoned");
            controllers.get(&slot_idx).cloned()
        };
        let Some(controller) = controller else {
            return Ok(());
        };

        let timestamp_ns = event.timestamp_ns;
        // Idempotent: only takes effect the first time this lane is used,
        // or again right after a dump leaves the controller `Idle`. A
        // window already `Open` rejects the redundant call with `State`,
        // which is exactly the "nothing to do" case here.
        let _ = controller.start_window(timestamp_ns);
        let _ = lane.write(&event);
        controller.mark_event(probe, timestamp_ns, &self.policy, lane.pool());

        if !lane.pool().active_ring().is_full() {
            return Ok(());
        }
        if !controller.should_dump(timestamp_ns, lane.pool()) {
            // Discarded in place: the active ring stays full of stale data
            // until the next write rotates it via the generic pool path,
            // so drain it back to empty right here instead.
            let mut scratch = vec![DetailEvent::default(); lane.pool().active_ring().capacity()];
            loop {
                if lane.pool().active_ring().read_batch(&mut scratch, scratch.len()) == 0 {
                    break;
                }
            }
            return Ok(());
        }

        let snapshot = controller.close_window_for_dump(timestamp_ns)?;
        controller.perform_selective_swap(lane.pool())?;
        controller.mark_dump_complete(&snapshot, lane.pool())?;
        controller.write_window_metadata(&snapshot)?;
        // `mark_dump_complete` leaves the controller `Idle`; re-arm
        // immediately so the next event on this lane has an `Open` window
        // to accumulate into, the same way the discard path's internal
        // `reset_window_locked` re-arms itself.
        controller.start_window(timestamp_ns)?;
        Ok(())
    }

    /// Allocates the next synthetic thread id for callers that don't
    /// already have one of their own (tests, simple embeddings).
    pub fn next_thread_id(&self) -> u32 {
        self.next_thread_id.fetch_add(1, Ordering::Relaxed) as u32
    }

    #[inline]
    pub fn registry(&self) -> &Arc<ThreadRegistry> {
        &self.registry
    }

    #[inline]
    pub fn writer(&self) -> &Arc<TraceWriter> {
        &self.writer
    }

    #[inline]
    pub fn shutdown_coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Requests and runs the phased shutdown sequence, then joins the
    /// background drain thread (which the sequence's own stop/poll step
    /// has already driven to its final drain and a `Stopped` state).
    pub fn shutdown(&self, reason: ShutdownReason) -> Result<ShutdownSummary, SessionError> {
        tracing::info!(?reason, "session shutdown requested");
        self.shutdown.request_shutdown(reason);
        let summary = self.shutdown.execute()?;
        if let Some(handle) = self.drain_thread.lock().expect("drain thread handle poisoned").take() {
            let _ = handle.join();
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ada_config::RawTracerConfig;
    use ada_core::DETAIL_ARG_REGISTERS;
    use ada_mark::{MatchKind, MatchTarget};

    fn config_in(dir: &std::path::Path) -> TracerConfig {
        TracerConfig::validate(RawTracerConfig {
            output_dir: dir.to_string_lossy().into_owned(),
            duration_seconds: 60,
            stack_bytes: 128,
            pre_roll_seconds: 1,
            post_roll_seconds: 1,
            triggers: vec!["symbol=critical".to_string()],
            exclude: vec![],
        })
        .unwrap()
    }

    fn session_config() -> SessionConfig {
        SessionConfig {
            pid: 4242,
            session_id: Some(7),
            registry_capacity: 4,
            lane_sizing: LaneSizing {
                index_ring_count: 2,
                index_ring_capacity: 16,
                detail_ring_count: 2,
                detail_ring_capacity: 4,
            },
            drain_policy: SchedulingPolicy::RoundRobin,
            drain_config: DrainConfig {
                poll_interval_us: 200,
                ..DrainConfig::default()
            },
        }
    }

    #[test]
    fn registers_a_thread_and_opens_a_detail_controller() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::start(&config_in(dir.path()), session_config()).unwrap();
        let slot = session.register_thread(11).unwrap();
        assert!(session.detail_controllers.lock().unwrap().contains_key(&slot));
        session.shutdown(ShutdownReason::Api).unwrap();
    }

    #[test]
    fn index_events_reach_the_writer_after_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::start(&config_in(dir.path()), session_config()).unwrap();
        let slot = session.register_thread(1).unwrap();
        for _ in 0..10 {
            session.record_index(slot, FunctionId::new(0, 1), 1, EventKind::Call, 0);
        }
        let summary = session.shutdown(ShutdownReason::Api).unwrap();
        assert!(summary.total_events_processed >= 10);
    }

    fn fill_detail_window(session: &Session, slot: u32, capacity: usize, mark_first: bool, base: u64) {
        for i in 0..capacity as u64 {
            let probe = if mark_first && i == 0 {
                Probe {
                    symbol: "critical",
                    module: "m",
                    message: "",
                }
            } else {
                Probe {
                    symbol: "other",
                    module: "m",
                    message: "",
                }
            };
            let event = DetailEvent::new(
                base + i,
                FunctionId::new(0, 1),
                1,
                EventKind::Call,
                0,
                [0; DETAIL_ARG_REGISTERS],
                0,
                0,
                0,
                [0; ada_core::STACK_SNAPSHOT_BYTES],
                0,
            );
            session.record_detail(slot, &probe, event).unwrap();
        }
    }

    #[test]
    fn marked_detail_window_survives_to_a_dump_and_unmarked_one_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::start(&config_in(dir.path()), session_config()).unwrap();
        let slot = session.register_thread(1).unwrap();

        let capacity = {
            let slot_ref = session.registry().get_thread_at(slot).unwrap();
            slot_ref.detail.as_ref().unwrap().pool().active_ring().capacity()
        };

        // First window: marked, so it must survive to a selective dump.
        fill_detail_window(&session, slot, capacity, true, 0);
        // Second window: nothing matches, so it is discarded in place and
        // the active ring is re-armed without ever reaching the drain
        // worker.
        fill_detail_window(&session, slot, capacity, false, capacity as u64);

        let controller = {
            let controllers = session.detail_controllers.lock().unwrap();
            Arc::clone(controllers.get(&slot).unwrap())
        };
        let metrics = controller.collect_metrics();
        assert_eq!(metrics.selective_dumps_performed, 1);
        assert_eq!(metrics.windows_discarded, 1);

        let summary = session.shutdown(ShutdownReason::Api).unwrap();
        assert_eq!(summary.threads_flushed, summary.threads_total);
    }

    #[test]
    fn matches_literal_trigger_target_from_config() {
        // Sanity check that the trigger parsed from config actually compiles
        // against the symbol-matching path, not just that `MarkPolicy::build`
        // accepts it.
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(dir.path());
        let spec = cfg.triggers[0].clone().into_mark_spec().unwrap();
        assert_eq!(spec.target, Some(MatchTarget::Symbol));
        assert_eq!(spec.match_kind, MatchKind::Literal);
    }
}
