//! End-to-end pipeline tests driving a real [`Session`] across real threads
//! and verifying the artifacts it leaves on disk, the way the teacher's own
//! top-level `tests/integration_tests.rs` drives a real `Channel` across
//! real producer threads instead of exercising one component in isolation.

use ada_tracer::{
    DrainConfig, EventKind, FunctionId, LaneSizing, Probe, RawTracerConfig, SchedulingPolicy, Session, SessionConfig,
    ShutdownReason, TracerConfig, DETAIL_ARG_REGISTERS, STACK_SNAPSHOT_BYTES,
};
use std::sync::Arc;
use std::thread;

fn config_in(dir: &std::path::Path, triggers: Vec<String>) -> TracerConfig {
    TracerConfig::validate(RawTracerConfig {
        output_dir: dir.to_string_lossy().into_owned(),
        duration_seconds: 60,
        stack_bytes: 128,
        pre_roll_seconds: 1,
        post_roll_seconds: 1,
        triggers,
        exclude: vec![],
    })
    .unwrap()
}

fn session_config() -> SessionConfig {
    SessionConfig {
        pid: 9000,
        session_id: Some(0xfeed),
        registry_capacity: 8,
        lane_sizing: LaneSizing {
            index_ring_count: 2,
            index_ring_capacity: 64,
            detail_ring_count: 2,
            detail_ring_capacity: 8,
        },
        drain_policy: SchedulingPolicy::RoundRobin,
        drain_config: DrainConfig {
            poll_interval_us: 200,
            ..DrainConfig::default()
        },
    }
}

fn make_detail_event(timestamp_ns: u64, thread_id: u32) -> ada_tracer::DetailEvent {
    ada_tracer::DetailEvent::new(
        timestamp_ns,
        FunctionId::new(0, 1),
        thread_id,
        EventKind::Call,
        0,
        [0; DETAIL_ARG_REGISTERS],
        0,
        0,
        0,
        [0; STACK_SNAPSHOT_BYTES],
        0,
    )
}

/// Several threads register and record index events concurrently, then the
/// session is shut down. The events land on disk in a parseable,
/// length-delimited stream, and the JSON manifest next to it reports a
/// matching event count.
#[test]
fn concurrent_threads_reach_the_writer_and_the_manifest_reports_them() {
    const N_THREADS: u32 = 4;
    const EVENTS_PER_THREAD: u32 = 200;

    let dir = tempfile::tempdir().unwrap();
    let session = Session::start(&config_in(dir.path(), vec![]), session_config()).unwrap();

    let mut handles = Vec::new();
    for thread_id in 0..N_THREADS {
        let session = Arc::clone(&session);
        handles.push(thread::spawn(move || {
            let slot = session.register_thread(thread_id).unwrap();
            for i in 0..EVENTS_PER_THREAD {
                let kind = if i % 2 == 0 { EventKind::Call } else { EventKind::Return };
                session.record_index(slot, FunctionId::new(0, thread_id), thread_id, kind, 0);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let summary = session.shutdown(ShutdownReason::Api).unwrap();
    assert_eq!(summary.threads_total, N_THREADS);
    assert_eq!(summary.threads_flushed, N_THREADS);

    let writer = session.writer();
    let events_path = writer.events_path();
    assert!(events_path.exists(), "events.bin should have been created");
    let bytes = std::fs::read(events_path).unwrap();
    assert!(!bytes.is_empty(), "events.bin should not be empty after recording events");
    assert_eq!(writer.event_count(), u64::from(N_THREADS * EVENTS_PER_THREAD));

    let manifest_path = writer.manifest_path();
    assert!(manifest_path.exists(), "trace.json manifest should have been written on finalize");
    let manifest: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(manifest_path).unwrap()).unwrap();
    assert_eq!(manifest["pid"], 9000);
    assert_eq!(manifest["sessionId"], 0xfeed);
    assert_eq!(manifest["eventCount"], N_THREADS * EVENTS_PER_THREAD);
}

/// A detail lane whose first event matches the configured trigger survives
/// to a selective dump and leaves a window-metadata record behind; a lane
/// that never matches anything is discarded before shutdown and leaves the
/// metadata file untouched.
#[test]
fn marked_window_leaves_metadata_on_disk_unmarked_lane_leaves_none() {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::start(&config_in(dir.path(), vec!["symbol=critical".to_string()]), session_config()).unwrap();

    let marked_slot = session.register_thread(1).unwrap();
    let quiet_slot = session.register_thread(2).unwrap();

    let capacity = {
        let registry = session.registry();
        let slot = registry.get_thread_at(marked_slot).unwrap();
        slot.detail.as_ref().unwrap().pool().active_ring().capacity()
    };

    let critical = Probe {
        symbol: "critical",
        module: "m",
        message: "",
    };
    let quiet = Probe {
        symbol: "not_interesting",
        module: "m",
        message: "",
    };

    for i in 0..capacity as u64 {
        let probe = if i == 0 { &critical } else { &quiet };
        session.record_detail(marked_slot, probe, make_detail_event(i, 1)).unwrap();
    }
    for i in 0..capacity as u64 {
        session.record_detail(quiet_slot, &quiet, make_detail_event(100 + i, 2)).unwrap();
    }

    session.shutdown(ShutdownReason::Api).unwrap();

    let metadata_path = session.writer().session_dir().join("window_metadata.jsonl");
    assert!(metadata_path.exists(), "a marked window must leave a window_metadata.jsonl behind");
    let contents = std::fs::read_to_string(metadata_path).unwrap();
    let lines: Vec<&str> = contents.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 1, "exactly the marked lane's window should have been dumped, not the quiet one");
    let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert!(record.get("first_mark_timestamp_ns").is_some() || record.get("firstMarkTimestampNs").is_some());
}

/// The shutdown coordinator's phased sequence runs to completion under
/// concurrent traffic and reports a summary consistent with what was
/// actually registered, mirroring the teacher's stress test shape (many
/// producers, one verifying consumer) but over the full session pipeline
/// instead of a bare channel.
#[test]
fn shutdown_drains_pending_events_from_every_registered_thread() {
    const N_THREADS: u32 = 6;

    let dir = tempfile::tempdir().unwrap();
    let session = Session::start(&config_in(dir.path(), vec![]), session_config()).unwrap();

    let mut handles = Vec::new();
    for thread_id in 0..N_THREADS {
        let session = Arc::clone(&session);
        handles.push(thread::spawn(move || {
            let slot = session.register_thread(thread_id).unwrap();
            for i in 0..50u32 {
                session.record_index(slot, FunctionId::new(0, thread_id), thread_id, EventKind::Call, (i % 8) as u16);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let summary = session.shutdown(ShutdownReason::Api).unwrap();
    assert_eq!(summary.threads_total, N_THREADS);
    assert_eq!(summary.threads_flushed, N_THREADS);
    assert!(summary.total_events_processed >= u64::from(N_THREADS) * 50);
}
