//! The trace writer (§4.I): frames `IndexEvent`/`DetailEvent` batches as
//! length-delimited protobuf records, tracks module UUIDs, and emits a
//! crash-safe JSON manifest on finalize. Grounded directly in
//! `original_source/atf_v4_writer.c`.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use ada_core::{DetailEvent, EventKind, IndexEvent};
use ada_drain::{DrainError, EventSink};
use prost::Message;

use crate::error::WriterError;
use crate::manifest::{detect_arch, detect_os, Manifest};
use crate::proto::{self, event, FunctionCall, FunctionReturn, SignalDelivery, TraceEnd, TraceStart};

const MAX_MODULES: usize = 64;

fn now_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as u64
}

/// Construction parameters for a [`TraceWriter`], mirroring
/// `AtfV4WriterConfig`.
pub struct TraceWriterConfig {
    pub output_root: PathBuf,
    pub session_label: Option<String>,
    pub pid: u32,
    pub session_id: Option<u64>,
    pub enable_manifest: bool,
}

pub struct TraceWriter {
    session_dir: PathBuf,
    events_path: PathBuf,
    manifest_path: PathBuf,
    events_file: File,
    manifest_os: &'static str,
    manifest_arch: &'static str,
    manifest_enabled: bool,
    pid: u32,
    session_id: u64,
    trace_start_ns: u64,
    trace_end_ns: AtomicU64,
    event_count: AtomicU64,
    bytes_written: AtomicU64,
    write_errors: AtomicU32,
    modules: Mutex<Vec<String>>,
    module_count: AtomicU32,
    next_event_id: AtomicU64,
    finalized: AtomicBool,
}

impl TraceWriter {
    pub fn new(config: TraceWriterConfig) -> Result<Self, WriterError> {
        if config.output_root.as_os_str().is_empty() {
            return Err(WriterError::InvalidArgument("output_root"));
        }

        std::fs::create_dir_all(&config.output_root)?;
        let ada_root = config.output_root.join("ada_traces");
        std::fs::create_dir_all(&ada_root)?;

        let session_id = config.session_id.unwrap_or_else(now_ns);
        let session_name = config
            .session_label
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("session_{session_id:x}"));
        let session_path = ada_root.join(session_name);
        std::fs::create_dir_all(&session_path)?;

        let session_dir = session_path.join(format!("pid_{}", config.pid));
        std::fs::create_dir_all(&session_dir)?;

        let events_path = session_dir.join("events.bin");
        let manifest_path = session_dir.join("trace.json");
        let events_file = OpenOptions::new().create(true).write(true).truncate(true).open(&events_path)?;

        let trace_start_ns = now_ns();

        Ok(Self {
            session_dir,
            events_path,
            manifest_path,
            events_file,
            manifest_os: detect_os(),
            manifest_arch: detect_arch(),
            manifest_enabled: config.enable_manifest,
            pid: config.pid,
            session_id,
            trace_start_ns,
            trace_end_ns: AtomicU64::new(trace_start_ns),
            event_count: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            write_errors: AtomicU32::new(0),
            modules: Mutex::new(Vec::with_capacity(MAX_MODULES)),
            module_count: AtomicU32::new(0),
            next_event_id: AtomicU64::new(1),
            finalized: AtomicBool::new(false),
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn module_count(&self) -> u32 {
        self.module_count.load(Ordering::Acquire)
    }

    pub fn write_errors(&self) -> u32 {
        self.write_errors.load(Ordering::Relaxed)
    }

    /// Dedups against already-registered UUIDs; returns `NoSpace` past the
    /// 64-slot table, matching `atf_v4_writer_register_module`.
    pub fn register_module(&self, module_uuid: &str) -> Result<(), WriterError> {
        if module_uuid.is_empty() {
            return Err(WriterError::InvalidArgument("module_uuid"));
        }
        let mut modules = self.modules.lock().unwrap();
        if modules.iter().any(|m| m == module_uuid) {
            return Ok(());
        }
        if modules.len() >= MAX_MODULES {
            return Err(WriterError::NoSpace);
        }
        modules.push(module_uuid.to_string());
        self.module_count.store(modules.len() as u32, Ordering::Release);
        Ok(())
    }

    fn advance_trace_end(&self, timestamp_ns: u64) {
        self.trace_end_ns.fetch_max(timestamp_ns, Ordering::Relaxed);
    }

    /// Appends one already-built protobuf `Event`, framing it as
    /// `varint(len) || payload` in a single buffered write so the record
    /// never interleaves with another append — true here because the
    /// writer is only ever driven by the drain worker's single thread.
    fn append_proto_event(&self, proto_event: &proto::Event) -> Result<(), WriterError> {
        let payload_size = proto_event.encoded_len();
        if payload_size == 0 {
            self.write_errors.fetch_add(1, Ordering::Relaxed);
            return Err(WriterError::InvalidArgument("empty encoded event"));
        }

        let mut record = Vec::with_capacity(payload_size + 10);
        crate::varint::encode_varint(payload_size as u64, &mut record);
        proto_event
            .encode(&mut record)
            .map_err(|_| WriterError::InvalidArgument("protobuf encode failed"))?;

        let result = (&self.events_file).write_all(&record);
        if let Err(e) = result {
            self.write_errors.fetch_add(1, Ordering::Relaxed);
            return Err(WriterError::IoFailure(e));
        }

        self.bytes_written.fetch_add(record.len() as u64, Ordering::Relaxed);
        self.event_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn next_id(&self) -> u64 {
        self.next_event_id.fetch_add(1, Ordering::Relaxed)
    }

    fn index_event_to_proto(&self, event: &IndexEvent) -> proto::Event {
        let timestamp_ns = event.timestamp_ns;
        let function_id = event.function_id;
        let thread_id = event.thread_id;
        let kind = event.kind().unwrap_or(EventKind::Call);
        self.advance_trace_end(timestamp_ns);

        let symbol = format!("fn_{:#x}", function_id);
        let payload = match kind {
            EventKind::Return | EventKind::Exception => event::Payload::FunctionReturn(FunctionReturn {
                symbol,
                address: function_id,
                return_registers: HashMap::new(),
            }),
            EventKind::Call => event::Payload::FunctionCall(FunctionCall {
                symbol,
                address: function_id,
                argument_registers: HashMap::new(),
                stack_shallow_copy: Vec::new(),
            }),
        };

        proto::Event {
            event_id: self.next_id(),
            thread_id: thread_id as i32,
            timestamp: Some(proto::timestamp_from_ns(timestamp_ns)),
            payload: Some(payload),
        }
    }

    fn detail_event_to_proto(&self, event: &DetailEvent) -> proto::Event {
        let timestamp_ns = event.timestamp_ns;
        let function_id = event.function_id;
        let thread_id = event.thread_id;
        let kind = event.kind().unwrap_or(EventKind::Call);
        let stack_len = event.stack_len as usize;
        // Copy the packed array fields to locals first: taking a reference
        // to a packed field whose element type has alignment > 1 (u64 here)
        // is a compile error, so `.iter()`/slicing must happen on a copy.
        let argument_registers = event.argument_registers;
        let stack_snapshot = event.stack_snapshot;
        let stack = stack_snapshot[..stack_len.min(stack_snapshot.len())].to_vec();
        let registers: HashMap<String, u64> =
            argument_registers.iter().enumerate().map(|(i, v)| (format!("r{i}"), *v)).collect();
        self.advance_trace_end(timestamp_ns);

        let symbol = format!("fn_{:#x}", function_id);
        let payload = match kind {
            EventKind::Return | EventKind::Exception => event::Payload::FunctionReturn(FunctionReturn {
                symbol,
                address: function_id,
                return_registers: registers,
            }),
            EventKind::Call => event::Payload::FunctionCall(FunctionCall {
                symbol,
                address: function_id,
                argument_registers: registers,
                stack_shallow_copy: stack,
            }),
        };

        proto::Event {
            event_id: self.next_id(),
            thread_id: thread_id as i32,
            timestamp: Some(proto::timestamp_from_ns(timestamp_ns)),
            payload: Some(payload),
        }
    }

    /// Writes a one-shot `TRACE_START` record. Not part of the per-lane
    /// event stream; called once by whatever drives session setup.
    pub fn write_trace_start(
        &self,
        timestamp_ns: u64,
        thread_id: i32,
        executable_path: &str,
        args: &[String],
    ) -> Result<(), WriterError> {
        let proto_event = proto::Event {
            event_id: self.next_id(),
            thread_id,
            timestamp: Some(proto::timestamp_from_ns(timestamp_ns)),
            payload: Some(event::Payload::TraceStart(TraceStart {
                executable_path: executable_path.to_string(),
                args: args.to_vec(),
                operating_system: self.manifest_os.to_string(),
                cpu_architecture: self.manifest_arch.to_string(),
            })),
        };
        self.append_proto_event(&proto_event)
    }

    /// Writes a one-shot `TRACE_END` record.
    pub fn write_trace_end(&self, timestamp_ns: u64, thread_id: i32, exit_code: i32) -> Result<(), WriterError> {
        self.advance_trace_end(timestamp_ns);
        let proto_event = proto::Event {
            event_id: self.next_id(),
            thread_id,
            timestamp: Some(proto::timestamp_from_ns(timestamp_ns)),
            payload: Some(event::Payload::TraceEnd(TraceEnd { exit_code })),
        };
        self.append_proto_event(&proto_event)
    }

    /// Writes a `SIGNAL_DELIVERY` record.
    pub fn write_signal_delivery(
        &self,
        timestamp_ns: u64,
        thread_id: i32,
        number: i32,
        name: &str,
        registers: HashMap<String, u64>,
    ) -> Result<(), WriterError> {
        self.advance_trace_end(timestamp_ns);
        let proto_event = proto::Event {
            event_id: self.next_id(),
            thread_id,
            timestamp: Some(proto::timestamp_from_ns(timestamp_ns)),
            payload: Some(event::Payload::SignalDelivery(SignalDelivery {
                number,
                name: name.to_string(),
                registers,
            })),
        };
        self.append_proto_event(&proto_event)
    }

    /// `fsync`s the events file. Called before manifest emission.
    pub fn flush(&self) -> Result<(), WriterError> {
        self.events_file.sync_all()?;
        Ok(())
    }

    fn write_manifest(&self) -> Result<(), WriterError> {
        if !self.manifest_enabled {
            return Ok(());
        }

        let manifest = Manifest {
            os: self.manifest_os.to_string(),
            arch: self.manifest_arch.to_string(),
            pid: self.pid,
            session_id: self.session_id,
            time_start_ns: self.trace_start_ns,
            time_end_ns: self.trace_end_ns.load(Ordering::Relaxed),
            event_count: self.event_count.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            modules: self.modules.lock().unwrap().clone(),
        };

        let dir = self.manifest_path.parent().ok_or(WriterError::InvalidArgument("manifest_path"))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &manifest).map_err(|_| WriterError::InvalidArgument("manifest serialize failed"))?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;

        match tmp.persist(&self.manifest_path) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.write_errors.fetch_add(1, Ordering::Relaxed);
                Err(WriterError::IoFailure(e.error))
            }
        }
    }

    /// Flushes, writes the manifest, and marks the writer finalized.
    /// Idempotent: a second call is a no-op, matching
    /// `atf_v4_writer_finalize`.
    pub fn finalize(&self) -> Result<(), WriterError> {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.flush()?;
        let now = now_ns();
        self.advance_trace_end(now);
        self.write_manifest()?;
        Ok(())
    }
}

impl EventSink for TraceWriter {
    fn append_index(&self, events: &[IndexEvent]) -> Result<(), DrainError> {
        for event in events {
            let proto_event = self.index_event_to_proto(event);
            self.append_proto_event(&proto_event).map_err(|e| DrainError::WriterFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn append_detail(&self, events: &[DetailEvent]) -> Result<(), DrainError> {
        for event in events {
            let proto_event = self.detail_event_to_proto(event);
            self.append_proto_event(&proto_event).map_err(|e| DrainError::WriterFailed(e.to_string()))?;
        }
        Ok(())
    }
}
