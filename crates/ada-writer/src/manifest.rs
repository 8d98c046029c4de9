//! `trace.json` (§4.I): field order/names match
//! `original_source/atf_v4_writer.c`'s `write_manifest` exactly, produced
//! here via `serde_json` against a typed struct instead of hand-built
//! `fprintf` calls.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub os: String,
    pub arch: String,
    pub pid: u32,
    #[serde(rename = "sessionId")]
    pub session_id: u64,
    #[serde(rename = "timeStartNs")]
    pub time_start_ns: u64,
    #[serde(rename = "timeEndNs")]
    pub time_end_ns: u64,
    #[serde(rename = "eventCount")]
    pub event_count: u64,
    #[serde(rename = "bytesWritten")]
    pub bytes_written: u64,
    pub modules: Vec<String>,
}

/// Detects the running OS/architecture the same way
/// `atf_v4_writer.c::detect_platform` does, via compile-time `cfg`s.
pub fn detect_os() -> &'static str {
    if cfg!(target_os = "macos") {
        "darwin"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

pub fn detect_arch() -> &'static str {
    if cfg!(target_arch = "aarch64") {
        "aarch64"
    } else if cfg!(target_arch = "x86_64") {
        "x86_64"
    } else {
        "unknown"
    }
}
