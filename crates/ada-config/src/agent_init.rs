//! Parses the agent-init payload (§6): a small `key=value` blob handed to
//! the instrumentation agent at attach time, identifying the host process
//! and session. Entries separate with `;`, `,`, whitespace, or newlines.
//! Recognizes `host_pid`/`pid` (decimal) and `session_id`/`sid` (decimal,
//! `0x`-prefixed hex, or bare hex digits), falling back to
//! `ADA_SHM_HOST_PID`/`ADA_SHM_SESSION_ID` when a key is absent from the
//! blob. Unrecognized keys are ignored.

use crate::error::ConfigError;
use std::collections::HashMap;

/// The decoded agent-init payload. `session_id` is the same 32-bit value
/// the controller embeds as `session_id_hex8` in shared-memory segment
/// names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInitPayload {
    pub host_pid: u32,
    pub session_id: u32,
}

fn parse_pairs(blob: &str) -> HashMap<&str, &str> {
    blob.split([';', ',', '\n', '\r', '\t', ' '])
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            let (key, value) = entry.split_once('=')?;
            Some((key.trim(), value.trim()))
        })
        .collect()
}

/// Parses a `session_id` value: decimal, `0x`-prefixed hex, or a bare
/// hex-digit string with no decimal-only interpretation (e.g. `deadbeef`).
fn parse_session_id(raw: &str) -> Option<u32> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok();
    }
    if let Ok(decimal) = raw.parse::<u32>() {
        return Some(decimal);
    }
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return u32::from_str_radix(raw, 16).ok();
    }
    None
}

impl AgentInitPayload {
    /// Parses `blob`. Missing `host_pid`/`session_id` are filled from
    /// `ADA_SHM_HOST_PID`/`ADA_SHM_SESSION_ID` via `env_lookup` (injected so
    /// callers and tests don't depend on real process environment).
    pub fn parse(blob: &str, env_lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let pairs = parse_pairs(blob);

        let pid_str = pairs
            .get("host_pid")
            .or_else(|| pairs.get("pid"))
            .map(|s| s.to_string())
            .or_else(|| env_lookup("ADA_SHM_HOST_PID"))
            .ok_or_else(|| ConfigError::InvalidArgument("agent-init payload missing host_pid".into()))?;
        let host_pid: u32 = pid_str
            .parse()
            .map_err(|_| ConfigError::Parse(format!("host_pid is not a valid pid: {pid_str:?}")))?;
        if host_pid == 0 {
            return Err(ConfigError::InvalidArgument("host_pid must be nonzero".into()));
        }

        let session_raw = pairs
            .get("session_id")
            .or_else(|| pairs.get("sid"))
            .map(|s| s.to_string())
            .or_else(|| env_lookup("ADA_SHM_SESSION_ID"))
            .ok_or_else(|| ConfigError::InvalidArgument("agent-init payload missing session_id".into()))?;
        let session_id = parse_session_id(&session_raw)
            .ok_or_else(|| ConfigError::Parse(format!("session_id is not decimal or hex: {session_raw:?}")))?;

        Ok(Self { host_pid, session_id })
    }
}
