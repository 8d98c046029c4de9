use serde::Serialize;

/// One closed window's accounting, as emitted to `window_metadata.jsonl` and
/// returned from `close_window_for_dump` (§4.G).
#[derive(Debug, Clone, Serialize)]
pub struct WindowSnapshot {
    pub window_id: u64,
    pub start_timestamp_ns: u64,
    pub end_timestamp_ns: u64,
    pub total_events: u64,
    pub marked_events: u64,
    pub first_mark_timestamp_ns: u64,
    pub mark_seen: bool,
}
