//! Wire-layout event types shared by the ring buffer, detail-lane controller,
//! and trace writer. Both events are `repr(C, packed)` so that the layout is
//! identical regardless of which compiler produced the producer or consumer
//! side of a cross-process ring (see `RingBufferHeader` for the analogous
//! concern on the header).

/// Magic value stamped at the head of every ring buffer region.
pub const RING_MAGIC: u32 = 0xADA0;

/// Current ring header format version.
pub const RING_FORMAT_VERSION: u32 = 1;

/// Number of general-purpose argument registers captured per detail event.
pub const DETAIL_ARG_REGISTERS: usize = 8;

/// Default size, in bytes, of the shallow stack snapshot captured in a detail event.
pub const STACK_SNAPSHOT_BYTES: usize = 128;

/// Size in bytes of a packed [`IndexEvent`].
pub const INDEX_EVENT_SIZE: usize = 32;

/// Size in bytes of a packed [`DetailEvent`].
pub const DETAIL_EVENT_SIZE: usize = 512;

/// What kind of call-site transition an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    Call = 0,
    Return = 1,
    Exception = 2,
}

impl EventKind {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Call),
            1 => Some(Self::Return),
            2 => Some(Self::Exception),
            _ => None,
        }
    }
}

/// A function identifier: `module_id << 32 | symbol_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub u64);

impl FunctionId {
    #[inline]
    pub fn new(module_id: u32, symbol_index: u32) -> Self {
        Self((u64::from(module_id) << 32) | u64::from(symbol_index))
    }

    #[inline]
    pub fn module_id(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub fn symbol_index(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }
}

/// The Index-lane event: minimal call/return record, 32 bytes.
///
/// Producers never read this struct back through anything but the ring's
/// reserve/commit path, so the `packed` representation (no compiler-inserted
/// padding) guarantees byte-identical layout across the producer and
/// consumer, which may be different processes built by different compilers.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct IndexEvent {
    pub timestamp_ns: u64,
    pub function_id: u64,
    pub thread_id: u32,
    pub event_kind: u8,
    pub call_depth: u16,
    _reserved: [u8; INDEX_EVENT_SIZE - 23],
}

impl IndexEvent {
    pub fn new(timestamp_ns: u64, function_id: FunctionId, thread_id: u32, kind: EventKind, call_depth: u16) -> Self {
        Self {
            timestamp_ns,
            function_id: function_id.0,
            thread_id,
            event_kind: kind as u8,
            call_depth,
            _reserved: [0; INDEX_EVENT_SIZE - 23],
        }
    }

    #[inline]
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_u8(self.event_kind)
    }
}

impl Default for IndexEvent {
    fn default() -> Self {
        Self::new(0, FunctionId(0), 0, EventKind::Call, 0)
    }
}

// Safety: plain-old-data, no interior pointers; Send/Sync are auto-derived
// since all fields are Send+Sync, but `packed` repr makes field access
// require copies (never references) — enforced by the compiler already.

/// The Detail-lane event: full register/stack snapshot, 512 bytes.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct DetailEvent {
    pub timestamp_ns: u64,
    pub function_id: u64,
    pub thread_id: u32,
    pub event_kind: u8,
    pub call_depth: u16,
    pub argument_registers: [u64; DETAIL_ARG_REGISTERS],
    pub link_pointer: u64,
    pub frame_pointer: u64,
    pub stack_pointer: u64,
    pub stack_snapshot: [u8; STACK_SNAPSHOT_BYTES],
    pub stack_len: u16,
    _reserved: [u8; DETAIL_EVENT_SIZE - (23 + 8 * DETAIL_ARG_REGISTERS + 24 + STACK_SNAPSHOT_BYTES + 2)],
}

impl std::fmt::Debug for DetailEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetailEvent")
            .field("timestamp_ns", &{ self.timestamp_ns })
            .field("function_id", &{ self.function_id })
            .field("thread_id", &{ self.thread_id })
            .field("event_kind", &{ self.event_kind })
            .field("call_depth", &{ self.call_depth })
            .field("stack_len", &{ self.stack_len })
            .finish_non_exhaustive()
    }
}

impl DetailEvent {
    pub fn new(
        timestamp_ns: u64,
        function_id: FunctionId,
        thread_id: u32,
        kind: EventKind,
        call_depth: u16,
        argument_registers: [u64; DETAIL_ARG_REGISTERS],
        link_pointer: u64,
        frame_pointer: u64,
        stack_pointer: u64,
        stack_snapshot: [u8; STACK_SNAPSHOT_BYTES],
        stack_len: u16,
    ) -> Self {
        Self {
            timestamp_ns,
            function_id: function_id.0,
            thread_id,
            event_kind: kind as u8,
            call_depth,
            argument_registers,
            link_pointer,
            frame_pointer,
            stack_pointer,
            stack_snapshot,
            stack_len,
            _reserved: [0; DETAIL_EVENT_SIZE - (23 + 8 * DETAIL_ARG_REGISTERS + 24 + STACK_SNAPSHOT_BYTES + 2)],
        }
    }

    #[inline]
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_u8(self.event_kind)
    }

    #[inline]
    pub fn index_view(&self) -> IndexEvent {
        IndexEvent::new(
            self.timestamp_ns,
            FunctionId(self.function_id),
            self.thread_id,
            self.kind().unwrap_or(EventKind::Call),
            self.call_depth,
        )
    }
}

impl Default for DetailEvent {
    fn default() -> Self {
        Self::new(0, FunctionId(0), 0, EventKind::Call, 0, [0; DETAIL_ARG_REGISTERS], 0, 0, 0, [0; STACK_SNAPSHOT_BYTES], 0)
    }
}
