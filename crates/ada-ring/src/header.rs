use std::sync::atomic::AtomicU32;

/// Bytes in a cache line on the platforms this core targets. The header is
/// sized and aligned to exactly one cache line so `write_pos`/`read_pos`
/// never share a line with unrelated data placed immediately after the
/// region base address.
pub const CACHE_LINE: usize = 64;

/// The on-disk/in-shared-memory ring header (§3 "Ring header").
///
/// `write_pos`/`read_pos` are plain `u32` words manipulated with explicit
/// acquire/release atomics rather than a higher-level atomic abstraction,
/// because the region may be read by a process built with a different
/// compiler than the one that wrote it (§9 "Cross-process atomics"). Using
/// `AtomicU32` here is safe: its layout is a bare `u32`, and Rust's atomic
/// intrinsics lower to the same load-acquire/store-release instructions a
/// C/C++ reader would use, so the ABI is not compiler-specific.
#[repr(C, align(64))]
pub struct RingHeader {
    pub magic: AtomicU32,
    pub format_version: AtomicU32,
    pub capacity: AtomicU32,
    pub write_pos: AtomicU32,
    pub read_pos: AtomicU32,
    pub overflow_count: AtomicU32,
    _reserved: [u8; CACHE_LINE - 6 * 4],
}

impl RingHeader {
    pub fn init(&self, capacity: u32) {
        self.magic.store(ada_core::RING_MAGIC, std::sync::atomic::Ordering::Relaxed);
        self.format_version
            .store(ada_core::RING_FORMAT_VERSION, std::sync::atomic::Ordering::Relaxed);
        self.capacity.store(capacity, std::sync::atomic::Ordering::Relaxed);
        self.write_pos.store(0, std::sync::atomic::Ordering::Relaxed);
        self.read_pos.store(0, std::sync::atomic::Ordering::Relaxed);
        self.overflow_count.store(0, std::sync::atomic::Ordering::Relaxed);
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic.load(std::sync::atomic::Ordering::Acquire) == ada_core::RING_MAGIC
    }
}

const _: () = assert!(std::mem::size_of::<RingHeader>() == CACHE_LINE);
