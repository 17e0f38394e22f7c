//! Size, alignment and control-header constants for the shared map.
//!
//! These are the single source of truth for the engine; all other modules
//! import from here rather than re-deriving the numbers.

/// Minimum shared memory segment size in bytes.
///
/// Set to 4KB (one memory page) as the smallest practical segment size.
/// Segments smaller than this would have excessive overhead.
pub const SHM_MIN_SIZE: usize = 4096;

/// Maximum shared memory segment size in bytes.
///
/// Set to 1GB as a reasonable upper limit to prevent excessive memory usage.
pub const SHM_MAX_SIZE: usize = 1_073_741_824; // 1GB

/// CPU cache line size in bytes, used to align the control header.
pub const CACHE_LINE_SIZE: usize = 64;

/// Size of the control segment: the fixed control header rounded up to a page.
pub const CONTROL_SEGMENT_SIZE: usize = SHM_MIN_SIZE;

/// Byte length of the fixed control header payload.
pub const CONTROL_HEADER_LEN: usize = 275;

/// Offset and width of each control-header field, little-endian throughout.
pub mod offsets {
    /// `stream_end: u32` — byte offset of the next free position in the log.
    pub const STREAM_END: usize = 0;
    /// `lock_owner_pid: u32` — PID currently holding the shared lock, or 0.
    pub const LOCK_OWNER_PID: usize = 4;
    /// `lock_word: u16` — only byte 0 is the atomic lock flag.
    pub const LOCK_WORD: usize = 8;
    /// `snapshot_epoch: u32` — monotonic counter bumped on each rotation.
    pub const SNAPSHOT_EPOCH: usize = 10;
    /// `snapshot_fixed_size: u32` — nonzero means a fixed-size snapshot segment.
    pub const SNAPSHOT_FIXED_SIZE: usize = 14;
    /// `shared_lock_flag: u8`.
    pub const SHARED_LOCK_FLAG: usize = 18;
    /// `recurse_flag: u8`.
    pub const RECURSE_FLAG: usize = 19;
    /// `snapshot_name: [u8; 255]`, NUL/space padded ASCII.
    pub const SNAPSHOT_NAME: usize = 20;
    /// Width of the snapshot name field.
    pub const SNAPSHOT_NAME_LEN: usize = 255;
}

/// Sentinel byte framing every log record and the snapshot header (§3.3/§3.4).
pub const FRAME_SENTINEL: u8 = 0xFF;

/// Framing overhead per record: sentinel + u32 length + sentinel.
pub const FRAME_HEADER_LEN: usize = 6;
