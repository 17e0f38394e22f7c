//! Bit-exact control-header view over the control segment's bytes.
//!
//! The control segment is a plain byte buffer, not a `#[repr(C)]` struct: it is
//! shared with independently-compiled (and, in the original design, cross-language)
//! processes, so every field is addressed by explicit offset and read/written with
//! little-endian atomics, mirroring `original_source/UltraDict.py`'s `init_remotes`.
//!
//! [`ControlHeader`] is a thin, `Copy` pointer view rather than a borrowed
//! slice: it is held by [`crate::lock::SharedLock`] for the lifetime of a
//! map handle, which long-lived shared-memory code in this crate already
//! expresses with raw pointers into an mmap (see `segment.rs`) rather than
//! fighting the borrow checker over self-referential structs.

use crate::consts::{offsets, CONTROL_HEADER_LEN};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// A pointer view over a control segment's bytes, exposing each header
/// field as a typed atomic accessor.
#[derive(Clone, Copy)]
pub struct ControlHeader {
    ptr: *mut u8,
}

// SAFETY: all access goes through atomics at fixed offsets; the pointed-to
// memory is a shared-memory segment meant to be used from many threads and
// processes concurrently.
unsafe impl Send for ControlHeader {}
unsafe impl Sync for ControlHeader {}

impl ControlHeader {
    /// Wrap a control segment's bytes. The caller must ensure `bytes` stays
    /// mapped for as long as the returned `ControlHeader` is used.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert!(
            bytes.len() >= CONTROL_HEADER_LEN,
            "control segment too small: {} < {}",
            bytes.len(),
            CONTROL_HEADER_LEN
        );
        Self {
            ptr: bytes.as_ptr() as *mut u8,
        }
    }

    fn atomic_u32(&self, offset: usize) -> &AtomicU32 {
        unsafe { &*(self.ptr.add(offset) as *const AtomicU32) }
    }

    fn atomic_u8(&self, offset: usize) -> &AtomicU8 {
        unsafe { &*(self.ptr.add(offset) as *const AtomicU8) }
    }

    /// Byte offset of the next free position in the log.
    pub fn stream_end(&self) -> u32 {
        self.atomic_u32(offsets::STREAM_END).load(Ordering::Acquire)
    }

    /// Set the stream-end cursor. Only the lock holder may call this.
    pub fn set_stream_end(&self, value: u32) {
        self.atomic_u32(offsets::STREAM_END)
            .store(value, Ordering::Release);
    }

    /// PID currently holding the shared lock, or 0.
    pub fn lock_owner_pid(&self) -> u32 {
        self.atomic_u32(offsets::LOCK_OWNER_PID)
            .load(Ordering::Acquire)
    }

    /// Set the lock-owner PID. Only the lock holder may call this.
    pub fn set_lock_owner_pid(&self, pid: u32) {
        self.atomic_u32(offsets::LOCK_OWNER_PID)
            .store(pid, Ordering::Release);
    }

    /// Compare-and-swap the lock-owner PID field.
    pub fn cas_lock_owner_pid(&self, expected: u32, new: u32) -> Result<u32, u32> {
        self.atomic_u32(offsets::LOCK_OWNER_PID).compare_exchange(
            expected,
            new,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
    }

    /// The single atomic byte of the lock word (only byte 0 of the 2-byte field is used).
    pub fn lock_word_byte(&self) -> &AtomicU8 {
        self.atomic_u8(offsets::LOCK_WORD)
    }

    /// Monotonic snapshot-rotation counter.
    pub fn snapshot_epoch(&self) -> u32 {
        self.atomic_u32(offsets::SNAPSHOT_EPOCH)
            .load(Ordering::Acquire)
    }

    /// Increment the snapshot epoch by one, returning the new value.
    pub fn bump_snapshot_epoch(&self) -> u32 {
        self.atomic_u32(offsets::SNAPSHOT_EPOCH)
            .fetch_add(1, Ordering::AcqRel)
            + 1
    }

    /// Nonzero if the snapshot segment has a fixed size (and is permanent).
    pub fn snapshot_fixed_size(&self) -> u32 {
        self.atomic_u32(offsets::SNAPSHOT_FIXED_SIZE)
            .load(Ordering::Acquire)
    }

    /// Set the fixed snapshot size. Only written once, at creation.
    pub fn set_snapshot_fixed_size(&self, size: u32) {
        self.atomic_u32(offsets::SNAPSHOT_FIXED_SIZE)
            .store(size, Ordering::Release);
    }

    /// True if this map was created with `shared_lock = true`.
    pub fn shared_lock_flag(&self) -> bool {
        self.atomic_u8(offsets::SHARED_LOCK_FLAG).load(Ordering::Acquire) == b'1'
    }

    /// Set the shared-lock flag. Only written once, at creation.
    pub fn set_shared_lock_flag(&self, on: bool) {
        self.atomic_u8(offsets::SHARED_LOCK_FLAG)
            .store(if on { b'1' } else { 0 }, Ordering::Release);
    }

    /// True if recursive-child semantics are enabled for this map.
    pub fn recurse_flag(&self) -> bool {
        self.atomic_u8(offsets::RECURSE_FLAG).load(Ordering::Acquire) == b'1'
    }

    /// Set the recurse flag. Only written once, at creation.
    pub fn set_recurse_flag(&self, on: bool) {
        self.atomic_u8(offsets::RECURSE_FLAG)
            .store(if on { b'1' } else { 0 }, Ordering::Release);
    }

    /// Read the current snapshot segment name, trimmed of NUL/space padding.
    /// Empty means no snapshot has been published yet (`snapshot_epoch == 0`).
    pub fn snapshot_name(&self) -> String {
        let raw = unsafe {
            std::slice::from_raw_parts(
                self.ptr.add(offsets::SNAPSHOT_NAME),
                offsets::SNAPSHOT_NAME_LEN,
            )
        };
        String::from_utf8_lossy(raw)
            .trim_matches(|c: char| c == '\0' || c == ' ')
            .to_string()
    }

    /// Publish a new snapshot segment name, NUL-padded to the field width.
    /// Only the lock holder may call this.
    pub fn set_snapshot_name(&self, name: &str) {
        assert!(
            name.len() <= offsets::SNAPSHOT_NAME_LEN,
            "snapshot name too long"
        );
        unsafe {
            let field = self.ptr.add(offsets::SNAPSHOT_NAME);
            std::ptr::write_bytes(field, 0, offsets::SNAPSHOT_NAME_LEN);
            std::ptr::copy_nonoverlapping(name.as_ptr(), field, name.len());
        }
    }
}
