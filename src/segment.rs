//! Named shared-memory segment lifecycle: create, attach, unlink.
//!
//! Control, log and snapshot segments are all plain byte buffers backed by a
//! file under `/dev/shm`; this module is the single place that turns a
//! logical name into a path, creates or attaches the backing mmap, and
//! validates its size. Field interpretation (control header layout, log
//! framing, snapshot framing) lives in `control`, `log` and `snapshot`.

use crate::consts::{CACHE_LINE_SIZE, SHM_MAX_SIZE, SHM_MIN_SIZE};
use crate::error::{ShmError, ShmResult};
use crate::platform;
use memmap2::MmapMut;

/// Directory backing named segments. `/dev/shm` on Linux is a tmpfs mount
/// and is the conventional location for POSIX shared memory objects.
const SHM_DIR: &str = "/dev/shm";

/// Build the filesystem path for a logical segment name.
pub fn segment_path(name: &str) -> String {
    format!("{SHM_DIR}/{name}")
}

/// A named shared-memory segment: an mmap over a `/dev/shm`-backed file.
pub struct SharedMemorySegment {
    name: String,
    size: usize,
    mmap: MmapMut,
}

impl SharedMemorySegment {
    /// Create a new segment, failing if one by this name already exists.
    pub fn create(name: &str, size: usize) -> ShmResult<Self> {
        validate_segment_size(size)?;
        let path = segment_path(name);
        let mmap = platform::create_segment_mmap(&path, size, true).map_err(|e| match e {
            ShmError::Io { source } if source.kind() == std::io::ErrorKind::AlreadyExists => {
                ShmError::AlreadyExists {
                    name: name.to_string(),
                }
            }
            other => other,
        })?;
        // The control header is placed at offset 0 of its segment, so the
        // segment's base address *is* the header's placement; an mmap that
        // ever came back misaligned would silently break every atomic
        // accessor in `control.rs`.
        validate_memory_alignment(mmap.as_ptr() as usize)?;
        Ok(Self {
            name: name.to_string(),
            size,
            mmap,
        })
    }

    /// Attach to an existing segment by name.
    pub fn attach(name: &str) -> ShmResult<Self> {
        let path = segment_path(name);
        let mmap = platform::attach_segment_mmap(&path).map_err(|e| match e {
            ShmError::Io { source } if source.kind() == std::io::ErrorKind::NotFound => {
                ShmError::NotFound {
                    name: name.to_string(),
                }
            }
            other => other,
        })?;
        validate_memory_alignment(mmap.as_ptr() as usize)?;
        let size = mmap.len();
        Ok(Self {
            name: name.to_string(),
            size,
            mmap,
        })
    }

    /// Remove the backing file. Idempotent: a missing file is not an error.
    pub fn unlink(name: &str) -> ShmResult<()> {
        match std::fs::remove_file(segment_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Logical segment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mapped size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Borrow the full mapped region.
    pub fn bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Mutably borrow the full mapped region. Callers still serialize writes
    /// through the map's lock; this merely exposes the underlying memory.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap[..]
    }

    /// Mutably borrow the mapped region through a shared reference.
    ///
    /// Other fields of a segment (the control header, log frames) are
    /// already written through raw pointers into this same mapping so that
    /// many handles can hold `&SharedMap` concurrently; this is the same
    /// aliasing, made explicit at the one call site (`handle.rs`'s log
    /// append) that needs a `&mut [u8]` API rather than per-field atomics.
    /// Safe as long as callers serialize writes through the map's lock.
    pub fn bytes_mut_shared(&self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.mmap.as_ptr() as *mut u8, self.size) }
    }

    /// Flush the mapping to its backing file. Not required for cross-process
    /// visibility (the mapping is shared), but useful before a segment is
    /// dropped if a caller wants durability guarantees.
    pub fn flush(&self) -> ShmResult<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

/// Validate a segment size against the engine's page-aligned bounds.
pub fn validate_segment_size(size: usize) -> ShmResult<()> {
    if size < SHM_MIN_SIZE || size > SHM_MAX_SIZE || size % SHM_MIN_SIZE != 0 {
        return Err(ShmError::InvalidSize { size });
    }
    Ok(())
}

/// Validate that an address is aligned to a cache line, used when asserting
/// invariants about the control header's placement within its segment.
pub fn validate_memory_alignment(address: usize) -> ShmResult<()> {
    if address % CACHE_LINE_SIZE != 0 {
        return Err(ShmError::AlignmentError {
            address,
            alignment: CACHE_LINE_SIZE,
        });
    }
    Ok(())
}
