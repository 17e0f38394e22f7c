//! Orphan detection and cleanup coordination.
//!
//! A [`crate::handle::SharedMap`] only unlinks its own segments when its
//! creating handle closes with `auto_unlink` set; a long-lived process that
//! merely watches a map needs somewhere to ask "did the owner die and leave
//! this behind". This module tracks lightweight metadata about maps a
//! caller cares about and offers a periodic sweep, adapted from
//! per-reader-PID tracking (this engine's readers are lock-free and
//! untracked) to the creator-PID-plus-stale-lock model this engine
//! actually has.

use crate::control::ControlHeader;
use crate::error::ShmResult;
use crate::handle::unlink_map_by_name;
use crate::lock::SharedLock;
use crate::platform::is_process_alive;
use crate::segment::SharedMemorySegment;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Process-wide lifecycle operations implemented by [`SegmentCleanup`].
pub trait ShmLifecycleManager {
    /// Idempotently initialize ambient process-wide state (tracing).
    fn initialize_shm_subsystem() -> ShmResult<()>;

    /// Sweep tracked maps, unlinking those whose creator has died and whose
    /// grace period has elapsed. Returns the number unlinked.
    fn periodic_cleanup(&mut self) -> ShmResult<usize>;

    /// Unlink every tracked map unconditionally, regardless of grace period.
    fn emergency_cleanup(&mut self) -> ShmResult<()>;
}

/// Metadata about a map this process wants to watch for orphaning.
#[derive(Debug, Clone)]
pub struct SegmentMetadata {
    /// Map (control segment) name.
    pub name: String,
    /// PID of the process that created the map.
    pub creator_pid: u32,
    /// When this process started tracking the map.
    pub created_at: SystemTime,
}

/// Tracks maps by name and sweeps for ones whose creator has died.
pub struct SegmentCleanup {
    grace_period: Duration,
    tracked_segments: HashMap<String, SegmentMetadata>,
}

impl SegmentCleanup {
    /// Create a cleanup coordinator that waits `grace_period` past a
    /// creator's death before unlinking its map.
    pub fn new(grace_period: Duration) -> Self {
        Self {
            grace_period,
            tracked_segments: HashMap::new(),
        }
    }

    /// Start tracking a map for orphan detection.
    pub fn register_segment(&mut self, metadata: SegmentMetadata) {
        self.tracked_segments
            .insert(metadata.name.clone(), metadata);
    }

    /// Stop tracking a map, e.g. once its owning handle closed cleanly.
    pub fn unregister_segment(&mut self, name: &str) {
        self.tracked_segments.remove(name);
    }

    /// Currently tracked map names.
    pub fn tracked_names(&self) -> Vec<String> {
        self.tracked_segments.keys().cloned().collect()
    }

    fn is_orphaned(&self, metadata: &SegmentMetadata) -> bool {
        if is_process_alive(metadata.creator_pid) {
            return false;
        }
        match metadata.created_at.elapsed() {
            Ok(elapsed) => elapsed > self.grace_period,
            Err(_) => true,
        }
    }

    /// If a tracked map's control segment shows its lock held by a dead
    /// PID, steal and immediately release it so a live handle is not blocked
    /// forever. Returns `true` if a stale lock was recovered. A map without
    /// a control segment (already unlinked) or with no lock contention is
    /// left untouched.
    pub fn recover_stale_lock(&self, name: &str) -> ShmResult<bool> {
        let control = match SharedMemorySegment::attach(name) {
            Ok(control) => control,
            Err(_) => return Ok(false),
        };
        let header = ControlHeader::from_bytes(control.bytes());
        let owner = header.lock_owner_pid();
        if owner == 0 || is_process_alive(owner) {
            return Ok(false);
        }
        let lock = SharedLock::new(header, Duration::from_micros(1));
        lock.steal_from_dead(owner, true)
    }
}

impl ShmLifecycleManager for SegmentCleanup {
    fn initialize_shm_subsystem() -> ShmResult<()> {
        crate::init_tracing();
        Ok(())
    }

    fn periodic_cleanup(&mut self) -> ShmResult<usize> {
        let mut cleaned = 0;
        let mut to_remove = Vec::new();

        for (name, metadata) in &self.tracked_segments {
            let _ = self.recover_stale_lock(name);
            if self.is_orphaned(metadata) {
                tracing::info!(name = %name, "cleaning up orphaned map");
                if unlink_map_by_name(name).is_ok() {
                    to_remove.push(name.clone());
                    cleaned += 1;
                }
            }
        }

        for name in to_remove {
            self.tracked_segments.remove(&name);
        }

        Ok(cleaned)
    }

    fn emergency_cleanup(&mut self) -> ShmResult<()> {
        for name in self.tracked_segments.keys() {
            let _ = unlink_map_by_name(name);
        }
        self.tracked_segments.clear();
        Ok(())
    }
}

impl Default for SegmentCleanup {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

/// Global cleanup instance using a thread-safe singleton, matching the
/// teacher's `get_global_cleanup` pattern for code that does not want to
/// thread a `SegmentCleanup` through every call site.
static GLOBAL_CLEANUP: std::sync::LazyLock<std::sync::Mutex<SegmentCleanup>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(SegmentCleanup::default()));

/// Borrow the global cleanup instance.
pub fn get_global_cleanup() -> std::sync::MutexGuard<'static, SegmentCleanup> {
    GLOBAL_CLEANUP.lock().unwrap()
}
