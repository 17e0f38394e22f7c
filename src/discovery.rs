//! Enumeration of this engine's live maps under `/dev/shm`, for diagnostics.
//!
//! Scans this engine's naming scheme directly (a map is a control segment
//! plus a `{name}_memory` log segment, optionally `{name}_snap_*`/
//! `{name}_full` snapshots) and decodes [`ControlHeader`] fields straight
//! from the attached segment rather than a `.meta` sidecar file.

use crate::control::ControlHeader;
use crate::error::{ShmError, ShmResult};
use crate::platform::is_process_alive;
use crate::segment::SharedMemorySegment;
use std::collections::HashSet;

const SHM_DIR: &str = "/dev/shm";
const LOG_SUFFIX: &str = "_memory";

/// Everything this engine can tell about a map from its control segment
/// alone, without attaching a typed handle.
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    /// Map (control segment) name.
    pub name: String,
    /// Control segment size in bytes.
    pub size: usize,
    /// PID recorded as the lock owner, or 0 if unlocked.
    pub lock_owner_pid: u32,
    /// Whether the recorded lock owner is still alive.
    pub lock_owner_alive: bool,
    /// Current snapshot epoch.
    pub snapshot_epoch: u32,
    /// Current stream-end cursor.
    pub stream_end: u32,
    /// Whether this map uses the cross-process shared lock.
    pub shared_lock: bool,
    /// Whether recursive-child semantics are enabled for this map.
    pub recurse: bool,
}

/// Discovers maps by scanning `/dev/shm` for this engine's naming pattern.
#[derive(Default)]
pub struct SegmentDiscovery;

impl SegmentDiscovery {
    /// Construct a discovery service. Stateless: every call re-scans `/dev/shm`.
    pub fn new() -> Self {
        Self
    }

    /// List every map whose control segment is present alongside its
    /// `{name}_memory` log segment.
    pub fn list_segments(&self) -> ShmResult<Vec<SegmentInfo>> {
        let dir = std::path::Path::new(SHM_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries: HashSet<String> = std::fs::read_dir(dir)
            .map_err(|e| ShmError::Io { source: e })?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();

        let mut segments = Vec::new();
        for name in &entries {
            if name.ends_with(LOG_SUFFIX) {
                continue;
            }
            if !entries.contains(&format!("{name}{LOG_SUFFIX}")) {
                continue;
            }
            if let Ok(info) = self.describe(name) {
                segments.push(info);
            }
        }

        segments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(segments)
    }

    /// Describe a single map by name, reading its control header directly.
    pub fn describe(&self, name: &str) -> ShmResult<SegmentInfo> {
        let control = SharedMemorySegment::attach(name)?;
        let header = ControlHeader::from_bytes(control.bytes());
        let lock_owner_pid = header.lock_owner_pid();
        Ok(SegmentInfo {
            name: name.to_string(),
            size: control.size(),
            lock_owner_pid,
            lock_owner_alive: lock_owner_pid != 0 && is_process_alive(lock_owner_pid),
            snapshot_epoch: header.snapshot_epoch(),
            stream_end: header.stream_end(),
            shared_lock: header.shared_lock_flag(),
            recurse: header.recurse_flag(),
        })
    }

    /// Find a single map by name, returning `None` rather than erroring if
    /// it is not currently present.
    pub fn find_segment(&self, name: &str) -> ShmResult<Option<SegmentInfo>> {
        match self.describe(name) {
            Ok(info) => Ok(Some(info)),
            Err(ShmError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Aggregate counts across every discovered map.
    pub fn statistics(&self) -> ShmResult<DiscoveryStats> {
        let segments = self.list_segments()?;
        let total_segments = segments.len();
        let stuck_locks = segments
            .iter()
            .filter(|s| s.lock_owner_pid != 0 && !s.lock_owner_alive)
            .count();
        Ok(DiscoveryStats {
            total_segments,
            stuck_locks,
        })
    }
}

/// Summary counts returned by [`SegmentDiscovery::statistics`].
#[derive(Debug, Clone)]
pub struct DiscoveryStats {
    /// Total number of maps found.
    pub total_segments: usize,
    /// Maps whose lock is held by a PID that is no longer alive.
    pub stuck_locks: usize,
}
