//! Error types for shared-memory map operations

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while operating the shared map.
#[derive(Error, Debug)]
pub enum ShmError {
    /// Segment already exists
    #[error("Segment already exists: {name}")]
    AlreadyExists {
        /// Segment name
        name: String,
    },

    /// Segment not found
    #[error("Segment not found: {name}")]
    NotFound {
        /// Segment name
        name: String,
    },

    /// Invalid segment size
    #[error("Invalid segment size: {size} bytes (must be 4KB-1GB, page-aligned)")]
    InvalidSize {
        /// Attempted size in bytes
        size: usize,
    },

    /// Permission denied
    #[error("Permission denied accessing segment: {name}")]
    PermissionDenied {
        /// Segment name
        name: String,
    },

    /// Memory alignment error
    #[error("Memory alignment error: address {address:#x} not aligned to {alignment}")]
    AlignmentError {
        /// Memory address
        address: usize,
        /// Required alignment
        alignment: usize,
    },

    /// Process not found or already dead
    #[error("Process not found: {pid}")]
    ProcessNotFound {
        /// Process ID
        pid: u32,
    },

    /// A handle attached with options that disagree with the creator's.
    #[error("Parameter mismatch attaching to '{name}': {detail}")]
    ParameterMismatch {
        /// Segment name
        name: String,
        /// Human-readable description of which option disagreed
        detail: String,
    },

    /// The fixed-size snapshot segment is too small for a full dump.
    #[error("Snapshot segment too small: needed {needed} bytes, have {available}")]
    FullDumpMemoryFull {
        /// Bytes required for the dump including framing
        needed: usize,
        /// Bytes available in the snapshot segment
        available: usize,
    },

    /// Non-blocking lock acquisition failed because another PID holds it.
    #[error("Cannot acquire lock, held by pid {blocking_pid} (at {ts:?})")]
    CannotAcquireLock {
        /// PID currently holding the lock
        blocking_pid: u32,
        /// Wall-clock time the attempt was made
        ts: std::time::SystemTime,
    },

    /// Blocking lock acquisition with a timeout expired.
    #[error("Cannot acquire lock after {time_passed:?}, held by pid {blocking_pid}")]
    CannotAcquireLockTimeout {
        /// PID that was holding the lock when the timeout elapsed
        blocking_pid: u32,
        /// Wall-clock time spent waiting
        time_passed: Duration,
    },

    /// An optional capability was requested but its dependency is unavailable.
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// The handle was already closed and cannot be used.
    #[error("Map handle already closed")]
    AlreadyClosed,

    /// The log or snapshot bytes failed framing validation and could not be
    /// recovered even after acquiring the lock and reloading the snapshot.
    #[error("Corrupt update stream at position {position}: {detail}; consider a larger buffer_size")]
    StreamCorrupt {
        /// Byte offset in the log where validation failed
        position: usize,
        /// Human-readable description of the failure
        detail: String,
    },

    /// A process forked while holding the shared lock and the child tried to use it.
    #[error("Shared lock held across fork, pid changed from {original_pid} to {current_pid}")]
    ForkedWhileLocked {
        /// PID that originally acquired the lock
        original_pid: u32,
        /// PID observed after fork
        current_pid: u32,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        /// Source JSON error
        #[from]
        source: serde_json::Error,
    },
}

/// Result type for shared memory map operations
pub type ShmResult<T> = Result<T, ShmError>;
