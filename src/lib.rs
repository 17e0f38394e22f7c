//! # Cross-process synchronized key-value map over shared memory
//!
//! A [`handle::SharedMap`] is a `BTreeMap`-like key-value store whose
//! contents are replicated across unrelated OS processes through a handful
//! of named segments under `/dev/shm`: a small control header, an
//! append-only update log, and periodically-rotated snapshots. There is no
//! broker, no socket, and no background thread — every handle is a thin
//! view over the same mapped memory, kept coherent by a shared lock on the
//! write path and an opportunistic catch-up protocol on the read path.
//!
//! ## Coherence model
//!
//! - **Writers** acquire the map's lock, append a framed log record
//!   (`set`/`delete`) to the log segment, and advance the shared
//!   `stream_end` cursor. When the log segment would overflow, the writer
//!   instead serializes the whole map into a fresh snapshot segment and
//!   resets the log (see [`snapshot::rotate`]).
//! - **Readers** take no lock on the common path: they compare their local
//!   cursors against the control header's `stream_end`/`snapshot_epoch` and
//!   replay whatever they are missing ([`handle::SharedMap::apply_update`]).
//!   A reader that observes a torn write retries once under the lock before
//!   raising [`error::ShmError::StreamCorrupt`].
//! - **The lock** is either a process-local reentrant mutex
//!   ([`lock::LocalLock`]) or, for maps created with `shared_lock = true`,
//!   a busy-wait atomic lock living in the control segment itself
//!   ([`lock::SharedLock`]), with stale-lock recovery via
//!   [`lock::SharedLock::steal_from_dead`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sharded_map_shm::codec::JsonCodec;
//! use sharded_map_shm::handle::{SharedMap, SharedMapOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let writer: SharedMap<String, i64, JsonCodec> =
//!     SharedMap::create("counters", JsonCodec, SharedMapOptions::default())?;
//! writer.set("requests".to_string(), 1)?;
//!
//! let reader: SharedMap<String, i64, JsonCodec> =
//!     SharedMap::attach("counters", JsonCodec, SharedMapOptions::default())?;
//! assert_eq!(reader.get(&"requests".to_string())?, Some(1));
//!
//! writer.unlink()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Value encoding
//!
//! Log records and snapshots go through a pluggable [`codec::Codec`]; the
//! default [`codec::JsonCodec`] serializes with `serde_json`. Implement
//! [`codec::Codec`] directly for a different wire format.
//!
//! ## Recursive maps
//!
//! [`recurse`] is a thin convenience layer for wrapping a nested value into
//! its own child map, tracked in a companion register so a parent can
//! unlink every child it ever created in one call
//! ([`recurse::RecurseRegister::unlink_all`]).
//!
//! ## Diagnostics
//!
//! [`discovery::SegmentDiscovery`] enumerates live maps under `/dev/shm`
//! without attaching typed handles, and [`lifecycle::SegmentCleanup`] sweeps
//! for maps whose creating process has died, for operators and tests that
//! need to account for or reclaim segments a crashed process left behind.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod consts;
pub mod control;
pub mod discovery;
pub mod error;
pub mod handle;
pub mod lifecycle;
pub mod lock;
pub mod log;
pub mod platform;
pub mod recurse;
pub mod segment;
pub mod snapshot;

pub use codec::{Codec, JsonCodec, LogRecord};
pub use error::{ShmError, ShmResult};
pub use handle::{MapLockGuard, MapStatus, SharedMap, SharedMapOptions};
pub use lock::{Lock, LocalLock, SharedLock, SharedLockStatus};
pub use consts::{SHM_MAX_SIZE, SHM_MIN_SIZE};
pub use recurse::{Nested, RecurseRegister};
pub use segment::SharedMemorySegment;

/// Initialize the process-wide `tracing` subscriber exactly once. Safe to
/// call from multiple handles in the same process; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
