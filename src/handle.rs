//! The unified read-write map handle.
//!
//! `original_source/UltraDict.py` exposes one `UltraDict` object per
//! process that both reads and writes; this crate follows the same shape
//! rather than splitting into separate reader/writer handles, since every
//! operation here needs the lock, the local cache and both cursors together.

use crate::codec::{Codec, LogRecord};
use crate::consts::CONTROL_SEGMENT_SIZE;
use crate::control::ControlHeader;
use crate::error::{ShmError, ShmResult};
use crate::lock::{Lock, LocalLock, SharedLock, SharedLockStatus};
use crate::log;
use crate::segment::SharedMemorySegment;
use crate::snapshot;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Name suffix used for a map's log segment.
const LOG_SUFFIX: &str = "_memory";

fn log_name(name: &str) -> String {
    format!("{name}{LOG_SUFFIX}")
}

/// Maximum number of retries when attaching to a snapshot whose name was
/// observed mid-rotation, before falling back to a lock-protected retry.
const SNAPSHOT_ATTACH_RETRIES: u32 = 3;

/// Construction/attachment options for a [`SharedMap`].
#[derive(Debug, Clone)]
pub struct SharedMapOptions {
    /// Capacity in bytes of the append-only update log.
    pub buffer_size: usize,
    /// Use the cross-process atomic lock instead of a process-local one.
    pub shared_lock: bool,
    /// If set, snapshots are written into one fixed-size, permanent segment
    /// instead of a freshly-created segment per rotation.
    pub snapshot_size: Option<usize>,
    /// Unlink all backing segments when the creating handle closes.
    pub auto_unlink: bool,
    /// Busy-wait backoff between failed shared-lock acquire attempts.
    pub lock_sleep: Duration,
    /// Enables recursive-child semantics: persisted as a header flag purely
    /// for attach-time consistency
    /// checking, same as `shared_lock`. The nested-map composition itself
    /// lives in `recurse.rs`, layered above this handle.
    pub recurse: bool,
}

impl Default for SharedMapOptions {
    fn default() -> Self {
        Self {
            buffer_size: 10 * CONTROL_SEGMENT_SIZE,
            shared_lock: false,
            snapshot_size: None,
            auto_unlink: false,
            lock_sleep: Duration::from_micros(1),
            recurse: false,
        }
    }
}

/// Debug snapshot of a map's internal state, mirroring
/// `original_source/UltraDict.py`'s `status()`.
#[derive(Debug, Clone)]
pub struct MapStatus {
    /// Segment name.
    pub name: String,
    /// Local replay cursor into the log.
    pub local_stream_pos: u32,
    /// Remote (shared) replay cursor.
    pub remote_stream_pos: u32,
    /// Local snapshot epoch the cache was last loaded from.
    pub local_snapshot_epoch: u32,
    /// Remote (shared) snapshot epoch.
    pub remote_snapshot_epoch: u32,
    /// Lock state, if this map uses the shared (cross-process) lock.
    pub shared_lock: Option<SharedLockStatus>,
    /// Whether this handle created the segments (vs. attached to them).
    pub is_creator: bool,
    /// Whether this handle has been closed.
    pub closed: bool,
}

/// A cross-process synchronized key-value map backed by named shared-memory
/// segments. See the crate-level docs for the coherence model.
pub struct SharedMap<K, V, C> {
    name: String,
    control: SharedMemorySegment,
    log: SharedMemorySegment,
    codec: C,
    lock: Box<dyn Lock>,
    data: RwLock<BTreeMap<K, V>>,
    local_stream_pos: AtomicU32,
    local_snapshot_epoch: AtomicU32,
    options: SharedMapOptions,
    is_creator: bool,
    closed: AtomicBool,
}

impl<K, V, C> SharedMap<K, V, C>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
    C: Codec<K, V>,
{
    fn control_header(&self) -> ControlHeader {
        ControlHeader::from_bytes(self.control.bytes())
    }

    /// Create a brand-new map, failing with [`ShmError::AlreadyExists`] if
    /// `name` is already taken.
    pub fn create(name: &str, codec: C, options: SharedMapOptions) -> ShmResult<Self> {
        let control = SharedMemorySegment::create(name, CONTROL_SEGMENT_SIZE)?;
        let log_size = round_up_to_page(options.buffer_size);
        let log = match SharedMemorySegment::create(&log_name(name), log_size) {
            Ok(log) => log,
            Err(e) => {
                let _ = SharedMemorySegment::unlink(name);
                return Err(e);
            }
        };

        let header = ControlHeader::from_bytes(control.bytes());
        header.set_shared_lock_flag(options.shared_lock);
        header.set_recurse_flag(options.recurse);
        if let Some(size) = options.snapshot_size {
            header.set_snapshot_fixed_size(size as u32);
        }

        let lock: Box<dyn Lock> = if options.shared_lock {
            Box::new(SharedLock::new(header, options.lock_sleep))
        } else {
            Box::new(LocalLock::new())
        };

        Ok(Self {
            name: name.to_string(),
            control,
            log,
            codec,
            lock,
            data: RwLock::new(BTreeMap::new()),
            local_stream_pos: AtomicU32::new(0),
            local_snapshot_epoch: AtomicU32::new(0),
            options,
            is_creator: true,
            closed: AtomicBool::new(false),
        })
    }

    /// Attach to an existing map, failing with [`ShmError::ParameterMismatch`]
    /// if `options.shared_lock` disagrees with the creator's choice.
    pub fn attach(name: &str, codec: C, mut options: SharedMapOptions) -> ShmResult<Self> {
        let control = SharedMemorySegment::attach(name)?;
        let log = SharedMemorySegment::attach(&log_name(name))?;

        let header = ControlHeader::from_bytes(control.bytes());
        let remote_shared_lock = header.shared_lock_flag();
        if options.shared_lock != remote_shared_lock {
            return Err(ShmError::ParameterMismatch {
                name: name.to_string(),
                detail: format!(
                    "shared_lock={} requested but creator used shared_lock={remote_shared_lock}",
                    options.shared_lock
                ),
            });
        }

        let remote_recurse = header.recurse_flag();
        if options.recurse != remote_recurse {
            return Err(ShmError::ParameterMismatch {
                name: name.to_string(),
                detail: format!(
                    "recurse={} requested but creator used recurse={remote_recurse}",
                    options.recurse
                ),
            });
        }

        let remote_fixed_size = header.snapshot_fixed_size();
        if remote_fixed_size > 0 {
            options.snapshot_size = Some(remote_fixed_size as usize);
        }

        let lock: Box<dyn Lock> = if options.shared_lock {
            Box::new(SharedLock::new(header, options.lock_sleep))
        } else {
            Box::new(LocalLock::new())
        };

        let map = Self {
            name: name.to_string(),
            control,
            log,
            codec,
            lock,
            data: RwLock::new(BTreeMap::new()),
            local_stream_pos: AtomicU32::new(0),
            local_snapshot_epoch: AtomicU32::new(0),
            options,
            is_creator: false,
            closed: AtomicBool::new(false),
        };
        map.apply_update()?;
        Ok(map)
    }

    /// Replay any changes published since this handle last caught up:
    /// a snapshot reload if the remote epoch has advanced, followed by
    /// replaying the log up to the remote stream-end cursor. Lock-free on
    /// the common path; retries once under the lock if the log was found to
    /// be corrupt.
    pub fn apply_update(&self) -> ShmResult<()> {
        self.ensure_open()?;
        match self.apply_update_once() {
            Ok(()) => Ok(()),
            Err(ShmError::StreamCorrupt { position, detail }) => {
                warn!(
                    position,
                    %detail,
                    "update stream corrupt, retrying once under lock"
                );
                self.lock.acquire()?;
                let result = self.apply_update_once();
                let _ = self.lock.release();
                result.map_err(|_| ShmError::StreamCorrupt { position, detail })
            }
            Err(e) => Err(e),
        }
    }

    fn apply_update_once(&self) -> ShmResult<()> {
        let header = self.control_header();

        let remote_epoch = header.snapshot_epoch();
        if self.local_snapshot_epoch.load(Ordering::Acquire) < remote_epoch {
            self.load_snapshot(&header)?;
        }

        let remote_pos = header.stream_end();
        let local_pos = self.local_stream_pos.load(Ordering::Acquire);
        if local_pos < remote_pos {
            let mut data = self.data.write();
            let codec = &self.codec;
            let new_pos = log::replay(self.log.bytes(), local_pos, remote_pos, |payload| {
                match codec.decode_record(payload)? {
                    LogRecord::Set { key, value } => {
                        data.insert(key, value);
                    }
                    LogRecord::Delete { key } => {
                        data.remove(&key);
                    }
                }
                Ok(())
            })?;
            self.local_stream_pos.store(new_pos, Ordering::Release);
        }
        Ok(())
    }

    fn load_snapshot(&self, header: &ControlHeader) -> ShmResult<()> {
        // §3.5/§8.3: a snapshot name is published before snapshot_epoch is
        // ever bumped past 0, so this combination can never be observed.
        debug_assert!(
            header.snapshot_epoch() == 0 || !header.snapshot_name().is_empty(),
            "snapshot_epoch={} > 0 but no snapshot_name is published",
            header.snapshot_epoch()
        );
        let segment = snapshot::attach_current(
            header,
            SNAPSHOT_ATTACH_RETRIES,
            self.options.lock_sleep,
        )?;
        let payload = snapshot::read_payload(&segment)?;
        let loaded = self.codec.decode_snapshot(payload)?;
        let epoch_after_load = header.snapshot_epoch();

        *self.data.write() = loaded;
        self.local_snapshot_epoch
            .store(epoch_after_load, Ordering::Release);
        self.local_stream_pos.store(0, Ordering::Release);
        Ok(())
    }

    fn append(&self, record: LogRecord<K, V>) -> ShmResult<()> {
        self.lock.acquire()?;
        let result = self.append_locked(record);
        let _ = self.lock.release();
        result
    }

    /// Apply `record`, then either append it to the log or — if it would
    /// overflow — rotate a snapshot that already reflects it. The cache
    /// mutation happens before the log append so that a rotation triggered
    /// by this same record dumps a snapshot that includes it; without this,
    /// a write too large for the log would be silently dropped.
    fn append_locked(&self, record: LogRecord<K, V>) -> ShmResult<()> {
        self.apply_update_once()?;

        let encoded = self.codec.encode_record(&record)?;
        let framed = log::frame(&encoded);
        let header = self.control_header();
        let start = header.stream_end();

        {
            let mut data = self.data.write();
            apply_record(&mut data, record);
        }

        match log::try_append(self.log.bytes_mut_shared(), self.log.size(), start, &framed) {
            Some(end) => {
                header.set_stream_end(end);
                Ok(())
            }
            None => {
                debug!(name = %self.name, "log buffer full, rotating snapshot");
                self.dump_locked()
            }
        }
    }

    /// Serialize the in-memory map and publish it as the current snapshot,
    /// resetting the log. Both `set` and `delete` rotate a
    /// snapshot before discarding an update that would not fit the log.
    pub fn dump(&self) -> ShmResult<()> {
        self.lock.acquire()?;
        let result = self.dump_locked();
        let _ = self.lock.release();
        result
    }

    fn dump_locked(&self) -> ShmResult<()> {
        self.apply_update_once()?;
        let payload = self.codec.encode_snapshot(&self.data.read())?;
        let header = self.control_header();
        snapshot::rotate(&self.name, &header, &payload, self.options.snapshot_size)?;
        self.local_snapshot_epoch
            .store(header.snapshot_epoch(), Ordering::Release);
        self.local_stream_pos.store(0, Ordering::Release);
        Ok(())
    }

    /// Insert or overwrite `key`.
    pub fn set(&self, key: K, value: V) -> ShmResult<()> {
        self.ensure_open()?;
        self.append(LogRecord::Set { key, value })
    }

    /// Remove `key`, if present.
    pub fn delete(&self, key: &K) -> ShmResult<()> {
        self.ensure_open()?;
        self.append(LogRecord::Delete { key: key.clone() })
    }

    /// Hold the map's lock across an arbitrary read-modify-write, mirroring
    /// `original_source/UltraDict.py`'s `with d.lock: d['counter'] += 1`
    /// (SPEC_FULL §8.2 scenario 2). The lock is reentrant per handle, so
    /// `get`/`set`/`delete`/`dump` called while the guard is held simply
    /// nest one level deeper rather than deadlocking. Blocks until acquired.
    pub fn lock(&self) -> ShmResult<MapLockGuard<'_, K, V, C>> {
        self.ensure_open()?;
        self.lock.acquire()?;
        Ok(MapLockGuard { map: self })
    }

    /// Non-blocking variant of [`Self::lock`]: fails immediately with
    /// [`ShmError::CannotAcquireLock`] if another handle holds the lock
    /// (§4.2/§6.4's `block=false` contract).
    pub fn try_lock(&self) -> ShmResult<MapLockGuard<'_, K, V, C>> {
        self.ensure_open()?;
        self.lock.try_acquire()?;
        Ok(MapLockGuard { map: self })
    }

    /// Blocks up to `timeout`, then fails with
    /// [`ShmError::CannotAcquireLockTimeout`] — unless `steal_after_timeout`
    /// is set, in which case a timed-out attempt checks whether the current
    /// holder's process is dead and, if so, steals the lock from it and
    /// keeps waiting (§4.2/§8.2 scenario 5).
    pub fn lock_with_timeout(
        &self,
        timeout: Duration,
        steal_after_timeout: bool,
    ) -> ShmResult<MapLockGuard<'_, K, V, C>> {
        self.ensure_open()?;
        self.lock.acquire_with_timeout(timeout, steal_after_timeout)?;
        Ok(MapLockGuard { map: self })
    }

    /// Look up `key`, catching up with any pending updates first.
    pub fn get(&self, key: &K) -> ShmResult<Option<V>> {
        self.apply_update()?;
        Ok(self.data.read().get(key).cloned())
    }

    /// True if `key` is present, catching up with any pending updates first.
    pub fn contains(&self, key: &K) -> ShmResult<bool> {
        self.apply_update()?;
        Ok(self.data.read().contains_key(key))
    }

    /// Number of entries, catching up with any pending updates first.
    pub fn len(&self) -> ShmResult<usize> {
        self.apply_update()?;
        Ok(self.data.read().len())
    }

    /// True if the map has no entries, catching up with any pending updates first.
    pub fn is_empty(&self) -> ShmResult<bool> {
        Ok(self.len()? == 0)
    }

    /// All keys, catching up with any pending updates first.
    pub fn keys(&self) -> ShmResult<Vec<K>> {
        self.apply_update()?;
        Ok(self.data.read().keys().cloned().collect())
    }

    /// All values, catching up with any pending updates first.
    pub fn values(&self) -> ShmResult<Vec<V>> {
        self.apply_update()?;
        Ok(self.data.read().values().cloned().collect())
    }

    /// All key-value pairs, catching up with any pending updates first.
    pub fn items(&self) -> ShmResult<Vec<(K, V)>> {
        self.apply_update()?;
        Ok(self.data.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Insert every pair from `other`, each as its own framed log record
    /// (or rotation), mirroring `original_source/UltraDict.py`'s
    /// `update()`/`__ior__`. Not a single atomic batch: each pair is applied
    /// through the ordinary `set` path, so a concurrent reader may observe a
    /// partial prefix of `other` while this call is in progress.
    pub fn update(&self, other: impl IntoIterator<Item = (K, V)>) -> ShmResult<()> {
        for (key, value) in other {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Internal debug helper exposing the control state, mirroring
    /// `original_source/UltraDict.py`'s `status()`.
    pub fn status(&self) -> MapStatus {
        let header = self.control_header();
        MapStatus {
            name: self.name.clone(),
            local_stream_pos: self.local_stream_pos.load(Ordering::Acquire),
            remote_stream_pos: header.stream_end(),
            local_snapshot_epoch: self.local_snapshot_epoch.load(Ordering::Acquire),
            remote_snapshot_epoch: header.snapshot_epoch(),
            shared_lock: self
                .options
                .shared_lock
                .then(|| SharedLock::new(header, self.options.lock_sleep).status()),
            is_creator: self.is_creator,
            closed: self.closed.load(Ordering::Acquire),
        }
    }

    fn ensure_open(&self) -> ShmResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(ShmError::AlreadyClosed)
        } else {
            Ok(())
        }
    }

    /// Mark this handle closed. Does not unlink the backing segments; call
    /// [`Self::unlink`] for that.
    pub fn close(&self) -> ShmResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    /// Close and unlink the backing control, log and (if dynamic) snapshot
    /// segments.
    pub fn unlink(&self) -> ShmResult<()> {
        self.close()?;
        let header = self.control_header();
        let snapshot_name = header.snapshot_name();
        SharedMemorySegment::unlink(&self.name)?;
        SharedMemorySegment::unlink(&log_name(&self.name))?;
        if !snapshot_name.is_empty() {
            let _ = SharedMemorySegment::unlink(&snapshot_name);
        }
        Ok(())
    }

    /// Unlink a map's segments by name without attaching a typed handle,
    /// used to clean up after crashes.
    pub fn unlink_by_name(name: &str) -> ShmResult<()> {
        unlink_map_by_name(name)
    }
}

/// RAII guard returned by [`SharedMap::lock`]/[`SharedMap::try_lock`]/
/// [`SharedMap::lock_with_timeout`], holding the map's lock for as long as
/// it is alive. Dropping it releases one level of reentrancy, same as
/// `original_source/UltraDict.py`'s `lock` context manager.
pub struct MapLockGuard<'a, K, V, C> {
    map: &'a SharedMap<K, V, C>,
}

impl<K, V, C> Drop for MapLockGuard<'_, K, V, C> {
    fn drop(&mut self) {
        let _ = self.map.lock.release();
    }
}

/// Unlink a map's control, log and (if dynamic) snapshot segments by name,
/// without needing a typed handle. Used both by
/// [`SharedMap::unlink_by_name`] and by the recursive-child cleanup in
/// `recurse.rs`, neither of which has `K`/`V`/`C` to name.
pub fn unlink_map_by_name(name: &str) -> ShmResult<()> {
    if let Ok(control) = SharedMemorySegment::attach(name) {
        let header = ControlHeader::from_bytes(control.bytes());
        let snapshot_name = header.snapshot_name();
        if !snapshot_name.is_empty() {
            let _ = SharedMemorySegment::unlink(&snapshot_name);
        }
    }
    SharedMemorySegment::unlink(name)?;
    SharedMemorySegment::unlink(&log_name(name))?;
    Ok(())
}

impl<K, V, C> Drop for SharedMap<K, V, C> {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        if self.is_creator && self.options.auto_unlink {
            let _ = SharedMemorySegment::unlink(&self.name);
            let _ = SharedMemorySegment::unlink(&log_name(&self.name));
        }
    }
}

fn round_up_to_page(size: usize) -> usize {
    let page = crate::consts::SHM_MIN_SIZE;
    size.div_ceil(page) * page
}

fn apply_record<K: Ord, V>(data: &mut BTreeMap<K, V>, record: LogRecord<K, V>) {
    match record {
        LogRecord::Set { key, value } => {
            data.insert(key, value);
        }
        LogRecord::Delete { key } => {
            data.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use std::sync::atomic::AtomicU32 as TestCounter;

    static COUNTER: TestCounter = TestCounter::new(0);

    fn unique_name(prefix: &str) -> String {
        format!(
            "test_map_{prefix}_{}_{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        )
    }

    #[test]
    fn set_get_delete_round_trip() {
        let name = unique_name("basic");
        let map: SharedMap<String, i64, JsonCodec> =
            SharedMap::create(&name, JsonCodec, SharedMapOptions::default()).unwrap();

        map.set("a".to_string(), 1).unwrap();
        map.set("b".to_string(), 2).unwrap();
        assert_eq!(map.get(&"a".to_string()).unwrap(), Some(1));
        assert_eq!(map.len().unwrap(), 2);

        map.delete(&"a".to_string()).unwrap();
        assert_eq!(map.get(&"a".to_string()).unwrap(), None);
        assert_eq!(map.len().unwrap(), 1);

        map.unlink().unwrap();
    }

    #[test]
    fn update_applies_every_pair() {
        let name = unique_name("update");
        let map: SharedMap<String, i64, JsonCodec> =
            SharedMap::create(&name, JsonCodec, SharedMapOptions::default()).unwrap();

        map.set("a".to_string(), 1).unwrap();
        map.update([("a".to_string(), 10), ("b".to_string(), 2)])
            .unwrap();

        let mut items = map.items().unwrap();
        items.sort();
        assert_eq!(
            items,
            vec![("a".to_string(), 10), ("b".to_string(), 2)]
        );

        map.unlink().unwrap();
    }

    #[test]
    fn second_handle_sees_writes_after_apply_update() {
        let name = unique_name("shared");
        let writer: SharedMap<String, i64, JsonCodec> =
            SharedMap::create(&name, JsonCodec, SharedMapOptions::default()).unwrap();
        writer.set("x".to_string(), 10).unwrap();

        let reader: SharedMap<String, i64, JsonCodec> =
            SharedMap::attach(&name, JsonCodec, SharedMapOptions::default()).unwrap();
        assert_eq!(reader.get(&"x".to_string()).unwrap(), Some(10));

        writer.set("y".to_string(), 20).unwrap();
        assert_eq!(reader.get(&"y".to_string()).unwrap(), Some(20));

        writer.unlink().unwrap();
    }

    #[test]
    fn attach_rejects_shared_lock_mismatch() {
        let name = unique_name("mismatch");
        let writer: SharedMap<String, i64, JsonCodec> = SharedMap::create(
            &name,
            JsonCodec,
            SharedMapOptions {
                shared_lock: false,
                ..Default::default()
            },
        )
        .unwrap();

        let err = SharedMap::<String, i64, JsonCodec>::attach(
            &name,
            JsonCodec,
            SharedMapOptions {
                shared_lock: true,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ShmError::ParameterMismatch { .. }));

        writer.unlink().unwrap();
    }

    #[test]
    fn attach_rejects_recurse_mismatch() {
        let name = unique_name("recurse_mismatch");
        let writer: SharedMap<String, i64, JsonCodec> = SharedMap::create(
            &name,
            JsonCodec,
            SharedMapOptions {
                recurse: true,
                ..Default::default()
            },
        )
        .unwrap();

        let err = SharedMap::<String, i64, JsonCodec>::attach(
            &name,
            JsonCodec,
            SharedMapOptions {
                recurse: false,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ShmError::ParameterMismatch { .. }));

        writer.unlink().unwrap();
    }

    #[test]
    fn dump_survives_a_full_log_buffer() {
        let name = unique_name("rotate");
        let map: SharedMap<String, String, JsonCodec> = SharedMap::create(
            &name,
            JsonCodec,
            SharedMapOptions {
                buffer_size: crate::consts::SHM_MIN_SIZE,
                ..Default::default()
            },
        )
        .unwrap();

        for i in 0..500 {
            map.set(format!("key-{i}"), "x".repeat(32)).unwrap();
        }
        assert_eq!(map.len().unwrap(), 500);

        map.unlink().unwrap();
    }

    #[test]
    fn a_single_write_too_big_for_the_log_survives_its_own_rotation() {
        let name = unique_name("rotate_single");
        let map: SharedMap<String, String, JsonCodec> = SharedMap::create(
            &name,
            JsonCodec,
            SharedMapOptions {
                buffer_size: crate::consts::SHM_MIN_SIZE,
                ..Default::default()
            },
        )
        .unwrap();

        let huge = "x".repeat(50_000);
        map.set("huge".to_string(), huge.clone()).unwrap();

        let status = map.status();
        assert_eq!(status.remote_snapshot_epoch, 1);
        assert_eq!(status.remote_stream_pos, 0);
        assert_eq!(map.get(&"huge".to_string()).unwrap(), Some(huge));

        map.unlink().unwrap();
    }

    #[test]
    fn closed_handle_rejects_writes() {
        let name = unique_name("closed");
        let map: SharedMap<String, i64, JsonCodec> =
            SharedMap::create(&name, JsonCodec, SharedMapOptions::default()).unwrap();
        map.close().unwrap();
        let err = map.set("a".to_string(), 1).unwrap_err();
        assert!(matches!(err, ShmError::AlreadyClosed));
        SharedMap::<String, i64, JsonCodec>::unlink_by_name(&name).unwrap();
    }
}
