//! End-to-end scenarios for the coherence engine: multi-handle writes,
//! counter parallelism under the shared lock, recursive maps, snapshot
//! rotation, stale-lock recovery and create/attach mismatches.

use sharded_map_shm::codec::JsonCodec;
use sharded_map_shm::control::ControlHeader;
use sharded_map_shm::handle::{SharedMap, SharedMapOptions};
use sharded_map_shm::recurse::{create_child, Nested, RecurseRegister};
use sharded_map_shm::{Lock, SharedLock, ShmError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique_name(prefix: &str) -> String {
    format!(
        "it_rt_{prefix}_{}_{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// Scenario 1: two handles writing disjoint key ranges converge to one map.
#[test]
fn two_handles_simple_writes_converge() {
    let name = unique_name("two_handles");
    const HALF: i64 = 2_000;

    let a: SharedMap<i64, i64, JsonCodec> =
        SharedMap::create(&name, JsonCodec, SharedMapOptions::default()).unwrap();
    for k in 0..HALF {
        a.set(k, k).unwrap();
    }

    let b: SharedMap<i64, i64, JsonCodec> =
        SharedMap::attach(&name, JsonCodec, SharedMapOptions::default()).unwrap();
    for k in HALF..2 * HALF {
        b.set(k, k).unwrap();
    }

    assert_eq!(a.len().unwrap(), (2 * HALF) as usize);
    assert_eq!(b.len().unwrap(), (2 * HALF) as usize);
    for k in [0, HALF - 1, HALF, 2 * HALF - 1] {
        assert_eq!(a.get(&k).unwrap(), Some(k));
        assert_eq!(b.get(&k).unwrap(), Some(k));
    }

    a.unlink().unwrap();
}

/// Scenario 2: four threads incrementing a shared map entry under the map's
/// lock, each doing a `get` + `set` read-modify-write, leave it equal to the
/// total number of increments (SPEC_FULL §8.2.2, mirroring
/// `original_source/UltraDict.py`'s `with d.lock: d['counter'] += 1`).
#[test]
fn counter_parallelism_under_shared_lock() {
    let name = unique_name("counter");
    let threads = 4;
    let per_thread = 2_000;

    let writer: SharedMap<String, i64, JsonCodec> = SharedMap::create(
        &name,
        JsonCodec,
        SharedMapOptions {
            shared_lock: true,
            ..Default::default()
        },
    )
    .unwrap();
    writer.set("counter".to_string(), 0).unwrap();

    let mut handles = Vec::new();
    for _ in 0..threads {
        let name = name.clone();
        handles.push(thread::spawn(move || {
            let map: SharedMap<String, i64, JsonCodec> = SharedMap::attach(
                &name,
                JsonCodec,
                SharedMapOptions {
                    shared_lock: true,
                    ..Default::default()
                },
            )
            .unwrap();
            for _ in 0..per_thread {
                let _guard = map.lock().unwrap();
                let current = map.get(&"counter".to_string()).unwrap().unwrap();
                map.set("counter".to_string(), current + 1).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    writer.apply_update().unwrap();
    assert_eq!(
        writer.get(&"counter".to_string()).unwrap(),
        Some(threads as i64 * per_thread)
    );

    writer.unlink().unwrap();
}

/// Scenario 3: a nested map, mutated through a second handle, is visible as
/// the updated value from both handles after `apply_update`.
#[test]
fn nested_override_is_visible_from_both_handles() {
    let parent_name = unique_name("nested_parent");
    let register = RecurseRegister::create(&parent_name, false).unwrap();
    let parent: SharedMap<String, Nested<i64>, JsonCodec> =
        SharedMap::create(&parent_name, JsonCodec, SharedMapOptions::default()).unwrap();

    let child: SharedMap<i64, i64, JsonCodec> =
        create_child(&parent_name, &register, JsonCodec, SharedMapOptions::default()).unwrap();
    let child_name = child.status().name;
    child.set(0, 1).unwrap();
    parent
        .set("nested".to_string(), Nested::Map(child_name.clone()))
        .unwrap();

    let child_attached: SharedMap<i64, i64, JsonCodec> =
        SharedMap::attach(&child_name, JsonCodec, SharedMapOptions::default()).unwrap();
    child_attached.set(0, 2).unwrap();

    child.apply_update().unwrap();
    assert_eq!(child.get(&0).unwrap(), Some(2));

    parent.unlink().unwrap();
    register.unlink_all().unwrap();
}

/// Scenario 4: a value too large for the log forces an immediate snapshot
/// rotation, and a fresh handle reads the value back intact.
#[test]
fn huge_value_forces_rotation() {
    let name = unique_name("huge_value");
    let map: SharedMap<String, String, JsonCodec> = SharedMap::create(
        &name,
        JsonCodec,
        SharedMapOptions {
            buffer_size: 10_000,
            ..Default::default()
        },
    )
    .unwrap();

    let huge = "x".repeat(50_000);
    map.set("huge".to_string(), huge.clone()).unwrap();

    let status = map.status();
    assert_eq!(status.remote_snapshot_epoch, 1);
    assert_eq!(status.remote_stream_pos, 0);

    let fresh: SharedMap<String, String, JsonCodec> =
        SharedMap::attach(&name, JsonCodec, SharedMapOptions::default()).unwrap();
    assert_eq!(fresh.get(&"huge".to_string()).unwrap(), Some(huge));

    map.unlink().unwrap();
}

/// Scenario 5: a lock holder that "crashes" while holding the lock (its
/// guard is leaked rather than released) does not stall the remaining
/// threads, which recover via `steal_from_dead` after a timed-out acquire.
#[test]
fn stale_lock_recovery_lets_remaining_threads_finish() {
    let buf = Arc::new(vec![0u8; sharded_map_shm::consts::CONTROL_HEADER_LEN]);

    // Simulate a holder that died while holding the lock: no real thread can
    // be killed uncatchably from a test, so the "crash" is modeled directly
    // by planting a dead PID as the owner with the lock word held.
    let crashed_pid = u32::MAX;
    {
        let header = ControlHeader::from_bytes(&buf);
        header.set_lock_owner_pid(crashed_pid);
        header.lock_word_byte().store(1, Ordering::Release);
    }
    assert!(!sharded_map_shm::platform::is_process_alive(crashed_pid));

    let threads = 3;
    let per_thread = 100;
    let mut handles = Vec::new();
    for _ in 0..threads {
        let buf = buf.clone();
        handles.push(thread::spawn(move || {
            let header = ControlHeader::from_bytes(&buf);
            let lock = SharedLock::new(header, Duration::from_micros(1));
            let mut completed = 0;
            for _ in 0..per_thread {
                // steal_after_timeout=true: the engine itself checks the
                // blocking PID once the timeout elapses and steals from it
                // if it's dead, instead of failing with
                // CannotAcquireLockTimeout (SPEC_FULL §8.2.5).
                match lock.acquire_with_timeout(Duration::from_millis(50), true) {
                    Ok(()) => {
                        lock.release().unwrap();
                        completed += 1;
                    }
                    Err(e) => panic!("unexpected lock error: {e:?}"),
                }
            }
            completed
        }));
    }

    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, threads * per_thread);
}

/// Scenario 6: attaching with a different `shared_lock` setting than the
/// creator used is rejected.
#[test]
fn create_attach_mismatch_is_rejected() {
    let name = unique_name("mismatch");
    let writer: SharedMap<String, i64, JsonCodec> = SharedMap::create(
        &name,
        JsonCodec,
        SharedMapOptions {
            shared_lock: true,
            ..Default::default()
        },
    )
    .unwrap();

    let err = SharedMap::<String, i64, JsonCodec>::attach(
        &name,
        JsonCodec,
        SharedMapOptions {
            shared_lock: false,
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, ShmError::ParameterMismatch { .. }));

    writer.unlink().unwrap();
}
