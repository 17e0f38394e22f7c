//! Basic functionality tests for the shared-memory map.

use sharded_map_shm::codec::JsonCodec;
use sharded_map_shm::handle::{SharedMap, SharedMapOptions};
use sharded_map_shm::{ShmError, ShmResult};
use std::sync::atomic::{AtomicU32, Ordering};

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique_name(prefix: &str) -> String {
    format!(
        "it_basic_{prefix}_{}_{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

#[test]
fn set_and_get_round_trip() -> ShmResult<()> {
    let name = unique_name("set_get");
    let map: SharedMap<String, String, JsonCodec> =
        SharedMap::create(&name, JsonCodec, SharedMapOptions::default())?;

    map.set("greeting".to_string(), "hello".to_string())?;
    assert_eq!(map.get(&"greeting".to_string())?, Some("hello".to_string()));
    assert_eq!(map.get(&"missing".to_string())?, None);

    map.unlink()
}

#[test]
fn overwrite_replaces_value() -> ShmResult<()> {
    let name = unique_name("overwrite");
    let map: SharedMap<String, i64, JsonCodec> =
        SharedMap::create(&name, JsonCodec, SharedMapOptions::default())?;

    map.set("counter".to_string(), 1)?;
    map.set("counter".to_string(), 2)?;
    assert_eq!(map.get(&"counter".to_string())?, Some(2));

    map.unlink()
}

#[test]
fn delete_removes_key() -> ShmResult<()> {
    let name = unique_name("delete");
    let map: SharedMap<String, i64, JsonCodec> =
        SharedMap::create(&name, JsonCodec, SharedMapOptions::default())?;

    map.set("a".to_string(), 1)?;
    map.delete(&"a".to_string())?;
    assert!(!map.contains(&"a".to_string())?);
    assert_eq!(map.len()?, 0);
    assert!(map.is_empty()?);

    map.unlink()
}

#[test]
fn keys_values_items_reflect_current_contents() -> ShmResult<()> {
    let name = unique_name("kvi");
    let map: SharedMap<String, i64, JsonCodec> =
        SharedMap::create(&name, JsonCodec, SharedMapOptions::default())?;

    map.set("a".to_string(), 1)?;
    map.set("b".to_string(), 2)?;

    let mut keys = map.keys()?;
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

    let mut values = map.values()?;
    values.sort();
    assert_eq!(values, vec![1, 2]);

    let mut items = map.items()?;
    items.sort();
    assert_eq!(items, vec![("a".to_string(), 1), ("b".to_string(), 2)]);

    map.unlink()
}

#[test]
fn second_handle_attaches_and_sees_existing_data() -> ShmResult<()> {
    let name = unique_name("attach");
    let writer: SharedMap<String, i64, JsonCodec> =
        SharedMap::create(&name, JsonCodec, SharedMapOptions::default())?;
    writer.set("x".to_string(), 42)?;

    let reader: SharedMap<String, i64, JsonCodec> =
        SharedMap::attach(&name, JsonCodec, SharedMapOptions::default())?;
    assert_eq!(reader.get(&"x".to_string())?, Some(42));

    writer.unlink()
}

#[test]
fn writes_from_either_handle_are_visible_to_both() -> ShmResult<()> {
    let name = unique_name("bidi");
    let a: SharedMap<String, i64, JsonCodec> =
        SharedMap::create(&name, JsonCodec, SharedMapOptions::default())?;
    let b: SharedMap<String, i64, JsonCodec> =
        SharedMap::attach(&name, JsonCodec, SharedMapOptions::default())?;

    a.set("from_a".to_string(), 1)?;
    assert_eq!(b.get(&"from_a".to_string())?, Some(1));

    b.set("from_b".to_string(), 2)?;
    assert_eq!(a.get(&"from_b".to_string())?, Some(2));

    a.unlink()
}

#[test]
fn attach_rejects_shared_lock_mismatch() -> ShmResult<()> {
    let name = unique_name("mismatch");
    let writer: SharedMap<String, i64, JsonCodec> = SharedMap::create(
        &name,
        JsonCodec,
        SharedMapOptions {
            shared_lock: true,
            ..Default::default()
        },
    )?;

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

    writer.unlink()
}

#[test]
fn close_then_write_is_rejected() -> ShmResult<()> {
    let name = unique_name("closed");
    let map: SharedMap<String, i64, JsonCodec> =
        SharedMap::create(&name, JsonCodec, SharedMapOptions::default())?;
    map.close()?;

    let err = map.set("a".to_string(), 1).unwrap_err();
    assert!(matches!(err, ShmError::AlreadyClosed));

    SharedMap::<String, i64, JsonCodec>::unlink_by_name(&name)
}

#[test]
fn unlink_removes_control_and_log_segments() -> ShmResult<()> {
    let name = unique_name("unlink");
    let map: SharedMap<String, i64, JsonCodec> =
        SharedMap::create(&name, JsonCodec, SharedMapOptions::default())?;
    map.set("a".to_string(), 1)?;
    map.unlink()?;

    let err =
        SharedMap::<String, i64, JsonCodec>::attach(&name, JsonCodec, SharedMapOptions::default())
            .unwrap_err();
    assert!(matches!(err, ShmError::NotFound { .. }));

    Ok(())
}
