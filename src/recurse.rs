//! Recursive map composition: values that are themselves maps.
//!
//! `original_source/UltraDict.py`'s `__setitem__` auto-wraps a plain `dict`
//! value into a child `UltraDict`, tracking every child's segment name in a
//! companion *register* map so the parent can unlink them all on close.
//! Rust has no runtime `type(item) == dict` check, so the wrapping decision
//! becomes an explicit [`Nested`] the caller opts into rather than something
//! this module infers from the value type.

use crate::codec::{Codec, JsonCodec};
use crate::error::ShmResult;
use crate::handle::{unlink_map_by_name, SharedMap, SharedMapOptions};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// A value that is stored inline, or delegated to a child map named by its
/// control segment name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Nested<V> {
    /// An ordinary, inline value.
    Value(V),
    /// The name of a child map holding this value's contents.
    Map(String),
}

static CHILD_SEQ: AtomicU32 = AtomicU32::new(0);

/// Generate a unique child segment name under `parent_name`, standing in for
/// an implicit default-generated name for a nested map.
pub fn unique_child_name(parent_name: &str) -> String {
    format!(
        "{parent_name}_child_{}_{}",
        std::process::id(),
        CHILD_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Tracks the segment names of every child map created under a
/// recurse-enabled parent, so the parent can unlink them all at once. The
/// register is itself an ordinary [`SharedMap`] rather than a separate
/// data structure.
pub struct RecurseRegister {
    map: SharedMap<String, bool, JsonCodec>,
}

impl RecurseRegister {
    /// Conventional register name for a parent map named `parent_name`.
    pub fn name_for(parent_name: &str) -> String {
        format!("{parent_name}_register")
    }

    /// Create a brand-new, empty register for `parent_name`.
    pub fn create(parent_name: &str, shared_lock: bool) -> ShmResult<Self> {
        let map = SharedMap::create(
            &Self::name_for(parent_name),
            JsonCodec,
            SharedMapOptions {
                shared_lock,
                auto_unlink: false,
                ..Default::default()
            },
        )?;
        Ok(Self { map })
    }

    /// Attach to the register of an already-created recurse-enabled parent.
    pub fn attach(parent_name: &str, shared_lock: bool) -> ShmResult<Self> {
        let map = SharedMap::attach(
            &Self::name_for(parent_name),
            JsonCodec,
            SharedMapOptions {
                shared_lock,
                auto_unlink: false,
                ..Default::default()
            },
        )?;
        Ok(Self { map })
    }

    /// Record `child_name` as a child of this parent, if not already present.
    pub fn register_child(&self, child_name: &str) -> ShmResult<()> {
        if !self.map.contains(&child_name.to_string())? {
            self.map.set(child_name.to_string(), true)?;
        }
        Ok(())
    }

    /// Every currently-registered child's segment name.
    pub fn child_names(&self) -> ShmResult<Vec<String>> {
        self.map.keys()
    }

    /// Unlink every registered child's segments, then the register itself.
    /// Mirrors `unlink_recursed`'s loop over `self.recurse_register.keys()`
    /// followed by `self.recurse_register.close(unlink=True)`.
    pub fn unlink_all(self) -> ShmResult<()> {
        for name in self.map.keys()? {
            unlink_map_by_name(&name)?;
        }
        self.map.unlink()
    }
}

/// Create a new child map under `parent_name` and register it, so a later
/// [`RecurseRegister::unlink_all`] on the parent's register also unlinks it.
/// Construct the child with the same `shared_lock` and buffer sizing as the
/// parent, then record its name if this is the first time we have seen it.
pub fn create_child<K2, V2, C2>(
    parent_name: &str,
    register: &RecurseRegister,
    codec: C2,
    options: SharedMapOptions,
) -> ShmResult<SharedMap<K2, V2, C2>>
where
    K2: Ord + Clone + Send + Sync,
    V2: Clone + Send + Sync,
    C2: Codec<K2, V2>,
{
    let name = unique_child_name(parent_name);
    let child = SharedMap::create(&name, codec, options)?;
    register.register_child(&name)?;
    Ok(child)
}
