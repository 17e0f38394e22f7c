//! Snapshot segment rotation and loading.
//!
//! A snapshot is a single framed record — same `0xFF len 0xFF payload`
//! framing as a log record — holding a full serialized copy of the map.
//! Rotation either reuses one caller-managed fixed-size segment, or creates
//! a fresh dynamically-named segment each time. Readers race the writer
//! during rotation, so loading tolerates transiently-stale names (spec
//! §4.5, `original_source/UltraDict.py`'s `get_full_dump_memory`/`load`).

use crate::control::ControlHeader;
use crate::error::{ShmError, ShmResult};
use crate::log::{frame, framed_len, read_frame};
use crate::segment::SharedMemorySegment;
use std::thread::sleep;
use std::time::Duration;

/// Build the name of a dynamically-created snapshot segment for `base_name`
/// at a given rotation `epoch`. Distinct names per epoch let readers still
/// attached to an older snapshot keep reading it after rotation.
pub fn dynamic_snapshot_name(base_name: &str, epoch: u32) -> String {
    format!("{base_name}_snap_{epoch}")
}

/// Name of the permanent segment used when the map was created with a fixed
/// `snapshot_size`: `N_full` for a map named `N`.
pub fn fixed_snapshot_name(base_name: &str) -> String {
    format!("{base_name}_full")
}

/// Write `payload` (an already-encoded snapshot of the whole map) into a
/// snapshot segment and publish it, using the required publish order:
/// payload fully written, then segment name, then epoch bump, then the
/// stream-end cursor reset to zero so readers start replaying from an empty
/// log against the new snapshot.
///
/// Returns the name of the segment the payload was written to.
pub fn rotate(
    base_name: &str,
    control: &ControlHeader,
    payload: &[u8],
    fixed_size: Option<usize>,
) -> ShmResult<String> {
    let needed = framed_len(payload.len());
    let record = frame(payload);

    let name = if let Some(size) = fixed_size {
        let name = fixed_snapshot_name(base_name);
        if needed > size {
            return Err(ShmError::FullDumpMemoryFull {
                needed,
                available: size,
            });
        }
        let mut segment = match SharedMemorySegment::attach(&name) {
            Ok(segment) => segment,
            Err(ShmError::NotFound { .. }) => SharedMemorySegment::create(&name, round_up_to_page(size))?,
            Err(other) => return Err(other),
        };
        segment.bytes_mut()[..record.len()].copy_from_slice(&record);
        name
    } else {
        let epoch_for_name = control.snapshot_epoch() + 1;
        let name = dynamic_snapshot_name(base_name, epoch_for_name);
        let mut segment = SharedMemorySegment::create(&name, round_up_to_page(needed))?;
        segment.bytes_mut()[..record.len()].copy_from_slice(&record);
        name
    };

    let old_name = control.snapshot_name();

    control.set_snapshot_name(&name);
    control.bump_snapshot_epoch();
    control.set_stream_end(0);

    if fixed_size.is_none() && !old_name.is_empty() && old_name != name {
        let _ = SharedMemorySegment::unlink(&old_name);
    }

    Ok(name)
}

fn round_up_to_page(size: usize) -> usize {
    let page = crate::consts::SHM_MIN_SIZE;
    size.div_ceil(page) * page
}

/// Attach to the snapshot segment currently published in `control`, retrying
/// a bounded number of times if the name is observed mid-rotation (the old
/// segment may have been unlinked between reading the name and attaching).
/// After `max_retries` failed attempts the caller should retry once more
/// while holding the map's lock, which serializes against any in-flight
/// rotation.
pub fn attach_current(
    control: &ControlHeader,
    max_retries: u32,
    retry_delay: Duration,
) -> ShmResult<SharedMemorySegment> {
    let mut attempt = 0;
    loop {
        let name = control.snapshot_name();
        if name.is_empty() {
            return Err(ShmError::NotFound {
                name: "<no snapshot published yet>".to_string(),
            });
        }
        match SharedMemorySegment::attach(&name) {
            Ok(segment) => return Ok(segment),
            Err(ShmError::NotFound { .. }) if attempt < max_retries => {
                attempt += 1;
                sleep(retry_delay);
            }
            Err(other) => return Err(other),
        }
    }
}

/// Decode the framed payload out of a just-attached snapshot segment.
pub fn read_payload(segment: &SharedMemorySegment) -> ShmResult<&[u8]> {
    Ok(read_frame(segment.bytes(), 0)?.payload)
}
