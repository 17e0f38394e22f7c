//! Framing and replay for the append-only update log.
//!
//! Every record is `0xFF | len:u32 little-endian | 0xFF | payload`. Writers
//! append under the map's lock; readers replay opportunistically without any
//! lock, relying on [`crate::control::ControlHeader::stream_end`] as the
//! single point of synchronization. Grounded on
//! `original_source/UltraDict.py`'s `append_update`/`apply_update`.

use crate::consts::FRAME_SENTINEL;
use crate::error::{ShmError, ShmResult};

/// Encode `payload` into a framed record.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 6);
    out.push(FRAME_SENTINEL);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.push(FRAME_SENTINEL);
    out.extend_from_slice(payload);
    out
}

/// Total bytes a framed record for a payload of `payload_len` occupies.
pub fn framed_len(payload_len: usize) -> usize {
    payload_len + 6
}

/// Append `record` (already framed by [`frame`]) into `buffer` at
/// `start_position`. Returns `Ok(None)` and leaves `buffer` untouched if the
/// record would not fit before `capacity`, signalling the caller to rotate
/// a snapshot instead.
pub fn try_append(
    buffer: &mut [u8],
    capacity: usize,
    start_position: u32,
    record: &[u8],
) -> Option<u32> {
    let end_position = start_position as usize + record.len();
    if end_position > capacity {
        return None;
    }
    buffer[start_position as usize..end_position].copy_from_slice(record);
    Some(end_position as u32)
}

/// One decoded frame from the log, with the byte offset immediately
/// following it.
pub struct Frame<'a> {
    /// Raw payload bytes (not yet passed through a codec).
    pub payload: &'a [u8],
    /// Offset of the first byte after this frame.
    pub next_position: u32,
}

/// Read a single frame starting at `position`, validating both sentinel
/// bytes. Returns [`ShmError::StreamCorrupt`] if the framing is invalid,
/// which happens when a slow reader is overtaken by a writer that has
/// wrapped the buffer or rotated a snapshot mid-read.
pub fn read_frame(buffer: &[u8], position: u32) -> ShmResult<Frame<'_>> {
    let pos = position as usize;
    let corrupt = |detail: String| ShmError::StreamCorrupt {
        position: pos,
        detail,
    };

    let sentinel_1 = *buffer
        .get(pos)
        .ok_or_else(|| corrupt("frame start out of bounds".to_string()))?;
    if sentinel_1 != FRAME_SENTINEL {
        return Err(corrupt(format!(
            "expected sentinel 0x{FRAME_SENTINEL:02x} at frame start, found 0x{sentinel_1:02x}"
        )));
    }

    let len_bytes = buffer
        .get(pos + 1..pos + 5)
        .ok_or_else(|| corrupt("frame length field out of bounds".to_string()))?;
    let length = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;

    let sentinel_2 = *buffer
        .get(pos + 5)
        .ok_or_else(|| corrupt("frame second sentinel out of bounds".to_string()))?;
    if sentinel_2 != FRAME_SENTINEL {
        return Err(corrupt(format!(
            "expected sentinel 0x{FRAME_SENTINEL:02x} after length, found 0x{sentinel_2:02x}"
        )));
    }

    let payload = buffer
        .get(pos + 6..pos + 6 + length)
        .ok_or_else(|| corrupt("frame payload out of bounds".to_string()))?;

    Ok(Frame {
        payload,
        next_position: (pos + 6 + length) as u32,
    })
}

/// Replay every frame in `[from, to)`, invoking `apply` with each decoded
/// payload in order. Stops and returns the position reached if `to` moves
/// while iterating (the caller re-reads the shared `stream_end` each loop
/// per the original's `while pos < remote position` pattern).
pub fn replay(
    buffer: &[u8],
    from: u32,
    to: u32,
    mut apply: impl FnMut(&[u8]) -> ShmResult<()>,
) -> ShmResult<u32> {
    let mut pos = from;
    while pos < to {
        let frame = read_frame(buffer, pos)?;
        apply(frame.payload)?;
        pos = frame.next_position;
    }
    Ok(pos)
}
