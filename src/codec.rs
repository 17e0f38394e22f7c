//! Pluggable serialization for log records and snapshots.
//!
//! `original_source/UltraDict.py` accepts any `serializer` module exposing
//! `dumps`/`loads` (defaulting to `pickle`); a Rust map cannot be generic
//! over an untyped module, so the same idea is expressed as a trait.

use crate::error::ShmResult;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;

/// An update-log record: a key/value upsert, or a delete.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LogRecord<K, V> {
    /// Insert or overwrite `key` with `value`.
    Set { key: K, value: V },
    /// Remove `key`.
    Delete { key: K },
}

/// Encodes and decodes map entries and whole-map snapshots.
///
/// Implementors are expected to be cheap to construct; a codec instance is
/// held by a [`crate::handle::SharedMap`] for its whole lifetime.
pub trait Codec<K, V>: Send + Sync {
    /// Serialize a single log record.
    fn encode_record(&self, record: &LogRecord<K, V>) -> ShmResult<Vec<u8>>;

    /// Deserialize a single log record.
    fn decode_record(&self, bytes: &[u8]) -> ShmResult<LogRecord<K, V>>;

    /// Serialize an entire map for a snapshot dump.
    fn encode_snapshot(&self, map: &BTreeMap<K, V>) -> ShmResult<Vec<u8>>;

    /// Deserialize an entire map from a snapshot dump.
    fn decode_snapshot(&self, bytes: &[u8]) -> ShmResult<BTreeMap<K, V>>;
}

/// The default codec, backed by `serde_json`. Keeps snapshots
/// human-inspectable during development.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl<K, V> Codec<K, V> for JsonCodec
where
    K: Serialize + DeserializeOwned + Ord + Send + Sync,
    V: Serialize + DeserializeOwned + Send + Sync,
{
    fn encode_record(&self, record: &LogRecord<K, V>) -> ShmResult<Vec<u8>> {
        Ok(serde_json::to_vec(record)?)
    }

    fn decode_record(&self, bytes: &[u8]) -> ShmResult<LogRecord<K, V>> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn encode_snapshot(&self, map: &BTreeMap<K, V>) -> ShmResult<Vec<u8>> {
        Ok(serde_json::to_vec(map)?)
    }

    fn decode_snapshot(&self, bytes: &[u8]) -> ShmResult<BTreeMap<K, V>> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_codec_round_trips_records() {
        let codec = JsonCodec;
        let record: LogRecord<String, i64> = LogRecord::Set {
            key: "a".to_string(),
            value: 1,
        };
        let bytes = codec.encode_record(&record).unwrap();
        let decoded: LogRecord<String, i64> = codec.decode_record(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn json_codec_round_trips_snapshots() {
        let codec = JsonCodec;
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), 10i64);
        map.insert("y".to_string(), 20i64);
        let bytes = Codec::<String, i64>::encode_snapshot(&codec, &map).unwrap();
        let decoded: BTreeMap<String, i64> = Codec::<String, i64>::decode_snapshot(&codec, &bytes).unwrap();
        assert_eq!(decoded, map);
    }
}
