//! Chunked compression codec for size-limited record stores.
//!
//! The appliance data store keeps values as flat `{name, data}` records whose
//! `data` field may hold at most [`MAX_RECORD_DATA`] characters. This module turns
//! an arbitrarily large value into an ordered run of such records and back.
//!
//! # Wire format
//!
//! ```text
//! value --serde_json--> text --zlib(best)--> bytes --base64--> payload
//! payload split into <= 64512-char chunks:
//!   { name: "<key>0", data: chunk0 }
//!   { name: "<key>1", data: chunk1 }
//!   ...
//! ```
//!
//! A logical value is the concatenation of the records named `key + i` for
//! increasing `i`, starting at the encode offset and stopping at the first
//! missing index.
//!
//! # Examples
//!
//! ```rust
//! use declkit::codec::{decode, encode};
//!
//! # fn example() -> anyhow::Result<()> {
//! let records = encode("greeting", &"hello world".to_string(), 0)?;
//! assert_eq!(records[0].name, "greeting0");
//!
//! let value: String = decode(&records, "greeting", 0)?;
//! assert_eq!(value, "hello world");
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};

pub use crate::constants::MAX_RECORD_DATA;
use crate::core::DeclkitError;

/// One bounded-size chunk of an encoded value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Logical key followed by the decimal chunk index
    pub name: String,
    /// Base64 text, at most [`MAX_RECORD_DATA`] characters
    pub data: String,
}

impl Record {
    /// Create a record.
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Encode `value` into records named `base_key + i`, `i` starting at `offset`.
pub fn encode<T>(base_key: &str, value: &T, offset: usize) -> Result<Vec<Record>>
where
    T: Serialize + ?Sized,
{
    let text = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize value for '{base_key}'"))?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(text.as_bytes())
        .with_context(|| format!("Failed to compress value for '{base_key}'"))?;
    let compressed = encoder
        .finish()
        .with_context(|| format!("Failed to compress value for '{base_key}'"))?;

    let payload = STANDARD.encode(compressed);
    let records = split_records(base_key, &payload, offset);

    tracing::trace!(
        target: "codec",
        "encoded '{}': {} bytes json, {} chars payload, {} record(s)",
        base_key,
        text.len(),
        payload.len(),
        records.len()
    );

    Ok(records)
}

/// Split an encoded payload into records. An empty payload yields no records.
pub fn split_records(base_key: &str, payload: &str, offset: usize) -> Vec<Record> {
    // base64 output is ASCII, so byte chunks are always valid UTF-8.
    payload
        .as_bytes()
        .chunks(MAX_RECORD_DATA)
        .enumerate()
        .map(|(i, chunk)| {
            Record::new(
                format!("{base_key}{}", offset + i),
                String::from_utf8_lossy(chunk).into_owned(),
            )
        })
        .collect()
}

/// Decode the value stored as `base_key + i` records, `i` starting at `offset`.
///
/// # Errors
///
/// [`DeclkitError::CodecCorruption`] when no record exists at `offset` or the
/// concatenated payload fails base64 decoding, decompression, or parsing.
pub fn decode<T>(records: &[Record], base_key: &str, offset: usize) -> Result<T>
where
    T: DeserializeOwned,
{
    let by_name: HashMap<&str, &str> =
        records.iter().map(|r| (r.name.as_str(), r.data.as_str())).collect();

    let mut payload = String::new();
    let mut index = offset;
    while let Some(data) = by_name.get(format!("{base_key}{index}").as_str()) {
        payload.push_str(data);
        index += 1;
    }

    if index == offset {
        return Err(DeclkitError::corruption(base_key, "no records found").into());
    }

    let compressed = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| DeclkitError::corruption(base_key, format!("invalid base64: {e}")))?;

    let mut text = String::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_string(&mut text)
        .map_err(|e| DeclkitError::corruption(base_key, format!("inflate failed: {e}")))?;

    let value = serde_json::from_str(&text)
        .map_err(|e| DeclkitError::corruption(base_key, format!("invalid JSON: {e}")))?;

    tracing::trace!(
        target: "codec",
        "decoded '{}' from {} record(s)",
        base_key,
        index - offset
    );

    Ok(value)
}

/// A run of records belonging to one logical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordGroup {
    /// Logical key
    pub key: String,
    /// Index of the first record
    pub offset: usize,
    /// Records in index order
    pub records: Vec<Record>,
}

/// Group a flat record list back into logical keys with a linear scan.
///
/// A record continues the current group only when its name is the current key
/// followed by exactly the next index. Anything else starts a new group. A new
/// group whose name ends in `0` starts at index 0 (the layout [`encode`] writes
/// with the default offset); otherwise the trailing digits are the start index.
/// Records without a numeric suffix are skipped.
pub fn group_records(records: &[Record]) -> Vec<RecordGroup> {
    let mut groups: Vec<RecordGroup> = Vec::new();

    for record in records {
        if let Some(current) = groups.last_mut() {
            let expected = format!("{}{}", current.key, current.offset + current.records.len());
            if record.name == expected {
                current.records.push(record.clone());
                continue;
            }
        }

        match split_record_name(&record.name) {
            Some((key, offset)) => groups.push(RecordGroup {
                key: key.to_string(),
                offset,
                records: vec![record.clone()],
            }),
            None => {
                tracing::warn!(
                    target: "codec",
                    "skipping record without index suffix: {}",
                    record.name
                );
            }
        }
    }

    groups
}

/// Logical keys present in a flat record list, in scan order.
pub fn records_to_keys(records: &[Record]) -> Vec<String> {
    group_records(records).into_iter().map(|g| g.key).collect()
}

fn split_record_name(name: &str) -> Option<(&str, usize)> {
    if let Some(key) = name.strip_suffix('0') {
        return Some((key, 0));
    }

    let digits_start = name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits_start == name.len() {
        return None;
    }
    let index = name[digits_start..].parse().ok()?;
    Some((&name[..digits_start], index))
}
