//! Log operations and frame encoding.
//!
//! ```text
//! | magic "LLOG" (4) | version (2) | payload len (4) | CBOR payload | crc32 (4) |
//! ```
//!
//! A frame carries a batch of [`LogOp`]s and is the unit of atomicity: on
//! recovery a frame is either replayed in full or, if the process died
//! while writing it, ignored.

use crate::error::{CoreError, CoreResult};
use crate::types::{Document, RecordId, SchemaVersion};
use serde::{Deserialize, Serialize};

/// Magic bytes opening every frame.
pub const FRAME_MAGIC: [u8; 4] = *b"LLOG";

/// Current frame format version.
pub const FRAME_VERSION: u16 = 1;

/// magic (4) + version (2) + length (4)
pub(crate) const HEADER_SIZE: usize = 10;

/// Trailing CRC32.
pub(crate) const CRC_SIZE: usize = 4;

/// One logged mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOp {
    /// A collection was created.
    CreateCollection {
        /// Collection name.
        name: String,
        /// Indexed fields.
        indexes: Vec<String>,
    },
    /// An index was added to an existing collection.
    AddIndex {
        /// Collection name.
        collection: String,
        /// Indexed field.
        field: String,
    },
    /// A collection and all its records were removed.
    DropCollection {
        /// Collection name.
        name: String,
    },
    /// A record was written in full.
    Put {
        /// Collection name.
        collection: String,
        /// Record identity.
        id: RecordId,
        /// Complete document after the write.
        document: Document,
    },
    /// A record was removed.
    Delete {
        /// Collection name.
        collection: String,
        /// Record identity.
        id: RecordId,
    },
    /// Every record of a collection was removed.
    Clear {
        /// Collection name.
        collection: String,
    },
    /// A schema version was reached.
    SetSchemaVersion {
        /// New version.
        version: SchemaVersion,
        /// Migration name.
        name: String,
        /// Unix millis when it was applied.
        applied_at: i64,
    },
    /// Ids below `next_id` must never be assigned again.
    ReserveIds {
        /// Next id to hand out.
        next_id: u64,
    },
}

/// Encodes a batch into one frame.
///
/// # Errors
///
/// Returns an encoding error if CBOR serialization fails or the payload
/// does not fit the 4-byte length field.
pub fn encode_frame(ops: &[LogOp]) -> CoreResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(ops, &mut payload).map_err(|e| CoreError::encoding(e.to_string()))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| CoreError::encoding("log frame payload exceeds 4 GiB"))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    frame.extend_from_slice(&FRAME_MAGIC);
    frame.extend_from_slice(&FRAME_VERSION.to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    let crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// Result of scanning a log image.
#[derive(Debug, Default)]
pub struct DecodedLog {
    /// Complete frames in log order.
    pub frames: Vec<Vec<LogOp>>,
    /// Length of the valid prefix; bytes past it belong to a torn frame.
    pub valid_len: u64,
}

impl DecodedLog {
    /// True when the image ended in a partially written frame.
    #[must_use]
    pub fn has_torn_tail(&self, total_len: u64) -> bool {
        self.valid_len < total_len
    }
}

/// Decodes every complete frame in `data`.
///
/// A frame cut short by the end of the data is treated as the end of the
/// log. A complete frame with a bad magic, version or checksum is
/// corruption.
///
/// # Errors
///
/// Returns [`CoreError::LogCorruption`] for damaged frames.
pub fn decode_frames(data: &[u8]) -> CoreResult<DecodedLog> {
    let mut log = DecodedLog::default();
    let mut offset = 0usize;

    while offset < data.len() {
        let rest = &data[offset..];
        if rest.len() < HEADER_SIZE {
            break;
        }

        let at = offset as u64;
        if rest[0..4] != FRAME_MAGIC {
            return Err(CoreError::log_corruption(at, "bad frame magic"));
        }
        let version = u16::from_le_bytes([rest[4], rest[5]]);
        if version != FRAME_VERSION {
            return Err(CoreError::log_corruption(
                at,
                format!("unsupported frame version {version}"),
            ));
        }
        let len = u32::from_le_bytes([rest[6], rest[7], rest[8], rest[9]]) as usize;
        let frame_len = HEADER_SIZE + len + CRC_SIZE;
        if rest.len() < frame_len {
            break;
        }

        let body = &rest[..HEADER_SIZE + len];
        let stored = u32::from_le_bytes([
            rest[HEADER_SIZE + len],
            rest[HEADER_SIZE + len + 1],
            rest[HEADER_SIZE + len + 2],
            rest[HEADER_SIZE + len + 3],
        ]);
        let computed = crc32fast::hash(body);
        if stored != computed {
            return Err(CoreError::log_corruption(
                at,
                format!("checksum mismatch: stored {stored:08x}, computed {computed:08x}"),
            ));
        }

        let ops: Vec<LogOp> = ciborium::from_reader(&body[HEADER_SIZE..])
            .map_err(|e| CoreError::log_corruption(at, e.to_string()))?;
        log.frames.push(ops);
        offset += frame_len;
        log.valid_len = offset as u64;
    }

    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn put(id: u64, name: &str) -> LogOp {
        let mut document = Document::new();
        document.insert("name".into(), json!(name));
        document.insert("weight".into(), json!(102.5));
        LogOp::Put {
            collection: "exercises".into(),
            id: RecordId::new(id),
            document,
        }
    }

    #[test]
    fn frames_decode_in_order() {
        let mut data = encode_frame(&[put(1, "Bench")]).unwrap();
        data.extend(encode_frame(&[put(2, "Squat"), LogOp::ReserveIds { next_id: 3 }]).unwrap());

        let log = decode_frames(&data).unwrap();
        assert_eq!(log.frames.len(), 2);
        assert_eq!(log.frames[1].len(), 2);
        assert_eq!(log.frames[0][0], put(1, "Bench"));
        assert_eq!(log.valid_len, data.len() as u64);
    }

    #[test]
    fn torn_tail_is_ignored() {
        let first = encode_frame(&[put(1, "Bench")]).unwrap();
        let second = encode_frame(&[put(2, "Squat")]).unwrap();
        let mut data = first.clone();
        data.extend_from_slice(&second[..second.len() - 3]);

        let log = decode_frames(&data).unwrap();
        assert_eq!(log.frames.len(), 1);
        assert_eq!(log.valid_len, first.len() as u64);
        assert!(log.has_torn_tail(data.len() as u64));
    }

    #[test]
    fn flipped_payload_byte_is_corruption() {
        let mut data = encode_frame(&[put(1, "Bench")]).unwrap();
        data[HEADER_SIZE + 2] ^= 0xFF;

        assert!(matches!(
            decode_frames(&data),
            Err(CoreError::LogCorruption { offset: 0, .. })
        ));
    }

    #[test]
    fn foreign_bytes_are_corruption() {
        let data = b"not a liftlog file at all".to_vec();
        assert!(matches!(
            decode_frames(&data),
            Err(CoreError::LogCorruption { .. })
        ));
    }

    #[test]
    fn empty_log_has_no_frames() {
        let log = decode_frames(&[]).unwrap();
        assert!(log.frames.is_empty());
        assert_eq!(log.valid_len, 0);
    }
}
