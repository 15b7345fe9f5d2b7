//! Binary framing for tickets held by byte-oriented stores
//!
//! Layout: a fixed-size bincode header followed by the bincode payload,
//! zstd-compressed once it grows past the configured threshold. The header
//! carries CRC32C checksums of itself and of the payload.

use crate::errors::{RecoveryHint, RegistryError, Result, SerializationOp};
use crc32c::crc32c;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Magic number of encoded tickets: "CAST"
pub const TICKET_MAGIC: u32 = 0x4341_5354;

/// Current frame format version
pub const FORMAT_VERSION: u16 = 1;

/// Encoded size of [`FrameHeader`] with bincode's fixed-width integers
pub const HEADER_LEN: usize = 32;

/// Largest payload a frame may declare, compressed or not
pub const MAX_FRAME_SIZE: u64 = 16 * 1024 * 1024;

const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct FrameHeader {
    magic: u32,
    version: u16,
    flags: u16,
    header_crc: u32,
    uncompressed_size: u64,
    payload_size: u64,
    payload_crc: u32,
}

impl FrameHeader {
    const FLAG_COMPRESSED: u16 = 1 << 0;

    fn new(uncompressed_size: usize, payload: &[u8], compressed: bool) -> Self {
        let mut header = Self {
            magic: TICKET_MAGIC,
            version: FORMAT_VERSION,
            flags: if compressed { Self::FLAG_COMPRESSED } else { 0 },
            header_crc: 0,
            uncompressed_size: uncompressed_size as u64,
            payload_size: payload.len() as u64,
            payload_crc: crc32c(payload),
        };
        header.header_crc = header.calculate_crc();
        header
    }

    fn calculate_crc(&self) -> u32 {
        let mut unsigned = *self;
        unsigned.header_crc = 0;
        match bincode::serialize(&unsigned) {
            Ok(bytes) => crc32c(&bytes),
            Err(_) => 0,
        }
    }

    fn validate(&self, key: &str) -> Result<()> {
        if self.magic != TICKET_MAGIC {
            return Err(RegistryError::Corruption {
                key: key.to_string(),
                reason: format!(
                    "invalid magic number: expected {TICKET_MAGIC:08x}, got {:08x}",
                    self.magic
                ),
                recovery_hint: RecoveryHint::Evict,
            });
        }
        if self.version > FORMAT_VERSION {
            return Err(RegistryError::VersionMismatch {
                key: key.to_string(),
                expected_version: FORMAT_VERSION,
                actual_version: self.version,
                recovery_hint: RecoveryHint::Manual {
                    instructions: "upgrade every node sharing this ticket store".to_string(),
                },
            });
        }
        let expected = self.calculate_crc();
        if self.header_crc != expected {
            return Err(RegistryError::Corruption {
                key: key.to_string(),
                reason: format!(
                    "header CRC mismatch: expected {expected:08x}, got {:08x}",
                    self.header_crc
                ),
                recovery_hint: RecoveryHint::Evict,
            });
        }
        if self.uncompressed_size > MAX_FRAME_SIZE || self.payload_size > MAX_FRAME_SIZE {
            return Err(RegistryError::Corruption {
                key: key.to_string(),
                reason: format!(
                    "frame declares {} bytes, more than the {MAX_FRAME_SIZE} byte limit",
                    self.uncompressed_size.max(self.payload_size)
                ),
                recovery_hint: RecoveryHint::Evict,
            });
        }
        Ok(())
    }

    fn is_compressed(&self) -> bool {
        self.flags & Self::FLAG_COMPRESSED != 0
    }
}

/// Encodes tickets (and anything else serde can describe) for storage
#[derive(Debug, Clone)]
pub struct TicketTranscoder {
    compression_threshold: usize,
}

impl Default for TicketTranscoder {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl TicketTranscoder {
    pub fn new(compression_threshold: usize) -> Self {
        Self {
            compression_threshold,
        }
    }

    pub fn encode<T: Serialize>(&self, key: &str, value: &T) -> Result<Vec<u8>> {
        let raw = bincode::serialize(value).map_err(|e| RegistryError::Serialization {
            key: key.to_string(),
            operation: SerializationOp::Encode,
            source: e,
            recovery_hint: RecoveryHint::Manual {
                instructions: "ticket contains a value that cannot be encoded".to_string(),
            },
        })?;

        let raw_len = raw.len();
        let compressed = raw_len > self.compression_threshold;
        let payload = if compressed {
            zstd::bulk::compress(&raw, DEFAULT_COMPRESSION_LEVEL).map_err(|e| {
                RegistryError::Serialization {
                    key: key.to_string(),
                    operation: SerializationOp::Encode,
                    source: Box::new(e),
                    recovery_hint: RecoveryHint::Retry {
                        after: std::time::Duration::from_millis(10),
                    },
                }
            })?
        } else {
            raw
        };

        let header = FrameHeader::new(raw_len, &payload, compressed);
        let mut frame = bincode::serialize(&header)?;
        debug_assert_eq!(frame.len(), HEADER_LEN);
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    pub fn decode<T: DeserializeOwned>(&self, key: &str, bytes: &[u8]) -> Result<T> {
        if bytes.len() < HEADER_LEN {
            return Err(RegistryError::Corruption {
                key: key.to_string(),
                reason: format!("frame of {} bytes is shorter than its header", bytes.len()),
                recovery_hint: RecoveryHint::Evict,
            });
        }

        let (header_bytes, payload) = bytes.split_at(HEADER_LEN);
        let header: FrameHeader = bincode::deserialize(header_bytes)?;
        header.validate(key)?;

        if payload.len() as u64 != header.payload_size {
            return Err(RegistryError::Corruption {
                key: key.to_string(),
                reason: format!(
                    "payload is {} bytes, header declares {}",
                    payload.len(),
                    header.payload_size
                ),
                recovery_hint: RecoveryHint::Evict,
            });
        }
        let actual_crc = crc32c(payload);
        if actual_crc != header.payload_crc {
            return Err(RegistryError::Corruption {
                key: key.to_string(),
                reason: format!(
                    "payload CRC mismatch: expected {:08x}, got {actual_crc:08x}",
                    header.payload_crc
                ),
                recovery_hint: RecoveryHint::Evict,
            });
        }

        let decompressed;
        let raw = if header.is_compressed() {
            decompressed = zstd::bulk::decompress(payload, header.uncompressed_size as usize)
                .map_err(|e| RegistryError::Serialization {
                    key: key.to_string(),
                    operation: SerializationOp::Decode,
                    source: Box::new(e),
                    recovery_hint: RecoveryHint::Evict,
                })?;
            decompressed.as_slice()
        } else {
            payload
        };

        bincode::deserialize(raw).map_err(|e| RegistryError::Serialization {
            key: key.to_string(),
            operation: SerializationOp::Decode,
            source: e,
            recovery_hint: RecoveryHint::Evict,
        })
    }
}
