//! Checkpoint - Save/Restore Random Stream State
//!
//! Captures everything a [`RandomStream`] needs to continue producing the
//! exact sequence it would have produced without interruption: generator
//! counters, both buffers, the cursor, and the cached Gaussian deviate.
//!
//! # Critical Invariants
//!
//! - **Round trip**: restoring a checkpoint and drawing K values yields the
//!   same K values as the original stream
//! - **No silent corruption**: every blob carries a SHA-256 digest; truncated
//!   or corrupt blobs fail with an error naming the offending field
//! - **Bit patterns, not values**: floats are persisted as raw bits so the
//!   JSON form is as exact as the binary one
//!
//! # Binary layout (little-endian)
//!
//! ```text
//! magic "SRNG" | version u16 | generator tag u8 | generator state
//! capacity u64 | cursor u64 | words [u32; capacity] | unit bits [u32; capacity]
//! pending flag u8 | pending f64 | sha256 of everything before it
//! ```

use crate::rng::{word_to_unit, GeneratorKind, GeneratorState, RandomStream};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Leading bytes of every binary checkpoint
pub const CHECKPOINT_MAGIC: [u8; 4] = *b"SRNG";

/// Binary format version written by this crate
pub const CHECKPOINT_VERSION: u16 = 1;

const DIGEST_LEN: usize = 32;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while decoding or validating a checkpoint
#[derive(Debug, Error, PartialEq)]
pub enum CheckpointError {
    #[error("Not a random stream checkpoint (magic {0:02x?})")]
    BadMagic([u8; 4]),

    #[error("Unsupported checkpoint format version {0}")]
    UnsupportedVersion(u16),

    #[error("Checkpoint truncated in '{field}': needed {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Invalid checkpoint field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Checkpoint digest does not match its contents")]
    DigestMismatch,

    #[error("{0} unexpected bytes after the checkpoint digest")]
    TrailingBytes(usize),

    #[error("Checkpoint serialization failed: {0}")]
    Serialization(String),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> CheckpointError {
    CheckpointError::InvalidField {
        field,
        reason: reason.into(),
    }
}

// ============================================================================
// Snapshot Structure
// ============================================================================

/// Complete random stream state
///
/// Floats are stored as their IEEE-754 bit patterns. The buffer capacity is
/// the length of `words`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    /// Generator counters at the time of the snapshot
    pub generator: GeneratorState,

    /// Next unread buffer slot
    pub cursor: usize,

    /// Raw word buffer
    pub words: Vec<u32>,

    /// Unit-float buffer as `f32::to_bits`
    pub unit_bits: Vec<u32>,

    /// Cached second Gaussian deviate as `f64::to_bits`
    pub pending_gaussian_bits: Option<u64>,
}

impl StreamSnapshot {
    pub fn kind(&self) -> GeneratorKind {
        self.generator.kind()
    }

    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    pub fn pending_gaussian(&self) -> Option<f64> {
        self.pending_gaussian_bits.map(f64::from_bits)
    }

    /// Check the invariants a restored stream relies on
    ///
    /// - capacity of at least one slot, with both buffers the same length
    /// - `cursor <= capacity`
    /// - once the buffers have been filled (`cursor < capacity`), every unit
    ///   slot is the synthesis of its word slot
    pub fn validate(&self) -> Result<(), CheckpointError> {
        if self.words.is_empty() {
            return Err(invalid("capacity", "capacity must be at least 1"));
        }
        if self.unit_bits.len() != self.words.len() {
            return Err(invalid(
                "units",
                format!(
                    "{} unit slots for {} word slots",
                    self.unit_bits.len(),
                    self.words.len()
                ),
            ));
        }
        if self.cursor > self.words.len() {
            return Err(invalid(
                "cursor",
                format!("cursor {} exceeds capacity {}", self.cursor, self.words.len()),
            ));
        }

        if self.cursor < self.words.len() {
            let mismatch = self
                .words
                .iter()
                .zip(&self.unit_bits)
                .position(|(&word, &bits)| word_to_unit(word).to_bits() != bits);
            if let Some(slot) = mismatch {
                return Err(invalid(
                    "units",
                    format!("slot {} does not match its word", slot),
                ));
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Binary form
    // ------------------------------------------------------------------------

    /// Encode to the versioned binary format
    pub fn to_bytes(&self) -> Vec<u8> {
        let capacity = self.words.len();
        let mut out = Vec::with_capacity(4 + 2 + 1 + 12 + 16 + 8 * capacity + 9 + DIGEST_LEN);

        out.extend_from_slice(&CHECKPOINT_MAGIC);
        out.extend_from_slice(&CHECKPOINT_VERSION.to_le_bytes());
        out.push(self.kind().tag());

        match self.generator {
            GeneratorState::LinearCongruential { state } => {
                out.extend_from_slice(&state.to_le_bytes());
            }
            GeneratorState::PseudoDes { seq, counter } => {
                out.extend_from_slice(&seq.to_le_bytes());
                out.extend_from_slice(&counter.to_le_bytes());
            }
            GeneratorState::AesCounter { nonce, iteration } => {
                out.extend_from_slice(&nonce.to_le_bytes());
                out.extend_from_slice(&iteration.to_le_bytes());
            }
        }

        out.extend_from_slice(&(capacity as u64).to_le_bytes());
        out.extend_from_slice(&(self.cursor as u64).to_le_bytes());
        for word in &self.words {
            out.extend_from_slice(&word.to_le_bytes());
        }
        for bits in &self.unit_bits {
            out.extend_from_slice(&bits.to_le_bytes());
        }

        out.push(u8::from(self.pending_gaussian_bits.is_some()));
        out.extend_from_slice(&self.pending_gaussian_bits.unwrap_or(0).to_le_bytes());

        let digest = Sha256::digest(&out);
        out.extend_from_slice(&digest);
        out
    }

    /// Decode and validate the binary format
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let mut reader = Reader::new(bytes);

        let magic: [u8; 4] = reader.array("magic")?;
        if magic != CHECKPOINT_MAGIC {
            return Err(CheckpointError::BadMagic(magic));
        }

        let version = reader.u16("version")?;
        if version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion(version));
        }

        let tag = reader.u8("generator_tag")?;
        let kind =
            GeneratorKind::from_tag(tag).map_err(|e| invalid("generator_tag", e.to_string()))?;
        let generator = match kind {
            GeneratorKind::LinearCongruential => GeneratorState::LinearCongruential {
                state: reader.u32("generator_state")?,
            },
            GeneratorKind::PseudoDes => GeneratorState::PseudoDes {
                seq: reader.u32("generator_state")?,
                counter: reader.u32("generator_state")?,
            },
            GeneratorKind::AesCounter => GeneratorState::AesCounter {
                nonce: reader.u64("generator_state")?,
                iteration: reader.u32("generator_state")?,
            },
        };

        let capacity = reader.u64("capacity")?;
        if capacity == 0 {
            return Err(invalid("capacity", "capacity must be at least 1"));
        }
        let capacity = usize::try_from(capacity)
            .map_err(|_| invalid("capacity", format!("{} does not fit in memory", capacity)))?;
        let cursor = reader.u64("cursor")?;
        let cursor = usize::try_from(cursor)
            .map_err(|_| invalid("cursor", format!("{} does not fit in memory", cursor)))?;

        let words = reader.u32_vec("words", capacity)?;
        let unit_bits = reader.u32_vec("units", capacity)?;

        let flag = reader.u8("pending_gaussian_flag")?;
        let pending = reader.u64("pending_gaussian")?;
        let pending_gaussian_bits = match flag {
            0 => None,
            1 => Some(pending),
            other => {
                return Err(invalid(
                    "pending_gaussian_flag",
                    format!("expected 0 or 1, found {}", other),
                ))
            }
        };

        let body_len = reader.offset();
        let digest = reader.take("digest", DIGEST_LEN)?;
        if reader.remaining() > 0 {
            return Err(CheckpointError::TrailingBytes(reader.remaining()));
        }
        if Sha256::digest(&bytes[..body_len]).as_slice() != digest {
            return Err(CheckpointError::DigestMismatch);
        }

        let snapshot = StreamSnapshot {
            generator,
            cursor,
            words,
            unit_bits,
            pending_gaussian_bits,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    // ------------------------------------------------------------------------
    // JSON form
    // ------------------------------------------------------------------------

    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string(self).map_err(|e| CheckpointError::Serialization(e.to_string()))
    }

    /// Parse and validate the JSON form
    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let snapshot: StreamSnapshot =
            serde_json::from_str(json).map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

impl From<&RandomStream> for StreamSnapshot {
    fn from(stream: &RandomStream) -> Self {
        StreamSnapshot {
            generator: stream.generator_state(),
            cursor: stream.cursor(),
            words: stream.words().to_vec(),
            unit_bits: stream.units().iter().map(|unit| unit.to_bits()).collect(),
            pending_gaussian_bits: stream.pending_gaussian().map(f64::to_bits),
        }
    }
}

impl TryFrom<StreamSnapshot> for RandomStream {
    type Error = CheckpointError;

    fn try_from(snapshot: StreamSnapshot) -> Result<Self, Self::Error> {
        snapshot.validate()?;

        let units = snapshot.unit_bits.into_iter().map(f32::from_bits).collect();
        Ok(RandomStream::from_parts(
            snapshot.generator.into_generator(),
            snapshot.words,
            units,
            snapshot.cursor,
            snapshot.pending_gaussian_bits.map(f64::from_bits),
        ))
    }
}

// ============================================================================
// Stream Codec
// ============================================================================

/// Serialize a stream to the binary checkpoint format
pub fn serialize_stream(stream: &RandomStream) -> Vec<u8> {
    let bytes = StreamSnapshot::from(stream).to_bytes();
    tracing::debug!(
        generator = %stream.kind(),
        capacity = stream.capacity(),
        cursor = stream.cursor(),
        bytes = bytes.len(),
        "Serialized random stream"
    );
    bytes
}

/// Rebuild a stream from a binary checkpoint
pub fn deserialize_stream(bytes: &[u8]) -> Result<RandomStream, CheckpointError> {
    let stream = RandomStream::try_from(StreamSnapshot::from_bytes(bytes)?)?;
    tracing::debug!(
        generator = %stream.kind(),
        capacity = stream.capacity(),
        cursor = stream.cursor(),
        "Restored random stream"
    );
    Ok(stream)
}

/// Bounds-checked little-endian reader that names the field being read
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], CheckpointError> {
        let available = self.remaining();
        if available < len {
            return Err(CheckpointError::Truncated {
                field,
                needed: len,
                available,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], CheckpointError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, CheckpointError> {
        Ok(self.array::<1>(field)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, CheckpointError> {
        Ok(u16::from_le_bytes(self.array(field)?))
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, CheckpointError> {
        Ok(u32::from_le_bytes(self.array(field)?))
    }

    fn u64(&mut self, field: &'static str) -> Result<u64, CheckpointError> {
        Ok(u64::from_le_bytes(self.array(field)?))
    }

    fn u32_vec(&mut self, field: &'static str, count: usize) -> Result<Vec<u32>, CheckpointError> {
        let len = count
            .checked_mul(4)
            .ok_or_else(|| invalid(field, format!("{} slots overflow the address space", count)))?;
        let raw = self.take(field, len)?;
        Ok(raw
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Key-sorted form of a JSON value, so field order never changes a hash
fn canonical_json(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, inner)| (key, canonical_json(inner)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical_json).collect()),
        other => other,
    }
}

/// SHA-256 (lowercase hex) of a configuration's canonical JSON
///
/// Factory snapshots carry this hash so a restore under a different
/// configuration is refused. Object keys are sorted at every depth before
/// the compact JSON text is hashed.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, CheckpointError> {
    let serialization = |e: serde_json::Error| {
        CheckpointError::Serialization(format!("Config serialization failed: {}", e))
    };

    let value = serde_json::to_value(config).map_err(serialization)?;
    let json = serde_json::to_string(&canonical_json(value)).map_err(serialization)?;

    Ok(format!("{:x}", Sha256::digest(json.as_bytes())))
}
