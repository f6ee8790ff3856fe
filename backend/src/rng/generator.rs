//! Word generator abstraction
//!
//! A word generator fills blocks of raw 32-bit words from its own counter
//! state. The stream layer above it owns the buffers and the read cursor;
//! generators only know how to produce the next block.
//!
//! # Determinism
//!
//! For a fixed seed and the same sequence of `fill_block` calls, every
//! variant produces bit-identical output on every platform. The published
//! baseline vectors in `tests/test_rng_determinism.rs` pin this down.

use super::aes_counter::AesCounter;
use super::error::RngError;
use super::lcg::LinearCongruential;
use super::pseudo_des::PseudoDes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source of raw 32-bit words
///
/// Implementations are plain sequential state machines. They are `Send` so
/// a stream can be moved to the worker that owns it, but nothing here is
/// meant to be shared between threads.
pub trait WordGenerator: fmt::Debug + Send {
    /// Which variant this is
    fn kind(&self) -> GeneratorKind;

    /// Overwrite every word of `buffer` with fresh output, advancing state
    fn fill_block(&mut self, buffer: &mut [u32]);

    /// Current counter state, enough to rebuild an identical generator
    fn state(&self) -> GeneratorState;

    /// Clone behind the trait object
    fn boxed_clone(&self) -> Box<dyn WordGenerator>;
}

/// Generator variants selectable by configuration
///
/// Serialized names match the legacy configuration enum spellings; the
/// short kebab-case aliases accepted by `FromStr` also deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GeneratorKind {
    /// `state = 69069 * state + 1`; fastest, weakest
    #[serde(
        rename = "USE_LINEAR_CONGRUENTIAL",
        alias = "linear-congruential",
        alias = "lcg"
    )]
    LinearCongruential,

    /// Four-round mixing network over a 64-bit counter
    #[default]
    #[serde(rename = "USE_PSEUDO_DES", alias = "pseudo-des")]
    PseudoDes,

    /// AES-128 in counter mode under an all-zero key
    #[serde(rename = "USE_AES_COUNTER", alias = "aes-counter", alias = "aes")]
    AesCounter,
}

impl GeneratorKind {
    pub const ALL: [GeneratorKind; 3] = [
        GeneratorKind::LinearCongruential,
        GeneratorKind::PseudoDes,
        GeneratorKind::AesCounter,
    ];

    /// Configuration name (e.g. `USE_PSEUDO_DES`)
    pub fn name(self) -> &'static str {
        match self {
            GeneratorKind::LinearCongruential => "USE_LINEAR_CONGRUENTIAL",
            GeneratorKind::PseudoDes => "USE_PSEUDO_DES",
            GeneratorKind::AesCounter => "USE_AES_COUNTER",
        }
    }

    /// Tag byte used by the binary checkpoint format
    pub fn tag(self) -> u8 {
        match self {
            GeneratorKind::LinearCongruential => 0,
            GeneratorKind::PseudoDes => 1,
            GeneratorKind::AesCounter => 2,
        }
    }

    /// Inverse of [`GeneratorKind::tag`]
    pub fn from_tag(tag: u8) -> Result<Self, RngError> {
        GeneratorKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| RngError::UnknownGenerator(format!("tag {}", tag)))
    }

    /// Build a fresh generator of this kind
    ///
    /// Seed interpretation is variant-specific:
    /// - LinearCongruential keeps the low 32 bits
    /// - PseudoDes uses the low half as `seq` and the high half as `counter`
    /// - AesCounter uses all 64 bits as the nonce
    pub fn generator(self, seed: u64) -> Box<dyn WordGenerator> {
        match self {
            GeneratorKind::LinearCongruential => Box::new(LinearCongruential::new(seed as u32)),
            GeneratorKind::PseudoDes => Box::new(PseudoDes::new(seed)),
            GeneratorKind::AesCounter => Box::new(AesCounter::new(seed)),
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeneratorKind {
    type Err = RngError;

    /// Accepts the configuration names as well as short kebab-case aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USE_LINEAR_CONGRUENTIAL" | "linear-congruential" | "lcg" => {
                Ok(GeneratorKind::LinearCongruential)
            }
            "USE_PSEUDO_DES" | "pseudo-des" => Ok(GeneratorKind::PseudoDes),
            "USE_AES_COUNTER" | "aes-counter" | "aes" => Ok(GeneratorKind::AesCounter),
            other => Err(RngError::UnknownGenerator(other.to_string())),
        }
    }
}

impl TryFrom<u8> for GeneratorKind {
    type Error = RngError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        GeneratorKind::from_tag(tag)
    }
}

/// Variant-specific counter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratorState {
    LinearCongruential { state: u32 },
    PseudoDes { seq: u32, counter: u32 },
    AesCounter { nonce: u64, iteration: u32 },
}

impl GeneratorState {
    pub fn kind(&self) -> GeneratorKind {
        match self {
            GeneratorState::LinearCongruential { .. } => GeneratorKind::LinearCongruential,
            GeneratorState::PseudoDes { .. } => GeneratorKind::PseudoDes,
            GeneratorState::AesCounter { .. } => GeneratorKind::AesCounter,
        }
    }

    /// Rebuild the generator this state was captured from
    pub fn into_generator(self) -> Box<dyn WordGenerator> {
        match self {
            GeneratorState::LinearCongruential { state } => {
                Box::new(LinearCongruential::new(state))
            }
            GeneratorState::PseudoDes { seq, counter } => {
                Box::new(PseudoDes::from_parts(seq, counter))
            }
            GeneratorState::AesCounter { nonce, iteration } => {
                Box::new(AesCounter::from_parts(nonce, iteration))
            }
        }
    }
}
