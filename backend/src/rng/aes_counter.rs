//! AES counter-mode word generator
//!
//! Encrypts a monotonically increasing 128-bit counter block under a fixed
//! all-zero AES-128 key. Used for statistical quality only; the key is public
//! and the output is trivially predictable by anyone who knows the nonce.
//!
//! # Counter block layout
//!
//! For fill number `iteration` and block `k` (starting at 1) within the fill:
//!
//! ```text
//! bytes  0..4   iteration, little-endian
//! bytes  4..12  nonce, little-endian
//! bytes 12..16  k, big-endian (carries into bytes 8..12)
//! ```
//!
//! Each ciphertext block is XORed with the previous output block of the same
//! fill before it is emitted; the first block of a fill is emitted as is.
//! Output words are little-endian reads of the output bytes.
//!
//! Because every fill starts a new iteration and restarts the block counter
//! and the chaining, the word sequence depends on the buffer capacity: a
//! 64-word stream and a 2^20-word stream with the same nonce agree only on
//! their first 64 words. The other generators are capacity-independent.
//!
//! The `aes` crate picks the AES-NI path at runtime when the CPU has it and
//! falls back to a constant-time software implementation otherwise; both
//! give identical bytes.

use super::generator::{GeneratorKind, GeneratorState, WordGenerator};
use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::{Aes128, Block};
use std::fmt;

const ZERO_KEY: [u8; 16] = [0; 16];
const WORDS_PER_BLOCK: usize = 4;
/// Blocks encrypted per cipher call
const BATCH_BLOCKS: usize = 4;

#[derive(Clone)]
pub struct AesCounter {
    cipher: Aes128,
    nonce: u64,
    iteration: u32,
}

impl AesCounter {
    pub fn new(nonce: u64) -> Self {
        Self::from_parts(nonce, 0)
    }

    pub fn from_parts(nonce: u64, iteration: u32) -> Self {
        Self {
            cipher: Aes128::new(&GenericArray::from(ZERO_KEY)),
            nonce,
            iteration,
        }
    }
}

impl fmt::Debug for AesCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesCounter")
            .field("nonce", &self.nonce)
            .field("iteration", &self.iteration)
            .finish()
    }
}

impl WordGenerator for AesCounter {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::AesCounter
    }

    fn fill_block(&mut self, buffer: &mut [u32]) {
        let low_lane = u64::from(self.iteration) | ((self.nonce & 0xFFFF_FFFF) << 32);
        let high_lane = (self.nonce >> 32).swap_bytes();
        self.iteration = self.iteration.wrapping_add(1);

        let mut previous = [0u8; 16];
        let mut counter = 0u64;

        for chunk in buffer.chunks_mut(WORDS_PER_BLOCK * BATCH_BLOCKS) {
            let block_count = chunk.len().div_ceil(WORDS_PER_BLOCK);
            let mut blocks: [Block; BATCH_BLOCKS] = Default::default();

            for block in blocks[..block_count].iter_mut() {
                counter += 1;
                block[..8].copy_from_slice(&low_lane.to_le_bytes());
                block[8..].copy_from_slice(&high_lane.wrapping_add(counter).to_be_bytes());
            }

            self.cipher.encrypt_blocks(&mut blocks[..block_count]);

            for (block, words) in blocks.iter().zip(chunk.chunks_mut(WORDS_PER_BLOCK)) {
                for (chained, byte) in previous.iter_mut().zip(block.iter()) {
                    *chained ^= *byte;
                }
                for (word, bytes) in words.iter_mut().zip(previous.chunks_exact(4)) {
                    *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                }
            }
        }
    }

    fn state(&self) -> GeneratorState {
        GeneratorState::AesCounter {
            nonce: self.nonce,
            iteration: self.iteration,
        }
    }

    fn boxed_clone(&self) -> Box<dyn WordGenerator> {
        Box::new(self.clone())
    }
}
