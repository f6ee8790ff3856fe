//! Pseudo-DES word generator
//!
//! Each output word comes from a four-round Feistel-like network applied to
//! a 64-bit `(seq, counter)` pair. The counter increments once per word and
//! carries into `seq` when it wraps, so the state never repeats within a run.

use super::generator::{GeneratorKind, GeneratorState, WordGenerator};

const C1: [u32; 4] = [0xBAA9_6887, 0x1E17_D32C, 0x03BC_DC3C, 0x0F33_D1B2];
const C2: [u32; 4] = [0x4B0F_3B58, 0xE874_F0C3, 0x6955_C5A6, 0x55A7_CA46];

/// One round of the mixing function
///
/// All products are of 16-bit halves, so they fit in 32 bits without wrapping.
#[inline]
fn mix(value: u32, round: usize) -> u32 {
    let a = value ^ C1[round];
    let lo = a & 0xFFFF;
    let hi = a >> 16;
    let b = (lo * lo).wrapping_add(!(hi * hi));
    (b.rotate_left(16) ^ C2[round]).wrapping_add(lo * hi)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoDes {
    seq: u32,
    counter: u32,
}

impl PseudoDes {
    /// Low 32 bits of the seed become `seq`, high 32 bits the counter
    pub fn new(seed: u64) -> Self {
        Self::from_parts(seed as u32, (seed >> 32) as u32)
    }

    pub fn from_parts(seq: u32, counter: u32) -> Self {
        Self { seq, counter }
    }

    pub fn next_word(&mut self) -> u32 {
        let k0 = self.seq ^ mix(self.counter, 0);
        let k1 = self.counter ^ mix(k0, 1);

        self.counter = self.counter.wrapping_add(1);
        if self.counter == 0 {
            self.seq = self.seq.wrapping_add(1);
        }

        let k2 = k0 ^ mix(k1, 2);
        k1 ^ mix(k2, 3)
    }
}

impl WordGenerator for PseudoDes {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::PseudoDes
    }

    fn fill_block(&mut self, buffer: &mut [u32]) {
        for word in buffer.iter_mut() {
            *word = self.next_word();
        }
    }

    fn state(&self) -> GeneratorState {
        GeneratorState::PseudoDes {
            seq: self.seq,
            counter: self.counter,
        }
    }

    fn boxed_clone(&self) -> Box<dyn WordGenerator> {
        Box::new(self.clone())
    }
}
