//! Linear congruential word generator
//!
//! `state = 69069 * state + 1 (mod 2^32)`, one word per step. Weak, but it
//! reproduces the oldest regression sequences exactly.

use super::generator::{GeneratorKind, GeneratorState, WordGenerator};

const MULTIPLIER: u32 = 69069;
const INCREMENT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearCongruential {
    state: u32,
}

impl LinearCongruential {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_word(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        self.state
    }
}

impl WordGenerator for LinearCongruential {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::LinearCongruential
    }

    fn fill_block(&mut self, buffer: &mut [u32]) {
        for word in buffer.iter_mut() {
            *word = self.next_word();
        }
    }

    fn state(&self) -> GeneratorState {
        GeneratorState::LinearCongruential { state: self.state }
    }

    fn boxed_clone(&self) -> Box<dyn WordGenerator> {
        Box::new(self.clone())
    }
}
