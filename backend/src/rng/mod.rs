//! Deterministic random number generation
//!
//! Three word generators (linear congruential, pseudo-DES, AES counter) feed
//! a buffered `RandomStream`. CRITICAL: every stochastic decision in a
//! simulation MUST draw from a `RandomStream` so runs replay bit-for-bit.

mod aes_counter;
mod error;
mod generator;
mod lcg;
mod pseudo_des;
mod stream;

pub use aes_counter::AesCounter;
pub use error::RngError;
pub use generator::{GeneratorKind, GeneratorState, WordGenerator};
pub use lcg::LinearCongruential;
pub use pseudo_des::PseudoDes;
pub use stream::{
    word_to_unit, word_to_unit_double, words_to_units, RandomStream, DEFAULT_CAPACITY,
};
