//! Buffered random stream
//!
//! `RandomStream` owns one word generator, a raw-word buffer, a parallel
//! unit-float buffer, and a single read cursor shared by both buffers.
//!
//! # Critical Invariants
//!
//! 1. `0 <= cursor <= capacity`; `cursor == capacity` means exhausted, and a
//!    new stream starts exhausted so the first draw triggers a refill.
//! 2. `units[i]` is always `word_to_unit(words[i])` of the same fill.
//! 3. Word draws and unit-float draws advance the SAME cursor. A float drawn
//!    right after a word reads the next slot, never the slot the word came
//!    from. Regression baselines depend on this coupling.
//!
//! # Example
//! ```
//! use stochastic_core_rs::{GeneratorKind, RandomStream};
//!
//! let mut rng = RandomStream::new(GeneratorKind::PseudoDes, 42);
//! assert_eq!(rng.next_word(), 0xC54A92D9);
//!
//! let u = rng.next_unit();
//! assert!(u > 0.0 && u < 1.0);
//! assert_eq!(rng.cursor(), 2);
//! ```

use super::generator::{GeneratorKind, GeneratorState, WordGenerator};
use std::collections::BTreeSet;

/// Buffer size used when the caller does not choose one
pub const DEFAULT_CAPACITY: usize = 1 << 20;

const ONE_F32_BITS: u32 = 0x3F80_0000;
const ONE_F64_HIGH_BITS: u32 = 0x3FF0_0000;

/// Synthesize a unit float in `(0, 1)` from one raw word
///
/// Forces the binary32 exponent of `[1, 2)`, fills the mantissa with the top
/// 23 bits of the word, sets the lowest mantissa bit, and subtracts 1.0. The
/// forced low bit keeps the result strictly positive so `ln(u)` is finite.
#[inline]
pub fn word_to_unit(word: u32) -> f32 {
    f32::from_bits(ONE_F32_BITS | (word >> 9) | 1) - 1.0
}

/// Synthesize a unit double in `(0, 1)` from one raw word
///
/// The top 20 bits of the word fill the high mantissa word, the low 12 bits
/// lead the low mantissa word, followed by a single half-step bit.
#[inline]
pub fn word_to_unit_double(word: u32) -> f64 {
    let high = ONE_F64_HIGH_BITS + (word >> 12);
    let low = (word << 20) | (1 << 19);
    f64::from_bits((u64::from(high) << 32) | u64::from(low)) - 1.0
}

/// Batched form of [`word_to_unit`]; bit-identical to the scalar form
///
/// The loop is a straight lane-wise map so the compiler vectorizes it.
pub fn words_to_units(words: &[u32], units: &mut [f32]) {
    for (unit, &word) in units.iter_mut().zip(words) {
        *unit = word_to_unit(word);
    }
}

/// Deterministic buffered random stream
///
/// One instance per unit of parallel work. The stream is `Send` but not
/// `Sync`: move it to the worker that owns it, never share it.
#[derive(Debug)]
pub struct RandomStream {
    generator: Box<dyn WordGenerator>,
    words: Vec<u32>,
    units: Vec<f32>,
    cursor: usize,
    pending_gaussian: Option<f64>,
}

impl RandomStream {
    /// Create a stream with the default buffer capacity
    pub fn new(kind: GeneratorKind, seed: u64) -> Self {
        Self::with_capacity(kind, seed, DEFAULT_CAPACITY)
    }

    /// Create a stream with an explicit buffer capacity
    ///
    /// A capacity of 0 selects [`DEFAULT_CAPACITY`].
    pub fn with_capacity(kind: GeneratorKind, seed: u64, capacity: usize) -> Self {
        Self::from_generator(kind.generator(seed), capacity)
    }

    /// Wrap an already-built generator
    pub fn from_generator(generator: Box<dyn WordGenerator>, capacity: usize) -> Self {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };
        Self {
            generator,
            words: vec![0; capacity],
            units: vec![0.0; capacity],
            cursor: capacity,
            pending_gaussian: None,
        }
    }

    /// Reassemble a stream from checkpointed parts
    ///
    /// The caller (the checkpoint codec) has already validated lengths and
    /// the cursor bound.
    pub(crate) fn from_parts(
        generator: Box<dyn WordGenerator>,
        words: Vec<u32>,
        units: Vec<f32>,
        cursor: usize,
        pending_gaussian: Option<f64>,
    ) -> Self {
        debug_assert_eq!(words.len(), units.len());
        debug_assert!(cursor <= words.len());
        Self {
            generator,
            words,
            units,
            cursor,
            pending_gaussian,
        }
    }

    pub fn kind(&self) -> GeneratorKind {
        self.generator.kind()
    }

    pub fn generator_state(&self) -> GeneratorState {
        self.generator.state()
    }

    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    /// Index of the next unread buffer slot
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// True when the next draw will refill the buffers
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.words.len()
    }

    pub(crate) fn words(&self) -> &[u32] {
        &self.words
    }

    pub(crate) fn units(&self) -> &[f32] {
        &self.units
    }

    /// Cached second Gaussian deviate, returned by the next `gaussian` call
    pub fn pending_gaussian(&self) -> Option<f64> {
        self.pending_gaussian
    }

    pub(crate) fn take_pending_gaussian(&mut self) -> Option<f64> {
        self.pending_gaussian.take()
    }

    pub(crate) fn stash_pending_gaussian(&mut self, value: f64) {
        self.pending_gaussian = Some(value);
    }

    fn refill(&mut self) {
        tracing::trace!(
            generator = %self.generator.kind(),
            capacity = self.words.len(),
            "Refilling random buffers"
        );
        self.generator.fill_block(&mut self.words);
        words_to_units(&self.words, &mut self.units);
        self.cursor = 0;
    }

    /// Claim the next buffer slot, refilling first if exhausted
    #[inline]
    fn next_slot(&mut self) -> usize {
        if self.cursor >= self.words.len() {
            self.refill();
        }
        let slot = self.cursor;
        self.cursor += 1;
        slot
    }

    /// Next raw 32-bit word
    #[inline]
    pub fn next_word(&mut self) -> u32 {
        let slot = self.next_slot();
        self.words[slot]
    }

    /// Next unit float in `(0, 1)` with 23 bits of precision
    #[inline]
    pub fn next_unit(&mut self) -> f32 {
        let slot = self.next_slot();
        self.units[slot]
    }

    /// Next unit double in `(0, 1)`, synthesized from one fresh word
    #[inline]
    pub fn next_unit_double(&mut self) -> f64 {
        word_to_unit_double(self.next_word())
    }

    /// Uniform integer in `[0, n)` from one word
    ///
    /// Computes the high half of `word * n` in 32-bit pieces; no modulo
    /// bias and no division. Returns 0 when `n == 0`.
    pub fn next_u16_in_range(&mut self, n: u16) -> u16 {
        let word = self.next_word();
        let n = u32::from(n);
        let mut scaled = (word & 0xFFFF) * n;
        scaled >>= 16;
        scaled += (word >> 16) * n;
        (scaled >> 16) as u16
    }

    /// Uniform integer in `[0, n)`
    ///
    /// Consumes two words and scales the first: `(w0 * n) >> 32`. Returns 0
    /// when `n == 0`.
    pub fn next_u32_in_range(&mut self, n: u32) -> u32 {
        let first = u64::from(self.next_word());
        let _second = self.next_word();
        ((first * u64::from(n)) >> 32) as u32
    }

    /// Stochastic rounding
    ///
    /// Returns `floor(x)` with probability `1 - frac(x)` and `floor(x) + 1`
    /// otherwise, so the expected result equals `x`. Always consumes exactly
    /// one unit float. Non-finite input yields 0.
    pub fn random_round(&mut self, x: f64) -> i64 {
        let draw = f64::from(self.next_unit());
        if !x.is_finite() {
            return 0;
        }
        let floor = x.floor();
        let remainder = x - floor;
        if draw < 1.0 - remainder {
            floor as i64
        } else {
            floor as i64 + 1
        }
    }

    /// Bernoulli trial that skips the draw for certain outcomes
    ///
    /// `p <= 0` (or NaN) is always false and `p >= 1` always true, neither
    /// consuming entropy; otherwise returns `p > next_unit()`.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        if p.is_nan() || p <= 0.0 {
            false
        } else if p >= 1.0 {
            true
        } else {
            p > f64::from(self.next_unit())
        }
    }

    /// Choose `m` distinct indices from `[0, n)` (Floyd's algorithm)
    ///
    /// Draws exactly `m` ranged integers. `m > n` is treated as `m == n`.
    pub fn reservoir_choose(&mut self, m: u32, n: u32) -> BTreeSet<u32> {
        let m = m.min(n);
        let mut selected = BTreeSet::new();
        for j in (n - m)..n {
            let candidate = self.next_u32_in_range(j + 1);
            if !selected.insert(candidate) {
                selected.insert(j);
            }
        }
        selected
    }
}

impl Clone for RandomStream {
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.boxed_clone(),
            words: self.words.clone(),
            units: self.units.clone(),
            cursor: self.cursor,
            pending_gaussian: self.pending_gaussian,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stream_starts_exhausted() {
        let rng = RandomStream::with_capacity(GeneratorKind::PseudoDes, 1, 16);
        assert_eq!(rng.capacity(), 16);
        assert_eq!(rng.cursor(), 16);
        assert!(rng.is_exhausted());
    }

    #[test]
    fn test_zero_capacity_selects_default() {
        let rng = RandomStream::with_capacity(GeneratorKind::LinearCongruential, 1, 0);
        assert_eq!(rng.capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_refill_on_exhaustion() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::LinearCongruential, 0, 4);
        let words: Vec<u32> = (0..6).map(|_| rng.next_word()).collect();

        let mut reference = GeneratorKind::LinearCongruential.generator(0);
        let mut expected = [0u32; 8];
        reference.fill_block(&mut expected[..4]);
        reference.fill_block(&mut expected[4..]);

        assert_eq!(words, expected[..6]);
        assert_eq!(rng.cursor(), 2);
    }

    #[test]
    fn test_word_and_unit_share_cursor() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::PseudoDes, 42, 64);
        let mut reference = RandomStream::with_capacity(GeneratorKind::PseudoDes, 42, 64);

        let _ = rng.next_word();
        let unit = rng.next_unit();

        let _ = reference.next_word();
        let second_word = reference.next_word();

        assert_eq!(unit, word_to_unit(second_word));
        assert_eq!(rng.cursor(), 2);
    }

    #[test]
    fn test_unit_buffer_derived_from_word_buffer() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::AesCounter, 7, 32);
        rng.next_word();
        for (word, unit) in rng.words().iter().zip(rng.units()) {
            assert_eq!(*unit, word_to_unit(*word));
        }
    }

    #[test]
    fn test_unit_bounds_at_extremes() {
        assert_eq!(word_to_unit(0), f32::EPSILON);
        assert!(word_to_unit(u32::MAX) < 1.0);
        assert!(word_to_unit_double(0) > 0.0);
        assert!(word_to_unit_double(u32::MAX) < 1.0);
    }

    #[test]
    fn test_unit_double_bit_layout() {
        // 0x80000000 puts a single bit at the top of the mantissa.
        let expected = 0.5 + 2f64.powi(-33);
        assert_eq!(word_to_unit_double(0x8000_0000), expected);
    }

    #[test]
    fn test_unit_double_consumes_one_word() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::PseudoDes, 3, 16);
        let mut reference = rng.clone();

        let value = rng.next_unit_double();
        assert_eq!(value, word_to_unit_double(reference.next_word()));
        assert_eq!(rng.cursor(), 1);
    }

    #[test]
    fn test_u32_range_consumes_two_words() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::PseudoDes, 5, 16);
        let mut reference = rng.clone();

        let value = rng.next_u32_in_range(1000);
        let first = reference.next_word();
        assert_eq!(value, ((u64::from(first) * 1000) >> 32) as u32);
        assert_eq!(rng.cursor(), 2);
    }

    #[test]
    fn test_u16_range_matches_wide_multiply() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::PseudoDes, 9, 256);
        let mut reference = rng.clone();

        for n in [1u16, 2, 7, 1000, u16::MAX] {
            let value = rng.next_u16_in_range(n);
            let word = reference.next_word();
            let wide = ((u64::from(word) * u64::from(n)) >> 32) as u16;
            assert_eq!(value, wide, "n={}", n);
            assert!(value < n);
        }
    }

    #[test]
    fn test_zero_range_returns_zero() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::PseudoDes, 9, 16);
        assert_eq!(rng.next_u16_in_range(0), 0);
        assert_eq!(rng.next_u32_in_range(0), 0);
    }

    #[test]
    fn test_bernoulli_shortcuts_do_not_consume() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::PseudoDes, 1, 16);
        rng.next_word();

        assert!(!rng.bernoulli(0.0));
        assert!(rng.bernoulli(1.0));
        assert!(!rng.bernoulli(-0.5));
        assert!(rng.bernoulli(1.5));
        assert!(!rng.bernoulli(f64::NAN));
        assert_eq!(rng.cursor(), 1);

        rng.bernoulli(0.5);
        assert_eq!(rng.cursor(), 2);
    }

    #[test]
    fn test_random_round_integer_input() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::PseudoDes, 1, 64);
        for _ in 0..32 {
            assert_eq!(rng.random_round(4.0), 4);
        }
        assert_eq!(rng.cursor(), 32);
    }

    #[test]
    fn test_random_round_negative_input() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::PseudoDes, 1, 1024);
        for _ in 0..500 {
            let value = rng.random_round(-2.25);
            assert!(value == -3 || value == -2, "unexpected {}", value);
        }
    }

    #[test]
    fn test_random_round_non_finite() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::PseudoDes, 1, 16);
        assert_eq!(rng.random_round(f64::NAN), 0);
        assert_eq!(rng.random_round(f64::INFINITY), 0);
        assert_eq!(rng.cursor(), 2);
    }

    #[test]
    fn test_reservoir_full_selection() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::PseudoDes, 1, 64);
        let chosen = rng.reservoir_choose(10, 10);
        assert_eq!(chosen, (0..10).collect::<BTreeSet<u32>>());
    }

    #[test]
    fn test_reservoir_oversized_request_clamps() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::PseudoDes, 1, 64);
        let chosen = rng.reservoir_choose(12, 5);
        assert_eq!(chosen, (0..5).collect::<BTreeSet<u32>>());
    }

    #[test]
    fn test_reservoir_empty() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::PseudoDes, 1, 64);
        assert!(rng.reservoir_choose(0, 100).is_empty());
        assert_eq!(rng.cursor(), 64);
    }

    #[test]
    fn test_clone_continues_identically() {
        let mut rng = RandomStream::with_capacity(GeneratorKind::AesCounter, 11, 8);
        for _ in 0..5 {
            rng.next_word();
        }
        let mut copy = rng.clone();
        for _ in 0..40 {
            assert_eq!(rng.next_word(), copy.next_word());
        }
    }
}
