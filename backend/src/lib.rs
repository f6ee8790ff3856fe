//! Stochastic Core - Deterministic Random Streams
//!
//! Reproducible pseudo-random number generation and statistical sampling
//! for large agent-based simulations.
//!
//! # Architecture
//!
//! - **rng**: Word generators (LCG, pseudo-DES, AES counter) and the
//!   buffered `RandomStream`
//! - **distributions**: Samplers built on `RandomStream` primitives
//! - **checkpoint**: Binary and JSON stream snapshots
//! - **factory**: Seeding policy (one stream per rank or per node)
//!
//! # Critical Invariants
//!
//! 1. Same generator + seed → same draw sequence on every platform
//! 2. Word and unit-float draws share one cursor
//! 3. Checkpoint → restore → draw is indistinguishable from just drawing
//! 4. Out-of-domain sampler parameters degrade to boundary values, never panic

// Module declarations
pub mod checkpoint;
pub mod distributions;
pub mod factory;
pub mod rng;

// Re-exports for convenience
pub use checkpoint::{
    compute_config_hash, deserialize_stream, serialize_stream, CheckpointError, StreamSnapshot,
};
pub use distributions::DEFAULT_CDF_PRECISION;
pub use factory::{FactorySnapshot, RngFactory, RngFactoryConfig, RngPolicy};
pub use rng::{
    word_to_unit, word_to_unit_double, words_to_units, AesCounter, GeneratorKind,
    GeneratorState, LinearCongruential, PseudoDes, RandomStream, RngError, WordGenerator,
    DEFAULT_CAPACITY,
};
