//! Stream factory - seeding policy for a simulation run
//!
//! Decides which generator to use, how streams are seeded, and how large
//! their buffers are, from the run's JSON configuration.
//!
//! # Policies
//!
//! - **ONE_PER_CORE**: one stream per process rank, seeded with the run
//!   number in the low 16 bits and the rank in the high 16 bits.
//! - **ONE_PER_NODE**: one stream per simulated node. A small seed stream
//!   seeded with the run number hands out one seed word per registered node
//!   id, in registration order, so a node gets the same seed no matter which
//!   rank creates it.
//!
//! # Example
//! ```
//! use stochastic_core_rs::{RngFactory, RngPolicy};
//!
//! let mut factory = RngFactory::from_json(r#"{
//!     "Random_Number_Generator_Type": "USE_AES_COUNTER",
//!     "Random_Number_Generator_Policy": "ONE_PER_NODE",
//!     "Run_Number": 7
//! }"#).unwrap();
//! assert_eq!(factory.policy(), RngPolicy::OnePerNode);
//!
//! factory.set_node_ids(&[1, 2, 3]);
//! let stream = factory.create_node_stream(2).unwrap();
//! assert!(stream.is_some());
//! ```

use crate::checkpoint::{compute_config_hash, StreamSnapshot};
use crate::rng::{GeneratorKind, RandomStream, RngError};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Buffer capacity of per-rank streams
pub const CORE_STREAM_CAPACITY: usize = 1 << 20;

/// Buffer capacity of per-node streams
pub const NODE_STREAM_CAPACITY: usize = 1 << 18;

/// Buffer capacity of the seed stream used under `ONE_PER_NODE`
pub const SEED_STREAM_CAPACITY: usize = 256;

const GENERATOR_KEY: &str = "Random_Number_Generator_Type";

// ============================================================================
// Configuration
// ============================================================================

/// How streams are assigned to units of parallel work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RngPolicy {
    #[default]
    #[serde(rename = "ONE_PER_CORE")]
    OnePerCore,

    #[serde(rename = "ONE_PER_NODE")]
    OnePerNode,
}

impl RngPolicy {
    pub fn name(self) -> &'static str {
        match self {
            RngPolicy::OnePerCore => "ONE_PER_CORE",
            RngPolicy::OnePerNode => "ONE_PER_NODE",
        }
    }
}

impl fmt::Display for RngPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Random number configuration of a run
///
/// Keys not listed here are ignored, so the whole simulation configuration
/// can be passed in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RngFactoryConfig {
    #[serde(rename = "Random_Number_Generator_Type", default)]
    pub generator: GeneratorKind,

    #[serde(rename = "Random_Number_Generator_Policy", default)]
    pub policy: RngPolicy,

    /// Restricted to 16 bits; it fills one half of a per-rank seed
    #[serde(rename = "Run_Number", default)]
    pub run_number: u16,

    /// Accepts `0`/`1` as well as `false`/`true`
    #[serde(
        rename = "Allow_NodeID_Zero",
        default,
        deserialize_with = "deserialize_flag"
    )]
    pub allow_node_id_zero: bool,
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(other) => Err(D::Error::custom(format!(
            "expected 0 or 1, found {}",
            other
        ))),
    }
}

impl RngFactoryConfig {
    pub fn new(generator: GeneratorKind, policy: RngPolicy, run_number: u16) -> Self {
        Self {
            generator,
            policy,
            run_number,
            allow_node_id_zero: false,
        }
    }

    /// Parse from JSON
    ///
    /// An unrecognized generator name is reported as
    /// [`RngError::UnknownGenerator`]; any other malformed value as
    /// [`RngError::InvalidConfig`].
    pub fn from_json(json: &str) -> Result<Self, RngError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| RngError::InvalidConfig(e.to_string()))?;

        if let Some(name) = value.get(GENERATOR_KEY).and_then(|v| v.as_str()) {
            name.parse::<GeneratorKind>()?;
        }

        serde_json::from_value(value).map_err(|e| RngError::InvalidConfig(e.to_string()))
    }

    /// Reject policy combinations that cannot be honoured
    pub fn validate(&self) -> Result<(), RngError> {
        if self.policy != RngPolicy::OnePerCore {
            if self.generator == GeneratorKind::LinearCongruential {
                return Err(RngError::IncoherentConfig(format!(
                    "'Random_Number_Generator_Policy' must be 'ONE_PER_CORE' when using \
                     'Random_Number_Generator_Type' = '{}' (found '{}')",
                    self.generator, self.policy
                )));
            }
            if self.allow_node_id_zero {
                return Err(RngError::IncoherentConfig(format!(
                    "'Random_Number_Generator_Policy' must be 'ONE_PER_CORE' when using \
                     'Allow_NodeID_Zero' = 1 (found '{}')",
                    self.policy
                )));
            }
        }
        Ok(())
    }
}

/// Seed of a per-rank stream: run number low, rank high
pub fn core_seed(run_number: u16, rank: u16) -> u32 {
    u32::from(run_number) | (u32::from(rank) << 16)
}

// ============================================================================
// Factory
// ============================================================================

/// Creates the streams of one simulation process
#[derive(Debug)]
pub struct RngFactory {
    config: RngFactoryConfig,
    config_hash: String,
    restored: bool,
    node_ids: Vec<u32>,
    node_index: usize,
    seed_stream: Option<RandomStream>,
}

impl RngFactory {
    /// Validate the configuration and set up seeding
    pub fn new(config: RngFactoryConfig) -> Result<Self, RngError> {
        config.validate()?;
        let config_hash = compute_config_hash(&config)?;

        let seed_stream = (config.policy == RngPolicy::OnePerNode).then(|| {
            RandomStream::with_capacity(
                config.generator,
                u64::from(config.run_number),
                SEED_STREAM_CAPACITY,
            )
        });

        Ok(Self {
            config,
            config_hash,
            restored: false,
            node_ids: Vec::new(),
            node_index: 0,
            seed_stream,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, RngError> {
        Self::new(RngFactoryConfig::from_json(json)?)
    }

    pub fn config(&self) -> &RngFactoryConfig {
        &self.config
    }

    pub fn policy(&self) -> RngPolicy {
        self.config.policy
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    /// True when streams come from checkpoints rather than from this factory
    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Register the global node-id order used for per-node seeding
    ///
    /// Ignored unless the policy is `ONE_PER_NODE` and the factory was built
    /// fresh.
    pub fn set_node_ids(&mut self, node_ids: &[u32]) {
        if !self.restored && self.config.policy == RngPolicy::OnePerNode {
            self.node_ids = node_ids.to_vec();
            self.node_index = 0;
        }
    }

    /// Stream for a process rank
    ///
    /// `None` under `ONE_PER_NODE` or after a restore.
    pub fn create_core_stream(&mut self, rank: u16) -> Option<RandomStream> {
        if self.restored || self.config.policy != RngPolicy::OnePerCore {
            return None;
        }
        let seed = core_seed(self.config.run_number, rank);
        Some(self.build_stream(seed, CORE_STREAM_CAPACITY))
    }

    /// Stream for a simulated node
    ///
    /// `Ok(None)` under `ONE_PER_CORE`, after a restore, or for node id 0.
    /// Nodes must be requested in registration order; skipped nodes consume
    /// their seeds. An id not among the remaining registered ids is an error
    /// and consumes nothing.
    pub fn create_node_stream(&mut self, node_id: u32) -> Result<Option<RandomStream>, RngError> {
        if self.restored || self.config.policy != RngPolicy::OnePerNode || node_id == 0 {
            return Ok(None);
        }
        let seed = self.node_seed(node_id)?;
        Ok(Some(self.build_stream(seed, NODE_STREAM_CAPACITY)))
    }

    /// PseudoDes stream for reporters, seeded like a per-rank stream
    ///
    /// Independent of every simulation stream, so reporting never perturbs
    /// simulation results.
    pub fn report_stream(run_number: u16, rank: u16) -> RandomStream {
        RandomStream::new(
            GeneratorKind::PseudoDes,
            u64::from(core_seed(run_number, rank)),
        )
    }

    fn node_seed(&mut self, node_id: u32) -> Result<u32, RngError> {
        let remaining = self.node_ids.get(self.node_index..).unwrap_or_default();
        if !remaining.contains(&node_id) {
            return Err(RngError::UnknownNode(node_id));
        }
        let seed_stream = self
            .seed_stream
            .as_mut()
            .ok_or_else(|| {
                RngError::InvalidConfig("seed stream missing under ONE_PER_NODE".to_string())
            })?;

        loop {
            let seed = seed_stream.next_word();
            let registered = self.node_ids[self.node_index];
            self.node_index += 1;
            if registered == node_id {
                return Ok(seed);
            }
        }
    }

    fn build_stream(&self, seed: u32, capacity: usize) -> RandomStream {
        tracing::info!(
            generator = %self.config.generator,
            seed,
            capacity,
            "Using {} random number generator",
            self.config.generator
        );
        RandomStream::with_capacity(self.config.generator, u64::from(seed), capacity)
    }

    // ------------------------------------------------------------------------
    // Checkpointing
    // ------------------------------------------------------------------------

    pub fn snapshot(&self) -> FactorySnapshot {
        FactorySnapshot {
            generator: self.config.generator,
            policy: self.config.policy,
            run_number: self.config.run_number,
            config_hash: self.config_hash.clone(),
            seed_stream: self.seed_stream.as_ref().map(StreamSnapshot::from),
        }
    }

    /// Rebuild a factory from a snapshot taken under the same configuration
    ///
    /// The restored factory hands out no streams: each stream is restored
    /// from its own checkpoint.
    pub fn restore(config: RngFactoryConfig, snapshot: FactorySnapshot) -> Result<Self, RngError> {
        config.validate()?;
        let config_hash = compute_config_hash(&config)?;
        if config_hash != snapshot.config_hash {
            return Err(RngError::ConfigMismatch {
                expected: config_hash,
                found: snapshot.config_hash,
            });
        }

        let seed_stream = snapshot
            .seed_stream
            .map(RandomStream::try_from)
            .transpose()?;

        tracing::debug!(
            generator = %config.generator,
            policy = %config.policy,
            run_number = config.run_number,
            "Restored random stream factory"
        );

        Ok(Self {
            config,
            config_hash,
            restored: true,
            node_ids: Vec::new(),
            node_index: 0,
            seed_stream,
        })
    }
}

/// Factory state persisted with a simulation checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorySnapshot {
    pub generator: GeneratorKind,
    pub policy: RngPolicy,
    pub run_number: u16,

    /// SHA256 of the factory configuration (for validation)
    pub config_hash: String,

    /// Seed stream state under `ONE_PER_NODE`
    pub seed_stream: Option<StreamSnapshot>,
}
