//! Errors raised while configuring or building random streams
//!
//! Sampling itself never fails: out-of-domain distribution parameters degrade
//! to boundary values instead (see `distributions`).

use crate::checkpoint::CheckpointError;
use thiserror::Error;

/// Errors that can occur while selecting generators and creating streams
#[derive(Debug, Error, PartialEq)]
pub enum RngError {
    #[error("Unknown random number generator type: {0}")]
    UnknownGenerator(String),

    #[error("Incoherent configuration: {0}")]
    IncoherentConfig(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Node {0} is not among the remaining registered node ids")]
    UnknownNode(u32),

    #[error("Snapshot taken under another configuration (expected {expected}, found {found})")]
    ConfigMismatch { expected: String, found: String },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}
