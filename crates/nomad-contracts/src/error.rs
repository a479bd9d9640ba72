//! Error types for the NOMAD platform.
//!
//! All fallible operations return `NomadResult<T>`. Variants carry enough
//! context for a log line to be actionable on its own.

use thiserror::Error;

use crate::transfer::Rejection;

/// The unified error type for the NOMAD platform.
#[derive(Debug, Error)]
pub enum NomadError {
    /// The destination could not be reached during a hop or injection.
    ///
    /// Non-fatal: the agent survives and may retry or pick another
    /// destination.
    #[error("destination '{destination}' unreachable: {reason}")]
    UnreachableDestination { destination: String, reason: String },

    /// The destination answered but declined the transfer.
    #[error("transfer to '{destination}' rejected: {rejection}")]
    TransferRejected { destination: String, rejection: Rejection },

    /// The code identity is not registered, not built in, and no artifact
    /// came with the request.
    #[error("unknown code '{code_identity}': not registered and no artifact supplied")]
    UnknownCode { code_identity: String },

    /// A supplied artifact could not be turned into runnable code.
    #[error("invalid artifact '{code_identity}': {reason}")]
    InvalidArtifact { code_identity: String, reason: String },

    /// Agent state bytes are malformed or inconsistent with the resolved code.
    #[error("reconstruction failed: {reason}")]
    Reconstruction { reason: String },

    /// The named entry point is missing, or it failed while running.
    #[error("dispatch of '{entry_point}' failed: {reason}")]
    Dispatch { entry_point: String, reason: String },

    /// `hop` was called again after a hop already succeeded.
    #[error("agent already departed to '{destination}'")]
    AlreadyDeparted { destination: String },

    /// A configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// Local I/O failed (reading an artifact, binding a socket).
    #[error("i/o error: {reason}")]
    Io { reason: String },
}

impl NomadError {
    /// Shorthand for an entry point that failed on its own terms.
    pub fn dispatch(entry_point: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Dispatch { entry_point: entry_point.into(), reason: reason.into() }
    }
}

/// Convenience alias used throughout the NOMAD crates.
pub type NomadResult<T> = Result<T, NomadError>;
