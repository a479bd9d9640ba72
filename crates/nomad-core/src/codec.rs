//! State codec: agent ⇄ bytes.
//!
//! The encoded form is a JSON `AgentEnvelope`: header plus application
//! fields. Call stacks are never captured: `hop` is only called from entry
//! point bodies, so an arriving agent always starts at a fresh entry point.
//!
//! Decoding resolves the agent's code through a `CodeResolver`. A node's
//! Code Registry is such a resolver and checks its own definitions before
//! falling back to built-in types.

use tracing::debug;

use nomad_contracts::{
    agent::{AgentEnvelope, AgentHeader},
    error::{NomadError, NomadResult},
};

use crate::traits::{CodeResolver, MobileAgent};

/// An agent rebuilt from bytes.
pub struct Reconstructed {
    pub header: AgentHeader,
    pub agent: Box<dyn MobileAgent>,
}

impl std::fmt::Debug for Reconstructed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconstructed")
            .field("header", &self.header)
            .field("code_identity", &self.agent.code_identity())
            .finish()
    }
}

/// Serializes agents for transfer and rebuilds them on arrival.
pub struct StateCodec;

impl StateCodec {
    /// Encode `header` and the application `body` into transferable bytes.
    pub fn encode(header: &AgentHeader, body: serde_json::Value) -> NomadResult<Vec<u8>> {
        let envelope = AgentEnvelope::new(header.clone(), body);
        serde_json::to_vec(&envelope).map_err(|e| NomadError::Reconstruction {
            reason: format!("failed to encode agent state: {}", e),
        })
    }

    /// Parse `bytes` into an envelope without resolving any code.
    ///
    /// Rejects envelopes written in a layout this build does not know.
    pub fn decode_envelope(bytes: &[u8]) -> NomadResult<AgentEnvelope> {
        let envelope: AgentEnvelope =
            serde_json::from_slice(bytes).map_err(|e| NomadError::Reconstruction {
                reason: format!("malformed agent state: {}", e),
            })?;
        if envelope.format != AgentEnvelope::FORMAT {
            return Err(NomadError::Reconstruction {
                reason: format!(
                    "unsupported envelope format {} (expected {})",
                    envelope.format,
                    AgentEnvelope::FORMAT
                ),
            });
        }
        Ok(envelope)
    }

    /// Rebuild an agent from `bytes`, resolving its code through `resolver`.
    pub fn decode(bytes: &[u8], resolver: &dyn CodeResolver) -> NomadResult<Reconstructed> {
        let AgentEnvelope { header, body, .. } = Self::decode_envelope(bytes)?;
        let agent = resolver.restore(&header.code_identity, body)?;

        debug!(
            code_identity = %header.code_identity,
            entry_point = %header.entry_point,
            "agent state decoded"
        );
        Ok(Reconstructed { header, agent })
    }
}
