//! Agent injection: launching a new agent into the platform.
//!
//! Injection is an ordinary Transfer whose agent has no identifier yet and
//! starts at `init`. The destination Place assigns the identifier.

use serde_json::Value;
use tracing::info;

use nomad_contracts::{
    agent::{AgentEnvelope, AgentHeader},
    artifact::CodeArtifact,
    error::{NomadError, NomadResult},
    transfer::{Rejection, RejectionKind, RequestId, TransferRequest},
};
use nomad_core::{BuiltinCatalog, Destination, StateCodec, Transport};
use nomad_registry::AgentProgram;

/// Header and initial state of a new `code_identity` agent.
///
/// With an `artifact` the agent runs that script; otherwise it must be a
/// built-in type of `catalog`.
pub fn instantiate(
    catalog: &BuiltinCatalog,
    code_identity: &str,
    args: Vec<String>,
    artifact: Option<&CodeArtifact>,
) -> NomadResult<(AgentHeader, Value)> {
    match artifact {
        Some(artifact) => {
            if artifact.name() != code_identity {
                return Err(NomadError::InvalidArtifact {
                    code_identity: code_identity.to_string(),
                    reason: format!("artifact is named '{}'", artifact.name()),
                });
            }
            let program = AgentProgram::parse(code_identity, artifact.blob())?;
            Ok(program.instantiate(args))
        }
        None => catalog.instantiate(code_identity, args),
    }
}

/// Send a freshly built agent to `destination` and start it at `init`.
///
/// A bare host in `destination` is completed with `header.port`; the port
/// actually used becomes the agent's default port for later hops.
///
/// Returns the `host:port` the agent was delivered to.
///
/// # Errors
///
/// `UnreachableDestination` or `TransferRejected`, exactly as for `hop`.
pub async fn inject(
    transport: &dyn Transport,
    destination: &str,
    artifact: Option<&CodeArtifact>,
    mut header: AgentHeader,
    body: Value,
) -> NomadResult<String> {
    let target = Destination::parse(destination, header.port)?;
    let address = target.to_string();

    header.entry_point = AgentEnvelope::INIT_ENTRY_POINT.to_string();
    header.port.get_or_insert(target.port);
    header.hops += 1;
    if artifact.is_some() {
        header.note_artifact_holder(&address);
    }

    let request = TransferRequest {
        request_id: RequestId::new(),
        code_identity: header.code_identity.clone(),
        artifact: artifact.map(|a| a.blob().to_vec()),
        state: StateCodec::encode(&header, body)?,
    };
    let request_id = request.request_id;

    let response = transport.transfer(&address, request).await?;
    if !response.accepted {
        let rejection = response.rejection.unwrap_or_else(|| Rejection {
            kind: RejectionKind::Reconstruction,
            reason: "declined without a reason".to_string(),
        });
        return Err(NomadError::TransferRejected { destination: address, rejection });
    }

    info!(
        request_id = %request_id,
        destination = %address,
        code_identity = %header.code_identity,
        "agent injected"
    );
    Ok(address)
}
