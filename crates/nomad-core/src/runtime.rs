//! The agent runtime: per-agent execution context, `hop`, and dispatch.
//!
//! Every arriving agent runs one entry point inside an `AgentContext`. The
//! entry point either returns `Flow::Finished` or migrates with
//! `AgentContext::hop`, whose `Departure` token it returns as
//! `Flow::Departed`. A successful hop is the single exit point of the
//! incarnation:
//!
//!   entry point → hop → Transport::transfer → accepted → Departure → return
//!
//! After acceptance the context refuses further hops and the runtime treats
//! the agent as gone, even if the token was dropped. On failure the error
//! comes back to the entry point, which is free to retry elsewhere.
//!
//! Entry points run on Tokio's blocking pool. `hop` waits for the remote
//! answer with `Handle::block_on`, blocking only the agent's own task.

use std::{fmt, sync::Arc};

use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use nomad_contracts::{
    agent::{AgentHeader, AgentId},
    artifact::CodeArtifact,
    error::{NomadError, NomadResult},
    transfer::{Rejection, RejectionKind, RequestId, TransferRequest, TransferResponse},
};

use crate::{
    codec::StateCodec,
    events::{EventSink, PlaceEvent},
    traits::{MobileAgent, Transport},
};

// ── Destinations ──────────────────────────────────────────────────────────────

/// A hop target: `host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Destination {
    /// Parse `host:port`, or a bare `host` completed with `default_port`.
    pub fn parse(target: &str, default_port: Option<u16>) -> NomadResult<Self> {
        let unreachable = |reason: &str| NomadError::UnreachableDestination {
            destination: target.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = match target.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| unreachable("invalid port"))?;
                (host, port)
            }
            None => (target, default_port.ok_or_else(|| unreachable("no port given"))?),
        };
        if host.is_empty() {
            return Err(unreachable("empty host"));
        }
        Ok(Self { host: host.to_string(), port })
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ── Flow control ──────────────────────────────────────────────────────────────

/// Proof that a hop was accepted. Only `AgentContext::hop` creates one.
#[must_use = "return the departure from the entry point: nothing may run after a hop"]
#[derive(Debug)]
pub struct Departure {
    destination: String,
}

impl Departure {
    pub fn destination(&self) -> &str {
        &self.destination
    }
}

/// How an entry point ended.
#[derive(Debug)]
pub enum Flow {
    /// Returned normally; the agent ends here.
    Finished,
    /// Migrated; the agent continues on another node.
    Departed(Departure),
}

impl From<Departure> for Flow {
    fn from(departure: Departure) -> Self {
        Flow::Departed(departure)
    }
}

/// What the runtime reports once an agent's task ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Departed { destination: String },
}

// ── Node link ─────────────────────────────────────────────────────────────────

/// The node-owned resources every agent context borrows.
#[derive(Clone)]
pub struct NodeLink {
    pub host_name: String,
    pub transport: Arc<dyn Transport>,
    pub runtime: Handle,
    pub events: EventSink,
}

// ── Agent context ─────────────────────────────────────────────────────────────

/// Execution context of one agent incarnation on one node.
pub struct AgentContext {
    header: AgentHeader,
    inbox: Vec<String>,
    artifact: Option<Arc<CodeArtifact>>,
    node: NodeLink,
    departed: Option<String>,
}

impl AgentContext {
    /// Build the context for an arrived agent.
    ///
    /// `inbox` holds the mailbox messages collected for it on arrival;
    /// `artifact` is its code artifact if it runs registered code, which is
    /// attached to onward hops.
    pub fn new(
        header: AgentHeader,
        inbox: Vec<String>,
        artifact: Option<Arc<CodeArtifact>>,
        node: NodeLink,
    ) -> Self {
        Self { header, inbox, artifact, node, departed: None }
    }

    pub fn id(&self) -> Option<AgentId> {
        self.header.identifier
    }

    pub fn header(&self) -> &AgentHeader {
        &self.header
    }

    pub fn host_name(&self) -> &str {
        &self.node.host_name
    }

    /// The entry point currently running.
    pub fn entry_point(&self) -> &str {
        &self.header.entry_point
    }

    /// Messages left on this host under this agent's mailbox key.
    pub fn inbox(&self) -> &[String] {
        &self.inbox
    }

    pub fn mailbox_key(&self) -> Option<&str> {
        self.header.mailbox_key.as_deref()
    }

    pub fn set_mailbox_key(&mut self, key: impl Into<String>) {
        self.header.mailbox_key = Some(key.into());
    }

    pub fn outgoing_message(&self) -> Option<&str> {
        self.header.outgoing_message.as_deref()
    }

    /// Message to leave for the next agent on the destination node.
    pub fn set_outgoing_message(&mut self, message: impl Into<String>) {
        self.header.outgoing_message = Some(message.into());
    }

    /// Port used for destinations that name only a host.
    pub fn set_default_port(&mut self, port: u16) {
        self.header.port = Some(port);
    }

    /// Destination of the accepted hop, if any.
    pub fn departed(&self) -> Option<&str> {
        self.departed.as_deref()
    }

    /// Write `text` to the agent's console.
    pub fn say(&self, text: impl Into<String>) {
        let text = text.into();
        info!(
            host = %self.node.host_name,
            agent_id = ?self.header.identifier,
            "{}",
            text
        );
        self.node.events.publish(PlaceEvent::Said {
            host: self.node.host_name.clone(),
            agent_id: self.header.identifier,
            text,
        });
    }

    /// Migrate `agent` to `destination` and resume it at `entry_point`.
    ///
    /// Blocks until the destination accepts or declines. On success the
    /// returned `Departure` must be handed back as the entry point's result;
    /// the local incarnation is over. On failure the agent is untouched and
    /// may retry.
    ///
    /// The artifact is left out when the destination is already known to
    /// hold it; if the destination then answers `UnknownCode` (it restarted,
    /// say) the transfer is retried once with the artifact attached.
    ///
    /// # Errors
    ///
    /// - `AlreadyDeparted` if a previous hop from this context succeeded
    /// - `UnreachableDestination` for bad addresses and transport failures
    /// - `TransferRejected` when the destination declines
    pub fn hop<A: Serialize + ?Sized>(
        &mut self,
        agent: &A,
        destination: &str,
        entry_point: &str,
        args: Option<Vec<String>>,
    ) -> NomadResult<Departure> {
        if let Some(previous) = &self.departed {
            return Err(NomadError::AlreadyDeparted { destination: previous.clone() });
        }

        let target = Destination::parse(destination, self.header.port)?.to_string();
        let body = serde_json::to_value(agent).map_err(|e| NomadError::Reconstruction {
            reason: format!("failed to capture agent state: {}", e),
        })?;

        let mut header = self.header.clone();
        header.entry_point = entry_point.to_string();
        header.arguments = args;
        header.hops += 1;
        let omit_artifact = self.artifact.is_none() || header.holds_artifact(&target);
        if self.artifact.is_some() {
            header.note_artifact_holder(&target);
        }
        let state = StateCodec::encode(&header, body)?;

        let mut request = TransferRequest {
            request_id: RequestId::new(),
            code_identity: header.code_identity.clone(),
            artifact: if omit_artifact { None } else { self.artifact_blob() },
            state,
        };

        debug!(
            request_id = %request.request_id,
            agent_id = ?header.identifier,
            destination = %target,
            entry_point,
            with_artifact = request.artifact.is_some(),
            "hop requested"
        );

        let mut response = self.send(&target, request.clone())?;
        if needs_artifact(&response) && request.artifact.is_none() && self.artifact.is_some() {
            info!(
                destination = %target,
                code_identity = %header.code_identity,
                "destination lost the artifact, resending with code attached"
            );
            request.request_id = RequestId::new();
            request.artifact = self.artifact_blob();
            response = self.send(&target, request)?;
        }

        if !response.accepted {
            let rejection = response.rejection.unwrap_or_else(|| Rejection {
                kind: RejectionKind::Reconstruction,
                reason: "declined without a reason".to_string(),
            });
            warn!(
                destination = %target,
                kind = %rejection.kind,
                reason = %rejection.reason,
                "hop rejected"
            );
            return Err(NomadError::TransferRejected { destination: target, rejection });
        }

        info!(
            host = %self.node.host_name,
            agent_id = ?header.identifier,
            destination = %target,
            entry_point,
            "agent departed"
        );
        self.node.events.publish(PlaceEvent::Departed {
            host: self.node.host_name.clone(),
            agent_id: header.identifier,
            destination: target.clone(),
            entry_point: entry_point.to_string(),
        });
        self.departed = Some(target.clone());
        Ok(Departure { destination: target })
    }

    fn artifact_blob(&self) -> Option<Vec<u8>> {
        self.artifact.as_ref().map(|a| a.blob().to_vec())
    }

    fn send(&self, target: &str, request: TransferRequest) -> NomadResult<TransferResponse> {
        let transport = Arc::clone(&self.node.transport);
        self.node.runtime.block_on(async move { transport.transfer(target, request).await })
    }
}

fn needs_artifact(response: &TransferResponse) -> bool {
    matches!(
        &response.rejection,
        Some(r) if !response.accepted && r.kind == RejectionKind::UnknownCode
    )
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// Run the agent's current entry point to completion.
///
/// Invokes `header.entry_point` with `header.arguments` (or no arguments
/// when absent). A missing entry point, or any error the entry point
/// returns, comes back as `NomadError::Dispatch`; nothing here panics on
/// behalf of agent code.
pub fn run(mut agent: Box<dyn MobileAgent>, mut ctx: AgentContext) -> NomadResult<Outcome> {
    let entry_point = ctx.header.entry_point.clone();
    let args = ctx.header.arguments.clone();

    if !agent.has_entry_point(&entry_point) {
        return Err(NomadError::dispatch(
            &entry_point,
            format!("'{}' has no such entry point", agent.code_identity()),
        ));
    }

    let flow = agent.invoke(&entry_point, args, &mut ctx).map_err(|e| match e {
        e @ NomadError::Dispatch { .. } => e,
        other => NomadError::dispatch(&entry_point, other.to_string()),
    })?;

    match (flow, ctx.departed.take()) {
        (Flow::Departed(departure), _) => {
            Ok(Outcome::Departed { destination: departure.destination })
        }
        (Flow::Finished, Some(destination)) => {
            warn!(
                entry_point = %entry_point,
                destination = %destination,
                "entry point dropped its departure; treating agent as departed"
            );
            Ok(Outcome::Departed { destination })
        }
        (Flow::Finished, None) => Ok(Outcome::Finished),
    }
}
