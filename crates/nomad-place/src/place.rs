//! The Place: one node's transfer service and agent host.
//!
//! Every accepted transfer goes through the same pipeline:
//!
//!   Receive → Register → Reconstruct → Assign Identity → Attach Mailbox → Launch
//!
//! Any failure before Launch rejects the transfer and the sender's agent
//! stays alive. Launch spawns the entry point on the blocking pool and
//! returns without waiting for it; errors and panics inside it are confined
//! to that task and reported as `PlaceEvent::Failed`.

use std::{any::Any, sync::Arc};

use tokio::{runtime::Handle, sync::broadcast};
use tracing::{debug, error, info, warn};

use nomad_contracts::{
    agent::{AgentHeader, AgentId},
    artifact::CodeArtifact,
    error::{NomadError, NomadResult},
    transfer::{Rejection, RejectionKind, TransferRequest, TransferResponse},
};
use nomad_core::{
    run, AgentContext, BuiltinCatalog, EventSink, MobileAgent, NodeLink, Outcome, PlaceEvent,
    StateCodec, Transport,
};
use nomad_mailbox::MailboxStore;
use nomad_registry::CodeRegistry;

use crate::{config::PlaceConfig, identity::IdentifierMint};

/// An agent that passed every admission step and is ready to launch.
struct Admitted {
    agent_id: AgentId,
    header: AgentHeader,
    agent: Box<dyn MobileAgent>,
    artifact: Option<Arc<CodeArtifact>>,
    inbox: Vec<String>,
}

/// A node hosting mobile agents.
///
/// Owns the node's Code Registry, Mailbox Store, and identifier mint. Shared
/// as `Arc<Place>` by the server and every agent running here.
pub struct Place {
    config: PlaceConfig,
    registry: CodeRegistry,
    mailbox: MailboxStore,
    mint: IdentifierMint,
    events: EventSink,
    transport: Arc<dyn Transport>,
    runtime: Handle,
}

impl Place {
    /// Build a Place on the current Tokio runtime.
    ///
    /// `transport` is what agents hopping away from this node use.
    ///
    /// # Errors
    ///
    /// `NomadError::Config` if `config` is invalid or no Tokio runtime is
    /// running.
    pub fn new(
        config: PlaceConfig,
        builtins: BuiltinCatalog,
        transport: Arc<dyn Transport>,
    ) -> NomadResult<Arc<Self>> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| NomadError::Config {
            reason: format!("a place needs a running tokio runtime: {}", e),
        })?;

        info!(
            host = %config.host_name,
            advertise_address = %config.advertise_address,
            builtins = ?builtins.names().collect::<Vec<_>>(),
            "place created"
        );

        Ok(Arc::new(Self {
            mint: IdentifierMint::new(&config.advertise_address),
            events: EventSink::new(config.event_capacity),
            registry: CodeRegistry::new(builtins),
            mailbox: MailboxStore::new(),
            config,
            transport,
            runtime,
        }))
    }

    pub fn host_name(&self) -> &str {
        &self.config.host_name
    }

    pub fn config(&self) -> &PlaceConfig {
        &self.config
    }

    pub fn registry(&self) -> &CodeRegistry {
        &self.registry
    }

    pub fn mailbox(&self) -> &MailboxStore {
        &self.mailbox
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaceEvent> {
        self.events.subscribe()
    }

    /// Handle one incoming Transfer.
    ///
    /// Returns once the agent is launched (or rejected); never waits for
    /// the agent's entry point.
    pub fn transfer(&self, request: TransferRequest) -> TransferResponse {
        debug!(
            request_id = %request.request_id,
            host = %self.config.host_name,
            code_identity = %request.code_identity,
            with_artifact = request.artifact.is_some(),
            "transfer received"
        );

        match self.admit(&request) {
            Ok(admitted) => {
                self.launch(admitted);
                TransferResponse::accepted()
            }
            Err(e) => {
                let rejection = rejection_for(e);
                warn!(
                    request_id = %request.request_id,
                    host = %self.config.host_name,
                    code_identity = %request.code_identity,
                    kind = %rejection.kind,
                    reason = %rejection.reason,
                    "transfer rejected"
                );
                self.events.publish(PlaceEvent::Rejected {
                    host: self.config.host_name.clone(),
                    code_identity: request.code_identity.clone(),
                    rejection: rejection.clone(),
                });
                TransferResponse::rejected(rejection)
            }
        }
    }

    fn admit(&self, request: &TransferRequest) -> NomadResult<Admitted> {
        // Register
        let resolved = self
            .registry
            .ensure_registered(&request.code_identity, request.artifact.as_deref())?;

        // Reconstruct
        let rebuilt = StateCodec::decode(&request.state, &self.registry)?;
        let mut header = rebuilt.header;
        if header.code_identity != request.code_identity {
            return Err(NomadError::Reconstruction {
                reason: format!(
                    "state belongs to '{}' but was sent as '{}'",
                    header.code_identity, request.code_identity
                ),
            });
        }

        // Assign Identity
        let agent_id = match header.identifier {
            Some(id) => id,
            None => {
                let id = self.mint.next();
                header.assign_identifier(id);
                info!(host = %self.config.host_name, agent_id = %id, "identifier assigned");
                id
            }
        };

        // Attach Mailbox
        let inbox = self.attach_mailbox(&header);

        Ok(Admitted { agent_id, header, agent: rebuilt.agent, artifact: resolved.artifact(), inbox })
    }

    fn attach_mailbox(&self, header: &AgentHeader) -> Vec<String> {
        let Some(key) = header.mailbox_key.as_deref() else {
            return Vec::new();
        };
        let host = self.config.host_name.as_str();
        let inbox = self.mailbox.collect(key, host);

        if let Some(message) = &header.outgoing_message {
            let text = match header.identifier {
                Some(id) => format!("({}) {}", id, message),
                None => message.clone(),
            };
            self.mailbox.deposit(key, host, text, header.identifier);
        }
        inbox
    }

    fn launch(&self, admitted: Admitted) {
        let Admitted { agent_id, header, agent, artifact, inbox } = admitted;
        let host = self.config.host_name.clone();
        let entry_point = header.entry_point.clone();

        info!(
            host = %host,
            agent_id = %agent_id,
            code_identity = %header.code_identity,
            entry_point = %entry_point,
            hops = header.hops,
            "agent launched"
        );
        self.events.publish(PlaceEvent::Launched {
            host: host.clone(),
            agent_id,
            code_identity: header.code_identity.clone(),
            entry_point: entry_point.clone(),
            arguments: header.arguments.clone(),
            inbox: inbox.clone(),
        });

        let node = NodeLink {
            host_name: host.clone(),
            transport: Arc::clone(&self.transport),
            runtime: self.runtime.clone(),
            events: self.events.clone(),
        };
        let ctx = AgentContext::new(header, inbox, artifact, node);
        let task = self.runtime.spawn_blocking(move || run(agent, ctx));

        let events = self.events.clone();
        self.runtime.spawn(async move {
            let failure = match task.await {
                Ok(Ok(Outcome::Finished)) => {
                    info!(host = %host, agent_id = %agent_id, entry_point = %entry_point, "agent completed");
                    events.publish(PlaceEvent::Completed { host, agent_id, entry_point });
                    return;
                }
                Ok(Ok(Outcome::Departed { destination })) => {
                    debug!(host = %host, agent_id = %agent_id, destination = %destination, "agent task ended after hop");
                    return;
                }
                Ok(Err(e)) => {
                    warn!(host = %host, agent_id = %agent_id, entry_point = %entry_point, error = %e, "agent failed");
                    e.to_string()
                }
                Err(join) if join.is_panic() => {
                    let reason = format!("panicked: {}", panic_message(join.into_panic()));
                    error!(host = %host, agent_id = %agent_id, entry_point = %entry_point, reason = %reason, "agent task panicked");
                    reason
                }
                Err(join) => {
                    warn!(host = %host, agent_id = %agent_id, error = %join, "agent task cancelled");
                    join.to_string()
                }
            };
            events.publish(PlaceEvent::Failed { host, agent_id, entry_point, reason: failure });
        });
    }
}

/// Map an admission failure to the rejection sent back to the caller.
fn rejection_for(error: NomadError) -> Rejection {
    let kind = match &error {
        NomadError::UnknownCode { .. } => RejectionKind::UnknownCode,
        NomadError::InvalidArtifact { .. } => RejectionKind::InvalidArtifact,
        _ => RejectionKind::Reconstruction,
    };
    Rejection { kind, reason: error.to_string() }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
