//! Node events observable by tests, the demo, and operators.
//!
//! Events are published on a `tokio::sync::broadcast` channel owned by the
//! node. Publishing never blocks and never fails: with no subscribers the
//! event is simply dropped.

use tokio::sync::broadcast;

use nomad_contracts::{agent::AgentId, transfer::Rejection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceEvent {
    /// A transfer was accepted and the agent's entry point launched.
    Launched {
        host: String,
        agent_id: AgentId,
        code_identity: String,
        entry_point: String,
        arguments: Option<Vec<String>>,
        inbox: Vec<String>,
    },
    /// An agent wrote to its console.
    Said { host: String, agent_id: Option<AgentId>, text: String },
    /// An agent hopped away from this node.
    Departed { host: String, agent_id: Option<AgentId>, destination: String, entry_point: String },
    /// An entry point returned without hopping.
    Completed { host: String, agent_id: AgentId, entry_point: String },
    /// An entry point failed or panicked. The node keeps serving.
    Failed { host: String, agent_id: AgentId, entry_point: String, reason: String },
    /// A transfer was declined.
    Rejected { host: String, code_identity: String, rejection: Rejection },
}

/// Publishing half of a node's event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<PlaceEvent>,
}

impl EventSink {
    /// A channel retaining up to `capacity` events per lagging subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: PlaceEvent) {
        // No subscribers is normal.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaceEvent> {
        self.tx.subscribe()
    }
}
