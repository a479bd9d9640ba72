//! Agent identity and state types.
//!
//! An agent is split into two halves that travel together:
//!
//! - `AgentHeader` — identity and control fields the platform reads and
//!   writes (identifier, code identity, next entry point, mailbox wiring).
//! - a JSON body: the agent's own application fields. The platform never
//!   inspects it; only the agent's code gives it meaning.
//!
//! `AgentEnvelope` pairs the two for transport.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Platform-assigned agent identifier.
///
/// Assigned by the first Place that accepts the agent and never changed
/// afterwards, no matter how many further hops follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity and control fields carried by every agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentHeader {
    /// Unset until a Place assigns one. See `assign_identifier`.
    pub identifier: Option<AgentId>,
    /// Name of the code artifact (or built-in type) that runs this agent.
    pub code_identity: String,
    /// The entry point to invoke on the next arrival.
    pub entry_point: String,
    /// Arguments for `entry_point`. `None` invokes it with no arguments.
    pub arguments: Option<Vec<String>>,
    /// Logical mailbox channel shared by cooperating agents.
    #[serde(default)]
    pub mailbox_key: Option<String>,
    /// Message left for the next agent landing on the same node under the
    /// same key.
    #[serde(default)]
    pub outgoing_message: Option<String>,
    /// Port used when a hop destination names only a host.
    #[serde(default)]
    pub port: Option<u16>,
    /// Destinations that have already accepted this agent's artifact.
    #[serde(default)]
    pub artifact_holders: Vec<String>,
    /// Number of accepted hops so far (injection included).
    #[serde(default)]
    pub hops: u64,
}

impl AgentHeader {
    /// Build the header of a freshly injected agent: no identifier, entry
    /// point `init`, no arguments.
    pub fn injected(code_identity: impl Into<String>) -> Self {
        Self {
            identifier: None,
            code_identity: code_identity.into(),
            entry_point: AgentEnvelope::INIT_ENTRY_POINT.to_string(),
            arguments: None,
            mailbox_key: None,
            outgoing_message: None,
            port: None,
            artifact_holders: Vec::new(),
            hops: 0,
        }
    }

    /// Set the identifier if, and only if, none is set yet.
    ///
    /// Returns `true` when the identifier was assigned by this call. A second
    /// call is a no-op and returns `false`.
    pub fn assign_identifier(&mut self, id: AgentId) -> bool {
        if self.identifier.is_some() {
            return false;
        }
        self.identifier = Some(id);
        true
    }

    /// Record that `destination` now holds this agent's artifact.
    pub fn note_artifact_holder(&mut self, destination: &str) {
        if !self.holds_artifact(destination) {
            self.artifact_holders.push(destination.to_string());
        }
    }

    /// True if `destination` is known to have this agent's artifact cached.
    pub fn holds_artifact(&self, destination: &str) -> bool {
        self.artifact_holders.iter().any(|h| h == destination)
    }
}

/// The transportable form of an agent: header plus application fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEnvelope {
    /// Envelope layout version. Decoders reject versions they do not know.
    pub format: u16,
    pub header: AgentHeader,
    /// Application fields, opaque to the platform.
    pub body: serde_json::Value,
}

impl AgentEnvelope {
    /// The envelope layout produced by this build.
    pub const FORMAT: u16 = 1;

    /// The entry point every injected agent starts at.
    pub const INIT_ENTRY_POINT: &'static str = "init";

    pub fn new(header: AgentHeader, body: serde_json::Value) -> Self {
        Self { format: Self::FORMAT, header, body }
    }
}
