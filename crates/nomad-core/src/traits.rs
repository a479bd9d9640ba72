//! Core trait definitions for the NOMAD platform.
//!
//! These traits mark the seams between the runtime and everything it
//! cannot know in advance:
//!
//! - `MobileAgent`  — a reconstructed agent the runtime can dispatch into
//! - `Dispatch`     — a statically linked agent type with a dispatch table
//! - `CodeResolver` — turns a code identity plus state into a `MobileAgent`
//! - `Transport`    — carries a `TransferRequest` to another node
//!
//! The runtime only ever calls entry points through `MobileAgent::invoke`,
//! and only ever reaches other nodes through `Transport`.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use nomad_contracts::{
    agent::AgentHeader,
    error::NomadResult,
    transfer::{TransferRequest, TransferResponse},
};

use crate::{
    dispatch::DispatchTable,
    runtime::{AgentContext, Flow},
};

/// A reconstructed agent, ready to run one entry point.
///
/// Implemented by `TypedAgent<T>` for built-in types and by the registry's
/// script agents for code that arrived as an artifact.
pub trait MobileAgent: Send {
    /// Name of the code that runs this agent.
    fn code_identity(&self) -> &str;

    /// True if `entry_point` names an operation this agent's code exposes.
    fn has_entry_point(&self, entry_point: &str) -> bool;

    /// Run `entry_point` with `args`.
    ///
    /// The runtime checks `has_entry_point` first; implementations still
    /// return `NomadError::Dispatch` for unknown names rather than panic.
    fn invoke(
        &mut self,
        entry_point: &str,
        args: Option<Vec<String>>,
        ctx: &mut AgentContext,
    ) -> NomadResult<Flow>;

    /// The agent's application fields as JSON.
    fn snapshot(&self) -> NomadResult<serde_json::Value>;
}

/// A statically linked agent type.
///
/// The type's serialized form is the agent's application state; its
/// dispatch table is the complete list of entry points a remote `hop` may
/// name. Nothing outside the table can be invoked.
pub trait Dispatch: Serialize + DeserializeOwned + Send + 'static {
    /// The code identity this type is registered under.
    const CODE_IDENTITY: &'static str;

    /// The entry points this type exposes.
    fn dispatch_table() -> DispatchTable<Self>;

    /// Build a freshly injected agent from the injection arguments.
    ///
    /// `header` is the injected header (no identifier, entry point `init`);
    /// implementations may set the mailbox key or an initial outgoing
    /// message on it.
    fn from_injection(args: Vec<String>, header: &mut AgentHeader) -> NomadResult<Self>;
}

/// Resolves a code identity to runnable code and rebuilds an agent on it.
pub trait CodeResolver: Send + Sync {
    /// Rebuild the agent whose code is `code_identity` from its JSON `body`.
    ///
    /// Returns `NomadError::Reconstruction` when the identity is unknown or
    /// the body does not fit the resolved code.
    fn restore(
        &self,
        code_identity: &str,
        body: serde_json::Value,
    ) -> NomadResult<Box<dyn MobileAgent>>;
}

/// Carries transfer requests from this node to another.
///
/// Implementations map connection failures to
/// `NomadError::UnreachableDestination`. An explicit rejection is NOT an
/// error at this layer. It comes back as a `TransferResponse` with
/// `accepted = false` so the caller can inspect the rejection kind.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `request` to the Place at `destination` (`host:port`).
    async fn transfer(
        &self,
        destination: &str,
        request: TransferRequest,
    ) -> NomadResult<TransferResponse>;
}
