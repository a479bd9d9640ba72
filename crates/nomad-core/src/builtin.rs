//! Catalog of statically linked agent types.
//!
//! A node knows a fixed set of agent types at compile time. The catalog
//! maps each type's code identity to two monomorphized constructors: one
//! that restores an arriving agent from its JSON body, and one that builds
//! a freshly injected agent from command-line arguments.

use std::collections::BTreeMap;

use tracing::debug;

use nomad_contracts::{
    agent::AgentHeader,
    error::{NomadError, NomadResult},
};

use crate::{
    dispatch::TypedAgent,
    traits::{CodeResolver, Dispatch, MobileAgent},
};

type RestoreFn = fn(serde_json::Value) -> NomadResult<Box<dyn MobileAgent>>;
type InjectFn = fn(Vec<String>, &mut AgentHeader) -> NomadResult<serde_json::Value>;

#[derive(Clone, Copy)]
struct BuiltinType {
    restore: RestoreFn,
    inject: InjectFn,
}

/// The statically linked agent types known to this process.
#[derive(Clone, Default)]
pub struct BuiltinCatalog {
    types: BTreeMap<String, BuiltinType>,
}

impl BuiltinCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `A` under `A::CODE_IDENTITY`.
    pub fn register<A: Dispatch>(&mut self) -> &mut Self {
        debug!(code_identity = A::CODE_IDENTITY, "built-in agent type registered");
        self.types.insert(
            A::CODE_IDENTITY.to_string(),
            BuiltinType { restore: restore_typed::<A>, inject: inject_typed::<A> },
        );
        self
    }

    pub fn contains(&self, code_identity: &str) -> bool {
        self.types.contains_key(code_identity)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Build the header and body of a freshly injected `code_identity` agent.
    pub fn instantiate(
        &self,
        code_identity: &str,
        args: Vec<String>,
    ) -> NomadResult<(AgentHeader, serde_json::Value)> {
        let ty = self.types.get(code_identity).ok_or_else(|| NomadError::UnknownCode {
            code_identity: code_identity.to_string(),
        })?;
        let mut header = AgentHeader::injected(code_identity);
        let body = (ty.inject)(args, &mut header)?;
        Ok((header, body))
    }
}

impl CodeResolver for BuiltinCatalog {
    fn restore(
        &self,
        code_identity: &str,
        body: serde_json::Value,
    ) -> NomadResult<Box<dyn MobileAgent>> {
        let ty = self.types.get(code_identity).ok_or_else(|| NomadError::Reconstruction {
            reason: format!("code '{}' is neither registered nor built in", code_identity),
        })?;
        (ty.restore)(body)
    }
}

fn restore_typed<A: Dispatch>(body: serde_json::Value) -> NomadResult<Box<dyn MobileAgent>> {
    let agent: A = serde_json::from_value(body).map_err(|e| NomadError::Reconstruction {
        reason: format!("state does not fit '{}': {}", A::CODE_IDENTITY, e),
    })?;
    Ok(Box::new(TypedAgent::new(agent)))
}

fn inject_typed<A: Dispatch>(
    args: Vec<String>,
    header: &mut AgentHeader,
) -> NomadResult<serde_json::Value> {
    let agent = A::from_injection(args, header)?;
    TypedAgent::new(agent).snapshot()
}
