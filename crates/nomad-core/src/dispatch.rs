//! Dispatch tables: the named entry points of a statically linked agent.
//!
//! A `DispatchTable<A>` maps entry-point names to plain function pointers.
//! `TypedAgent<A>` pairs an agent value with its table and exposes both to
//! the runtime as a `MobileAgent`.

use std::collections::BTreeMap;

use nomad_contracts::error::{NomadError, NomadResult};

use crate::{
    runtime::{AgentContext, Flow},
    traits::{Dispatch, MobileAgent},
};

/// One entry point of agent type `A`.
pub type EntryPoint<A> = fn(&mut A, &mut AgentContext, Option<Vec<String>>) -> NomadResult<Flow>;

/// Entry-point name → callable, for one agent type.
pub struct DispatchTable<A> {
    entries: BTreeMap<&'static str, EntryPoint<A>>,
}

impl<A> DispatchTable<A> {
    pub fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    /// Add `name` to the table. A repeated name replaces the earlier entry.
    pub fn entry(mut self, name: &'static str, f: EntryPoint<A>) -> Self {
        self.entries.insert(name, f);
        self
    }

    pub fn get(&self, name: &str) -> Option<EntryPoint<A>> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entry-point names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}

impl<A> Default for DispatchTable<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// A `Dispatch` type wrapped for the runtime.
pub struct TypedAgent<A: Dispatch> {
    agent: A,
    table: DispatchTable<A>,
}

impl<A: Dispatch> TypedAgent<A> {
    pub fn new(agent: A) -> Self {
        Self { agent, table: A::dispatch_table() }
    }

    pub fn inner(&self) -> &A {
        &self.agent
    }

    pub fn into_inner(self) -> A {
        self.agent
    }
}

impl<A: Dispatch> MobileAgent for TypedAgent<A> {
    fn code_identity(&self) -> &str {
        A::CODE_IDENTITY
    }

    fn has_entry_point(&self, entry_point: &str) -> bool {
        self.table.contains(entry_point)
    }

    fn invoke(
        &mut self,
        entry_point: &str,
        args: Option<Vec<String>>,
        ctx: &mut AgentContext,
    ) -> NomadResult<Flow> {
        let f = self.table.get(entry_point).ok_or_else(|| {
            NomadError::dispatch(
                entry_point,
                format!("'{}' has no such entry point", A::CODE_IDENTITY),
            )
        })?;
        f(&mut self.agent, ctx, args)
    }

    fn snapshot(&self) -> NomadResult<serde_json::Value> {
        serde_json::to_value(&self.agent).map_err(|e| NomadError::Reconstruction {
            reason: format!("failed to capture '{}' state: {}", A::CODE_IDENTITY, e),
        })
    }
}
