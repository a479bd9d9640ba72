//! The Code Registry: code known to one node.
//!
//! Resolution of a name, in order:
//!
//! 1. already defined here from an earlier artifact → use that definition,
//!    ignoring any blob the caller supplied
//! 2. a built-in type of this process → use the built-in
//! 3. a blob was supplied → validate it as an agent script and define it
//! 4. otherwise → `UnknownCode`
//!
//! Steps 1–3 run under one lock, so concurrent arrivals of the same name
//! define it at most once and every caller sees that single definition.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde_json::Value;
use tracing::{debug, info};

use nomad_contracts::{
    artifact::{digest_blob, CodeArtifact},
    error::{NomadError, NomadResult},
};
use nomad_core::{BuiltinCatalog, CodeResolver, MobileAgent};

use crate::script::{AgentProgram, ScriptAgent};

/// A name defined from a shipped artifact.
#[derive(Debug)]
pub struct Definition {
    artifact: Arc<CodeArtifact>,
    program: Arc<AgentProgram>,
}

impl Definition {
    pub fn artifact(&self) -> &Arc<CodeArtifact> {
        &self.artifact
    }

    pub fn program(&self) -> &Arc<AgentProgram> {
        &self.program
    }
}

/// How a name resolved.
#[derive(Debug, Clone)]
pub enum ResolvedCode {
    /// Statically linked into this process.
    Builtin,
    /// Defined from an artifact, here or on an earlier arrival.
    Defined(Arc<Definition>),
}

impl ResolvedCode {
    /// The artifact an agent running this code carries onward, if any.
    pub fn artifact(&self) -> Option<Arc<CodeArtifact>> {
        match self {
            ResolvedCode::Builtin => None,
            ResolvedCode::Defined(def) => Some(Arc::clone(&def.artifact)),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    defined: HashMap<String, Arc<Definition>>,
    definitions_made: usize,
}

/// Per-node registry of runnable code.
pub struct CodeRegistry {
    builtins: BuiltinCatalog,
    state: Mutex<RegistryState>,
}

impl CodeRegistry {
    pub fn new(builtins: BuiltinCatalog) -> Self {
        Self { builtins, state: Mutex::new(RegistryState::default()) }
    }

    pub fn builtins(&self) -> &BuiltinCatalog {
        &self.builtins
    }

    /// Make `name` runnable here, defining it from `blob` if needed.
    ///
    /// Never redefines a name and never replaces a built-in.
    ///
    /// # Errors
    ///
    /// - `UnknownCode` when the name is unknown and no blob was supplied
    /// - `InvalidArtifact` when the blob is not a valid script for `name`;
    ///   nothing is defined in that case
    pub fn ensure_registered(&self, name: &str, blob: Option<&[u8]>) -> NomadResult<ResolvedCode> {
        let mut state = self.lock();

        if let Some(def) = state.defined.get(name) {
            if let Some(blob) = blob {
                let offered = digest_blob(blob);
                if offered != def.artifact.digest() {
                    info!(
                        code_identity = name,
                        defined = %def.artifact.digest(),
                        offered = %offered,
                        "ignoring different blob for an already defined name"
                    );
                }
            }
            return Ok(ResolvedCode::Defined(Arc::clone(def)));
        }

        if self.builtins.contains(name) {
            if blob.is_some() {
                debug!(code_identity = name, "built-in type wins over shipped artifact");
            }
            return Ok(ResolvedCode::Builtin);
        }

        let blob = blob.ok_or_else(|| NomadError::UnknownCode { code_identity: name.to_string() })?;
        let program = AgentProgram::parse(name, blob)?;
        let artifact = CodeArtifact::new(name, blob.to_vec());

        info!(
            code_identity = name,
            digest = %artifact.digest(),
            entry_points = program.entry_points.len(),
            "code artifact defined"
        );

        let def = Arc::new(Definition { artifact: Arc::new(artifact), program: Arc::new(program) });
        state.defined.insert(name.to_string(), Arc::clone(&def));
        state.definitions_made += 1;
        Ok(ResolvedCode::Defined(def))
    }

    /// The definition for `name`, if it was defined from an artifact.
    pub fn definition(&self, name: &str) -> Option<Arc<Definition>> {
        self.lock().defined.get(name).cloned()
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.builtins.contains(name) || self.lock().defined.contains_key(name)
    }

    /// Number of times a name was defined from an artifact on this node.
    pub fn definition_count(&self) -> usize {
        self.lock().definitions_made
    }

    /// Names defined from artifacts, sorted.
    pub fn defined_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().defined.keys().cloned().collect();
        names.sort();
        names
    }

    // Definitions are inserted whole, so a panic elsewhere never leaves the
    // map half-written and a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CodeResolver for CodeRegistry {
    fn restore(&self, code_identity: &str, body: Value) -> NomadResult<Box<dyn MobileAgent>> {
        match self.definition(code_identity) {
            Some(def) => Ok(Box::new(ScriptAgent::restore(Arc::clone(&def.program), body)?)),
            None => self.builtins.restore(code_identity, body),
        }
    }
}
