//! # nomad-core
//!
//! The agent runtime for NOMAD mobile agents.
//!
//! This crate provides:
//! - The seam traits (`MobileAgent`, `Dispatch`, `CodeResolver`, `Transport`)
//! - Dispatch tables and the `TypedAgent` adapter for built-in agent types
//! - The `BuiltinCatalog` of statically linked types
//! - The `StateCodec` that moves agents to and from bytes
//! - `AgentContext`, `hop`, and `run`: one agent incarnation on one node
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nomad_core::{Dispatch, DispatchTable, AgentContext, Flow};
//!
//! impl Dispatch for Courier {
//!     const CODE_IDENTITY: &'static str = "courier";
//!     fn dispatch_table() -> DispatchTable<Self> {
//!         DispatchTable::new().entry("init", Self::init)
//!     }
//!     // ...
//! }
//! ```

pub mod builtin;
pub mod codec;
pub mod dispatch;
pub mod events;
pub mod runtime;
pub mod traits;

pub use builtin::BuiltinCatalog;
pub use codec::{Reconstructed, StateCodec};
pub use dispatch::{DispatchTable, EntryPoint, TypedAgent};
pub use events::{EventSink, PlaceEvent};
pub use runtime::{run, AgentContext, Departure, Destination, Flow, NodeLink, Outcome};
pub use traits::{CodeResolver, Dispatch, MobileAgent, Transport};

// ── Tests ─────────────────────────────────────────────────────────────────────
