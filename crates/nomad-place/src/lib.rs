//! # nomad-place
//!
//! A Place is the node side of the platform: it accepts transferred agents,
//! gives them an identity and their mailbox, and runs them.
//!
//! This crate provides:
//! - `Place` — the transfer pipeline and agent launcher
//! - `PlaceServer` — the HTTP binding (`POST /place`)
//! - `HttpTransport` and `LocalNetwork` — ways for agents to reach Places
//! - `inject` — launching new agents into the platform
//! - `PlaceConfig` — TOML node configuration

pub mod config;
pub mod identity;
pub mod inject;
pub mod network;
pub mod place;
pub mod server;
pub mod transport;

pub use config::{PlaceConfig, DEFAULT_PORT};
pub use identity::IdentifierMint;
pub use inject::{inject, instantiate};
pub use network::LocalNetwork;
pub use place::Place;
pub use server::{router, PlaceServer};
pub use transport::HttpTransport;

// ── Tests ─────────────────────────────────────────────────────────────────────
