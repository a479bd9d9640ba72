//! Agent identifier minting.
//!
//! An identifier is the last three decimal digits of this node's advertised
//! address followed by a per-node counter: node `10.0.0.101` mints `1011`,
//! `1012`, … . Unique within one node process; across nodes it is only as
//! unique as the address digits.

use std::sync::atomic::{AtomicU64, Ordering};

use nomad_contracts::agent::AgentId;

const PREFIX_DIGITS: usize = 3;

#[derive(Debug)]
pub struct IdentifierMint {
    prefix: String,
    counter: AtomicU64,
}

impl IdentifierMint {
    /// A mint prefixing identifiers with the digits of `advertise_address`.
    pub fn new(advertise_address: &str) -> Self {
        let digits: String = advertise_address.chars().filter(char::is_ascii_digit).collect();
        let prefix = digits[digits.len().saturating_sub(PREFIX_DIGITS)..].to_string();
        Self { prefix, counter: AtomicU64::new(0) }
    }

    /// The next identifier. Never repeats within this mint.
    pub fn next(&self) -> AgentId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("{}{}", self.prefix, n).parse::<u64>().unwrap_or(n);
        AgentId(id)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
