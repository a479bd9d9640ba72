//! TOML configuration for a Place node.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! host_name = "uw1-320-11"
//! listen = "0.0.0.0:9001"
//! advertise_address = "10.0.0.101"
//! transfer_timeout_ms = 5000
//! event_capacity = 256
//! ```

use std::{net::SocketAddr, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use nomad_contracts::error::{NomadError, NomadResult};

/// Default port a Place listens on.
pub const DEFAULT_PORT: u16 = 9001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceConfig {
    /// Name used as the host component of mailbox slots and in logs.
    pub host_name: String,
    /// Socket address the HTTP Place Server binds to.
    pub listen: SocketAddr,
    /// Address other nodes know this one by. Its trailing digits prefix the
    /// identifiers this node assigns.
    pub advertise_address: String,
    /// Upper bound on one outgoing transfer, connect included.
    pub transfer_timeout_ms: u64,
    /// Events buffered per lagging subscriber.
    pub event_capacity: usize,
}

impl Default for PlaceConfig {
    fn default() -> Self {
        Self {
            host_name: "localhost".to_string(),
            listen: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            advertise_address: "127.0.0.1".to_string(),
            transfer_timeout_ms: 5_000,
            event_capacity: 256,
        }
    }
}

impl PlaceConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `NomadError::Config` if the TOML is malformed, has fields of
    /// the wrong type, or fails `validate`.
    pub fn from_toml_str(s: &str) -> NomadResult<Self> {
        let config: PlaceConfig = toml::from_str(s).map_err(|e| NomadError::Config {
            reason: format!("failed to parse place TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML.
    pub fn from_file(path: &Path) -> NomadResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| NomadError::Config {
            reason: format!("failed to read place config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> NomadResult<()> {
        if self.host_name.trim().is_empty() {
            return Err(NomadError::Config { reason: "host_name must not be empty".to_string() });
        }
        if self.transfer_timeout_ms == 0 {
            return Err(NomadError::Config {
                reason: "transfer_timeout_ms must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }
}
