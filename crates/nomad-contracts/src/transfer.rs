//! Wire types for the `Transfer` operation.
//!
//! A sending node posts a `TransferRequest` to the receiving node's Place
//! service and gets back a `TransferResponse`. Byte fields travel as
//! lowercase hex strings so the JSON stays plain text.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed service name a Place is published under.
pub const SERVICE_NAME: &str = "place";

/// Correlates the sender's and receiver's log lines for one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One agent migration: code identity, optional artifact, encoded state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    #[serde(default)]
    pub request_id: RequestId,
    pub code_identity: String,
    /// Omitted when the sender believes the destination already has it.
    #[serde(default, with = "hex_opt")]
    pub artifact: Option<Vec<u8>>,
    /// Output of the state codec.
    #[serde(with = "hex_bytes")]
    pub state: Vec<u8>,
}

/// Why a Place declined a transfer.
///
/// The kinds are kept apart so a sender can tell whether resending the
/// artifact could help (`UnknownCode`) or not (everything else).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// The code identity is unknown and no artifact was supplied.
    UnknownCode,
    /// The supplied artifact could not be defined.
    InvalidArtifact,
    /// The agent state could not be rebuilt.
    Reconstruction,
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionKind::UnknownCode => "unknown code",
            RejectionKind::InvalidArtifact => "invalid artifact",
            RejectionKind::Reconstruction => "reconstruction failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub reason: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResponse {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

impl TransferResponse {
    pub fn accepted() -> Self {
        Self { accepted: true, rejection: None }
    }

    pub fn rejected(rejection: Rejection) -> Self {
        Self { accepted: false, rejection: Some(rejection) }
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

mod hex_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&hex::encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let text = Option::<String>::deserialize(d)?;
        text.map(|t| hex::decode(t).map_err(serde::de::Error::custom))
            .transpose()
    }
}
