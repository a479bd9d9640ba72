//! Code artifact type.
//!
//! A `CodeArtifact` is the runnable code an agent needs on a node it has
//! never visited: a name plus an opaque blob. The platform fingerprints the
//! blob with SHA-256 so logs can tell two blobs sharing a name apart.

use sha2::{Digest, Sha256};

/// A named, opaque code blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeArtifact {
    name: String,
    blob: Vec<u8>,
    digest: String,
}

impl CodeArtifact {
    /// Wrap `blob` as the artifact for `name`, computing its digest.
    pub fn new(name: impl Into<String>, blob: Vec<u8>) -> Self {
        let digest = digest_blob(&blob);
        Self { name: name.into(), blob, digest }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    /// Lowercase hex SHA-256 of the blob.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Lowercase 64-character hex SHA-256 of `blob`.
pub fn digest_blob(blob: &[u8]) -> String {
    hex::encode(Sha256::digest(blob))
}
