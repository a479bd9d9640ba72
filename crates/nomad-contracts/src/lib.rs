//! # nomad-contracts
//!
//! Shared types, wire formats, and error contracts for the NOMAD
//! mobile-agent platform.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod agent;
pub mod artifact;
pub mod error;
pub mod transfer;

#[cfg(test)]
mod tests {
    use super::*;
    use agent::{AgentEnvelope, AgentHeader, AgentId};
    use artifact::CodeArtifact;
    use error::NomadError;
    use transfer::{Rejection, RejectionKind, TransferRequest, TransferResponse};

    // ── AgentHeader ──────────────────────────────────────────────────────────

    #[test]
    fn injected_header_has_no_identifier_and_starts_at_init() {
        let header = AgentHeader::injected("test-agent");
        assert_eq!(header.identifier, None);
        assert_eq!(header.entry_point, "init");
        assert_eq!(header.arguments, None);
        assert_eq!(header.hops, 0);
    }

    #[test]
    fn identifier_is_assigned_once() {
        let mut header = AgentHeader::injected("test-agent");

        assert!(header.assign_identifier(AgentId(1231)));
        assert!(!header.assign_identifier(AgentId(9999)));

        // The second assignment is a no-op, not an overwrite.
        assert_eq!(header.identifier, Some(AgentId(1231)));
    }

    #[test]
    fn artifact_holders_are_not_duplicated() {
        let mut header = AgentHeader::injected("test-agent");
        header.note_artifact_holder("10.0.0.2:9001");
        header.note_artifact_holder("10.0.0.2:9001");

        assert!(header.holds_artifact("10.0.0.2:9001"));
        assert!(!header.holds_artifact("10.0.0.3:9001"));
        assert_eq!(header.artifact_holders.len(), 1);
    }

    #[test]
    fn envelope_tolerates_missing_optional_header_fields() {
        let json = r#"{
            "format": 1,
            "header": {
                "identifier": null,
                "code_identity": "test-agent",
                "entry_point": "init",
                "arguments": null
            },
            "body": {}
        }"#;
        let envelope: AgentEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.header.mailbox_key, None);
        assert!(envelope.header.artifact_holders.is_empty());
    }

    // ── CodeArtifact ─────────────────────────────────────────────────────────

    #[test]
    fn artifact_digest_tracks_blob_content() {
        let a = CodeArtifact::new("x", b"one".to_vec());
        let b = CodeArtifact::new("x", b"one".to_vec());
        let c = CodeArtifact::new("x", b"two".to_vec());

        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 64);
    }

    // ── Transfer wire format ─────────────────────────────────────────────────

    #[test]
    fn transfer_request_bytes_travel_as_hex() {
        let request = TransferRequest {
            request_id: Default::default(),
            code_identity: "test-agent".to_string(),
            artifact: Some(vec![0xde, 0xad]),
            state: vec![0x01, 0xff],
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["artifact"], "dead");
        assert_eq!(json["state"], "01ff");
    }

    #[test]
    fn transfer_request_without_artifact_decodes() {
        let json = r#"{ "code_identity": "test-agent", "state": "7b7d" }"#;
        let request: TransferRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.artifact, None);
        assert_eq!(request.state, b"{}".to_vec());
    }

    #[test]
    fn transfer_request_rejects_non_hex_state() {
        let json = r#"{ "code_identity": "test-agent", "state": "zz" }"#;
        assert!(serde_json::from_str::<TransferRequest>(json).is_err());
    }

    #[test]
    fn rejected_response_keeps_its_kind() {
        let response = TransferResponse::rejected(Rejection {
            kind: RejectionKind::UnknownCode,
            reason: "X".to_string(),
        });
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("unknown_code"));

        let decoded: TransferResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, response);
    }

    // ── NomadError display messages ──────────────────────────────────────────

    #[test]
    fn error_unreachable_display() {
        let err = NomadError::UnreachableDestination {
            destination: "uw1-320-10:9001".to_string(),
            reason: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("uw1-320-10:9001"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn error_transfer_rejected_display_names_the_kind() {
        let err = NomadError::TransferRejected {
            destination: "node-b:9001".to_string(),
            rejection: Rejection {
                kind: RejectionKind::Reconstruction,
                reason: "unsupported envelope format 7".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("reconstruction failed"));
        assert!(msg.contains("format 7"));
    }

    #[test]
    fn error_dispatch_display() {
        let err = NomadError::dispatch("warp", "no such entry point");
        let msg = err.to_string();
        assert!(msg.contains("warp"));
        assert!(msg.contains("no such entry point"));
    }
}
