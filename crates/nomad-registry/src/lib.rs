//! # nomad-registry
//!
//! Code known to a node: built-in agent types plus names defined from
//! shipped code artifacts, each at most once per node. Artifacts carry
//! agent scripts (see [`script`]) that run in an embedded interpreter.

pub mod registry;
pub mod script;

pub use registry::{CodeRegistry, Definition, ResolvedCode};
pub use script::{AgentProgram, Instruction, ScriptAgent};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier, Mutex};

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use tokio::runtime::Handle;

    use nomad_contracts::{
        agent::{AgentHeader, AgentId},
        error::{NomadError, NomadResult},
        transfer::{TransferRequest, TransferResponse},
    };
    use nomad_core::{
        run, AgentContext, BuiltinCatalog, CodeResolver, Dispatch, DispatchTable, EventSink, Flow,
        MobileAgent, NodeLink, Outcome, PlaceEvent, StateCodec, Transport,
    };

    use super::*;

    // ── Fixtures ─────────────────────────────────────────────────────────────

    #[derive(Debug, Serialize, Deserialize)]
    struct Idle {}

    impl Idle {
        fn init(&mut self, _ctx: &mut AgentContext, _args: Option<Vec<String>>) -> NomadResult<Flow> {
            Ok(Flow::Finished)
        }
    }

    impl Dispatch for Idle {
        const CODE_IDENTITY: &'static str = "idle";

        fn dispatch_table() -> DispatchTable<Self> {
            DispatchTable::new().entry("init", Self::init)
        }

        fn from_injection(_args: Vec<String>, _header: &mut AgentHeader) -> NomadResult<Self> {
            Ok(Self {})
        }
    }

    /// Accepts every transfer and keeps it.
    #[derive(Default)]
    struct AcceptAll {
        sent: Arc<Mutex<Vec<(String, TransferRequest)>>>,
    }

    #[async_trait]
    impl Transport for AcceptAll {
        async fn transfer(
            &self,
            destination: &str,
            request: TransferRequest,
        ) -> NomadResult<TransferResponse> {
            self.sent.lock().unwrap().push((destination.to_string(), request));
            Ok(TransferResponse::accepted())
        }
    }

    const COURIER: &str = r#"{
        "agent": "courier",
        "mailbox_key": "K7",
        "inject_into": "route",
        "fields": { "visits": 0 },
        "entry_points": {
            "init": [
                { "op": "incr", "field": "visits" },
                { "op": "say", "text": "agent({id}) on {host} visit {visits}" },
                { "op": "show_inbox" },
                { "op": "leave_message", "text": "courier passed {host}" },
                { "op": "set", "field": "last", "value": "$field.route.0" },
                { "op": "hop", "to": "$field.route.0", "entry": "greet", "args": ["hi", "$field.visits"] }
            ],
            "greet": [ { "op": "say", "text": "{arg0} x{arg1}" } ],
            "crash": [ { "op": "fail", "reason": "stopped at {host}" } ],
            "lost": [ { "op": "hop", "to": "$field.nowhere", "entry": "greet" } ]
        }
    }"#;

    fn registry() -> CodeRegistry {
        let mut catalog = BuiltinCatalog::new();
        catalog.register::<Idle>();
        CodeRegistry::new(catalog)
    }

    fn courier_program() -> AgentProgram {
        AgentProgram::parse("courier", COURIER.as_bytes()).unwrap()
    }

    fn context(header: AgentHeader, inbox: Vec<String>, transport: Arc<AcceptAll>) -> (AgentContext, EventSink) {
        let events = EventSink::new(32);
        let node = NodeLink {
            host_name: "node-a".to_string(),
            transport,
            runtime: Handle::current(),
            events: events.clone(),
        };
        (AgentContext::new(header, inbox, None, node), events)
    }

    fn said(rx: &mut tokio::sync::broadcast::Receiver<PlaceEvent>) -> Vec<String> {
        let mut out = vec![];
        while let Ok(event) = rx.try_recv() {
            if let PlaceEvent::Said { text, .. } = event {
                out.push(text);
            }
        }
        out
    }

    // ── Script validation ────────────────────────────────────────────────────

    #[test]
    fn valid_script_parses() {
        let program = courier_program();
        assert_eq!(program.agent, "courier");
        assert_eq!(program.entry_points.len(), 4);
        assert_eq!(program.entry_points["greet"][0], Instruction::Say { text: "{arg0} x{arg1}".into() });
    }

    #[test]
    fn script_must_match_shipped_name() {
        let result = AgentProgram::parse("postman", COURIER.as_bytes());
        assert!(matches!(result, Err(NomadError::InvalidArtifact { .. })));
    }

    #[test]
    fn hop_must_end_its_entry_point() {
        let blob = br#"{ "agent": "a", "entry_points": { "init": [
            { "op": "hop", "to": "x:1", "entry": "init" },
            { "op": "say", "text": "unreachable" }
        ] } }"#;
        match AgentProgram::parse("a", blob) {
            Err(NomadError::InvalidArtifact { reason, .. }) => assert!(reason.contains("not last")),
            other => panic!("expected InvalidArtifact, got {:?}", other),
        }
    }

    #[test]
    fn garbage_and_empty_scripts_are_invalid() {
        assert!(matches!(
            AgentProgram::parse("a", b"\x00\x01"),
            Err(NomadError::InvalidArtifact { .. })
        ));
        assert!(matches!(
            AgentProgram::parse("a", br#"{ "agent": "a", "entry_points": {} }"#),
            Err(NomadError::InvalidArtifact { .. })
        ));
        assert!(matches!(
            AgentProgram::parse("a", br#"{ "agent": "a", "entry_points": { "init": [ { "op": "dance" } ] } }"#),
            Err(NomadError::InvalidArtifact { .. })
        ));
    }

    #[test]
    fn instantiate_places_arguments_and_mailbox_key() {
        let (header, body) = courier_program().instantiate(vec!["b:1".into(), "c:2".into()]);
        assert_eq!(header.code_identity, "courier");
        assert_eq!(header.entry_point, "init");
        assert_eq!(header.identifier, None);
        assert_eq!(header.mailbox_key.as_deref(), Some("K7"));
        assert_eq!(body["route"], serde_json::json!(["b:1", "c:2"]));
        assert_eq!(body["visits"], 0);
    }

    // ── Registry ─────────────────────────────────────────────────────────────

    #[test]
    fn unknown_name_without_blob_defines_nothing() {
        let registry = registry();
        let result = registry.ensure_registered("courier", None);
        assert!(matches!(result, Err(NomadError::UnknownCode { .. })));
        assert_eq!(registry.definition_count(), 0);
        assert!(!registry.is_known("courier"));
    }

    #[test]
    fn invalid_blob_defines_nothing_and_can_be_retried() {
        let registry = registry();
        let result = registry.ensure_registered("courier", Some(b"nope"));
        assert!(matches!(result, Err(NomadError::InvalidArtifact { .. })));
        assert!(registry.definition("courier").is_none());

        let resolved = registry.ensure_registered("courier", Some(COURIER.as_bytes())).unwrap();
        assert!(resolved.artifact().is_some());
        assert_eq!(registry.definition_count(), 1);
    }

    #[test]
    fn builtin_wins_over_shipped_blob() {
        let registry = registry();
        let blob = br#"{ "agent": "idle", "entry_points": { "init": [] } }"#;
        let resolved = registry.ensure_registered("idle", Some(blob)).unwrap();
        assert!(matches!(resolved, ResolvedCode::Builtin));
        assert!(resolved.artifact().is_none());
        assert_eq!(registry.definition_count(), 0);
    }

    #[test]
    fn defined_name_ignores_a_different_blob() {
        let registry = registry();
        registry.ensure_registered("courier", Some(COURIER.as_bytes())).unwrap();
        let first = registry.definition("courier").unwrap().artifact().digest().to_string();

        let other = COURIER.replace("visit {visits}", "changed");
        registry.ensure_registered("courier", Some(other.as_bytes())).unwrap();

        assert_eq!(registry.definition("courier").unwrap().artifact().digest(), first);
        assert_eq!(registry.definition_count(), 1);

        // A later arrival without the blob still resolves.
        assert!(registry.ensure_registered("courier", None).is_ok());
    }

    #[test]
    fn concurrent_arrivals_define_once() {
        let registry = Arc::new(registry());
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    match registry.ensure_registered("courier", Some(COURIER.as_bytes())).unwrap() {
                        ResolvedCode::Defined(def) => def,
                        ResolvedCode::Builtin => panic!("courier is not built in"),
                    }
                })
            })
            .collect();

        let defs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(registry.definition_count(), 1);
        assert!(defs.iter().all(|d| Arc::ptr_eq(d, &defs[0])));
        assert_eq!(registry.defined_names(), vec!["courier".to_string()]);
    }

    #[test]
    fn resolver_prefers_definitions_then_builtins() {
        let registry = registry();
        registry.ensure_registered("courier", Some(COURIER.as_bytes())).unwrap();

        let agent = registry.restore("courier", serde_json::json!({ "visits": 2 })).unwrap();
        assert_eq!(agent.code_identity(), "courier");
        assert!(agent.has_entry_point("greet"));

        let idle = registry.restore("idle", serde_json::json!({})).unwrap();
        assert_eq!(idle.code_identity(), "idle");

        assert!(matches!(
            registry.restore("ghost", serde_json::json!({})),
            Err(NomadError::Reconstruction { .. })
        ));
        assert!(matches!(
            registry.restore("courier", serde_json::json!([1, 2])),
            Err(NomadError::Reconstruction { .. })
        ));
    }

    // ── Script execution ─────────────────────────────────────────────────────

    fn courier(body: serde_json::Value) -> Box<dyn MobileAgent> {
        Box::new(ScriptAgent::restore(Arc::new(courier_program()), body).unwrap())
    }

    fn courier_header(entry_point: &str, arguments: Option<Vec<String>>) -> AgentHeader {
        AgentHeader {
            identifier: Some(AgentId(7001)),
            entry_point: entry_point.to_string(),
            arguments,
            ..courier_program().instantiate(vec![]).0
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn script_runs_instructions_and_hops() {
        let transport = Arc::new(AcceptAll::default());
        let sent = transport.sent.clone();
        let inbox = vec!["(5002) hello".to_string()];
        let (ctx, events) = context(courier_header("init", None), inbox, transport);
        let mut rx = events.subscribe();

        let body = serde_json::json!({ "visits": 0, "route": ["node-b:9001"] });
        let outcome = tokio::task::spawn_blocking(move || run(courier(body), ctx))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, Outcome::Departed { destination: "node-b:9001".into() });

        assert_eq!(
            said(&mut rx),
            vec![
                "agent(7001) on node-a visit 1".to_string(),
                "Message from agent (5002) hello".to_string(),
            ]
        );

        let sent = sent.lock().unwrap();
        let envelope = StateCodec::decode_envelope(&sent[0].1.state).unwrap();
        assert_eq!(envelope.header.entry_point, "greet");
        assert_eq!(envelope.header.arguments, Some(vec!["hi".to_string(), "1".to_string()]));
        assert_eq!(envelope.header.outgoing_message.as_deref(), Some("courier passed node-a"));
        assert_eq!(envelope.body["visits"], 1);
        assert_eq!(envelope.body["last"], "node-b:9001");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn script_templates_read_arguments() {
        let transport = Arc::new(AcceptAll::default());
        let args = Some(vec!["hi".to_string(), "3".to_string()]);
        let (ctx, events) = context(courier_header("greet", args), vec![], transport);
        let mut rx = events.subscribe();

        let outcome = tokio::task::spawn_blocking(move || run(courier(serde_json::json!({})), ctx))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, Outcome::Finished);
        assert_eq!(said(&mut rx), vec!["hi x3".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn script_failures_are_dispatch_errors() {
        let transport = Arc::new(AcceptAll::default());
        let sent = transport.sent.clone();

        let (ctx, _) = context(courier_header("crash", None), vec![], transport.clone());
        match tokio::task::spawn_blocking(move || run(courier(serde_json::json!({})), ctx)).await.unwrap() {
            Err(NomadError::Dispatch { entry_point, reason }) => {
                assert_eq!(entry_point, "crash");
                assert_eq!(reason, "stopped at node-a");
            }
            other => panic!("expected Dispatch, got {:?}", other),
        }

        let (ctx, _) = context(courier_header("lost", None), vec![], transport);
        let result = tokio::task::spawn_blocking(move || run(courier(serde_json::json!({})), ctx))
            .await
            .unwrap();
        assert!(matches!(result, Err(NomadError::Dispatch { .. })));
        assert!(sent.lock().unwrap().is_empty());
    }
}
