//! # nomad-ref-agents
//!
//! Reference agents for the NOMAD platform, and the tour that exercises
//! them across three nodes.
//!
//! The same agent ships in two forms:
//!
//! 1. **`TestAgent`** — a built-in type, compiled into every node.
//! 2. **`test-agent`** — an agent script carried as a code artifact, so
//!    nodes learn it on first arrival.

pub mod test_agent;
pub mod tour;

use nomad_contracts::artifact::CodeArtifact;
use nomad_core::BuiltinCatalog;

pub use test_agent::TestAgent;
pub use tour::{run_tour, TourOptions};

/// Source of the `test-agent` script.
pub const TEST_AGENT_SCRIPT: &str = include_str!("../scripts/test-agent.json");

/// Built-in agent types every reference node knows.
pub fn catalog() -> BuiltinCatalog {
    let mut catalog = BuiltinCatalog::new();
    catalog.register::<TestAgent>();
    catalog
}

/// The `test-agent` script as a shippable artifact.
pub fn test_agent_artifact() -> CodeArtifact {
    CodeArtifact::new("test-agent", TEST_AGENT_SCRIPT.as_bytes().to_vec())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use nomad_contracts::agent::AgentId;
    use nomad_core::PlaceEvent;
    use nomad_registry::AgentProgram;

    use super::*;
    use crate::tour::HOSTS;

    /// `(host, agent_id, entry_point, inbox)` of every launch, in order.
    fn launches(log: &[PlaceEvent]) -> Vec<(String, AgentId, String, Vec<String>)> {
        log.iter()
            .filter_map(|e| match e {
                PlaceEvent::Launched { host, agent_id, entry_point, inbox, .. } => {
                    Some((host.clone(), *agent_id, entry_point.clone(), inbox.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn said(log: &[PlaceEvent]) -> Vec<String> {
        log.iter()
            .filter_map(|e| match e {
                PlaceEvent::Said { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Launches of agent `id`, ordered by tour stop.
    fn stops_of(
        launches: &[(String, AgentId, String, Vec<String>)],
        id: AgentId,
    ) -> Vec<(String, String, Vec<String>)> {
        let mut stops: Vec<_> = launches
            .iter()
            .filter(|(_, agent_id, _, _)| *agent_id == id)
            .map(|(host, _, entry, inbox)| (host.clone(), entry.clone(), inbox.clone()))
            .collect();
        stops.sort_by_key(|(host, _, _)| HOSTS.iter().position(|(h, _)| h == host));
        stops
    }

    fn check_tour(log: &[PlaceEvent], initial_message: &str) {
        let launches = launches(log);
        assert_eq!(launches.len(), 6, "two agents, three stops each");

        // Identity assigned by the origin and kept on every stop.
        let first = stops_of(&launches, AgentId(1101));
        let second = stops_of(&launches, AgentId(1102));
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);

        let expected = [(HOSTS[0].0, "init"), (HOSTS[1].0, "step"), (HOSTS[2].0, "jump")];
        for stops in [&first, &second] {
            let route: Vec<(&str, &str)> =
                stops.iter().map(|(h, e, _)| (h.as_str(), e.as_str())).collect();
            assert_eq!(route, expected.to_vec());
        }

        // The first agent finds empty mailboxes; the second reads what it left.
        assert!(first.iter().all(|(_, _, inbox)| inbox.is_empty()));
        assert_eq!(second[0].2, vec![format!("(1101) {}", initial_message)]);
        assert_eq!(second[1].2, vec![format!("(1101) {}", initial_message)]);
        assert_eq!(second[2].2, vec![format!("(1101) {}", test_agent::MOVE_AHEAD_MESSAGE)]);

        let said = said(log);
        let expect_said = |text: String| {
            assert!(said.contains(&text), "missing console line {text:?} in {said:#?}")
        };
        expect_said("agent(1101) invoked init: hop count = 0, next dest = uw1-320-11".to_string());
        expect_said(
            "agent(1101) invoked step: hop count = 1, next dest = uw1-320-12, message = Hello!"
                .to_string(),
        );
        expect_said("agent(1102) invoked jump: hop count = 2, message = Oi!".to_string());
        expect_said(format!("Message from agent (1101) {}", test_agent::MOVE_AHEAD_MESSAGE));
    }

    #[test]
    fn shipped_script_is_valid() {
        let program = AgentProgram::parse("test-agent", TEST_AGENT_SCRIPT.as_bytes()).unwrap();
        assert_eq!(program.mailbox_key.as_deref(), Some(test_agent::MAILBOX_KEY));
        assert_eq!(program.entry_points.len(), 3);
    }

    #[test]
    fn catalog_knows_test_agent() {
        let (header, body) = catalog()
            .instantiate("TestAgent", vec!["d1".into(), "d2".into()])
            .unwrap();
        assert_eq!(header.mailbox_key.as_deref(), Some("K101"));
        assert_eq!(header.outgoing_message.as_deref(), Some(test_agent::INITIAL_MESSAGE));
        assert_eq!(body["destination"], serde_json::json!(["d1", "d2"]));
        assert_eq!(body["hop_count"], 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn builtin_tour_keeps_identity_and_passes_messages() {
        let log = run_tour(TourOptions::default()).await.unwrap();
        check_tour(&log, test_agent::INITIAL_MESSAGE);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scripted_tour_behaves_like_the_builtin() {
        let options = TourOptions { scripted: true, ..TourOptions::default() };
        let log = run_tour(options).await.unwrap();
        check_tour(&log, "Initial message from test-agent");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tour_without_agents_only_starts_the_nodes() {
        let options = TourOptions { agents: 0, ..TourOptions::default() };
        assert!(run_tour(options).await.unwrap().is_empty());
    }
}
