//! The three-node tour.
//!
//! Starts an origin node and two destinations on one `LocalNetwork`, then
//! injects TestAgents one after another at the origin:
//!
//!   origin:9001 (init) → uw1-320-11 (step) → uw1-320-12 (jump)
//!
//! Every agent keeps the identifier the origin gave it, and from the second
//! agent on each stop shows what the previous agent left in the mailbox.

use std::{sync::Arc, time::Duration};

use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::info;

use nomad_contracts::{
    artifact::CodeArtifact,
    error::{NomadError, NomadResult},
};
use nomad_core::{Dispatch, PlaceEvent};
use nomad_place::{inject, instantiate, LocalNetwork, Place, PlaceConfig, DEFAULT_PORT};

use crate::{catalog, test_agent::TestAgent, test_agent_artifact};

/// `(host name, advertised address)` of the origin and both destinations.
pub const HOSTS: [(&str, &str); 3] = [
    ("uw1-320-10", "10.0.0.110"),
    ("uw1-320-11", "10.0.0.111"),
    ("uw1-320-12", "10.0.0.112"),
];

#[derive(Debug, Clone)]
pub struct TourOptions {
    /// Number of agents sent one after another.
    pub agents: usize,
    /// Tour with the `test-agent` script instead of the built-in TestAgent.
    pub scripted: bool,
    /// How long one agent may take to finish its tour.
    pub timeout: Duration,
}

impl Default for TourOptions {
    fn default() -> Self {
        Self { agents: 2, scripted: false, timeout: Duration::from_secs(10) }
    }
}

/// Run the tour and return every event the three nodes published, in the
/// order they were observed.
///
/// # Errors
///
/// Fails as soon as any node rejects a transfer or any entry point fails,
/// or when an agent does not finish within `options.timeout`.
pub async fn run_tour(options: TourOptions) -> NomadResult<Vec<PlaceEvent>> {
    let network = LocalNetwork::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut places: Vec<Arc<Place>> = Vec::with_capacity(HOSTS.len());

    for (host, advertise) in HOSTS {
        let config = PlaceConfig {
            host_name: host.to_string(),
            advertise_address: advertise.to_string(),
            ..PlaceConfig::default()
        };
        let place = Place::new(config, catalog(), network.transport())?;
        network.attach(format!("{}:{}", host, DEFAULT_PORT), &place);

        let mut events = place.subscribe();
        let tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
        places.push(place);
    }

    let (code_identity, artifact): (&str, Option<CodeArtifact>) = if options.scripted {
        ("test-agent", Some(test_agent_artifact()))
    } else {
        (TestAgent::CODE_IDENTITY, None)
    };
    let origin = format!("{}:{}", HOSTS[0].0, DEFAULT_PORT);
    let last_host = HOSTS[2].0;
    let destinations = vec![HOSTS[1].0.to_string(), HOSTS[2].0.to_string()];

    let mut log = Vec::new();
    for n in 1..=options.agents {
        let (header, body) =
            instantiate(&catalog(), code_identity, destinations.clone(), artifact.as_ref())?;
        inject(&network, &origin, artifact.as_ref(), header, body).await?;
        info!(agent = n, code_identity, "tour agent injected");

        // One agent at a time, so mailbox contents are deterministic.
        let finished = tokio::time::timeout(options.timeout, async {
            while let Some(event) = rx.recv().await {
                let outcome = match &event {
                    PlaceEvent::Completed { host, .. } if host == last_host => Some(Ok(())),
                    PlaceEvent::Failed { entry_point, reason, .. } => {
                        Some(Err(NomadError::dispatch(entry_point.as_str(), reason.as_str())))
                    }
                    PlaceEvent::Rejected { host, rejection, .. } => {
                        Some(Err(NomadError::TransferRejected {
                            destination: host.clone(),
                            rejection: rejection.clone(),
                        }))
                    }
                    _ => None,
                };
                log.push(event);
                if let Some(outcome) = outcome {
                    return outcome;
                }
            }
            Err(NomadError::dispatch("jump", "event stream ended before the tour finished"))
        })
        .await
        .map_err(|_| {
            NomadError::dispatch("jump", format!("agent {} did not finish within {:?}", n, options.timeout))
        })?;
        finished?;
    }

    drop(places);
    Ok(log)
}
