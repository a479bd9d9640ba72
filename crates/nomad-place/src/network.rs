//! In-process network of Places.
//!
//! `LocalNetwork` is a `Transport` that delivers requests straight to
//! Places registered under `host:port` addresses in the same process. Tests
//! and the demo use it to run several nodes without sockets.
//!
//! Places are held weakly: each Place owns the network as its transport, so
//! a strong reference back would leak every node.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use async_trait::async_trait;
use tracing::debug;

use nomad_contracts::{
    error::{NomadError, NomadResult},
    transfer::{TransferRequest, TransferResponse},
};
use nomad_core::Transport;

use crate::place::Place;

#[derive(Clone, Default)]
pub struct LocalNetwork {
    places: Arc<Mutex<HashMap<String, Weak<Place>>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// This network as a transport for `Place::new`.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    /// Make `place` reachable at `address` (`host:port`).
    pub fn attach(&self, address: impl Into<String>, place: &Arc<Place>) {
        let address = address.into();
        debug!(address = %address, host = %place.host_name(), "place attached");
        self.places
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address, Arc::downgrade(place));
    }

    /// Take the place at `address` off the network.
    pub fn detach(&self, address: &str) {
        self.places.lock().unwrap_or_else(PoisonError::into_inner).remove(address);
    }

    fn lookup(&self, address: &str) -> Option<Arc<Place>> {
        self.places
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .and_then(Weak::upgrade)
    }
}

#[async_trait]
impl Transport for LocalNetwork {
    async fn transfer(
        &self,
        destination: &str,
        request: TransferRequest,
    ) -> NomadResult<TransferResponse> {
        let place = self.lookup(destination).ok_or_else(|| NomadError::UnreachableDestination {
            destination: destination.to_string(),
            reason: "no place attached at this address".to_string(),
        })?;
        Ok(place.transfer(request))
    }
}
