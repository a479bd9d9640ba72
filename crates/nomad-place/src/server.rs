//! The Place Server: HTTP binding of the `Transfer` operation.
//!
//! One route, `POST /place`, taking a JSON `TransferRequest` and answering
//! with a JSON `TransferResponse`. Requests are handled concurrently, one
//! Tokio task each.

use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{extract::State, routing::post, Json, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use nomad_contracts::{
    error::{NomadError, NomadResult},
    transfer::{TransferRequest, TransferResponse, SERVICE_NAME},
};

use crate::place::Place;

/// Router exposing `place` under its service name.
pub fn router(place: Arc<Place>) -> Router {
    Router::new()
        .route(&format!("/{}", SERVICE_NAME), post(transfer))
        .with_state(place)
        .layer(TraceLayer::new_for_http())
}

async fn transfer(
    State(place): State<Arc<Place>>,
    Json(request): Json<TransferRequest>,
) -> Json<TransferResponse> {
    Json(place.transfer(request))
}

/// A bound, not yet serving, Place Server.
pub struct PlaceServer {
    listener: TcpListener,
    place: Arc<Place>,
}

impl PlaceServer {
    /// Bind `addr` for `place`. Port 0 picks a free port.
    pub async fn bind(place: Arc<Place>, addr: SocketAddr) -> NomadResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| NomadError::Io {
            reason: format!("failed to bind {}: {}", addr, e),
        })?;
        Ok(Self { listener, place })
    }

    pub fn local_addr(&self) -> NomadResult<SocketAddr> {
        self.listener.local_addr().map_err(|e| NomadError::Io {
            reason: format!("failed to read bound address: {}", e),
        })
    }

    /// Serve until the process exits.
    pub async fn serve(self) -> NomadResult<()> {
        self.serve_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve_until<F>(self, shutdown: F) -> NomadResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(
            host = %self.place.host_name(),
            addr = %addr,
            "place is ready to accept agents"
        );
        axum::serve(self.listener, router(self.place))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| NomadError::Io { reason: format!("place server failed: {}", e) })
    }
}
