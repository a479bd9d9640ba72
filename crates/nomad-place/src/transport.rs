//! HTTP transport: the sending side of `hop` between processes.
//!
//! Posts the JSON `TransferRequest` to `http://<destination>/place`. Any
//! failure to get a well-formed answer back (refused connection, timeout,
//! non-success status, unreadable body) is `UnreachableDestination`; a
//! well-formed rejection is returned as-is for `hop` to interpret.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use nomad_contracts::{
    error::{NomadError, NomadResult},
    transfer::{TransferRequest, TransferResponse, SERVICE_NAME},
};
use nomad_core::Transport;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// A transport whose transfers give up after `timeout`.
    pub fn new(timeout: Duration) -> NomadResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| NomadError::Config {
            reason: format!("failed to build HTTP client: {}", e),
        })?;
        Ok(Self { client })
    }

    /// URL of the Place service at `destination` (`host:port`).
    pub fn service_url(destination: &str) -> String {
        format!("http://{}/{}", destination, SERVICE_NAME)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn transfer(
        &self,
        destination: &str,
        request: TransferRequest,
    ) -> NomadResult<TransferResponse> {
        let unreachable = |reason: String| NomadError::UnreachableDestination {
            destination: destination.to_string(),
            reason,
        };
        let url = Self::service_url(destination);
        debug!(url = %url, request_id = %request.request_id, "posting transfer");

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(unreachable(format!("place answered HTTP {}", status)));
        }

        resp.json::<TransferResponse>()
            .await
            .map_err(|e| unreachable(format!("unreadable transfer response: {}", e)))
    }
}
