//! HTTP client for the game's file API

use std::path::PathBuf;

use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use tracing::{debug, info, warn};

use super::outcome::{OutcomeStatus, SyncOutcome};
use super::payload::{HttpMethod, RemoteRequest, SyncEvent};
use crate::error::SyncResult;
use crate::settings::SyncConfig;

/// Where the game's file server listens
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9990/";

/// One-shot HTTP client. No retries, no timeout, no queue.
#[derive(Debug, Clone)]
pub struct SyncClient {
    http: reqwest::Client,
    endpoint: String,
}

impl Default for SyncClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncClient {
    /// Client for the game's fixed endpoint
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Client for a different endpoint (tests, port forwarding)
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build and send the request for `event`.
    ///
    /// Errors only when the request cannot be built (no auth token);
    /// anything that happens on the wire is reported in the outcome.
    pub async fn sync(
        &self,
        event: &SyncEvent,
        config: &SyncConfig,
        workspace_roots: &[PathBuf],
    ) -> SyncResult<SyncOutcome> {
        let request = RemoteRequest::build(event, config, workspace_roots)?;
        Ok(self.execute(request).await)
    }

    /// Send a built request and classify the response
    pub async fn execute(&self, request: RemoteRequest) -> SyncOutcome {
        let builder = match request.method {
            HttpMethod::Post => self.http.post(&self.endpoint),
            HttpMethod::Delete => self.http.delete(&self.endpoint),
        };

        debug!(
            "{} {} ({} bytes) for {}",
            request.kind,
            self.endpoint,
            request.body.len(),
            request.filename
        );

        let response = builder
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, request.body.len())
            .header(AUTHORIZATION, request.authorization())
            .body(request.body)
            .send()
            .await;

        match response {
            Ok(response) => {
                let code = response.status().as_u16();
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        debug!(
                            "Could not read the response body for {}: {}",
                            request.filename, e
                        );
                        String::new()
                    }
                };
                info!("{} {} -> {}", request.kind, request.filename, code);
                SyncOutcome::from_response(request.kind, request.filename, code, body)
            }
            Err(e) => {
                warn!("{} {} failed: {}", request.kind, request.filename, e);
                SyncOutcome {
                    kind: request.kind,
                    filename: request.filename,
                    status: OutcomeStatus::Transport {
                        message: e.to_string(),
                    },
                }
            }
        }
    }
}
