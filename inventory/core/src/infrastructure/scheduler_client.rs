// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scheduler HTTP Client
//!
//! Implements `SchedulerGateway` over the scheduler's JSON inventory API.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Outbound HTTP to the external scheduler
//! - **Integration:** Sync Dispatcher → `POST /inventories/*`
//!
//! Every request carries the configured timeout. Transport failures map to
//! `SchedulerError::Unreachable`, non-2xx answers to `SchedulerError::Rejected`.
//! Nothing is retried here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Serialize;

use crate::domain::inventory_config::SchedulerConfig;
use crate::domain::scheduler::{
    GenerateHostsRequest, SchedulerError, SchedulerGateway, SyncHostsRequest, UpdateHostsRequest,
    GENERATE_HOSTS_PATH, SYNC_HOSTS_PATH, UPDATE_HOSTS_PATH,
};

#[derive(Clone)]
pub struct HttpSchedulerClient {
    http_client: HttpClient,
    base_url: String,
    timeout: Duration,
    api_token: Option<String>,
}

impl HttpSchedulerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            api_token: None,
        }
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Build a client from `spec.scheduler`; `None` when no endpoint is configured
    pub fn from_config(config: &SchedulerConfig) -> anyhow::Result<Option<Self>> {
        let Some(endpoint) = config.endpoint.as_deref().filter(|e| !e.is_empty()) else {
            return Ok(None);
        };
        let mut client = Self::new(endpoint, config.timeout());
        if let Some(token) = config.resolve_api_token()? {
            client = client.with_api_token(token);
        }
        Ok(Some(client))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), SchedulerError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.http_client.post(&url).json(body).timeout(self.timeout);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| SchedulerError::Unreachable {
            endpoint: url.clone(),
            reason: e.to_string(),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "(no body)".to_string());
            return Err(SchedulerError::Rejected {
                endpoint: url,
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(endpoint = %url, "Scheduler accepted inventory request");
        Ok(())
    }
}

#[async_trait]
impl SchedulerGateway for HttpSchedulerClient {
    async fn generate_hosts(&self, request: &GenerateHostsRequest) -> Result<(), SchedulerError> {
        self.post(GENERATE_HOSTS_PATH, request).await
    }

    async fn update_hosts(&self, request: &UpdateHostsRequest) -> Result<(), SchedulerError> {
        self.post(UPDATE_HOSTS_PATH, request).await
    }

    async fn sync_hosts(&self, request: &SyncHostsRequest) -> Result<(), SchedulerError> {
        self.post(SYNC_HOSTS_PATH, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_sync_hosts_posts_json_with_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", SYNC_HOSTS_PATH)
            .match_header("authorization", "Bearer t0ken")
            .match_body(Matcher::Json(json!({"added": [], "deleted": [], "updated": []})))
            .with_status(200)
            .create_async()
            .await;

        let client = HttpSchedulerClient::new(&format!("{}/", server.url()), Duration::from_secs(2))
            .with_api_token("t0ken");
        client.sync_hosts(&SyncHostsRequest::default()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", SYNC_HOSTS_PATH)
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client = HttpSchedulerClient::new(&server.url(), Duration::from_secs(2));
        let err = client.sync_hosts(&SyncHostsRequest::default()).await.unwrap_err();

        match err {
            SchedulerError::Rejected { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        // port 9 (discard) is not expected to accept HTTP on the test host
        let client = HttpSchedulerClient::new("http://127.0.0.1:9", Duration::from_millis(500));
        let err = client.sync_hosts(&SyncHostsRequest::default()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Unreachable { .. }));
    }

    #[test]
    fn test_from_config_without_endpoint() {
        let config = SchedulerConfig::default();
        assert!(HttpSchedulerClient::from_config(&config).unwrap().is_none());
    }
}
