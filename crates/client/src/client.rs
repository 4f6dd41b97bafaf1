// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated API client.
//!
//! Request pipeline: interceptor -> transport -> classification. A first
//! 401 on an ordinary request goes to the refresh coordinator and, if the
//! cycle succeeds, the request is replayed once with the retry marker set.
//! Everything else is normalized into an [`Envelope`] and returned.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::credential::coordinator::{RefreshCoordinator, RefreshOutcome};
use crate::credential::refresh::{HttpRefresher, Refresher};
use crate::credential::CredentialStore;
use crate::envelope::{normalize, Envelope, TransportOutcome};
use crate::error::ClientError;
use crate::request::{intercept, RequestDescriptor, RequestKind};
use crate::signal::SessionLossNotifier;

/// What the response interceptor does with a transport outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Hand straight to the normalizer.
    Normalize,
    /// First credential-expired failure: refresh and replay.
    Refresh,
    /// Credential-expired after a replay: normalize and signal session loss.
    Terminal,
}

/// Classify an outcome for `request`.
pub fn classify(request: &RequestDescriptor, outcome: &TransportOutcome) -> Disposition {
    if outcome.status() != Some(ClientError::Unauthorized.http_status()) {
        return Disposition::Normalize;
    }
    match (request.kind, request.is_retry) {
        (RequestKind::RefreshCall, _) => Disposition::Normalize,
        (RequestKind::Normal, true) => Disposition::Terminal,
        (RequestKind::Normal, false) => Disposition::Refresh,
    }
}

/// HTTP client that authenticates, normalizes, and recovers from expiry.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    notifier: Arc<SessionLossNotifier>,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    /// Build a client that refreshes against the configured endpoint.
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn CredentialStore>,
        notifier: Arc<SessionLossNotifier>,
    ) -> anyhow::Result<Self> {
        crate::ensure_crypto();
        let http = reqwest::Client::builder().timeout(config.request_timeout()).build()?;
        let refresher = HttpRefresher::new(http.clone(), &config.base_url, &config.refresh_path);
        Ok(Self::with_refresher(config, http, store, notifier, Arc::new(refresher)))
    }

    /// Build a client around an existing transport and refresher.
    pub fn with_refresher(
        config: &ClientConfig,
        http: reqwest::Client,
        store: Arc<dyn CredentialStore>,
        notifier: Arc<SessionLossNotifier>,
        refresher: Arc<dyn Refresher>,
    ) -> Self {
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&store),
            refresher,
            Arc::clone(&notifier),
            config.refresh_timeout(),
            config.refresh_wait_grace(),
        );
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            store,
            notifier,
            coordinator,
        }
    }

    /// Run `request` through the pipeline. Never fails: every outcome is an
    /// envelope.
    pub async fn send<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Envelope<T> {
        let mut request = request;
        loop {
            let (outcome, used) = self.dispatch(&request).await;
            match classify(&request, &outcome) {
                Disposition::Normalize => return normalize(outcome),
                Disposition::Terminal => {
                    tracing::warn!(
                        endpoint = %request.endpoint,
                        "credential rejected after refresh"
                    );
                    self.notifier.notify_once();
                    return normalize(outcome);
                }
                Disposition::Refresh => {
                    match self.coordinator.trigger_refresh(used.as_deref()).await {
                        RefreshOutcome::Retry => {
                            tracing::debug!(
                                endpoint = %request.endpoint,
                                "replaying after refresh"
                            );
                            request = request.into_retry();
                        }
                        RefreshOutcome::Abort => return normalize(outcome),
                    }
                }
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Envelope<T> {
        self.send(RequestDescriptor::get(endpoint)).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Envelope<T> {
        self.send(RequestDescriptor::post(endpoint).with_body(body)).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Envelope<T> {
        self.send(RequestDescriptor::put(endpoint).with_body(body)).await
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Envelope<T> {
        self.send(RequestDescriptor::patch(endpoint).with_body(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Envelope<T> {
        self.send(RequestDescriptor::delete(endpoint)).await
    }

    /// Send once: intercept, transmit, collect. Returns the outcome and the
    /// credential the request carried.
    async fn dispatch(&self, request: &RequestDescriptor) -> (TransportOutcome, Option<String>) {
        let req = request.build(&self.http, &self.base_url);
        let (req, used) = intercept(req, request, &*self.store);
        tracing::debug!(
            method = %request.method,
            endpoint = %request.endpoint,
            retry = request.is_retry,
            authenticated = used.is_some(),
            "dispatching request"
        );
        let outcome = TransportOutcome::receive(req.send().await).await;
        match outcome.status() {
            Some(status) => {
                tracing::debug!(endpoint = %request.endpoint, status, "response received")
            }
            None => tracing::debug!(endpoint = %request.endpoint, "transport failure"),
        }
        (outcome, used)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
