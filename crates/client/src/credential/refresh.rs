// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The credential refresh call.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Deserialize;

use crate::credential::{CredentialAccessor, CredentialPair};
use crate::envelope::{normalize, Envelope, TransportOutcome};
use crate::request::{intercept, RequestDescriptor};

/// Exchanges a refresh credential for a new pair.
///
/// Implementations make exactly one attempt; the coordinator owns timeouts
/// and never retries a failed refresh.
pub trait Refresher: Send + Sync {
    fn refresh(
        &self,
        refresh_token: String,
        locale: Option<String>,
    ) -> BoxFuture<'static, anyhow::Result<CredentialPair>>;
}

/// Refresh endpoint response. A missing `refreshToken` keeps the old one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshedPair {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Calls `POST <base_url><refresh_path>` with `{"refreshToken": ...}`.
#[derive(Debug, Clone)]
pub struct HttpRefresher {
    http: reqwest::Client,
    base_url: Arc<str>,
    refresh_path: Arc<str>,
}

impl HttpRefresher {
    pub fn new(http: reqwest::Client, base_url: &str, refresh_path: &str) -> Self {
        Self { http, base_url: Arc::from(base_url), refresh_path: Arc::from(refresh_path) }
    }
}

/// Locale-only accessor for the refresh call; it never has a bearer to give.
struct RefreshContext {
    locale: Option<String>,
}

impl CredentialAccessor for RefreshContext {
    fn current_credential(&self) -> Option<String> {
        None
    }

    fn current_refresh_credential(&self) -> Option<String> {
        None
    }

    fn current_locale(&self) -> Option<String> {
        self.locale.clone()
    }
}

impl Refresher for HttpRefresher {
    fn refresh(
        &self,
        refresh_token: String,
        locale: Option<String>,
    ) -> BoxFuture<'static, anyhow::Result<CredentialPair>> {
        let this = self.clone();
        Box::pin(async move { this.do_refresh(refresh_token, locale).await })
    }
}

impl HttpRefresher {
    /// Perform a single refresh request.
    pub async fn do_refresh(
        &self,
        refresh_token: String,
        locale: Option<String>,
    ) -> anyhow::Result<CredentialPair> {
        let descriptor = RequestDescriptor::refresh(
            &*self.refresh_path,
            serde_json::json!({ "refreshToken": &refresh_token }),
        );
        let req = descriptor.build(&self.http, &self.base_url);
        let (req, _) = intercept(req, &descriptor, &RefreshContext { locale });

        let outcome = TransportOutcome::receive(req.send().await).await;
        let envelope: Envelope<RefreshedPair> = normalize(outcome);
        if !envelope.is_success() {
            anyhow::bail!(
                "refresh failed ({}): {}",
                envelope.status_code(),
                envelope.message()
            );
        }
        let refreshed = envelope
            .into_data()
            .ok_or_else(|| anyhow::anyhow!("refresh response carried no credentials"))?;
        Ok(CredentialPair {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token.unwrap_or(refresh_token),
        })
    }
}
