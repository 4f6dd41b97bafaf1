// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound request descriptors and the request interceptor.

use reqwest::header::ACCEPT_LANGUAGE;
use reqwest::{Method, RequestBuilder};

use crate::credential::CredentialAccessor;

/// Header carrying the locale tag.
pub const LOCALE_HEADER: reqwest::header::HeaderName = ACCEPT_LANGUAGE;

/// What a request is, as far as the pipeline is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Ordinary API call: authenticated, refresh-eligible.
    Normal,
    /// The credential refresh call itself: never authenticated with the
    /// bearer credential, never routed back into a refresh.
    RefreshCall,
}

/// One logical request, replayable through the pipeline.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Path relative to the client's base URL.
    pub endpoint: String,
    pub method: Method,
    pub body: Option<serde_json::Value>,
    pub query: Vec<(String, String)>,
    pub kind: RequestKind,
    /// Set once the request has been replayed after a refresh.
    pub is_retry: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            body: None,
            query: Vec::new(),
            kind: RequestKind::Normal,
            is_retry: false,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PATCH, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    /// The refresh call for `refresh_path`.
    pub fn refresh(refresh_path: impl Into<String>, body: serde_json::Value) -> Self {
        Self { kind: RequestKind::RefreshCall, ..Self::post(refresh_path).with_body(body) }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// The same request, marked as a post-refresh replay.
    pub fn into_retry(self) -> Self {
        Self { is_retry: true, ..self }
    }

    /// Build the transport request against `base_url` (no auth applied).
    pub fn build(&self, http: &reqwest::Client, base_url: &str) -> RequestBuilder {
        let url = format!("{}{}", base_url.trim_end_matches('/'), self.endpoint);
        let mut req = match reqwest::Url::parse(&url) {
            Ok(mut parsed) => {
                if !self.query.is_empty() {
                    parsed.query_pairs_mut().extend_pairs(&self.query);
                }
                http.request(self.method.clone(), parsed)
            }
            // Surfaces as a transport failure when sent.
            Err(_) => http.request(self.method.clone(), url),
        };
        if let Some(ref body) = self.body {
            req = req.json(body);
        }
        req
    }
}

/// Apply credential and locale headers to an outgoing request.
///
/// Returns the request and the access credential that was attached, if any.
/// The refresh call never carries the bearer credential, whoever built it.
pub fn intercept<A>(
    req: RequestBuilder,
    descriptor: &RequestDescriptor,
    accessor: &A,
) -> (RequestBuilder, Option<String>)
where
    A: CredentialAccessor + ?Sized,
{
    let credential = match descriptor.kind {
        RequestKind::Normal => accessor.current_credential(),
        RequestKind::RefreshCall => None,
    };
    let mut req = match credential {
        Some(ref token) => req.bearer_auth(token),
        None => req,
    };
    if let Some(locale) = accessor.current_locale() {
        req = req.header(LOCALE_HEADER, locale);
    }
    (req, credential)
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
