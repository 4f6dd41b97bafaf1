// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result envelope and the normalizer that builds it from transport outcomes.
//!
//! Every client call ends here. This is the only module that looks at raw
//! response bodies or transport errors; everything above it works with
//! [`Envelope`] alone.

use bytes::Bytes;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ErrorBody};

/// Whether a status code belongs to the success set (2xx).
pub fn is_success_status(code: u16) -> bool {
    (200..=299).contains(&code)
}

/// Uniform result of a client call.
///
/// `data` is only ever present when `status_code` is a success status; the
/// constructors drop it otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
}

impl<T> Envelope<T> {
    /// Build a success envelope. A non-success `status_code` discards `data`.
    pub fn ok(status_code: u16, data: T, message: impl Into<String>) -> Self {
        let data = is_success_status(status_code).then_some(data);
        Self { status_code, data, message: message.into(), error_code: None }
    }

    /// Build a failure envelope (no payload).
    pub fn failure(
        status_code: u16,
        message: impl Into<String>,
        error_code: Option<String>,
    ) -> Self {
        Self { status_code, data: None, message: message.into(), error_code }
    }

    /// Failure envelope for an error the client detected itself.
    pub fn from_client_error(code: ClientError, message: impl Into<String>) -> Self {
        Self::failure(code.http_status(), message, Some(code.as_str().to_owned()))
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn is_success(&self) -> bool {
        is_success_status(self.status_code)
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }
}

/// What the transport produced for one request, before interpretation.
#[derive(Debug, Clone)]
pub enum TransportOutcome {
    /// A response arrived (any status).
    Response { status: u16, body: Bytes },
    /// No response reached us.
    Failed { message: String, timeout: bool },
}

impl TransportOutcome {
    /// Collect a `reqwest` send result into an outcome, reading the full body.
    pub async fn receive(result: Result<reqwest::Response, reqwest::Error>) -> Self {
        let resp = match result {
            Ok(resp) => resp,
            Err(e) => return Self::from_error(&e),
        };
        let status = resp.status().as_u16();
        match resp.bytes().await {
            Ok(body) => Self::Response { status, body },
            Err(e) => Self::from_error(&e),
        }
    }

    pub fn from_error(err: &reqwest::Error) -> Self {
        Self::Failed { message: err.to_string(), timeout: err.is_timeout() }
    }

    /// HTTP status, if a response arrived.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::Failed { .. } => None,
        }
    }
}

/// Status/message/code fields a backend may put in a response body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BodyMeta {
    #[serde(default)]
    status_code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

impl BodyMeta {
    fn read(value: &serde_json::Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        Self::deserialize(value).unwrap_or_default()
    }

    fn message(&self) -> Option<String> {
        self.message.clone().or_else(|| self.error.as_ref().and_then(|e| e.message.clone()))
    }

    fn error_code(&self) -> Option<String> {
        self.error_code.clone().or_else(|| self.error.as_ref().and_then(|e| e.code.clone()))
    }
}

fn canonical_reason(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown status")
        .to_owned()
}

/// Turn any transport outcome into exactly one envelope.
pub fn normalize<T: DeserializeOwned>(outcome: TransportOutcome) -> Envelope<T> {
    match outcome {
        TransportOutcome::Failed { message, timeout } => {
            let code = if timeout { ClientError::Timeout } else { ClientError::Internal };
            Envelope::from_client_error(code, message)
        }
        TransportOutcome::Response { status, body } if is_success_status(status) => {
            normalize_success(status, &body)
        }
        TransportOutcome::Response { status, body } => normalize_failure(status, &body),
    }
}

fn normalize_success<T: DeserializeOwned>(status: u16, body: &[u8]) -> Envelope<T> {
    let mut value = if body.is_empty() {
        serde_json::Value::Null
    } else {
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(v) => v,
            Err(e) => {
                return Envelope::from_client_error(
                    ClientError::Decode,
                    format!("invalid response body: {e}"),
                )
            }
        }
    };

    let meta = BodyMeta::read(&value);
    let status = meta.status_code.unwrap_or(status);
    if !is_success_status(status) {
        let message = meta.message().unwrap_or_else(|| canonical_reason(status));
        return Envelope::failure(status, message, meta.error_code());
    }

    // `{data: ...}` bodies carry the payload under `data`; anything else is
    // the payload itself.
    let payload = match value.as_object_mut().and_then(|obj| obj.remove("data")) {
        Some(inner) => inner,
        None => value,
    };
    match serde_json::from_value::<T>(payload) {
        Ok(data) => {
            let message = meta.message().unwrap_or_else(|| canonical_reason(status));
            Envelope::ok(status, data, message)
        }
        Err(e) => Envelope::from_client_error(
            ClientError::Decode,
            format!("unexpected response payload: {e}"),
        ),
    }
}

fn normalize_failure<T>(status: u16, body: &[u8]) -> Envelope<T> {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) if value.is_object() => {
            let meta = BodyMeta::read(&value);
            let code = meta.status_code.filter(|c| !is_success_status(*c)).unwrap_or(status);
            let message = meta.message().unwrap_or_else(|| canonical_reason(status));
            Envelope::failure(code, message, meta.error_code().or_else(|| fallback_code(code)))
        }
        _ => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            let message =
                if text.is_empty() { canonical_reason(status) } else { text.to_owned() };
            Envelope::failure(status, message, fallback_code(status))
        }
    }
}

/// Code for a rejected credential the backend did not label itself.
fn fallback_code(status: u16) -> Option<String> {
    let unauthorized = ClientError::Unauthorized;
    (status == unauthorized.http_status()).then(|| unauthorized.as_str().to_owned())
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
