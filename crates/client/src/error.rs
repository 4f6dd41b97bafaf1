// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbolic error codes attached to envelopes the client builds itself.
///
/// Backend-supplied codes are passed through verbatim; these cover the
/// failures that never reached a backend or that the client detected locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientError {
    Unauthorized,
    Timeout,
    Decode,
    Internal,
}

impl ClientError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            // Timeouts and decode failures never produced a usable response,
            // so they surface as internal errors.
            Self::Timeout | Self::Decode | Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Timeout => "TIMEOUT",
            Self::Decode => "DECODE",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nested error body some backends return as `{"error": {"code", "message"}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
