// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credentials: the access/refresh pair, where it lives, and how it is renewed.
//!
//! Reads go through [`CredentialAccessor`], which every request consults.
//! Writes go through [`CredentialStore::store`] and happen in exactly three
//! places: login, a successful refresh cycle, and logout or session loss.

pub mod coordinator;
pub mod persist;
pub mod refresh;
pub mod store;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque bearer tokens for one session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Side-effect-free view of the active session.
///
/// `None` means "unauthenticated", never an error.
pub trait CredentialAccessor: Send + Sync {
    /// Current access credential.
    fn current_credential(&self) -> Option<String>;

    /// Current refresh credential.
    fn current_refresh_credential(&self) -> Option<String>;

    /// Locale tag to send with requests.
    fn current_locale(&self) -> Option<String>;
}

/// Writable credential store for one execution context.
pub trait CredentialStore: CredentialAccessor {
    /// Replace the stored pair; `None` clears it.
    fn store(&self, pair: Option<&CredentialPair>) -> anyhow::Result<()>;
}
