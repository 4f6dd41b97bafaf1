// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authclient: authenticated HTTP API client with single-flight credential refresh.

pub mod client;
pub mod config;
pub mod credential;
pub mod envelope;
pub mod error;
pub mod request;
pub mod session;
pub mod signal;

use std::sync::{Arc, Once};

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::credential::store::{FileStore, MemoryStore};
use crate::credential::CredentialStore;
use crate::session::Session;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// A client wired to a session owner.
pub struct Authenticated {
    pub client: ApiClient,
    pub session: Arc<Session>,
}

/// Open the configured credential store and build a session plus client.
pub fn connect(config: &ClientConfig) -> anyhow::Result<Authenticated> {
    let store: Arc<dyn CredentialStore> = match config.credential_file {
        Some(ref path) => Arc::new(FileStore::open(path, config.locale.clone())?),
        None => Arc::new(MemoryStore::new(config.locale.clone())),
    };
    let session = Session::new(Arc::clone(&store));
    let client = ApiClient::new(config, store, Arc::clone(session.notifier()))?;
    Ok(Authenticated { client, session })
}
