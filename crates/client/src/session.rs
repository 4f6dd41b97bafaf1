// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session owner: login, logout, and reacting to session loss.

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::credential::{CredentialAccessor, CredentialPair, CredentialStore};
use crate::signal::SessionLossNotifier;

/// Session lifecycle events for whoever drives the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    /// Credentials became unrecoverable; the owner should send the user to sign in.
    Lost,
}

/// Owns the credential store and the session-loss subscription.
pub struct Session {
    store: Arc<dyn CredentialStore>,
    notifier: Arc<SessionLossNotifier>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(16);
        let session =
            Arc::new(Self { store, notifier: Arc::new(SessionLossNotifier::new()), event_tx });
        if session.is_authenticated() {
            session.arm();
        }
        session
    }

    /// The signal the API client raises on unrecoverable credential failure.
    pub fn notifier(&self) -> &Arc<SessionLossNotifier> {
        &self.notifier
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.current_credential().is_some()
    }

    /// Persist a freshly issued pair and start watching for its loss.
    pub fn login(self: &Arc<Self>, pair: CredentialPair) -> anyhow::Result<()> {
        self.store.store(Some(&pair))?;
        self.arm();
        tracing::info!("signed in");
        let _ = self.event_tx.send(SessionEvent::SignedIn);
        Ok(())
    }

    /// Clear credentials and stop watching.
    pub fn logout(&self) -> anyhow::Result<()> {
        self.notifier.unsubscribe();
        self.store.store(None)?;
        tracing::info!("signed out");
        let _ = self.event_tx.send(SessionEvent::SignedOut);
        Ok(())
    }

    /// Subscribe to the session-loss signal for this session lifetime.
    ///
    /// Returns false if a subscription is already active.
    pub fn arm(self: &Arc<Self>) -> bool {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.notifier
            .subscribe_once(move || {
                if let Some(session) = weak.upgrade() {
                    session.on_lost();
                }
            })
            .is_ok()
    }

    fn on_lost(&self) {
        if let Err(e) = self.store.store(None) {
            tracing::warn!(err = %e, "failed to clear credentials after session loss");
        }
        tracing::warn!("session lost, sign-in required");
        let _ = self.event_tx.send(SessionEvent::Lost);
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
