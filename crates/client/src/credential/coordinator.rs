// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight refresh coordination.
//!
//! Any number of requests may fail with an expired credential at once. The
//! first to arrive starts a refresh cycle; everyone else (and the starter)
//! waits on the same cycle's outcome. A cycle runs in its own task, so no
//! caller going away can leave the remaining waiters hanging.
//!
//! Cycle steps:
//! 1. claim the in-flight slot and spawn the refresh call,
//! 2. on success store the new pair, then release the slot and publish `Retry`,
//! 3. on failure leave the old pair untouched, raise the session-loss signal
//!    once, then release the slot and publish `Abort`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::credential::refresh::Refresher;
use crate::credential::CredentialStore;
use crate::signal::SessionLossNotifier;

/// What a waiter should do once the cycle settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Credentials were renewed; replay the request.
    Retry,
    /// Refresh failed; surface the original failure.
    Abort,
}

type OutcomeRx = watch::Receiver<Option<RefreshOutcome>>;
type OutcomeTx = watch::Sender<Option<RefreshOutcome>>;

/// Owns the at-most-one in-flight refresh and the credential writes it makes.
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn Refresher>,
    notifier: Arc<SessionLossNotifier>,
    refresh_timeout: Duration,
    wait_timeout: Duration,
    in_flight: Mutex<Option<OutcomeRx>>,
}

impl RefreshCoordinator {
    /// `refresh_timeout` bounds the refresh call; waiters give up after
    /// `refresh_timeout + wait_grace`.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn Refresher>,
        notifier: Arc<SessionLossNotifier>,
        refresh_timeout: Duration,
        wait_grace: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                refresher,
                notifier,
                refresh_timeout,
                wait_timeout: refresh_timeout + wait_grace,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Whether a refresh cycle is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().as_ref().is_some_and(|rx| rx.has_changed().is_ok())
    }

    /// Start a refresh cycle or join the one in flight, and wait for it.
    ///
    /// `rejected` is the access credential the failed request carried. A
    /// cycle in flight is always joined, whatever credential was rejected.
    /// With no cycle in flight, a store holding a different credential means
    /// one completed since that request went out and the caller can replay
    /// immediately.
    pub async fn trigger_refresh(&self, rejected: Option<&str>) -> RefreshOutcome {
        let mut rx = {
            let mut slot = self.inner.in_flight.lock();

            match slot.as_ref() {
                // A closed sender means the cycle task died; start over.
                Some(rx) if rx.has_changed().is_ok() => {
                    tracing::debug!("joining in-flight refresh");
                    rx.clone()
                }
                _ => {
                    let current = self.inner.store.current_credential();
                    if current.is_some() && current.as_deref() != rejected {
                        tracing::debug!("credential already renewed, replaying without refresh");
                        return RefreshOutcome::Retry;
                    }

                    let (tx, rx) = watch::channel(None);
                    *slot = Some(rx.clone());
                    tracing::debug!("starting refresh cycle");
                    Arc::clone(&self.inner).spawn_cycle(tx);
                    rx
                }
            }
        };

        self.inner.await_outcome(&mut rx).await
    }
}

impl Inner {
    fn spawn_cycle(self: Arc<Self>, tx: OutcomeTx) {
        tokio::spawn(async move {
            let outcome = self.run_refresh().await;
            // The session owner has reacted before any waiter sees `Abort`.
            if outcome == RefreshOutcome::Abort {
                self.notifier.notify_once();
            }
            self.in_flight.lock().take();
            tx.send_replace(Some(outcome));
        });
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.store.current_refresh_credential() else {
            tracing::warn!("credential refresh impossible: no refresh credential");
            return RefreshOutcome::Abort;
        };
        let locale = self.store.current_locale();

        let call = self.refresher.refresh(refresh_token, locale);
        match tokio::time::timeout(self.refresh_timeout, call).await {
            Ok(Ok(pair)) => match self.store.store(Some(&pair)) {
                Ok(()) => {
                    tracing::info!("credentials refreshed");
                    RefreshOutcome::Retry
                }
                Err(e) => {
                    tracing::warn!(err = %e, "failed to store refreshed credentials");
                    RefreshOutcome::Abort
                }
            },
            Ok(Err(e)) => {
                tracing::warn!(err = %e, "credential refresh failed");
                RefreshOutcome::Abort
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.refresh_timeout.as_millis() as u64,
                    "credential refresh timed out"
                );
                RefreshOutcome::Abort
            }
        }
    }

    async fn await_outcome(&self, rx: &mut OutcomeRx) -> RefreshOutcome {
        match tokio::time::timeout(self.wait_timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(settled)) => (*settled).unwrap_or(RefreshOutcome::Abort),
            Ok(Err(_)) => {
                tracing::warn!("refresh cycle ended without an outcome");
                RefreshOutcome::Abort
            }
            Err(_) => {
                tracing::warn!("gave up waiting for credential refresh");
                RefreshOutcome::Abort
            }
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
