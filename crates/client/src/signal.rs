// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-loss notification: a single one-shot subscription slot.
//!
//! Raised when credentials can no longer be recovered. The session owner is
//! the only subscriber; delivery consumes the subscription, so each session
//! lifetime re-subscribes. Emitting with nobody subscribed is a no-op.

use std::fmt;

use parking_lot::Mutex;
use tokio::sync::oneshot;

type Handler = Box<dyn FnOnce() + Send + 'static>;

/// Marker delivered to async subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLost;

/// Subscription errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalError {
    /// The slot already holds a subscriber.
    AlreadySubscribed,
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadySubscribed => f.write_str("session-loss signal already has a subscriber"),
        }
    }
}

impl std::error::Error for SignalError {}

/// Single-slot, one-shot session-loss signal.
#[derive(Default)]
pub struct SessionLossNotifier {
    slot: Mutex<Option<Handler>>,
}

impl SessionLossNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the one handler for the next emission.
    pub fn subscribe_once<F>(&self, handler: F) -> Result<(), SignalError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(SignalError::AlreadySubscribed);
        }
        *slot = Some(Box::new(handler));
        Ok(())
    }

    /// Subscribe and receive the emission on a channel.
    pub fn subscribe(&self) -> Result<oneshot::Receiver<SessionLost>, SignalError> {
        let (tx, rx) = oneshot::channel();
        self.subscribe_once(move || {
            let _ = tx.send(SessionLost);
        })?;
        Ok(rx)
    }

    /// Drop the current subscriber, if any.
    pub fn unsubscribe(&self) -> bool {
        self.slot.lock().take().is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Deliver the signal to the subscriber and vacate the slot.
    ///
    /// Returns whether anyone was listening.
    pub fn notify_once(&self) -> bool {
        // Taken under the lock, run outside it: the handler may re-subscribe.
        let handler = self.slot.lock().take();
        match handler {
            Some(handler) => {
                tracing::warn!("session lost, notifying session owner");
                handler();
                true
            }
            None => {
                tracing::debug!("session-loss signal raised with no subscriber");
                false
            }
        }
    }
}

impl fmt::Debug for SessionLossNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLossNotifier").field("subscribed", &self.is_subscribed()).finish()
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
