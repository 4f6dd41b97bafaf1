// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential store implementations.

use std::path::PathBuf;

use parking_lot::RwLock;

use crate::credential::persist::{self, PersistedSession};
use crate::credential::{CredentialAccessor, CredentialPair, CredentialStore};

/// In-process store. Nothing outlives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pair: RwLock<Option<CredentialPair>>,
    locale: Option<String>,
}

impl MemoryStore {
    pub fn new(locale: Option<String>) -> Self {
        Self { pair: RwLock::new(None), locale }
    }

    /// Store pre-seeded with a pair.
    pub fn with_pair(pair: CredentialPair, locale: Option<String>) -> Self {
        Self { pair: RwLock::new(Some(pair)), locale }
    }
}

impl CredentialAccessor for MemoryStore {
    fn current_credential(&self) -> Option<String> {
        self.pair.read().as_ref().map(|p| p.access_token.clone())
    }

    fn current_refresh_credential(&self) -> Option<String> {
        self.pair.read().as_ref().map(|p| p.refresh_token.clone())
    }

    fn current_locale(&self) -> Option<String> {
        self.locale.clone()
    }
}

impl CredentialStore for MemoryStore {
    fn store(&self, pair: Option<&CredentialPair>) -> anyhow::Result<()> {
        *self.pair.write() = pair.cloned();
        Ok(())
    }
}

/// JSON file store with an in-memory cache.
///
/// The file is read once at open; every write goes through to disk before
/// the cache is updated, so a failed write leaves the previous pair in place.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: RwLock<PersistedSession>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// `locale` overrides any locale recorded in the file.
    pub fn open(path: impl Into<PathBuf>, locale: Option<String>) -> anyhow::Result<Self> {
        let path = path.into();
        let mut state = persist::load(&path)?;
        if locale.is_some() {
            state.locale = locale;
        }
        Ok(Self { path, state: RwLock::new(state) })
    }
}

impl CredentialAccessor for FileStore {
    fn current_credential(&self) -> Option<String> {
        self.state.read().credentials.as_ref().map(|p| p.access_token.clone())
    }

    fn current_refresh_credential(&self) -> Option<String> {
        self.state.read().credentials.as_ref().map(|p| p.refresh_token.clone())
    }

    fn current_locale(&self) -> Option<String> {
        self.state.read().locale.clone()
    }
}

impl CredentialStore for FileStore {
    fn store(&self, pair: Option<&CredentialPair>) -> anyhow::Result<()> {
        let mut state = self.state.write();
        let next = PersistedSession { credentials: pair.cloned(), locale: state.locale.clone() };
        persist::save(&self.path, &next)?;
        *state = next;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
