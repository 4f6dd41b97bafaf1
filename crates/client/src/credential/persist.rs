// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk form of a single signed-in session: the credential pair and the
//! preferred locale, as one JSON document.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::credential::CredentialPair;

/// On-disk session state.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// Load a persisted session. A missing file is an empty session.
pub fn load(path: &Path) -> anyhow::Result<PersistedSession> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(PersistedSession::default())
        }
        Err(e) => return Err(e.into()),
    };
    if contents.trim().is_empty() {
        return Ok(PersistedSession::default());
    }
    let session: PersistedSession = serde_json::from_str(&contents)?;
    Ok(session)
}

/// Replace the session file with `session`.
///
/// The pair is written next to the target and renamed over it, so a reader
/// sees either the previous session or the new one. Each write gets its own
/// scratch name; a refresh and a logout racing in one process never clobber
/// each other's half-written file.
pub fn save(path: &Path, session: &PersistedSession) -> anyhow::Result<()> {
    static WRITES: AtomicU32 = AtomicU32::new(0);

    let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
    if let Some(dir) = dir {
        std::fs::create_dir_all(dir)?;
    }
    let Some(name) = path.file_name() else {
        anyhow::bail!("session path has no file name: {}", path.display());
    };

    let scratch = path.with_file_name(format!(
        ".{}.{}-{}",
        name.to_string_lossy(),
        std::process::id(),
        WRITES.fetch_add(1, Ordering::Relaxed),
    ));
    std::fs::write(&scratch, serde_json::to_vec_pretty(session)?)?;
    if let Err(e) = std::fs::rename(&scratch, path) {
        let _ = std::fs::remove_file(&scratch);
        return Err(e.into());
    }
    Ok(())
}
