// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! JSON-file session store
//!
//! One pretty-printed JSON file per session under a directory. Writes go
//! through a temp file and rename so a crash never leaves a truncated
//! record.

use std::path::PathBuf;

use uuid::Uuid;

use super::SessionStore;
use crate::chat::Session;
use crate::config::Settings;
use crate::error::{BanterError, Result};

/// Directory-backed session store
pub struct JsonSessionStore {
    dir: PathBuf,
}

impl JsonSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Store rooted at the default sessions directory
    pub fn open_default() -> Result<Self> {
        Self::new(Settings::sessions_dir())
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

impl SessionStore for JsonSessionStore {
    fn load_all(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Session>(&content) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    // one corrupt record must not hide the rest
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable session record");
                }
            }
        }
        sessions.sort_by_key(|s| s.date);
        Ok(sessions)
    }

    fn save(&self, session: &Session) -> Result<()> {
        let content = serde_json::to_string_pretty(session)?;
        let path = self.path_for(session.id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| BanterError::Store(format!("could not persist session: {}", e)))?;
        Ok(())
    }

    fn delete(&self, id: Uuid) -> Result<()> {
        let path = self.path_for(id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
