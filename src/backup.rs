// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Versioned JSON backup format
//!
//! Exports an array of session records. The format intentionally
//! flattens branching: only each group's active variant is serialized,
//! and attachments and tool payloads are not preserved. Quick sessions
//! are excluded entirely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::ProviderRecord;
use crate::chat::{Conversation, Role, Session, SessionConfig};
use crate::error::{BanterError, Result};

/// Current backup format version
pub const BACKUP_VERSION: u32 = 1;

/// Top-level backup document
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupFile {
    pub version: u32,
    pub sessions: Vec<SessionBackup>,
}

/// One serialized session record
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionBackup {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub order: usize,
    pub title: String,
    pub starred: bool,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_marker: Option<usize>,
    pub groups: Vec<GroupBackup>,
}

/// One group, flattened to its active variant
#[derive(Debug, Serialize, Deserialize)]
pub struct GroupBackup {
    pub date: DateTime<Utc>,
    pub conversation: ConversationBackup,
}

/// One conversation snapshot: date, text content, role
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationBackup {
    pub date: DateTime<Utc>,
    pub content: String,
    pub role: Role,
}

impl SessionBackup {
    pub fn from_session(session: &Session) -> Self {
        Self {
            id: session.id,
            date: session.date,
            order: session.order,
            title: session.title.clone(),
            starred: session.starred,
            error_message: session.error_message.clone(),
            reset_marker: session.reset_marker,
            groups: session
                .groups()
                .iter()
                .map(|group| GroupBackup {
                    date: group.date,
                    conversation: ConversationBackup {
                        date: group.active().date,
                        content: group.active().content.clone(),
                        role: group.role(),
                    },
                })
                .collect(),
        }
    }

    /// Reconstruct a session against the caller's provider
    pub fn into_session(self, provider: &ProviderRecord) -> Session {
        let mut session = Session::new(SessionConfig::new(provider.clone()));
        session.id = self.id;
        session.date = self.date;
        session.order = self.order;
        session.title = self.title;
        session.starred = self.starred;
        session.error_message = self.error_message;
        session.reset_marker = self.reset_marker;

        for group_backup in self.groups {
            let mut conversation = match group_backup.conversation.role {
                Role::User => Conversation::user(group_backup.conversation.content),
                Role::System => Conversation::system(group_backup.conversation.content),
                _ => {
                    let mut c = Conversation::assistant(group_backup.conversation.content);
                    c.role = group_backup.conversation.role;
                    c
                }
            };
            conversation.date = group_backup.conversation.date;
            conversation.is_replying = false;

            let id = session.add_group(conversation);
            if let Some(group) = session.group_by_id_mut(id) {
                group.date = group_backup.date;
            }
        }

        session.refresh_token_count();
        session
    }
}

/// Serialize sessions (quick sessions excluded) to pretty JSON
pub fn export_sessions(sessions: &[Session]) -> Result<String> {
    let file = BackupFile {
        version: BACKUP_VERSION,
        sessions: sessions
            .iter()
            .filter(|s| !s.is_quick)
            .map(SessionBackup::from_session)
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Parse a backup document and rebuild sessions against `provider`
pub fn import_sessions(json: &str, provider: &ProviderRecord) -> Result<Vec<Session>> {
    let file: BackupFile = serde_json::from_str(json)
        .map_err(|e| BanterError::Backup(format!("unreadable backup file: {}", e)))?;

    if file.version > BACKUP_VERSION {
        return Err(BanterError::Backup(format!(
            "backup version {} is newer than supported version {}",
            file.version, BACKUP_VERSION
        )));
    }

    Ok(file
        .sessions
        .into_iter()
        .map(|backup| backup.into_session(provider))
        .collect())
}
