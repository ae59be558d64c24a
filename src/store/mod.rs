// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session persistence boundary
//!
//! The engine reads and writes session records through this trait and
//! never assumes synchronous durability; saves after a finalized stream
//! are best-effort.

pub mod json;

pub use json::JsonSessionStore;

use uuid::Uuid;

use crate::chat::Session;
use crate::error::Result;

/// Transactional object store for session records
pub trait SessionStore: Send + Sync {
    /// Load every persisted session
    fn load_all(&self) -> Result<Vec<Session>>;

    /// Insert or replace one session record
    fn save(&self, session: &Session) -> Result<()>;

    /// Remove one session record; removing a missing id is not an error
    fn delete(&self, id: Uuid) -> Result<()>;
}
