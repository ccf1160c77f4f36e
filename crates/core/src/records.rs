// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain records stored alongside a run: conversation messages and artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::run::RunId;

crate::define_id! {
    /// Unique identifier for a run message.
    pub struct MessageId("msg-");
}

crate::define_id! {
    /// Unique identifier for a run artifact.
    pub struct ArtifactId("art-");
}

/// Author of a run message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

crate::string_enum! {
    MessageRole {
        User => "user",
        Assistant => "assistant",
        System => "system",
    }
}

/// One message in a run's conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMessage {
    pub id: MessageId,
    pub run_id: RunId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl RunMessage {
    pub fn new(run_id: RunId, role: MessageRole, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self { id: MessageId::new(), run_id, role, content: content.into(), created_at: now }
    }

    pub fn user(run_id: RunId, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(run_id, MessageRole::User, content, now)
    }
}

/// Output produced by a run (file, link, report)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub run_id: RunId,
    pub name: String,
    /// Free-form type tag, e.g. "file" or "url"
    pub kind: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(
        run_id: RunId,
        name: impl Into<String>,
        kind: impl Into<String>,
        uri: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ArtifactId::new(),
            run_id,
            name: name.into(),
            kind: kind.into(),
            uri: uri.into(),
            metadata: BTreeMap::new(),
            created_at: now,
        }
    }
}
