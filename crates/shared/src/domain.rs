use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local bookkeeping about where a message came from. Never sent to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Greeting,
    Prompt,
    Reply,
    Error,
}

/// One turn of the conversation.
///
/// Fields are private so a message cannot change after it has been appended to
/// a conversation; only `role` and `content` ever reach the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    role: Role,
    content: String,
    kind: MessageKind,
    created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            kind,
            created_at: Utc::now(),
        }
    }

    pub fn greeting(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageKind::Greeting, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, MessageKind::Prompt, content)
    }

    pub fn reply(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageKind::Reply, content)
    }

    /// Assistant-role entry describing a failed request.
    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageKind::Error, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }
}
