//! Turn input items and the conversation history log

use crate::llm::{ContentBlock, LlmMessage, MessageRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Greeting the model "said" before the user's first turn
pub const SEED_GREETING: &str = "Hi! I'm Cognifix, your multimodal AI assistant.";

/// Reference to a binary resource the caller attached to a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Opaque reference understood by the resource resolver
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Attachment {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            file_name: None,
            mime_type: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// One item of a user turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatItem {
    Text { text: String },
    Image(Attachment),
    File(Attachment),
    Audio(Attachment),
    Video(Attachment),
}

/// Document types the model accepts as inline file parts
const FILE_MIME_PREFIXES: &[&str] = &[
    "application/pdf",
    "text/",
    "image/",
    "audio/",
    "video/",
];

impl ChatItem {
    pub fn text(text: impl Into<String>) -> Self {
        ChatItem::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ChatItem::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        match self {
            ChatItem::Text { .. } => None,
            ChatItem::Image(a) | ChatItem::File(a) | ChatItem::Audio(a) | ChatItem::Video(a) => {
                Some(a)
            }
        }
    }

    /// MIME type used when neither the resolver nor the caller knows better
    pub fn default_mime_type(&self) -> Option<&'static str> {
        match self {
            ChatItem::Text { .. } => None,
            ChatItem::Image(_) => Some("image/jpeg"),
            ChatItem::File(_) => Some("application/pdf"),
            ChatItem::Audio(_) => Some("audio/wav"),
            ChatItem::Video(_) => Some("video/mp4"),
        }
    }

    /// Whether a resolved MIME type is acceptable for this kind of item
    pub fn accepts_mime_type(&self, mime_type: &str) -> bool {
        match self {
            ChatItem::Text { .. } => false,
            ChatItem::Image(_) => mime_type.starts_with("image/"),
            ChatItem::Audio(_) => mime_type.starts_with("audio/"),
            ChatItem::Video(_) => mime_type.starts_with("video/"),
            ChatItem::File(_) => FILE_MIME_PREFIXES
                .iter()
                .any(|prefix| mime_type.starts_with(prefix)),
        }
    }
}

/// All text items of a turn joined with single spaces
pub fn joined_text(items: &[ChatItem]) -> String {
    items
        .iter()
        .filter_map(ChatItem::as_text)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stands in for a user turn that carried only attachments
pub const ATTACHMENT_PLACEHOLDER: &str = "[attachment]";

/// Who produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
    Function,
}

/// One entry in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    fn to_message(&self) -> LlmMessage {
        let text = match self.role {
            Role::User if self.text.trim().is_empty() => ATTACHMENT_PLACEHOLDER,
            _ => self.text.as_str(),
        };
        let role = match self.role {
            Role::User => MessageRole::User,
            Role::Model => MessageRole::Model,
            Role::Function => MessageRole::Function,
        };
        LlmMessage {
            role,
            content: vec![ContentBlock::text(text)],
        }
    }
}

/// Append-only conversation log.
///
/// Entries are only ever added a whole turn at a time; there is no API to
/// edit or remove one. Starting over means building a new seeded history.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationHistory {
    entries: Vec<HistoryEntry>,
}

impl ConversationHistory {
    /// History holding only the model's greeting
    pub fn seeded(greeting: &str) -> Self {
        Self {
            entries: vec![HistoryEntry::new(Role::Model, greeting)],
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Record a completed turn: the user's text and the final answer
    pub(crate) fn commit_turn(&mut self, user_text: &str, answer: &str) {
        self.entries.push(HistoryEntry::new(Role::User, user_text));
        self.entries.push(HistoryEntry::new(Role::Model, answer));
    }

    /// Prior turns as model transcript messages.
    ///
    /// Attachment-only user turns are replayed as a placeholder so user and
    /// model messages keep alternating.
    pub fn to_messages(&self) -> Vec<LlmMessage> {
        self.entries.iter().map(HistoryEntry::to_message).collect()
    }
}
