//! Provider-neutral request and response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single model exchange
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<LlmMessage>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: Option<u32>,
}

/// Message in the model transcript
#[derive(Debug, Clone, PartialEq)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl LlmMessage {
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::User,
            content,
        }
    }

    pub fn model(content: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::Model,
            content,
        }
    }

    /// Function-role message carrying a single tool result back to the model
    pub fn function_response(name: impl Into<String>, response: Value) -> Self {
        Self {
            role: MessageRole::Function,
            content: vec![ContentBlock::FunctionResponse {
                name: name.into(),
                response,
            }],
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Model,
    Function,
}

/// Content part in a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// Binary attachment, base64 encoded
    InlineData {
        mime_type: String,
        data: String,
    },
    FunctionCall {
        name: String,
        args: Value,
    },
    FunctionResponse {
        name: String,
        response: Value,
    },
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text { text: s.into() }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        ContentBlock::InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        ContentBlock::FunctionCall {
            name: name.into(),
            args,
        }
    }
}

/// Tool schema advertised to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// LLM response (or one chunk of a streamed response)
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub end_turn: bool,
    pub usage: Usage,
}

impl LlmResponse {
    /// Plain-text response, mostly useful for tests and fallbacks
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            end_turn: true,
            usage: Usage::default(),
        }
    }

    /// Extract all function calls, in the order the model issued them
    pub fn function_calls(&self) -> Vec<(&str, &Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::FunctionCall { name, args } => Some((name.as_str(), args)),
                _ => None,
            })
            .collect()
    }

    /// Concatenated text content, `None` when the model produced no text
    pub fn text(&self) -> Option<String> {
        let text = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<String>();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
