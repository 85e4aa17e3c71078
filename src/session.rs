//! Conversation sessions
//!
//! A session owns one conversation history and the collaborators a turn
//! needs. `send` takes `&mut self`, so a session processes one turn at a
//! time; callers sharing a session across tasks must serialize access
//! themselves, e.g. behind a `tokio::sync::Mutex`.

use crate::chat::{ChatItem, ConversationHistory, SEED_GREETING};
use crate::progress::ProgressEmitter;
use crate::runtime::{LlmClient, ResourceResolver, ToolExecutor, TurnError, TurnRunner};
use crate::state_machine::state::DEFAULT_MAX_TOOL_ROUNDS;
use crate::state_machine::TurnContext;
use uuid::Uuid;

/// Per-session behavior switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub max_tool_rounds: u32,
    /// Stream the post-tool synthesis as `AnswerDelta` events
    pub stream_synthesis: bool,
    /// Model entry every history starts with
    pub greeting: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            stream_synthesis: false,
            greeting: SEED_GREETING.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_tool_rounds: std::env::var("MAX_TOOL_ROUNDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tool_rounds),
            stream_synthesis: std::env::var("STREAM_SYNTHESIS")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.stream_synthesis),
            greeting: defaults.greeting,
        }
    }
}

/// One conversation with its own history
pub struct ConversationSession<L, T, R> {
    id: String,
    llm: L,
    tools: T,
    resolver: R,
    config: SessionConfig,
    history: ConversationHistory,
}

impl<L, T, R> ConversationSession<L, T, R>
where
    L: LlmClient,
    T: ToolExecutor,
    R: ResourceResolver,
{
    pub fn new(llm: L, tools: T, resolver: R, config: SessionConfig) -> Self {
        let history = ConversationHistory::seeded(&config.greeting);
        let id = Uuid::new_v4().to_string();
        tracing::info!(session_id = %id, model = llm.model_id(), "Session created");
        Self {
            id,
            llm,
            tools,
            resolver,
            config,
            history,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Process one turn, streaming progress to `progress`.
    ///
    /// The emitter is dropped when the turn ends, which closes the stream
    /// right after its `Final` or `Error` event. On error history is left
    /// exactly as it was before the call.
    pub async fn send(
        &mut self,
        items: Vec<ChatItem>,
        progress: ProgressEmitter,
    ) -> Result<String, TurnError> {
        let start = std::time::Instant::now();
        tracing::info!(session_id = %self.id, items = items.len(), "Turn started");

        let result = TurnRunner::new(
            &self.llm,
            &self.tools,
            &self.resolver,
            &mut self.history,
            &progress,
        )
        .with_context(TurnContext {
            max_tool_rounds: self.config.max_tool_rounds,
        })
        .with_stream_synthesis(self.config.stream_synthesis)
        .run(items)
        .await;
        drop(progress);

        match &result {
            Ok(answer) => tracing::info!(
                session_id = %self.id,
                duration_ms = %start.elapsed().as_millis(),
                answer_len = answer.len(),
                history_len = self.history.len(),
                "Turn completed"
            ),
            Err(e) => tracing::warn!(
                session_id = %self.id,
                duration_ms = %start.elapsed().as_millis(),
                error = %e,
                "Turn failed"
            ),
        }
        result
    }

    /// Start over: history back to the greeting alone, and a fresh id
    pub fn reset(&mut self) {
        self.history = ConversationHistory::seeded(&self.config.greeting);
        self.id = Uuid::new_v4().to_string();
        tracing::info!(session_id = %self.id, "Session reset");
    }
}
