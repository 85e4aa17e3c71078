//! Turn executor: drives the state machine and performs its effects

use super::traits::{LlmClient, ResourceResolver, ToolExecutor};
use crate::chat::{joined_text, ChatItem, ConversationHistory};
use crate::intent::{instruction_part, Persona};
use crate::llm::{ContentBlock, LlmError, LlmMessage, LlmRequest, LlmResponse};
use crate::progress::{ProgressEmitter, ProgressEvent};
use crate::state_machine::{
    transition, Effect, Event, Exchange, ToolCall, TransitionError, TurnContext, TurnState,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::StreamExt;
use thiserror::Error;

/// Final exchange after tool rounds
pub const SYNTHESIS_PROMPT: &str =
    "Now summarize the results above briefly and naturally for the user in one paragraph.";

/// Why a turn did not produce an answer
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Model exchange failed: {0}")]
    Model(#[from] LlmError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Turn stopped in state {0}")]
    Incomplete(&'static str),
}

/// Runs one turn to completion.
///
/// Borrowed collaborators come from the owning session; the transcript is
/// scratch space for this turn only and history is touched exactly once,
/// when the state machine asks to commit.
pub struct TurnRunner<'a, L, T, R> {
    llm: &'a L,
    tools: &'a T,
    resolver: &'a R,
    history: &'a mut ConversationHistory,
    progress: &'a ProgressEmitter,
    context: TurnContext,
    stream_synthesis: bool,
    state: TurnState,
    /// Prior turns, rendered once at the start
    prior: Vec<LlmMessage>,
    /// Messages exchanged during this turn
    transcript: Vec<LlmMessage>,
    user_text: String,
    failure: Option<LlmError>,
}

impl<'a, L, T, R> TurnRunner<'a, L, T, R>
where
    L: LlmClient,
    T: ToolExecutor,
    R: ResourceResolver,
{
    pub fn new(
        llm: &'a L,
        tools: &'a T,
        resolver: &'a R,
        history: &'a mut ConversationHistory,
        progress: &'a ProgressEmitter,
    ) -> Self {
        let prior = history.to_messages();
        Self {
            llm,
            tools,
            resolver,
            history,
            progress,
            context: TurnContext::default(),
            stream_synthesis: false,
            state: TurnState::Idle,
            prior,
            transcript: Vec::new(),
            user_text: String::new(),
            failure: None,
        }
    }

    pub fn with_context(mut self, context: TurnContext) -> Self {
        self.context = context;
        self
    }

    /// Deliver the synthesis exchange as `AnswerDelta` chunks
    pub fn with_stream_synthesis(mut self, enabled: bool) -> Self {
        self.stream_synthesis = enabled;
        self
    }

    /// Process the turn and return the final answer
    pub async fn run(mut self, items: Vec<ChatItem>) -> Result<String, TurnError> {
        self.user_text = joined_text(&items);

        // Process events in a loop - no recursion
        let mut events_to_process = vec![Event::UserTurn { items }];
        while let Some(event) = events_to_process.pop() {
            let result = match transition(&self.state, &self.context, event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(state = self.state.name(), error = %e, "Invalid turn transition");
                    self.progress.emit(ProgressEvent::Error {
                        message: e.to_string(),
                    });
                    return Err(e.into());
                }
            };

            let old = std::mem::replace(&mut self.state, result.new_state);
            tracing::debug!(from = old.name(), to = self.state.name(), "Turn transition");

            for effect in result.effects {
                if let Some(generated) = self.execute_effect(effect).await {
                    events_to_process.push(generated);
                }
            }
        }

        match std::mem::take(&mut self.state) {
            TurnState::Done { answer } => Ok(answer),
            TurnState::Failed { message } => Err(self
                .failure
                .take()
                .unwrap_or_else(|| LlmError::unknown(message))
                .into()),
            other => Err(TurnError::Incomplete(other.name())),
        }
    }

    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::Emit(event) => {
                self.progress.emit(event);
                None
            }

            Effect::CommitTurn { answer } => {
                self.history.commit_turn(&self.user_text, &answer);
                None
            }

            Effect::InvokeTool(call) => {
                if let Some(line) = self.tools.status_line(&call) {
                    self.progress.emit(ProgressEvent::status(line));
                }
                tracing::info!(tool = %call.name, "Dispatching tool call");
                let outcome = self.tools.dispatch(&call).await;
                Some(Event::ToolFinished { outcome })
            }

            Effect::RequestModel(exchange) => {
                let streamed = self.stream_synthesis && matches!(exchange, Exchange::Synthesis);
                let message = self.exchange_message(exchange).await;
                self.transcript.push(message);

                let request = LlmRequest {
                    messages: self.prior.iter().chain(&self.transcript).cloned().collect(),
                    tools: self.tools.definitions(),
                    max_tokens: None,
                };

                let response = if streamed {
                    self.stream_exchange(&request).await
                } else {
                    self.llm.complete(&request).await
                };

                Some(self.reply_event(response))
            }
        }
    }

    /// Render an exchange as the next transcript message
    async fn exchange_message(&self, exchange: Exchange) -> LlmMessage {
        match exchange {
            Exchange::Initial { persona, items } => {
                LlmMessage::user(self.initial_parts(persona, &items).await)
            }
            Exchange::FunctionResult(result) => {
                LlmMessage::function_response(result.name, result.payload)
            }
            Exchange::Synthesis => LlmMessage::user(vec![ContentBlock::text(SYNTHESIS_PROMPT)]),
        }
    }

    /// Persona instructions first, then every item in order
    async fn initial_parts(&self, persona: Persona, items: &[ChatItem]) -> Vec<ContentBlock> {
        let mut parts = vec![ContentBlock::text(instruction_part(persona))];
        for item in items {
            if let Some(part) = self.item_part(item).await {
                parts.push(part);
            }
        }
        parts
    }

    /// A content part for one item; unusable attachments are left out
    async fn item_part(&self, item: &ChatItem) -> Option<ContentBlock> {
        if let Some(text) = item.as_text() {
            return (!text.trim().is_empty()).then(|| ContentBlock::text(text));
        }

        let attachment = item.attachment()?;
        let resource = match self.resolver.resolve(attachment).await {
            Ok(resource) => resource,
            Err(e) => {
                tracing::warn!(reference = %attachment.reference, error = %e, "Skipping attachment");
                return None;
            }
        };

        let mime_type = resource
            .mime_type
            .or_else(|| item.default_mime_type().map(str::to_string))?;
        if !item.accepts_mime_type(&mime_type) {
            tracing::warn!(
                reference = %attachment.reference,
                %mime_type,
                "Skipping attachment with mismatched type"
            );
            return None;
        }

        Some(ContentBlock::inline_data(mime_type, BASE64.encode(&resource.data)))
    }

    /// Chunked exchange: forward text as it arrives, return the merged response
    async fn stream_exchange(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut stream = self.llm.complete_stream(request).await?;
        let mut merged = LlmResponse::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let delta: String = chunk
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            if !delta.is_empty() {
                self.progress.emit(ProgressEvent::AnswerDelta { text: delta });
            }

            merged.content.extend(chunk.content);
            merged.end_turn |= chunk.end_turn;
            if chunk.usage.output_tokens > 0 {
                merged.usage = chunk.usage;
            }
        }

        Ok(merged)
    }

    /// Record the reply in the transcript and turn it into an event
    fn reply_event(&mut self, response: Result<LlmResponse, LlmError>) -> Event {
        match response {
            Ok(response) => {
                let calls: Vec<ToolCall> = response
                    .function_calls()
                    .into_iter()
                    .map(|(name, args)| ToolCall::from_parts(name, args.clone()))
                    .collect();
                let text = response.text();
                if !response.content.is_empty() {
                    self.transcript.push(LlmMessage::model(response.content));
                }
                Event::ModelReplied { text, calls }
            }
            Err(e) => {
                tracing::error!(
                    state = self.state.name(),
                    kind = ?e.kind,
                    error = %e.message,
                    "Model exchange failed"
                );
                let message = e.message.clone();
                self.failure = Some(e);
                Event::ModelFailed { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{Attachment, SEED_GREETING};
    use crate::llm::MessageRole;
    use crate::progress::channel;
    use crate::runtime::testing::{MockLlmClient, MockResolver, MockToolExecutor};
    use crate::tools::ToolResult;
    use serde_json::json;

    fn call_response(calls: &[(&str, serde_json::Value)]) -> LlmResponse {
        LlmResponse {
            content: calls
                .iter()
                .map(|(name, args)| ContentBlock::function_call(*name, args.clone()))
                .collect(),
            end_turn: true,
            usage: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_initial_message_layout() {
        let llm = MockLlmClient::new("mock");
        llm.queue_response(LlmResponse::from_text("A tasty curry."));
        let tools = MockToolExecutor::new();
        let resolver = MockResolver::new().with_resource("fridge.jpg", b"jpeg", None);
        let mut history = ConversationHistory::seeded(SEED_GREETING);
        let (progress, _stream) = channel();

        let answer = TurnRunner::new(&llm, &tools, &resolver, &mut history, &progress)
            .run(vec![
                ChatItem::text("recipe ideas?"),
                ChatItem::Image(Attachment::new("fridge.jpg")),
            ])
            .await
            .unwrap();
        assert_eq!(answer, "A tasty curry.");

        let request = &llm.recorded_requests()[0];
        // seed greeting, then the turn's user message
        assert_eq!(request.messages.len(), 2);
        let user = &request.messages[1];
        assert_eq!(user.role, MessageRole::User);
        assert_eq!(
            user.content[0],
            ContentBlock::text(instruction_part(Persona::Recipe))
        );
        assert_eq!(user.content[1], ContentBlock::text("recipe ideas?"));
        assert_eq!(
            user.content[2],
            ContentBlock::inline_data("image/jpeg", BASE64.encode(b"jpeg"))
        );
    }

    #[tokio::test]
    async fn test_unresolvable_attachment_is_omitted() {
        let llm = MockLlmClient::new("mock");
        llm.queue_response(LlmResponse::from_text("I can't see a file."));
        let tools = MockToolExecutor::new();
        let resolver = MockResolver::new();
        let mut history = ConversationHistory::seeded(SEED_GREETING);
        let (progress, _stream) = channel();

        TurnRunner::new(&llm, &tools, &resolver, &mut history, &progress)
            .run(vec![ChatItem::File(Attachment::new("missing.pdf"))])
            .await
            .unwrap();

        let request = &llm.recorded_requests()[0];
        assert_eq!(request.messages[1].content.len(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_attachment_type_is_omitted() {
        let llm = MockLlmClient::new("mock");
        llm.queue_response(LlmResponse::from_text("ok"));
        let tools = MockToolExecutor::new();
        let resolver =
            MockResolver::new().with_resource("notes.pdf", b"%PDF", Some("application/pdf"));
        let mut history = ConversationHistory::seeded(SEED_GREETING);
        let (progress, _stream) = channel();

        TurnRunner::new(&llm, &tools, &resolver, &mut history, &progress)
            .run(vec![ChatItem::Image(Attachment::new("notes.pdf"))])
            .await
            .unwrap();
        assert_eq!(llm.recorded_requests()[0].messages[1].content.len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_file_type_is_omitted() {
        let llm = MockLlmClient::new("mock");
        llm.queue_response(LlmResponse::from_text("I can only read the text."));
        let tools = MockToolExecutor::new();
        let resolver = MockResolver::new()
            .with_resource("bundle.zip", b"PK", Some("application/zip"))
            .with_resource("notes.txt", b"milk, eggs", Some("text/plain"));
        let mut history = ConversationHistory::seeded(SEED_GREETING);
        let (progress, _stream) = channel();

        let answer = TurnRunner::new(&llm, &tools, &resolver, &mut history, &progress)
            .run(vec![
                ChatItem::text("what is in these?"),
                ChatItem::File(Attachment::new("bundle.zip")),
                ChatItem::File(Attachment::new("notes.txt")),
            ])
            .await
            .unwrap();
        assert_eq!(answer, "I can only read the text.");

        let parts = &llm.recorded_requests()[0].messages[1].content;
        // instructions, text, then only the plain-text file
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[2],
            ContentBlock::inline_data("text/plain", BASE64.encode(b"milk, eggs"))
        );
    }

    #[tokio::test]
    async fn test_tool_results_use_function_role() {
        let llm = MockLlmClient::new("mock");
        llm.queue_response(call_response(&[("getCoordinates", json!({"city": "Paris"}))]));
        llm.queue_response(LlmResponse::from_text("Got it."));
        llm.queue_response(LlmResponse::from_text("Paris is at 48.85N."));
        let tools = MockToolExecutor::new().with_tool(
            "getCoordinates",
            ToolResult::success("getCoordinates", json!({"lat": 48.85, "lon": 2.35})),
        );
        let resolver = MockResolver::new();
        let mut history = ConversationHistory::seeded(SEED_GREETING);
        let (progress, _stream) = channel();

        let answer = TurnRunner::new(&llm, &tools, &resolver, &mut history, &progress)
            .run(vec![ChatItem::text("where is Paris?")])
            .await
            .unwrap();
        assert_eq!(answer, "Paris is at 48.85N.");

        let requests = llm.recorded_requests();
        assert_eq!(requests.len(), 3);
        // seed, user, model call, function result
        let second = &requests[1].messages;
        assert_eq!(second.len(), 4);
        assert_eq!(second[2].role, MessageRole::Model);
        assert_eq!(second[3].role, MessageRole::Function);
        assert_eq!(
            second[3].content[0],
            ContentBlock::FunctionResponse {
                name: "getCoordinates".to_string(),
                response: json!({"lat": 48.85, "lon": 2.35}),
            }
        );
        let last = requests[2].messages.last().unwrap();
        assert_eq!(last.content[0], ContentBlock::text(SYNTHESIS_PROMPT));
        assert!(requests.iter().all(|r| !r.tools.is_empty()));
    }

    #[tokio::test]
    async fn test_streamed_synthesis_emits_deltas() {
        let llm = MockLlmClient::new("mock");
        llm.queue_response(call_response(&[("getCoordinates", json!({"city": "Rome"}))]));
        llm.queue_response(LlmResponse::from_text("ok"));
        llm.queue_stream(vec!["Rome is ", "lovely."]);
        let tools = MockToolExecutor::new().with_tool(
            "getCoordinates",
            ToolResult::success("getCoordinates", json!({"lat": 41.9, "lon": 12.5})),
        );
        let resolver = MockResolver::new();
        let mut history = ConversationHistory::seeded(SEED_GREETING);
        let (progress, stream) = channel();

        let answer = TurnRunner::new(&llm, &tools, &resolver, &mut history, &progress)
            .with_stream_synthesis(true)
            .run(vec![ChatItem::text("tell me about Rome")])
            .await
            .unwrap();
        drop(progress);
        assert_eq!(answer, "Rome is lovely.");

        let events: Vec<_> = stream.collect().await;
        let deltas: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::AnswerDelta { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, vec!["Rome is ", "lovely."]);
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::Final {
                text: "Rome is lovely.".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_failure_returns_model_error() {
        let llm = MockLlmClient::new("mock");
        llm.queue_error(LlmError::rate_limit("slow down"));
        let tools = MockToolExecutor::new();
        let resolver = MockResolver::new();
        let mut history = ConversationHistory::seeded(SEED_GREETING);
        let (progress, _stream) = channel();

        let err = TurnRunner::new(&llm, &tools, &resolver, &mut history, &progress)
            .run(vec![ChatItem::text("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Model(ref e) if e.message == "slow down"));
        assert_eq!(history.len(), 1);
    }
}
