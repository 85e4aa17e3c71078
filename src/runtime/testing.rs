//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::chat::Attachment;
use crate::llm::{ContentBlock, LlmError, LlmRequest, LlmResponse, LlmStream, ToolDefinition};
use crate::state_machine::ToolCall;
use crate::tools::{missing_required, ToolOutcome, ToolResult};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock LLM Client
// ============================================================================

enum MockReply {
    Complete(Result<LlmResponse, LlmError>),
    /// Text chunks delivered one by one in streaming mode
    Stream(Vec<String>),
}

impl MockReply {
    fn into_response(self) -> Result<LlmResponse, LlmError> {
        match self {
            MockReply::Complete(result) => result,
            MockReply::Stream(chunks) => Ok(LlmResponse::from_text(chunks.concat())),
        }
    }
}

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    replies: Mutex<VecDeque<MockReply>>,
    model_id: String,
    delay: Option<Duration>,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.push(MockReply::Complete(Ok(response)));
    }

    /// Queue a plain text response
    pub fn queue_text(&self, text: &str) {
        self.queue_response(LlmResponse::from_text(text));
    }

    /// Queue a response carrying function calls, in order
    pub fn queue_calls(&self, calls: &[(&str, Value)]) {
        self.queue_response(LlmResponse {
            content: calls
                .iter()
                .map(|(name, args)| ContentBlock::function_call(*name, args.clone()))
                .collect(),
            end_turn: true,
            usage: Default::default(),
        });
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.push(MockReply::Complete(Err(error)));
    }

    /// Queue a response delivered as text chunks when streamed
    pub fn queue_stream(&self, chunks: Vec<&str>) {
        self.push(MockReply::Stream(
            chunks.into_iter().map(str::to_string).collect(),
        ));
    }

    fn push(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Record the request and take the next queued reply
    async fn next_reply(&self, request: &LlmRequest) -> MockReply {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.replies.lock().unwrap().pop_front();
        reply.unwrap_or_else(|| {
            MockReply::Complete(Err(LlmError::network("No mock response queued")))
        })
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn pending_replies(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.next_reply(request).await.into_response()
    }

    async fn complete_stream(&self, request: &LlmRequest) -> Result<LlmStream, LlmError> {
        let chunks: Vec<Result<LlmResponse, LlmError>> = match self.next_reply(request).await {
            MockReply::Stream(chunks) => chunks
                .into_iter()
                .map(|c| Ok(LlmResponse::from_text(c)))
                .collect(),
            MockReply::Complete(result) => vec![Ok(result?)],
        };
        Ok(futures::stream::iter(chunks).boxed())
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Tool Executor
// ============================================================================

/// Mock tool executor with predefined results
pub struct MockToolExecutor {
    results: HashMap<String, ToolResult>,
    schemas: HashMap<String, Value>,
    status_lines: HashMap<String, String>,
    definitions: Vec<ToolDefinition>,
    /// Record of tool executions
    pub executions: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            schemas: HashMap::new(),
            status_lines: HashMap::new(),
            definitions: Vec::new(),
            executions: Mutex::new(Vec::new()),
        }
    }

    /// Add a tool with a predefined result
    pub fn with_tool(self, name: impl Into<String>, result: ToolResult) -> Self {
        self.with_schema(name, json!({ "type": "object", "properties": {} }), result)
    }

    /// Add a tool whose schema lists required arguments
    pub fn with_schema(mut self, name: impl Into<String>, schema: Value, result: ToolResult) -> Self {
        let name = name.into();
        self.definitions.push(ToolDefinition {
            name: name.clone(),
            description: format!("Mock {name}"),
            input_schema: schema.clone(),
        });
        self.schemas.insert(name.clone(), schema);
        self.results.insert(name, result);
        self
    }

    pub fn with_status_line(mut self, name: impl Into<String>, line: impl Into<String>) -> Self {
        self.status_lines.insert(name.into(), line.into());
        self
    }

    /// Get recorded executions
    pub fn recorded_executions(&self) -> Vec<(String, Map<String, Value>)> {
        self.executions.lock().unwrap().clone()
    }

    pub fn executed_names(&self) -> Vec<String> {
        self.recorded_executions()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }
}

impl Default for MockToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn dispatch(&self, call: &ToolCall) -> ToolOutcome {
        let (Some(result), Some(schema)) =
            (self.results.get(&call.name), self.schemas.get(&call.name))
        else {
            return ToolOutcome::UnknownTool;
        };
        if let Some(argument) = missing_required(schema, &call.args) {
            return ToolOutcome::MissingArgument { argument };
        }
        self.executions
            .lock()
            .unwrap()
            .push((call.name.clone(), call.args.clone()));
        ToolOutcome::Completed(result.clone())
    }

    fn status_line(&self, call: &ToolCall) -> Option<String> {
        let schema = self.schemas.get(&call.name)?;
        if missing_required(schema, &call.args).is_some() {
            return None;
        }
        self.status_lines.get(&call.name).cloned()
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.definitions.clone()
    }
}

// ============================================================================
// Mock Resolver
// ============================================================================

/// In-memory attachment store
#[derive(Default)]
pub struct MockResolver {
    resources: HashMap<String, Resource>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, reference: &str, data: &[u8], mime_type: Option<&str>) -> Self {
        self.resources.insert(
            reference.to_string(),
            Resource {
                data: data.to_vec(),
                mime_type: mime_type.map(str::to_string),
            },
        );
        self
    }
}

#[async_trait]
impl ResourceResolver for MockResolver {
    async fn resolve(&self, attachment: &Attachment) -> Result<Resource, ResolveError> {
        self.resources
            .get(&attachment.reference)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound {
                reference: attachment.reference.clone(),
            })
    }
}
