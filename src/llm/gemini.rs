//! Google Gemini provider implementation

use super::types::{ContentBlock, LlmRequest, LlmResponse, MessageRole, Usage};
use super::{LlmError, LlmService, LlmStream};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const DIRECT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Gemini models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiModel {
    Flash25,
    Pro25,
}

impl GeminiModel {
    pub const ALL: [GeminiModel; 2] = [GeminiModel::Flash25, GeminiModel::Pro25];

    pub fn api_name(self) -> &'static str {
        match self {
            GeminiModel::Flash25 => "gemini-2.5-flash",
            GeminiModel::Pro25 => "gemini-2.5-pro",
        }
    }

    pub fn model_id(self) -> &'static str {
        // User-facing IDs match the API names for Gemini
        self.api_name()
    }

    pub fn context_window(self) -> usize {
        match self {
            GeminiModel::Flash25 | GeminiModel::Pro25 => 1_048_576,
        }
    }
}

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: String,
    model: GeminiModel,
    base_url: String,
}

impl GeminiService {
    pub fn new(api_key: String, model: GeminiModel, gateway: Option<&str>) -> Result<Self, String> {
        let base_url = match gateway {
            Some(gw) => format!(
                "{}/gemini/v1beta/models/{}",
                gw.trim_end_matches('/'),
                model.api_name()
            ),
            None => format!("{DIRECT_BASE_URL}/{}", model.api_name()),
        };

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url,
        })
    }

    fn translate_request(request: &LlmRequest) -> GeminiRequest {
        let contents = request
            .messages
            .iter()
            .filter_map(|msg| {
                let role = match msg.role {
                    MessageRole::User => "user",
                    MessageRole::Model => "model",
                    MessageRole::Function => "function",
                };

                let parts: Vec<GeminiPart> = msg.content.iter().map(translate_block).collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(GeminiContent {
                        role: Some(role.to_string()),
                        parts,
                    })
                }
            })
            .collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(vec![GeminiTool {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|t| GeminiFunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    })
                    .collect(),
            }])
        };

        GeminiRequest {
            contents,
            tools,
            generation_config: request.max_tokens.map(|max| GeminiGenerationConfig {
                max_output_tokens: Some(max),
            }),
        }
    }

    /// Convert a Gemini response body into our response type.
    ///
    /// Streamed chunks may legitimately carry no candidate (usage-only frames),
    /// so `require_candidate` is only set for single-shot responses.
    fn normalize_response(
        resp: GeminiResponse,
        require_candidate: bool,
    ) -> Result<LlmResponse, LlmError> {
        let usage = resp
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u64::from(u.prompt_token_count),
                output_tokens: u64::from(u.candidates_token_count),
            })
            .unwrap_or_default();

        let Some(candidate) = resp.candidates.into_iter().next() else {
            if require_candidate {
                let reason = resp
                    .prompt_feedback
                    .and_then(|f| f.block_reason)
                    .unwrap_or_else(|| "no candidates".to_string());
                return Err(LlmError::unknown(format!("Empty model response: {reason}")));
            }
            return Ok(LlmResponse {
                usage,
                ..LlmResponse::default()
            });
        };

        let mut content = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            match part {
                GeminiPart::Text { text } => {
                    if !text.is_empty() {
                        content.push(ContentBlock::Text { text });
                    }
                }
                GeminiPart::FunctionCall { function_call } => {
                    content.push(ContentBlock::FunctionCall {
                        name: function_call.name,
                        args: function_call.args.unwrap_or_else(|| json!({})),
                    });
                }
                _ => {}
            }
        }

        let end_turn = candidate.finish_reason.is_some_and(|r| r == "STOP");

        Ok(LlmResponse {
            content,
            end_turn,
            usage,
        })
    }

    /// The API key travels in a header, never in the URL
    fn endpoint(&self, method: &str) -> String {
        format!("{}:{method}", self.base_url)
    }

    fn is_gateway(&self) -> bool {
        self.api_key.starts_with("implicit")
    }

    async fn post(&self, url: &str, body: &GeminiRequest) -> Result<reqwest::Response, LlmError> {
        let mut builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if !self.is_gateway() {
            builder = builder.header("x-goog-api-key", &self.api_key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                LlmError::network(format!("Connection failed: {e}"))
            } else {
                LlmError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;
        let message = serde_json::from_str::<GeminiErrorResponse>(&body)
            .map_or(body, |e| e.error.message);
        Err(LlmError::from_status(status.as_u16(), &message))
    }
}

fn translate_block(block: &ContentBlock) -> GeminiPart {
    match block {
        ContentBlock::Text { text } => GeminiPart::Text { text: text.clone() },
        ContentBlock::InlineData { mime_type, data } => GeminiPart::InlineData {
            inline_data: GeminiBlob {
                mime_type: mime_type.clone(),
                data: data.clone(),
            },
        },
        ContentBlock::FunctionCall { name, args } => GeminiPart::FunctionCall {
            function_call: GeminiFunctionCall {
                name: name.clone(),
                args: Some(args.clone()),
            },
        },
        ContentBlock::FunctionResponse { name, response } => {
            // Gemini requires the response to be a JSON object
            let response = if response.is_object() {
                response.clone()
            } else {
                json!({ "result": response })
            };
            GeminiPart::FunctionResponse {
                function_response: GeminiFunctionResponse {
                    name: name.clone(),
                    response,
                },
            }
        }
    }
}

/// Parse one server-sent-events frame into a response chunk.
///
/// Returns `Ok(None)` for frames without a `data:` payload.
fn parse_sse_frame(frame: &str) -> Result<Option<LlmResponse>, LlmError> {
    let data: String = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n");

    if data.is_empty() {
        return Ok(None);
    }

    let chunk: GeminiResponse = serde_json::from_str(&data)
        .map_err(|e| LlmError::unknown(format!("Failed to parse stream chunk: {e} - data: {data}")))?;
    GeminiService::normalize_response(chunk, false).map(Some)
}

/// Split a byte stream into SSE frames separated by a blank line
fn sse_frames(
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
) -> BoxStream<'static, Result<LlmResponse, LlmError>> {
    futures::stream::unfold((bytes, Vec::<u8>::new(), false), |(mut bytes, mut buf, done)| async move {
        if done {
            return None;
        }
        loop {
            if let Some(pos) = buf.windows(2).position(|w| w == b"\n\n") {
                let frame: Vec<u8> = buf.drain(..pos + 2).collect();
                let text = String::from_utf8_lossy(&frame).into_owned();
                return Some((parse_sse_frame(&text), (bytes, buf, false)));
            }
            match bytes.next().await {
                Some(Ok(chunk)) => {
                    buf.extend(chunk.into_iter().filter(|b| *b != b'\r'));
                }
                Some(Err(e)) => {
                    let err = LlmError::network(format!("Stream interrupted: {e}"));
                    return Some((Err(err), (bytes, buf, true)));
                }
                None => {
                    if buf.iter().all(u8::is_ascii_whitespace) {
                        return None;
                    }
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    buf.clear();
                    return Some((parse_sse_frame(&text), (bytes, buf, true)));
                }
            }
        }
    })
    .filter_map(|frame| async move { frame.transpose() })
    .boxed()
}

#[async_trait]
impl LlmService for GeminiService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let gemini_request = Self::translate_request(request);
        let response = self
            .post(&self.endpoint("generateContent"), &gemini_request)
            .await?;

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        let gemini_response: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Self::normalize_response(gemini_response, true)
    }

    async fn complete_stream(&self, request: &LlmRequest) -> Result<LlmStream, LlmError> {
        let gemini_request = Self::translate_request(request);
        let response = self
            .post(&self.endpoint("streamGenerateContent?alt=sse"), &gemini_request)
            .await?;

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();
        Ok(sse_frames(bytes))
    }

    fn model_id(&self) -> &str {
        self.model.model_id()
    }

    fn context_window(&self) -> usize {
        self.model.context_window()
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiBlob,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
    /// Thought signatures and other parts we do not interpret
    Other(Value),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
