//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::chat::Attachment;
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmStream, ModelRegistry, ToolDefinition};
use crate::state_machine::ToolCall;
use crate::tools::{ToolOutcome, ToolRegistry};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Largest attachment forwarded inline
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 20 * 1024 * 1024;

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete an LLM request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Complete an LLM request in chunk-delivery mode
    async fn complete_stream(&self, request: &LlmRequest) -> Result<LlmStream, LlmError> {
        let response = self.complete(request).await?;
        Ok(futures::stream::once(async move { Ok(response) }).boxed())
    }

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Executor for tools
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Validate and run a call. Never fails; problems are reported in the outcome.
    async fn dispatch(&self, call: &ToolCall) -> ToolOutcome;

    /// Status line shown before the call runs
    fn status_line(&self, _call: &ToolCall) -> Option<String> {
        None
    }

    /// Get tool definitions for LLM
    fn definitions(&self) -> Vec<ToolDefinition>;
}

/// Bytes of an attachment plus the MIME type the resolver could determine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub data: Vec<u8>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Attachment not found: {reference}")]
    NotFound { reference: String },
    #[error("Attachment {reference} is {size} bytes, limit is {limit}")]
    TooLarge {
        reference: String,
        size: u64,
        limit: u64,
    },
    #[error("Failed to read attachment {reference}: {source}")]
    Io {
        reference: String,
        #[source]
        source: std::io::Error,
    },
}

/// Turns attachment references into bytes
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    async fn resolve(&self, attachment: &Attachment) -> Result<Resource, ResolveError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    async fn complete_stream(&self, request: &LlmRequest) -> Result<LlmStream, LlmError> {
        (**self).complete_stream(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn dispatch(&self, call: &ToolCall) -> ToolOutcome {
        (**self).dispatch(call).await
    }

    fn status_line(&self, call: &ToolCall) -> Option<String> {
        (**self).status_line(call)
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        (**self).definitions()
    }
}

#[async_trait]
impl<T: ResourceResolver + ?Sized> ResourceResolver for Arc<T> {
    async fn resolve(&self, attachment: &Attachment) -> Result<Resource, ResolveError> {
        (**self).resolve(attachment).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use ModelRegistry as LlmClient
pub struct RegistryLlmClient {
    registry: Arc<ModelRegistry>,
    model_id: String,
}

impl RegistryLlmClient {
    pub fn new(registry: Arc<ModelRegistry>, model_id: String) -> Self {
        Self { registry, model_id }
    }

    fn service(&self) -> Result<Arc<dyn crate::llm::LlmService>, LlmError> {
        self.registry
            .get(&self.model_id)
            .or_else(|| self.registry.default_service())
            .ok_or_else(|| LlmError::auth("No model available; set GEMINI_API_KEY or LLM_GATEWAY"))
    }
}

#[async_trait]
impl LlmClient for RegistryLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.service()?.complete(request).await
    }

    async fn complete_stream(&self, request: &LlmRequest) -> Result<LlmStream, LlmError> {
        self.service()?.complete_stream(request).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn dispatch(&self, call: &ToolCall) -> ToolOutcome {
        ToolRegistry::dispatch(self, call).await
    }

    fn status_line(&self, call: &ToolCall) -> Option<String> {
        ToolRegistry::status_line(self, call)
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        ToolRegistry::definitions(self)
    }
}

/// Resolves attachment references as local file paths
#[derive(Debug, Clone)]
pub struct FsResolver {
    max_bytes: u64,
}

impl Default for FsResolver {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }
}

impl FsResolver {
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

/// MIME type from the file name's extension, then the caller's hint
fn guess_mime_type(attachment: &Attachment) -> Option<String> {
    let name = attachment.file_name.as_deref().unwrap_or(&attachment.reference);
    mime_guess::from_path(Path::new(name))
        .first()
        .map(|m| m.essence_str().to_string())
        .or_else(|| attachment.mime_type.clone())
}

#[async_trait]
impl ResourceResolver for FsResolver {
    async fn resolve(&self, attachment: &Attachment) -> Result<Resource, ResolveError> {
        let reference = &attachment.reference;
        let io_error = |source: std::io::Error| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ResolveError::NotFound {
                    reference: reference.clone(),
                }
            } else {
                ResolveError::Io {
                    reference: reference.clone(),
                    source,
                }
            }
        };

        let metadata = tokio::fs::metadata(reference).await.map_err(io_error)?;
        if metadata.len() > self.max_bytes {
            return Err(ResolveError::TooLarge {
                reference: reference.clone(),
                size: metadata.len(),
                limit: self.max_bytes,
            });
        }

        let data = tokio::fs::read(reference).await.map_err(io_error)?;
        Ok(Resource {
            data,
            mime_type: guess_mime_type(attachment),
        })
    }
}
