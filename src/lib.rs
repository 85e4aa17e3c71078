//! Cognifix - persona-routed multimodal assistant
//!
//! Each turn is classified into a persona, sent to Gemini with that
//! persona's instructions, and driven through sequential tool rounds by a
//! pure state machine while progress is streamed to the caller.

pub mod chat;
pub mod intent;
pub mod llm;
pub mod progress;
pub mod runtime;
pub mod session;
pub mod state_machine;
pub mod tools;

pub use chat::{Attachment, ChatItem, ConversationHistory, HistoryEntry, Role, SEED_GREETING};
pub use intent::{classify, Persona};
pub use progress::{channel, ProgressEmitter, ProgressEvent, ProgressStream};
pub use runtime::{FsResolver, RegistryLlmClient, TurnError};
pub use session::{ConversationSession, SessionConfig};
pub use tools::{ToolConfig, ToolRegistry};
