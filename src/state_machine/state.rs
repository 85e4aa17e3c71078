//! Turn state types

use crate::intent::Persona;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default bound on tool rounds per turn
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 5;

/// A structured call the model asked for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Build from raw function-call parts; non-object arguments become empty
    pub fn from_parts(name: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(name, args)
    }
}

/// Per-turn configuration read by the transition function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnContext {
    /// Upper bound on tool rounds; a reply that would start one more round
    /// goes straight to synthesis instead
    pub max_tool_rounds: u32,
}

impl Default for TurnContext {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

/// Where a turn is in its lifecycle.
///
/// A turn walks `Idle -> AwaitingModel -> (DispatchingTools ->
/// AwaitingToolReply)* -> Finalizing -> Done`, with `Failed` reachable from
/// any state that has a model exchange outstanding.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TurnState {
    /// No turn submitted yet
    #[default]
    Idle,

    /// Initial exchange sent, waiting for the model
    AwaitingModel { persona: Persona },

    /// A tool call is running
    DispatchingTools {
        persona: Persona,
        current: ToolCall,
        /// Calls of this round still to run, in received order
        remaining: Vec<ToolCall>,
        /// 1-based index of the current round
        round: u32,
    },

    /// A tool result was sent, waiting for the model's reply to it
    AwaitingToolReply {
        persona: Persona,
        remaining: Vec<ToolCall>,
        round: u32,
    },

    /// Synthesis exchange sent after at least one tool round
    Finalizing { persona: Persona },

    /// Turn completed with an answer
    Done { answer: String },

    /// Turn ended by a model exchange failure
    Failed { message: String },
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done { .. } | TurnState::Failed { .. })
    }

    /// Whether a model exchange is outstanding in this state
    pub fn awaits_model(&self) -> bool {
        matches!(
            self,
            TurnState::AwaitingModel { .. }
                | TurnState::AwaitingToolReply { .. }
                | TurnState::Finalizing { .. }
        )
    }

    pub fn persona(&self) -> Option<Persona> {
        match self {
            TurnState::AwaitingModel { persona }
            | TurnState::DispatchingTools { persona, .. }
            | TurnState::AwaitingToolReply { persona, .. }
            | TurnState::Finalizing { persona } => Some(*persona),
            TurnState::Idle | TurnState::Done { .. } | TurnState::Failed { .. } => None,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::AwaitingModel { .. } => "awaiting_model",
            TurnState::DispatchingTools { .. } => "dispatching_tools",
            TurnState::AwaitingToolReply { .. } => "awaiting_tool_reply",
            TurnState::Finalizing { .. } => "finalizing",
            TurnState::Done { .. } => "done",
            TurnState::Failed { .. } => "failed",
        }
    }
}
