//! Effects produced by state transitions

use crate::chat::ChatItem;
use crate::intent::Persona;
use crate::progress::ProgressEvent;
use crate::state_machine::state::ToolCall;
use crate::tools::ToolResult;

/// The message a model exchange carries
#[derive(Debug, Clone, PartialEq)]
pub enum Exchange {
    /// Persona instructions plus the turn's items
    Initial {
        persona: Persona,
        items: Vec<ChatItem>,
    },
    /// One tool result, sent with the function role
    FunctionResult(ToolResult),
    /// Request for a one-paragraph answer from the results so far
    Synthesis,
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Push a progress event to the caller
    Emit(ProgressEvent),

    /// Send one exchange to the model
    RequestModel(Exchange),

    /// Show the call's status line and dispatch it
    InvokeTool(ToolCall),

    /// Append the user entry and the answer to history
    CommitTurn { answer: String },
}

impl Effect {
    pub fn status(message: impl Into<String>) -> Self {
        Effect::Emit(ProgressEvent::status(message))
    }

    /// Announce a call and run it
    pub fn invoke(persona: Persona, call: ToolCall) -> [Self; 2] {
        [
            Effect::Emit(ProgressEvent::ToolInvoked {
                persona,
                tool: call.name.clone(),
            }),
            Effect::InvokeTool(call),
        ]
    }
}
