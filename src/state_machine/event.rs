//! Events that drive a turn

use crate::chat::ChatItem;
use crate::state_machine::state::ToolCall;
use crate::tools::ToolOutcome;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserTurn {
        items: Vec<ChatItem>,
    },

    // Model events
    ModelReplied {
        /// Text of the reply, if it had any
        text: Option<String>,
        /// Function calls carried by the reply, in received order
        calls: Vec<ToolCall>,
    },
    ModelFailed {
        message: String,
    },

    // Tool events
    ToolFinished {
        outcome: ToolOutcome,
    },
}

impl Event {
    /// Plain text reply with no calls
    pub fn reply(text: impl Into<String>) -> Self {
        Event::ModelReplied {
            text: Some(text.into()),
            calls: vec![],
        }
    }
}
