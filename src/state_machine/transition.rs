//! Pure state transition function

use super::{Effect, Event, Exchange, ToolCall, TurnContext, TurnState};
use crate::intent::{classify, Persona};
use crate::progress::ProgressEvent;
use crate::tools::{ToolOutcome, ToolResult};
use thiserror::Error;

/// Used when the model's final reply has no usable text
pub const NO_RESPONSE: &str = "No response from model.";

pub const SYNTHESIS_STATUS: &str = "🧩 Composing final summary from fetched data…";

pub const ROUND_LIMIT_STATUS: &str = "⏱️ Tool round limit reached, answering with the data gathered so far.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("A turn is already in progress")]
    TurnInProgress,
    #[error("Turn already finished")]
    TurnFinished,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function.
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(
    state: &TurnState,
    context: &TurnContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Classify and send the initial exchange
        (TurnState::Idle, Event::UserTurn { items }) => {
            let persona = classify(&items);
            Ok(TransitionResult::new(TurnState::AwaitingModel { persona })
                .with_effect(Effect::Emit(ProgressEvent::Detected { persona }))
                .with_effect(Effect::RequestModel(Exchange::Initial { persona, items })))
        }

        (state, Event::UserTurn { .. }) if state.is_terminal() => {
            Err(TransitionError::TurnFinished)
        }
        (_, Event::UserTurn { .. }) => Err(TransitionError::TurnInProgress),

        // Reply to the initial exchange: answer directly or start round 1
        (TurnState::AwaitingModel { persona }, Event::ModelReplied { text, calls }) => {
            if calls.is_empty() {
                Ok(finish(*persona, text))
            } else {
                Ok(start_round(*persona, calls, 1, text, context))
            }
        }

        // A call finished: hand its result to the model
        (
            TurnState::DispatchingTools {
                persona,
                current,
                remaining,
                round,
            },
            Event::ToolFinished { outcome },
        ) => {
            let (result, notice) = resolve_outcome(current, outcome);
            Ok(TransitionResult::new(TurnState::AwaitingToolReply {
                persona: *persona,
                remaining: remaining.clone(),
                round: *round,
            })
            .with_effects(notice.map(Effect::status))
            .with_effect(Effect::RequestModel(Exchange::FunctionResult(result))))
        }

        // Reply to a tool result
        (
            TurnState::AwaitingToolReply {
                persona,
                remaining,
                round,
            },
            Event::ModelReplied { text, calls },
        ) => {
            // More calls queued in this round: calls carried by this reply are ignored
            if let Some((next, rest)) = remaining.split_first() {
                return Ok(dispatch(*persona, next.clone(), rest.to_vec(), *round));
            }

            // The reply to the round's last result decides what follows
            if calls.is_empty() {
                Ok(synthesize(*persona))
            } else {
                Ok(start_round(*persona, calls, round + 1, text, context))
            }
        }

        (TurnState::Finalizing { persona }, Event::ModelReplied { text, .. }) => {
            Ok(finish(*persona, text))
        }

        // Any failed exchange ends the turn
        (state, Event::ModelFailed { message }) if state.awaits_model() => {
            Ok(TransitionResult::new(TurnState::Failed {
                message: message.clone(),
            })
            .with_effect(Effect::Emit(ProgressEvent::Error { message })))
        }

        (state, _) if state.is_terminal() => Err(TransitionError::TurnFinished),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} cannot handle {event:?}",
            state.name()
        ))),
    }
}

/// Begin tool round `round`, or finalize if that would exceed the bound
fn start_round(
    persona: Persona,
    calls: Vec<ToolCall>,
    round: u32,
    text: Option<String>,
    context: &TurnContext,
) -> TransitionResult {
    if round > context.max_tool_rounds {
        let result = if round > 1 {
            synthesize(persona)
        } else {
            finish(persona, text)
        };
        return TransitionResult::new(result.new_state)
            .with_effect(Effect::status(ROUND_LIMIT_STATUS))
            .with_effects(result.effects);
    }

    let mut calls = calls.into_iter();
    match calls.next() {
        Some(first) => dispatch(persona, first, calls.collect(), round),
        None => synthesize(persona),
    }
}

fn dispatch(
    persona: Persona,
    current: ToolCall,
    remaining: Vec<ToolCall>,
    round: u32,
) -> TransitionResult {
    let effects = Effect::invoke(persona, current.clone());
    TransitionResult::new(TurnState::DispatchingTools {
        persona,
        current,
        remaining,
        round,
    })
    .with_effects(effects)
}

fn synthesize(persona: Persona) -> TransitionResult {
    TransitionResult::new(TurnState::Finalizing { persona })
        .with_effect(Effect::status(SYNTHESIS_STATUS))
        .with_effect(Effect::RequestModel(Exchange::Synthesis))
}

/// Commit the answer, then announce completion and the answer itself
fn finish(persona: Persona, text: Option<String>) -> TransitionResult {
    let answer = answer_text(text);
    TransitionResult::new(TurnState::Done {
        answer: answer.clone(),
    })
    .with_effect(Effect::CommitTurn {
        answer: answer.clone(),
    })
    .with_effect(Effect::Emit(ProgressEvent::Completed { persona }))
    .with_effect(Effect::Emit(ProgressEvent::Final { text: answer }))
}

fn answer_text(text: Option<String>) -> String {
    text.filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| NO_RESPONSE.to_string())
}

/// The result the model sees for a dispatched call, plus an optional notice
fn resolve_outcome(call: &ToolCall, outcome: ToolOutcome) -> (ToolResult, Option<String>) {
    match outcome {
        ToolOutcome::Completed(result) => (result, None),
        ToolOutcome::UnknownTool => (
            ToolResult::error(&call.name, format!("Unknown tool: {}", call.name)),
            Some(format!("⚠️ Unknown tool {}, skipping.", call.name)),
        ),
        ToolOutcome::MissingArgument { argument } => (
            ToolResult::error(
                &call.name,
                format!("Missing required argument: {argument}"),
            ),
            Some(format!(
                "⚠️ Missing {argument} argument, unable to run {}.",
                call.name
            )),
        ),
    }
}
