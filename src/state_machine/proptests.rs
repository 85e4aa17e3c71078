//! Property-based tests for the turn state machine
//!
//! A scripted driver feeds model replies and tool outcomes through
//! `transition` until the turn ends, then checks whole-turn invariants.

use super::transition::*;
use super::*;
use crate::chat::ChatItem;
use crate::intent::classify;
use crate::progress::ProgressEvent;
use crate::tools::{ToolOutcome, ToolResult};
use proptest::prelude::*;
use serde_json::json;
use std::collections::VecDeque;

// ============================================================================
// Scripted driver
// ============================================================================

#[derive(Debug, Default)]
struct Trace {
    effects: Vec<Effect>,
    final_state: TurnState,
    max_round: u32,
}

impl Trace {
    fn progress(&self) -> Vec<&ProgressEvent> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Emit(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    fn invoked(&self) -> Vec<&ToolCall> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::InvokeTool(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Effect) -> bool) -> usize {
        self.effects.iter().filter(|e| pred(e)).count()
    }
}

/// Run one turn. `script[i]` holds the calls carried by the i-th model reply;
/// replies past the end of the script carry none. `fail_at` makes that
/// exchange fail instead.
fn drive(
    items: Vec<ChatItem>,
    context: &TurnContext,
    script: &[Vec<ToolCall>],
    outcomes: &[u8],
    fail_at: Option<usize>,
) -> Trace {
    let mut trace = Trace::default();
    let mut state = TurnState::Idle;
    let mut pending = VecDeque::from([Event::UserTurn { items }]);
    let mut exchanges = 0usize;
    let mut dispatched = 0usize;

    while let Some(event) = pending.pop_front() {
        let result = transition(&state, context, event).unwrap();
        state = result.new_state;
        if let TurnState::DispatchingTools { round, .. } = &state {
            trace.max_round = trace.max_round.max(*round);
        }

        for effect in result.effects {
            match &effect {
                Effect::RequestModel(_) => {
                    if fail_at == Some(exchanges) {
                        pending.push_back(Event::ModelFailed {
                            message: "boom".to_string(),
                        });
                    } else {
                        pending.push_back(Event::ModelReplied {
                            text: Some(format!("reply {exchanges}")),
                            calls: script.get(exchanges).cloned().unwrap_or_default(),
                        });
                    }
                    exchanges += 1;
                }
                Effect::InvokeTool(call) => {
                    let kind = outcomes.get(dispatched).copied().unwrap_or(0);
                    dispatched += 1;
                    pending.push_back(Event::ToolFinished {
                        outcome: outcome_for(call, kind),
                    });
                }
                Effect::Emit(_) | Effect::CommitTurn { .. } => {}
            }
            trace.effects.push(effect);
        }
    }

    trace.final_state = state;
    trace
}

fn outcome_for(call: &ToolCall, kind: u8) -> ToolOutcome {
    match kind % 4 {
        0 => ToolOutcome::Completed(ToolResult::success(&call.name, json!({"ok": true}))),
        1 => ToolOutcome::Completed(ToolResult::error(&call.name, "HTTP 500 from upstream")),
        2 => ToolOutcome::UnknownTool,
        _ => ToolOutcome::MissingArgument {
            argument: "query".to_string(),
        },
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_tool_call() -> impl Strategy<Value = ToolCall> {
    (
        prop_oneof![
            Just("getCoordinates"),
            Just("fetchWeather"),
            Just("fetchStockData"),
            Just("fetchWebSearchResults"),
            Just("launchRocket"),
        ],
        "[a-z]{0,8}",
    )
        .prop_map(|(name, arg)| ToolCall::from_parts(name, json!({ "query": arg })))
}

fn arb_script() -> impl Strategy<Value = Vec<Vec<ToolCall>>> {
    proptest::collection::vec(proptest::collection::vec(arb_tool_call(), 0..4), 0..8)
}

fn arb_items() -> impl Strategy<Value = Vec<ChatItem>> {
    prop_oneof![
        Just(vec![]),
        "[a-z ]{0,40}".prop_map(|s| vec![ChatItem::text(s)]),
        Just(vec![ChatItem::text("weather forecast for Paris")]),
        Just(vec![ChatItem::text("stock of apple and the exchange rate")]),
    ]
}

fn arb_context() -> impl Strategy<Value = TurnContext> {
    (0u32..7).prop_map(|max_tool_rounds| TurnContext { max_tool_rounds })
}

fn arb_outcomes() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..32)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Exactly one terminal event, and nothing after it
    #[test]
    fn prop_single_terminal_event_last(
        items in arb_items(),
        context in arb_context(),
        script in arb_script(),
        outcomes in arb_outcomes(),
        fail_at in proptest::option::of(0usize..12),
    ) {
        let trace = drive(items, &context, &script, &outcomes, fail_at);
        let progress = trace.progress();
        let terminal = progress.iter().filter(|e| e.is_terminal()).count();
        prop_assert_eq!(terminal, 1);
        prop_assert!(progress.last().is_some_and(|e| e.is_terminal()));
        prop_assert!(trace.final_state.is_terminal());
    }

    // Detection comes first and matches the classifier
    #[test]
    fn prop_detected_first(items in arb_items(), script in arb_script()) {
        let expected = classify(&items);
        let trace = drive(items, &TurnContext::default(), &script, &[], None);
        prop_assert_eq!(
            trace.progress().first().copied(),
            Some(&ProgressEvent::Detected { persona: expected })
        );
    }

    // History is written once on success and never on failure
    #[test]
    fn prop_commit_only_on_success(
        context in arb_context(),
        script in arb_script(),
        fail_at in proptest::option::of(0usize..12),
    ) {
        let trace = drive(vec![ChatItem::text("hi")], &context, &script, &[], fail_at);
        let commits = trace.count(|e| matches!(e, Effect::CommitTurn { .. }));
        let done = matches!(trace.final_state, TurnState::Done { .. });
        prop_assert_eq!(commits, usize::from(done));
    }

    // The round bound is never exceeded
    #[test]
    fn prop_rounds_bounded(context in arb_context(), script in arb_script()) {
        let trace = drive(vec![], &context, &script, &[], None);
        prop_assert!(trace.max_round <= context.max_tool_rounds);
    }

    // Every dispatched call sends exactly one result back to the model
    #[test]
    fn prop_one_exchange_per_call(
        context in arb_context(),
        script in arb_script(),
        outcomes in arb_outcomes(),
        fail_at in proptest::option::of(0usize..12),
    ) {
        let trace = drive(vec![], &context, &script, &outcomes, fail_at);
        let results = trace.count(|e| matches!(e, Effect::RequestModel(Exchange::FunctionResult(_))));
        prop_assert_eq!(results, trace.invoked().len());
    }

    // Synthesis happens exactly when a completed turn ran tools
    #[test]
    fn prop_synthesis_iff_tools(context in arb_context(), script in arb_script()) {
        let trace = drive(vec![], &context, &script, &[], None);
        let synthesis = trace.count(|e| matches!(e, Effect::RequestModel(Exchange::Synthesis)));
        prop_assert_eq!(synthesis, usize::from(!trace.invoked().is_empty()));
    }

    // The first round runs the initial reply's calls in received order
    #[test]
    fn prop_first_round_in_order(
        script in arb_script(),
        outcomes in arb_outcomes(),
    ) {
        let trace = drive(vec![], &TurnContext::default(), &script, &outcomes, None);
        let first_round = script.first().cloned().unwrap_or_default();
        let invoked: Vec<ToolCall> = trace.invoked().into_iter().cloned().collect();
        prop_assert!(invoked.len() >= first_round.len());
        prop_assert_eq!(&invoked[..first_round.len()], &first_round[..]);
    }

    // Only the initial exchange carries the turn's items
    #[test]
    fn prop_single_initial_exchange(items in arb_items(), script in arb_script()) {
        let trace = drive(items, &TurnContext::default(), &script, &[], None);
        let initial = trace.count(|e| matches!(e, Effect::RequestModel(Exchange::Initial { .. })));
        prop_assert_eq!(initial, 1);
    }

    // Unknown tools and missing arguments always get a notice
    #[test]
    fn prop_failed_dispatch_gets_notice(script in arb_script(), outcomes in arb_outcomes()) {
        let trace = drive(vec![], &TurnContext::default(), &script, &outcomes, None);
        let dispatched = trace.invoked().len();
        let expected = outcomes
            .iter()
            .chain(std::iter::repeat(&0))
            .take(dispatched)
            .filter(|k| *k % 4 >= 2)
            .count();
        let notices = trace
            .progress()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Status { message } if message.starts_with("⚠️")))
            .count();
        prop_assert_eq!(notices, expected);
    }
}

#[test]
fn test_weather_turn_end_to_end() {
    let script = vec![
        vec![ToolCall::from_parts("getCoordinates", json!({"city": "Paris"}))],
        vec![ToolCall::from_parts(
            "fetchWeather",
            json!({"lat": 48.85, "lon": 2.35}),
        )],
    ];
    let trace = drive(
        vec![ChatItem::text("what's the weather forecast for Paris")],
        &TurnContext::default(),
        &script,
        &[],
        None,
    );

    let wire: Vec<String> = trace.progress().iter().map(|e| e.to_wire()).collect();
    assert_eq!(
        wire,
        vec![
            "🤖 Detected Weather agent...",
            "⚙️ Weather agent invoking getCoordinates…",
            "⚙️ Weather agent invoking fetchWeather…",
            SYNTHESIS_STATUS,
            "✅ Weather agent finished reasoning.",
            "reply 3",
        ]
    );
    assert_eq!(trace.max_round, 2);
}
