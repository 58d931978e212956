//! Property-based tests for the state machine
//!
//! A run is driven to completion against generated model responses, with
//! every command succeeding immediately.

use super::*;
use crate::commands::CommandOutcome;
use crate::llm::{ContentBlock, MessageRole};
use proptest::prelude::*;
use serde_json::json;
use std::collections::VecDeque;

const TOOL_NAMES: [&str; 4] = ["status_command", "doc_id_command", "docs_command", "no_such_tool"];

/// One scripted model response: optional prose plus tool names
fn arb_response() -> impl Strategy<Value = (Option<String>, Vec<usize>)> {
    (
        proptest::option::of("[a-zA-Z ]{1,20}"),
        proptest::collection::vec(0..TOOL_NAMES.len(), 0..4),
    )
}

fn build_response(index: usize, prose: Option<&String>, tools: &[usize]) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    if let Some(text) = prose {
        blocks.push(ContentBlock::text(format!("<response>{text}")));
    }
    for (n, tool) in tools.iter().enumerate() {
        blocks.push(ContentBlock::tool_use(
            format!("call-{index}-{n}"),
            TOOL_NAMES[*tool],
            json!({"doc_id": "d1", "doc_type": "project"}),
        ));
    }
    blocks
}

struct Trace {
    appends: Vec<(MessageRole, Vec<ContentBlock>)>,
    model_requests: u32,
    final_state: ConvState,
    streams: Vec<StreamEvent>,
}

fn drive(max_turns: u32, script: &[(Option<String>, Vec<usize>)]) -> Trace {
    let ctx = ConvContext::new("prop", max_turns);
    let mut state = ConvState::Idle;
    let mut responses = script.iter().enumerate();
    let mut pending = VecDeque::from([Event::UserInput {
        text: "hello".to_string(),
    }]);
    let mut trace = Trace {
        appends: Vec::new(),
        model_requests: 0,
        final_state: ConvState::Idle,
        streams: Vec::new(),
    };

    while let Some(event) = pending.pop_front() {
        let result = transition(&state, &ctx, event).expect("valid transition");
        state = result.new_state;
        for effect in result.effects {
            match effect {
                Effect::AppendMessage { role, blocks } => trace.appends.push((role, blocks)),
                Effect::RequestModel { .. } => {
                    trace.model_requests += 1;
                    let content = match responses.next() {
                        Some((i, (prose, tools))) => build_response(i, prose.as_ref(), tools),
                        None => vec![ContentBlock::text("<response>done</response>")],
                    };
                    pending.push_back(Event::ModelResponse { content });
                }
                Effect::ExecuteCommand { call } => pending.push_back(Event::CommandComplete {
                    tool_use_id: call.id,
                    outcome: CommandOutcome::success("ok", None),
                }),
                Effect::Stream(ev) => trace.streams.push(ev),
                Effect::RunDirect { .. } => unreachable!("free text never dispatches directly"),
            }
        }
    }

    trace.final_state = state;
    trace
}

fn tool_use_ids(blocks: &[ContentBlock]) -> Vec<String> {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::ToolUse { id, .. } => Some(id.clone()),
            _ => None,
        })
        .collect()
}

fn tool_result_ids(blocks: &[ContentBlock]) -> Vec<String> {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.clone()),
            _ => None,
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Every assistant message with invocations is followed by exactly one
    /// user message answering them, in order, and holding nothing else.
    #[test]
    fn prop_invocations_paired_in_one_batch(
        max_turns in 1u32..6,
        script in proptest::collection::vec(arb_response(), 0..8),
    ) {
        let trace = drive(max_turns, &script);

        for (i, (role, blocks)) in trace.appends.iter().enumerate() {
            if *role != MessageRole::Assistant {
                continue;
            }
            let uses = tool_use_ids(blocks);
            if uses.is_empty() {
                continue;
            }
            let (next_role, next_blocks) = &trace.appends[i + 1];
            prop_assert_eq!(*next_role, MessageRole::User);
            prop_assert!(next_blocks.iter().all(ContentBlock::is_tool_result));
            prop_assert_eq!(tool_result_ids(next_blocks), uses);
        }
    }

    #[test]
    fn prop_model_calls_bounded(
        max_turns in 1u32..6,
        script in proptest::collection::vec(arb_response(), 0..10),
    ) {
        let trace = drive(max_turns, &script);
        prop_assert!(trace.model_requests <= max_turns);
        prop_assert!(trace.final_state.is_terminal());
        prop_assert!(matches!(
            trace.final_state.termination(),
            Some(Termination::Completed | Termination::TurnLimit)
        ));
    }

    /// Each run ends with exactly one final stream event, and it is the last
    #[test]
    fn prop_single_final_event(
        max_turns in 1u32..6,
        script in proptest::collection::vec(arb_response(), 0..8),
    ) {
        let trace = drive(max_turns, &script);
        let finals = trace.streams.iter().filter(|e| e.is_final()).count();
        prop_assert_eq!(finals, 1);
        prop_assert!(trace.streams.last().is_some_and(StreamEvent::is_final));
    }

    /// Every persisted assistant message carries a balanced reply
    #[test]
    fn prop_assistant_messages_have_reply(
        script in proptest::collection::vec(arb_response(), 0..6),
    ) {
        let trace = drive(12, &script);
        for (role, blocks) in &trace.appends {
            if *role == MessageRole::Assistant {
                prop_assert!(crate::reply::find_reply(blocks).is_some());
            }
        }
    }

    #[test]
    fn prop_cancel_stops_any_live_state(turn in 1u32..12) {
        let ctx = ConvContext::new("prop", 12);
        let result = transition(&ConvState::ModelTurn { turn }, &ctx, Event::Cancelled).unwrap();
        prop_assert!(result.effects.is_empty());
        prop_assert_eq!(result.new_state.termination(), Some(Termination::Cancelled));
    }
}
