//! Pure state transition function
//!
//! No I/O happens here. Persistence, dispatch and model calls are requested
//! as [`Effect`]s and their results come back as [`Event`]s.

use super::state::{Termination, ToolCall};
use super::{ConvContext, ConvState, Effect, Event, StreamEvent};
use crate::commands::{self, Command, CommandOutcome};
use crate::llm::{self, ContentBlock};
use crate::reply;
use serde_json::json;
use thiserror::Error;

/// Assistant message recorded when a direct command fails recoverably
const FALLBACK_REPLY: &str =
    "<response>That lookup didn't work directly, let me try another way.</response>";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
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

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

fn terminated(termination: Termination) -> ConvState {
    ConvState::Terminated { termination }
}

/// Input plus structured outcome, persisted as one user message
fn direct_record(input: &str, command: Option<&Command>, outcome: &CommandOutcome) -> Effect {
    let record = json!({
        "command": command.map(Command::tool_name),
        "outcome": outcome.to_value(),
    });
    Effect::append_user(vec![
        ContentBlock::text(input),
        ContentBlock::text(record.to_string()),
    ])
}

/// Pure transition function
pub fn transition(
    state: &ConvState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Run start
        // ============================================================

        // Idle + slash command -> DirectDispatch, or answer a parse failure
        (ConvState::Idle, Event::UserInput { text }) if commands::is_direct(&text) => {
            match commands::parse_direct(&text) {
                Ok(command) => Ok(TransitionResult::new(ConvState::DirectDispatch {
                    input: text,
                    command: command.clone(),
                })
                .with_effect(Effect::RunDirect { command })),
                Err(e) => {
                    let outcome =
                        CommandOutcome::failure(format!("{e}. Type /help to list commands."));
                    Ok(TransitionResult::new(terminated(Termination::Completed))
                        .with_effect(direct_record(&text, None, &outcome))
                        .with_effect(Effect::Stream(StreamEvent::from_outcome(&outcome))))
                }
            }
        }

        // Idle + free text -> ModelTurn
        (ConvState::Idle, Event::UserInput { text }) => {
            Ok(TransitionResult::new(ConvState::ModelTurn { turn: 1 })
                .with_effect(Effect::append_user(vec![ContentBlock::text(text)]))
                .with_effect(Effect::RequestModel { turn: 1 }))
        }

        // ============================================================
        // Direct commands
        // ============================================================

        // Answered, or failed for good -> Terminated
        (ConvState::DirectDispatch { input, command }, Event::DirectOutcome { outcome })
            if !outcome.is_recoverable() =>
        {
            Ok(TransitionResult::new(terminated(Termination::Completed))
                .with_effect(direct_record(input, Some(command), &outcome))
                .with_effect(Effect::Stream(StreamEvent::from_outcome(&outcome))))
        }

        // Recoverable failure -> hand over to the model
        (ConvState::DirectDispatch { input, command }, Event::DirectOutcome { outcome }) => {
            let fallback = ContentBlock::text(FALLBACK_REPLY);
            let message = reply::extract(std::slice::from_ref(&fallback));
            Ok(TransitionResult::new(ConvState::ModelTurn { turn: 1 }).with_effects([
                direct_record(input, Some(command), &outcome),
                Effect::append_assistant(vec![fallback]),
                Effect::Stream(StreamEvent::partial(
                    message,
                    json!({
                        "turn": 0,
                        "turns_remaining": context.max_turns,
                        "fallback": true,
                    }),
                )),
                Effect::RequestModel { turn: 1 },
            ]))
        }

        // ============================================================
        // Model turns
        // ============================================================
        (ConvState::ModelTurn { turn }, Event::ModelResponse { content }) => {
            let turn = *turn;
            let mut blocks = reply::normalize_blocks(content);
            if reply::find_reply(&blocks).is_none() {
                blocks.push(reply::processing_block());
            }
            let reply = reply::extract(&blocks);
            let mut calls: Vec<ToolCall> = llm::tool_uses(&blocks)
                .into_iter()
                .map(|(id, name, input)| ToolCall::from_tool_use(id, name, input))
                .collect();

            let persist = Effect::append_assistant(blocks);

            if calls.is_empty() {
                return Ok(TransitionResult::new(terminated(Termination::Completed))
                    .with_effect(persist)
                    .with_effect(Effect::Stream(StreamEvent::complete(reply, None))));
            }

            let current = calls.remove(0);
            Ok(TransitionResult::new(ConvState::ToolExecuting {
                turn,
                current: current.clone(),
                remaining: calls,
                outcomes: Vec::new(),
                reply: reply.clone(),
            })
            .with_effects([
                persist,
                Effect::Stream(StreamEvent::partial(
                    reply,
                    json!({
                        "turn": turn,
                        "turns_remaining": context.turns_remaining(turn),
                    }),
                )),
                Effect::ExecuteCommand { call: current },
            ]))
        }

        (ConvState::ModelTurn { .. }, Event::ModelError { error }) => {
            Ok(TransitionResult::new(terminated(Termination::Failed))
                .with_effect(Effect::Stream(StreamEvent::error(error.user_message()))))
        }

        // ============================================================
        // Tool execution
        // ============================================================
        (
            ConvState::ToolExecuting {
                turn,
                current,
                remaining,
                outcomes,
                reply,
            },
            Event::CommandComplete {
                tool_use_id,
                outcome,
            },
        ) => {
            if tool_use_id != current.id {
                return Err(TransitionError::InvalidTransition(format!(
                    "outcome for {tool_use_id} while waiting on {}",
                    current.id
                )));
            }

            let mut outcomes = outcomes.clone();
            outcomes.push(outcome.to_tool_result(&tool_use_id));

            // More invocations from this turn
            if let Some((next, rest)) = remaining.split_first() {
                return Ok(TransitionResult::new(ConvState::ToolExecuting {
                    turn: *turn,
                    current: next.clone(),
                    remaining: rest.to_vec(),
                    outcomes,
                    reply: reply.clone(),
                })
                .with_effect(Effect::ExecuteCommand { call: next.clone() }));
            }

            // Every invocation answered: persist the batch as one message
            let persist = Effect::append_user(outcomes);

            if *turn >= context.max_turns {
                return Ok(TransitionResult::new(terminated(Termination::TurnLimit))
                    .with_effect(persist)
                    .with_effect(Effect::Stream(StreamEvent::complete(
                        reply.clone(),
                        Some(json!({ "turn_limit_reached": true, "turn": turn })),
                    ))));
            }

            let next_turn = turn + 1;
            Ok(TransitionResult::new(ConvState::ModelTurn { turn: next_turn })
                .with_effect(persist)
                .with_effect(Effect::RequestModel { turn: next_turn }))
        }

        // ============================================================
        // Cancellation
        // ============================================================
        (state, Event::Cancelled) if !state.is_terminal() => {
            Ok(TransitionResult::new(terminated(Termination::Cancelled)))
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}
