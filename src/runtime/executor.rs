//! Run executor
//!
//! Drives the pure state machine for one user input: performs each effect,
//! feeds the resulting event back in, and stops at a terminal state.

use super::traits::{CommandExecutor, ModelClient, ThreadStore};
use super::{ProgressSink, RunSummary, RuntimeError};
use crate::commands::{CommandOutcome, Privilege};
use crate::state_machine::{
    transition, ConvContext, ConvState, Effect, Event, StreamEvent, Termination, TransitionError,
};
use tokio_util::sync::CancellationToken;

/// Shown when the thread could not be read or written
const STORE_FAILURE_MESSAGE: &str =
    "Something went wrong saving the conversation. Please try again.";

/// Conversation orchestrator over explicit collaborators
pub struct Orchestrator<S, M, C> {
    store: S,
    model: M,
    commands: C,
    max_turns: u32,
}

/// Bookkeeping for one run
struct Run<'a> {
    context: ConvContext,
    sink: &'a dyn ProgressSink,
    cancel: CancellationToken,
    turns: u32,
}

impl<S, M, C> Orchestrator<S, M, C>
where
    S: ThreadStore,
    M: ModelClient,
    C: CommandExecutor,
{
    pub fn new(store: S, model: M, commands: C, max_turns: u32) -> Self {
        Self {
            store,
            model,
            commands,
            max_turns,
        }
    }

    /// Handle one user input to completion.
    ///
    /// Progress goes to `sink`. The returned summary says how the run ended;
    /// `Err` means the thread could not be persisted.
    pub async fn run(
        &self,
        session_id: &str,
        input: &str,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<RunSummary, RuntimeError> {
        let mut run = Run {
            context: ConvContext::new(session_id, self.max_turns),
            sink,
            cancel,
            turns: 0,
        };
        let mut state = ConvState::Idle;

        tracing::info!(
            session_id,
            direct = crate::commands::is_direct(input),
            "Run started"
        );

        let mut events_to_process = vec![Event::UserInput {
            text: input.to_string(),
        }];

        while let Some(event) = events_to_process.pop() {
            let result = transition(&state, &run.context, event)?;
            state = result.new_state;

            for effect in result.effects {
                if let Effect::RequestModel { turn } = &effect {
                    run.turns = *turn;
                }
                if let Some(generated) = self.execute_effect(&run, effect).await? {
                    events_to_process.push(generated);
                }
            }
        }

        let termination = state.termination().ok_or_else(|| {
            TransitionError::InvalidTransition(format!("run stalled in {state:?}"))
        })?;

        let summary = RunSummary {
            turns: run.turns,
            turns_remaining: run.context.turns_remaining(run.turns),
            termination,
        };

        match termination {
            Termination::TurnLimit => tracing::warn!(
                session_id,
                turns = summary.turns,
                "Turn limit reached, returning best available reply"
            ),
            Termination::Failed => {
                tracing::warn!(session_id, turns = summary.turns, "Run failed");
            }
            Termination::Cancelled => {
                tracing::info!(session_id, turns = summary.turns, "Run cancelled");
            }
            Termination::Completed => {
                tracing::info!(session_id, turns = summary.turns, "Run completed");
            }
        }

        Ok(summary)
    }

    async fn execute_effect(
        &self,
        run: &Run<'_>,
        effect: Effect,
    ) -> Result<Option<Event>, RuntimeError> {
        let session_id = run.context.session_id.as_str();

        match effect {
            Effect::AppendMessage { role, blocks } => {
                match self.store.append(session_id, role, &blocks).await {
                    Ok(message) => {
                        tracing::debug!(
                            session_id,
                            role = %role,
                            sequence_id = message.sequence_id,
                            blocks = blocks.len(),
                            "Message appended"
                        );
                        Ok(None)
                    }
                    Err(e) => {
                        tracing::error!(session_id, error = %e, "Failed to append message");
                        run.sink.emit(StreamEvent::error(STORE_FAILURE_MESSAGE));
                        Err(e.into())
                    }
                }
            }

            Effect::RunDirect { command } => {
                tracing::debug!(session_id, command = command.tool_name(), "Direct command");
                let outcome = tokio::select! {
                    biased;
                    () = run.cancel.cancelled() => return Ok(Some(Event::Cancelled)),
                    outcome = self.commands.execute(&command, Privilege::User) => outcome,
                };
                Ok(Some(Event::DirectOutcome { outcome }))
            }

            Effect::RequestModel { turn } => {
                tracing::info!(
                    session_id,
                    turn,
                    turns_remaining = run.context.turns_remaining(turn),
                    "Model turn"
                );

                let thread = match self.store.list(session_id).await {
                    Ok(thread) => thread,
                    Err(e) => {
                        tracing::error!(session_id, error = %e, "Failed to load thread");
                        run.sink.emit(StreamEvent::error(STORE_FAILURE_MESSAGE));
                        return Err(e.into());
                    }
                };

                let result = tokio::select! {
                    biased;
                    () = run.cancel.cancelled() => return Ok(Some(Event::Cancelled)),
                    result = self.model.exchange(&thread) => result,
                };

                Ok(Some(match result {
                    Ok(reply) => {
                        tracing::debug!(
                            session_id,
                            turn,
                            input_tokens = reply.usage.input_tokens,
                            output_tokens = reply.usage.output_tokens,
                            reply_chars = reply.reply.len(),
                            "Model replied"
                        );
                        Event::ModelResponse {
                            content: reply.content,
                        }
                    }
                    Err(error) => {
                        tracing::warn!(
                            session_id,
                            turn,
                            kind = error.kind.as_str(),
                            error = %error,
                            "Model call failed"
                        );
                        Event::ModelError { error }
                    }
                }))
            }

            Effect::ExecuteCommand { call } => {
                let outcome = match &call.command {
                    Ok(command) => {
                        tracing::debug!(
                            session_id,
                            tool = %call.name,
                            id = %call.id,
                            "Executing command"
                        );
                        tokio::select! {
                            biased;
                            () = run.cancel.cancelled() => return Ok(Some(Event::Cancelled)),
                            outcome = self.commands.execute(command, Privilege::Model) => outcome,
                        }
                    }
                    Err(reason) => {
                        tracing::warn!(
                            session_id,
                            tool = %call.name,
                            id = %call.id,
                            reason = %reason,
                            "Rejected tool invocation"
                        );
                        CommandOutcome::recoverable(format!("Could not run {}.", call.name), reason)
                    }
                };
                Ok(Some(Event::CommandComplete {
                    tool_use_id: call.id,
                    outcome,
                }))
            }

            Effect::Stream(event) => {
                run.sink.emit(event);
                Ok(None)
            }
        }
    }
}
