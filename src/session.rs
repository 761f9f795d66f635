//! One interactive session: conversation plus controller, driven a line at a time.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::bridge::Bridge;
use crate::chat::{ConversationManager, Reply};
use crate::dispatch::{dispatch, DispatchOutcome};
use crate::error::AppError;
use crate::lights::DeviceController;
use crate::llm::CompletionService;
use crate::mission;

/// Word that ends the read loop.
pub const QUIT: &str = "quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input<'a> {
    Quit,
    Empty,
    Prompt(&'a str),
}

/// Classify a raw input line. Only the exact word `quit` ends the session.
pub fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line == QUIT {
        Input::Quit
    } else if line.trim().is_empty() {
        Input::Empty
    } else {
        Input::Prompt(line)
    }
}

/// Everything produced by one prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutput {
    pub reply: Reply,
    pub dispatch: DispatchOutcome,
}

/// Token usage reported when the session ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionSummary {
    pub total_tokens: u64,
    pub cost_usd: f64,
}

/// Why [`Session::run`] stopped reading.
#[derive(Debug)]
pub enum LoopEnd {
    Quit,
    EndOfInput,
    /// Reading the input failed; the session itself is still intact.
    ReadFailed(AppError),
}

/// Receives the prompt and per-turn results of [`Session::run`].
pub trait TurnSink {
    fn prompt(&mut self);
    fn turn(&mut self, persona: &str, result: Result<&TurnOutput, &AppError>);
}

pub struct Session<C, B> {
    conversation: ConversationManager<C>,
    controller: DeviceController<B>,
}

impl<C: CompletionService, B: Bridge> Session<C, B> {
    /// Build the conversation around the controller's registry and give it
    /// the mission.
    pub fn start(
        persona: &str,
        service: C,
        controller: DeviceController<B>,
        household_notes: Option<&str>,
    ) -> Result<Self, AppError> {
        let names: Vec<&str> = controller.registry().names().collect();
        let tools = crate::tools::tool_definitions(&names);
        let mut conversation = ConversationManager::new(persona, service, tools);
        let mission = mission::build_mission(controller.registry(), household_notes);
        conversation.give_mission(mission, mission::ACKNOWLEDGEMENT)?;
        Ok(Self {
            conversation,
            controller,
        })
    }

    pub fn conversation(&self) -> &ConversationManager<C> {
        &self.conversation
    }

    pub fn controller(&self) -> &DeviceController<B> {
        &self.controller
    }

    /// Send one prompt and apply any invocation it produced.
    pub async fn handle(&mut self, prompt: &str) -> Result<TurnOutput, AppError> {
        let reply = self.conversation.chat(prompt).await?;
        let dispatch = dispatch(&reply, &self.controller).await?;
        Ok(TurnOutput { reply, dispatch })
    }

    /// Read prompts line by line until `quit`, end of input or a read error.
    /// Turn errors go to `sink` and do not stop the loop.
    pub async fn run<R, S>(&mut self, input: R, sink: &mut S) -> LoopEnd
    where
        R: AsyncBufRead + Unpin,
        S: TurnSink,
    {
        let mut lines = input.lines();
        loop {
            sink.prompt();
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return LoopEnd::EndOfInput,
                Err(e) => {
                    tracing::warn!(error = %e, "input read failed");
                    return LoopEnd::ReadFailed(e.into());
                }
            };
            match parse_input(&line) {
                Input::Quit => return LoopEnd::Quit,
                Input::Empty => {}
                Input::Prompt(prompt) => {
                    let result = self.handle(prompt).await;
                    sink.turn(self.conversation.persona(), result.as_ref());
                }
            }
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            total_tokens: self.conversation.cumulative_tokens(),
            cost_usd: self.conversation.cost_usd(),
        }
    }
}
