use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::llm::{CompletionService, RawReply};
use crate::tools::Operation;

/// Price of 1000 tokens in USD.
pub const COST_PER_1000_TOKENS_USD: f64 = 0.002;

/// Cost in USD of `tokens` at the fixed per-1000-token rate.
#[allow(clippy::cast_precision_loss)]
pub fn cost_usd(tokens: u64) -> f64 {
    tokens as f64 * COST_PER_1000_TOKENS_USD / 1000.0
}

// ── Types ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConversationState {
    AwaitingMission,
    Active,
}

/// The model's answer to one prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Reply {
    Text(String),
    Invocation(Operation),
}

// ── Conversation manager ─────────────────────────────────────────

/// Owns the dialogue history and the running token total for one session.
///
/// The history starts with a mission statement and an acknowledgement that
/// were never actually exchanged with the model. Tool calls are returned to
/// the caller but not recorded as assistant turns.
pub struct ConversationManager<C> {
    persona: String,
    service: C,
    tools: Value,
    history: Vec<ChatTurn>,
    state: ConversationState,
    cumulative_tokens: u64,
}

impl<C: CompletionService> ConversationManager<C> {
    /// `tools` is the operation declaration sent with every request.
    pub fn new(persona: impl Into<String>, service: C, tools: Value) -> Self {
        Self {
            persona: persona.into(),
            service,
            tools,
            history: Vec::new(),
            state: ConversationState::AwaitingMission,
            cumulative_tokens: 0,
        }
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn cumulative_tokens(&self) -> u64 {
        self.cumulative_tokens
    }

    pub fn cost_usd(&self) -> f64 {
        cost_usd(self.cumulative_tokens)
    }

    pub fn service(&self) -> &C {
        &self.service
    }

    /// Seed the conversation with the mission and a canned acknowledgement.
    pub fn give_mission(
        &mut self,
        mission: impl Into<String>,
        acknowledgement: impl Into<String>,
    ) -> Result<(), AppError> {
        if self.state != ConversationState::AwaitingMission {
            return Err(AppError::InvalidState {
                message: "Mission already given".to_string(),
            });
        }
        self.history.push(ChatTurn::new(ChatRole::User, mission));
        self.history.push(ChatTurn::new(ChatRole::Assistant, acknowledgement));
        self.state = ConversationState::Active;
        tracing::debug!(persona = %self.persona, "mission given");
        Ok(())
    }

    /// Send `prompt` with the full history and classify the answer.
    pub async fn chat(&mut self, prompt: impl Into<String>) -> Result<Reply, AppError> {
        if self.state != ConversationState::Active {
            return Err(AppError::InvalidState {
                message: "Give the mission before chatting".to_string(),
            });
        }

        self.history.push(ChatTurn::new(ChatRole::User, prompt));
        let completion = self.service.complete(&self.history, &self.tools).await?;
        self.cumulative_tokens += completion.usage;

        match completion.reply {
            RawReply::ToolCall { name, input } => {
                let operation = Operation::from_tool_call(&name, &input);
                tracing::debug!(operation = operation.name(), usage = completion.usage, "invocation reply");
                Ok(Reply::Invocation(operation))
            }
            RawReply::Text(text) if text.trim().is_empty() => {
                tracing::warn!(usage = completion.usage, "empty text reply");
                Err(AppError::completion("Model returned an empty reply"))
            }
            RawReply::Text(text) => {
                tracing::debug!(usage = completion.usage, "text reply");
                self.history.push(ChatTurn::new(ChatRole::Assistant, text.clone()));
                Ok(Reply::Text(text))
            }
        }
    }
}
