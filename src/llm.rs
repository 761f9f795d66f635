//! Chat-completion transport — builds HTTP requests and normalizes responses
//! for both Anthropic and OpenAI-compatible APIs.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::chat::ChatTurn;
use crate::error::AppError;
use crate::settings::{LlmProvider, LlmProviderConfig};

/// What the model answered, before the tool call is decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum RawReply {
    Text(String),
    ToolCall { name: String, input: Value },
}

/// One completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub reply: RawReply,
    /// Tokens billed for this exchange (prompt + completion).
    pub usage: u64,
}

/// Request/response RPC to a chat-completion service. A failed call is
/// reported as an error and never retried here.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, history: &[ChatTurn], tools: &Value) -> Result<Completion, AppError>;
}

// ── Provider resolution ──────────────────────────────────────────

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Resolved provider details ready for making an API call.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub provider: LlmProvider,
}

impl ResolvedProvider {
    /// Resolve a provider config into concrete URL / key / model values.
    pub fn from_config(config: &LlmProviderConfig) -> Result<Self, AppError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(AppError::NoApiKey)?
            .to_string();

        match config.provider {
            LlmProvider::Anthropic => Ok(Self {
                url: "https://api.anthropic.com/v1/messages".to_string(),
                api_key,
                model: config
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
                provider: LlmProvider::Anthropic,
            }),
            LlmProvider::OpenAiCompatible => {
                let base = config
                    .base_url
                    .as_deref()
                    .unwrap_or("https://api.openai.com/v1");
                let base = base.trim_end_matches('/');
                Ok(Self {
                    url: format!("{base}/chat/completions"),
                    api_key,
                    model: config
                        .model
                        .clone()
                        .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                    provider: LlmProvider::OpenAiCompatible,
                })
            }
        }
    }
}

// ── HTTP service ─────────────────────────────────────────────────

pub struct HttpCompletionService {
    client: reqwest::Client,
    provider: ResolvedProvider,
}

impl HttpCompletionService {
    pub fn new(config: &LlmProviderConfig, timeout: Duration) -> Result<Self, AppError> {
        let provider = ResolvedProvider::from_config(config)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::completion(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, provider })
    }

    pub fn model(&self) -> &str {
        &self.provider.model
    }
}

#[async_trait]
impl CompletionService for HttpCompletionService {
    async fn complete(&self, history: &[ChatTurn], tools: &Value) -> Result<Completion, AppError> {
        tracing::debug!(
            model = %self.provider.model,
            turns = history.len(),
            "sending completion request"
        );

        let response = build_request(&self.client, &self.provider, history, tools)
            .send()
            .await
            .map_err(|e| AppError::completion(format!("API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::completion(format!("API error {status}: {text}")));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::completion(format!("Failed to parse response: {e}")))?;

        let completion = parse_response(self.provider.provider, &json)?;
        tracing::debug!(usage = completion.usage, "completion received");
        Ok(completion)
    }
}

/// Build an HTTP request for the resolved provider.
pub fn build_request(
    client: &reqwest::Client,
    provider: &ResolvedProvider,
    history: &[ChatTurn],
    tools: &Value,
) -> reqwest::RequestBuilder {
    match provider.provider {
        LlmProvider::Anthropic => client
            .post(&provider.url)
            .header("x-api-key", &provider.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&anthropic_body(provider, history, tools)),
        LlmProvider::OpenAiCompatible => client
            .post(&provider.url)
            .header("Authorization", format!("Bearer {}", provider.api_key))
            .header("content-type", "application/json")
            .json(&openai_body(provider, history, tools)),
    }
}

/// Normalize the provider's response JSON into a [`Completion`].
pub fn parse_response(provider: LlmProvider, json: &Value) -> Result<Completion, AppError> {
    match provider {
        LlmProvider::Anthropic => parse_anthropic_response(json),
        LlmProvider::OpenAiCompatible => parse_openai_response(json),
    }
}

fn history_messages(history: &[ChatTurn]) -> Vec<Value> {
    history
        .iter()
        .map(|turn| {
            serde_json::json!({
                "role": turn.role.as_str(),
                "content": turn.text,
            })
        })
        .collect()
}

// ── Anthropic ────────────────────────────────────────────────────

fn anthropic_body(provider: &ResolvedProvider, history: &[ChatTurn], tools: &Value) -> Value {
    serde_json::json!({
        "model": provider.model,
        "max_tokens": 1024,
        "tools": tools,
        "messages": history_messages(history),
    })
}

fn parse_anthropic_response(json: &Value) -> Result<Completion, AppError> {
    let blocks = json
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::completion("No content in Anthropic response"))?;

    let usage = json.get("usage").map_or(0, |u| {
        u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0)
            + u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0)
    });

    let tool_use = blocks
        .iter()
        .find(|b| b.get("type").and_then(Value::as_str) == Some("tool_use"));

    let reply = if let Some(block) = tool_use {
        RawReply::ToolCall {
            name: block
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            input: block.get("input").cloned().unwrap_or(Value::Null),
        }
    } else {
        let text = blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");
        RawReply::Text(text)
    };

    Ok(Completion { reply, usage })
}

// ── OpenAI-compatible ────────────────────────────────────────────

fn openai_body(provider: &ResolvedProvider, history: &[ChatTurn], tools: &Value) -> Value {
    // Convert Anthropic-shaped tool definitions to OpenAI format
    let oai_tools: Vec<Value> = tools
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|tool| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": tool.get("name").and_then(Value::as_str).unwrap_or(""),
                            "description": tool.get("description").and_then(Value::as_str).unwrap_or(""),
                            "parameters": tool.get("input_schema").unwrap_or(&Value::Null),
                        }
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    serde_json::json!({
        "model": provider.model,
        "messages": history_messages(history),
        "tools": oai_tools,
        "tool_choice": "auto",
    })
}

fn parse_openai_response(json: &Value) -> Result<Completion, AppError> {
    let choice = json
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .ok_or_else(|| AppError::completion("No choices in OpenAI response"))?;

    let message = choice
        .get("message")
        .ok_or_else(|| AppError::completion("No message in OpenAI choice"))?;

    let usage = json
        .pointer("/usage/total_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    // Current `tool_calls` first, legacy `function_call` second
    let function = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| calls.first())
        .and_then(|call| call.get("function"))
        .or_else(|| message.get("function_call"));

    let reply = if let Some(func) = function {
        let arguments = func
            .get("arguments")
            .and_then(Value::as_str)
            .unwrap_or("{}");
        RawReply::ToolCall {
            name: func
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            // Unparseable arguments decode to an unrecognized operation later
            input: serde_json::from_str(arguments).unwrap_or(Value::Null),
        }
    } else {
        RawReply::Text(
            message
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        )
    };

    Ok(Completion { reply, usage })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::chat::ChatRole;

    fn config(provider: LlmProvider) -> LlmProviderConfig {
        LlmProviderConfig {
            provider,
            api_key: Some("sk-test".to_string()),
            base_url: None,
            model: None,
        }
    }

    #[test]
    fn resolves_openai_defaults() {
        let resolved = ResolvedProvider::from_config(&config(LlmProvider::OpenAiCompatible)).unwrap();
        assert_eq!(resolved.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(resolved.model, "gpt-3.5-turbo");
    }

    #[test]
    fn resolves_custom_base_url_and_model() {
        let mut cfg = config(LlmProvider::OpenAiCompatible);
        cfg.base_url = Some("http://localhost:11434/v1/".to_string());
        cfg.model = Some("llama3".to_string());
        let resolved = ResolvedProvider::from_config(&cfg).unwrap();
        assert_eq!(resolved.url, "http://localhost:11434/v1/chat/completions");
        assert_eq!(resolved.model, "llama3");
    }

    #[test]
    fn missing_key_is_rejected() {
        let mut cfg = config(LlmProvider::Anthropic);
        cfg.api_key = Some(String::new());
        assert!(matches!(
            ResolvedProvider::from_config(&cfg),
            Err(AppError::NoApiKey)
        ));
    }

    #[test]
    fn openai_body_carries_history_and_converted_tools() {
        let provider = ResolvedProvider::from_config(&config(LlmProvider::OpenAiCompatible)).unwrap();
        let history = vec![
            ChatTurn::new(ChatRole::User, "mission"),
            ChatTurn::new(ChatRole::Assistant, "OK."),
        ];
        let tools = crate::tools::tool_definitions(&["Office"]);
        let body = openai_body(&provider, &history, &tools);

        assert_eq!(body["messages"][0], serde_json::json!({ "role": "user", "content": "mission" }));
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "turn_on_or_off");
        assert_eq!(
            body["tools"][0]["function"]["parameters"]["properties"]["light_name"]["enum"],
            serde_json::json!(["Office"])
        );
    }

    #[test]
    fn anthropic_body_keeps_tool_shape() {
        let provider = ResolvedProvider::from_config(&config(LlmProvider::Anthropic)).unwrap();
        let tools = crate::tools::tool_definitions(&["Office"]);
        let body = anthropic_body(&provider, &[ChatTurn::new(ChatRole::User, "hi")], &tools);
        assert_eq!(body["tools"][1]["name"], "set_brightness");
        assert!(body["tools"][1].get("input_schema").is_some());
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn parses_openai_text_reply() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Sure." }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 40, "completion_tokens": 2, "total_tokens": 42 }
        });
        let completion = parse_response(LlmProvider::OpenAiCompatible, &json).unwrap();
        assert_eq!(completion.reply, RawReply::Text("Sure.".to_string()));
        assert_eq!(completion.usage, 42);
    }

    #[test]
    fn parses_openai_tool_call() {
        let json = serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "turn_on_or_off",
                            "arguments": "{\"light_name\":\"Office\",\"on\":true}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "total_tokens": 77 }
        });
        let completion = parse_response(LlmProvider::OpenAiCompatible, &json).unwrap();
        assert_eq!(
            completion.reply,
            RawReply::ToolCall {
                name: "turn_on_or_off".to_string(),
                input: serde_json::json!({ "light_name": "Office", "on": true }),
            }
        );
        assert_eq!(completion.usage, 77);
    }

    #[test]
    fn parses_legacy_function_call() {
        let json = serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": {
                        "name": "set_brightness",
                        "arguments": "{\"light_name\":\"Kitchen\",\"brightness\":50}"
                    }
                }
            }],
            "usage": { "total_tokens": 10 }
        });
        let completion = parse_response(LlmProvider::OpenAiCompatible, &json).unwrap();
        assert!(matches!(completion.reply, RawReply::ToolCall { ref name, .. } if name == "set_brightness"));
    }

    #[test]
    fn openai_without_choices_is_an_error() {
        let json = serde_json::json!({ "choices": [] });
        assert!(matches!(
            parse_response(LlmProvider::OpenAiCompatible, &json),
            Err(AppError::Completion { .. })
        ));
    }

    #[test]
    fn parses_anthropic_text_and_usage() {
        let json = serde_json::json!({
            "content": [
                { "type": "text", "text": "Hello" },
                { "type": "text", "text": "there" }
            ],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 30, "output_tokens": 5 }
        });
        let completion = parse_response(LlmProvider::Anthropic, &json).unwrap();
        assert_eq!(completion.reply, RawReply::Text("Hello\nthere".to_string()));
        assert_eq!(completion.usage, 35);
    }

    #[test]
    fn anthropic_tool_use_wins_over_text() {
        let json = serde_json::json!({
            "content": [
                { "type": "text", "text": "Turning it off." },
                { "type": "tool_use", "id": "tu_1", "name": "turn_on_or_off",
                  "input": { "light_name": "Living Room", "on": false } }
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 100, "output_tokens": 20 }
        });
        let completion = parse_response(LlmProvider::Anthropic, &json).unwrap();
        assert_eq!(
            completion.reply,
            RawReply::ToolCall {
                name: "turn_on_or_off".to_string(),
                input: serde_json::json!({ "light_name": "Living Room", "on": false }),
            }
        );
        assert_eq!(completion.usage, 120);
    }
}
