//! Core data model for the dialogue orchestration engine: messages, tool
//! calls, requests/responses, the dialogue trace, and continuation
//! request/decision shapes. See `ChatRequest`/`ChatResponse` for the
//! boundary types the Host Bridge commands pass across.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry in a conversation transcript, sent to and received from a
/// provider. Immutable once appended to a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "toolCalls", default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "toolCallId", default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            tool_calls: Vec::new(),
            name: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            tool_calls: Vec::new(),
            name: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            tool_calls,
            name: None,
            tool_call_id: None,
        }
    }

    pub fn tool(name: impl Into<String>, tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.into(),
            tool_calls: Vec::new(),
            name: Some(name.into()),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A function-style tool call. `function.arguments` is always a
/// JSON-encoded string, even for providers (Ollama) whose wire format
/// emits a native JSON object -- normalized once at decode time so every
/// downstream consumer only ever deals with a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default = "default_function_type")]
    pub call_type: String,
    pub function: ToolCallFunction,
}

fn default_function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: String,
}

/// Provider identity, one of the three supported back ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    Vllm,
    Mock,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::Vllm => "vllm",
            ProviderKind::Mock => "mock",
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "ollama" => Ok(ProviderKind::Ollama),
            "vllm" => Ok(ProviderKind::Vllm),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Request driving one `Chat` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub provider: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(rename = "apiKey", default)]
    pub api_key: String,
    pub model: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(rename = "toolDefs", default)]
    pub tool_defs: Vec<ToolDefinition>,
    #[serde(rename = "chatOnly", default)]
    pub chat_only: bool,
    #[serde(rename = "webSearchApiKey", default)]
    pub web_search_api_key: String,
    #[serde(rename = "webSearchEndpoint", default)]
    pub web_search_endpoint: String,
}

/// Response returned to the UI from a `Chat` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    #[serde(rename = "latencyMs")]
    pub latency_ms: u64,
    pub trace: Vec<DialogueTraceEntry>,
}

/// A JSON-schema function definition advertised to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type", default = "default_function_type")]
    pub def_type: String,
    pub function: ToolFunctionSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// Name of the always-present virtual completion tool.
pub const REQUEST_FULLFILLED: &str = "request_fullfilled";

/// The `ToolDefinition` for the virtual completion tool, always appended
/// to the tool list the loop advertises to the provider.
pub fn request_fullfilled_definition() -> ToolDefinition {
    ToolDefinition {
        def_type: "function".to_string(),
        function: ToolFunctionSchema {
            name: REQUEST_FULLFILLED.to_string(),
            description: "Signal that the user's request has been fully satisfied. Call this \
                as the final step once no further tool calls are needed."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "A final summary to present to the user."
                    }
                },
                "required": ["summary"]
            }),
            strict: None,
        },
    }
}

/// One chronological, append-only entry in a dialogue's trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueTraceEntry {
    pub id: String,
    pub role: TraceRole,
    pub kind: TraceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    pub status: TraceStatus,
    #[serde(rename = "createdAt")]
    pub created_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceRole {
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Plan,
    ToolCall,
    ToolResult,
    Final,
    Error,
    Timeout,
    Continuation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    Running,
    Done,
    Error,
    Complete,
    Failed,
    Timeout,
    Pending,
    Continued,
    Cancelled,
}

/// Reason the loop is requesting a continuation decision from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuationReason {
    IterationLimit,
    ToolFailures,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub reason: ContinuationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(rename = "failureCount", default, skip_serializing_if = "Option::is_none")]
    pub failure_count: Option<u32>,
    #[serde(rename = "failureLimit", default, skip_serializing_if = "Option::is_none")]
    pub failure_limit: Option<u32>,
    #[serde(rename = "toolName", default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContinuationDecision {
    Continue,
    Cancel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationResolved {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ContinuationReason>,
    pub decision: ContinuationDecision,
}

/// Metadata for one entry in the Tool Registry (C4). The registry itself
/// owns instances of this; callers only ever see a cloned snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "uiVisible")]
    pub ui_visible: bool,
    pub enabled: bool,
    pub definition: ToolDefinition,
}

/// Truncate `s` to at most `n` chars, appending `...` when truncated
/// (unless `n <= 3`, in which case the raw prefix is returned). See
/// SPEC_FULL.md boundary-behavior property for `truncate`.
pub fn truncate(s: &str, n: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= n {
        return s.to_string();
    }
    if n <= 3 {
        return s.chars().take(n).collect();
    }
    let keep: String = s.chars().take(n - 3).collect();
    format!("{keep}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_unchanged_when_short() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_adds_ellipsis() {
        let result = truncate("hello world", 8);
        assert_eq!(result, "hello...");
        assert_eq!(result.chars().count(), 8);
    }

    #[test]
    fn truncate_tiny_limit_returns_raw_prefix() {
        assert_eq!(truncate("hello", 2), "he");
    }

    #[test]
    fn provider_kind_roundtrip() {
        for kind in [ProviderKind::Ollama, ProviderKind::Vllm, ProviderKind::Mock] {
            let parsed = ProviderKind::parse(kind.as_str()).unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn provider_kind_rejects_unknown() {
        assert!(ProviderKind::parse("claude").is_err());
    }

    #[test]
    fn request_fullfilled_definition_has_summary_field() {
        let def = request_fullfilled_definition();
        assert_eq!(def.function.name, REQUEST_FULLFILLED);
        assert!(def.function.parameters["properties"]["summary"].is_object());
    }
}
