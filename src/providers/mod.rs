//! Provider Clients (C1): a capability set dispatched by a tag drawn from
//! `ChatRequest.provider`, not a shared base trait. Each call to `chat`,
//! `stream`, or `list_models` is a free function over a fresh request --
//! no struct here holds state across calls, unlike a long-lived session
//! object. See SPEC_FULL.md §4.1 / §9.

pub mod decoder;
pub mod mock;
pub mod ollama;
pub mod openai_compat;

use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;

use crate::event_sink::EventSink;
use crate::model::{ChatMessage, ChatRequest, ProviderKind};

/// Default per-request HTTP timeout (SPEC_FULL §3 lifecycle note / §5).
pub const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared client, built once. `reqwest::Client` is internally
/// connection-pooled and cheap to clone/share across tasks.
pub static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(HTTP_CLIENT_TIMEOUT)
        .build()
        .expect("building the shared reqwest client must not fail")
});

/// Non-streaming chat call: post the transcript, return the consolidated
/// assistant message.
pub async fn chat(req: &ChatRequest) -> Result<ChatMessage, String> {
    match ProviderKind::parse(&req.provider)? {
        ProviderKind::Ollama => ollama::chat(req).await,
        ProviderKind::Vllm => openai_compat::chat(req).await,
        ProviderKind::Mock => mock::chat(req).await,
    }
}

/// Streaming chat call: drives the wire-format decoder and emits
/// `thinking`/`answer` events to `sink` as they arrive, returning the
/// consolidated assistant message once the stream ends.
pub async fn stream(
    req: &ChatRequest,
    sink: &dyn EventSink,
    session_id: &str,
) -> Result<ChatMessage, String> {
    match ProviderKind::parse(&req.provider)? {
        ProviderKind::Ollama => ollama::stream(req, sink, session_id).await,
        ProviderKind::Vllm => openai_compat::stream(req, sink, session_id).await,
        ProviderKind::Mock => mock::stream(req, sink, session_id).await,
    }
}

/// List model ids available from a provider/endpoint.
pub async fn list_models(provider: &str, endpoint: &str, api_key: &str) -> Result<Vec<String>, String> {
    match ProviderKind::parse(provider)? {
        ProviderKind::Ollama => ollama::list_models(endpoint).await,
        ProviderKind::Vllm => openai_compat::list_models(endpoint, api_key).await,
        ProviderKind::Mock => Ok(vec!["mock".to_string()]),
    }
}

/// Normalize a user-entered base URL: trim whitespace, prepend `http://`
/// when no scheme is present, strip a trailing slash. Idempotent and
/// preserves an empty string as empty (SPEC_FULL §8 round-trip property).
pub fn normalize_base(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    with_scheme.trim_end_matches('/').to_string()
}

/// Truncate a response body excerpt to at most 512 chars for error
/// messages (SPEC_FULL §4.1 error taxonomy).
pub fn error_excerpt(body: &str) -> String {
    crate::model::truncate(body, 512)
}

/// Keep only `user`/`assistant` roles with non-empty trimmed content, in
/// order, from prior history -- the loop's transcript-assembly rule
/// (SPEC_FULL §4.7) applied once so every provider client shares it.
pub fn normalize_history(history: &[ChatMessage]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter(|m| {
            (m.role == "user" || m.role == "assistant") && !m.content.trim().is_empty()
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_adds_scheme() {
        assert_eq!(normalize_base("localhost:11434"), "http://localhost:11434");
    }

    #[test]
    fn normalize_base_strips_trailing_slash() {
        assert_eq!(normalize_base("https://x.test/"), "https://x.test");
    }

    #[test]
    fn normalize_base_empty_stays_empty() {
        assert_eq!(normalize_base(""), "");
    }

    #[test]
    fn normalize_base_idempotent() {
        for raw in ["localhost:11434", "https://x.test/", "", "  http://a.b  "] {
            let once = normalize_base(raw);
            let twice = normalize_base(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn normalize_history_drops_system_and_tool_and_blank() {
        let history = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("  "),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello", vec![]),
            ChatMessage::tool("shell", "id1", "output"),
        ];
        let normalized = normalize_history(&history);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].content, "hi");
        assert_eq!(normalized[1].content, "hello");
    }
}
