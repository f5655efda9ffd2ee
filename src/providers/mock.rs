//! The `mock` provider: a deterministic echo used by tests and by the
//! UI's offline mode. Never touches the network.

use crate::event_sink::EventSink;
use crate::model::{ChatMessage, ChatRequest};

fn latest_user_message(req: &ChatRequest) -> String {
    if !req.message.trim().is_empty() {
        return req.message.clone();
    }
    req.history
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

fn echo(req: &ChatRequest) -> String {
    format!("[mock {}/{}] {}", req.provider, req.model, latest_user_message(req))
}

pub async fn chat(req: &ChatRequest) -> Result<ChatMessage, String> {
    Ok(ChatMessage::assistant(echo(req), vec![]))
}

pub async fn stream(req: &ChatRequest, sink: &dyn EventSink, session_id: &str) -> Result<ChatMessage, String> {
    let content = echo(req);
    sink.answer_update(session_id, &content);
    Ok(ChatMessage::assistant(content, vec![]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sink::NullEventSink;

    fn base_request() -> ChatRequest {
        ChatRequest {
            session_id: "s1".to_string(),
            provider: "mock".to_string(),
            endpoint: String::new(),
            api_key: String::new(),
            model: "test-model".to_string(),
            message: "hello world".to_string(),
            history: vec![],
            tools: vec![],
            tool_defs: vec![],
            chat_only: true,
            web_search_api_key: String::new(),
            web_search_endpoint: String::new(),
        }
    }

    #[tokio::test]
    async fn mock_chat_echoes_deterministically() {
        let req = base_request();
        let msg = chat(&req).await.unwrap();
        assert_eq!(msg.content, "[mock mock/test-model] hello world");
    }

    #[tokio::test]
    async fn mock_stream_matches_chat_and_emits_answer() {
        let req = base_request();
        let sink = NullEventSink;
        let msg = stream(&req, &sink, "s1").await.unwrap();
        assert_eq!(msg.content, "[mock mock/test-model] hello world");
    }

    #[tokio::test]
    async fn mock_falls_back_to_last_history_user_message() {
        let mut req = base_request();
        req.message = String::new();
        req.history = vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("reply", vec![]),
            ChatMessage::user("second"),
        ];
        let msg = chat(&req).await.unwrap();
        assert_eq!(msg.content, "[mock mock/test-model] second");
    }
}
