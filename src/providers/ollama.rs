//! The `ollama` provider: a native `/api/chat` NDJSON client. The
//! teacher crate this engine grows out of never implements this path
//! (it treats "ollama" as just another OpenAI-compatible endpoint), so
//! the NDJSON framing and tool-call-across-chunks accumulation here are
//! grounded on `kuksenko116-openclaw/cli-rust/src/llm/ollama.rs`.

use futures_util::StreamExt;
use serde_json::{json, Value};

use super::decoder::{DecodedEvent, ThinkSplitter, ToolCallAccumulator};
use super::{error_excerpt, normalize_base, HTTP_CLIENT};
use crate::event_sink::EventSink;
use crate::model::{ChatMessage, ChatRequest, ToolCall};

fn endpoint(req: &ChatRequest) -> String {
    format!("{}/api/chat", normalize_base(&req.endpoint))
}

fn message_to_json(msg: &ChatMessage) -> Value {
    let mut obj = json!({
        "role": msg.role,
        "content": msg.content,
    });
    if !msg.tool_calls.is_empty() {
        let calls: Vec<Value> = msg
            .tool_calls
            .iter()
            .map(|tc| {
                let arguments: Value =
                    serde_json::from_str(&tc.function.arguments).unwrap_or(Value::Null);
                json!({ "function": { "name": tc.function.name, "arguments": arguments } })
            })
            .collect();
        obj["tool_calls"] = Value::Array(calls);
    }
    obj
}

fn build_transcript(req: &ChatRequest) -> Vec<Value> {
    let mut messages: Vec<Value> = req.history.iter().map(message_to_json).collect();
    if !req.message.trim().is_empty() {
        messages.push(message_to_json(&ChatMessage::user(req.message.clone())));
    }
    messages
}

fn extract_tool_calls(message: &Value) -> Vec<ToolCall> {
    let Some(calls) = message.get("tool_calls").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut accumulator = ToolCallAccumulator::new();
    for call in calls {
        accumulator.accumulate_native(0, call);
    }
    accumulator.finalize()
}

pub async fn chat(req: &ChatRequest) -> Result<ChatMessage, String> {
    let transcript = build_transcript(req);
    let body = json!({ "model": req.model, "messages": transcript, "stream": false });

    let response = HTTP_CLIENT
        .post(endpoint(req))
        .json(&body)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    let status = response.status();
    let text = response.text().await.map_err(|e| format!("request failed: {e}"))?;
    if !status.is_success() {
        return Err(format!("returned {}: {}", status.as_u16(), error_excerpt(&text)));
    }

    let value: Value = serde_json::from_str(&text).map_err(|e| format!("decode failed: {e}"))?;
    let message = value
        .get("message")
        .ok_or_else(|| "no choices returned".to_string())?;
    let content = message.get("content").and_then(Value::as_str).unwrap_or("").to_string();
    let tool_calls = extract_tool_calls(message);

    Ok(ChatMessage::assistant(content, tool_calls))
}

pub async fn stream(req: &ChatRequest, sink: &dyn EventSink, session_id: &str) -> Result<ChatMessage, String> {
    let transcript = build_transcript(req);
    let body = json!({ "model": req.model, "messages": transcript, "stream": true });

    let response = HTTP_CLIENT
        .post(endpoint(req))
        .json(&body)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(format!("returned {}: {}", status.as_u16(), error_excerpt(&text)));
    }

    let mut byte_stream = response.bytes_stream();
    let mut leftover = String::new();
    let mut splitter = ThinkSplitter::new();
    let mut accumulator = ToolCallAccumulator::new();
    let mut answer = String::new();

    'outer: while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(|e| format!("request failed: {e}"))?;
        leftover.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(newline_pos) = leftover.find('\n') {
            let line = leftover[..newline_pos].trim_end_matches('\r').to_string();
            leftover = leftover[newline_pos + 1..].to_string();
            if line.trim().is_empty() {
                continue;
            }
            let frame: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("dropping unrecognized NDJSON frame: {e}");
                    continue;
                }
            };
            if let Some(message) = frame.get("message") {
                if let Some(thinking) = message.get("thinking").and_then(Value::as_str) {
                    if !thinking.is_empty() {
                        for event in splitter.feed_native_thinking(thinking) {
                            emit(sink, session_id, event);
                        }
                    }
                }
                if let Some(content) = message.get("content").and_then(Value::as_str) {
                    if !content.is_empty() {
                        feed_answer(&mut splitter, content, &mut answer, sink, session_id);
                    }
                }
                if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
                    for call in calls {
                        accumulator.accumulate_native(0, call);
                    }
                }
            }
            if frame.get("done").and_then(Value::as_bool).unwrap_or(false) {
                break 'outer;
            }
        }
    }
    for event in splitter.finish() {
        emit(sink, session_id, event);
    }

    let tool_calls = accumulator.finalize();
    Ok(ChatMessage::assistant(answer, tool_calls))
}

fn emit(sink: &dyn EventSink, session_id: &str, event: DecodedEvent) {
    match event {
        DecodedEvent::ThinkingStart => sink.thinking_start(session_id),
        DecodedEvent::ThinkingUpdate(chunk) => sink.thinking_update(session_id, &chunk),
        DecodedEvent::ThinkingEnd => sink.thinking_end(session_id),
        DecodedEvent::AnswerUpdate(chunk) => sink.answer_update(session_id, &chunk),
    }
}

/// Feeds one content fragment through the splitter, appending only the
/// `answer`-channel chunks to `answer` -- the `<think>` markup must never
/// reach the message content returned to the loop.
fn feed_answer(
    splitter: &mut ThinkSplitter,
    content: &str,
    answer: &mut String,
    sink: &dyn EventSink,
    session_id: &str,
) {
    for event in splitter.feed(content) {
        if let DecodedEvent::AnswerUpdate(chunk) = &event {
            answer.push_str(chunk);
        }
        emit(sink, session_id, event);
    }
}

pub async fn list_models(endpoint_raw: &str) -> Result<Vec<String>, String> {
    let url = format!("{}/api/tags", normalize_base(endpoint_raw));
    let response = HTTP_CLIENT.get(url).send().await.map_err(|e| format!("request failed: {e}"))?;
    let status = response.status();
    let text = response.text().await.map_err(|e| format!("request failed: {e}"))?;
    if !status.is_success() {
        return Err(format!("returned {}: {}", status.as_u16(), error_excerpt(&text)));
    }
    let value: Value = serde_json::from_str(&text).map_err(|e| format!("decode failed: {e}"))?;
    let ids = value
        .get("models")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|m| m.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .filter(|id| !id.trim().is_empty())
                .collect()
        })
        .unwrap_or_default();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sink::NullEventSink;

    fn base_request() -> ChatRequest {
        ChatRequest {
            session_id: "s1".to_string(),
            provider: "ollama".to_string(),
            endpoint: "localhost:11434".to_string(),
            api_key: String::new(),
            model: "llama3".to_string(),
            message: "hi".to_string(),
            history: vec![],
            tools: vec![],
            tool_defs: vec![],
            chat_only: false,
            web_search_api_key: String::new(),
            web_search_endpoint: String::new(),
        }
    }

    #[test]
    fn endpoint_normalizes_scheme() {
        let req = base_request();
        assert_eq!(endpoint(&req), "http://localhost:11434/api/chat");
    }

    #[test]
    fn extract_tool_calls_reserializes_object_arguments_as_string() {
        let message = serde_json::json!({
            "content": "",
            "tool_calls": [{ "function": { "name": "browser", "arguments": { "url": "https://example.com" } } }]
        });
        let calls = extract_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "browser");
        let round_tripped: Value = serde_json::from_str(&calls[0].function.arguments).unwrap();
        assert_eq!(round_tripped["url"], "https://example.com");
    }

    #[test]
    fn message_to_json_parses_arguments_string_back_to_object() {
        let msg = ChatMessage::assistant(
            "",
            vec![ToolCall {
                id: Some("call_1".to_string()),
                call_type: "function".to_string(),
                function: crate::model::ToolCallFunction {
                    name: "shell".to_string(),
                    arguments: "{\"command\":\"echo hi\"}".to_string(),
                },
            }],
        );
        let value = message_to_json(&msg);
        assert_eq!(value["tool_calls"][0]["function"]["arguments"]["command"], "echo hi");
    }

    #[test]
    fn feed_answer_excludes_inline_thinking_from_the_accumulated_answer() {
        let mut splitter = ThinkSplitter::new();
        let mut answer = String::new();
        let sink = NullEventSink;
        feed_answer(&mut splitter, "<think>planning</think>answer", &mut answer, &sink, "s1");
        for event in splitter.finish() {
            emit(&sink, "s1", event);
        }
        assert_eq!(answer, "answer");
    }

    #[test]
    fn feed_answer_accumulates_across_fragments_split_mid_tag() {
        let mut splitter = ThinkSplitter::new();
        let mut answer = String::new();
        let sink = NullEventSink;
        feed_answer(&mut splitter, "<think>plan", &mut answer, &sink, "s1");
        feed_answer(&mut splitter, "ning</think>ans", &mut answer, &sink, "s1");
        feed_answer(&mut splitter, "wer", &mut answer, &sink, "s1");
        assert_eq!(answer, "answer");
    }
}
