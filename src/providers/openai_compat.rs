//! The `vllm` provider: an OpenAI Chat Completions-compatible client
//! (`/v1/chat/completions`, `/v1/models`). Grounded on this codebase's
//! existing SSE line-buffering loop in the former `providers/api.rs`,
//! generalized onto the stream decoder in `decoder.rs`.

use futures_util::StreamExt;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::decoder::{DecodedEvent, ThinkSplitter, ToolCallAccumulator};
use super::{error_excerpt, normalize_base, HTTP_CLIENT};
use crate::event_sink::EventSink;
use crate::model::{ChatMessage, ChatRequest, ToolCall};

fn endpoint(req: &ChatRequest) -> String {
    format!("{}/v1/chat/completions", normalize_base(&req.endpoint))
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
                json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.function.name,
                        "arguments": tc.function.arguments,
                    }
                })
            })
            .collect();
        obj["tool_calls"] = Value::Array(calls);
    }
    if let Some(name) = &msg.name {
        obj["name"] = json!(name);
    }
    if let Some(tool_call_id) = &msg.tool_call_id {
        obj["tool_call_id"] = json!(tool_call_id);
    }
    obj
}

fn build_transcript(req: &ChatRequest) -> Vec<Value> {
    let mut messages: Vec<Value> = Vec::new();
    for msg in &req.history {
        messages.push(message_to_json(msg));
    }
    if !req.message.trim().is_empty() {
        messages.push(message_to_json(&ChatMessage::user(req.message.clone())));
    }
    messages
}

fn build_body(req: &ChatRequest, transcript: &[Value], stream: bool) -> Value {
    let mut body = json!({
        "model": req.model,
        "messages": transcript,
        "stream": stream,
        "temperature": 0,
    });
    if !req.tool_defs.is_empty() {
        let tools: Vec<Value> = req
            .tool_defs
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.function.name,
                        "description": t.function.description,
                        "parameters": t.function.parameters,
                    }
                })
            })
            .collect();
        body["tools"] = Value::Array(tools);
        body["tool_choice"] = json!("auto");
    }
    body
}

fn apply_auth(builder: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
    if api_key.is_empty() {
        builder
    } else {
        builder.bearer_auth(api_key)
    }
}

fn extract_tool_calls_from_message(message: &Value) -> Vec<ToolCall> {
    let Some(calls) = message.get("tool_calls").and_then(Value::as_array) else {
        return Vec::new();
    };
    calls
        .iter()
        .filter_map(|c| {
            let id = c.get("id").and_then(Value::as_str).map(str::to_string);
            let function = c.get("function")?;
            let name = function.get("name").and_then(Value::as_str)?.to_string();
            let arguments = match function.get("arguments") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => serde_json::to_string(other).unwrap_or_else(|_| "{}".to_string()),
                None => "{}".to_string(),
            };
            Some(ToolCall {
                id,
                call_type: "function".to_string(),
                function: crate::model::ToolCallFunction { name, arguments },
            })
        })
        .collect()
}

pub async fn chat(req: &ChatRequest) -> Result<ChatMessage, String> {
    let transcript = build_transcript(req);
    let body = build_body(req, &transcript, false);

    let builder = HTTP_CLIENT.post(endpoint(req)).json(&body);
    let builder = apply_auth(builder, &req.api_key);

    let response = builder.send().await.map_err(|e| format!("request failed: {e}"))?;
    let status = response.status();
    let text = response.text().await.map_err(|e| format!("request failed: {e}"))?;

    if !status.is_success() {
        return Err(format!("returned {}: {}", status.as_u16(), error_excerpt(&text)));
    }

    let value: Value = serde_json::from_str(&text).map_err(|e| format!("decode failed: {e}"))?;
    if let Some(err) = value.get("error") {
        let msg = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown provider error");
        return Err(msg.to_string());
    }

    let choice = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .ok_or_else(|| "no choices returned".to_string())?;
    let message = choice.get("message").cloned().unwrap_or(Value::Null);
    let content = message.get("content").and_then(Value::as_str).unwrap_or("").to_string();
    let tool_calls = extract_tool_calls_from_message(&message);

    Ok(ChatMessage::assistant(content, tool_calls))
}

pub async fn stream(req: &ChatRequest, sink: &dyn EventSink, session_id: &str) -> Result<ChatMessage, String> {
    let transcript = build_transcript(req);
    let body = build_body(req, &transcript, true);

    let builder = HTTP_CLIENT.post(endpoint(req)).json(&body);
    let builder = apply_auth(builder, &req.api_key);

    let response = builder.send().await.map_err(|e| format!("request failed: {e}"))?;
    let status = response.status();
    if status != StatusCode::OK {
        let text = response.text().await.unwrap_or_default();
        return Err(format!("returned {}: {}", status.as_u16(), error_excerpt(&text)));
    }

    let mut byte_stream = response.bytes_stream();
    let mut leftover = String::new();
    let mut splitter = ThinkSplitter::new();
    let mut accumulator = ToolCallAccumulator::new();
    let mut answer = String::new();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(|e| format!("request failed: {e}"))?;
        leftover.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(newline_pos) = leftover.find('\n') {
            let line = leftover[..newline_pos].trim_end_matches('\r').to_string();
            leftover = leftover[newline_pos + 1..].to_string();
            if line.is_empty() {
                continue;
            }
            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };
            if data == "[DONE]" {
                leftover.clear();
                break;
            }
            let frame: Value = match serde_json::from_str(data) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("dropping unrecognized SSE frame: {e}");
                    continue;
                }
            };
            let Some(choice) = frame.get("choices").and_then(Value::as_array).and_then(|a| a.first()) else {
                continue;
            };
            let Some(delta) = choice.get("delta") else {
                continue;
            };
            if let Some(content) = delta.get("content").and_then(Value::as_str) {
                if !content.is_empty() {
                    feed_answer(&mut splitter, content, &mut answer, sink, session_id);
                }
            }
            if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
                for tc in tool_calls {
                    accumulator.accumulate(0, tc);
                }
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

pub async fn list_models(endpoint_raw: &str, api_key: &str) -> Result<Vec<String>, String> {
    let url = format!("{}/v1/models", normalize_base(endpoint_raw));
    let builder = apply_auth(HTTP_CLIENT.get(url), api_key);
    let response = builder.send().await.map_err(|e| format!("request failed: {e}"))?;
    let status = response.status();
    let text = response.text().await.map_err(|e| format!("request failed: {e}"))?;
    if !status.is_success() {
        return Err(format!("returned {}: {}", status.as_u16(), error_excerpt(&text)));
    }
    let value: Value = serde_json::from_str(&text).map_err(|e| format!("decode failed: {e}"))?;
    let ids = value
        .get("data")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|m| m.get("id").and_then(Value::as_str))
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
    use crate::model::ToolDefinition;

    fn base_request() -> ChatRequest {
        ChatRequest {
            session_id: "s1".to_string(),
            provider: "vllm".to_string(),
            endpoint: "https://example.test".to_string(),
            api_key: String::new(),
            model: "m".to_string(),
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
    fn build_body_omits_tool_choice_when_no_tools() {
        let req = base_request();
        let transcript = build_transcript(&req);
        let body = build_body(&req, &transcript, false);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert_eq!(body["temperature"], 0);
    }

    #[test]
    fn build_body_includes_tool_choice_auto_when_tools_present() {
        let mut req = base_request();
        req.tool_defs = vec![ToolDefinition {
            def_type: "function".to_string(),
            function: crate::model::ToolFunctionSchema {
                name: "browser".to_string(),
                description: "fetch a url".to_string(),
                parameters: serde_json::json!({"type":"object"}),
                strict: None,
            },
        }];
        let transcript = build_transcript(&req);
        let body = build_body(&req, &transcript, false);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn extract_tool_calls_normalizes_object_arguments_to_string() {
        let message = serde_json::json!({
            "role": "assistant",
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "browser", "arguments": "{\"url\":\"https://example.com\"}"}
            }]
        });
        let calls = extract_tool_calls_from_message(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "browser");
    }

    #[test]
    fn endpoint_uses_normalized_base() {
        let mut req = base_request();
        req.endpoint = "example.test/".to_string();
        assert_eq!(endpoint(&req), "http://example.test/v1/chat/completions");
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
