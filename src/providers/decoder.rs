//! Stream Decoder (C2): normalizes per-frame content into `thinking`/
//! `answer` chunks and buffers partial tool-call argument JSON until a
//! stream ends. Kept free of any provider-specific wire parsing -- the
//! OpenAI SSE and Ollama NDJSON readers each feed this decoder one
//! content fragment / `thinking` field / tool-call delta at a time.

use std::collections::HashMap;

use serde_json::Value;

use crate::model::{ToolCall, ToolCallFunction};

/// One normalized event produced while decoding a streaming response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    ThinkingStart,
    ThinkingUpdate(String),
    ThinkingEnd,
    AnswerUpdate(String),
}

/// Splits inline `<think>...</think>` markers out of a content fragment,
/// carrying "currently inside thinking" state across calls. Case
/// insensitive on the delimiter tags themselves, per SPEC_FULL §4.2.
#[derive(Debug, Default)]
pub struct ThinkSplitter {
    inside_thinking: bool,
    started: bool,
}

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

impl ThinkSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment of `answer`-channel text, returning the events
    /// it produces. A fragment may itself contain zero, one, or more
    /// delimiter transitions.
    pub fn feed(&mut self, mut fragment: &str) -> Vec<DecodedEvent> {
        let mut events = Vec::new();
        loop {
            if fragment.is_empty() {
                break;
            }
            if self.inside_thinking {
                match find_ci(fragment, CLOSE_TAG) {
                    Some(pos) => {
                        let (before, after) = fragment.split_at(pos);
                        if !before.is_empty() {
                            events.push(DecodedEvent::ThinkingUpdate(before.to_string()));
                        }
                        events.push(DecodedEvent::ThinkingEnd);
                        self.inside_thinking = false;
                        fragment = &after[CLOSE_TAG.len()..];
                    }
                    None => {
                        if !fragment.is_empty() {
                            events.push(DecodedEvent::ThinkingUpdate(fragment.to_string()));
                        }
                        fragment = "";
                    }
                }
            } else {
                match find_ci(fragment, OPEN_TAG) {
                    Some(pos) => {
                        let (before, after) = fragment.split_at(pos);
                        if !before.is_empty() {
                            events.push(DecodedEvent::AnswerUpdate(before.to_string()));
                        }
                        if !self.started {
                            events.push(DecodedEvent::ThinkingStart);
                            self.started = true;
                        }
                        self.inside_thinking = true;
                        fragment = &after[OPEN_TAG.len()..];
                    }
                    None => {
                        if !fragment.is_empty() {
                            events.push(DecodedEvent::AnswerUpdate(fragment.to_string()));
                        }
                        fragment = "";
                    }
                }
            }
        }
        events
    }

    /// Feed a native `thinking` field (Ollama) directly, bypassing
    /// delimiter scanning.
    pub fn feed_native_thinking(&mut self, chunk: &str) -> Vec<DecodedEvent> {
        if chunk.is_empty() {
            return Vec::new();
        }
        let mut events = Vec::new();
        if !self.started {
            events.push(DecodedEvent::ThinkingStart);
            self.started = true;
        }
        self.inside_thinking = true;
        events.push(DecodedEvent::ThinkingUpdate(chunk.to_string()));
        events
    }

    /// Call once the stream ends: closes an in-progress thinking section.
    pub fn finish(&mut self) -> Vec<DecodedEvent> {
        if self.inside_thinking {
            self.inside_thinking = false;
            vec![DecodedEvent::ThinkingEnd]
        } else {
            Vec::new()
        }
    }
}

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let haystack_lower = haystack.to_ascii_lowercase();
    let needle_lower = needle.to_ascii_lowercase();
    haystack_lower.find(&needle_lower)
}

/// Accumulates OpenAI-style streamed tool-call argument fragments keyed
/// by `(choice_index, tool_index)`, per SPEC_FULL §4.2/§9. Each key maps
/// to a growing string buffer; the JSON is parsed once, at finalization.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    order: Vec<(usize, usize)>,
    ids: HashMap<(usize, usize), String>,
    names: HashMap<(usize, usize), String>,
    buffers: HashMap<(usize, usize), String>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one OpenAI-shaped `delta.tool_calls[]` entry.
    pub fn accumulate(&mut self, choice_index: usize, delta: &Value) {
        let tool_index = delta.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
        let key = (choice_index, tool_index);
        if !self.buffers.contains_key(&key) {
            self.order.push(key);
            self.buffers.insert(key, String::new());
        }
        if let Some(id) = delta.get("id").and_then(Value::as_str) {
            self.ids.insert(key, id.to_string());
        }
        if let Some(function) = delta.get("function") {
            if let Some(name) = function.get("name").and_then(Value::as_str) {
                self.names.entry(key).or_insert_with(|| name.to_string());
            }
            if let Some(args_fragment) = function.get("arguments").and_then(Value::as_str) {
                self.buffers.entry(key).or_default().push_str(args_fragment);
            }
        }
    }

    /// Feed one Ollama-shaped native tool call object
    /// (`{function: {name, arguments: <object>}}`); re-serializes
    /// `arguments` to a JSON string for uniform downstream handling.
    pub fn accumulate_native(&mut self, choice_index: usize, native: &Value) {
        let tool_index = self.order.iter().filter(|(c, _)| *c == choice_index).count();
        let key = (choice_index, tool_index);
        self.order.push(key);
        if let Some(function) = native.get("function") {
            if let Some(name) = function.get("name").and_then(Value::as_str) {
                self.names.insert(key, name.to_string());
            }
            let args = function.get("arguments").cloned().unwrap_or(Value::Null);
            let args_str = match args {
                Value::String(s) => s,
                other => serde_json::to_string(&other).unwrap_or_else(|_| "{}".to_string()),
            };
            self.buffers.insert(key, args_str);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Parse each buffer as JSON (falling back to `{}` on parse failure)
    /// and emit the finalized tool calls in first-seen order.
    pub fn finalize(self) -> Vec<ToolCall> {
        self.order
            .into_iter()
            .map(|key| {
                let raw = self.buffers.get(&key).cloned().unwrap_or_default();
                let normalized = if raw.trim().is_empty() {
                    "{}".to_string()
                } else if serde_json::from_str::<Value>(&raw).is_ok() {
                    raw
                } else {
                    "{}".to_string()
                };
                ToolCall {
                    id: self.ids.get(&key).cloned(),
                    call_type: "function".to_string(),
                    function: ToolCallFunction {
                        name: self.names.get(&key).cloned().unwrap_or_default(),
                        arguments: normalized,
                    },
                }
            })
            .collect()
    }
}
