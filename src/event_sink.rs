//! Event Sink (C3): the narrow capability set the Dialogue Loop and
//! Continuation Prompter push through to drive the UI. Two
//! implementations: a Tauri `AppHandle`-backed sink used at runtime, and
//! a no-op sink used in tests. Event names are literal strings matching
//! the UI's subscription keys.

use serde_json::{json, Value};
use tauri::{AppHandle, Emitter};

use crate::model::{ContinuationRequest, ContinuationResolved};

pub const EVT_THINKING_START: &str = "thinking:start";
pub const EVT_THINKING_UPDATE: &str = "thinking:update";
pub const EVT_THINKING_END: &str = "thinking:end";
pub const EVT_ANSWER_UPDATE: &str = "answer:update";
pub const EVT_CONTINUATION_REQUEST: &str = "dialogue:continuation_request";
pub const EVT_CONTINUATION_RESOLVED: &str = "dialogue:continuation_resolved";

pub trait EventSink: Send + Sync {
    fn thinking_start(&self, session_id: &str);
    fn thinking_update(&self, session_id: &str, chunk: &str);
    fn thinking_end(&self, session_id: &str);
    fn answer_update(&self, session_id: &str, chunk: &str);
    fn continuation_request(&self, payload: &ContinuationRequest);
    fn continuation_resolved(&self, payload: &ContinuationResolved);
}

/// Runtime sink: emits over the Tauri app handle's event bus, keyed by
/// the literal event names above.
pub struct TauriEventSink {
    app_handle: AppHandle,
}

impl TauriEventSink {
    pub fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }
}

impl EventSink for TauriEventSink {
    fn thinking_start(&self, session_id: &str) {
        let _ = self
            .app_handle
            .emit(EVT_THINKING_START, json!({ "sessionId": session_id }));
    }

    fn thinking_update(&self, session_id: &str, chunk: &str) {
        if chunk.trim().is_empty() {
            return;
        }
        let _ = self.app_handle.emit(
            EVT_THINKING_UPDATE,
            json!({ "sessionId": session_id, "chunk": chunk }),
        );
    }

    fn thinking_end(&self, session_id: &str) {
        let _ = self
            .app_handle
            .emit(EVT_THINKING_END, json!({ "sessionId": session_id }));
    }

    fn answer_update(&self, session_id: &str, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        let _ = self.app_handle.emit(
            EVT_ANSWER_UPDATE,
            json!({ "sessionId": session_id, "chunk": chunk }),
        );
    }

    fn continuation_request(&self, payload: &ContinuationRequest) {
        let value: Value = serde_json::to_value(payload).unwrap_or(Value::Null);
        let _ = self.app_handle.emit(EVT_CONTINUATION_REQUEST, value);
    }

    fn continuation_resolved(&self, payload: &ContinuationResolved) {
        let value: Value = serde_json::to_value(payload).unwrap_or(Value::Null);
        let _ = self.app_handle.emit(EVT_CONTINUATION_RESOLVED, value);
    }
}

/// No-op sink used by default in tests; records nothing, drops
/// everything. A recording variant is provided below for tests that do
/// need to assert on emitted events.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn thinking_start(&self, _session_id: &str) {}
    fn thinking_update(&self, _session_id: &str, _chunk: &str) {}
    fn thinking_end(&self, _session_id: &str) {}
    fn answer_update(&self, _session_id: &str, _chunk: &str) {}
    fn continuation_request(&self, _payload: &ContinuationRequest) {}
    fn continuation_resolved(&self, _payload: &ContinuationResolved) {}
}

/// Test-only sink that records every call in order, so loop/decoder
/// tests can assert on the exact event sequence (SPEC_FULL §8 scenario
/// 5: inline thinking split).
#[cfg(test)]
pub struct RecordingEventSink {
    pub events: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
impl EventSink for RecordingEventSink {
    fn thinking_start(&self, _session_id: &str) {
        self.events.lock().unwrap().push("ThinkingStart".to_string());
    }
    fn thinking_update(&self, _session_id: &str, chunk: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("ThinkingUpdate({chunk})"));
    }
    fn thinking_end(&self, _session_id: &str) {
        self.events.lock().unwrap().push("ThinkingEnd".to_string());
    }
    fn answer_update(&self, _session_id: &str, chunk: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("AnswerUpdate({chunk})"));
    }
    fn continuation_request(&self, payload: &ContinuationRequest) {
        self.events
            .lock()
            .unwrap()
            .push(format!("ContinuationRequest({})", payload.request_id));
    }
    fn continuation_resolved(&self, payload: &ContinuationResolved) {
        self.events
            .lock()
            .unwrap()
            .push(format!("ContinuationResolved({})", payload.request_id));
    }
}
