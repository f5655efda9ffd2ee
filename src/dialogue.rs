//! Dialogue Loop (C7): the iterative model-tool-model exchange.
//! Enforces iteration/failure bounds, gates continuation on user
//! confirmation, and records an append-only trace. Control-flow shape
//! grounded on `kuksenko116-openclaw/cli-rust/src/agent/mod.rs`'s
//! `run_agent_loop`, adapted to this engine's exact bounds and
//! continuation-gate semantics instead of a hard give-up.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use uuid::Uuid;

use crate::continuation;
use crate::event_sink::EventSink;
use crate::model::{
    truncate, ChatMessage, ChatRequest, ChatResponse, ContinuationDecision, ContinuationReason,
    DialogueTraceEntry, TraceKind, TraceRole, TraceStatus,
};
use crate::providers;
use crate::system_prompt;
use crate::model::REQUEST_FULLFILLED;
use crate::tools::executor::{self, ToolContext, ToolOutcome};
use crate::tools::registry::ToolRegistry;

const INITIAL_ITERATION_LIMIT: u32 = 30;
const ITERATION_LIMIT_INCREMENT: u32 = 10;
const INITIAL_FAILURE_LIMIT: u32 = 5;
const FAILURE_LIMIT_INCREMENT: u32 = 2;
const CALL_DEADLINE: Duration = Duration::from_secs(120);
const THINKING_MIRROR_LIMIT: usize = 512;
const ARG_PREVIEW_LIMIT: usize = 200;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

struct Trace {
    entries: Vec<DialogueTraceEntry>,
}

impl Trace {
    fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn push(&mut self, role: TraceRole, kind: TraceKind, title: Option<&str>, content: impl Into<String>, status: TraceStatus) {
        self.entries.push(DialogueTraceEntry {
            id: Uuid::new_v4().to_string(),
            role,
            kind,
            title: title.map(str::to_string),
            content: content.into(),
            status,
            created_at: now_ms(),
        });
    }
}

/// Injection point for the model half of the loop, mirroring
/// `continuation::Prompter` for the continuation-gate half. Lets tests
/// drive the loop's iteration/failure bounds deterministically without
/// going through a real provider (the Mock provider is a fixed,
/// spec-literal echo with no tool-call capability, so it can't do this).
trait ModelCaller: Send + Sync {
    fn call<'a>(
        &'a self,
        req: &'a ChatRequest,
        sink: &'a dyn EventSink,
    ) -> Pin<Box<dyn Future<Output = Result<ChatMessage, String>> + Send + 'a>>;
}

struct ProviderModelCaller;

impl ModelCaller for ProviderModelCaller {
    fn call<'a>(
        &'a self,
        req: &'a ChatRequest,
        sink: &'a dyn EventSink,
    ) -> Pin<Box<dyn Future<Output = Result<ChatMessage, String>> + Send + 'a>> {
        Box::pin(providers::stream(req, sink, &req.session_id))
    }
}

/// Drive one `Chat` call. Bypasses the loop entirely for the chat-only
/// fast path (SPEC_FULL §4.7); otherwise runs the bounded model-tool
/// exchange to completion, cancellation, or failure. Uses the real
/// provider dispatch and a blocking continuation prompter; see
/// `run_with` for the injectable version used by tests.
pub async fn run(
    req: ChatRequest,
    sink: &dyn EventSink,
    registry: &ToolRegistry,
    host_os: &str,
    prompter: &dyn continuation::Prompter,
) -> Result<ChatResponse, String> {
    run_with(req, sink, registry, host_os, prompter, &ProviderModelCaller).await
}

async fn run_with(
    mut req: ChatRequest,
    sink: &dyn EventSink,
    registry: &ToolRegistry,
    host_os: &str,
    prompter: &dyn continuation::Prompter,
    model_caller: &dyn ModelCaller,
) -> Result<ChatResponse, String> {
    let started = Instant::now();
    let deadline_at = started + CALL_DEADLINE;

    if req.tool_defs.is_empty() && !req.tools.is_empty() {
        req.tool_defs = registry.resolve_tool_defs(&req.tools);
    }

    if req.chat_only || req.tool_defs.is_empty() {
        let message = with_deadline(deadline_at, model_caller.call(&req, sink)).await?;
        return Ok(ChatResponse {
            message,
            latency_ms: started.elapsed().as_millis() as u64,
            trace: Vec::new(),
        });
    }

    let system_prompt = system_prompt::load_system_prompt(host_os)?;
    let mut transcript = vec![ChatMessage::system(system_prompt)];
    transcript.extend(providers::normalize_history(&req.history));
    if !req.message.trim().is_empty() {
        transcript.push(ChatMessage::user(req.message.clone()));
    }

    let mut trace = Trace::new();
    let mut iteration_limit = INITIAL_ITERATION_LIMIT;
    let mut failure_limit = INITIAL_FAILURE_LIMIT;
    let mut failure_counts: HashMap<String, u32> = HashMap::new();
    let tool_ctx = ToolContext {
        web_search_api_key: &req.web_search_api_key,
        web_search_endpoint: &req.web_search_endpoint,
        host_os,
    };

    let mut iteration: u32 = 0;
    loop {
        if iteration >= iteration_limit {
            let remaining = remaining_duration(deadline_at);
            let decision = prompter
                .prompt(
                    sink,
                    &req.session_id,
                    ContinuationReason::IterationLimit,
                    Some(iteration),
                    Some(iteration_limit),
                    None,
                    None,
                    None,
                    None,
                    remaining,
                )
                .await?;
            match decision {
                ContinuationDecision::Cancel => {
                    trace.push(TraceRole::Assistant, TraceKind::Final, None, "Cancelled after reaching the iteration limit.", TraceStatus::Cancelled);
                    return Ok(finalize(started, "Cancelled after reaching the iteration limit.", trace));
                }
                ContinuationDecision::Continue => {
                    iteration_limit += ITERATION_LIMIT_INCREMENT;
                }
            }
        }

        let mut call_req = req.clone();
        call_req.history = transcript.clone();
        call_req.message = String::new();

        let assistant = with_deadline(deadline_at, model_caller.call(&call_req, sink)).await?;
        transcript.push(assistant.clone());

        if assistant.tool_calls.is_empty() {
            trace.push(TraceRole::Assistant, TraceKind::Final, None, assistant.content.clone(), TraceStatus::Complete);
            return Ok(ChatResponse {
                message: assistant,
                latency_ms: started.elapsed().as_millis() as u64,
                trace: trace.entries,
            });
        }

        if !assistant.content.trim().is_empty() {
            sink.thinking_start(&req.session_id);
            sink.thinking_update(&req.session_id, &truncate(&assistant.content, THINKING_MIRROR_LIMIT));
            sink.thinking_end(&req.session_id);
        }

        for tool_call in &assistant.tool_calls {
            let name = tool_call.function.name.clone();
            let arguments = tool_call.function.arguments.clone();
            let tool_call_id = tool_call.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

            trace.push(
                TraceRole::Assistant,
                TraceKind::ToolCall,
                Some(&name),
                truncate(&arguments, ARG_PREVIEW_LIMIT),
                TraceStatus::Running,
            );

            if name == REQUEST_FULLFILLED {
                let summary = parse_summary(&arguments).unwrap_or_else(|| {
                    if !assistant.content.trim().is_empty() {
                        assistant.content.clone()
                    } else {
                        "Request marked complete.".to_string()
                    }
                });
                trace.push(TraceRole::Assistant, TraceKind::Final, None, summary.clone(), TraceStatus::Complete);
                return Ok(finalize(started, &summary, trace));
            }

            let parsed_args: Value = match serde_json::from_str(&arguments) {
                Ok(v) => v,
                Err(e) => {
                    trace.push(
                        TraceRole::Tool,
                        TraceKind::ToolResult,
                        Some(&name),
                        format!("invalid tool arguments: {e}"),
                        TraceStatus::Error,
                    );
                    continue;
                }
            };

            let outcome = executor::dispatch(&name, &parsed_args, &tool_ctx).await;
            trace.push(
                TraceRole::Tool,
                TraceKind::ToolResult,
                Some(&name),
                outcome.text().to_string(),
                if outcome.is_error() { TraceStatus::Error } else { TraceStatus::Done },
            );

            if let ToolOutcome::Error(detail) = &outcome {
                let failure_key = format!("{name}|{arguments}");
                let count = failure_counts.entry(failure_key.clone()).or_insert(0);
                *count += 1;
                if *count >= failure_limit {
                    let remaining = remaining_duration(deadline_at);
                    let decision = prompter
                        .prompt(
                            sink,
                            &req.session_id,
                            ContinuationReason::ToolFailures,
                            None,
                            None,
                            Some(*count),
                            Some(failure_limit),
                            Some(name.clone()),
                            Some(truncate(detail, ARG_PREVIEW_LIMIT)),
                            remaining,
                        )
                        .await?;
                    match decision {
                        ContinuationDecision::Cancel => {
                            let message = format!("Stopped after repeated {name} tool failures.");
                            trace.push(TraceRole::Assistant, TraceKind::Final, None, message.clone(), TraceStatus::Cancelled);
                            return Ok(finalize(started, &message, trace));
                        }
                        ContinuationDecision::Continue => {
                            failure_counts.insert(failure_key, 0);
                            failure_limit += FAILURE_LIMIT_INCREMENT;
                        }
                    }
                }
            }

            transcript.push(ChatMessage::tool(name.clone(), tool_call_id, outcome.text().to_string()));
        }

        iteration += 1;
    }
}

fn finalize(started: Instant, content: &str, trace: Trace) -> ChatResponse {
    ChatResponse {
        message: ChatMessage::assistant(content, vec![]),
        latency_ms: started.elapsed().as_millis() as u64,
        trace: trace.entries,
    }
}

fn parse_summary(arguments: &str) -> Option<String> {
    let value: Value = serde_json::from_str(arguments).ok()?;
    value.get("summary").and_then(Value::as_str).map(str::to_string)
}

fn remaining_duration(deadline_at: Instant) -> Duration {
    deadline_at.saturating_duration_since(Instant::now())
}

async fn with_deadline<T>(deadline_at: Instant, fut: impl std::future::Future<Output = Result<T, String>>) -> Result<T, String> {
    let remaining = remaining_duration(deadline_at);
    match tokio::time::timeout(remaining, fut).await {
        Ok(result) => result,
        Err(_) => Err("deadline exceeded".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::event_sink::{NullEventSink, RecordingEventSink};
    use crate::model::{ToolCall, ToolCallFunction};

    fn base_request(provider: &str, tools: Vec<String>, chat_only: bool) -> ChatRequest {
        ChatRequest {
            session_id: "s1".to_string(),
            provider: provider.to_string(),
            endpoint: String::new(),
            api_key: String::new(),
            model: "test-model".to_string(),
            message: "hello world".to_string(),
            history: vec![],
            tools,
            tool_defs: vec![],
            chat_only,
            web_search_api_key: String::new(),
            web_search_endpoint: String::new(),
        }
    }

    #[tokio::test]
    async fn mock_chat_only_bypasses_loop_with_empty_trace() {
        let req = base_request("mock", vec!["web_search".to_string(), "shell".to_string()], true);
        let sink = NullEventSink;
        let registry = ToolRegistry::with_builtin_defaults();
        let response = run(req, &sink, &registry, "linux", &continuation::AutoContinuePrompter).await.unwrap();
        assert_eq!(response.message.content, "[mock mock/test-model] hello world");
        assert!(response.trace.is_empty());
    }

    #[tokio::test]
    async fn mock_with_no_tools_enabled_bypasses_loop() {
        let req = base_request("mock", vec![], false);
        let sink = NullEventSink;
        let registry = ToolRegistry::with_builtin_defaults();
        let response = run(req, &sink, &registry, "linux", &continuation::AutoContinuePrompter).await.unwrap();
        assert!(response.trace.is_empty());
    }

    /// A fake `ModelCaller` that replies with a `shell` tool call for the
    /// first `threshold` turns, then a `request_fullfilled` call --
    /// enough to push the loop past the iteration limit exactly once.
    struct CountingShellCaller {
        calls: AtomicUsize,
        threshold: usize,
    }

    impl ModelCaller for CountingShellCaller {
        fn call<'a>(
            &'a self,
            _req: &'a ChatRequest,
            _sink: &'a dyn EventSink,
        ) -> Pin<Box<dyn Future<Output = Result<ChatMessage, String>> + Send + 'a>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let threshold = self.threshold;
            Box::pin(async move {
                if n < threshold {
                    Ok(ChatMessage::assistant(
                        "",
                        vec![ToolCall {
                            id: None,
                            call_type: "function".to_string(),
                            function: ToolCallFunction {
                                name: "shell".to_string(),
                                arguments: "{\"command\":\"echo\",\"args\":[\"ok\"]}".to_string(),
                            },
                        }],
                    ))
                } else {
                    Ok(ChatMessage::assistant(
                        "",
                        vec![ToolCall {
                            id: None,
                            call_type: "function".to_string(),
                            function: ToolCallFunction {
                                name: REQUEST_FULLFILLED.to_string(),
                                arguments: "{\"summary\":\"done\"}".to_string(),
                            },
                        }],
                    ))
                }
            })
        }
    }

    #[tokio::test]
    async fn iteration_limit_gate_fires_once_then_raises_the_limit_to_40() {
        if crate::tools::shell_gate::is_windows_like(std::env::consts::OS) {
            return;
        }
        let req = base_request("mock", vec!["shell".to_string()], false);
        let sink = RecordingEventSink::new();
        let registry = ToolRegistry::with_builtin_defaults();
        let caller = CountingShellCaller { calls: AtomicUsize::new(0), threshold: INITIAL_ITERATION_LIMIT as usize };

        let response = run_with(req, &sink, &registry, "linux", &continuation::AutoContinuePrompter, &caller)
            .await
            .unwrap();

        assert_eq!(response.message.content, "done");
        let events = sink.snapshot();
        assert_eq!(events.iter().filter(|e| e.starts_with("ContinuationRequest")).count(), 1);
        assert_eq!(events.iter().filter(|e| e.starts_with("ContinuationResolved")).count(), 1);
        // 30 shell turns to trip the gate, plus 1 more to reach request_fullfilled
        // under the raised 40 limit.
        assert_eq!(caller.calls.load(Ordering::SeqCst), INITIAL_ITERATION_LIMIT as usize + 1);
    }

    /// A fake `ModelCaller` that replies with a tool call the shell gate
    /// (C6) deterministically rejects without spawning a process, for
    /// `threshold` turns, then a `request_fullfilled` call.
    struct AlwaysFailingShellCaller {
        calls: AtomicUsize,
        threshold: usize,
    }

    impl ModelCaller for AlwaysFailingShellCaller {
        fn call<'a>(
            &'a self,
            _req: &'a ChatRequest,
            _sink: &'a dyn EventSink,
        ) -> Pin<Box<dyn Future<Output = Result<ChatMessage, String>> + Send + 'a>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let threshold = self.threshold;
            Box::pin(async move {
                if n < threshold {
                    Ok(ChatMessage::assistant(
                        "",
                        vec![ToolCall {
                            id: None,
                            call_type: "function".to_string(),
                            function: ToolCallFunction {
                                name: "shell".to_string(),
                                arguments: "{\"command\":\"rm\",\"args\":[\"-rf\",\"/\"]}".to_string(),
                            },
                        }],
                    ))
                } else {
                    Ok(ChatMessage::assistant(
                        "",
                        vec![ToolCall {
                            id: None,
                            call_type: "function".to_string(),
                            function: ToolCallFunction {
                                name: REQUEST_FULLFILLED.to_string(),
                                arguments: "{\"summary\":\"stopped\"}".to_string(),
                            },
                        }],
                    ))
                }
            })
        }
    }

    #[tokio::test]
    async fn tool_failures_gate_fires_after_five_identical_failures() {
        let req = base_request("mock", vec!["shell".to_string()], false);
        let sink = RecordingEventSink::new();
        let registry = ToolRegistry::with_builtin_defaults();
        let caller = AlwaysFailingShellCaller { calls: AtomicUsize::new(0), threshold: INITIAL_FAILURE_LIMIT as usize };

        let response = run_with(req, &sink, &registry, "linux", &continuation::AutoContinuePrompter, &caller)
            .await
            .unwrap();

        assert_eq!(response.message.content, "stopped");
        let events = sink.snapshot();
        assert_eq!(events.iter().filter(|e| e.starts_with("ContinuationRequest")).count(), 1);
        assert_eq!(events.iter().filter(|e| e.starts_with("ContinuationResolved")).count(), 1);
        assert_eq!(caller.calls.load(Ordering::SeqCst), INITIAL_FAILURE_LIMIT as usize + 1);
    }

    #[test]
    fn parse_summary_reads_the_summary_field() {
        assert_eq!(parse_summary("{\"summary\":\"done\"}"), Some("done".to_string()));
        assert_eq!(parse_summary("not json"), None);
        assert_eq!(parse_summary("{}"), None);
    }

    #[test]
    fn failure_key_combines_name_and_arguments() {
        let key = format!("{}|{}", "shell", "{\"command\":\"bad\"}");
        assert_eq!(key, "shell|{\"command\":\"bad\"}");
    }
}
