//! Host Bridge commands (C10) wiring the Dialogue Loop (C7), Provider
//! Clients (C1), Tool Registry (C4), Tool Executor (C5), and
//! Continuation Prompter (C8) to the UI process. The RPC table matches
//! SPEC_FULL §6.

use tauri::{AppHandle, State};

use crate::continuation;
use crate::event_sink::TauriEventSink;
use crate::model::{ChatRequest, ContinuationDecision};
use crate::providers;
use crate::services::platform;
use crate::tools::registry::ToolRegistry;

use super::config::get_config_snapshot;
use super::IpcResponse;

/// Fill provider/endpoint/api-key/model and web-search defaults from the
/// persisted `AppConfig` wherever the incoming request left them blank
/// (SPEC_FULL §2 / §3.1: the Host Bridge is the only caller of `Chat`
/// and the only thing that reads config defaults).
fn apply_config_defaults(mut req: ChatRequest) -> ChatRequest {
    let config = get_config_snapshot();
    if req.provider.trim().is_empty() {
        req.provider = config.ai.provider.clone();
    }
    if req.endpoint.trim().is_empty() {
        req.endpoint = config.ai.endpoint.clone();
    }
    if req.api_key.trim().is_empty() {
        req.api_key = config.ai.api_key.clone();
    }
    if req.model.trim().is_empty() {
        req.model = config.ai.model.clone();
    }
    if req.web_search_api_key.trim().is_empty() {
        req.web_search_api_key = config.tools.web_search_api_key.clone();
    }
    if req.web_search_endpoint.trim().is_empty() {
        req.web_search_endpoint = config.tools.web_search_endpoint.clone();
    }
    req
}

/// Drive one dialogue exchange to completion, per SPEC_FULL §4.7.
#[tauri::command]
pub async fn chat(
    request: ChatRequest,
    app: AppHandle,
    registry: State<'_, ToolRegistry>,
) -> Result<IpcResponse, ()> {
    let request = apply_config_defaults(request);
    let sink = TauriEventSink::new(app);
    let host_os = platform::get_os_name();

    match crate::dialogue::run(request, &sink, &registry, host_os, &continuation::InteractivePrompter).await {
        Ok(response) => Ok(IpcResponse::ok(response)),
        Err(e) => Ok(IpcResponse::err(e)),
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsQuery {
    provider: String,
    #[serde(default)]
    endpoint: String,
    #[serde(default, rename = "apiKey")]
    api_key: String,
}

/// List model ids available from a provider/endpoint (SPEC_FULL §6).
#[tauri::command]
pub async fn list_models(query: ModelsQuery) -> Result<IpcResponse, ()> {
    match providers::list_models(&query.provider, &query.endpoint, &query.api_key).await {
        Ok(models) => Ok(IpcResponse::ok(serde_json::json!({ "models": models }))),
        Err(e) => Ok(IpcResponse::err(e)),
    }
}

/// Snapshot the Tool Registry in insertion order.
#[tauri::command]
pub fn get_tools(registry: State<'_, ToolRegistry>) -> IpcResponse {
    IpcResponse::ok(registry.list())
}

/// Flip one tool's enabled flag and return the updated catalog.
#[tauri::command]
pub fn set_tool_enabled(id: String, enabled: bool, registry: State<'_, ToolRegistry>) -> IpcResponse {
    match registry.set_enabled(&id, enabled) {
        Ok(_) => IpcResponse::ok(registry.list()),
        Err(e) => IpcResponse::err(e),
    }
}

/// Run a single shell command outside the dialogue loop, used by the
/// UI's developer console. Refuses when `chat_only` is set, since that
/// mode is meant to bypass tool execution entirely.
#[tauri::command]
pub async fn run_shell_command(command: String, args: Vec<String>, chat_only: bool) -> IpcResponse {
    if chat_only {
        return IpcResponse::err("shell commands are disabled in chat-only mode");
    }
    let host_os = platform::get_os_name();
    if let Err(e) = crate::tools::shell_gate::validate(&command, &args, host_os) {
        return IpcResponse::err(e);
    }
    match crate::tools::shell::run(&command, &args, host_os).await {
        Ok(output) if output.success => IpcResponse::ok(output.stdout),
        Ok(output) => IpcResponse::err(format!("{}\nStderr: {}", output.stdout, output.stderr)),
        Err(e) => IpcResponse::err(e),
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveContinuationRequest {
    #[allow(dead_code)]
    session_id: String,
    request_id: String,
    decision: ContinuationDecision,
}

/// Resolve a pending continuation request raised by the Dialogue Loop
/// (SPEC_FULL §4.8).
#[tauri::command]
pub fn resolve_continuation(payload: ResolveContinuationRequest) -> IpcResponse {
    match continuation::resolve(&payload.request_id, payload.decision) {
        Ok(()) => IpcResponse::ok_empty(),
        Err(e) => IpcResponse::err(e),
    }
}
