//! Dialogue Orchestration Engine -- a Tauri backend crate brokering a
//! tool-augmented, multi-turn dialogue between a user and one of
//! several LLM back ends. See `SPEC_FULL.md` for the full design; in
//! short, `dialogue::run` (C7) drives `providers::*` (C1/C2) and
//! `tools::*` (C4/C5/C6) and reports progress through `event_sink`
//! (C3), with `commands::*` (C10) exposing all of it to the UI process
//! over the `IpcResponse` envelope.

pub mod commands;
pub mod config;
pub mod continuation;
pub mod dialogue;
pub mod event_sink;
pub mod model;
pub mod providers;
pub mod services;
pub mod system_prompt;
pub mod tools;

use tauri::Manager;
use tracing_subscriber::EnvFilter;

use crate::tools::registry::ToolRegistry;

/// Initialize `tracing`: an `EnvFilter` defaulting to `info` (override
/// via `RUST_LOG`), plus a daily-rolling log file under the platform
/// log directory, mirroring this codebase's existing logging setup
/// (SPEC_FULL §1.1).
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = services::platform::get_log_dir();
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "dialogue-engine.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    guard
}

/// Build the Tool Registry (C4) seeded with builtin defaults, then
/// apply any persisted `tools.enabled` overrides from `AppConfig` so a
/// user's prior `SetToolEnabled` choices survive a restart.
fn build_tool_registry() -> ToolRegistry {
    let registry = ToolRegistry::with_builtin_defaults();
    let config = commands::config::get_config_snapshot();
    registry.apply_enabled_overrides(&config.tools.enabled);
    registry
}

/// Entry point invoked by `main.rs`. Kept separate from `main` so the
/// crate is usable as a library target (`cdylib`/`staticlib`) as well
/// as a binary, matching this codebase's existing split.
pub fn run() {
    // Leaked deliberately: the guard must outlive the whole process, and
    // there is no natural owner for it once `run` hands control to the
    // Tauri event loop.
    let guard = init_tracing();
    std::mem::forget(guard);

    tracing::info!("starting dialogue-engine");

    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            if let Some(window) = app.get_webview_window("main") {
                let _ = window.set_focus();
            }
        }))
        .manage(build_tool_registry())
        .invoke_handler(tauri::generate_handler![
            commands::dialogue::chat,
            commands::dialogue::list_models,
            commands::dialogue::get_tools,
            commands::dialogue::set_tool_enabled,
            commands::dialogue::run_shell_command,
            commands::dialogue::resolve_continuation,
            commands::config::get_config,
            commands::config::set_config,
            commands::config::reset_config,
            commands::config::get_platform_info,
        ])
        .run(tauri::generate_context!())
        .expect("error while running the dialogue-engine application");
}
