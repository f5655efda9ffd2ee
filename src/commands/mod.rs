//! Host Bridge (C10): `#[tauri::command]` entry points wiring the
//! orchestration engine (C1-C9) to the UI process, all returning the
//! uniform `IpcResponse` envelope used across this codebase's command
//! modules (SPEC_FULL §3.1 / §6).

pub mod config;
pub mod dialogue;

use serde::Serialize;
use serde_json::Value;

/// Uniform `{success, data, error}` envelope returned by every Host
/// Bridge command.
#[derive(Debug, Clone, Serialize)]
pub struct IpcResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IpcResponse {
    /// A successful response carrying a payload.
    pub fn ok(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                data: Some(value),
                error: None,
            },
            Err(e) => Self::err(format!("failed to serialize response: {e}")),
        }
    }

    /// A successful response carrying no payload.
    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    /// A failed response carrying a human-readable message.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}
