//! Tool Executor (C5): dispatches a decoded tool invocation by name.
//! `request_fullfilled` is never dispatched here -- it is intercepted
//! earlier by the Dialogue Loop (§4.7).

use serde_json::Value;

use super::{browser, shell, shell_gate, web_search};

const MAX_RESULT_BYTES: usize = 2 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Done(String),
    Error(String),
}

impl ToolOutcome {
    pub fn text(&self) -> &str {
        match self {
            ToolOutcome::Done(t) | ToolOutcome::Error(t) => t,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Error(_))
    }

    fn truncated(self) -> Self {
        match self {
            ToolOutcome::Done(t) => ToolOutcome::Done(crate::model::truncate(&t, MAX_RESULT_BYTES)),
            ToolOutcome::Error(t) => ToolOutcome::Error(crate::model::truncate(&t, MAX_RESULT_BYTES)),
        }
    }
}

/// Execution context the loop threads through to the executor: web
/// search credentials and the detected host OS for shell dispatch.
pub struct ToolContext<'a> {
    pub web_search_api_key: &'a str,
    pub web_search_endpoint: &'a str,
    pub host_os: &'a str,
}

pub async fn dispatch(name: &str, args: &Value, ctx: &ToolContext<'_>) -> ToolOutcome {
    let outcome = match name {
        "browser" => match browser::fetch(args).await {
            Ok(text) => ToolOutcome::Done(text),
            Err(e) => ToolOutcome::Error(e),
        },
        "web_search" => {
            match web_search::search(args, ctx.web_search_api_key, ctx.web_search_endpoint).await {
                Ok(text) => ToolOutcome::Done(text),
                Err(e) => ToolOutcome::Error(e),
            }
        }
        "shell" => run_shell(args, ctx.host_os).await,
        other => ToolOutcome::Error(format!("unknown tool: {other}")),
    };
    outcome.truncated()
}

async fn run_shell(args: &Value, host_os: &str) -> ToolOutcome {
    let command = match args.get("command").and_then(Value::as_str).map(str::trim) {
        Some(c) if !c.is_empty() => c,
        _ => return ToolOutcome::Error("missing required 'command' argument".to_string()),
    };

    let shell_args: Vec<String> = args
        .get("args")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    if let Err(e) = shell_gate::validate(command, &shell_args, host_os) {
        return ToolOutcome::Error(e);
    }

    match shell::run(command, &shell_args, host_os).await {
        Ok(output) if output.success => {
            let combined = if output.stdout.is_empty() && output.stderr.is_empty() {
                "(no output)".to_string()
            } else if output.stderr.is_empty() {
                output.stdout
            } else {
                format!("{}\nStderr: {}", output.stdout, output.stderr)
            };
            ToolOutcome::Done(combined)
        }
        Ok(output) => {
            let combined = if output.stdout.is_empty() && output.stderr.is_empty() {
                "(command failed with no output)".to_string()
            } else {
                format!("{}\nStderr: {}", output.stdout, output.stderr)
            };
            ToolOutcome::Error(combined)
        }
        Err(e) => ToolOutcome::Error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ToolContext<'static> {
        ToolContext {
            web_search_api_key: "",
            web_search_endpoint: "",
            host_os: "linux",
        }
    }

    #[tokio::test]
    async fn unknown_tool_name_errors() {
        let outcome = dispatch("not_a_tool", &json!({}), &ctx()).await;
        assert!(outcome.is_error());
    }

    #[tokio::test]
    async fn shell_missing_command_errors() {
        let outcome = dispatch("shell", &json!({}), &ctx()).await;
        assert!(outcome.is_error());
        assert!(outcome.text().contains("command"));
    }

    #[tokio::test]
    async fn shell_rejects_validator_failures_without_spawning() {
        let outcome = dispatch(
            "shell",
            &json!({"command": "rm", "args": ["-rf", "/"]}),
            &ctx(),
        )
        .await;
        assert!(outcome.is_error());
    }

    #[tokio::test]
    async fn shell_echo_succeeds_on_posix() {
        if shell_gate::is_windows_like(std::env::consts::OS) {
            return;
        }
        let outcome = dispatch("shell", &json!({"command": "echo", "args": ["hi"]}), &ctx()).await;
        assert_eq!(outcome, ToolOutcome::Done("hi".to_string()));
    }

    #[tokio::test]
    async fn truncation_applies_to_long_results() {
        if shell_gate::is_windows_like(std::env::consts::OS) {
            return;
        }
        let long = "x".repeat(MAX_RESULT_BYTES + 500);
        let outcome = dispatch("shell", &json!({"command": "printf", "args": [long]}), &ctx()).await;
        assert!(outcome.text().chars().count() <= MAX_RESULT_BYTES);
    }
}
