//! `shell` tool subprocess mechanics: already-validated commands are
//! spawned directly (POSIX) or wrapped through `powershell -Command`
//! (Windows), with a 30-second inherited timeout. Spawn/timeout/kill
//! mechanics grounded on
//! `kuksenko116-openclaw/cli-rust/src/tools/bash.rs`, adapted from a
//! single `-c <string>` shell invocation to direct-argv-or-powershell
//! dispatch per SPEC_FULL §4.6.

use std::time::Duration;

use tokio::process::Command;

use super::shell_gate::is_windows_like;

pub const SHELL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// Spawn `command`/`args` per the host OS's invocation policy and wait
/// up to `SHELL_TIMEOUT`, killing the process on timeout.
pub async fn run(command: &str, args: &[String], host_os: &str) -> Result<ProcessOutput, String> {
    let mut child = if is_windows_like(host_os) {
        let mut full_args = vec![command.to_string()];
        full_args.extend(args.iter().cloned());
        Command::new("powershell")
            .arg("-Command")
            .args(&full_args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn command: {e}"))?
    } else {
        Command::new(command)
            .args(args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn command: {e}"))?
    };

    let output = tokio::select! {
        result = child.wait_with_output() => {
            result.map_err(|e| format!("command execution error: {e}"))?
        }
        _ = tokio::time::sleep(SHELL_TIMEOUT) => {
            return Err(format!("command timed out after {}s", SHELL_TIMEOUT.as_secs()));
        }
    };

    Ok(ProcessOutput {
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        success: output.status.success(),
    })
}
