//! Shell Safety Gate (C6): a denylist of dangerous substrings, checked
//! before any process is spawned. Deliberately not the allowlist-of-
//! known-safe-commands model this codebase's sibling agent examples use
//! elsewhere -- the threat model here is catching a model tricked into a
//! catastrophic one-liner, not restricting the model's vocabulary.

const DANGEROUS_SUBSTRINGS: &[&str] = &[
    "rm -rf /",
    "rm -rf C:\\",
    "mkfs",
    "dd if=",
    ":(){ :|:& };:",
];

const WINDOWS_PROTECTED_PATHS: &[&str] = &["C:\\Windows", "C:\\Program Files"];

pub fn is_windows_like(host_os: &str) -> bool {
    host_os.eq_ignore_ascii_case("windows")
}

/// Validate a command + args before execution, per SPEC_FULL §4.6.
/// `host_os` is one of the detected host OS strings (see
/// `services::platform::get_os_name`).
pub fn validate(command: &str, args: &[String], host_os: &str) -> Result<(), String> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err("command cannot be empty".to_string());
    }

    let full = format!("{} {}", trimmed, args.join(" "));

    for pattern in DANGEROUS_SUBSTRINGS {
        if full.contains(pattern) {
            return Err(format!("refused: command contains disallowed pattern '{pattern}'"));
        }
    }

    if is_windows_like(host_os) {
        for protected in WINDOWS_PROTECTED_PATHS {
            if full.contains(protected) {
                return Err(format!("refused: command touches protected path '{protected}'"));
            }
        }
    } else {
        let trimmed_full = full.trim();
        if trimmed_full == "rm -rf /" || trimmed_full.starts_with("rm -rf /") {
            return Err("refused: command contains disallowed pattern 'rm -rf /'".to_string());
        }
    }

    Ok(())
}
