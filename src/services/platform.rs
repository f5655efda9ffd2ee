use std::path::PathBuf;

/// App name used in platform paths.
const APP_NAME: &str = "dialogue-engine";

/// Get the platform-appropriate configuration directory.
///
/// - Windows: `%APPDATA%\dialogue-engine\`
/// - macOS:   `~/Library/Application Support/dialogue-engine/`
/// - Linux:   `~/.config/dialogue-engine/`
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the platform-appropriate data directory.
///
/// - Windows: `%APPDATA%\dialogue-engine\data\`
/// - macOS:   `~/Library/Application Support/dialogue-engine/data/`
/// - Linux:   `~/.local/share/dialogue-engine/data/`
pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(get_config_dir)
        .join(APP_NAME)
        .join("data")
}

/// Get the platform-appropriate log directory.
///
/// - Windows: `%APPDATA%\dialogue-engine\logs\`
/// - macOS:   `~/Library/Application Support/dialogue-engine/logs\`
/// - Linux:   `~/.local/share/dialogue-engine/logs/`
///
/// Falls back to `{data_dir}/logs` if data_dir is available.
pub fn get_log_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(get_config_dir)
        .join(APP_NAME)
        .join("logs")
}

/// Get the platform-appropriate cache directory.
///
/// - Windows: `%LOCALAPPDATA%\dialogue-engine\cache\`
/// - macOS:   `~/Library/Caches/dialogue-engine/`
/// - Linux:   `~/.cache/dialogue-engine/`
pub fn get_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| get_config_dir().join("cache"))
        .join(APP_NAME)
}

/// Get the OS name as a string, used both for platform-info display and
/// as the `host_os` fed into the shell gate (C6) and system prompt.
pub fn get_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else {
        "linux"
    }
}

/// Get the CPU architecture as a string.
pub fn get_arch() -> &'static str {
    if cfg!(target_arch = "x86_64") {
        "x64"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else if cfg!(target_arch = "x86") {
        "x86"
    } else {
        std::env::consts::ARCH
    }
}
