use std::fs;
use std::path::Path;

use serde_json::Value;

use super::schema::AppConfig;

/// Load config from disk, falling back to defaults.
///
/// Reads `config.json` from the given directory. If the file exists, its
/// contents are deep-merged on top of `AppConfig::default()` so that any
/// newly-added config keys automatically get their default values.
///
/// If the main config is corrupt or missing, tries `config.json.bak`.
/// If both fail, returns `AppConfig::default()`.
pub fn load_config(config_dir: &Path) -> AppConfig {
    let config_path = config_dir.join("config.json");
    let backup_path = config_dir.join("config.json.bak");

    // Try main config first, then backup
    for path in &[&config_path, &backup_path] {
        if path.exists() {
            if let Ok(text) = fs::read_to_string(path) {
                if let Ok(saved) = serde_json::from_str::<Value>(&text) {
                    let default_val = match serde_json::to_value(AppConfig::default()) {
                        Ok(v) => v,
                        Err(_) => return AppConfig::default(),
                    };
                    let merged = deep_merge(default_val, saved);
                    if let Ok(config) = serde_json::from_value::<AppConfig>(merged) {
                        return config;
                    }
                }
            }
        }
    }

    AppConfig::default()
}

/// Save config to disk with atomic write.
///
/// Strategy: write to `.tmp`, backup existing to `.bak`, rename `.tmp` to final.
/// This ensures the config file is never in a partially-written state.
pub fn save_config(config_dir: &Path, config: &AppConfig) -> Result<(), String> {
    // Ensure config directory exists
    fs::create_dir_all(config_dir)
        .map_err(|e| format!("Failed to create config directory: {}", e))?;

    let config_path = config_dir.join("config.json");
    let tmp_path = config_dir.join("config.json.tmp");
    let backup_path = config_dir.join("config.json.bak");

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Serialize error: {}", e))?;

    // Step 1: Write to temp file
    fs::write(&tmp_path, &json)
        .map_err(|e| format!("Write error: {}", e))?;

    // Step 2: Backup existing config (best-effort)
    if config_path.exists() {
        let _ = fs::copy(&config_path, &backup_path);
    }

    // Step 3: Atomic rename tmp -> config
    fs::rename(&tmp_path, &config_path)
        .map_err(|e| format!("Rename error: {}", e))?;

    Ok(())
}

/// Deep merge two JSON values.
///
/// Recursively merges `patch` into `base`. For objects, keys from `patch`
/// are merged recursively; for all other types, `patch` replaces `base`.
/// Arrays are replaced, not concatenated (matching JS behavior).
pub fn deep_merge(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base_map), Value::Object(patch_map)) => {
            for (key, patch_val) in patch_map {
                let merged = if let Some(base_val) = base_map.remove(&key) {
                    deep_merge(base_val, patch_val)
                } else {
                    patch_val
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        // For non-object types, patch wins
        (_base, patch) => patch,
    }
}
