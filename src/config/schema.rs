//! Persisted application settings (C9). `AppConfig` is deep-merged from
//! `config_dir/config.json` onto `AppConfig::default()` by
//! `persistence::load_config`, so new fields added here automatically pick
//! up defaults for users with an older saved file.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub ai: AiConfig,
    pub tools: ToolsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ai: AiConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Defaults used to fill a `ChatRequest` when the Host Bridge receives a
/// partial one (SPEC_FULL §3.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    pub provider: String,
    pub endpoint: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            endpoint: String::new(),
            api_key: String::new(),
            model: String::new(),
        }
    }
}

/// Tool-related defaults and persisted enablement overrides, keyed by
/// tool id. Unknown ids are tolerated at apply time (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    #[serde(rename = "webSearchApiKey")]
    pub web_search_api_key: String,
    #[serde(rename = "webSearchEndpoint")]
    pub web_search_endpoint: String,
    pub enabled: HashMap<String, bool>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            web_search_api_key: String::new(),
            web_search_endpoint: String::new(),
            enabled: HashMap::new(),
        }
    }
}
