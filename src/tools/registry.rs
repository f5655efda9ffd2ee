//! Tool Registry (C4): a flat, insertion-ordered `id -> ToolMetadata`
//! map. Simplified down from this codebase's existing `ToolRegistry`
//! (`mcp/tools.rs`), which groups tools into keyword-triggered bundles
//! for a much larger voice-assistant tool catalog -- that machinery has
//! no job left once the catalog is four always-loaded tools.

use std::sync::RwLock;

use serde_json::json;

use crate::model::{request_fullfilled_definition, ToolDefinition, ToolFunctionSchema, ToolMetadata, REQUEST_FULLFILLED};

pub struct ToolRegistry {
    // Preserves insertion order; entries are never removed, only mutated.
    entries: RwLock<Vec<ToolMetadata>>,
}

impl ToolRegistry {
    /// Build a registry seeded with the builtin default set (SPEC_FULL
    /// §4.4): `shell` (hidden), `browser` (visible), `web_search`
    /// (visible, requires an API key to be enabled), `request_fullfilled`
    /// (hidden, always enabled).
    pub fn with_builtin_defaults() -> Self {
        let entries = vec![
            ToolMetadata {
                id: "browser".to_string(),
                name: "browser".to_string(),
                description: "Fetch a web page by URL, bounded to a byte limit.".to_string(),
                ui_visible: true,
                enabled: true,
                definition: browser_definition(),
            },
            ToolMetadata {
                id: "web_search".to_string(),
                name: "web_search".to_string(),
                description: "Search the web via Brave Search.".to_string(),
                ui_visible: true,
                enabled: false,
                definition: web_search_definition(),
            },
            ToolMetadata {
                id: "shell".to_string(),
                name: "shell".to_string(),
                description: "Run a validated shell command.".to_string(),
                ui_visible: false,
                enabled: true,
                definition: shell_definition(),
            },
            ToolMetadata {
                id: REQUEST_FULLFILLED.to_string(),
                name: REQUEST_FULLFILLED.to_string(),
                description: "Signal request completion.".to_string(),
                ui_visible: false,
                enabled: true,
                definition: request_fullfilled_definition(),
            },
        ];
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Apply persisted `tools.enabled` overrides from `AppConfig` at
    /// startup. An override naming an unknown tool id is ignored, since
    /// config files are allowed to carry stale entries.
    pub fn apply_enabled_overrides(&self, overrides: &std::collections::HashMap<String, bool>) {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        for entry in guard.iter_mut() {
            if let Some(enabled) = overrides.get(&entry.id) {
                entry.enabled = *enabled;
            } else {
                tracing::debug!("no override for tool '{}'; keeping default", entry.id);
            }
        }
    }

    /// Snapshot all entries in insertion order.
    pub fn list(&self) -> Vec<ToolMetadata> {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Snapshot a single entry.
    pub fn get(&self, id: &str) -> Option<ToolMetadata> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    /// Flip a tool's enabled flag, returning the new value.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<bool, String> {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match guard.iter_mut().find(|t| t.id == id) {
            Some(entry) => {
                entry.enabled = enabled;
                Ok(entry.enabled)
            }
            None => Err("unknown tool".to_string()),
        }
    }

    /// Resolve a list of enabled tool ids into `ToolDefinition`s,
    /// skipping unknown or disabled ids, always appending
    /// `request_fullfilled` per SPEC_FULL §4.7.
    pub fn resolve_tool_defs(&self, ids: &[String]) -> Vec<ToolDefinition> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut defs: Vec<ToolDefinition> = ids
            .iter()
            .filter_map(|id| {
                guard
                    .iter()
                    .find(|t| &t.id == id && t.enabled && t.id != REQUEST_FULLFILLED)
                    .map(|t| t.definition.clone())
            })
            .collect();
        if !defs.is_empty() {
            defs.push(request_fullfilled_definition());
        }
        defs
    }
}

fn browser_definition() -> ToolDefinition {
    ToolDefinition {
        def_type: "function".to_string(),
        function: ToolFunctionSchema {
            name: "browser".to_string(),
            description: "Fetch a web page by URL and return a bounded prefix of its body."
                .to_string(),
            parameters: json!({
                "type": "object",
                "required": ["url"],
                "properties": {
                    "url": { "type": "string", "description": "The URL to fetch." },
                    "maxBytes": { "type": "number", "description": "Max bytes to read (default 2048)." }
                }
            }),
            strict: None,
        },
    }
}

fn web_search_definition() -> ToolDefinition {
    ToolDefinition {
        def_type: "function".to_string(),
        function: ToolFunctionSchema {
            name: "web_search".to_string(),
            description: "Search the web and return a numbered list of results.".to_string(),
            parameters: json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": { "type": "string" },
                    "count": { "type": "number", "description": "Number of results, 1-20 (default 3)." }
                }
            }),
            strict: None,
        },
    }
}

fn shell_definition() -> ToolDefinition {
    ToolDefinition {
        def_type: "function".to_string(),
        function: ToolFunctionSchema {
            name: "shell".to_string(),
            description: "Run a validated shell command and return its combined output."
                .to_string(),
            parameters: json!({
                "type": "object",
                "required": ["command"],
                "properties": {
                    "command": { "type": "string" },
                    "args": { "type": "array", "items": { "type": "string" } }
                }
            }),
            strict: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults_have_expected_visibility_and_enablement() {
        let registry = ToolRegistry::with_builtin_defaults();
        let shell = registry.get("shell").unwrap();
        assert!(!shell.ui_visible);
        assert!(shell.enabled);

        let browser = registry.get("browser").unwrap();
        assert!(browser.ui_visible);
        assert!(browser.enabled);

        let web_search = registry.get("web_search").unwrap();
        assert!(web_search.ui_visible);
        assert!(!web_search.enabled);

        let rf = registry.get(REQUEST_FULLFILLED).unwrap();
        assert!(!rf.ui_visible);
        assert!(rf.enabled);
    }

    #[test]
    fn list_preserves_insertion_order() {
        let registry = ToolRegistry::with_builtin_defaults();
        let ids: Vec<String> = registry.list().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["browser", "web_search", "shell", REQUEST_FULLFILLED]);
    }

    #[test]
    fn set_enabled_unknown_tool_errors() {
        let registry = ToolRegistry::with_builtin_defaults();
        assert_eq!(registry.set_enabled("nonexistent", true), Err("unknown tool".to_string()));
    }

    #[test]
    fn set_enabled_mutates_and_returns_new_value() {
        let registry = ToolRegistry::with_builtin_defaults();
        let result = registry.set_enabled("web_search", true).unwrap();
        assert!(result);
        assert!(registry.get("web_search").unwrap().enabled);
    }

    #[test]
    fn resolve_tool_defs_always_appends_request_fullfilled() {
        let registry = ToolRegistry::with_builtin_defaults();
        let defs = registry.resolve_tool_defs(&["browser".to_string()]);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs.last().unwrap().function.name, REQUEST_FULLFILLED);
    }

    #[test]
    fn resolve_tool_defs_empty_when_no_ids_given() {
        let registry = ToolRegistry::with_builtin_defaults();
        assert!(registry.resolve_tool_defs(&[]).is_empty());
    }

    #[test]
    fn apply_enabled_overrides_ignores_unknown_tool_ids() {
        let registry = ToolRegistry::with_builtin_defaults();
        let mut overrides = std::collections::HashMap::new();
        overrides.insert("web_search".to_string(), true);
        overrides.insert("not_a_real_tool".to_string(), true);
        registry.apply_enabled_overrides(&overrides);
        assert!(registry.get("web_search").unwrap().enabled);
    }
}
