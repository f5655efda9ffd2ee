//! `web_search` tool: a Brave Search API client. Requests
//! `Accept-Encoding: gzip` and transparently decompresses gzip bodies
//! via `flate2`, since the shared `reqwest::Client` is not built with
//! its own gzip feature.

use std::io::Read;

use flate2::read::GzDecoder;
use serde_json::Value;

use crate::providers::HTTP_CLIENT;
use crate::model::truncate;

const DEFAULT_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
const DEFAULT_COUNT: u64 = 3;

pub async fn search(args: &Value, api_key: &str, endpoint_override: &str) -> Result<String, String> {
    let query = args
        .get("query")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "missing required 'query' argument".to_string())?;

    let count = args
        .get("count")
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_COUNT)
        .clamp(1, 20);

    if api_key.trim().is_empty() {
        return Err("web_search requires an API key; configure one in settings".to_string());
    }

    let endpoint = if endpoint_override.trim().is_empty() {
        DEFAULT_ENDPOINT
    } else {
        endpoint_override
    };

    let response = HTTP_CLIENT
        .get(endpoint)
        .query(&[("q", query), ("count", &count.to_string())])
        .header("Accept", "application/json")
        .header("Accept-Encoding", "gzip")
        .header("X-Subscription-Token", api_key)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;

    let status = response.status();
    let is_gzip = response
        .headers()
        .get("content-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("gzip"))
        .unwrap_or(false);
    let bytes = response.bytes().await.map_err(|e| format!("request failed: {e}"))?;
    let text = if is_gzip {
        decompress_gzip(&bytes)?
    } else {
        String::from_utf8_lossy(&bytes).to_string()
    };

    if status.as_u16() >= 400 {
        return Err(format!("Brave Search returned {}: {}", status.as_u16(), truncate(&text, 512)));
    }

    let value: Value = serde_json::from_str(&text).map_err(|e| format!("decode failed: {e}"))?;
    Ok(format_results(&value, count as usize, query))
}

fn decompress_gzip(bytes: &[u8]) -> Result<String, String> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = String::new();
    decoder
        .read_to_string(&mut out)
        .map_err(|e| format!("gzip decode failed: {e}"))?;
    Ok(out)
}

fn format_results(value: &Value, count: usize, query: &str) -> String {
    let results = value
        .get("web")
        .and_then(|w| w.get("results"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if results.is_empty() {
        return format!("No results found for \"{query}\".");
    }

    results
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, r)| {
            let title = r.get("title").and_then(Value::as_str).unwrap_or("");
            let url = r.get("url").and_then(Value::as_str).unwrap_or("");
            let description = r.get("description").and_then(Value::as_str).unwrap_or("");
            format!("{}. {}\n{}\nSummary: {}", i + 1, title, url, description)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
