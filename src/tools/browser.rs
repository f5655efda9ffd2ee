//! `browser` tool: a bounded-byte GET, not an HTML-to-text converter.
//! Grounded on the shape of
//! `kuksenko116-openclaw/cli-rust/src/tools/web_fetch.rs` (timeout,
//! byte-bounded read) with its HTML-stripping layer dropped, since the
//! model is expected to parse raw markup itself (SPEC_FULL §4.5).

use futures_util::StreamExt;
use serde_json::Value;

use crate::providers::HTTP_CLIENT;

const DEFAULT_MAX_BYTES: u64 = 2048;
const MIN_MAX_BYTES: u64 = 256;

pub async fn fetch(args: &Value) -> Result<String, String> {
    let url = args
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "missing required 'url' argument".to_string())?;

    let max_bytes = args
        .get("maxBytes")
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_MAX_BYTES)
        .max(MIN_MAX_BYTES);

    let response = HTTP_CLIENT
        .get(url)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;

    let mut stream = response.bytes_stream();
    let mut collected: Vec<u8> = Vec::new();
    while (collected.len() as u64) < max_bytes {
        match stream.next().await {
            Some(Ok(bytes)) => {
                let remaining = (max_bytes - collected.len() as u64) as usize;
                if bytes.len() > remaining {
                    collected.extend_from_slice(&bytes[..remaining]);
                    break;
                }
                collected.extend_from_slice(&bytes);
            }
            Some(Err(e)) => return Err(format!("request failed: {e}")),
            None => break,
        }
    }

    let text = String::from_utf8_lossy(&collected).trim().to_string();
    if text.is_empty() {
        return Ok(format!("({url} returned no body)"));
    }
    Ok(text)
}
