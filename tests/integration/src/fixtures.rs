//! Test fixtures and frame builders

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A user id no other test uses
pub fn unique_user(prefix: &str) -> String {
    format!("{prefix}-{}", unique_suffix())
}

/// Client-side message as a browser would send it. The gateway fills in
/// `id`, `from`, `platform` and `timestamp`.
pub fn client_message(kind: &str, to: &str, body: &str) -> Value {
    json!({
        "header": {
            "type": kind,
            "to": to,
            // Ignored: the gateway stamps the authenticated sender
            "from": "spoofed",
        },
        "payload": STANDARD.encode(body),
    })
}

pub fn text_message(to: &str, body: &str) -> Value {
    client_message("text", to, body)
}

pub fn heartbeat_message() -> Value {
    json!({ "header": { "type": "heartbeat" } })
}
