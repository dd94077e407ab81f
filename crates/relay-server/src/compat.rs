//! Legacy request-shape compatibility.
//!
//! Older clients send `{text, opts, session_id}` where current ones send
//! `{prompt, options, sessionId}`. Bodies are normalized before
//! deserialization; when both spellings appear, the canonical key wins.

/// Legacy key aliases, mapped to their canonical spellings.
const LEGACY_TO_CANONICAL: &[(&str, &str)] = &[
    ("text", "prompt"),
    ("opts", "options"),
    ("session_id", "sessionId"),
];

/// Rewrite legacy keys in a request body to their canonical names.
pub fn normalize_request(body: &serde_json::Value) -> serde_json::Value {
    let Some(obj) = body.as_object() else {
        return body.clone();
    };
    let mut result = obj.clone();
    for &(legacy, canonical) in LEGACY_TO_CANONICAL {
        if !result.contains_key(canonical) {
            if let Some(val) = result.remove(legacy) {
                result.insert(canonical.to_string(), val);
            }
        } else {
            // Canonical already present; drop the legacy duplicate.
            result.remove(legacy);
        }
    }
    serde_json::Value::Object(result)
}
