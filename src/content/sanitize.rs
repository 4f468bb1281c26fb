//! Content sanitization and structure checks

use std::sync::OnceLock;

use regex_lite::Regex;
use serde_json::Value;

use crate::error::ContentError;

/// Top-level sections every content document must carry
pub const REQUIRED_SECTIONS: [&str; 3] = ["site", "hero", "about"];

fn script_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b.*?</script\s*>").expect("Invalid script block pattern")
    })
}

fn javascript_scheme() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)javascript:").expect("Invalid javascript scheme pattern"))
}

fn inline_handler() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bon\w+\s*=").expect("Invalid inline handler pattern"))
}

/// Strip script blocks, `javascript:` URLs and inline event handlers from a string
pub fn sanitize_str(input: &str) -> String {
    let out = script_block().replace_all(input, "");
    let out = javascript_scheme().replace_all(&out, "");
    inline_handler().replace_all(&out, "").into_owned()
}

/// Sanitize every string in a JSON document
///
/// Object keys and non-string values are kept as they are.
pub fn sanitize_content(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_str(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_content).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, sanitize_content(value)))
                .collect(),
        ),
        other => other,
    }
}

/// Check that the document has non-empty `site`, `hero` and `about` sections
pub fn validate_structure(content: &Value) -> Result<(), ContentError> {
    for section in REQUIRED_SECTIONS {
        if !content.get(section).is_some_and(is_truthy) {
            return Err(ContentError::InvalidStructure(section.to_string()));
        }
    }
    Ok(())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
