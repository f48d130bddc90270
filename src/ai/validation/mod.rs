//! AI Response Validation
//!
//! Structured LLM output arrives as text that should contain one JSON object,
//! sometimes wrapped in markdown fences or surrounded by prose. Extraction is
//! lenient about the wrapper; the decoded value must still match the expected
//! type exactly or the call fails with `SchemaMismatch`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{BookError, Result};

// =============================================================================
// Extraction
// =============================================================================

/// Extract the JSON payload from raw model output
pub fn extract_json_from_response(content: &str) -> Result<Value> {
    let cleaned = preprocess(content);

    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return Ok(value);
    }

    debug!("Initial JSON parse failed, attempting cleanup");

    let without_commas = fix_trailing_commas(&cleaned);
    if let Ok(value) = serde_json::from_str::<Value>(&without_commas) {
        warn!("JSON parsed after removing trailing commas");
        return Ok(value);
    }

    if let Some(extracted) = extract_object_from_mixed(&without_commas)
        && let Ok(value) = serde_json::from_str::<Value>(extracted)
    {
        warn!("JSON extracted from mixed content");
        return Ok(value);
    }

    Err(BookError::schema_mismatch(
        "response",
        format!(
            "no JSON object found. Content preview: {}...",
            cleaned.chars().take(200).collect::<String>()
        ),
    ))
}

/// Decode a structured value into `T`, failing with `SchemaMismatch`
pub fn parse_structured<T: DeserializeOwned>(value: Value, context: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| BookError::schema_mismatch(context, e.to_string()))
}

fn preprocess(raw: &str) -> String {
    let s = raw.trim().trim_start_matches('\u{feff}').trim();
    strip_code_fences(s).trim().to_string()
}

fn strip_code_fences(s: &str) -> &str {
    let mut result = s;

    // ```json ... ``` or ``` ... ```
    if result.starts_with("```")
        && let Some(first_newline) = result.find('\n')
    {
        result = &result[first_newline + 1..];
    }

    if let Some(stripped) = result.trim_end().strip_suffix("```") {
        result = stripped.trim_end();
    }

    result
}

/// Drop commas that directly precede `]` or `}` outside strings
fn fix_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escape {
            escape = false;
            result.push(ch);
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            _ => {}
        }
        result.push(ch);
    }

    result
}

/// First balanced `{...}` span in text that mixes prose and JSON
fn extract_object_from_mixed(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (offset, ch) in s[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
