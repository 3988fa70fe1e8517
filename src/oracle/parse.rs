//! Lenient parsing of oracle responses
//!
//! Models wrap JSON in prose or markdown fences often enough that a strict
//! parse loses usable answers. Three attempts, in order:
//! 1. the raw body
//! 2. the body with a wrapping fenced code block removed
//! 3. the first balanced `{...}` span in the body

use serde::de::DeserializeOwned;

use super::OracleError;

/// Parse an oracle response into `T`, tolerating formatting noise
pub fn parse_lenient<T: DeserializeOwned>(raw: &str) -> Result<T, OracleError> {
    let first_err = match serde_json::from_str::<T>(raw.trim()) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some(inner) = strip_code_fence(raw) {
        if let Ok(value) = serde_json::from_str::<T>(inner) {
            return Ok(value);
        }
    }

    if let Some(span) = first_balanced_object(raw) {
        if let Ok(value) = serde_json::from_str::<T>(span) {
            return Ok(value);
        }
    }

    Err(OracleError::MalformedResponse(first_err.to_string()))
}

/// Contents of a fenced code block wrapping the whole body
pub fn strip_code_fence(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let rest = trimmed.strip_prefix("```")?;
    let rest = rest.strip_suffix("```")?;

    // Drop the info string ("json") on the opening fence line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    Some(body.trim())
}

/// First `{...}` span whose braces balance, ignoring braces inside strings
pub fn first_balanced_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in raw[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
