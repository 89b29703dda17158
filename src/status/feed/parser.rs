use regex::Regex;

use super::types::StatusPayload;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no JSON object found in payload")]
    PayloadNotFound,
    #[error("payload is not valid JSON: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("payload does not match the status schema: {0}")]
    Schema(serde_json::Error),
    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Pulls the JSON object out of a JSONP call or an inline script.
///
/// When `callback` occurs in the text the object passed to that call is taken,
/// otherwise the first `{` through the last `}`. Both matches are greedy.
pub fn extract_payload(
    text: &str,
    callback: Option<&str>,
) -> Result<serde_json::Value, ExtractError> {
    let pattern = match callback.filter(|name| !name.is_empty() && text.contains(*name)) {
        Some(name) => format!(r"(?s){}\s*\(\s*(\{{.*\}})\s*\)\s*;?", regex::escape(name)),
        None => r"(?s)(\{.*\})".to_string(),
    };
    let matcher = Regex::new(&pattern)?;
    let span = matcher
        .captures(text)
        .and_then(|captures| captures.get(1))
        .ok_or(ExtractError::PayloadNotFound)?;

    Ok(serde_json::from_str(span.as_str())?)
}

pub fn parse_status_payload(
    text: &str,
    callback: Option<&str>,
) -> Result<StatusPayload, ExtractError> {
    let value = extract_payload(text, callback)?;
    serde_json::from_value(value).map_err(ExtractError::Schema)
}
