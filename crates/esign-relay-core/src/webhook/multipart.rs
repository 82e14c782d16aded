//! Multipart bodies.
//!
//! Only one text field is ever needed from a provider multipart body, so the
//! body is not parsed as a full MIME document. The body is split on the
//! boundary delimiter and a [`MultipartExtractor`] picks the JSON out of the
//! resulting segments.

use serde_json::Value;
use tracing::debug;

/// Read the `boundary` parameter from a multipart content type
///
/// Parameter names match case-insensitively; surrounding quotes are stripped.
/// Returns `None` when the parameter is absent or empty.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }

        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);

        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Strategy for locating the event JSON inside a multipart body
pub trait MultipartExtractor: Send + Sync {
    /// Return the first JSON document found in `body`, if any
    fn extract(&self, body: &str, boundary: &str) -> Option<Value>;

    /// Strategy name for logs
    fn name(&self) -> &'static str;
}

/// Brace-scanning extractor
///
/// For every segment carrying a `Content-Disposition` header, takes the text
/// from the first `{` to the last `}` and tries to parse it. The first segment
/// that parses wins.
///
/// Known limits: braces in part headers or in unrelated text inside the same
/// segment widen the candidate and usually make it fail to parse; a segment
/// holding two JSON documents never parses.
#[derive(Debug, Clone, Copy, Default)]
pub struct BraceScanExtractor;

impl BraceScanExtractor {
    /// Candidate JSON text for a single segment
    pub fn candidate(segment: &str) -> Option<&str> {
        let start = segment.find('{')?;
        let end = segment.rfind('}')?;
        (end > start).then(|| segment[start..=end].trim())
    }
}

impl MultipartExtractor for BraceScanExtractor {
    fn extract(&self, body: &str, boundary: &str) -> Option<Value> {
        let delimiter = format!("--{}", boundary);

        let found = split_segments(body, &delimiter)
            .filter(|segment| has_content_disposition(segment))
            .filter_map(Self::candidate)
            .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!(error = %e, "Multipart segment candidate is not JSON");
                    None
                }
            });
        found
    }

    fn name(&self) -> &'static str {
        "brace_scan"
    }
}

/// Split on the delimiter, trimming the CR/LF that precedes each occurrence
fn split_segments<'a>(body: &'a str, delimiter: &'a str) -> impl Iterator<Item = &'a str> {
    body.split(delimiter)
        .map(|segment| segment.trim_end_matches('\n').trim_end_matches('\r'))
}

fn has_content_disposition(segment: &str) -> bool {
    segment
        .to_ascii_lowercase()
        .contains("content-disposition")
}

#[cfg(test)]
#[path = "multipart_tests.rs"]
mod tests;
