//! Small text and clock helpers shared by config, queue and remote code.

/// Longest failure reason kept on a pending change or remote error
pub const MAX_REASON_CHARS: usize = 180;

/// Trim `value`, mapping missing and blank input to `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// True for absolute `http://` or `https://` URLs (scheme is case-insensitive).
pub fn is_http_url(value: &str) -> bool {
    let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Collapse whitespace runs to single spaces and cap at [`MAX_REASON_CHARS`].
///
/// Remote error bodies are often multi-line; queue entries keep one line.
pub fn compact_reason(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_REASON_CHARS)
        .collect()
}

/// Current Unix timestamp in milliseconds.
pub fn unix_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
