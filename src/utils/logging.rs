use serde::Serialize;

/// Upper bound on characters of an upstream body echoed into logs.
pub(crate) const BODY_PREVIEW_CHARS: usize = 512;

pub(crate) fn with_pretty_json_debug<T, F>(value: &T, log_action: F)
where
    T: Serialize,
    F: FnOnce(&str),
{
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let pretty_json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|error| format!("<pretty serialize failed: {error}>"));
    log_action(pretty_json.as_str());
}

/// Lossy, length-bounded rendering of a response body for log lines.
pub(crate) fn body_preview(bytes: &[u8]) -> String {
    let raw = String::from_utf8_lossy(bytes);
    format!("{:.len$}", raw, len = BODY_PREVIEW_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_bounded() {
        let long = "x".repeat(BODY_PREVIEW_CHARS * 2);
        assert_eq!(body_preview(long.as_bytes()).len(), BODY_PREVIEW_CHARS);
        assert_eq!(body_preview(b"short"), "short");
    }
}
