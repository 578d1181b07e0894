/// Decode process output, replacing invalid UTF-8 sequences
pub fn lossy_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Keep at most `max_chars` characters, marking the cut with an ellipsis
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_short_input_untouched() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll...");
    }

    #[test]
    fn test_lossy_string_replaces_invalid_bytes() {
        assert_eq!(lossy_string(&[b'o', b'k', 0xff]), "ok\u{fffd}");
    }
}
