//! Output comparison
//!
//! Both sides are normalized the same way: CRLF and lone CR become LF, then
//! leading and trailing whitespace is trimmed. What remains must match
//! exactly; there is no numeric tolerance and no token-level diffing.

/// Normalize program or expected output for comparison
pub fn normalize_output(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Compare program output with expected output
pub fn compare_output(actual: &str, expected: &str) -> bool {
    normalize_output(actual) == normalize_output(expected)
}
