//! Stage output domain types

use serde::{Deserialize, Serialize};

/// One line of output captured from a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub stream: OutputStream,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputLine {
    pub fn new(stream: OutputStream, text: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            stream,
            text: text.into(),
        }
    }
}

/// Returns the final `limit` characters of `text`.
///
/// Counts characters rather than bytes so the cut never lands inside a
/// multi-byte code point.
pub fn tail_chars(text: &str, limit: usize) -> &str {
    let total = text.chars().count();
    if total <= limit {
        return text;
    }
    let skip = total - limit;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_chars_short_input_unchanged() {
        assert_eq!(tail_chars("hello", 2000), "hello");
        assert_eq!(tail_chars("", 10), "");
    }

    #[test]
    fn test_tail_chars_keeps_the_end() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("abcdef", 0), "");
    }

    #[test]
    fn test_tail_chars_bounded_for_large_input() {
        let big = "x".repeat(10_000) + "END";
        let tail = tail_chars(&big, 2000);
        assert_eq!(tail.chars().count(), 2000);
        assert!(tail.ends_with("END"));
    }

    #[test]
    fn test_tail_chars_multibyte_boundary() {
        let text = "构建失败: exit 1";
        let tail = tail_chars(text, 8);
        assert_eq!(tail.chars().count(), 8);
        assert_eq!(tail, ": exit 1");

        let tail = tail_chars(text, 10);
        assert_eq!(tail, "失败: exit 1");
    }
}
