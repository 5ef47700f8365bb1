//! Stage output buffer
//!
//! Collects the output of one stage while it runs. Executors push lines
//! from several sources (stdout and stderr readers, container log streams)
//! concurrently; the buffer keeps them in arrival order and optionally
//! echoes each line to the orchestrator's console as it arrives.

use sluice_core::domain::output::{OutputLine, OutputStream, tail_chars};
use std::sync::{Arc, Mutex, MutexGuard};

/// Thread-safe, clonable buffer of captured stage output
///
/// Clones share the same underlying storage, so a clone can be handed to a
/// reader task while the executor keeps its own handle.
#[derive(Clone)]
pub struct OutputBuffer {
    lines: Arc<Mutex<Vec<OutputLine>>>,
    /// Prefix used when echoing; `None` keeps the buffer silent
    echo: Option<Arc<str>>,
}

impl OutputBuffer {
    /// Creates a silent buffer
    pub fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(Vec::new())),
            echo: None,
        }
    }

    /// Creates a buffer that echoes every line to the console as `[label] line`
    pub fn echoing(label: &str) -> Self {
        Self {
            lines: Arc::new(Mutex::new(Vec::new())),
            echo: Some(Arc::from(label)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<OutputLine>> {
        // A panicking reader task must not take the captured output with it
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends one line
    pub fn push(&self, stream: OutputStream, text: impl Into<String>) {
        let line = OutputLine::new(stream, text);
        if let Some(label) = &self.echo {
            match line.stream {
                OutputStream::Stdout => println!("[{}] {}", label, line.text),
                OutputStream::Stderr => eprintln!("[{}] {}", label, line.text),
            }
        }
        self.lock().push(line);
    }

    /// Appends every line of a multi-line chunk
    pub fn push_text(&self, stream: OutputStream, text: &str) {
        for line in text.lines() {
            self.push(stream, line);
        }
    }

    /// Snapshot of the captured lines
    pub fn lines(&self) -> Vec<OutputLine> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// All captured output joined with newlines
    pub fn text(&self) -> String {
        self.lock()
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The final `limit` characters of the captured output
    pub fn excerpt(&self, limit: usize) -> String {
        tail_chars(&self.text(), limit).to_string()
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_text() {
        let buffer = OutputBuffer::new();
        buffer.push(OutputStream::Stdout, "A");
        buffer.push(OutputStream::Stderr, "warning: x");
        buffer.push(OutputStream::Stdout, "B");

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.text(), "A\nwarning: x\nB");
        assert_eq!(buffer.lines()[1].stream, OutputStream::Stderr);
    }

    #[test]
    fn test_clones_share_storage() {
        let buffer = OutputBuffer::echoing("build");
        let reader = buffer.clone();
        reader.push_text(OutputStream::Stdout, "one\ntwo\n");

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.text(), "one\ntwo");
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let buffer = OutputBuffer::new();
        for i in 0..1000 {
            buffer.push(OutputStream::Stdout, format!("line {:04} of noisy build output", i));
        }
        buffer.push(OutputStream::Stderr, "error: linker failed");

        let excerpt = buffer.excerpt(2000);
        assert!(excerpt.chars().count() <= 2000);
        assert!(excerpt.ends_with("error: linker failed"));
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = OutputBuffer::default();
        assert!(buffer.is_empty());
        assert_eq!(buffer.excerpt(2000), "");
    }
}
