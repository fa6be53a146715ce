//! Destinations for program and tool output.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Which standard stream a piece of output belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Session output channel.
///
/// Receives the live output of the produced binary as well as diagnostics,
/// so it must be usable from the reader threads of a running process.
pub trait OutputSink: Send + Sync {
    /// Write a chunk of text. Chunks are not necessarily whole lines.
    fn write(&self, stream: Stream, text: &str);
}

/// Forwards everything to the process's own stdout and stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioSink;

impl OutputSink for StdioSink {
    fn write(&self, stream: Stream, text: &str) {
        // A closed terminal is not worth failing a cell over.
        let _ = match stream {
            Stream::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(text.as_bytes()).and_then(|()| out.flush())
            }
            Stream::Stderr => std::io::stderr().lock().write_all(text.as_bytes()),
        };
    }
}

/// Collects output in memory.
#[derive(Debug, Default)]
pub struct CapturedOutput {
    stdout: Mutex<String>,
    stderr: Mutex<String>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written to stdout so far.
    pub fn stdout(&self) -> String {
        self.stdout.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Everything written to stderr so far.
    pub fn stderr(&self) -> String {
        self.stderr.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        self.stdout.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.stderr.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl OutputSink for CapturedOutput {
    fn write(&self, stream: Stream, text: &str) {
        let buffer = match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        };
        buffer.lock().unwrap_or_else(PoisonError::into_inner).push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captured_output_separates_streams() {
        let sink = CapturedOutput::new();
        sink.write(Stream::Stdout, "hello ");
        sink.write(Stream::Stderr, "oops\n");
        sink.write(Stream::Stdout, "world\n");
        assert_eq!(sink.stdout(), "hello world\n");
        assert_eq!(sink.stderr(), "oops\n");

        sink.clear();
        assert!(sink.stdout().is_empty());
    }

    #[test]
    fn test_captured_output_is_shareable_across_threads() {
        let sink = CapturedOutput::new();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| sink.write(Stream::Stdout, "x"));
            }
        });
        assert_eq!(sink.stdout(), "xxxx");
    }
}
