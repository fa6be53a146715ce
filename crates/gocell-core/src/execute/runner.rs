//! Subprocess invocation for the toolchain and the produced binary.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::output::{OutputSink, Stream};
use crate::error::{Error, Result};

/// Size of the read buffer used when streaming program output.
const CHUNK_SIZE: usize = 8192;

/// Captured result of a tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    /// Exit code, if the tool exited normally.
    pub status: Option<i32>,
    /// Stdout followed by stderr.
    pub output: String,
}

/// How a streamed program ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramExit {
    /// Exit code; `None` if the program was killed by a signal.
    pub code: Option<i32>,
}

impl ProgramExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external tools and programs.
pub trait ToolRunner: Send {
    /// Find `tool` in the environment.
    fn lookup(&self, tool: &str) -> Option<PathBuf>;

    /// Run `tool` to completion in `workdir`, capturing its combined output.
    fn run(&self, tool: &str, args: &[String], workdir: &Path) -> Result<ToolOutput>;

    /// Run `program` in `workdir`, forwarding its output to `sink` as it is
    /// produced.
    fn stream(&self, program: &Path, args: &[String], workdir: &Path, sink: &dyn OutputSink) -> Result<ProgramExit>;
}

/// Format a command line for messages.
pub fn command_line(tool: &str, args: &[String]) -> String {
    std::iter::once(tool)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a tool and turn a non-zero exit into [`Error::ToolFailed`].
pub fn run_checked(runner: &dyn ToolRunner, tool: &str, args: &[String], workdir: &Path) -> Result<String> {
    let command = command_line(tool, args);
    tracing::debug!(%command, workdir = %workdir.display(), "running tool");
    let result = runner.run(tool, args, workdir)?;
    if result.success {
        Ok(result.output)
    } else {
        tracing::debug!(%command, status = ?result.status, "tool failed");
        Err(Error::ToolFailed {
            tool: tool.to_string(),
            command,
            output: result.output,
        })
    }
}

/// [`ToolRunner`] backed by real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

fn spawn_error(tool: &str, err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::ToolMissing {
            tool: tool.to_string(),
            hint: format!("make sure {tool} is installed and in PATH"),
        }
    } else {
        Error::Io(err)
    }
}

impl ToolRunner for SystemRunner {
    fn lookup(&self, tool: &str) -> Option<PathBuf> {
        which::which(tool).ok()
    }

    fn run(&self, tool: &str, args: &[String], workdir: &Path) -> Result<ToolOutput> {
        let output = Command::new(tool)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(tool, e))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(ToolOutput {
            success: output.status.success(),
            status: output.status.code(),
            output: combined,
        })
    }

    fn stream(&self, program: &Path, args: &[String], workdir: &Path, sink: &dyn OutputSink) -> Result<ProgramExit> {
        let name = program.display().to_string();
        let mut child = Command::new(program)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&name, e))?;
        tracing::debug!(program = %name, pid = child.id(), "started program");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        std::thread::scope(|s| {
            let readers = [
                stdout.map(|r| s.spawn(move || forward(r, Stream::Stdout, sink))),
                stderr.map(|r| s.spawn(move || forward(r, Stream::Stderr, sink))),
            ];
            for handle in readers.into_iter().flatten() {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(error = %e, "failed to read program output"),
                    Err(_) => tracing::warn!("output reader panicked"),
                }
            }
        });

        let status = child.wait()?;
        Ok(ProgramExit { code: status.code() })
    }
}

/// Copy `reader` to `sink` chunk by chunk, never splitting a UTF-8 sequence.
fn forward(mut reader: impl Read, stream: Stream, sink: &dyn OutputSink) -> std::io::Result<()> {
    let mut buf = [0u8; CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::new();
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        pending.extend_from_slice(&buf[..n]);
        let complete = match std::str::from_utf8(&pending) {
            Ok(text) => text.len(),
            // Incomplete sequence at the end: keep it for the next chunk.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => pending.len(),
        };
        if complete > 0 {
            sink.write(stream, &String::from_utf8_lossy(&pending[..complete]));
            pending.drain(..complete);
        }
    }
    if !pending.is_empty() {
        sink.write(stream, &String::from_utf8_lossy(&pending));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::CapturedOutput;

    /// Yields its data in fixed-size pieces.
    struct Chunked {
        data: Vec<u8>,
        size: usize,
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.size.min(self.data.len()).min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data.drain(..n);
            Ok(n)
        }
    }

    #[test]
    fn test_forward_keeps_multibyte_characters_whole() {
        let sink = CapturedOutput::new();
        let reader = Chunked {
            data: "héllo, 世界\n".as_bytes().to_vec(),
            size: 1,
        };
        forward(reader, Stream::Stdout, &sink).unwrap();
        assert_eq!(sink.stdout(), "héllo, 世界\n");
    }

    #[test]
    fn test_forward_replaces_invalid_bytes() {
        let sink = CapturedOutput::new();
        let reader = Chunked {
            data: vec![b'a', 0xff, b'b'],
            size: 2,
        };
        forward(reader, Stream::Stderr, &sink).unwrap();
        assert_eq!(sink.stderr(), "a\u{fffd}b");
    }

    #[test]
    fn test_command_line() {
        let args = vec!["build".to_string(), "-o".to_string(), "/tmp/x".to_string()];
        assert_eq!(command_line("go", &args), "go build -o /tmp/x");
        assert_eq!(command_line("go", &[]), "go");
    }

    #[test]
    fn test_missing_tool_is_reported_as_missing() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = SystemRunner::new()
            .run("gocell-no-such-tool", &[], temp.path())
            .unwrap_err();
        assert!(matches!(err, Error::ToolMissing { .. }));
        assert!(SystemRunner::new().lookup("gocell-no-such-tool").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_output_and_status() {
        let temp = tempfile::TempDir::new().unwrap();
        let args = vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()];
        let result = SystemRunner::new().run("sh", &args, temp.path()).unwrap();
        assert!(!result.success);
        assert_eq!(result.status, Some(3));
        assert_eq!(result.output, "out\nerr\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_stream_forwards_both_streams() {
        let temp = tempfile::TempDir::new().unwrap();
        let sink = CapturedOutput::new();
        let args = vec!["-c".to_string(), "echo hello; echo warn >&2; exit 2".to_string()];
        let exit = SystemRunner::new()
            .stream(Path::new("sh"), &args, temp.path(), &sink)
            .unwrap();
        assert_eq!(exit.code, Some(2));
        assert!(!exit.success());
        assert_eq!(sink.stdout(), "hello\n");
        assert_eq!(sink.stderr(), "warn\n");
    }
}
