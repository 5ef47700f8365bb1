//! Child process helpers
//!
//! Every external program the runner invokes (git, the shell, the container
//! CLI, kubectl) goes through these helpers so that children are killed
//! when a run is cancelled and their output is captured consistently.

use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::output::OutputBuffer;
use sluice_core::domain::output::OutputStream;

/// Output of a finished child process
#[derive(Debug)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// stdout and stderr joined, trimmed, for error messages
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => format!("exit status {}", describe_status(&self.status)),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{}\n{}", stdout, stderr),
        }
    }
}

/// Runs `cmd` to completion and captures both streams
pub async fn run_captured(mut cmd: Command) -> std::io::Result<Captured> {
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    debug!("Running {:?}", cmd.as_std());
    let output = cmd.output().await?;
    Ok(Captured {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Runs `cmd` with `input` on stdin and captures both streams
pub async fn run_with_stdin(mut cmd: Command, input: &[u8]) -> std::io::Result<Captured> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    debug!("Running {:?} with {} bytes of input", cmd.as_std(), input.len());

    let mut child = cmd.spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input).await?;
        // Dropping stdin closes the pipe so the child sees EOF
    }
    let output = child.wait_with_output().await?;
    Ok(Captured {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Runs `cmd`, streaming its stdout and stderr line by line into `output`
///
/// Both streams are read concurrently and appended as lines arrive, so the
/// buffer reflects the order the child produced them in. Returns once the
/// child has exited and both streams are drained.
pub async fn run_streamed(mut cmd: Command, output: &OutputBuffer) -> std::io::Result<ExitStatus> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    debug!("Streaming {:?}", cmd.as_std());

    let mut child = cmd.spawn()?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (out_res, err_res, status) = tokio::join!(
        pump(stdout, OutputStream::Stdout, output),
        pump(stderr, OutputStream::Stderr, output),
        child.wait()
    );
    out_res?;
    err_res?;
    status
}

async fn pump<R>(reader: Option<R>, stream: OutputStream, output: &OutputBuffer) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(());
    };
    // Raw bytes: tools routinely print output that is not valid UTF-8
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        output.push(stream, String::from_utf8_lossy(trim_newline(&line)));
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Exit code, or a description of the signal that ended the process
pub fn describe_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    }
}
