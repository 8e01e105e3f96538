//! Run a build child and drain both of its output streams
//!
//! One task per stream reads fixed-size chunks into its own
//! [`BoundedLogSink`], so memory stays bounded even when the child never
//! prints a newline. Both
//! tasks are joined before the exit status is looked at, so a chatty child
//! can never block on a full pipe.

use super::invocation::BuildInvocation;
use super::sink::BoundedLogSink;
use crate::core::config::OverflowPolicy;
use crate::core::output;
use crate::core::runtime::runtime;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Where and how much to log for one invocation
#[derive(Debug, Clone)]
pub struct LogTargets {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub limit: u64,
    pub policy: OverflowPolicy,
    /// Also echo every line to the run log
    pub echo: bool,
}

/// Per-stream result of a drain task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub bytes: u64,
    pub overflow: Option<OverflowPolicy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: StreamSummary,
    pub stderr: StreamSummary,
}

impl DrainReport {
    /// Either stream exceeded its ceiling under the `error` policy
    pub fn overflow_failed(&self) -> bool {
        self.stdout.overflow == Some(OverflowPolicy::Error)
            || self.stderr.overflow == Some(OverflowPolicy::Error)
    }
}

const CHUNK: usize = 8192;

/// Echo the complete lines of `pending` + `bytes` to the run log. A partial
/// line longer than one chunk is echoed as is.
fn echo_lines(stream: &str, pending: &mut Vec<u8>, bytes: &[u8]) {
    pending.extend_from_slice(bytes);
    while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = pending.drain(..=pos).collect();
        output::echo(stream, String::from_utf8_lossy(&line).trim_end());
    }
    if pending.len() >= CHUNK {
        output::echo(stream, String::from_utf8_lossy(&pending[..]).trim_end());
        pending.clear();
    }
}

async fn drain<R: AsyncRead + Unpin>(
    mut reader: R,
    mut sink: BoundedLogSink<File>,
    stream: &'static str,
    echo: bool,
) -> Result<StreamSummary> {
    let mut chunk = [0u8; CHUNK];
    let mut pending = Vec::new();
    loop {
        let n = reader
            .read(&mut chunk)
            .await
            .with_context(|| format!("Failed to read build {}", stream))?;
        if n == 0 {
            break;
        }
        // Keep reading after an overflow so the child never blocks.
        sink.write(&chunk[..n])
            .with_context(|| format!("Failed to write {} log", stream))?;
        if echo {
            echo_lines(stream, &mut pending, &chunk[..n]);
        }
    }
    if !pending.is_empty() {
        output::echo(stream, String::from_utf8_lossy(&pending).trim_end());
    }
    let summary = StreamSummary {
        bytes: sink.written(),
        overflow: sink.notice(),
    };
    sink.finish()
        .with_context(|| format!("Failed to flush {} log", stream))?;
    Ok(summary)
}

fn create_log(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("Failed to create log {}", path.display()))
}

/// Spawn `invocation`, drain its output into the logs and wait for it.
pub fn run_drained(invocation: &BuildInvocation, logs: &LogTargets) -> Result<DrainReport> {
    let out_sink = BoundedLogSink::new(create_log(&logs.stdout)?, "stdout", logs.limit, logs.policy);
    let err_sink = BoundedLogSink::new(create_log(&logs.stderr)?, "stderr", logs.limit, logs.policy);

    runtime().block_on(async move {
        let mut cmd = tokio::process::Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {}", invocation.program))?;
        let stdout = child
            .stdout
            .take()
            .context("Failed to open build stdout")?;
        let stderr = child
            .stderr
            .take()
            .context("Failed to open build stderr")?;

        let stdout_task = tokio::spawn(drain(stdout, out_sink, "stdout", logs.echo));
        let stderr_task = tokio::spawn(drain(stderr, err_sink, "stderr", logs.echo));

        let status = child
            .wait()
            .await
            .context("Failed waiting for build process")?;

        let stdout = stdout_task
            .await
            .context("Failed joining stdout task")??;
        let stderr = stderr_task
            .await
            .context("Failed joining stderr task")??;

        Ok::<_, anyhow::Error>(DrainReport {
            success: status.success(),
            code: status.code(),
            stdout,
            stderr,
        })
    })
}
