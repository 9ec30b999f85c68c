//! External command execution.
//!
//! Every CLI-driven cluster operation (helm, kubectl, git) goes through a
//! [`CommandRunner`]. The process runner streams output line by line into the
//! log, tagged with the caller's prefix, and fails on a non-zero exit. No
//! retries happen here.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::CommandError;

/// A single command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Tag attached to every forwarded output line, e.g. `helm-postgresql`.
    pub log_prefix: String,
}

impl CommandSpec {
    /// Create a spec for `program` with no arguments.
    pub fn new(program: impl Into<String>, log_prefix: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            log_prefix: log_prefix.into(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir` instead of the current directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Command line for logs.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Combined stdout and stderr.
    #[must_use]
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Executes external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion.
    ///
    /// Resolves when the process exits with code 0. A process that cannot be
    /// started yields [`CommandError::Spawn`]; a non-zero exit yields
    /// [`CommandError::Failed`] with the captured output.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Log and capture every line of `reader`. Bytes that are not valid UTF-8
/// are replaced rather than failing the read.
async fn forward_lines<R>(reader: R, prefix: &str, stream: Stream) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut captured = String::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let raw = buf.strip_suffix(b"\n").unwrap_or(&buf);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw);
        if !line.trim().is_empty() {
            match stream {
                Stream::Stdout => info!(prefix = %prefix, "{line}"),
                Stream::Stderr => warn!(prefix = %prefix, "[STDERR] {line}"),
            }
        }
        captured.push_str(&line);
        captured.push('\n');
    }
    Ok(captured)
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        debug!(
            prefix = %spec.log_prefix,
            command = %spec.display(),
            cwd = ?spec.cwd,
            "Executing command"
        );

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| {
            warn!(
                prefix = %spec.log_prefix,
                program = %spec.program,
                error = %source,
                "Failed to start process"
            );
            CommandError::Spawn {
                program: spec.program.clone(),
                source,
            }
        })?;

        let io_err = |source| CommandError::Io {
            program: spec.program.clone(),
            source,
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io_err(std::io::Error::other("stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io_err(std::io::Error::other("stderr not captured")))?;

        // Both pipes are drained concurrently so a chatty stderr cannot block stdout.
        let (stdout, stderr) = tokio::try_join!(
            forward_lines(stdout, &spec.log_prefix, Stream::Stdout),
            forward_lines(stderr, &spec.log_prefix, Stream::Stderr),
        )
        .map_err(io_err)?;

        let status = child.wait().await.map_err(io_err)?;
        let exit_code = status.code().unwrap_or(-1);
        debug!(prefix = %spec.log_prefix, exit_code, "Process exited");

        if status.success() {
            Ok(CommandOutput { stdout, stderr })
        } else {
            warn!(
                prefix = %spec.log_prefix,
                exit_code,
                stderr = %stderr.trim(),
                "Command failed"
            );
            Err(CommandError::Failed {
                program: spec.program.clone(),
                exit_code,
                stdout,
                stderr,
            })
        }
    }
}
