//! Subprocess seam used by the extraction-tool strategies

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("command not found: {program}")]
    NotFound { program: String },

    #[error("{program} did not finish within {}s", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    #[error("failed to run {program}: {message}")]
    Failed { program: String, message: String },
}

/// Runs an external program to completion
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> std::result::Result<CommandOutput, CommandError>;
}

/// Runs programs with `std::process`, killing them at the deadline
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> std::result::Result<CommandOutput, CommandError> {
        let failed = |message: String| CommandError::Failed {
            program: program.to_string(),
            message,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CommandError::NotFound {
                        program: program.to_string(),
                    }
                } else {
                    failed(format!("spawn failed: {}", e))
                }
            })?;

        // Drain pipes on their own threads so a chatty child cannot block on a full pipe
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CommandError::TimedOut {
                        program: program.to_string(),
                        timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(failed(format!("wait failed: {}", e))),
            }
        };

        Ok(CommandOutput {
            success: status.success(),
            code: status.code(),
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
