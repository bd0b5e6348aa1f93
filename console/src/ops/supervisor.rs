//! Subprocess supervision
//!
//! Spawns the privileged external command with stdout and stderr piped,
//! merges both into a single line stream, and owns the child's lifetime.
//! The child is always reaped: `terminate()` and `wait()` both call the
//! OS wait, and `kill_on_drop` covers abandonment.

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::ConsoleError;
use crate::ops::invocation::Invocation;

/// A supervised subprocess with a live line stream
pub struct Supervisor {
    child: Child,
    lines: mpsc::UnboundedReceiver<String>,
}

impl Supervisor {
    /// Spawn the invocation and start streaming its output
    pub fn spawn(invocation: &Invocation) -> Result<Self, ConsoleError> {
        debug!("Spawning: {}", invocation.display());

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| {
            ConsoleError::SubprocessFailure(format!(
                "Failed to spawn {}: {}",
                invocation.program, e
            ))
        })?;

        let (tx, rx) = mpsc::unbounded_channel();

        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx);
        }

        Ok(Self { child, lines: rx })
    }

    /// Next output line; `None` once both pipes reach EOF
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Reap the child and return its exit status
    pub async fn wait(&mut self) -> Result<ExitStatus, ConsoleError> {
        self.child
            .wait()
            .await
            .map_err(|e| ConsoleError::SubprocessFailure(format!("wait failed: {}", e)))
    }

    /// Forcibly end the child, then reap it
    pub async fn terminate(&mut self) -> Result<ExitStatus, ConsoleError> {
        // start_kill errors when the child already exited; wait() below
        // still reaps it either way.
        if let Err(e) = self.child.start_kill() {
            warn!("Kill request failed (child may have exited): {}", e);
        }
        self.wait().await
    }
}

fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Subprocess pipe read error: {}", e);
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> Invocation {
        Invocation {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            current_dir: None,
            env: Vec::new(),
        }
    }

    #[tokio::test]
    async fn streams_lines_and_exits_cleanly() {
        let mut supervisor = Supervisor::spawn(&shell("echo one; echo two")).unwrap();

        let mut lines = Vec::new();
        while let Some(line) = supervisor.next_line().await {
            lines.push(line);
        }
        assert_eq!(lines, vec!["one", "two"]);

        let status = supervisor.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn merges_stderr_into_the_stream() {
        let mut supervisor = Supervisor::spawn(&shell("echo out; echo err 1>&2")).unwrap();

        let mut lines = Vec::new();
        while let Some(line) = supervisor.next_line().await {
            lines.push(line);
        }
        lines.sort();
        assert_eq!(lines, vec!["err", "out"]);
    }

    #[tokio::test]
    async fn reports_nonzero_exit() {
        let mut supervisor = Supervisor::spawn(&shell("exit 3")).unwrap();
        while supervisor.next_line().await.is_some() {}

        let status = supervisor.wait().await.unwrap();
        assert!(!status.success());
        assert_eq!(status.code(), Some(3));
    }

    #[tokio::test]
    async fn terminate_reaps_a_hanging_child() {
        let mut supervisor = Supervisor::spawn(&shell("sleep 30")).unwrap();

        let status = supervisor.terminate().await.unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let invocation = Invocation {
            program: "/nonexistent/binary".to_string(),
            args: vec![],
            current_dir: None,
            env: Vec::new(),
        };
        assert!(matches!(
            Supervisor::spawn(&invocation),
            Err(ConsoleError::SubprocessFailure(_))
        ));
    }
}
