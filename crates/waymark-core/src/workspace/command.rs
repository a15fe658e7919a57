//! Cancellable shell command execution.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::{
    cancel::CancellationScope,
    error::{Result, WaymarkError},
};

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code; `-1` when the process was terminated by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout and stderr formatted for inclusion in a user-facing message.
    pub fn combined(&self) -> String {
        let mut text = String::new();
        if !self.stdout.trim().is_empty() {
            text.push_str("stdout:\n");
            text.push_str(self.stdout.trim_end());
            text.push('\n');
        }
        if !self.stderr.trim().is_empty() {
            text.push_str("stderr:\n");
            text.push_str(self.stderr.trim_end());
            text.push('\n');
        }
        text
    }
}

/// Spawns processes on behalf of RunCommand steps.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` through the platform shell in `cwd`.
    ///
    /// Returns the captured output for any exit code. Returns
    /// `WaymarkError::Cancelled` (after killing the process) if the scope
    /// fires first.
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        cancel: &CancellationScope,
    ) -> Result<CommandOutput>;

    /// Kills every process this runner still has in flight.
    fn kill_all(&self);
}

/// [`CommandRunner`] backed by `tokio::process` and the platform shell.
pub struct ShellCommandRunner {
    shell: String,
    shell_flag: String,
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, CancellationToken>>,
}

impl ShellCommandRunner {
    /// Uses `sh -c` on Unix and `cmd /C` on Windows.
    pub fn new() -> Self {
        if cfg!(windows) {
            Self::with_shell("cmd", "/C")
        } else {
            Self::with_shell("sh", "-c")
        }
    }

    pub fn with_shell(shell: impl Into<String>, shell_flag: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            shell_flag: shell_flag.into(),
            next_id: AtomicU64::new(0),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Number of processes currently in flight.
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or_default()
    }

    fn register(&self) -> LiveHandle<'_> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        if let Ok(mut live) = self.live.lock() {
            live.insert(id, token.clone());
        }
        LiveHandle {
            runner: self,
            id,
            token,
        }
    }
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry entry for one spawned process; deregisters on drop.
struct LiveHandle<'a> {
    runner: &'a ShellCommandRunner,
    id: u64,
    token: CancellationToken,
}

impl Drop for LiveHandle<'_> {
    fn drop(&mut self) {
        if let Ok(mut live) = self.runner.live.lock() {
            live.remove(&self.id);
        }
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        cancel: &CancellationScope,
    ) -> Result<CommandOutput> {
        if cancel.is_cancelled() {
            return Err(WaymarkError::Cancelled);
        }

        debug!("Spawning `{command}` in {}", cwd.display());
        let mut shell = Command::new(&self.shell);
        shell
            .arg(&self.shell_flag)
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The shell leads its own group so its descendants can be signalled with it.
        #[cfg(unix)]
        shell.process_group(0);

        let child = shell.spawn().map_err(|source| WaymarkError::CommandSpawn {
            command: command.to_string(),
            source,
        })?;
        let pid = child.id();

        let handle = self.register();

        // Dropping the losing `wait_with_output` future drops the child,
        // and `kill_on_drop` terminates it; the group kill reaches anything
        // the shell forked.
        tokio::select! {
            _ = cancel.cancelled() => {
                warn!("Command `{command}` killed: run cancelled");
                kill_process_group(pid);
                Err(WaymarkError::Cancelled)
            }
            _ = handle.token.cancelled() => {
                warn!("Command `{command}` killed at run end");
                kill_process_group(pid);
                Err(WaymarkError::Cancelled)
            }
            output = child.wait_with_output() => {
                let output = output.map_err(|source| WaymarkError::CommandSpawn {
                    command: command.to_string(),
                    source,
                })?;
                Ok(CommandOutput {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
        }
    }

    fn kill_all(&self) {
        let handles = match self.live.lock() {
            Ok(mut live) => std::mem::take(&mut *live),
            Err(_) => return,
        };
        if !handles.is_empty() {
            debug!("Killing {} live command(s)", handles.len());
        }
        for token in handles.into_values() {
            token.cancel();
        }
    }
}

/// Sends SIGKILL to the process group led by `pid`.
#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: kill(2) takes no pointers; a negative pid addresses the group.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        debug!(
            "Process group {pgid} already gone: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
