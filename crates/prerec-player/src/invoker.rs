//! Playback invocation: playlist write, player spawn, bounded wait.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use prerec_core::config::PlaybackConfig;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{PlaybackError, Result};
use crate::truncate::{
    read_tail, strip_text, truncate_output, CAPTURE_TAIL_BYTES, DEFAULT_MAX_CHARS,
};

/// How a playback invocation ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The player exited 0 by itself.
    Completed { elapsed: Duration },
    /// The stop bound was reached and the player was killed.
    TimedOut { elapsed: Duration, limit: Duration },
}

impl PlaybackOutcome {
    pub fn elapsed(&self) -> Duration {
        match self {
            PlaybackOutcome::Completed { elapsed } | PlaybackOutcome::TimedOut { elapsed, .. } => {
                *elapsed
            }
        }
    }
}

/// Starts playback of a single file and waits for it to end.
///
/// Implementations must not queue: concurrent calls run concurrently.
#[async_trait]
pub trait PlaybackInvoker: Send + Sync {
    /// Play `file_path`. When `stop_after` is set the invocation returns no
    /// later than that long after it began.
    async fn invoke(&self, file_path: &str, stop_after: Option<Duration>)
        -> Result<PlaybackOutcome>;
}

/// Runs an external player (liquidsoap by default) fed through a playlist file.
#[derive(Debug, Clone)]
pub struct LiquidsoapInvoker {
    command: String,
    args: Vec<String>,
    playlist_path: PathBuf,
}

impl LiquidsoapInvoker {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        playlist_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            playlist_path: playlist_path.into(),
        }
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self::new(
            config.command.clone(),
            config.args.clone(),
            config.playlist_path.clone(),
        )
    }

    async fn write_playlist(&self, file_path: &str) -> Result<()> {
        tokio::fs::write(&self.playlist_path, file_path)
            .await
            .map_err(|source| PlaybackError::PlaylistWrite {
                path: self.playlist_path.display().to_string(),
                source,
            })
    }
}

#[async_trait]
impl PlaybackInvoker for LiquidsoapInvoker {
    async fn invoke(
        &self,
        file_path: &str,
        stop_after: Option<Duration>,
    ) -> Result<PlaybackOutcome> {
        let started = Instant::now();
        self.write_playlist(file_path).await?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PlaybackError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        // The child is driven on its own task; the PID is kept for the kill
        // on the stop-bound path. Each pipe is drained into a bounded tail so
        // a player that logs for hours holds a fixed amount of memory.
        let pid = child.id();
        debug!(?pid, %file_path, ?stop_after, "player started");
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let stdout = child.stdout.take();
            let stderr = child.stderr.take();
            let (status, stdout, stderr) =
                tokio::join!(child.wait(), drain(stdout), drain(stderr));
            let _ = tx.send(PlayerExit::collect(status, stdout, stderr));
        });

        let waited = match stop_after {
            None => rx.await,
            Some(limit) => match tokio::time::timeout_at(started + limit, rx).await {
                Ok(waited) => waited,
                Err(_elapsed) => {
                    kill_player(pid);
                    let elapsed = started.elapsed();
                    info!(?pid, %file_path, limit_secs = limit.as_secs(), "stop bound reached, player killed");
                    return Ok(PlaybackOutcome::TimedOut { elapsed, limit });
                }
            },
        };

        match waited {
            Ok(Ok(exit)) if exit.status.success() => Ok(PlaybackOutcome::Completed {
                elapsed: started.elapsed(),
            }),
            Ok(Ok(exit)) => {
                let code = exit.status.code().unwrap_or(-1);
                let stderr = strip_text(&exit.stderr);
                let raw = if stderr.trim().is_empty() {
                    strip_text(&exit.stdout)
                } else {
                    stderr
                };
                Err(PlaybackError::Exited {
                    code,
                    diagnostics: truncate_output(raw.trim(), DEFAULT_MAX_CHARS),
                })
            }
            Ok(Err(e)) => Err(PlaybackError::Io(e)),
            Err(_recv_err) => Err(PlaybackError::WaitTask),
        }
    }
}

/// Exit status plus the retained tail of each output pipe.
struct PlayerExit {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl PlayerExit {
    fn collect(
        status: std::io::Result<ExitStatus>,
        stdout: std::io::Result<Vec<u8>>,
        stderr: std::io::Result<Vec<u8>>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            status: status?,
            stdout: stdout?,
            stderr: stderr?,
        })
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    match pipe {
        Some(pipe) => read_tail(pipe, CAPTURE_TAIL_BYTES).await,
        None => Ok(Vec::new()),
    }
}

/// SIGKILL the player; we no longer own the `Child` handle at this point.
fn kill_player(pid: Option<u32>) {
    let Some(raw_pid) = pid else {
        warn!("player already reaped before stop bound kill");
        return;
    };
    // Safety: raw_pid is our direct child and has not been waited on yet.
    #[cfg(unix)]
    unsafe {
        libc::kill(raw_pid as libc::pid_t, libc::SIGKILL);
    }
    #[cfg(not(unix))]
    {
        let _ = std::process::Command::new("taskkill")
            .args(["/F", "/PID", &raw_pid.to_string()])
            .output();
    }
}
