//! Error types for the prerec-player crate.

use thiserror::Error;

/// Everything that can go wrong while starting or waiting on the player.
///
/// A stop-bound kill is not an error; see `PlaybackOutcome::TimedOut`.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The playlist file could not be written.
    #[error("failed to write playlist {path}: {source}")]
    PlaylistWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The player binary could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The player ran and exited with a non-zero status.
    #[error("player exited with code {code}: {diagnostics}")]
    Exited { code: i32, diagnostics: String },

    /// Underlying I/O failure while collecting the player's output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The task waiting on the child went away without reporting.
    #[error("wait task ended unexpectedly")]
    WaitTask,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, PlaybackError>;
