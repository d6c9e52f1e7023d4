//! prerec-player: starts the external playback engine for a fired job.
//!
//! The [`invoker::PlaybackInvoker`] trait is the seam the scheduler fires
//! through. [`invoker::LiquidsoapInvoker`] is the production implementation:
//! it writes the media path to the playlist file, runs the configured player
//! command and, when a stop bound is given, kills it at the deadline.
//!
//! | Outcome                       | Meaning                                   |
//! |-------------------------------|-------------------------------------------|
//! | `Ok(PlaybackOutcome::Completed)` | player exited 0 on its own             |
//! | `Ok(PlaybackOutcome::TimedOut)`  | stop bound reached, player killed      |
//! | `Err(PlaybackError::Exited)`     | player exited non-zero                 |
//! | `Err(_)` (other variants)        | playlist write / spawn / wait failure  |

pub mod error;
pub mod invoker;
pub mod truncate;

pub use error::{PlaybackError, Result};
pub use invoker::{LiquidsoapInvoker, PlaybackInvoker, PlaybackOutcome};
