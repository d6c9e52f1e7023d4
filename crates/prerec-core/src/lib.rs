//! `prerec-core`: configuration and shared error types for the prerec
//! playback scheduler.

pub mod config;
pub mod error;

pub use config::PrerecConfig;
pub use error::{PrerecError, Result};
