//! `prerec-scheduler`: durable one-shot playback jobs with SQLite persistence.
//!
//! # Overview
//!
//! A [`request::CreateJobRequest`] is validated into a [`types::NewJob`] and
//! written to the `jobs` table by [`store::JobStore`]. The
//! [`engine::SchedulerEngine`] polls the table, claims due jobs
//! (`pending` → `firing`), hands each one to a
//! [`prerec_player::PlaybackInvoker`] on its own task, and deletes the row when
//! the invocation returns.
//!
//! # Job lifecycle
//!
//! | State     | Enters when                         | Leaves when                    |
//! |-----------|-------------------------------------|--------------------------------|
//! | `pending` | created                             | claimed by a tick, or deleted  |
//! | `firing`  | claimed by a tick                   | invoker returns, or next startup (row deleted) |

pub mod db;
pub mod engine;
pub mod error;
pub mod request;
pub mod store;
pub mod types;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use request::CreateJobRequest;
pub use store::JobStore;
pub use types::{DeleteOutcome, JobStatus, NewJob, ScheduledJob};
