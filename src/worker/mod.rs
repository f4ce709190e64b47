//! Download workers
//!
//! [`JobDispatcher`] validates a batch and spawns one [`JobRunner`] task per
//! accepted item. Runners talk to the rest of the system only through the
//! ledger stores.

pub mod dispatcher;
pub mod runner;

pub use dispatcher::{BatchError, DispatchReceipt, JobDispatcher, JobRequest};
pub use runner::{JobError, JobRunner};

use crate::fetcher::MediaFormat;
use crate::ledger::JobId;

/// One unit of work: a single URL fetched in a single format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub url: String,
    pub format: MediaFormat,
    pub resolution: Option<String>,
}
