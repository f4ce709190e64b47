//! In-memory job ledger
//!
//! Two internally synchronized stores track every job for the lifetime of the
//! process:
//!
//! - [`ProgressStore`] holds one live [`ProgressSnapshot`] per job, rewritten
//!   on every progress event.
//! - [`ResultStore`] holds one [`ResultRecord`] per job, written exactly once
//!   when the job reaches a terminal state.
//!
//! Both are shared through `Arc` between the dispatcher, the runners and the
//! [`QueryService`]. Nothing is persisted: bookkeeping is lost on restart and
//! only the downloaded files survive.
//!
//! ## Usage
//!
//! ```rust
//! use nexlify::ledger::{JobId, JobState, ProgressStore};
//!
//! let store = ProgressStore::new();
//! let id = JobId::new();
//! store.mark_pending(id);
//! store.record_downloading(id, Some(42.0));
//! assert_eq!(store.get(&id).unwrap().status, JobState::Downloading);
//! ```

pub mod models;
pub mod progress;
pub mod query;
pub mod results;

pub use models::{JobId, JobState, ProgressSnapshot, ResultRecord};
pub use progress::ProgressStore;
pub use query::{Artifact, QueryError, QueryService, StatusView, content_type_for};
pub use results::ResultStore;
