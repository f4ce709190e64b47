//! Media fetcher capability
//!
//! The actual network fetch and transcode is delegated to an external tool.
//! [`MediaFetcher`] is the seam: the worker hands it a URL and resolved
//! [`FetchOptions`], receives progress through a [`ProgressSink`] and gets
//! back a [`FetchOutcome`] naming the final artifact.
//!
//! ## Contract
//!
//! - invoked once per job
//! - emits zero or more [`FetchEvent::Downloading`] events followed by exactly
//!   one terminal event ([`FetchEvent::Finished`] or [`FetchEvent::Error`])
//! - on success exposes the final file path and a human-readable title
//!
//! [`YtDlpFetcher`] is the production implementation.

pub mod options;
pub mod progress;
pub mod ytdlp;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub use options::{ExternalDownloader, FetchOptions, MediaFormat, PostProcess, target_height};
pub use progress::{DownloadProgress, parse_percent_str};
pub use ytdlp::YtDlpFetcher;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Failed(String),
    #[error("I/O error while fetching: {0}")]
    Io(#[from] std::io::Error),
}

/// Event reported by a fetcher while it works.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    Downloading(DownloadProgress),
    Finished,
    Error(String),
}

/// What the fetcher reports after it returns successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub filepath: Option<PathBuf>,
    pub title: Option<String>,
}

/// Progress callback handed to a fetcher.
///
/// Called synchronously from inside the fetch, so the wrapped closure must be
/// quick. A panic inside it is caught and logged and never reaches the fetch.
#[derive(Clone)]
pub struct ProgressSink {
    callback: Arc<dyn Fn(FetchEvent) + Send + Sync>,
}

impl ProgressSink {
    pub fn new(callback: impl Fn(FetchEvent) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn emit(&self, event: FetchEvent) {
        if catch_unwind(AssertUnwindSafe(|| (self.callback)(event))).is_err() {
            warn!("Progress callback panicked, event dropped");
        }
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download and post-process `url`, reporting progress through `sink`.
    async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
        sink: ProgressSink,
    ) -> Result<FetchOutcome, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn sink_forwards_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let sink = ProgressSink::new(move |event| captured.lock().unwrap().push(event));

        sink.emit(FetchEvent::Finished);
        sink.emit(FetchEvent::Error("nope".to_string()));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![FetchEvent::Finished, FetchEvent::Error("nope".to_string())]
        );
    }

    #[test]
    fn sink_swallows_callback_panics() {
        let sink = ProgressSink::new(|event| {
            if event == FetchEvent::Finished {
                panic!("callback bug");
            }
        });

        sink.emit(FetchEvent::Finished);
        sink.emit(FetchEvent::Error("still delivered".to_string()));
    }
}
