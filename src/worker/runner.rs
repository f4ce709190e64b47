//! Job runner - drives a single job from pending to its terminal record

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use super::Job;
use crate::config::FetcherConfig;
use crate::fetcher::{FetchError, FetchEvent, FetchOptions, MediaFetcher, ProgressSink};
use crate::ledger::{JobId, ProgressStore, ResultRecord, ResultStore};
use crate::observability::Metrics;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("could not determine final filename")]
    MissingArtifact,

    #[error("download task panicked: {0}")]
    Panicked(String),

    #[error("download task aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, JobError>;

/// Verified artifact of a successful job
#[derive(Debug, Clone, PartialEq, Eq)]
struct Artifact {
    filename: String,
    title: String,
}

/// Executes jobs against a [`MediaFetcher`], writing progress and outcome to
/// the ledger.
pub struct JobRunner {
    progress: Arc<ProgressStore>,
    results: Arc<ResultStore>,
    fetcher: Arc<dyn MediaFetcher>,
    settings: FetcherConfig,
    download_dir: PathBuf,
    metrics: Arc<Metrics>,
}

impl JobRunner {
    pub fn new(
        progress: Arc<ProgressStore>,
        results: Arc<ResultStore>,
        fetcher: Arc<dyn MediaFetcher>,
        settings: FetcherConfig,
        download_dir: impl Into<PathBuf>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            progress,
            results,
            fetcher,
            settings,
            download_dir: download_dir.into(),
            metrics,
        }
    }

    /// Run `job` to completion.
    ///
    /// Never fails: every outcome, including a panic inside the fetch, ends
    /// as exactly one terminal record in both stores.
    pub async fn run(self: Arc<Self>, job: Job) {
        let job_id = job.id;
        self.progress.mark_pending(job_id);
        self.metrics.job_started();

        let worker = Arc::clone(&self);
        let outcome = match tokio::spawn(async move { worker.execute(&job).await }).await {
            Ok(outcome) => outcome,
            Err(join_err) if join_err.is_panic() => {
                Err(JobError::Panicked(panic_message(join_err.into_panic())))
            }
            Err(join_err) => Err(JobError::Aborted(join_err.to_string())),
        };

        self.finish(job_id, outcome);
    }

    async fn execute(&self, job: &Job) -> Result<Artifact> {
        let options = FetchOptions::for_job(
            job.format,
            job.resolution.as_deref(),
            &self.settings,
            &self.download_dir,
        );

        info!(
            job_id = %job.id,
            url = %job.url,
            format = ?job.format,
            resolution = ?job.resolution,
            "Starting download"
        );

        let outcome = self
            .fetcher
            .fetch(&job.url, &options, self.progress_sink(job.id))
            .await?;

        let path = outcome.filepath.ok_or(JobError::MissingArtifact)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            _ => {
                warn!(job_id = %job.id, path = %path.display(), "Reported artifact is not on disk");
                return Err(JobError::MissingArtifact);
            }
        }

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or(JobError::MissingArtifact)?;

        let title = outcome
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Artifact { filename, title })
    }

    fn progress_sink(&self, job_id: JobId) -> ProgressSink {
        let progress = Arc::clone(&self.progress);
        ProgressSink::new(move |event| match event {
            FetchEvent::Downloading(update) => {
                progress.record_downloading(job_id, update.percentage());
            }
            FetchEvent::Finished => progress.record_fetch_finished(job_id),
            FetchEvent::Error(message) => progress.record_fetch_error(job_id, message),
        })
    }

    /// Result first, then the final snapshot.
    fn finish(&self, job_id: JobId, outcome: Result<Artifact>) {
        match outcome {
            Ok(Artifact { filename, title }) => {
                self.results.set_result(
                    job_id,
                    ResultRecord::Completed {
                        filename: filename.clone(),
                        title: title.clone(),
                    },
                );
                self.progress.finalize_completed(job_id, &filename, &title);
                self.metrics.job_completed();
                info!(%job_id, %filename, "Download completed");
            }
            Err(err) => {
                let message = err.to_string();
                self.results.set_result(
                    job_id,
                    ResultRecord::Failed {
                        error: message.clone(),
                    },
                );
                self.progress.finalize_failed(job_id, &message);
                self.metrics.job_failed();
                match err {
                    JobError::Panicked(_) | JobError::Aborted(_) => {
                        error!(%job_id, error = %message, "Download task crashed");
                    }
                    _ => warn!(%job_id, error = %message, "Download failed"),
                }
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
