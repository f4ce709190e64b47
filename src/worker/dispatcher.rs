//! Batch intake: validate, allocate IDs, spawn runners

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::Job;
use super::runner::JobRunner;
use crate::fetcher::MediaFormat;
use crate::ledger::{JobId, ProgressStore};
use crate::observability::Metrics;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("Cannot process more than {max} downloads at once.")]
    TooManyItems { count: usize, max: usize },

    #[error("One or more URLs are missing.")]
    MissingUrl { index: usize },
}

/// A requested download before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobRequest {
    pub url: Option<String>,
    pub format: Option<MediaFormat>,
    pub resolution: Option<String>,
}

impl JobRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

/// Acknowledgement for an accepted batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub file_ids: Vec<JobId>,
    pub message: String,
}

pub struct JobDispatcher {
    runner: Arc<JobRunner>,
    progress: Arc<ProgressStore>,
    metrics: Arc<Metrics>,
    max_batch: usize,
}

impl JobDispatcher {
    pub fn new(
        runner: Arc<JobRunner>,
        progress: Arc<ProgressStore>,
        metrics: Arc<Metrics>,
        max_batch: usize,
    ) -> Self {
        Self {
            runner,
            progress,
            metrics,
            max_batch,
        }
    }

    /// Accept a batch and start one runner per item.
    ///
    /// All-or-nothing: when any item is invalid nothing is seeded or spawned.
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, requests: Vec<JobRequest>) -> Result<DispatchReceipt, BatchError> {
        let jobs = match self.validate(requests) {
            Ok(jobs) => jobs,
            Err(err) => {
                self.metrics.batch_rejected();
                warn!(error = %err, "Rejected download batch");
                return Err(err);
            }
        };

        // Seed every ID before any runner starts so a client polling right
        // after the response always sees at least `pending`.
        for job in &jobs {
            self.progress.mark_pending(job.id);
        }

        let file_ids: Vec<JobId> = jobs.iter().map(|job| job.id).collect();
        for job in jobs {
            self.metrics.job_accepted();
            info!(job_id = %job.id, url = %job.url, "Dispatching download");
            tokio::spawn(Arc::clone(&self.runner).run(job));
        }

        Ok(DispatchReceipt {
            message: format!("Initiated download of {} item(s).", file_ids.len()),
            file_ids,
        })
    }

    fn validate(&self, requests: Vec<JobRequest>) -> Result<Vec<Job>, BatchError> {
        if requests.len() > self.max_batch {
            return Err(BatchError::TooManyItems {
                count: requests.len(),
                max: self.max_batch,
            });
        }

        requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                let url = request
                    .url
                    .map(|url| url.trim().to_string())
                    .filter(|url| !url.is_empty())
                    .ok_or(BatchError::MissingUrl { index })?;

                Ok(Job {
                    id: JobId::new(),
                    url,
                    format: request.format.unwrap_or_default(),
                    resolution: request
                        .resolution
                        .map(|resolution| resolution.trim().to_string())
                        .filter(|resolution| !resolution.is_empty()),
                })
            })
            .collect()
    }
}
