//! Read side of the job ledger: status and artifact lookups.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::File;
use tracing::debug;

use super::models::{JobId, JobState, ProgressSnapshot, ResultRecord};
use super::progress::ProgressStore;
use super::results::ResultStore;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Download not found: {0}")]
    NotFound(String),
    #[error("Download not complete: {0}")]
    NotReady(String),
    #[error("File not found on server: {0}")]
    FileMissing(String),
    #[error("Failed to open {filename}: {source}")]
    Io {
        filename: String,
        #[source]
        source: std::io::Error,
    },
}

/// Client-facing view of a job's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ProgressSnapshot> for StatusView {
    fn from(snapshot: ProgressSnapshot) -> Self {
        Self {
            status: snapshot.status,
            percentage: Some(snapshot.percentage),
            filename: snapshot.filename,
            title: snapshot.title,
            error: snapshot.error,
            updated_at: Some(snapshot.updated_at),
        }
    }
}

impl From<ResultRecord> for StatusView {
    fn from(record: ResultRecord) -> Self {
        let mut view = Self {
            status: record.state(),
            percentage: None,
            filename: None,
            title: None,
            error: None,
            updated_at: None,
        };
        view.merge(record);
        view
    }
}

impl StatusView {
    fn merge(&mut self, record: ResultRecord) {
        match record {
            ResultRecord::Completed { filename, title } => {
                self.filename = Some(filename);
                self.title = Some(title);
            }
            ResultRecord::Failed { error } => {
                self.error = Some(error);
            }
        }
    }
}

/// An opened artifact, ready to stream.
///
/// The handle is opened during lookup, so a file removed afterwards is still
/// readable through it.
#[derive(Debug)]
pub struct Artifact {
    pub file: File,
    pub filename: String,
    pub content_type: &'static str,
    pub len: u64,
}

pub struct QueryService {
    progress: Arc<ProgressStore>,
    results: Arc<ResultStore>,
    download_dir: PathBuf,
}

impl QueryService {
    pub fn new(
        progress: Arc<ProgressStore>,
        results: Arc<ResultStore>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            progress,
            results,
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Current status of a job.
    ///
    /// A snapshot the fetcher marked completed is reported as `downloading`
    /// at 100% until the runner records the verified result.
    pub fn status(&self, job_id: &str) -> Result<StatusView, QueryError> {
        let id = parse_job_id(job_id)?;

        let Some(snapshot) = self.progress.get(&id) else {
            return self
                .results
                .get_result(&id)
                .map(StatusView::from)
                .ok_or_else(|| QueryError::NotFound(job_id.to_string()));
        };

        let mut view = StatusView::from(snapshot);
        if view.status.is_terminal() {
            match self.results.get_result(&id) {
                Some(record) => view.merge(record),
                None if view.status == JobState::Completed => {
                    view.status = JobState::Downloading;
                }
                None => {}
            }
        }
        Ok(view)
    }

    /// Open the artifact of a completed job.
    pub async fn open_artifact(&self, job_id: &str) -> Result<Artifact, QueryError> {
        let id = parse_job_id(job_id)?;

        let filename = match self.results.get_result(&id) {
            Some(ResultRecord::Completed { filename, .. }) => filename,
            Some(ResultRecord::Failed { .. }) => {
                return Err(QueryError::NotReady(job_id.to_string()));
            }
            None if self.progress.contains(&id) => {
                return Err(QueryError::NotReady(job_id.to_string()));
            }
            None => return Err(QueryError::NotFound(job_id.to_string())),
        };

        let path = self.download_dir.join(&filename);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(%id, path = %path.display(), "Artifact missing on disk");
                return Err(QueryError::FileMissing(filename));
            }
            Err(source) => return Err(QueryError::Io { filename, source }),
        };

        let metadata = match file.metadata().await {
            Ok(metadata) => metadata,
            Err(source) => return Err(QueryError::Io { filename, source }),
        };
        if !metadata.is_file() {
            return Err(QueryError::FileMissing(filename));
        }

        Ok(Artifact {
            content_type: content_type_for(&filename),
            len: metadata.len(),
            file,
            filename,
        })
    }
}

fn parse_job_id(raw: &str) -> Result<JobId, QueryError> {
    raw.parse()
        .map_err(|_| QueryError::NotFound(raw.to_string()))
}

/// Content type for an artifact, inferred from its extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("opus" | "ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("wav") => "audio/wav",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("flv") => "video/x-flv",
        _ => "video/mp4",
    }
}
