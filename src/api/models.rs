use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::fetcher::MediaFormat;
use crate::ledger::JobId;
use crate::observability::MetricsSnapshot;
use crate::worker::JobRequest;

/// One `POST /download` item.
///
/// `url` is optional here so a missing URL surfaces as a batch validation
/// error rather than a JSON error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadItem {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format: Option<MediaFormat>,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl From<DownloadItem> for JobRequest {
    fn from(item: DownloadItem) -> Self {
        JobRequest {
            url: item.url,
            format: item.format,
            resolution: item.resolution,
        }
    }
}

/// Body of `POST /download`: a single item or an array of items.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DownloadPayload {
    Batch(Vec<DownloadItem>),
    Single(DownloadItem),
}

impl DownloadPayload {
    pub fn into_requests(self) -> Vec<JobRequest> {
        match self {
            DownloadPayload::Batch(items) => items.into_iter().map(JobRequest::from).collect(),
            DownloadPayload::Single(item) => vec![item.into()],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadAccepted {
    pub message: String,
    pub file_ids: Vec<JobId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
    pub jobs: MetricsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_accepts_single_object() {
        let payload: DownloadPayload =
            serde_json::from_str(r#"{"url": "https://a", "format": "audio"}"#).unwrap();
        let requests = payload.into_requests();

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.as_deref(), Some("https://a"));
        assert_eq!(requests[0].format, Some(MediaFormat::Audio));
    }

    #[test]
    fn test_payload_accepts_array() {
        let payload: DownloadPayload = serde_json::from_str(
            r#"[{"url": "https://a", "format": "mp4", "resolution": "720p"}, {"format": "mp3"}]"#,
        )
        .unwrap();
        let requests = payload.into_requests();

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].format, Some(MediaFormat::Video));
        assert_eq!(requests[0].resolution.as_deref(), Some("720p"));
        // missing URL survives parsing; the dispatcher rejects it
        assert_eq!(requests[1].url, None);
        assert_eq!(requests[1].format, Some(MediaFormat::Audio));
    }

    #[test]
    fn test_payload_rejects_unknown_format() {
        let result: Result<DownloadPayload, _> =
            serde_json::from_str(r#"{"url": "https://a", "format": "gif"}"#);
        assert!(result.is_err());
    }
}
