use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use tracing::{debug, warn};

use super::models::{JobId, JobState, ProgressSnapshot};

/// In-memory map of job ID to live progress snapshot.
///
/// Every mutation runs under one short write-lock section, so readers never
/// observe a half-applied update. Once the runner has made its final write
/// for a job, later updates for that ID are dropped.
#[derive(Debug, Default)]
pub struct ProgressStore {
    snapshots: RwLock<HashMap<JobId, ProgressSnapshot>>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot for `job_id`, unless it has been finalized.
    pub fn set(&self, job_id: JobId, snapshot: ProgressSnapshot) {
        let mut snapshots = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);
        if snapshots.get(&job_id).is_some_and(ProgressSnapshot::is_finalized) {
            warn!(%job_id, "Ignoring progress write for finalized job");
            return;
        }
        snapshots.insert(job_id, snapshot);
    }

    pub fn get(&self, job_id: &JobId) -> Option<ProgressSnapshot> {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seed `{pending, 0}` for a job that has no snapshot yet.
    pub fn mark_pending(&self, job_id: JobId) {
        let mut snapshots = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);
        snapshots.entry(job_id).or_insert_with(ProgressSnapshot::pending);
    }

    /// Record a download progress event.
    ///
    /// `percentage` is clamped to `[0, 100]` and never moves backwards while
    /// the job stays in `downloading`. `None` only moves the state.
    /// Events for jobs already in a terminal state are ignored.
    pub fn record_downloading(&self, job_id: JobId, percentage: Option<f64>) {
        self.update(job_id, |snapshot| match snapshot.status {
            JobState::Pending => {
                snapshot.status = JobState::Downloading;
                snapshot.percentage = percentage.map(clamp_percentage).unwrap_or(0.0);
                true
            }
            JobState::Downloading => {
                if let Some(value) = percentage.map(clamp_percentage) {
                    snapshot.percentage = snapshot.percentage.max(value);
                }
                true
            }
            JobState::Completed | JobState::Failed => false,
        });
    }

    /// Provisional completion reported by the fetcher before the artifact is
    /// verified.
    pub fn record_fetch_finished(&self, job_id: JobId) {
        self.update(job_id, |snapshot| {
            snapshot.status = JobState::Completed;
            snapshot.percentage = 100.0;
            true
        });
    }

    /// Error reported by the fetcher itself. Keeps the last known percentage.
    pub fn record_fetch_error(&self, job_id: JobId, error: impl Into<String>) {
        let error = error.into();
        self.update(job_id, |snapshot| {
            snapshot.status = JobState::Failed;
            snapshot.error = Some(error);
            true
        });
    }

    /// Final successful write. No further updates are accepted for the ID.
    pub fn finalize_completed(&self, job_id: JobId, filename: &str, title: &str) {
        self.finalize(job_id, |snapshot| {
            snapshot.status = JobState::Completed;
            snapshot.percentage = 100.0;
            snapshot.error = None;
            snapshot.filename = Some(filename.to_string());
            snapshot.title = Some(title.to_string());
        });
    }

    /// Final failed write. Keeps the last known percentage.
    pub fn finalize_failed(&self, job_id: JobId, error: &str) {
        self.finalize(job_id, |snapshot| {
            snapshot.status = JobState::Failed;
            snapshot.error = Some(error.to_string());
        });
    }

    fn update(&self, job_id: JobId, apply: impl FnOnce(&mut ProgressSnapshot) -> bool) {
        let mut snapshots = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);
        let snapshot = snapshots.entry(job_id).or_insert_with(ProgressSnapshot::pending);
        if snapshot.finalized {
            debug!(%job_id, "Dropping progress event after final write");
            return;
        }
        if apply(snapshot) {
            snapshot.updated_at = Utc::now();
        }
    }

    fn finalize(&self, job_id: JobId, apply: impl FnOnce(&mut ProgressSnapshot)) {
        let mut snapshots = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);
        let snapshot = snapshots.entry(job_id).or_insert_with(ProgressSnapshot::pending);
        if snapshot.finalized {
            warn!(%job_id, "Job already finalized");
            return;
        }
        apply(snapshot);
        snapshot.updated_at = Utc::now();
        snapshot.finalized = true;
    }
}

fn clamp_percentage(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn mark_pending_does_not_overwrite_progress() {
        let store = ProgressStore::new();
        let id = JobId::new();

        store.mark_pending(id);
        store.record_downloading(id, Some(30.0));
        store.mark_pending(id);

        let snapshot = store.get(&id).unwrap();
        assert_eq!(snapshot.status, JobState::Downloading);
        assert_eq!(snapshot.percentage, 30.0);
    }

    #[test]
    fn downloading_percentage_never_decreases() {
        let store = ProgressStore::new();
        let id = JobId::new();
        store.mark_pending(id);

        let mut observed = Vec::new();
        for value in [10.0, 45.5, 20.0, 45.5, 80.0, 5.0] {
            store.record_downloading(id, Some(value));
            observed.push(store.get(&id).unwrap().percentage);
        }

        assert_eq!(observed, vec![10.0, 45.5, 45.5, 45.5, 80.0, 80.0]);
    }

    #[test]
    fn percentage_is_clamped() {
        let store = ProgressStore::new();
        let id = JobId::new();

        store.record_downloading(id, Some(250.0));
        assert_eq!(store.get(&id).unwrap().percentage, 100.0);

        let other = JobId::new();
        store.record_downloading(other, Some(-3.0));
        assert_eq!(store.get(&other).unwrap().percentage, 0.0);
    }

    #[test]
    fn unknown_percentage_only_moves_state() {
        let store = ProgressStore::new();
        let id = JobId::new();
        store.mark_pending(id);

        store.record_downloading(id, None);
        let snapshot = store.get(&id).unwrap();
        assert_eq!(snapshot.status, JobState::Downloading);
        assert_eq!(snapshot.percentage, 0.0);

        store.record_downloading(id, Some(12.0));
        store.record_downloading(id, None);
        assert_eq!(store.get(&id).unwrap().percentage, 12.0);
    }

    #[test]
    fn fetch_error_keeps_last_percentage() {
        let store = ProgressStore::new();
        let id = JobId::new();
        store.record_downloading(id, Some(62.0));

        store.record_fetch_error(id, "HTTP Error 403");

        let snapshot = store.get(&id).unwrap();
        assert_eq!(snapshot.status, JobState::Failed);
        assert_eq!(snapshot.percentage, 62.0);
        assert_eq!(snapshot.error.as_deref(), Some("HTTP Error 403"));
    }

    #[test]
    fn downloading_after_terminal_state_is_ignored() {
        let store = ProgressStore::new();
        let id = JobId::new();
        store.record_downloading(id, Some(40.0));
        store.record_fetch_finished(id);

        store.record_downloading(id, Some(10.0));

        let snapshot = store.get(&id).unwrap();
        assert_eq!(snapshot.status, JobState::Completed);
        assert_eq!(snapshot.percentage, 100.0);
    }

    #[test]
    fn finalized_snapshot_is_immutable() {
        let store = ProgressStore::new();
        let id = JobId::new();
        store.record_downloading(id, Some(50.0));
        store.finalize_completed(id, "clip.mp4", "Clip");
        let frozen = store.get(&id).unwrap();

        store.record_fetch_error(id, "late error");
        store.finalize_failed(id, "late failure");
        store.set(id, ProgressSnapshot::pending());

        let snapshot = store.get(&id).unwrap();
        assert_eq!(snapshot, frozen);
        assert!(snapshot.is_finalized());
        assert_eq!(snapshot.filename.as_deref(), Some("clip.mp4"));
        assert_eq!(snapshot.title.as_deref(), Some("Clip"));
    }

    #[test]
    fn finalize_failed_keeps_percentage() {
        let store = ProgressStore::new();
        let id = JobId::new();
        store.record_downloading(id, Some(33.0));

        store.finalize_failed(id, "could not determine final filename");

        let snapshot = store.get(&id).unwrap();
        assert_eq!(snapshot.status, JobState::Failed);
        assert_eq!(snapshot.percentage, 33.0);
    }

    #[test]
    fn concurrent_jobs_do_not_interfere() {
        let store = Arc::new(ProgressStore::new());
        let ids: Vec<JobId> = (0..8).map(|_| JobId::new()).collect();

        std::thread::scope(|scope| {
            for id in &ids {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    store.mark_pending(*id);
                    for step in 0..=100 {
                        store.record_downloading(*id, Some(step as f64));
                    }
                    store.finalize_completed(*id, "out.mp4", "Out");
                });
            }
        });

        assert_eq!(store.len(), ids.len());
        for id in &ids {
            let snapshot = store.get(id).unwrap();
            assert_eq!(snapshot.status, JobState::Completed);
            assert_eq!(snapshot.percentage, 100.0);
        }
    }
}
