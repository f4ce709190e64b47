use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, warn};

use super::models::{JobId, ResultRecord};

/// Write-once map of job ID to terminal outcome.
#[derive(Debug, Default)]
pub struct ResultStore {
    records: RwLock<HashMap<JobId, ResultRecord>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the terminal record for `job_id`.
    ///
    /// Returns `false` and leaves the existing record untouched if the job
    /// already has one.
    pub fn set_result(&self, job_id: JobId, record: ResultRecord) -> bool {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.entry(job_id) {
            Entry::Vacant(slot) => {
                debug!(%job_id, state = ?record.state(), "Result recorded");
                slot.insert(record);
                true
            }
            Entry::Occupied(_) => {
                warn!(%job_id, "Result already recorded, ignoring second write");
                false
            }
        }
    }

    pub fn get_result(&self, job_id: &JobId) -> Option<ResultRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
