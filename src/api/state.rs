use std::sync::Arc;

use crate::config::Config;
use crate::fetcher::MediaFetcher;
use crate::ledger::{ProgressStore, QueryService, ResultStore};
use crate::observability::Metrics;
use crate::worker::{JobDispatcher, JobRunner};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<JobDispatcher>,
    pub query: Arc<QueryService>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire stores, runner, dispatcher and query service around `fetcher`.
    pub fn new(config: Config, fetcher: Arc<dyn MediaFetcher>) -> Self {
        let progress = Arc::new(ProgressStore::new());
        let results = Arc::new(ResultStore::new());
        let metrics = Arc::new(Metrics::new());

        let runner = Arc::new(JobRunner::new(
            Arc::clone(&progress),
            Arc::clone(&results),
            fetcher,
            config.fetcher.clone(),
            config.downloads.dir.clone(),
            Arc::clone(&metrics),
        ));

        let dispatcher = Arc::new(JobDispatcher::new(
            runner,
            Arc::clone(&progress),
            Arc::clone(&metrics),
            config.downloads.max_batch,
        ));

        let query = Arc::new(QueryService::new(
            progress,
            results,
            config.downloads.dir.clone(),
        ));

        Self {
            config: Arc::new(config),
            dispatcher,
            query,
            metrics,
        }
    }
}
