use std::collections::HashSet;
use log::{info, error};

use crate::error::RunError;
use crate::query_runner::QueryRunner;
use crate::record_store::RecordStore;
use crate::search_api::SearchTransport;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_queries: usize,
    pub already_processed: usize,
    /// Queries fetched and persisted during this run, in order.
    pub processed: Vec<String>,
    /// Subset of `processed` whose pagination ended on a failed page.
    pub truncated: Vec<String>,
    pub records_fetched: usize,
    /// Pending queries left for a later run because of `max_queries`.
    pub remaining: usize,
}

/// Queries from `all` that are not yet processed, in input order.
/// A query repeated in the input is only scheduled once.
pub fn pending_queries(all: &[String], processed: &HashSet<String>) -> Vec<String> {
    let mut scheduled = HashSet::new();
    all.iter()
        .filter(|q| !processed.contains(q.as_str()))
        .filter(|q| scheduled.insert(q.as_str()))
        .cloned()
        .collect()
}

/// Drives pending queries through the runner and persists after each one.
pub struct ResumeController<T> {
    runner: QueryRunner<T>,
    max_queries: Option<usize>,
}

impl<T: SearchTransport> ResumeController<T> {
    pub fn new(runner: QueryRunner<T>, max_queries: Option<usize>) -> Self {
        ResumeController { runner, max_queries }
    }

    /// Fetches every query of `all_queries` the store has not seen yet.
    ///
    /// The store is saved after each query, so an interruption loses at
    /// most the query in flight. A save failure stops the run.
    pub fn run<S: RecordStore>(&self, all_queries: &[String], store: &mut S) -> Result<RunSummary, RunError> {
        let processed = store.processed_queries();
        let mut pending = pending_queries(all_queries, &processed);

        let mut summary = RunSummary {
            total_queries: all_queries.len(),
            already_processed: all_queries.iter().filter(|q| processed.contains(q.as_str())).count(),
            ..RunSummary::default()
        };

        if let Some(cap) = self.max_queries {
            if pending.len() > cap {
                summary.remaining = pending.len() - cap;
                pending.truncate(cap);
            }
        }

        if pending.is_empty() {
            if summary.remaining > 0 {
                info!("max_queries is 0: {} queries left pending.", summary.remaining);
            } else {
                info!("Nothing to do: all {} queries already processed.", all_queries.len());
            }
            return Ok(summary);
        }
        info!(
            "{} queries pending ({} already processed, {} deferred by max_queries)",
            pending.len(),
            summary.already_processed,
            summary.remaining
        );

        let count = pending.len();
        for (i, query) in pending.into_iter().enumerate() {
            let outcome = self.runner.run_query(&query, i + 1, count);
            let fetched = outcome.records.len();

            let complete = outcome.truncated_by.is_none();
            store.append(&query, outcome.records, complete);
            if let Err(e) = store.save() {
                error!("Failed to save records after query '{}': {}. Stopping.", query, e);
                return Err(e.into());
            }

            info!("Query {}/{} '{}' complete: {} records saved.", i + 1, count, query, fetched);
            summary.records_fetched += fetched;
            if outcome.truncated_by.is_some() {
                summary.truncated.push(query.clone());
            }
            summary.processed.push(query);
        }

        Ok(summary)
    }
}
