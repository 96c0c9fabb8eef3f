//! Runs many cases under a bounded worker pool, one slot per submitted request.

use crate::common::env::EngineEnv;
use crate::domain::{BatchEntry, BatchResult, CaseError, CaseResult};
use crate::input::CaseRequest;
use crate::pipeline::{CaseRunner, PipelineOptions};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub pipeline: PipelineOptions,
    /// Defaults to the number of CPUs.
    pub max_concurrency: Option<usize>,
}

impl BatchOptions {
    /// Workers actually used for `cases` submissions; never zero.
    pub fn concurrency(&self, cases: usize) -> usize {
        let requested = self.max_concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1)
        });
        requested.min(cases).max(1)
    }
}

/// Stops a running batch: cases already executing finish or time out, cases
/// not yet started come back as `Cancelled`.
#[derive(Debug, Clone)]
pub struct StopHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StopHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn stop(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Directory name of batch slot `index`, zero-padded to the width of the last index.
pub fn job_dir_name(index: usize, cases: usize) -> String {
    let width = cases.saturating_sub(1).max(1).to_string().len();
    format!("job{index:0width$}")
}

pub async fn run_batch(
    env: EngineEnv,
    root: impl Into<PathBuf>,
    requests: Vec<CaseRequest>,
    options: BatchOptions,
) -> Result<BatchResult, CaseError> {
    run_batch_with_stop(env, root, requests, options, &StopHandle::new()).await
}

/// Fails as a whole only when the runner cannot be built; every per-case
/// failure lands in that case's slot.
pub async fn run_batch_with_stop(
    env: EngineEnv,
    root: impl Into<PathBuf>,
    requests: Vec<CaseRequest>,
    options: BatchOptions,
    stop: &StopHandle,
) -> Result<BatchResult, CaseError> {
    let cases = requests.len();
    let workers = options.concurrency(cases);
    let runner = CaseRunner::new(env, root, options.pipeline)?;
    let semaphore = Arc::new(Semaphore::new(workers));
    info!(cases, workers, root = %runner.workspace().root().display(), "batch started");

    let mut labels = Vec::with_capacity(cases);
    let mut tasks = JoinSet::new();
    for (index, request) in requests.into_iter().enumerate() {
        let dir_name = job_dir_name(index, cases);
        let label = request
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| dir_name.clone());
        labels.push(label.clone());

        let runner = runner.clone();
        let semaphore = semaphore.clone();
        let stop = stop.subscribe();
        tasks.spawn(async move {
            let outcome = run_slot(&runner, request, &dir_name, semaphore, stop).await;
            BatchEntry {
                index,
                label,
                outcome,
            }
        });
    }

    let mut entries = Vec::with_capacity(cases);
    let mut pending = (0..cases).collect::<BTreeSet<_>>();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => {
                pending.remove(&entry.index);
                entries.push(entry);
            }
            Err(error) => warn!(%error, "batch case task did not complete"),
        }
    }
    for index in pending {
        entries.push(BatchEntry {
            index,
            label: labels[index].clone(),
            outcome: Err(CaseError::Internal("case task aborted".to_string())),
        });
    }

    let result = BatchResult::from_entries(entries);
    info!(
        cases,
        succeeded = result.succeeded(),
        failed = result.failed(),
        "batch finished"
    );
    Ok(result)
}

async fn run_slot(
    runner: &CaseRunner,
    request: CaseRequest,
    dir_name: &str,
    semaphore: Arc<Semaphore>,
    stop: watch::Receiver<bool>,
) -> Result<CaseResult, CaseError> {
    let config = request.validate()?;
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|_| CaseError::Internal("batch worker pool closed".to_string()))?;
    if *stop.borrow() {
        debug!(case = %config.id(), "batch stopped before case started");
        return Err(CaseError::Cancelled);
    }
    runner.run_in(&config, dir_name).await
}

#[cfg(test)]
mod tests {
    use super::{BatchOptions, StopHandle, job_dir_name};

    #[test]
    fn job_directories_pad_to_the_last_index() {
        assert_eq!(job_dir_name(3, 5), "job3");
        assert_eq!(job_dir_name(3, 12), "job03");
        assert_eq!(job_dir_name(7, 101), "job007");
        assert_eq!(job_dir_name(0, 1), "job0");
    }

    #[test]
    fn concurrency_is_capped_by_the_batch() {
        let options = BatchOptions {
            max_concurrency: Some(8),
            ..BatchOptions::default()
        };
        assert_eq!(options.concurrency(3), 3);
        assert_eq!(options.concurrency(0), 1);
        assert!(BatchOptions::default().concurrency(64) >= 1);
    }

    #[test]
    fn stop_handle_is_shared_between_clones() {
        let handle = StopHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_stopped());
        handle.stop();
        assert!(clone.is_stopped());
    }
}
