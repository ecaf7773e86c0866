//! Background run queue with observable status
//!
//! The upload side of the system hands runs to [`RunQueue::submit`] and
//! returns immediately; the outcome of every run is recorded and can be
//! polled with [`RunQueue::status`] or awaited with [`RunQueue::wait`].
//! A single worker executes runs one at a time, so two runs never share
//! the working directory concurrently.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{Notify, mpsc};
use tracing::{error, info};

use crate::pipeline::{Pipeline, PipelineInputs};

pub type RunId = u64;

/// Number of finished runs whose status is kept
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Run queue worker has stopped")]
    WorkerStopped,
}

/// Lifecycle of a submitted run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded { output: PathBuf },
    Failed { error: String },
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded { .. } | RunStatus::Failed { .. })
    }
}

struct Job {
    id: RunId,
    inputs: PipelineInputs,
}

struct StatusStore {
    inner: Mutex<StatusMap>,
    changed: Notify,
}

struct StatusMap {
    statuses: HashMap<RunId, RunStatus>,
    /// Finished runs, oldest first
    finished: VecDeque<RunId>,
    history_limit: usize,
}

impl StatusStore {
    fn new(history_limit: usize) -> Self {
        Self {
            inner: Mutex::new(StatusMap {
                statuses: HashMap::new(),
                finished: VecDeque::new(),
                history_limit: history_limit.max(1),
            }),
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatusMap> {
        // Statuses are plain values, so a poisoned map is still consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, id: RunId, status: RunStatus) {
        {
            let mut map = self.lock();
            let terminal = status.is_terminal();
            map.statuses.insert(id, status);
            if terminal {
                map.finished.push_back(id);
                while map.finished.len() > map.history_limit {
                    if let Some(oldest) = map.finished.pop_front() {
                        map.statuses.remove(&oldest);
                    }
                }
            }
        }
        self.changed.notify_waiters();
    }

    fn get(&self, id: RunId) -> Option<RunStatus> {
        self.lock().statuses.get(&id).cloned()
    }
}

/// Handle to the run queue; clones share the same worker and status store
#[derive(Clone)]
pub struct RunQueue {
    sender: mpsc::UnboundedSender<Job>,
    store: Arc<StatusStore>,
    next_id: Arc<AtomicU64>,
}

impl RunQueue {
    /// Spawn the worker on the current tokio runtime
    pub fn start(pipeline: Pipeline) -> Self {
        Self::with_history_limit(pipeline, DEFAULT_HISTORY_LIMIT)
    }

    /// Like [`RunQueue::start`], keeping at most `limit` finished statuses
    ///
    /// Once the limit is exceeded the oldest finished run is forgotten and
    /// reports no status.
    pub fn with_history_limit(pipeline: Pipeline, limit: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let store = Arc::new(StatusStore::new(limit));

        tokio::spawn(run_worker(pipeline, receiver, Arc::clone(&store)));

        Self {
            sender,
            store,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Queue a run and return its id without waiting for it
    pub fn submit(&self, inputs: PipelineInputs) -> Result<RunId, RunnerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.store.set(id, RunStatus::Queued);

        if self.sender.send(Job { id, inputs }).is_err() {
            self.store.set(
                id,
                RunStatus::Failed {
                    error: RunnerError::WorkerStopped.to_string(),
                },
            );
            return Err(RunnerError::WorkerStopped);
        }

        info!("Queued run {}", id);
        Ok(id)
    }

    /// Current status of a run, or None for an unknown id
    pub fn status(&self, id: RunId) -> Option<RunStatus> {
        self.store.get(id)
    }

    /// Wait until a run succeeds or fails; None for an unknown id
    pub async fn wait(&self, id: RunId) -> Option<RunStatus> {
        loop {
            // Register before reading so a change between the two is not missed
            let changed = self.store.changed.notified();
            match self.store.get(id) {
                None => return None,
                Some(status) if status.is_terminal() => return Some(status),
                Some(_) => changed.await,
            }
        }
    }
}

async fn run_worker(
    pipeline: Pipeline,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    store: Arc<StatusStore>,
) {
    while let Some(Job { id, inputs }) = receiver.recv().await {
        store.set(id, RunStatus::Running);
        info!("Starting run {}", id);

        let status = match pipeline.run(&inputs).await {
            Ok(report) => {
                info!("Run {} succeeded: {:?}", id, report.output);
                RunStatus::Succeeded {
                    output: report.output,
                }
            }
            Err(e) => {
                error!("Run {} failed: {}", id, e);
                RunStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        store.set(id, status);
    }
}
