//! In-process worker pool.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{spawn_detached, FetchTask, Queue, QueueError, ScheduleOptions, TaskHandler};
use crate::metrics;

type TaskKey = (String, String, Option<String>);
type InFlight = Arc<Mutex<HashSet<TaskKey>>>;

struct QueuedTask {
    key: TaskKey,
    task: FetchTask,
}

/// Fixed pool of workers fed by a bounded channel.
///
/// When the channel is full, `schedule_fetch` waits for room. A task
/// identical to one still queued or running is dropped.
pub struct InMemoryQueue {
    sender: Mutex<Option<mpsc::Sender<QueuedTask>>>,
    workers: AsyncMutex<Vec<JoinHandle<()>>>,
    in_flight: InFlight,
}

impl InMemoryQueue {
    /// Starts `workers` workers. Must be called inside a tokio runtime.
    pub fn new(
        handler: Arc<dyn TaskHandler>,
        workers: usize,
        buffer_size: usize,
        task_timeout: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let rx = Arc::new(AsyncMutex::new(rx));
        let in_flight = InFlight::default();

        let handles = (0..workers.max(1))
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&rx),
                    Arc::clone(&handler),
                    Arc::clone(&in_flight),
                    task_timeout,
                ))
            })
            .collect();

        info!(workers, buffer_size, "In-memory queue started");
        Self {
            sender: Mutex::new(Some(tx)),
            workers: AsyncMutex::new(handles),
            in_flight,
        }
    }

    /// Stops accepting work and waits until every queued task has run.
    pub async fn drain(&self) {
        lock(&self.sender).take();
        let handles = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Queue worker panicked");
            }
        }
        debug!("In-memory queue drained");
    }

    /// Tasks queued or running.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn worker_loop(
    id: usize,
    rx: Arc<AsyncMutex<mpsc::Receiver<QueuedTask>>>,
    handler: Arc<dyn TaskHandler>,
    in_flight: InFlight,
    task_timeout: Duration,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(QueuedTask { key, task }) = next else {
            break;
        };

        let module_path = task.module_path.clone();
        let version = task.version.clone();
        let request_id = task.request_id.clone();
        let handler = Arc::clone(&handler);

        let result = spawn_detached(&request_id, async move {
            tokio::time::timeout(task_timeout, handler.process(task)).await
        })
        .await;

        match result {
            Ok(Ok(status)) => {
                debug!(worker = id, %module_path, %version, %status, "Task finished");
            }
            Ok(Err(_)) => {
                metrics::QUEUE_TASK_TIMEOUTS.inc();
                warn!(
                    worker = id,
                    %module_path,
                    %version,
                    timeout_secs = task_timeout.as_secs(),
                    "Task timed out"
                );
            }
            Err(e) => {
                error!(worker = id, %module_path, %version, error = %e, "Task panicked");
            }
        }

        lock(&in_flight).remove(&key);
    }
    debug!(worker = id, "Queue worker stopped");
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn schedule_fetch(
        &self,
        module_path: &str,
        version: &str,
        opts: &ScheduleOptions,
    ) -> Result<bool, QueueError> {
        let source = opts.source_label();
        let key = (
            module_path.to_string(),
            version.to_string(),
            opts.suffix.clone(),
        );

        if !lock(&self.in_flight).insert(key.clone()) {
            metrics::QUEUE_SCHEDULED
                .with_label_values(&[self.backend_name(), source, "duplicate"])
                .inc();
            debug!(module_path, version, "Task already in flight");
            return Ok(false);
        }

        let sender = lock(&self.sender).clone();
        let task = FetchTask::new(module_path, version).with_options(opts);
        let sent = match sender {
            Some(sender) => sender
                .send(QueuedTask {
                    key: key.clone(),
                    task,
                })
                .await
                .is_ok(),
            None => false,
        };

        if !sent {
            lock(&self.in_flight).remove(&key);
            metrics::QUEUE_SCHEDULED
                .with_label_values(&[self.backend_name(), source, "error"])
                .inc();
            return Err(QueueError::Closed);
        }

        metrics::QUEUE_SCHEDULED
            .with_label_values(&[self.backend_name(), source, "enqueued"])
            .inc();
        debug!(module_path, version, "Task enqueued");
        Ok(true)
    }

    fn backend_name(&self) -> &'static str {
        "in_memory"
    }
}
