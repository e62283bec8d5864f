// THEORY:
// The `parallel_pipeline` runs many independent frames through the engine at once.
// Analysis is a pure function of the pixels, so frames can be processed in any order
// on any thread; the only job here is to keep every core busy without letting
// CPU-bound work stall the async runtime.
//
// Key architectural principles:
// 1.  **Dispatcher + workers**: a single dispatcher task hands tasks round-robin to a
//     fixed set of worker tasks over unbounded channels.
// 2.  **Blocking isolation**: each worker moves the actual analysis onto
//     `spawn_blocking`, so the engine never runs on an async executor thread.
// 3.  **Oneshot replies**: every task carries its own reply channel. `analyze_all`
//     joins the replies in submission order, so results line up with their inputs.
// 4.  **Shared, immutable analyzer**: workers share one `SceneAnalyzer` through an
//     `Arc`; there is no per-worker state to keep in sync.

use crate::config::AnalyzerConfig;
use crate::core_modules::frame::OwnedFrame;
use crate::pipeline::{AnalysisComponents, AnalysisOptions, SceneAnalyzer};
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("worker pool is shut down")]
    PoolClosed,
    #[error("worker dropped the task before replying")]
    WorkerDropped,
}

pub struct AnalysisTask {
    pub frame_id: u64,
    pub frame: OwnedFrame,
    pub options: AnalysisOptions,
    pub result_sender: oneshot::Sender<AnalysisComponents>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<AnalysisTask>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns the dispatcher and `worker_count` workers. Must be called from within a
    /// Tokio runtime.
    pub fn new(analyzer: Arc<SceneAnalyzer>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<AnalysisTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<AnalysisTask>())
            .unzip();

        // Spawn dispatcher
        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if worker_senders[worker_idx].send(task).is_err() {
                    warn!(worker_idx, "worker channel closed, dropping task");
                }
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        // Spawn workers
        let workers = worker_receivers
            .into_iter()
            .enumerate()
            .map(|(worker_idx, mut worker_receiver)| {
                let analyzer = Arc::clone(&analyzer);
                tokio::spawn(async move {
                    while let Some(task) = worker_receiver.recv().await {
                        Self::process_task(&analyzer, worker_idx, task).await;
                    }
                })
            })
            .collect();

        Self {
            task_sender,
            dispatcher,
            workers,
        }
    }

    async fn process_task(analyzer: &Arc<SceneAnalyzer>, worker_idx: usize, task: AnalysisTask) {
        let AnalysisTask {
            frame_id,
            frame,
            options,
            result_sender,
        } = task;
        let analyzer = Arc::clone(analyzer);
        match tokio::task::spawn_blocking(move || analyzer.analyze(&frame.view(), &options)).await {
            Ok(components) => {
                debug!(worker_idx, frame_id, "frame analysis finished");
                // The caller may have stopped waiting; nothing to do then.
                let _ = result_sender.send(components);
            }
            Err(err) => warn!(worker_idx, frame_id, error = %err, "frame analysis panicked"),
        }
    }

    pub async fn analyze(
        &self,
        frame_id: u64,
        frame: OwnedFrame,
        options: AnalysisOptions,
    ) -> Result<AnalysisComponents, BatchError> {
        let (result_sender, result_receiver) = oneshot::channel();
        let task = AnalysisTask {
            frame_id,
            frame,
            options,
            result_sender,
        };
        self.task_sender.send(task).map_err(|_| BatchError::PoolClosed)?;
        result_receiver.await.map_err(|_| BatchError::WorkerDropped)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stops accepting work and waits for in-flight tasks to drain.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        let _ = self.dispatcher.await;
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Analyzes batches of frames in parallel with a bounded number of workers.
pub struct BatchAnalyzer {
    pool: WorkerPool,
}

impl BatchAnalyzer {
    /// One worker per logical CPU.
    pub fn new(config: AnalyzerConfig) -> Self {
        Self::with_workers(config, num_cpus::get())
    }

    pub fn with_workers(config: AnalyzerConfig, worker_count: usize) -> Self {
        let analyzer = Arc::new(SceneAnalyzer::new(config));
        Self {
            pool: WorkerPool::new(analyzer, worker_count),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Results are returned in the order of `frames`.
    pub async fn analyze_all(
        &self,
        frames: Vec<OwnedFrame>,
        options: AnalysisOptions,
    ) -> Vec<Result<AnalysisComponents, BatchError>> {
        let total = frames.len();
        let pending = frames
            .into_iter()
            .enumerate()
            .map(|(frame_id, frame)| self.pool.analyze(frame_id as u64, frame, options));
        let results = join_all(pending).await;
        debug!(total, failed = results.iter().filter(|r| r.is_err()).count(), "batch analyzed");
        results
    }

    pub async fn shutdown(self) {
        self.pool.shutdown().await;
    }
}
