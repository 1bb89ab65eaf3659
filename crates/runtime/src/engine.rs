// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The computation engine: a pool of operator workers fed by a task queue.
//!
//! Workers pop `(unit, input)` tasks, run the operator dispatch shim, and
//! hand the output back to the orchestrator. The orchestrator is reached
//! through a `Weak` reference so engine threads can never keep it alive or
//! deadlock its teardown.

use crate::metrics::{EngineStats, EngineStatsSnapshot};
use crate::operators::execute_operator;
use crate::orchestrator::Orchestrator;
use crate::queue::TaskQueue;
use model_dag::{ExecutionUnitId, ModelDag, Validated};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tensor_core::Tensor;

/// How long a worker waits on the queue before re-checking the stop flag.
const POP_INTERVAL: Duration = Duration::from_millis(50);

/// One unit of work: an execution unit id and its assembled input.
struct ComputeTask {
    eu_id: ExecutionUnitId,
    input: Tensor,
}

/// Worker thread-pool executing operator tasks.
pub struct ComputationEngine {
    queue: Arc<TaskQueue<ComputeTask>>,
    stop: Arc<AtomicBool>,
    stats: Arc<EngineStats>,
    workers: Vec<JoinHandle<()>>,
}

impl ComputationEngine {
    /// Creates the engine and spawns `num_workers` worker threads.
    pub(crate) fn new(
        dag: Arc<ModelDag<Validated>>,
        orch: Weak<Orchestrator>,
        num_workers: usize,
    ) -> Self {
        let queue = Arc::new(TaskQueue::new());
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(EngineStats::default());

        let workers = (0..num_workers.max(1))
            .map(|worker_id| {
                let dag = Arc::clone(&dag);
                let orch = orch.clone();
                let queue = Arc::clone(&queue);
                let stop = Arc::clone(&stop);
                let stats = Arc::clone(&stats);
                std::thread::Builder::new()
                    .name(format!("engine-worker-{worker_id}"))
                    .spawn(move || worker_loop(worker_id, dag, orch, queue, stop, stats))
                    .expect("failed to spawn engine worker")
            })
            .collect::<Vec<_>>();

        tracing::info!("computation engine started with {} workers", workers.len());
        Self {
            queue,
            stop,
            stats,
            workers,
        }
    }

    /// Enqueues a task for the given execution unit. Ownership of the
    /// input transfers to the worker that picks it up.
    pub fn submit_task(&self, eu_id: ExecutionUnitId, input: Tensor) {
        tracing::debug!("task submitted for unit '{eu_id}'");
        self.queue.push(ComputeTask { eu_id, input });
    }

    /// Returns a snapshot of the execution counters.
    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the number of tasks waiting in the queue.
    pub fn queued_tasks(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for ComputationEngine {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        for worker in self.workers.drain(..) {
            // Workers observe the stop flag at their next timed pop.
            if worker.join().is_err() {
                tracing::error!("engine worker panicked during shutdown");
            }
        }
        tracing::debug!("computation engine stopped");
    }
}

fn worker_loop(
    worker_id: usize,
    dag: Arc<ModelDag<Validated>>,
    orch: Weak<Orchestrator>,
    queue: Arc<TaskQueue<ComputeTask>>,
    stop: Arc<AtomicBool>,
    stats: Arc<EngineStats>,
) {
    while !stop.load(Ordering::Acquire) {
        let Some(task) = queue.pop_timeout(POP_INTERVAL) else {
            continue;
        };

        let Some(eu) = dag.eu(&task.eu_id) else {
            tracing::error!("worker {worker_id}: unknown unit '{}'", task.eu_id);
            stats.record_failure();
            continue;
        };
        let Some(layer) = dag.layer_of(eu) else {
            tracing::error!(
                "worker {worker_id}: unit '{}' references missing layer '{}'",
                eu.id,
                eu.layer_id
            );
            stats.record_failure();
            continue;
        };

        let started = Instant::now();
        match execute_operator(eu, layer, task.input) {
            Ok(output) => {
                stats.record_success(started.elapsed());
                tracing::debug!(
                    "worker {worker_id}: unit '{}' ({}) done in {:?}",
                    eu.id,
                    layer.kind.name(),
                    started.elapsed(),
                );
                if let Some(orch) = orch.upgrade() {
                    orch.on_computation_complete(eu, output);
                } else {
                    tracing::debug!(
                        "worker {worker_id}: orchestrator gone, dropping output of '{}'",
                        eu.id
                    );
                }
            }
            Err(e) => {
                // The task is dropped; the inference stalls rather than
                // unwinding across threads.
                stats.record_failure();
                tracing::error!("worker {worker_id}: {e}");
            }
        }
    }
    tracing::debug!("engine worker {worker_id} exiting");
}
