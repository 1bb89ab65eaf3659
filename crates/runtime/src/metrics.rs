// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Engine execution counters.
//!
//! Workers record one entry per executed task; counters are atomics so the
//! hot path never takes a lock. Snapshots are cheap and taken on demand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters owned by the computation engine.
#[derive(Debug, Default)]
pub struct EngineStats {
    tasks_executed: AtomicU64,
    tasks_failed: AtomicU64,
    busy_nanos: AtomicU64,
}

impl EngineStats {
    /// Records one successfully executed task.
    pub fn record_success(&self, elapsed: Duration) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
        self.busy_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Records one dropped task (unsupported operator or kernel failure).
    pub fn record_failure(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a consistent-enough snapshot of the counters.
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            busy: Duration::from_nanos(self.busy_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// A point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EngineStatsSnapshot {
    /// Tasks that produced an output.
    pub tasks_executed: u64,
    /// Tasks dropped before producing an output.
    pub tasks_failed: u64,
    /// Cumulative operator execution time across all workers.
    pub busy: Duration,
}

impl EngineStatsSnapshot {
    /// Mean operator execution time, or zero when nothing ran.
    pub fn avg_task_duration(&self) -> Duration {
        if self.tasks_executed == 0 {
            Duration::ZERO
        } else {
            self.busy / self.tasks_executed as u32
        }
    }

    /// Returns a human-readable summary suitable for logs.
    pub fn summary(&self) -> String {
        format!(
            "engine: {} tasks ({} failed), {:.2}ms busy, {:.3}ms avg",
            self.tasks_executed,
            self.tasks_failed,
            self.busy.as_secs_f64() * 1000.0,
            self.avg_task_duration().as_secs_f64() * 1000.0,
        )
    }
}
