//! Load counters for health and monitoring endpoints

use serde::{Deserialize, Serialize};

/// Running and peak counters, mutated only under the queue lock
#[derive(Debug, Clone, Default)]
pub(crate) struct QueueCounters {
    pub total_submitted: u64,
    pub total_processed: u64,
    pub total_queued: u64,
    pub total_errors: u64,
    pub total_cleared: u64,
    pub peak_active: usize,
    pub peak_queue_size: usize,
}

impl QueueCounters {
    pub fn record_start(&mut self, active: usize) {
        self.peak_active = self.peak_active.max(active);
    }

    pub fn record_enqueued(&mut self, queue_size: usize) {
        self.total_queued += 1;
        self.peak_queue_size = self.peak_queue_size.max(queue_size);
    }

    pub fn record_completion(&mut self, failed: bool) {
        self.total_processed += 1;
        if failed {
            self.total_errors += 1;
        }
    }

    pub fn snapshot(&self, active: usize, queued: usize, max_concurrency: usize) -> QueueStats {
        QueueStats {
            active_processes: active,
            queued_tasks: queued,
            max_concurrency,
            utilization_percent: utilization_percent(active, max_concurrency),
            total_submitted: self.total_submitted,
            total_processed: self.total_processed,
            total_queued: self.total_queued,
            total_errors: self.total_errors,
            total_cleared: self.total_cleared,
            peak_active: self.peak_active,
            peak_queue_size: self.peak_queue_size,
        }
    }
}

/// Point-in-time view of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub active_processes: usize,
    pub queued_tasks: usize,
    pub max_concurrency: usize,
    pub utilization_percent: u32,
    pub total_submitted: u64,
    pub total_processed: u64,
    pub total_queued: u64,
    pub total_errors: u64,
    pub total_cleared: u64,
    pub peak_active: usize,
    pub peak_queue_size: usize,
}

impl QueueStats {
    /// Every slot is taken; new submissions will wait
    pub fn is_saturated(&self) -> bool {
        self.active_processes >= self.max_concurrency
    }
}

fn utilization_percent(active: usize, max_concurrency: usize) -> u32 {
    if max_concurrency == 0 {
        return 0;
    }
    (active as f64 * 100.0 / max_concurrency as f64).round() as u32
}
