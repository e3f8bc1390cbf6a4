//! Priority task queue
//!
//! Holds task ids ordered by priority (higher first) and, within a priority,
//! by enqueue order. Many producers may push concurrently; one consumer pops.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tokio::sync::{Mutex, Notify};

#[derive(Debug, Clone)]
struct Entry {
    priority: i32,
    seq: u64,
    task_id: String,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority wins, then the lower sequence number.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Stable max-priority queue of task ids
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: Mutex<BinaryHeap<Entry>>,
    next_seq: AtomicU64,
    available: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, task_id: impl Into<String>, priority: i32) {
        let entry = Entry {
            priority,
            seq: self.next_seq.fetch_add(1, AtomicOrdering::Relaxed),
            task_id: task_id.into(),
        };
        self.heap.lock().await.push(entry);
        self.available.notify_one();
    }

    async fn try_pop(&self) -> Option<String> {
        self.heap.lock().await.pop().map(|entry| entry.task_id)
    }

    /// Wait for the next task id
    ///
    /// Cancel-safe: an id is only removed in the same poll that returns it.
    pub async fn pop(&self) -> String {
        loop {
            let notified = self.available.notified();
            if let Some(task_id) = self.try_pop().await {
                return task_id;
            }
            notified.await;
        }
    }

    pub async fn len(&self) -> usize {
        self.heap.lock().await.len()
    }

    /// Queued ids in the order `pop` will return them
    pub async fn ordered_ids(&self) -> Vec<String> {
        let snapshot = self.heap.lock().await.clone();
        snapshot
            .into_sorted_vec()
            .into_iter()
            .rev()
            .map(|entry| entry.task_id)
            .collect()
    }
}
