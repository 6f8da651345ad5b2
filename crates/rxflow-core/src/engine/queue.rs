//! Priority work queues for the pharmacy workflow stages.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use crate::models::Priority;

/// The workflow stages that carry a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkQueueName {
    Clinical,
    Dispensing,
    Billing,
}

impl fmt::Display for WorkQueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkQueueName::Clinical => "clinical",
            WorkQueueName::Dispensing => "dispensing",
            WorkQueueName::Billing => "billing",
        };
        f.write_str(s)
    }
}

impl FromStr for WorkQueueName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clinical" => Ok(WorkQueueName::Clinical),
            "dispensing" => Ok(WorkQueueName::Dispensing),
            "billing" => Ok(WorkQueueName::Billing),
            other => Err(format!("unknown work queue: {other}")),
        }
    }
}

/// Heap entry: priority first, then FIFO by submission sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueEntry {
    priority: Priority,
    seq: u64,
    order_id: String,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority wins; within a priority the earlier
        // submission (smaller seq) is greater.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One priority-ordered queue with an atomic take-next operation.
#[derive(Debug, Default)]
pub struct WorkQueue {
    entries: Mutex<BinaryHeap<QueueEntry>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BinaryHeap<QueueEntry>> {
        // Heap operations do not leave partial state behind on panic.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, priority: Priority, seq: u64, order_id: impl Into<String>) {
        self.lock().push(QueueEntry {
            priority,
            seq,
            order_id: order_id.into(),
        });
    }

    /// Atomically remove and return the head order id. The first caller gets
    /// the head; there is no double-assignment.
    pub fn pop(&self) -> Option<String> {
        self.lock().pop().map(|entry| entry.order_id)
    }

    /// Order ids in priority order without removing them.
    pub fn snapshot(&self) -> Vec<String> {
        let mut sorted = self.lock().clone().into_sorted_vec();
        sorted.reverse(); // into_sorted_vec is ascending; head belongs first
        sorted.into_iter().map(|entry| entry.order_id).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// The per-stage queues owned by the engine.
#[derive(Debug, Default)]
pub struct WorkQueues {
    pub clinical: WorkQueue,
    pub dispensing: WorkQueue,
    pub billing: WorkQueue,
}

impl WorkQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: WorkQueueName) -> &WorkQueue {
        match name {
            WorkQueueName::Clinical => &self.clinical,
            WorkQueueName::Dispensing => &self.dispensing,
            WorkQueueName::Billing => &self.billing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order_with_fifo_ties() {
        let queue = WorkQueue::new();
        queue.push(Priority::Routine, 0, "routine-1");
        queue.push(Priority::Stat, 1, "stat");
        queue.push(Priority::Urgent, 2, "urgent");
        queue.push(Priority::Routine, 3, "routine-2");

        assert_eq!(queue.pop().as_deref(), Some("stat"));
        assert_eq!(queue.pop().as_deref(), Some("urgent"));
        assert_eq!(queue.pop().as_deref(), Some("routine-1"));
        assert_eq!(queue.pop().as_deref(), Some("routine-2"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_snapshot_preserves_entries() {
        let queue = WorkQueue::new();
        queue.push(Priority::Routine, 0, "a");
        queue.push(Priority::Stat, 1, "b");

        assert_eq!(queue.snapshot(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_concurrent_pop_no_double_assignment() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let queue = Arc::new(WorkQueue::new());
        for i in 0..100 {
            queue.push(Priority::Routine, i, format!("order-{i}"));
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            handles.push(std::thread::spawn(move || {
                let mut taken = Vec::new();
                while let Some(id) = queue.pop() {
                    taken.push(id);
                }
                taken
            }));
        }

        let mut all: Vec<String> = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), 100);
        assert_eq!(unique.len(), 100);
    }

    #[test]
    fn test_queue_name_parse() {
        assert_eq!("clinical".parse::<WorkQueueName>().unwrap(), WorkQueueName::Clinical);
        assert_eq!("Dispensing".parse::<WorkQueueName>().unwrap(), WorkQueueName::Dispensing);
        assert!("returns".parse::<WorkQueueName>().is_err());
    }
}
