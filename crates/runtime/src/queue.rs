// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Unbounded thread-safe FIFO queue.
//!
//! The handoff point between task producers (the orchestrator) and the
//! engine's worker threads. Items are owned: a pushed item is delivered to
//! exactly one consumer, and items from any single producer come out in
//! the order they went in.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// An unbounded FIFO of owned items with blocking and non-blocking pops.
#[derive(Debug)]
pub struct TaskQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> TaskQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Enqueues an item and wakes one waiting consumer. O(1).
    pub fn push(&self, item: T) {
        {
            let mut items = self.items.lock().expect("queue mutex poisoned");
            items.push_back(item);
        }
        self.available.notify_one();
    }

    /// Blocks until an item is available and returns it.
    pub fn pop(&self) -> T {
        let mut items = self.items.lock().expect("queue mutex poisoned");
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            items = self
                .available
                .wait(items)
                .expect("queue mutex poisoned");
        }
    }

    /// Waits up to `timeout` for an item.
    ///
    /// Returns `None` on timeout. Worker threads use this so a stop flag is
    /// observed without sentinel tasks.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = std::time::Instant::now() + timeout;
        let mut items = self.items.lock().expect("queue mutex poisoned");
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return None;
            }
            // Spurious wakeups loop back around until the deadline.
            let (guard, _result) = self
                .available
                .wait_timeout(items, deadline - now)
                .expect("queue mutex poisoned");
            items = guard;
        }
    }

    /// Returns an item if one is immediately available; never blocks beyond
    /// the lock.
    pub fn try_pop(&self) -> Option<T> {
        self.items
            .lock()
            .expect("queue mutex poisoned")
            .pop_front()
    }

    /// Returns `true` when the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.lock().expect("queue mutex poisoned").is_empty()
    }

    /// Returns the number of queued items.
    pub fn len(&self) -> usize {
        self.items.lock().expect("queue mutex poisoned").len()
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_push_pop_order() {
        let q = TaskQueue::new();
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.len(), 3);
        assert_eq!(q.pop(), 1);
        assert_eq!(q.pop(), 2);
        assert_eq!(q.pop(), 3);
        assert!(q.is_empty());
    }

    #[test]
    fn test_try_pop_empty() {
        let q: TaskQueue<u32> = TaskQueue::new();
        assert_eq!(q.try_pop(), None);
        q.push(7);
        assert_eq!(q.try_pop(), Some(7));
    }

    #[test]
    fn test_pop_timeout_expires() {
        let q: TaskQueue<u32> = TaskQueue::new();
        let before = std::time::Instant::now();
        assert_eq!(q.pop_timeout(Duration::from_millis(30)), None);
        assert!(before.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_blocking_pop_wakes_on_push() {
        let q = Arc::new(TaskQueue::new());
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.pop())
        };
        thread::sleep(Duration::from_millis(20));
        q.push(42u32);
        assert_eq!(consumer.join().unwrap(), 42);
    }

    #[test]
    fn test_single_consumer_sees_producer_fifo() {
        let q = Arc::new(TaskQueue::new());
        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..100u32 {
                        q.push((p, i));
                    }
                })
            })
            .collect();
        for h in producers {
            h.join().unwrap();
        }

        // One consumer: per-producer sequences must be in order.
        let mut last = [None::<u32>; 4];
        while let Some((p, i)) = q.try_pop() {
            if let Some(prev) = last[p as usize] {
                assert!(i > prev, "producer {p} reordered: {prev} then {i}");
            }
            last[p as usize] = Some(i);
        }
        for (p, seen) in last.iter().enumerate() {
            assert_eq!(seen, &Some(99), "producer {p} lost items");
        }
    }

    #[test]
    fn test_each_item_delivered_once() {
        let q = Arc::new(TaskQueue::new());
        for i in 0..1000u32 {
            q.push(i);
        }
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(item) = q.try_pop() {
                        seen.push(item);
                    }
                    seen
                })
            })
            .collect();
        let mut all: Vec<u32> = consumers
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..1000).collect::<Vec<_>>());
    }
}
