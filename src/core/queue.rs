use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Shared first-come-first-served queue of pending jobs.
///
/// `pop` removes the front element under the queue lock, so no two callers
/// can ever receive the same job. `len` is advisory and only meant for
/// progress reporting.
#[derive(Debug)]
pub struct WorkQueue<T> {
    jobs: Mutex<VecDeque<T>>,
    total: usize,
}

impl<T> WorkQueue<T> {
    pub fn new(jobs: impl IntoIterator<Item = T>) -> Self {
        let jobs: VecDeque<T> = jobs.into_iter().collect();
        let total = jobs.len();
        Self {
            jobs: Mutex::new(jobs),
            total,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // A panicking worker cannot leave the deque half-modified
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Pop the next job together with its 1-based position in the queue's
    /// original order, observed atomically with the removal.
    pub fn pop_numbered(&self) -> Option<(usize, T)> {
        let mut jobs = self.lock();
        let job = jobs.pop_front()?;
        Some((self.total - jobs.len(), job))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of jobs the queue was created with
    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn pops_in_discovery_order() {
        let queue = WorkQueue::new(["a", "b", "c"]);
        assert_eq!(queue.total(), 3);
        assert_eq!(queue.pop_numbered(), Some((1, "a")));
        assert_eq!(queue.pop(), Some("b"));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_numbered(), Some((3, "c")));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn concurrent_pops_never_duplicate() {
        let queue = Arc::new(WorkQueue::new(0..10_000u32));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(job) = queue.pop() {
                        seen.push(job);
                    }
                    seen
                })
            })
            .collect();

        let mut all = HashSet::new();
        let mut count = 0;
        for handle in handles {
            for job in handle.join().unwrap() {
                assert!(all.insert(job), "job {job} popped twice");
                count += 1;
            }
        }
        assert_eq!(count, 10_000);
        assert_eq!(queue.len(), 0);
    }
}
