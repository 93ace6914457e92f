//! Uniform random load balancing strategy.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{handle::WorkerHandle, LoadBalancer};

/// Picks any alive worker with equal probability.
#[derive(Debug, Default)]
pub struct RandomSelection;

impl RandomSelection {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RandomSelection {
    fn select(&self, workers: &[Arc<WorkerHandle>]) -> Option<Arc<WorkerHandle>> {
        let alive: Vec<&Arc<WorkerHandle>> = workers.iter().filter(|w| w.is_alive()).collect();
        if alive.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..alive.len());
        Some(Arc::clone(alive[index]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::sync::mpsc;

    fn worker(id: usize) -> Arc<WorkerHandle> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Arc::new(WorkerHandle::new(id, "task", tx))
    }

    #[test]
    fn test_empty_pool() {
        assert!(RandomSelection::new().select(&[]).is_none());
    }

    #[test]
    fn test_reaches_every_worker() {
        let lb = RandomSelection::new();
        let workers = vec![worker(0), worker(1), worker(2)];

        let mut seen = HashSet::new();
        for _ in 0..500 {
            seen.insert(lb.select(&workers).unwrap().id());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_skips_dead_workers() {
        let lb = RandomSelection::new();
        let workers = vec![worker(0), worker(1)];
        workers[0].mark_dead();

        for _ in 0..50 {
            assert_eq!(lb.select(&workers).unwrap().id(), 1);
        }

        workers[1].mark_dead();
        assert!(lb.select(&workers).is_none());
    }
}
