// src/controller/queue.rs

//! Deduplicating work queue
//!
//! - a key is queued at most once; re-adding merges the triggers
//! - a key is processed by at most one worker at a time; a key added while
//!   it is being processed is parked and queued again by [`WorkQueue::done`]
//! - delayed adds keep the earliest deadline, and an immediate add
//!   supersedes a pending delayed one

use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

use super::Trigger;

struct QueueState<K> {
    ready: VecDeque<K>,
    triggers: HashMap<K, Trigger>,
    processing: HashSet<K>,
    parked: HashMap<K, Trigger>,
    delayed: HashMap<K, (Instant, Trigger)>,
    shutdown: bool,
}

impl<K: Clone + Eq + Hash> QueueState<K> {
    fn enqueue(&mut self, key: K, trigger: Trigger) -> bool {
        self.delayed.remove(&key);

        if let Some(pending) = self.triggers.get_mut(&key) {
            *pending = pending.merge(trigger);
            return false;
        }
        if self.processing.contains(&key) {
            let parked = self.parked.entry(key).or_insert(trigger);
            *parked = parked.merge(trigger);
            return false;
        }

        self.triggers.insert(key.clone(), trigger);
        self.ready.push_back(key);
        true
    }

    /// Move delayed entries whose deadline has passed onto the ready queue
    fn promote_due(&mut self, now: Instant) {
        let due: Vec<K> = self
            .delayed
            .iter()
            .filter(|(_, (at, _))| *at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in due {
            if let Some((_, trigger)) = self.delayed.remove(&key) {
                self.enqueue(key, trigger);
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.delayed.values().map(|(at, _)| *at).min()
    }

    fn pop(&mut self) -> Option<(K, Trigger)> {
        let key = self.ready.pop_front()?;
        let trigger = self.triggers.remove(&key).unwrap_or(Trigger::Requeued);
        self.processing.insert(key.clone());
        Some((key, trigger))
    }
}

pub struct WorkQueue<K> {
    state: Mutex<QueueState<K>>,
    available: Condvar,
}

impl<K: Clone + Eq + Hash> Default for WorkQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Eq + Hash> WorkQueue<K> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                ready: VecDeque::new(),
                triggers: HashMap::new(),
                processing: HashSet::new(),
                parked: HashMap::new(),
                delayed: HashMap::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        }
    }

    pub fn add(&self, key: K, trigger: Trigger) {
        let mut state = self.state.lock();
        if state.shutdown {
            return;
        }
        if state.enqueue(key, trigger) {
            self.available.notify_one();
        }
    }

    /// Queue `key` once `delay` has elapsed
    ///
    /// Ignored when the key is already waiting in the ready queue or has an
    /// earlier deadline.
    pub fn add_after(&self, key: K, trigger: Trigger, delay: Duration) {
        if delay.is_zero() {
            self.add(key, trigger);
            return;
        }

        let mut state = self.state.lock();
        if state.shutdown || state.triggers.contains_key(&key) {
            return;
        }

        let deadline = Instant::now() + delay;
        match state.delayed.get_mut(&key) {
            Some((at, pending)) if *at <= deadline => {
                *pending = pending.merge(trigger);
            }
            _ => {
                state.delayed.insert(key, (deadline, trigger));
            }
        }
        // wake a waiter so it can recompute its sleep
        self.available.notify_one();
    }

    /// Block until a key is ready, or return `None` once shut down
    pub fn get(&self) -> Option<(K, Trigger)> {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return None;
            }

            state.promote_due(Instant::now());
            if let Some(item) = state.pop() {
                return Some(item);
            }

            match state.next_deadline() {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    self.available.wait_for(&mut state, wait);
                }
                None => self.available.wait(&mut state),
            }
        }
    }

    /// Take a ready key without blocking
    pub fn try_get(&self) -> Option<(K, Trigger)> {
        let mut state = self.state.lock();
        if state.shutdown {
            return None;
        }
        state.promote_due(Instant::now());
        state.pop()
    }

    /// Finish processing `key`, re-queueing it if it was added meanwhile
    pub fn done(&self, key: &K) {
        let mut state = self.state.lock();
        state.processing.remove(key);
        if let Some(trigger) = state.parked.remove(key)
            && !state.shutdown
            && state.enqueue(key.clone(), trigger)
        {
            self.available.notify_one();
        }
    }

    /// Stop handing out work and wake every blocked worker
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.available.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    #[cfg(test)]
    pub(crate) fn delayed_trigger(&self, key: &K) -> Option<Trigger> {
        self.state.lock().delayed.get(key).map(|(_, trigger)| *trigger)
    }

    /// Keys ready to run right now
    pub fn len(&self) -> usize {
        self.state.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys waiting for a deadline
    pub fn delayed_len(&self) -> usize {
        self.state.lock().delayed.len()
    }

    /// Time until the earliest delayed key is due
    pub fn next_delay(&self) -> Option<Duration> {
        self.state
            .lock()
            .next_deadline()
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_duplicate_adds_are_merged() {
        let queue = WorkQueue::new();
        queue.add("a", Trigger::Scheduled);
        queue.add("a", Trigger::Changed);
        queue.add("b", Trigger::Requeued);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_get(), Some(("a", Trigger::Changed)));
        assert_eq!(queue.try_get(), Some(("b", Trigger::Requeued)));
        assert_eq!(queue.try_get(), None);
    }

    #[test]
    fn test_key_added_while_processing_is_parked() {
        let queue = WorkQueue::new();
        queue.add("a", Trigger::Changed);
        let (key, _) = queue.try_get().unwrap();

        queue.add("a", Trigger::Requeued);
        assert!(queue.try_get().is_none(), "same key must not run twice at once");

        queue.done(&key);
        assert_eq!(queue.try_get(), Some(("a", Trigger::Requeued)));
    }

    #[test]
    fn test_delayed_add() {
        let queue = WorkQueue::new();
        queue.add_after("a", Trigger::Scheduled, Duration::from_millis(30));
        assert!(queue.try_get().is_none());
        assert_eq!(queue.delayed_len(), 1);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.try_get(), Some(("a", Trigger::Scheduled)));
    }

    #[test]
    fn test_immediate_add_supersedes_delayed() {
        let queue = WorkQueue::new();
        queue.add_after("a", Trigger::Scheduled, Duration::from_secs(3600));
        queue.add("a", Trigger::Requeued);

        assert_eq!(queue.delayed_len(), 0);
        assert_eq!(queue.try_get(), Some(("a", Trigger::Requeued)));
    }

    #[test]
    fn test_earliest_deadline_wins() {
        let queue = WorkQueue::new();
        queue.add_after("a", Trigger::Scheduled, Duration::from_secs(3600));
        queue.add_after("a", Trigger::Scheduled, Duration::from_secs(1));
        assert!(queue.next_delay().unwrap() <= Duration::from_secs(1));

        queue.add_after("a", Trigger::Scheduled, Duration::from_secs(7200));
        assert!(queue.next_delay().unwrap() <= Duration::from_secs(1));
    }

    #[test]
    fn test_blocking_get_wakes_on_add_and_shutdown() {
        let queue = Arc::new(WorkQueue::new());

        let worker = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some((key, _)) = queue.get() {
                    seen.push(key);
                    queue.done(&key);
                }
                seen
            })
        };

        queue.add(1, Trigger::Changed);
        queue.add_after(2, Trigger::Scheduled, Duration::from_millis(20));
        thread::sleep(Duration::from_millis(100));
        queue.shutdown();

        let seen = worker.join().unwrap();
        assert_eq!(seen, vec![1, 2]);
    }
}
