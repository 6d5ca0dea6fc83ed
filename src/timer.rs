// src/timer.rs
//
// Cancellable deferred tasks on the virtual timeline.
//
// Tasks are plain data, not closures: whoever owns the queue pops due
// tasks and acts on them with its own state. Dropping the queue drops
// every pending task with it.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Revocable reference to one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Orders by due time, then by scheduling order.
#[derive(Debug, Clone, Copy)]
struct DueKey {
    due: f64,
    seq: u64,
}

impl PartialEq for DueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DueKey {}

impl PartialOrd for DueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .total_cmp(&other.due)
            .then(self.seq.cmp(&other.seq))
    }
}

pub struct TimerQueue<T> {
    pending: BTreeMap<DueKey, T>,
    /// handle -> due time, for cancellation
    index: HashMap<TimerHandle, f64>,
    next_seq: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `task` to become due at `due` (milliseconds).
    pub fn schedule(&mut self, due: f64, task: T) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;

        let handle = TimerHandle(seq);
        self.pending.insert(DueKey { due, seq }, task);
        self.index.insert(handle, due);
        handle
    }

    /// Revoke a pending task. Returns it if it had not fired yet.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<T> {
        let due = self.index.remove(&handle)?;
        self.pending.remove(&DueKey { due, seq: handle.0 })
    }

    /// Revoke everything. Returns how many tasks were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        self.index.clear();
        count
    }

    /// Due time of the earliest pending task.
    pub fn next_due(&self) -> Option<f64> {
        self.pending.keys().next().map(|key| key.due)
    }

    /// Remove and return the earliest task if it is due at `now`.
    pub fn pop_due(&mut self, now: f64) -> Option<(f64, TimerHandle, T)> {
        let key = *self.pending.keys().next()?;
        if key.due > now {
            return None;
        }

        let task = self.pending.remove(&key)?;
        let handle = TimerHandle(key.seq);
        self.index.remove(&handle);
        Some((key.due, handle, task))
    }

    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.index.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
