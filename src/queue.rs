//! Per-task mutation queue.
//!
//! Mutations for a task id with a network send already in flight are held
//! back and released one at a time as sends resolve, so a stale response
//! can never land after a later optimistic write. Distinct task ids are
//! never serialized against each other.

use std::collections::{HashMap, HashSet, VecDeque};

/// Decision for a newly submitted mutation.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission<T> {
    /// Nothing in flight for this id; send now.
    Dispatch(T),
    /// A send is in flight; the mutation was queued behind it.
    Queued,
}

#[derive(Debug, Default)]
pub struct MutationQueue<T> {
    in_flight: HashSet<String>,
    pending: HashMap<String, VecDeque<T>>,
}

impl<T> MutationQueue<T> {
    pub fn new() -> Self {
        Self {
            in_flight: HashSet::new(),
            pending: HashMap::new(),
        }
    }

    /// Admit a mutation for `id`, either claiming the in-flight slot or
    /// queueing behind the current send.
    pub fn admit(&mut self, id: &str, payload: T) -> Admission<T> {
        if self.in_flight.contains(id) {
            self.pending.entry(id.to_string()).or_default().push_back(payload);
            return Admission::Queued;
        }
        self.in_flight.insert(id.to_string());
        Admission::Dispatch(payload)
    }

    /// Resolve the in-flight send for `id`. Returns the next queued
    /// mutation, which keeps the slot, or releases the slot when the queue
    /// is empty.
    pub fn resolve(&mut self, id: &str) -> Option<T> {
        let next = self.pending.get_mut(id).and_then(VecDeque::pop_front);
        if next.is_none() {
            self.pending.remove(id);
            self.in_flight.remove(id);
        }
        next
    }

    /// Drop everything queued for `id` and release its slot. Used when a
    /// failed send is superseded by a full refetch.
    pub fn clear(&mut self, id: &str) {
        self.pending.remove(id);
        self.in_flight.remove(id);
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    pub fn pending_len(&self, id: &str) -> usize {
        self.pending.get(id).map_or(0, VecDeque::len)
    }
}
