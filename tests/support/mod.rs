#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, Utc};

use tasksync::cache::{CategoryCache, CollectionCache, Column, TimeCache};
use tasksync::engine::{CacheUpdater, Mutator};
use tasksync::error::{Error, Result};
use tasksync::sync::{SyncRequest, TaskTransport};
use tasksync::task::{Label, Task};

pub fn utc(s: &str) -> DateTime<Utc> {
    s.parse().expect("timestamp")
}

pub fn task_with_start(id: &str, start: &str) -> Task {
    let mut task = Task::new(id);
    task.start = Some(utc(start));
    task
}

pub fn subtask(id: &str, parent_id: &str) -> Task {
    let mut task = Task::new(id);
    task.parent_task_id = Some(parent_id.to_string());
    task
}

pub fn labeled_task(id: &str, label: &str) -> Task {
    let mut task = Task::new(id);
    task.label = Some(label.to_string());
    task
}

pub fn category_cache(labels: &[&str]) -> CollectionCache {
    CollectionCache::Category(CategoryCache {
        entities: Default::default(),
        labels: labels.iter().map(|id| Label::new(*id)).collect(),
    })
}

/// Two week-long columns: Jan 1-7 and Jan 8-14 of 2024, inclusive.
pub fn two_week_columns() -> CollectionCache {
    CollectionCache::Time(TimeCache {
        columns: vec![
            Column::new(utc("2024-01-01T00:00:00Z"), utc("2024-01-07T23:59:59Z")),
            Column::new(utc("2024-01-08T00:00:00Z"), utc("2024-01-14T23:59:59Z")),
        ],
    })
}

/// Shared view of the cache held by a [`RecordingMutator`].
pub struct CacheHandle {
    cache: Rc<RefCell<CollectionCache>>,
    refetches: Rc<Cell<usize>>,
}

impl CacheHandle {
    pub fn cache(&self) -> CollectionCache {
        self.cache.borrow().clone()
    }

    pub fn category(&self) -> CategoryCache {
        match self.cache() {
            CollectionCache::Category(category) => category,
            CollectionCache::Time(_) => panic!("expected category cache"),
        }
    }

    pub fn time(&self) -> TimeCache {
        match self.cache() {
            CollectionCache::Time(time) => time,
            CollectionCache::Category(_) => panic!("expected time cache"),
        }
    }

    pub fn refetches(&self) -> usize {
        self.refetches.get()
    }
}

/// Test double for the view layer's cache setter.
pub struct RecordingMutator {
    cache: Rc<RefCell<CollectionCache>>,
    refetches: Rc<Cell<usize>>,
}

impl RecordingMutator {
    pub fn with_cache(initial: CollectionCache) -> (Self, CacheHandle) {
        let cache = Rc::new(RefCell::new(initial));
        let refetches = Rc::new(Cell::new(0));
        let handle = CacheHandle {
            cache: Rc::clone(&cache),
            refetches: Rc::clone(&refetches),
        };
        (Self { cache, refetches }, handle)
    }
}

impl Mutator for RecordingMutator {
    fn apply(&mut self, update: CacheUpdater) {
        let old = self.cache.borrow().clone();
        *self.cache.borrow_mut() = update(old);
    }

    fn refetch(&mut self) {
        self.refetches.set(self.refetches.get() + 1);
    }
}

/// Test double for the host network stack.
pub struct RecordingTransport {
    dispatched: Rc<RefCell<Vec<SyncRequest>>>,
    fail: bool,
}

impl RecordingTransport {
    pub fn new() -> (Self, Rc<RefCell<Vec<SyncRequest>>>) {
        let dispatched = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                dispatched: Rc::clone(&dispatched),
                fail: false,
            },
            dispatched,
        )
    }

    pub fn failing() -> Self {
        Self {
            dispatched: Rc::new(RefCell::new(Vec::new())),
            fail: true,
        }
    }
}

impl TaskTransport for RecordingTransport {
    fn dispatch(&mut self, request: SyncRequest) -> Result<()> {
        if self.fail {
            return Err(Error::Transport("connection refused".to_string()));
        }
        self.dispatched.borrow_mut().push(request);
        Ok(())
    }
}
