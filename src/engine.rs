//! Optimistic mutation engine.
//!
//! Four entry points, one add/update pair per cache shape. Each takes the
//! incoming task, rewrites the cache synchronously through the injected
//! [`Mutator`], and never waits on the network. Ambiguous or failed shape
//! detection falls back to a full refetch; the UI never observes a
//! partially-applied mutation because every updater restores a snapshot on
//! error.
//!
//! The mutator is the view layer's revalidation-suppressing setter, passed
//! in explicitly rather than captured as ambient shared state.

use std::cell::Cell;
use std::rc::Rc;

use crate::cache::{CategoryCache, CategorySlot, CollectionCache, TimeCache};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::events::{Event, EventKind, EventSink};
use crate::task::Task;

/// A synchronous cache rewrite: pure function of the old value.
pub type CacheUpdater = Box<dyn FnOnce(CollectionCache) -> CollectionCache>;

/// The cache setter injected by the view layer.
pub trait Mutator {
    /// Apply an update locally without triggering a refetch.
    fn apply(&mut self, update: CacheUpdater);

    /// Schedule an unconditional refetch of the collection.
    fn refetch(&mut self);
}

/// What a mutation did, reported out of the updater closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied(EventKind),
    /// No matching date column; the write was skipped (or reduced to
    /// removing a stale copy).
    ColumnMiss { removed_stale: bool },
    Refetch,
}

pub struct MutationEngine<M> {
    mutator: M,
    config: EngineConfig,
    events: Option<EventSink>,
}

impl<M: Mutator> MutationEngine<M> {
    pub fn new(mutator: M, config: EngineConfig) -> Self {
        Self {
            mutator,
            config,
            events: None,
        }
    }

    /// Attach a sink for structured events.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = Some(events);
        self
    }

    pub fn mutator_mut(&mut self) -> &mut M {
        &mut self.mutator
    }

    /// Insert a newly-created task into a category-based cache.
    ///
    /// Subtasks never get a top-level add; they only arrive via
    /// [`Self::category_update`] on their parent, so a subtask here
    /// delegates to a full refetch.
    pub fn category_add(&mut self, task: Task) {
        self.run(task, |cache, task| match cache {
            CollectionCache::Category(category) => category_add(category, task),
            CollectionCache::Time(_) => Ok(Outcome::Refetch),
        });
    }

    /// Apply an edit to a task in a category-based cache.
    pub fn category_update(&mut self, task: Task) {
        self.run(task, |cache, task| match cache {
            CollectionCache::Category(category) => category_update(category, task),
            CollectionCache::Time(_) => Ok(Outcome::Refetch),
        });
    }

    /// Insert a newly-created task into a time-based cache.
    ///
    /// Recurring series are never optimistically inserted: their occurrence
    /// placement cannot be derived client-side, so the engine refetches.
    pub fn time_add(&mut self, task: Task) {
        self.run(task, |cache, task| match cache {
            CollectionCache::Time(time) => time_add(time, task),
            CollectionCache::Category(_) => Ok(Outcome::Refetch),
        });
    }

    /// Apply an edit to a task in a time-based cache.
    pub fn time_update(&mut self, task: Task) {
        self.run(task, |cache, task| match cache {
            CollectionCache::Time(time) => time_update(time, task),
            CollectionCache::Category(_) => Ok(Outcome::Refetch),
        });
    }

    fn run<F>(&mut self, task: Task, op: F)
    where
        F: FnOnce(&mut CollectionCache, Task) -> Result<Outcome> + 'static,
    {
        let task_id = task.id.clone();
        let outcome = Rc::new(Cell::new(Outcome::Refetch));
        let report = Rc::clone(&outcome);
        let closure_task_id = task_id.clone();

        self.mutator.apply(Box::new(move |cache| {
            let snapshot = cache.clone();
            let mut next = cache;
            match op(&mut next, task) {
                Ok(result) => {
                    report.set(result);
                    match result {
                        Outcome::Refetch => snapshot,
                        _ => next,
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        task_id = %closure_task_id,
                        %error,
                        "optimistic update failed, falling back to refetch"
                    );
                    report.set(Outcome::Refetch);
                    snapshot
                }
            }
        }));

        match outcome.get() {
            Outcome::Applied(kind) => self.emit(kind, &task_id),
            Outcome::ColumnMiss { removed_stale } => {
                if removed_stale {
                    self.emit(EventKind::TaskRemoved, &task_id);
                }
                self.emit(EventKind::ColumnMiss, &task_id);
                if self.config.refetch_on_column_miss {
                    self.mutator.refetch();
                    self.emit(EventKind::RefetchScheduled, &task_id);
                }
            }
            Outcome::Refetch => {
                self.mutator.refetch();
                self.emit(EventKind::RefetchScheduled, &task_id);
            }
        }
    }

    fn emit(&mut self, kind: EventKind, task_id: &str) {
        if let Some(sink) = self.events.as_mut() {
            if let Err(error) = sink.emit(&Event::new(kind, Some(task_id.to_string()))) {
                tracing::debug!(%error, "event emission failed");
            }
        }
    }
}

fn category_add(cache: &mut CategoryCache, task: Task) -> Result<Outcome> {
    if task.is_subtask() {
        tracing::debug!(task_id = %task.id, "subtask add delegated to refetch");
        return Ok(Outcome::Refetch);
    }
    let slot = cache.slot_for_label(task.label.as_deref());
    cache.insert(slot, task);
    Ok(Outcome::Applied(EventKind::TaskInserted))
}

fn category_update(cache: &mut CategoryCache, task: Task) -> Result<Outcome> {
    match task.parent_task_id.clone() {
        Some(parent_id) => {
            let slot = category_parent_slot(cache, &task, &parent_id)?;
            cache.nest_subtask(slot, &parent_id, task)?;
            Ok(Outcome::Applied(EventKind::SubtaskNested))
        }
        None => {
            let slot = cache.slot_for_label(task.label.as_deref());
            cache.upsert(slot, task);
            Ok(Outcome::Applied(EventKind::TaskUpdated))
        }
    }
}

/// The partition holding a subtask's parent: the incoming task's explicit
/// label when the parent actually lives there, otherwise wherever the
/// parent is currently found.
fn category_parent_slot(
    cache: &CategoryCache,
    task: &Task,
    parent_id: &str,
) -> Result<CategorySlot> {
    if let Some(label_id) = task.label.as_deref() {
        let slot = cache.slot_for_label(Some(label_id));
        if cache.get(slot, parent_id).is_some() {
            return Ok(slot);
        }
    }
    cache
        .locate(parent_id)
        .ok_or_else(|| Error::ParentNotFound(parent_id.to_string()))
}

fn time_add(cache: &mut TimeCache, task: Task) -> Result<Outcome> {
    if task.is_recurring() {
        tracing::debug!(task_id = %task.id, "recurring add delegated to refetch");
        return Ok(Outcome::Refetch);
    }
    let Some(anchor) = time_anchor(cache, &task)? else {
        tracing::warn!(task_id = %task.id, "no start instant, skipping optimistic insert");
        return Ok(Outcome::ColumnMiss { removed_stale: false });
    };
    let Some(column) = cache.column_for(anchor) else {
        tracing::warn!(
            task_id = %task.id,
            start = %anchor,
            "no column matches start, skipping optimistic insert"
        );
        return Ok(Outcome::ColumnMiss { removed_stale: false });
    };
    match task.parent_task_id.clone() {
        Some(parent_id) => {
            cache.nest_subtask(column, &parent_id, task)?;
            Ok(Outcome::Applied(EventKind::SubtaskNested))
        }
        None => {
            cache.insert(column, task);
            Ok(Outcome::Applied(EventKind::TaskInserted))
        }
    }
}

fn time_update(cache: &mut TimeCache, task: Task) -> Result<Outcome> {
    if task.is_recurring() {
        tracing::debug!(task_id = %task.id, "recurring update delegated to refetch");
        return Ok(Outcome::Refetch);
    }
    if let Some(parent_id) = task.parent_task_id.clone() {
        let Some(anchor) = time_anchor(cache, &task)? else {
            tracing::warn!(task_id = %task.id, "parent has no start, skipping subtask write");
            return Ok(Outcome::ColumnMiss { removed_stale: false });
        };
        let Some(column) = cache.column_for(anchor) else {
            tracing::warn!(task_id = %task.id, start = %anchor, "no column for parent start");
            return Ok(Outcome::ColumnMiss { removed_stale: false });
        };
        cache.nest_subtask(column, &parent_id, task)?;
        return Ok(Outcome::Applied(EventKind::SubtaskNested));
    }

    let column = match task.start {
        Some(start) => cache.column_for(start),
        None => None,
    };
    match column {
        Some(column) => {
            cache.upsert(column, task);
            Ok(Outcome::Applied(EventKind::TaskUpdated))
        }
        None => {
            // Edited out of the visible window: drop the stale copy and let
            // the next fetch place it.
            let removed = cache.remove_everywhere(&task.id).is_some();
            tracing::warn!(
                task_id = %task.id,
                removed_stale = removed,
                "no column matches edited start"
            );
            Ok(Outcome::ColumnMiss {
                removed_stale: removed,
            })
        }
    }
}

/// The instant a task is bucketed by: its own start, or the parent's start
/// for subtasks (subtasks colocate with their parent's column).
fn time_anchor(cache: &TimeCache, task: &Task) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    match task.parent_task_id.as_deref() {
        Some(parent_id) => {
            let parent = cache
                .find_task(parent_id)
                .ok_or_else(|| Error::ParentNotFound(parent_id.to_string()))?;
            Ok(parent.start)
        }
        None => Ok(task.start),
    }
}
