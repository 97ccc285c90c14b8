//! Remote sync boundary.
//!
//! The thin seam between the engine and the host's network stack. A
//! submitted mutation is applied optimistically first, then handed to the
//! transport fire-and-forget; the host reports resolution back through
//! [`SyncBoundary::complete`]. Only failures feed back into the cache, as
//! an unconditional refetch. No retries happen here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::engine::{MutationEngine, Mutator};
use crate::error::Result;
use crate::events::{Event, EventKind, EventSink};
use crate::queue::{Admission, MutationQueue};
use crate::task::Task;

/// Opaque collection identifier plus the query parameters the network
/// layer resolves into a cache shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchKey {
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl FetchKey {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            range: None,
        }
    }

    pub fn with_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.range = Some((start, end));
        self
    }
}

/// Which cache shape the surrounding view holds. The boundary is handed
/// whichever shape the caller already has; it does not pick one itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Category,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Add,
    Update,
}

/// A mutation handed to the transport.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub key: FetchKey,
    pub kind: MutationKind,
    pub task: Task,
}

/// External collaborator: dispatches a request into the host's network
/// stack and returns once it is on the wire. Resolution arrives later via
/// [`SyncBoundary::complete`].
pub trait TaskTransport {
    fn dispatch(&mut self, request: SyncRequest) -> Result<()>;
}

struct PendingMutation {
    kind: MutationKind,
    task: Task,
}

pub struct SyncBoundary<T, M> {
    engine: MutationEngine<M>,
    transport: T,
    key: FetchKey,
    shape: ShapeKind,
    queue: Option<MutationQueue<PendingMutation>>,
    events: Option<EventSink>,
}

impl<T: TaskTransport, M: Mutator> SyncBoundary<T, M> {
    pub fn new(
        engine: MutationEngine<M>,
        transport: T,
        key: FetchKey,
        shape: ShapeKind,
        config: &SyncConfig,
    ) -> Self {
        let queue = config
            .queue
            .serialize_per_task
            .then(MutationQueue::new);
        Self {
            engine,
            transport,
            key,
            shape,
            queue,
            events: None,
        }
    }

    /// Attach a sink for structured events.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = Some(events);
        self
    }

    /// Apply a mutation optimistically and send it to the server.
    ///
    /// The cache write happens unconditionally and immediately; the network
    /// send is serialized per task id when the queue is enabled.
    pub fn submit(&mut self, kind: MutationKind, task: Task) {
        self.apply_optimistic(kind, task.clone());

        let pending = PendingMutation {
            kind,
            task: task.clone(),
        };
        match self.queue.as_mut() {
            Some(queue) => match queue.admit(&task.id, pending) {
                Admission::Dispatch(pending) => self.dispatch(pending),
                Admission::Queued => {
                    tracing::debug!(task_id = %task.id, "send queued behind in-flight mutation");
                }
            },
            None => self.dispatch(pending),
        }
    }

    /// Report resolution of an in-flight send for `task_id`.
    ///
    /// On success the next queued mutation for the id, if any, goes out.
    /// On failure pending sends for the id are dropped and a corrective
    /// refetch is scheduled.
    pub fn complete(&mut self, task_id: &str, result: Result<()>) {
        match result {
            Ok(()) => {
                if let Some(next) = self.queue.as_mut().and_then(|queue| queue.resolve(task_id)) {
                    self.dispatch(next);
                }
            }
            Err(error) => {
                tracing::warn!(task_id, %error, "sync failed, scheduling refetch");
                if let Some(queue) = self.queue.as_mut() {
                    queue.clear(task_id);
                }
                self.emit(EventKind::SyncFailed, task_id);
                self.revalidate();
            }
        }
    }

    /// Trigger an unconditional refetch of the collection.
    pub fn revalidate(&mut self) {
        self.engine.mutator_mut().refetch();
    }

    pub fn fetch_key(&self) -> &FetchKey {
        &self.key
    }

    fn apply_optimistic(&mut self, kind: MutationKind, task: Task) {
        match (self.shape, kind) {
            (ShapeKind::Category, MutationKind::Add) => self.engine.category_add(task),
            (ShapeKind::Category, MutationKind::Update) => self.engine.category_update(task),
            (ShapeKind::Time, MutationKind::Add) => self.engine.time_add(task),
            (ShapeKind::Time, MutationKind::Update) => self.engine.time_update(task),
        }
    }

    fn dispatch(&mut self, pending: PendingMutation) {
        let task_id = pending.task.id.clone();
        let request = SyncRequest {
            key: self.key.clone(),
            kind: pending.kind,
            task: pending.task,
        };
        if let Err(error) = self.transport.dispatch(request) {
            tracing::warn!(task_id = %task_id, %error, "dispatch failed, scheduling refetch");
            if let Some(queue) = self.queue.as_mut() {
                queue.clear(&task_id);
            }
            self.emit(EventKind::SyncFailed, &task_id);
            self.revalidate();
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
