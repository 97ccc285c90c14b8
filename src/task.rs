//! Task data model.
//!
//! These are the wire shapes the transport layer hands to the cache: the
//! server serializes camelCase JSON, so the serde derives rename
//! accordingly. The cache stores tasks as-is and never invents fields.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recurrence::RecurrenceRule;

/// A single completion record.
///
/// For recurring tasks `iteration` identifies which occurrence was
/// completed; for non-recurring tasks the record's mere presence means
/// "done" and `iteration` is absent. Offset timestamps normalize to UTC on
/// deserialization, so two spellings of the same instant compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionInstance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<DateTime<Utc>>,
}

impl CompletionInstance {
    pub fn for_iteration(iteration: DateTime<Utc>) -> Self {
        Self {
            iteration: Some(iteration),
        }
    }
}

/// The central entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Owning task id; when present this task is a subtask and lives in
    /// the parent's `subtasks` map, never as a sibling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,

    /// Buckets the task into a date column; also the recurrence anchor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,

    /// When present the task is a series, not a single occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_rule: Option<RecurrenceRule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub completion_instances: Vec<CompletionInstance>,

    /// Label id; labeled tasks live in that label's partition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Soft-delete flag. Trashed tasks stay in the cache until a refetch.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub trash: bool,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub subtasks: HashMap<String, Task>,
}

impl Task {
    /// Build a minimal task with just an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            parent_task_id: None,
            start: None,
            recurrence_rule: None,
            completion_instances: Vec::new(),
            label: None,
            trash: false,
            subtasks: HashMap::new(),
        }
    }

    pub fn is_subtask(&self) -> bool {
        self.parent_task_id.is_some()
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence_rule.is_some()
    }
}

/// Grouping entity owning its own task partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub entities: HashMap<String, Task>,
}

impl Label {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            entities: HashMap::new(),
        }
    }
}
