//! Completion status resolution.
//!
//! Answers "is this specific task occurrence done?" for both recurring and
//! non-recurring tasks. Recurring tasks record one completion instance per
//! completed occurrence, keyed by the occurrence's iteration instant;
//! non-recurring tasks are done as soon as any completion record exists.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::recurrence::occurs_on;
use crate::task::Task;

/// Whether `task` counts as completed for the given occurrence.
///
/// For a recurring task the iteration must be supplied and match a recorded
/// completion instant exactly; instants are already UTC-normalized, so
/// timezone spelling differences cannot cause false negatives. A missing
/// iteration on a recurring task means "cannot determine" and resolves to
/// false rather than an error.
pub fn is_completed(task: &Task, occurrence_iteration: Option<DateTime<Utc>>) -> bool {
    if task.recurrence_rule.is_none() {
        return !task.completion_instances.is_empty();
    }
    let Some(iteration) = occurrence_iteration else {
        return false;
    };
    task.completion_instances
        .iter()
        .any(|instance| instance.iteration == Some(iteration))
}

/// Whether the task has an occurrence at `instant` at all.
///
/// Non-recurring tasks have exactly one occurrence, their own `start` (or
/// none, for undated tasks). Recurring tasks defer to the rule, anchored
/// on the task's `start`; a recurring task without a start has no
/// derivable occurrences.
pub fn occurrence_exists(task: &Task, instant: DateTime<Utc>) -> Result<bool> {
    match (&task.recurrence_rule, task.start) {
        (Some(rule), Some(anchor)) => occurs_on(rule, anchor, instant),
        (Some(_), None) => Ok(false),
        (None, Some(start)) => Ok(start.date_naive() == instant.date_naive()),
        (None, None) => Ok(false),
    }
}
