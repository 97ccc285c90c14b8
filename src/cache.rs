//! Collection cache shapes and the adapter that locates tasks in them.
//!
//! A task can live in one of two root shapes, chosen by the surrounding
//! view: a category cache (flat entity map plus label partitions) or a time
//! cache (an array of date-range columns, each with its own entity map).
//! The shapes form a tagged union so dispatch is exhaustive instead of
//! duck-typed.
//!
//! Invariants maintained by the write paths here:
//! - category: a task id appears in exactly one of the top-level map and
//!   the label partitions;
//! - time: a non-subtask task appears in exactly one column, the one whose
//!   inclusive range contains its start;
//! - subtasks nest under `parent.subtasks` and never displace siblings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::{Label, Task};

/// Root cache shape handed over by the view layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum CollectionCache {
    Category(CategoryCache),
    Time(TimeCache),
}

/// Where a task lives inside a category cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySlot {
    TopLevel,
    /// Index into `CategoryCache::labels`.
    Label(usize),
}

/// Flat entity map plus label partitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryCache {
    #[serde(default)]
    pub entities: HashMap<String, Task>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl CategoryCache {
    /// Find the partition currently holding `id`.
    ///
    /// Search order is the top-level map first, then label partitions in
    /// array order. Not found is an insert candidate, never an error.
    pub fn locate(&self, id: &str) -> Option<CategorySlot> {
        if self.entities.contains_key(id) {
            return Some(CategorySlot::TopLevel);
        }
        self.labels
            .iter()
            .position(|label| label.entities.contains_key(id))
            .map(CategorySlot::Label)
    }

    pub fn label_index(&self, label_id: &str) -> Option<usize> {
        self.labels.iter().position(|label| label.id == label_id)
    }

    /// The partition a task with this label id belongs in. Unknown label
    /// ids fall back to the top-level map; partitions are never created
    /// here.
    pub fn slot_for_label(&self, label_id: Option<&str>) -> CategorySlot {
        label_id
            .and_then(|id| self.label_index(id))
            .map_or(CategorySlot::TopLevel, CategorySlot::Label)
    }

    fn partition_mut(&mut self, slot: CategorySlot) -> &mut HashMap<String, Task> {
        match slot {
            CategorySlot::TopLevel => &mut self.entities,
            CategorySlot::Label(index) => &mut self.labels[index].entities,
        }
    }

    pub fn get(&self, slot: CategorySlot, id: &str) -> Option<&Task> {
        match slot {
            CategorySlot::TopLevel => self.entities.get(id),
            CategorySlot::Label(index) => self.labels[index].entities.get(id),
        }
    }

    /// Drop `id` from every partition. Used before re-inserting so a moved
    /// task never appears twice.
    pub fn remove_everywhere(&mut self, id: &str) -> Option<Task> {
        let mut removed = self.entities.remove(id);
        for label in &mut self.labels {
            if let Some(task) = label.entities.remove(id) {
                removed = removed.or(Some(task));
            }
        }
        removed
    }

    /// Insert `task` into `slot`, evicting any copy held elsewhere.
    pub fn insert(&mut self, slot: CategorySlot, task: Task) {
        self.remove_everywhere(&task.id);
        self.partition_mut(slot).insert(task.id.clone(), task);
    }

    /// Merge an existing task in place, keeping fields the incoming object
    /// does not carry (notably `subtasks`). A task moving to another
    /// partition carries its subtasks along.
    pub fn upsert(&mut self, slot: CategorySlot, task: Task) {
        let evicted = self.remove_everywhere(&task.id);
        let merged = merge_preserving_subtasks(evicted, task);
        self.partition_mut(slot).insert(merged.id.clone(), merged);
    }

    /// Nest a subtask under its parent inside `slot`, preserving siblings.
    pub fn nest_subtask(&mut self, slot: CategorySlot, parent_id: &str, task: Task) -> Result<()> {
        let parent = self
            .partition_mut(slot)
            .get_mut(parent_id)
            .ok_or_else(|| Error::ParentNotFound(parent_id.to_string()))?;
        parent.subtasks.insert(task.id.clone(), task);
        Ok(())
    }
}

/// A half-open view window bucketed into date ranges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeCache {
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// One date bucket. `start..=end` is inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub entities: HashMap<String, Task>,
}

impl Column {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            entities: HashMap::new(),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

impl TimeCache {
    /// Index of the column whose range contains `instant`.
    pub fn column_for(&self, instant: DateTime<Utc>) -> Option<usize> {
        self.columns.iter().position(|column| column.contains(instant))
    }

    /// Index of the column currently holding `id` as a top-level entity.
    pub fn locate(&self, id: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.entities.contains_key(id))
    }

    /// Look a task up across all columns, subtasks included.
    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.columns.iter().find_map(|column| {
            column.entities.get(id).or_else(|| {
                column
                    .entities
                    .values()
                    .find_map(|task| task.subtasks.get(id))
            })
        })
    }

    /// Drop `id` from every column's top-level map.
    pub fn remove_everywhere(&mut self, id: &str) -> Option<Task> {
        let mut removed = None;
        for column in &mut self.columns {
            if let Some(task) = column.entities.remove(id) {
                removed = removed.or(Some(task));
            }
        }
        removed
    }

    /// Insert `task` into the column at `index`, evicting any copy held in
    /// another column.
    pub fn insert(&mut self, index: usize, task: Task) {
        self.remove_everywhere(&task.id);
        self.columns[index].entities.insert(task.id.clone(), task);
    }

    /// Merge an existing task in place within its column, keeping fields
    /// the incoming object does not carry. A task moving to another column
    /// carries its subtasks along.
    pub fn upsert(&mut self, index: usize, task: Task) {
        let evicted = self.remove_everywhere(&task.id);
        let merged = merge_preserving_subtasks(evicted, task);
        self.columns[index]
            .entities
            .insert(merged.id.clone(), merged);
    }

    /// Nest a subtask under its parent in the column at `index`.
    pub fn nest_subtask(&mut self, index: usize, parent_id: &str, task: Task) -> Result<()> {
        let parent = self.columns[index]
            .entities
            .get_mut(parent_id)
            .ok_or_else(|| Error::ParentNotFound(parent_id.to_string()))?;
        parent.subtasks.insert(task.id.clone(), task);
        Ok(())
    }
}

/// Keep the previous copy's subtasks when the incoming edit carries none.
fn merge_preserving_subtasks(existing: Option<Task>, mut incoming: Task) -> Task {
    if incoming.subtasks.is_empty() {
        if let Some(existing) = existing {
            incoming.subtasks = existing.subtasks;
        }
    }
    incoming
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().expect("timestamp")
    }

    fn labeled_cache() -> CategoryCache {
        CategoryCache {
            entities: HashMap::new(),
            labels: vec![Label::new("work"), Label::new("home")],
        }
    }

    #[test]
    fn locate_prefers_top_level_then_label_order() {
        let mut cache = labeled_cache();
        cache.labels[1].entities.insert("t1".into(), Task::new("t1"));
        assert_eq!(cache.locate("t1"), Some(CategorySlot::Label(1)));

        cache.entities.insert("t1".into(), Task::new("t1"));
        assert_eq!(cache.locate("t1"), Some(CategorySlot::TopLevel));
        assert_eq!(cache.locate("missing"), None);
    }

    #[test]
    fn insert_evicts_copies_in_other_partitions() {
        let mut cache = labeled_cache();
        cache.insert(CategorySlot::TopLevel, Task::new("t1"));
        cache.insert(CategorySlot::Label(0), Task::new("t1"));

        assert!(!cache.entities.contains_key("t1"));
        assert!(cache.labels[0].entities.contains_key("t1"));
        assert!(!cache.labels[1].entities.contains_key("t1"));
    }

    #[test]
    fn unknown_label_falls_back_to_top_level() {
        let cache = labeled_cache();
        assert_eq!(cache.slot_for_label(Some("work")), CategorySlot::Label(0));
        assert_eq!(cache.slot_for_label(Some("nope")), CategorySlot::TopLevel);
        assert_eq!(cache.slot_for_label(None), CategorySlot::TopLevel);
    }

    #[test]
    fn nest_subtask_preserves_siblings() {
        let mut cache = labeled_cache();
        let mut parent = Task::new("p1");
        parent.subtasks.insert("s1".into(), Task::new("s1"));
        cache.insert(CategorySlot::TopLevel, parent);

        cache
            .nest_subtask(CategorySlot::TopLevel, "p1", Task::new("s2"))
            .expect("nest");

        let parent = cache.entities.get("p1").expect("parent");
        assert!(parent.subtasks.contains_key("s1"));
        assert!(parent.subtasks.contains_key("s2"));
    }

    #[test]
    fn nest_subtask_missing_parent_errors() {
        let mut cache = labeled_cache();
        let err = cache
            .nest_subtask(CategorySlot::TopLevel, "ghost", Task::new("s1"))
            .unwrap_err();
        assert!(matches!(err, Error::ParentNotFound(_)));
    }

    #[test]
    fn upsert_keeps_existing_subtasks_on_edit() {
        let mut cache = labeled_cache();
        let mut parent = Task::new("p1");
        parent.subtasks.insert("s1".into(), Task::new("s1"));
        cache.insert(CategorySlot::TopLevel, parent);

        let mut edit = Task::new("p1");
        edit.name = Some("renamed".into());
        cache.upsert(CategorySlot::TopLevel, edit);

        let parent = cache.entities.get("p1").expect("parent");
        assert_eq!(parent.name.as_deref(), Some("renamed"));
        assert!(parent.subtasks.contains_key("s1"));
    }

    #[test]
    fn upsert_moving_partitions_carries_subtasks_along() {
        let mut cache = labeled_cache();
        let mut parent = Task::new("p1");
        parent.subtasks.insert("s1".into(), Task::new("s1"));
        cache.insert(CategorySlot::Label(0), parent);

        let mut edit = Task::new("p1");
        edit.label = Some("home".into());
        cache.upsert(CategorySlot::Label(1), edit);

        assert!(!cache.labels[0].entities.contains_key("p1"));
        let parent = cache.labels[1].entities.get("p1").expect("parent");
        assert!(parent.subtasks.contains_key("s1"));
    }

    #[test]
    fn column_ranges_are_inclusive() {
        let cache = TimeCache {
            columns: vec![
                Column::new(utc("2024-01-01T00:00:00Z"), utc("2024-01-07T23:59:59Z")),
                Column::new(utc("2024-01-08T00:00:00Z"), utc("2024-01-14T23:59:59Z")),
            ],
        };
        assert_eq!(cache.column_for(utc("2024-01-07T23:59:59Z")), Some(0));
        assert_eq!(cache.column_for(utc("2024-01-08T00:00:00Z")), Some(1));
        assert_eq!(cache.column_for(utc("2024-01-20T00:00:00Z")), None);
    }

    #[test]
    fn time_insert_moves_task_between_columns() {
        let mut cache = TimeCache {
            columns: vec![
                Column::new(utc("2024-01-01T00:00:00Z"), utc("2024-01-07T23:59:59Z")),
                Column::new(utc("2024-01-08T00:00:00Z"), utc("2024-01-14T23:59:59Z")),
            ],
        };
        cache.insert(0, Task::new("t1"));
        cache.insert(1, Task::new("t1"));

        assert!(!cache.columns[0].entities.contains_key("t1"));
        assert!(cache.columns[1].entities.contains_key("t1"));
    }

    #[test]
    fn tagged_union_round_trips() {
        let cache = CollectionCache::Category(CategoryCache::default());
        let json = serde_json::to_value(&cache).expect("serialize");
        assert_eq!(json["shape"], "category");

        let back: CollectionCache = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, cache);
    }
}
