//! tasksync - Optimistic Task Cache Library
//!
//! This library provides the client-side core of a personal productivity
//! client: optimistic cache mutation, recurrence evaluation, and
//! occurrence-completion resolution. Rendering, navigation, and transport
//! stay outside, behind the `Mutator` and `TaskTransport` traits.
//!
//! # Core Concepts
//!
//! - **Cache shapes**: a tagged union of category-based (flat map plus
//!   label partitions) and time-based (date-range columns) collections
//! - **Optimistic mutation**: add/update applied synchronously to the
//!   cache, with a full refetch as the universal fallback
//! - **Recurrence**: RRULE-lite evaluation anchored on a task's start
//! - **Completion**: per-occurrence completion records for series, plain
//!   presence for one-off tasks
//!
//! # Module Organization
//!
//! - `cache`: cache shapes and the adapter locating tasks inside them
//! - `completion`: occurrence completion resolution
//! - `config`: configuration loading from TOML
//! - `engine`: the optimistic mutation engine
//! - `error`: error types and result aliases
//! - `events`: JSONL event emission for host integrations
//! - `queue`: per-task-id mutation serialization
//! - `recurrence`: recurrence rule evaluation
//! - `sync`: the remote sync boundary
//! - `task`: the task/label data model

pub mod cache;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod queue;
pub mod recurrence;
pub mod sync;
pub mod task;

pub use error::{Error, Result};
