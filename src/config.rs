//! Configuration loading and management
//!
//! Hosts embed the engine with a `SyncConfig`, typically parsed from a
//! TOML fragment of their own config file. Every knob has a default that
//! preserves the engine's conservative observable behavior.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::events::EventDestination;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Engine behavior knobs
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-task mutation queue
    #[serde(default)]
    pub queue: QueueConfig,

    /// Event emission
    #[serde(default)]
    pub events: EventsConfig,
}

impl SyncConfig {
    /// Parse a config from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

/// Mutation engine knobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Escalate a time-based write with no matching column to a full
    /// refetch instead of skipping it. Off by default: a task edited out
    /// of the visible window reappears on the next fetch anyway.
    #[serde(default)]
    pub refetch_on_column_miss: bool,
}

/// Per-task queue knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Serialize mutations per task id so a stale response can never
    /// overwrite a later optimistic write.
    #[serde(default = "default_serialize_per_task")]
    pub serialize_per_task: bool,
}

fn default_serialize_per_task() -> bool {
    true
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            serialize_per_task: default_serialize_per_task(),
        }
    }
}

/// Event emission knobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Where to emit JSONL events: `-` for stdout, otherwise a file path.
    /// Unset disables emission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl EventsConfig {
    pub fn destination(&self) -> Option<EventDestination> {
        EventDestination::parse(self.destination.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let config = SyncConfig::default();
        assert!(!config.engine.refetch_on_column_miss);
        assert!(config.queue.serialize_per_task);
        assert!(config.events.destination().is_none());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config = SyncConfig::from_toml(
            r#"
            [engine]
            refetch_on_column_miss = true
            "#,
        )
        .expect("config");
        assert!(config.engine.refetch_on_column_miss);
        assert!(config.queue.serialize_per_task);
    }

    #[test]
    fn event_destination_parses() {
        let config = SyncConfig::from_toml(
            r#"
            [events]
            destination = "-"
            "#,
        )
        .expect("config");
        assert!(matches!(
            config.events.destination(),
            Some(EventDestination::Stdout)
        ));
    }
}
