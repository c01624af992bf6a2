//! Slot configuration
//!
//! Everything that changes how a slot saves and loads: threading, record
//! type, class scopes, redirectors, respawn toggles and file settings.
//! Configs are plain serde structs and can be loaded from JSON.

use super::slot_data::MetaDefaults;
use super::types::{RecordType, SaveError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where an operation's walk runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RuntimeMode {
    /// On the calling thread, blocking until finished
    #[default]
    Synchronous,
    /// On a background worker; mutations are queued for the main thread
    Asynchronous,
}

/// On-disk encoding of slot files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlotFormat {
    /// MessagePack
    #[default]
    Binary,
    /// Pretty-printed JSON, for debugging
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    /// File name (without extension) of the slot
    pub slot_file_name: String,
    /// Directory slot files live in; `None` uses `default_save_dir()`
    pub save_directory: Option<PathBuf>,
    pub format: SlotFormat,

    pub save_mode: RuntimeMode,
    pub load_mode: RuntimeMode,
    pub compression: RecordType,

    /// Class paths (or names) whose instances are persisted
    pub object_scope: Vec<String>,
    pub actor_scope: Vec<String>,
    pub component_scope: Vec<String>,

    /// Class path (or name) to a table of old field name -> new field name
    pub redirectors: BTreeMap<String, BTreeMap<String, String>>,

    pub respawn_dynamic_actors: bool,
    pub respawn_dynamic_components: bool,
    /// When non-empty, only instances of these classes may be respawned
    pub respawn_scope: Vec<String>,

    pub pause_game_on_load: bool,
    pub write_meta_on_save: bool,
    pub ignore_pawn_transform_on_load: bool,

    /// Info-level summaries of each operation
    pub debug: bool,
    /// Trace output for every encoded and decoded field
    pub deep_logs: bool,

    pub meta_defaults: MetaDefaults,
}

impl Default for SlotConfig {
    fn default() -> Self {
        SlotConfig {
            slot_file_name: "slot_1".to_string(),
            save_directory: None,
            format: SlotFormat::Binary,
            save_mode: RuntimeMode::Synchronous,
            load_mode: RuntimeMode::Synchronous,
            compression: RecordType::Complex,
            object_scope: Vec::new(),
            actor_scope: vec!["/Script/Engine.Actor".to_string()],
            component_scope: vec!["/Script/Engine.Component".to_string()],
            redirectors: BTreeMap::new(),
            respawn_dynamic_actors: true,
            respawn_dynamic_components: true,
            respawn_scope: Vec::new(),
            pause_game_on_load: false,
            write_meta_on_save: true,
            ignore_pawn_transform_on_load: false,
            debug: false,
            deep_logs: false,
            meta_defaults: MetaDefaults::default(),
        }
    }
}

impl SlotConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SaveError> {
        let content = std::fs::read_to_string(path)?;
        let config: SlotConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), SaveError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Effective save directory
    pub fn directory(&self) -> PathBuf {
        self.save_directory.clone().unwrap_or_else(default_save_dir)
    }

    /// Adds a field rename for a class
    pub fn redirect(
        mut self,
        class: impl Into<String>,
        old_name: impl Into<String>,
        new_name: impl Into<String>,
    ) -> Self {
        self.redirectors
            .entry(class.into())
            .or_default()
            .insert(old_name.into(), new_name.into());
        self
    }
}

/// `~/.keepsake/saves`, or `./saves` when there is no home directory
pub fn default_save_dir() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".keepsake/saves"))
        .unwrap_or_else(|| PathBuf::from("./saves"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "slot_file_name": "quick", "load_mode": "Asynchronous" }"#;
        let config: SlotConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.slot_file_name, "quick");
        assert_eq!(config.load_mode, RuntimeMode::Asynchronous);
        assert_eq!(config.save_mode, RuntimeMode::Synchronous);
        assert_eq!(config.actor_scope, vec!["/Script/Engine.Actor".to_string()]);
        assert!(config.respawn_dynamic_actors);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slot.json");
        let config = SlotConfig {
            debug: true,
            ..Default::default()
        }
        .redirect("Door", "Hp", "Health");
        config.save_to_file(&path).unwrap();

        let loaded = SlotConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.redirectors["Door"]["Hp"], "Health");
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let result = SlotConfig::load_from_file("/nonexistent/keepsake.json");
        assert!(matches!(result, Err(SaveError::Io(_))));
    }
}
