//! Slot data, slot meta and the on-disk slot file container

use super::record::{ComplexRecord, MinimalRecord};
use super::types::CURRENT_SLOT_VERSION;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All records a slot holds, keyed by entity identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotData {
    pub minimal: BTreeMap<String, MinimalRecord>,
    pub complex: BTreeMap<String, ComplexRecord>,
}

impl SlotData {
    pub fn clear(&mut self) {
        self.minimal.clear();
        self.complex.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.minimal.is_empty() && self.complex.is_empty()
    }

    pub fn len(&self) -> usize {
        self.minimal.len() + self.complex.len()
    }
}

/// Values a fresh `SlotMeta` starts with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaDefaults {
    pub player_name: String,
    pub player_level: i32,
    pub chapter: String,
    pub location: String,
}

impl Default for MetaDefaults {
    fn default() -> Self {
        MetaDefaults {
            player_name: "Player One".to_string(),
            player_level: 1,
            chapter: "Chapter 1".to_string(),
            location: "Unknown".to_string(),
        }
    }
}

/// Descriptive data shown on a load screen; independent of the records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotMeta {
    pub player_level: i32,
    pub player_name: String,
    pub save_location: String,
    pub chapter: String,
    pub save_date: DateTime<Utc>,
    pub progress: f32,
    /// Seconds
    pub play_time: i32,
}

impl SlotMeta {
    pub fn from_defaults(defaults: &MetaDefaults) -> Self {
        SlotMeta {
            player_level: defaults.player_level,
            player_name: defaults.player_name.clone(),
            save_location: defaults.location.clone(),
            chapter: defaults.chapter.clone(),
            save_date: Utc::now(),
            progress: 0.0,
            play_time: 0,
        }
    }

    /// Stamps the save date with the current time
    pub fn touch(&mut self) {
        self.save_date = Utc::now();
    }

    /// `YYYY-MM-DD`
    pub fn save_date_iso(&self) -> String {
        self.save_date.format("%Y-%m-%d").to_string()
    }

    /// `HH:MM:SS`
    pub fn save_time_iso(&self) -> String {
        self.save_date.format("%H:%M:%S").to_string()
    }

    /// Play time as `H:MM:SS`
    pub fn play_time_display(&self) -> String {
        let seconds = self.play_time.max(0);
        format!("{}:{:02}:{:02}", seconds / 3600, (seconds / 60) % 60, seconds % 60)
    }
}

impl Default for SlotMeta {
    fn default() -> Self {
        SlotMeta::from_defaults(&MetaDefaults::default())
    }
}

/// The root structure written to a slot file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotFile {
    pub version: u32,
    pub meta: SlotMeta,
    pub data: SlotData,
}

impl SlotFile {
    pub fn new(meta: SlotMeta, data: SlotData) -> Self {
        SlotFile {
            version: CURRENT_SLOT_VERSION,
            meta,
            data,
        }
    }
}

/// Meta-only companion file, cheap to read for slot listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub meta: SlotMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_meta_uses_defaults() {
        let defaults = MetaDefaults {
            player_name: "Ada".to_string(),
            player_level: 7,
            ..Default::default()
        };
        let meta = SlotMeta::from_defaults(&defaults);
        assert_eq!(meta.player_name, "Ada");
        assert_eq!(meta.player_level, 7);
        assert_eq!(meta.progress, 0.0);
    }

    #[test]
    fn test_date_and_play_time_formatting() {
        let mut meta = SlotMeta::default();
        meta.save_date = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        meta.play_time = 3725;
        assert_eq!(meta.save_date_iso(), "2024-03-09");
        assert_eq!(meta.save_time_iso(), "14:05:07");
        assert_eq!(meta.play_time_display(), "1:02:05");
    }

    #[test]
    fn test_slot_data_len_counts_both_maps() {
        let mut data = SlotData::default();
        data.minimal.insert("a".to_string(), MinimalRecord::default());
        data.complex.insert("b".to_string(), ComplexRecord::default());
        assert_eq!(data.len(), 2);
        data.clear();
        assert!(data.is_empty());
    }
}
