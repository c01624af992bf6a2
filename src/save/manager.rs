//! Slot storage for reading and writing slot files
//!
//! This module provides the SlotStorage struct which handles:
//! - Writing and reading slot files (`<slot>.sav`)
//! - Meta-only companion files (`<slot>.meta.sav`)
//! - Slot management (exists, delete, listing, JSON export)

use super::config::SlotFormat;
use super::slot_data::{MetaFile, SlotFile, SlotMeta};
use super::types::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const SLOT_EXTENSION: &str = "sav";
const META_SUFFIX: &str = ".meta.sav";

pub struct SlotStorage {
    directory: PathBuf,
    format: SlotFormat,
}

/// Entry returned by `SlotStorage::list_slots`
#[derive(Debug, Clone)]
pub struct SlotInfo {
    pub name: String,
    pub path: PathBuf,
    pub meta: SlotMeta,
}

impl SlotStorage {
    /// Creates storage rooted at `directory`
    ///
    /// The directory will be created if it doesn't exist.
    pub fn new(directory: impl AsRef<Path>, format: SlotFormat) -> Result<Self, SaveError> {
        let directory = directory.as_ref().to_path_buf();
        if !directory.exists() {
            fs::create_dir_all(&directory)?;
        }
        Ok(SlotStorage { directory, format })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn slot_path(&self, slot: &str) -> PathBuf {
        self.directory.join(format!("{}.{}", slot, SLOT_EXTENSION))
    }

    pub fn meta_path(&self, slot: &str) -> PathBuf {
        self.directory.join(format!("{}{}", slot, META_SUFFIX))
    }

    /// Writes a slot file
    pub fn write_slot(&self, slot: &str, file: &SlotFile) -> Result<PathBuf, SaveError> {
        let path = self.slot_path(slot);
        write_atomic(&path, &self.encode(file)?)?;
        log::debug!("slot '{}' written to {}", slot, path.display());
        Ok(path)
    }

    /// Reads a slot file, rejecting files from a newer version
    pub fn read_slot(&self, slot: &str) -> Result<SlotFile, SaveError> {
        let file: SlotFile = self.decode(&self.slot_path(slot))?;
        if file.version > CURRENT_SLOT_VERSION {
            return Err(SaveError::InvalidVersion(file.version));
        }
        Ok(file)
    }

    pub fn write_meta(&self, slot: &str, meta: &SlotMeta) -> Result<PathBuf, SaveError> {
        let path = self.meta_path(slot);
        let file = MetaFile {
            version: CURRENT_SLOT_VERSION,
            meta: meta.clone(),
        };
        write_atomic(&path, &self.encode(&file)?)?;
        Ok(path)
    }

    pub fn read_meta(&self, slot: &str) -> Result<SlotMeta, SaveError> {
        let file: MetaFile = self.decode(&self.meta_path(slot))?;
        if file.version > CURRENT_SLOT_VERSION {
            return Err(SaveError::InvalidVersion(file.version));
        }
        Ok(file.meta)
    }

    /// Check if a slot file exists
    pub fn slot_exists(&self, slot: &str) -> bool {
        self.slot_path(slot).exists()
    }

    /// Deletes a slot and its meta file; returns false when there was no slot
    pub fn delete_slot(&self, slot: &str) -> Result<bool, SaveError> {
        let path = self.slot_path(slot);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        let meta = self.meta_path(slot);
        if meta.exists() {
            fs::remove_file(meta)?;
        }
        Ok(true)
    }

    /// List all readable slots, newest first
    ///
    /// Uses the meta file when present and falls back to the full slot file.
    pub fn list_slots(&self) -> Result<Vec<SlotInfo>, SaveError> {
        let mut slots = Vec::new();

        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|f| f.to_str()) else {
                continue;
            };
            if file_name.ends_with(META_SUFFIX) {
                continue;
            }
            let Some(name) = file_name.strip_suffix(&format!(".{}", SLOT_EXTENSION)) else {
                continue;
            };

            let meta = self
                .read_meta(name)
                .or_else(|_| self.read_slot(name).map(|file| file.meta));
            match meta {
                Ok(meta) => slots.push(SlotInfo {
                    name: name.to_string(),
                    path: path.clone(),
                    meta,
                }),
                Err(e) => log::warn!("skipping unreadable slot {}: {}", path.display(), e),
            }
        }

        slots.sort_by(|a, b| b.meta.save_date.cmp(&a.meta.save_date));
        Ok(slots)
    }

    /// Writes a slot as pretty JSON, whatever its storage format
    pub fn export_json(&self, slot: &str, target: impl AsRef<Path>) -> Result<(), SaveError> {
        let file = self.read_slot(slot)?;
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(target, json)?;
        Ok(())
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, SaveError> {
        Ok(match self.format {
            SlotFormat::Binary => rmp_serde::to_vec(value)?,
            SlotFormat::Json => serde_json::to_vec_pretty(value)?,
        })
    }

    fn decode<T: DeserializeOwned>(&self, path: &Path) -> Result<T, SaveError> {
        if !path.exists() {
            return Err(SaveError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("slot file not found: {}", path.display()),
            )));
        }
        let bytes = fs::read(path)?;
        if bytes.is_empty() {
            return Err(SaveError::CorruptedData(format!("{} is empty", path.display())));
        }
        Ok(match self.format {
            SlotFormat::Binary => rmp_serde::from_slice(&bytes)?,
            SlotFormat::Json => serde_json::from_slice(&bytes)?,
        })
    }
}

/// Write to a temp file, sync, then rename over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SaveError> {
    let temp_path = path.with_extension("tmp");
    let mut temp = File::create(&temp_path)?;
    temp.write_all(bytes)?;
    temp.sync_all()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
