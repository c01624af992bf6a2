//! Result codes, error types and shared enums of the save system

use serde::{Deserialize, Serialize};

/// Current slot file version
pub const CURRENT_SLOT_VERSION: u32 = 1;

/// Outcome of every public serializer or walker operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    Success,
    /// Excluded by scope, or nothing to do
    Skipped,
    /// Invalid or destroyed target, missing record, I/O failure
    Failed,
}

impl SaveResult {
    pub fn is_success(self) -> bool {
        self == SaveResult::Success
    }
}

/// Which record variant a slot produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordType {
    /// Transform and visibility only; no fields, no respawn
    Minimal,
    /// Full property records with identity; supports respawn
    #[default]
    Complex,
}

/// Error types for slot I/O and record decoding
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid slot version: {0}")]
    InvalidVersion(u32),

    #[error("corrupted slot data: {0}")]
    CorruptedData(String),

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("no world available")]
    NoWorld,
}
