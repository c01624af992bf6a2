//! Save/Load system
//!
//! This module turns live world objects into versioned slot files and back:
//! - Records built from reflected, persistence-tagged fields
//! - Stable identities (path + GUID) for record keys and references
//! - Respawn of procedural entities missing from the world at load time
//! - Synchronous or background walks with main-thread mutation
//!
//! # Architecture
//!
//! - `types`: result codes, errors and the record type enum
//! - `record`: minimal and complex records, property values
//! - `slot_data`: slot data, meta and file containers
//! - `identity`: entity keys, GUIDs and reference lookup
//! - `codec`: field encoding/decoding, redirectors applied on decode
//! - `serializer`: per-entity save/load, hierarchy, auto-destroy
//! - `respawn`: recreating missing procedural entities
//! - `scope`: class scopes and the world walker
//! - `dispatch`: the main-thread queue
//! - `runner`: world/level/game mode/game instance run functions
//! - `manager`: SlotStorage for file operations
//!
//! # Example Usage
//!
//! ```ignore
//! let main = MainThread::new(world.clone());
//! let slot = Slot::new(SlotConfig::load_from_file("slot.json")?)?;
//! slot.attach(&main);
//!
//! slot.run_world_save();
//! // later, possibly in another session
//! slot.run_world_load();
//! ```

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod identity;
pub mod manager;
pub mod progress;
pub mod record;
pub mod redirector;
pub mod respawn;
pub mod runner;
pub mod scope;
pub mod serializer;
pub mod slot;
pub mod slot_data;
pub mod types;


// Re-export commonly used types
pub use codec::{sanitize_property_id, DecodeReport, ReferenceResolver};
pub use config::{default_save_dir, RuntimeMode, SlotConfig, SlotFormat};
pub use dispatch::{MainThread, SharedWorld};
pub use manager::{SlotInfo, SlotStorage};
pub use progress::{active_progress, Progress};
pub use record::{ComplexRecord, MinimalRecord, ObjectRef, PropertyValue};
pub use redirector::Redirectors;
pub use scope::{ScopeFilter, Walk};
pub use slot::Slot;
pub use slot_data::{MetaDefaults, SlotData, SlotFile, SlotMeta};
pub use types::*;
