//! Save/load lifecycle hooks a class may opt into
//!
//! This is the "Serializable" capability. A class registers an implementation
//! with `ClassBuilder::serializable`; subclasses inherit it. Every method has
//! a no-op default so implementors only override what they care about.

use super::object::LiveObject;
use crate::save::SlotMeta;

/// Lifecycle hooks invoked around saving and loading an entity
///
/// Hooks always run on the main thread, with exclusive access to the object.
pub trait Serializable: Send + Sync {
    /// Called before any field of the object is read for saving
    fn on_prepare_to_save(&self, _object: &mut LiveObject) {}

    /// Called after the object's record has been stored in the slot
    fn on_saved(&self, _object: &mut LiveObject) {}

    /// Called before any field of the object is written from a record
    fn on_prepare_to_load(&self, _object: &mut LiveObject) {}

    /// Called after the object has been restored, with the slot's meta snapshot
    fn on_loaded(&self, _object: &mut LiveObject, _meta: &SlotMeta) {}
}
