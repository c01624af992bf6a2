//! keepsake: save slots for live game worlds
//!
//! - `engine`: the host object model (classes, live objects, the world)
//! - `save`: records, identities, respawn, threaded walks and slot files

pub mod engine;
pub mod save;
