//! Host object model
//!
//! The minimal live-object runtime the save system works against:
//! - `class`: class registry, field descriptors, capabilities
//! - `object`: live objects, actor/component state, tags and flags
//! - `world`: the registry of live objects and world roles
//! - `value`: runtime field values and spatial types
//! - `hooks`: the `Serializable` lifecycle trait

pub mod class;
pub mod hooks;
pub mod object;
pub mod value;
pub mod world;

pub use class::{
    ClassBuilder, ClassDescriptor, ClassError, ClassId, ClassKind, ClassRegistry, FieldDescriptor,
    FieldType, DESTROYED_FIELD, GUID_FIELD,
};
pub use hooks::Serializable;
pub use object::{
    ActorState, ComponentState, LiveObject, ObjectFlags, ObjectId, TAG_NO_HIDE, TAG_NO_PHYSICS,
    TAG_NO_TRANSFORM,
};
pub use value::{Rotator, Transform, Value, Vector3};
pub use world::{World, WorldError, WorldRoles};
