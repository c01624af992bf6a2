//! Live objects: the entities a world is made of
//!
//! A `LiveObject` is one instance of a registered class. Actors carry an
//! `ActorState` (transform, physics, visibility), components carry a
//! `ComponentState` (owner, relative transform, active flag). Plain objects
//! carry neither.

use super::class::{ClassId, DESTROYED_FIELD, GUID_FIELD};
use super::value::{Transform, Value, Vector3};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Tag that keeps an entity's transform untouched on load
pub const TAG_NO_TRANSFORM: &str = "NoSaveTransform";

/// Tag that keeps an actor's velocities untouched on load
pub const TAG_NO_PHYSICS: &str = "NoSavePhysics";

/// Tag that keeps an actor's visibility untouched on load
pub const TAG_NO_HIDE: &str = "NoSaveHidden";

/// Process-local handle of a live object
///
/// Ids are handed out in increasing order and never reused, so iterating a
/// world by id is iterating in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// Engine bookkeeping flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectFlags {
    /// Class default object used as a template
    pub default_object: bool,
    /// Archetype template for other instances
    pub archetype: bool,
    /// Scheduled for teardown; no longer part of the game
    pub pending_destroy: bool,
}

impl ObjectFlags {
    pub fn is_template(&self) -> bool {
        self.default_object || self.archetype
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActorState {
    pub transform: Transform,
    pub linear_velocity: Vector3,
    pub angular_velocity: Vector3,
    pub hidden: bool,
    /// Static actors never have their transform or velocity restored
    pub movable: bool,
    /// Actor this one is attached to, if any
    pub attach_parent: Option<ObjectId>,
}

impl Default for ActorState {
    fn default() -> Self {
        ActorState {
            transform: Transform::default(),
            linear_velocity: Vector3::ZERO,
            angular_velocity: Vector3::ZERO,
            hidden: false,
            movable: true,
            attach_parent: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentState {
    pub owner: ObjectId,
    /// Relative to the owning actor
    pub transform: Transform,
    pub active: bool,
    pub movable: bool,
}

impl ComponentState {
    pub fn new(owner: ObjectId) -> Self {
        ComponentState {
            owner,
            transform: Transform::default(),
            active: true,
            movable: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiveObject {
    pub id: ObjectId,
    pub name: String,
    pub class: ClassId,
    /// Owning object; `None` for level-owned actors and singletons
    pub outer: Option<ObjectId>,
    /// Level (map package) the object lives in; `None` outside any map
    pub level: Option<String>,
    pub flags: ObjectFlags,
    pub fields: BTreeMap<String, Value>,
    pub tags: Vec<String>,
    pub actor: Option<ActorState>,
    pub component: Option<ComponentState>,
}

impl LiveObject {
    pub fn new(id: ObjectId, name: impl Into<String>, class: ClassId) -> Self {
        LiveObject {
            id,
            name: name.into(),
            class,
            outer: None,
            level: None,
            flags: ObjectFlags::default(),
            fields: BTreeMap::new(),
            tags: Vec::new(),
            actor: None,
            component: None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.get_mut(field)
    }

    /// Overwrites an existing field; returns false when the object has no such field
    pub fn set(&mut self, field: &str, value: Value) -> bool {
        match self.fields.get_mut(field) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.has_tag(&tag) {
            self.tags.push(tag);
        }
    }

    /// The persistent GUID, if the object carries a valid one
    pub fn guid(&self) -> Option<Uuid> {
        self.get(GUID_FIELD)
            .and_then(Value::as_guid)
            .filter(|guid| !guid.is_nil())
    }

    pub fn has_guid_field(&self) -> bool {
        self.fields.contains_key(GUID_FIELD)
    }

    pub fn is_marked_destroyed(&self) -> bool {
        self.get(DESTROYED_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn is_actor(&self) -> bool {
        self.actor.is_some()
    }

    pub fn is_component(&self) -> bool {
        self.component.is_some()
    }

    /// Alive and not a class template
    pub fn is_live(&self) -> bool {
        !self.flags.pending_destroy && !self.flags.is_template()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::class::ClassRegistry;

    #[test]
    fn test_nil_guid_is_not_valid() {
        let mut object = LiveObject::new(ObjectId(1), "A_0", ClassRegistry::ACTOR);
        object.fields.insert(GUID_FIELD.to_string(), Value::Guid(Uuid::nil()));
        assert!(object.has_guid_field());
        assert_eq!(object.guid(), None);

        let guid = Uuid::new_v4();
        object.set(GUID_FIELD, Value::Guid(guid));
        assert_eq!(object.guid(), Some(guid));
    }

    #[test]
    fn test_set_rejects_unknown_field() {
        let mut object = LiveObject::new(ObjectId(1), "A_0", ClassRegistry::OBJECT);
        assert!(!object.set("Health", Value::Int(3)));
        assert!(object.get("Health").is_none());
    }

    #[test]
    fn test_tags_are_unique() {
        let mut object = LiveObject::new(ObjectId(1), "A_0", ClassRegistry::ACTOR);
        object.add_tag(TAG_NO_HIDE);
        object.add_tag(TAG_NO_HIDE);
        assert_eq!(object.tags.len(), 1);
        assert!(object.has_tag(TAG_NO_HIDE));
    }

    #[test]
    fn test_templates_are_not_live() {
        let mut object = LiveObject::new(ObjectId(1), "Default__A", ClassRegistry::ACTOR);
        object.flags.default_object = true;
        assert!(!object.is_live());
    }
}
