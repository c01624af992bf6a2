//! Identity resolver
//!
//! Every entity gets a stable string key used as its record key and as the
//! serialized form of references to it:
//!
//! - actor: `<Level>.<Class>.<Name>[_GUID]`
//! - component: `<OwnerActorKey>.<Class>.<Name>[_GUID]`
//! - plain object: `<OuterKey or Level>.<Class>.<Name>[_GUID]`
//!
//! The GUID suffix is only present when the entity carries a valid `SGUID`.
//! Resolution prefers the GUID and falls back to comparing keys.

use crate::engine::{LiveObject, ObjectId, Value, World, GUID_FIELD};
use std::collections::HashMap;
use uuid::Uuid;

const NO_LEVEL: &str = "Transient";

/// Record key of any entity, dispatching on its kind
pub fn identity_of(world: &World, id: ObjectId) -> Option<String> {
    let object = world.get(id)?;
    if object.is_actor() {
        actor_identity(world, id)
    } else if object.is_component() {
        component_identity(world, id)
    } else {
        object_identity(world, id)
    }
}

pub fn actor_identity(world: &World, id: ObjectId) -> Option<String> {
    let actor = world.get(id)?;
    let level = actor.level.as_deref().unwrap_or(NO_LEVEL);
    Some(compose(world, level, actor))
}

pub fn component_identity(world: &World, id: ObjectId) -> Option<String> {
    let component = world.get(id)?;
    let owner = component.component.as_ref()?.owner;
    let owner_key = actor_identity(world, owner)?;
    Some(compose(world, &owner_key, component))
}

pub fn object_identity(world: &World, id: ObjectId) -> Option<String> {
    let object = world.get(id)?;
    let prefix = match object.outer {
        Some(outer) => identity_of(world, outer)?,
        None => object.level.clone().unwrap_or_else(|| NO_LEVEL.to_string()),
    };
    Some(compose(world, &prefix, object))
}

fn compose(world: &World, prefix: &str, object: &LiveObject) -> String {
    let class = world.classes().name_of(object.class);
    match object.guid() {
        Some(guid) => format!("{}.{}.{}_{}", prefix, class, object.name, guid.simple()),
        None => format!("{}.{}.{}", prefix, class, object.name),
    }
}

/// Full path of an entity: `<Level>:<Outermost>.<...>.<Name>`
pub fn full_name(world: &World, id: ObjectId) -> Option<String> {
    world.path_of(id)
}

/// Extracts the GUID from a key's `_<GUID>` suffix, if there is one
pub fn parse_guid_suffix(key: &str) -> Option<Uuid> {
    let (_, suffix) = key.rsplit_once('_')?;
    Uuid::parse_str(suffix).ok().filter(|guid| !guid.is_nil())
}

/// Assigns a fresh GUID if the object has an `SGUID` field that is still nil
///
/// A valid GUID is never replaced. Returns the object's GUID afterwards.
pub fn create_once_guid(object: &mut LiveObject) -> Option<Uuid> {
    if !object.has_guid_field() {
        return None;
    }
    if let Some(guid) = object.guid() {
        return Some(guid);
    }
    let guid = Uuid::new_v4();
    object.set(GUID_FIELD, Value::Guid(guid));
    Some(guid)
}

/// Writes `guid` only when the object has no valid GUID yet
pub fn assign_guid_once(object: &mut LiveObject, guid: Uuid) -> bool {
    if !object.has_guid_field() || object.guid().is_some() || guid.is_nil() {
        return false;
    }
    object.set(GUID_FIELD, Value::Guid(guid))
}

pub fn matches_guid(a: &LiveObject, b: &LiveObject) -> bool {
    match (a.guid(), b.guid()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

pub fn find_actor_with_guid(world: &World, guid: Uuid) -> Option<ObjectId> {
    world
        .iter()
        .filter(|o| o.is_live() && o.is_actor())
        .find(|o| o.guid() == Some(guid))
        .map(|o| o.id)
}

pub fn find_component_with_guid(world: &World, guid: Uuid) -> Option<ObjectId> {
    world
        .iter()
        .filter(|o| o.is_live() && o.is_component())
        .find(|o| o.guid() == Some(guid))
        .map(|o| o.id)
}

pub fn find_object_with_guid(world: &World, guid: Uuid) -> Option<ObjectId> {
    world
        .iter()
        .filter(|o| o.is_live())
        .find(|o| o.guid() == Some(guid))
        .map(|o| o.id)
}

/// Removes the `_<GUID>` suffix of every segment of a key
///
/// `Dungeon.Door.A_<guid>.Lever.L` becomes `Dungeon.Door.A.Lever.L`. Two keys
/// naming the same entity before and after it received its GUID strip to
/// the same string.
pub fn strip_guid_suffixes(key: &str) -> String {
    key.split('.')
        .map(|segment| match segment.rsplit_once('_') {
            Some((name, suffix)) if is_guid_suffix(suffix) => name,
            _ => segment,
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn is_guid_suffix(suffix: &str) -> bool {
    suffix.len() == 32 && Uuid::parse_str(suffix).is_ok()
}

/// False only when both sides carry a GUID and the GUIDs differ
fn guid_compatible(object: &LiveObject, guid: Option<Uuid>) -> bool {
    match (object.guid(), guid) {
        (Some(live), Some(saved)) => live == saved,
        _ => true,
    }
}

fn bare_identity_of(world: &World, id: ObjectId) -> Option<String> {
    identity_of(world, id).map(|key| strip_guid_suffixes(&key))
}

/// Finds the live entity `key` names, ignoring GUID suffixes
///
/// An entity that has no GUID yet matches a key saved with one. An entity
/// whose GUID differs from the key's never matches.
pub fn find_by_identity(world: &World, key: &str) -> Option<ObjectId> {
    let bare = strip_guid_suffixes(key);
    let guid = parse_guid_suffix(key);
    world
        .iter()
        .filter(|o| o.is_live() && guid_compatible(o, guid))
        .find(|o| bare_identity_of(world, o.id).as_deref() == Some(bare.as_str()))
        .map(|o| o.id)
}

/// Resolves a key to a live entity: GUID scan first, then key comparison
pub fn resolve(world: &World, key: &str) -> Option<ObjectId> {
    parse_guid_suffix(key)
        .and_then(|guid| find_object_with_guid(world, guid))
        .or_else(|| find_by_identity(world, key))
}

/// Live entities by GUID and by suffix-free key
///
/// Built once per load walk so reference resolution does not rebuild every
/// key per lookup. Hits are re-checked against the live world; a miss says
/// nothing and callers fall back to `resolve`.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    by_guid: HashMap<Uuid, ObjectId>,
    by_key: HashMap<String, Vec<ObjectId>>,
}

impl IdentityIndex {
    pub fn build(world: &World) -> Self {
        let mut index = IdentityIndex::default();
        let live: Vec<ObjectId> = world.iter().filter(|o| o.is_live()).map(|o| o.id).collect();
        for id in live {
            index.insert(world, id);
        }
        index
    }

    pub fn insert(&mut self, world: &World, id: ObjectId) {
        let Some(object) = world.get(id) else {
            return;
        };
        if let Some(guid) = object.guid() {
            self.by_guid.insert(guid, id);
        }
        if let Some(bare) = bare_identity_of(world, id) {
            self.by_key.entry(bare).or_default().push(id);
        }
    }

    pub fn resolve(&self, world: &World, key: &str) -> Option<ObjectId> {
        let guid = parse_guid_suffix(key);
        let by_guid = guid
            .and_then(|g| self.by_guid.get(&g).copied())
            .filter(|id| world.get(*id).map(|o| o.is_live() && o.guid() == guid).unwrap_or(false));
        if by_guid.is_some() {
            return by_guid;
        }

        let bare = strip_guid_suffixes(key);
        self.by_key.get(&bare)?.iter().copied().find(|id| {
            world
                .get(*id)
                .map(|o| o.is_live() && guid_compatible(o, guid))
                .unwrap_or(false)
                && bare_identity_of(world, *id).as_deref() == Some(bare.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ClassBuilder, ClassRegistry, Transform};
    use std::sync::Arc;

    fn world_with_door() -> (World, ObjectId) {
        let mut classes = ClassRegistry::new();
        let door = classes
            .register(ClassBuilder::new("Door").parent(ClassRegistry::ACTOR).with_guid())
            .unwrap();
        let mut world = World::new("Dungeon", Arc::new(classes));
        let id = world.spawn_actor(door, Some("Front"), None, Transform::default()).unwrap();
        (world, id)
    }

    #[test]
    fn test_actor_identity_without_guid() {
        let (world, id) = world_with_door();
        assert_eq!(identity_of(&world, id).unwrap(), "Dungeon.Door.Front");
        assert_eq!(full_name(&world, id).unwrap(), "Dungeon:Front");
    }

    #[test]
    fn test_guid_suffix_round_trips() {
        let (mut world, id) = world_with_door();
        let guid = create_once_guid(world.get_mut(id).unwrap()).unwrap();
        let key = identity_of(&world, id).unwrap();
        assert!(key.starts_with("Dungeon.Door.Front_"));
        assert_eq!(parse_guid_suffix(&key), Some(guid));
        assert_eq!(resolve(&world, &key), Some(id));
    }

    #[test]
    fn test_create_once_never_overwrites() {
        let (mut world, id) = world_with_door();
        let object = world.get_mut(id).unwrap();
        let first = create_once_guid(object).unwrap();
        let second = create_once_guid(object).unwrap();
        assert_eq!(first, second);
        assert!(!assign_guid_once(object, Uuid::new_v4()));
        assert_eq!(object.guid(), Some(first));
    }

    #[test]
    fn test_identity_is_stable_within_a_run() {
        let (mut world, id) = world_with_door();
        create_once_guid(world.get_mut(id).unwrap());
        let a = identity_of(&world, id);
        let b = identity_of(&world, id);
        assert_eq!(a, b);
    }

    #[test]
    fn test_resolve_prefers_guid_over_name() {
        let (mut world, id) = world_with_door();
        let guid = create_once_guid(world.get_mut(id).unwrap()).unwrap();
        let stale_key = format!("Dungeon.Door.Renamed_{}", guid.simple());
        assert_eq!(resolve(&world, &stale_key), Some(id));
        assert_eq!(parse_guid_suffix("Dungeon.Door.Front"), None);
        assert_eq!(parse_guid_suffix("Dungeon.Door.Door_0"), None);
    }

    #[test]
    fn test_saved_key_finds_entity_without_guid_yet() {
        let (mut world, id) = world_with_door();
        let saved_key = format!("Dungeon.Door.Front_{}", Uuid::new_v4().simple());
        assert_eq!(strip_guid_suffixes(&saved_key), "Dungeon.Door.Front");
        assert_eq!(resolve(&world, &saved_key), Some(id));

        create_once_guid(world.get_mut(id).unwrap());
        assert_eq!(resolve(&world, &saved_key), None);
    }

    #[test]
    fn test_strip_keeps_plain_underscored_names() {
        let guid = Uuid::new_v4().simple().to_string();
        let key = format!("Dungeon.Door.Door_0_{}.Lever.Lever_2", guid);
        assert_eq!(strip_guid_suffixes(&key), "Dungeon.Door.Door_0.Lever.Lever_2");
    }

    #[test]
    fn test_index_agrees_with_scan() {
        let (mut world, id) = world_with_door();
        let index = IdentityIndex::build(&world);
        let saved_key = format!("Dungeon.Door.Front_{}", Uuid::new_v4().simple());
        assert_eq!(index.resolve(&world, &saved_key), Some(id));
        assert_eq!(index.resolve(&world, "Dungeon.Door.Back"), None);

        world.destroy(id);
        assert_eq!(index.resolve(&world, &saved_key), None);
    }
}
