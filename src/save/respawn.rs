//! Respawn resolver
//!
//! Recreates entities that exist in the slot but not in the live world.
//! Only classes with the Procedural capability are eligible, and the slot's
//! toggles and respawn scope can narrow that further. Ineligible entities are
//! skipped silently; the reference that needed them stays null.
//!
//! A respawned entity is spawned where its record says it lived (level for
//! actors, owning actor for components, outer for objects), gets the
//! record's GUID, and is then loaded from that same record.

use super::codec::{self, ReferenceResolver};
use super::identity::{self, IdentityIndex};
use super::record::{ComplexRecord, ObjectRef};
use super::serializer::EntityKind;
use super::slot::Slot;
use crate::engine::{ClassId, ClassKind, ClassRegistry, ObjectId, Transform, World, WorldError};

/// Reference resolver used while loading: GUID scan, key scan, then respawn
pub(crate) struct RespawnResolver<'a> {
    slot: &'a Slot,
}

impl<'a> RespawnResolver<'a> {
    pub(crate) fn new(slot: &'a Slot) -> Self {
        RespawnResolver { slot }
    }
}

impl ReferenceResolver for RespawnResolver<'_> {
    fn resolve_reference(
        &mut self,
        world: &mut World,
        reference: &ObjectRef,
        declared: ClassId,
        referrer: ObjectId,
    ) -> Option<ObjectId> {
        self.slot
            .lookup_indexed(world, reference, declared)
            .or_else(|| codec::lookup_reference(world, reference, declared))
            .or_else(|| self.slot.respawn_reference(world, reference, declared, referrer))
    }
}

/// Live entity at a record's saved path, if class and GUID agree with the record
pub(crate) fn live_at_recorded_path(world: &World, record: &ComplexRecord) -> Option<ObjectId> {
    let id = world.find_by_path(&record.full_name)?;
    let object = world.get(id)?;
    let same_class = world.classes().path_of(object.class) == record.class_path;
    let same_guid = match (object.guid(), record.guid) {
        (Some(live), Some(saved)) => live == saved,
        _ => true,
    };
    (same_class && same_guid).then_some(id)
}

impl Slot {
    /// Starts the per-walk identity index over the current world
    pub(crate) fn begin_identity_index(&self, world: &World) {
        *self.inner.identity_index.lock() = Some(IdentityIndex::build(world));
    }

    pub(crate) fn end_identity_index(&self) {
        self.inner.identity_index.lock().take();
    }

    /// Reference lookup through the walk's index; `None` outside a load walk
    fn lookup_indexed(&self, world: &World, reference: &ObjectRef, declared: ClassId) -> Option<ObjectId> {
        if reference.is_null {
            return None;
        }
        let index = self.inner.identity_index.lock();
        index
            .as_ref()?
            .resolve(world, &reference.key)
            .filter(|id| world.get(*id).map(|o| world.classes().is_a(o.class, declared)).unwrap_or(false))
    }

    /// Materializes the target of an unresolved reference
    ///
    /// The recorded class is used when it is-a `declared`, otherwise
    /// `declared` itself.
    pub fn respawn_reference(
        &self,
        world: &mut World,
        reference: &ObjectRef,
        declared: ClassId,
        referrer: ObjectId,
    ) -> Option<ObjectId> {
        let record = self.record_for_key(&reference.key);
        if record.as_ref().map(|r| r.destroyed).unwrap_or(false) {
            return None;
        }

        // the target may exist under its saved path without its GUID yet
        let existing = record
            .as_ref()
            .and_then(|r| live_at_recorded_path(world, r))
            .filter(|id| world.get(*id).map(|o| world.classes().is_a(o.class, declared)).unwrap_or(false));
        if existing.is_some() {
            return existing;
        }

        let classes = world.classes_arc();
        let class_path = record
            .as_ref()
            .map(|r| r.class_path.as_str())
            .unwrap_or(&reference.class_path);
        let class = match classes.resolve(class_path) {
            Some(recorded) if classes.is_a(recorded, declared) => recorded,
            _ => declared,
        };

        self.respawn(world, &reference.key, class, record.as_ref(), Some(referrer))
    }

    /// Recreates the entity a record describes; `None` when ineligible
    pub fn respawn_from_record(&self, world: &mut World, key: &str, record: &ComplexRecord) -> Option<ObjectId> {
        if record.destroyed {
            return None;
        }
        let Some(class) = world.classes().resolve(&record.class_path) else {
            log::warn!("cannot respawn {}: class {} not registered", key, record.class_path);
            return None;
        };
        self.respawn(world, key, class, Some(record), None)
    }

    /// Respawns the missing components whose record names `actor` as owner
    pub fn respawn_missing_components_of(&self, world: &mut World, actor: ObjectId) -> usize {
        let mut spawned = 0;
        for (key, record) in self.missing_records(world, ClassKind::Component, None) {
            let by_key = Some(&record.outer_name)
                .filter(|k| !k.is_empty())
                .and_then(|k| identity::resolve(world, k));
            let owner = by_key.or_else(|| record.outer_path().and_then(|path| world.find_by_path(&path)));
            if owner == Some(actor) && self.respawn_from_record(world, &key, &record).is_some() {
                spawned += 1;
            }
        }
        spawned
    }

    /// Respawns every missing, non-destroyed actor, then every missing component
    ///
    /// `level` limits the pass to records whose level contains that text.
    /// Returns how many entities were created.
    pub fn respawn_missing(&self, world: &mut World, level: Option<&str>) -> usize {
        let mut spawned = 0;
        for kind in [ClassKind::Actor, ClassKind::Component] {
            for (key, record) in self.missing_records(world, kind, level) {
                if self.respawn_from_record(world, &key, &record).is_some() {
                    spawned += 1;
                }
            }
        }
        spawned
    }

    fn missing_records(&self, world: &World, kind: ClassKind, level: Option<&str>) -> Vec<(String, ComplexRecord)> {
        let classes = world.classes();
        let needle = level.map(str::to_lowercase);
        self.data()
            .complex
            .iter()
            .filter(|(_, r)| !r.destroyed)
            .filter(|(_, r)| {
                needle
                    .as_deref()
                    .map(|n| r.level_name().to_lowercase().contains(n))
                    .unwrap_or(true)
            })
            .filter(|(_, r)| {
                classes
                    .resolve(&r.class_path)
                    .map(|c| classes.kind_of(c) == kind)
                    .unwrap_or(false)
            })
            .filter(|(_, r)| {
                let by_guid = r.guid.and_then(|g| identity::find_object_with_guid(world, g));
                by_guid.is_none() && world.find_by_path(&r.full_name).is_none()
            })
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect()
    }

    fn record_for_key(&self, key: &str) -> Option<ComplexRecord> {
        let data = self.data();
        if let Some(record) = data.complex.get(key) {
            return Some(record.clone());
        }
        let guid = identity::parse_guid_suffix(key)?;
        data.complex.values().find(|r| r.guid == Some(guid)).cloned()
    }

    fn respawn(
        &self,
        world: &mut World,
        key: &str,
        class: ClassId,
        record: Option<&ComplexRecord>,
        referrer: Option<ObjectId>,
    ) -> Option<ObjectId> {
        let classes = world.classes_arc();
        if !self.may_respawn(&classes, class) {
            log::debug!("{} is not eligible for respawn", classes.name_of(class));
            return None;
        }
        if !self.inner.respawning.lock().insert(key.to_string()) {
            return None;
        }

        let spawned = self.instantiate(world, &classes, class, record, referrer);
        if let Some(id) = spawned {
            let guid = record
                .and_then(|r| r.guid)
                .or_else(|| identity::parse_guid_suffix(key));
            if let Some(object) = world.get_mut(id) {
                match guid {
                    Some(guid) => {
                        identity::assign_guid_once(object, guid);
                    }
                    None => {
                        identity::create_once_guid(object);
                    }
                }
            }
            if let Some(index) = self.inner.identity_index.lock().as_mut() {
                index.insert(world, id);
            }
            if let Some(record) = record {
                let kind = world.get(id).map(EntityKind::of).unwrap_or(EntityKind::Object);
                self.apply_with_hooks(world, id, kind, record);
            }
            if self.config().debug {
                log::info!("respawned {} as {:?}", key, id);
            }
        }

        self.inner.respawning.lock().remove(key);
        spawned
    }

    fn may_respawn(&self, classes: &ClassRegistry, class: ClassId) -> bool {
        if !classes.is_procedural(class) {
            return false;
        }
        let toggled = match classes.kind_of(class) {
            ClassKind::Actor => self.config().respawn_dynamic_actors,
            ClassKind::Component => self.config().respawn_dynamic_components,
            ClassKind::Object => true,
        };
        toggled && self.scope_filter(classes).can_respawn(classes, class)
    }

    fn instantiate(
        &self,
        world: &mut World,
        classes: &ClassRegistry,
        class: ClassId,
        record: Option<&ComplexRecord>,
        referrer: Option<ObjectId>,
    ) -> Option<ObjectId> {
        let name = record.map(ComplexRecord::object_name).filter(|n| !n.is_empty());
        let recorded_outer = record.and_then(|r| {
            let by_key = Some(&r.outer_name)
                .filter(|key| !key.is_empty())
                .and_then(|key| identity::resolve(world, key));
            by_key.or_else(|| r.outer_path().and_then(|path| world.find_by_path(&path)))
        });

        match classes.kind_of(class) {
            ClassKind::Actor => {
                let level = record
                    .map(ComplexRecord::level_name)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .or_else(|| referrer.and_then(|r| world.get(r)).and_then(|o| o.level.clone()));
                let transform = record
                    .map(|r| Transform {
                        location: r.location,
                        rotation: r.rotation,
                        scale: r.scale,
                    })
                    .unwrap_or_default();
                spawn_with_fallback_name(world, name, |world, name| {
                    world.spawn_actor(class, name, level.as_deref(), transform)
                })
            }
            ClassKind::Component => {
                let owner = recorded_outer
                    .filter(|o| world.get(*o).map(|o| o.is_actor()).unwrap_or(false))
                    .or_else(|| referrer.and_then(|r| world.owning_actor(r)))?;
                spawn_with_fallback_name(world, name, |world, name| {
                    world.spawn_component(owner, class, name)
                })
            }
            ClassKind::Object => {
                let outer = recorded_outer.or_else(|| referrer.and_then(|r| world.get(r)).and_then(|o| o.outer));
                spawn_with_fallback_name(world, name, |world, name| world.new_object(outer, class, name))
            }
        }
    }
}

/// Spawns with the recorded name, or a generated one if that name is taken
fn spawn_with_fallback_name(
    world: &mut World,
    name: Option<&str>,
    spawn: impl Fn(&mut World, Option<&str>) -> Result<ObjectId, WorldError>,
) -> Option<ObjectId> {
    let result = match spawn(world, name) {
        Err(WorldError::NameTaken(_)) => spawn(world, None),
        other => other,
    };
    match result {
        Ok(id) => Some(id),
        Err(e) => {
            log::warn!("respawn failed: {}", e);
            None
        }
    }
}
