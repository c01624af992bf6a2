//! Object, actor and component serializers
//!
//! Per-entity save and load. Saving runs the entity's prepare hook, builds a
//! record of the slot's record type and stores it under the entity's
//! identity key. Loading finds the record, runs the prepare hook, applies the
//! record and finally calls `on_loaded` with the slot's meta.
//!
//! Hierarchy variants process owned objects after their parent on save and
//! before their parent on load.

use super::codec::{self, decode_properties};
use super::identity;
use super::record::{ComplexRecord, MinimalRecord};
use super::respawn::{live_at_recorded_path, RespawnResolver};
use super::slot::Slot;
use super::types::{RecordType, SaveResult};
use crate::engine::{
    ClassId, ClassRegistry, LiveObject, ObjectId, Serializable, Value, World, DESTROYED_FIELD,
    TAG_NO_HIDE, TAG_NO_PHYSICS, TAG_NO_TRANSFORM,
};
use std::sync::Arc;
use uuid::Uuid;

/// Which serializer an entity goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntityKind {
    Object,
    Component,
    Actor,
}

impl EntityKind {
    fn accepts(self, object: &LiveObject) -> bool {
        match self {
            EntityKind::Object => true,
            EntityKind::Component => object.is_component(),
            EntityKind::Actor => object.is_actor(),
        }
    }

    pub(crate) fn of(object: &LiveObject) -> Self {
        if object.is_actor() {
            EntityKind::Actor
        } else if object.is_component() {
            EntityKind::Component
        } else {
            EntityKind::Object
        }
    }
}

fn hooks_of(world: &World, id: ObjectId) -> Option<Arc<dyn Serializable>> {
    world.get(id).and_then(|o| world.classes().hooks(o.class))
}

/// Live entity a record belongs to: by GUID, then by its saved path
fn live_for_record(world: &World, record: &ComplexRecord, kind: EntityKind) -> Option<ObjectId> {
    let by_guid = record.guid.and_then(|guid| match kind {
        EntityKind::Actor => identity::find_actor_with_guid(world, guid),
        EntityKind::Component => identity::find_component_with_guid(world, guid),
        EntityKind::Object => identity::find_object_with_guid(world, guid),
    });
    by_guid.or_else(|| {
        live_at_recorded_path(world, record).filter(|id| world.get(*id).map(|o| kind.accepts(o)).unwrap_or(false))
    })
}

impl Slot {
    // ======================================================================
    // Save
    // ======================================================================

    pub fn save_object(&self, world: &mut World, object: ObjectId) -> SaveResult {
        self.save_entity(world, object, EntityKind::Object, true)
    }

    pub fn save_component(&self, world: &mut World, component: ObjectId) -> SaveResult {
        self.save_entity(world, component, EntityKind::Component, true)
    }

    pub fn save_actor(&self, world: &mut World, actor: ObjectId) -> SaveResult {
        self.save_entity(world, actor, EntityKind::Actor, true)
    }

    /// Saves an object, then every object it owns
    pub fn save_object_hierarchy(&self, world: &mut World, object: ObjectId) -> SaveResult {
        let result = self.save_object(world, object);
        if result == SaveResult::Failed {
            return result;
        }
        for child in world.sub_objects_of(object) {
            self.save_object_hierarchy(world, child);
        }
        result
    }

    /// Saves an actor, then its components and owned objects
    pub fn save_actor_hierarchy(&self, world: &mut World, actor: ObjectId) -> SaveResult {
        let result = self.save_actor(world, actor);
        if result == SaveResult::Failed {
            return result;
        }
        for component in world.components_of(actor) {
            self.save_component(world, component);
            for child in world.sub_objects_of(component) {
                self.save_object_hierarchy(world, child);
            }
        }
        for child in world.sub_objects_of(actor) {
            self.save_object_hierarchy(world, child);
        }
        result
    }

    /// Saves every live plain object of `class` (derived classes included)
    pub fn save_objects_of_class(&self, world: &mut World, class: ClassId) -> SaveResult {
        let objects = of_class(world, class, EntityKind::Object);
        self.for_each(world, objects, Self::save_object_hierarchy)
    }

    pub fn save_actors_of_class(&self, world: &mut World, class: ClassId) -> SaveResult {
        let actors = of_class(world, class, EntityKind::Actor);
        self.for_each(world, actors, Self::save_actor_hierarchy)
    }

    /// Saves the game instance; never filtered by scope
    pub fn save_game_instance_singleton(&self, world: &mut World) -> SaveResult {
        match world.roles.game_instance {
            Some(instance) => self.save_entity(world, instance, EntityKind::Object, false),
            None => SaveResult::Failed,
        }
    }

    pub(crate) fn save_entity(
        &self,
        world: &mut World,
        id: ObjectId,
        kind: EntityKind,
        check_scope: bool,
    ) -> SaveResult {
        match world.get(id) {
            Some(object) if object.is_live() && kind.accepts(object) => {}
            _ => return SaveResult::Failed,
        }
        if check_scope && !self.in_scope(world, id) {
            return SaveResult::Skipped;
        }

        let hooks = hooks_of(world, id);
        if let (Some(hooks), Some(object)) = (&hooks, world.get_mut(id)) {
            hooks.on_prepare_to_save(object);
        }

        let compression = self.config().compression;
        if compression == RecordType::Complex {
            if let Some(object) = world.get_mut(id) {
                identity::create_once_guid(object);
            }
        }
        let Some(key) = identity::identity_of(world, id) else {
            return SaveResult::Failed;
        };

        match compression {
            RecordType::Minimal => {
                let Some(record) = self.generate_minimal_record(world, id, kind) else {
                    return SaveResult::Failed;
                };
                self.data().minimal.insert(key.clone(), record);
            }
            RecordType::Complex => {
                let Some(record) = self.generate_complex_record(world, id, kind) else {
                    return SaveResult::Failed;
                };
                self.data().complex.insert(key.clone(), record);
            }
        }

        if let (Some(hooks), Some(object)) = (&hooks, world.get_mut(id)) {
            hooks.on_saved(object);
        }
        if self.config().debug {
            log::info!("saved {}", key);
        }
        SaveResult::Success
    }

    // ======================================================================
    // Record generation
    // ======================================================================

    pub fn generate_complex_record_object(&self, world: &World, object: ObjectId) -> Option<ComplexRecord> {
        self.generate_complex_record(world, object, EntityKind::Object)
    }

    pub fn generate_complex_record_component(&self, world: &World, component: ObjectId) -> Option<ComplexRecord> {
        self.generate_complex_record(world, component, EntityKind::Component)
    }

    pub fn generate_complex_record_actor(&self, world: &World, actor: ObjectId) -> Option<ComplexRecord> {
        self.generate_complex_record(world, actor, EntityKind::Actor)
    }

    pub fn generate_minimal_record_object(&self, world: &World, object: ObjectId) -> Option<MinimalRecord> {
        self.generate_minimal_record(world, object, EntityKind::Object)
    }

    pub fn generate_minimal_record_component(&self, world: &World, component: ObjectId) -> Option<MinimalRecord> {
        self.generate_minimal_record(world, component, EntityKind::Component)
    }

    pub fn generate_minimal_record_actor(&self, world: &World, actor: ObjectId) -> Option<MinimalRecord> {
        self.generate_minimal_record(world, actor, EntityKind::Actor)
    }

    fn generate_complex_record(&self, world: &World, id: ObjectId, kind: EntityKind) -> Option<ComplexRecord> {
        let object = world.get(id).filter(|o| kind.accepts(o))?;
        let mut record = ComplexRecord {
            full_name: identity::full_name(world, id)?,
            class_path: world.classes().path_of(object.class).to_string(),
            guid: object.guid(),
            destroyed: object.is_marked_destroyed(),
            properties: codec::encode_properties(world, object, self.deep_logs()),
            ..Default::default()
        };

        if let Some(actor) = &object.actor {
            record.outer_name = actor
                .attach_parent
                .and_then(|parent| identity::identity_of(world, parent))
                .unwrap_or_default();
            record.hidden_in_game = actor.hidden;
            record.ignore_transform = !actor.movable || object.has_tag(TAG_NO_TRANSFORM);
            record.location = actor.transform.location;
            record.rotation = actor.transform.rotation;
            record.scale = actor.transform.scale;
            record.linear_velocity = actor.linear_velocity;
            record.angular_velocity = actor.angular_velocity;
        } else if let Some(component) = &object.component {
            record.outer_name = identity::identity_of(world, component.owner).unwrap_or_default();
            record.active = component.active;
            record.ignore_transform = !component.movable || object.has_tag(TAG_NO_TRANSFORM);
            record.location = component.transform.location;
            record.rotation = component.transform.rotation;
            record.scale = component.transform.scale;
        } else {
            record.outer_name = object
                .outer
                .and_then(|outer| identity::identity_of(world, outer))
                .unwrap_or_default();
        }

        Some(record)
    }

    fn generate_minimal_record(&self, world: &World, id: ObjectId, kind: EntityKind) -> Option<MinimalRecord> {
        let object = world.get(id).filter(|o| kind.accepts(o))?;
        let mut record = MinimalRecord::default();
        if let Some(actor) = &object.actor {
            record.hidden = actor.hidden;
            record.location = actor.transform.location;
            record.rotation = actor.transform.rotation;
            record.scale = actor.transform.scale;
        } else if let Some(component) = &object.component {
            record.active = component.active;
            record.location = component.transform.location;
            record.rotation = component.transform.rotation;
            record.scale = component.transform.scale;
        }
        Some(record)
    }

    // ======================================================================
    // Load
    // ======================================================================

    pub fn load_object(&self, world: &mut World, object: ObjectId) -> SaveResult {
        self.load_entity(world, object, EntityKind::Object, true)
    }

    pub fn load_component(&self, world: &mut World, component: ObjectId) -> SaveResult {
        self.load_entity(world, component, EntityKind::Component, true)
    }

    pub fn load_actor(&self, world: &mut World, actor: ObjectId) -> SaveResult {
        self.load_entity(world, actor, EntityKind::Actor, true)
    }

    /// Loads every object `object` owns, then `object` itself
    pub fn load_object_hierarchy(&self, world: &mut World, object: ObjectId) -> SaveResult {
        for child in world.sub_objects_of(object) {
            self.load_object_hierarchy(world, child);
        }
        self.load_object(world, object)
    }

    /// Loads an actor's components and owned objects, then the actor
    pub fn load_actor_hierarchy(&self, world: &mut World, actor: ObjectId) -> SaveResult {
        self.load_owned_by(world, actor);
        self.load_actor(world, actor)
    }

    fn load_owned_by(&self, world: &mut World, actor: ObjectId) {
        for component in world.components_of(actor) {
            for child in world.sub_objects_of(component) {
                self.load_object_hierarchy(world, child);
            }
            self.load_component(world, component);
        }
        for child in world.sub_objects_of(actor) {
            self.load_object_hierarchy(world, child);
        }
    }

    pub fn load_objects_of_class(&self, world: &mut World, class: ClassId) -> SaveResult {
        let objects = of_class(world, class, EntityKind::Object);
        self.for_each(world, objects, Self::load_object_hierarchy)
    }

    pub fn load_actors_of_class(&self, world: &mut World, class: ClassId) -> SaveResult {
        let actors = of_class(world, class, EntityKind::Actor);
        self.for_each(world, actors, Self::load_actor_hierarchy)
    }

    pub fn load_game_instance_singleton(&self, world: &mut World) -> SaveResult {
        match world.roles.game_instance {
            Some(instance) => self.load_entity(world, instance, EntityKind::Object, false),
            None => SaveResult::Failed,
        }
    }

    /// Loads the actor whose record carries `guid`, respawning it when missing
    pub fn load_actor_by_guid(&self, world: &mut World, guid: Uuid) -> SaveResult {
        self.load_by_guid(world, guid, EntityKind::Actor)
    }

    pub fn load_component_by_guid(&self, world: &mut World, guid: Uuid) -> SaveResult {
        self.load_by_guid(world, guid, EntityKind::Component)
    }

    /// Loads the actor whose record carries `guid` together with its components
    ///
    /// A live actor has its components and owned objects loaded before
    /// itself. A missing actor is respawned from its record and its missing
    /// components are respawned under it.
    pub fn load_actor_hierarchy_by_guid(&self, world: &mut World, guid: Uuid) -> SaveResult {
        let Some((key, record)) = self.record_with_guid(guid) else {
            return SaveResult::Failed;
        };
        match live_for_record(world, &record, EntityKind::Actor) {
            Some(actor) => {
                self.load_owned_by(world, actor);
                self.apply_with_hooks(world, actor, EntityKind::Actor, &record)
            }
            None if record.destroyed => SaveResult::Skipped,
            None => match self.respawn_from_record(world, &key, &record) {
                Some(actor) => {
                    self.respawn_missing_components_of(world, actor);
                    SaveResult::Success
                }
                None => SaveResult::Skipped,
            },
        }
    }

    fn record_with_guid(&self, guid: Uuid) -> Option<(String, ComplexRecord)> {
        self.data()
            .complex
            .iter()
            .find(|(_, record)| record.guid == Some(guid))
            .map(|(key, record)| (key.clone(), record.clone()))
    }

    fn load_by_guid(&self, world: &mut World, guid: Uuid, kind: EntityKind) -> SaveResult {
        let Some((key, record)) = self.record_with_guid(guid) else {
            return SaveResult::Failed;
        };
        match live_for_record(world, &record, kind) {
            Some(id) => self.apply_with_hooks(world, id, kind, &record),
            None if record.destroyed => SaveResult::Skipped,
            None => match self.respawn_from_record(world, &key, &record) {
                Some(_) => SaveResult::Success,
                None => SaveResult::Skipped,
            },
        }
    }

    pub(crate) fn load_entity(
        &self,
        world: &mut World,
        id: ObjectId,
        kind: EntityKind,
        check_scope: bool,
    ) -> SaveResult {
        match world.get(id) {
            Some(object) if object.is_live() && kind.accepts(object) => {}
            _ => return SaveResult::Failed,
        }
        if check_scope && !self.in_scope(world, id) {
            return SaveResult::Skipped;
        }
        let Some(key) = identity::identity_of(world, id) else {
            return SaveResult::Failed;
        };

        match self.config().compression {
            RecordType::Minimal => {
                let Some(record) = self.data().minimal.get(&key).cloned() else {
                    return SaveResult::Failed;
                };
                let hooks = hooks_of(world, id);
                if let (Some(hooks), Some(object)) = (&hooks, world.get_mut(id)) {
                    hooks.on_prepare_to_load(object);
                }
                self.apply_minimal_record(world, id, &record);
                self.finish_load_hooks(world, id, hooks);
                SaveResult::Success
            }
            RecordType::Complex => {
                let Some(record) = self.find_complex_record(world, id, &key) else {
                    if self.config().debug {
                        log::info!("no record for {}", key);
                    }
                    return SaveResult::Failed;
                };
                self.apply_with_hooks(world, id, kind, &record)
            }
        }
    }

    /// Record for a live entity: by key, then by GUID, then by full path
    fn find_complex_record(&self, world: &World, id: ObjectId, key: &str) -> Option<ComplexRecord> {
        let data = self.data();
        if let Some(record) = data.complex.get(key) {
            return Some(record.clone());
        }
        let object = world.get(id)?;
        if let Some(guid) = object.guid() {
            if let Some(record) = data.complex.values().find(|r| r.guid == Some(guid)) {
                return Some(record.clone());
            }
        }
        let full_name = identity::full_name(world, id)?;
        data.complex
            .values()
            .find(|r| r.full_name == full_name && r.class_path == world.classes().path_of(object.class))
            .cloned()
    }

    pub(crate) fn apply_with_hooks(&self, world: &mut World, id: ObjectId, kind: EntityKind, record: &ComplexRecord) -> SaveResult {
        let hooks = hooks_of(world, id);
        if !record.destroyed {
            if let (Some(hooks), Some(object)) = (&hooks, world.get_mut(id)) {
                hooks.on_prepare_to_load(object);
            }
        }
        let result = match kind {
            EntityKind::Object => self.unpack_object_record(world, id, record),
            EntityKind::Component => self.unpack_component_record(world, id, record),
            EntityKind::Actor => self.unpack_actor_record(world, id, record),
        };
        if result == SaveResult::Success && world.is_valid(id) {
            self.finish_load_hooks(world, id, hooks);
        }
        result
    }

    fn finish_load_hooks(&self, world: &mut World, id: ObjectId, hooks: Option<Arc<dyn Serializable>>) {
        if let (Some(hooks), Some(object)) = (&hooks, world.get_mut(id)) {
            hooks.on_loaded(object, &self.meta());
        }
        if self.config().debug {
            if let Some(key) = identity::identity_of(world, id) {
                log::info!("loaded {}", key);
            }
        }
    }

    // ======================================================================
    // Record application
    // ======================================================================

    /// Applies a complex record to a plain object
    ///
    /// A record flagged `destroyed` destroys the object instead.
    pub fn unpack_object_record(&self, world: &mut World, object: ObjectId, record: &ComplexRecord) -> SaveResult {
        if !world.is_valid(object) {
            return SaveResult::Failed;
        }
        if record.destroyed {
            world.destroy(object);
            return SaveResult::Success;
        }
        if let (Some(guid), Some(live)) = (record.guid, world.get_mut(object)) {
            identity::assign_guid_once(live, guid);
        }

        let mut resolver = RespawnResolver::new(self);
        let report = decode_properties(
            world,
            object,
            &record.properties,
            &self.inner.redirectors,
            &mut resolver,
            self.deep_logs(),
        );
        if !report.skipped.is_empty() {
            log::debug!("{}: skipped {:?}", record.full_name, report.skipped);
        }
        SaveResult::Success
    }

    pub fn unpack_component_record(&self, world: &mut World, component: ObjectId, record: &ComplexRecord) -> SaveResult {
        if !world.get(component).map(LiveObject::is_component).unwrap_or(false) {
            return SaveResult::Failed;
        }
        let result = self.unpack_object_record(world, component, record);
        if result != SaveResult::Success || record.destroyed {
            return result;
        }

        if let Some(object) = world.get_mut(component) {
            let keep_transform = object.has_tag(TAG_NO_TRANSFORM) || record.ignore_transform;
            if let Some(state) = object.component.as_mut() {
                if !keep_transform && state.movable {
                    state.transform.location = record.location;
                    state.transform.rotation = record.rotation;
                    state.transform.scale = record.scale;
                }
                state.active = record.active;
            }
        }
        SaveResult::Success
    }

    pub fn unpack_actor_record(&self, world: &mut World, actor: ObjectId, record: &ComplexRecord) -> SaveResult {
        if !world.get(actor).map(LiveObject::is_actor).unwrap_or(false) {
            return SaveResult::Failed;
        }
        let result = self.unpack_object_record(world, actor, record);
        if result != SaveResult::Success || record.destroyed {
            return result;
        }

        let is_pawn = world
            .get(actor)
            .map(|o| world.classes().is_a(o.class, ClassRegistry::PAWN))
            .unwrap_or(false);
        let skip_pawn = is_pawn && self.config().ignore_pawn_transform_on_load;

        if let Some(object) = world.get_mut(actor) {
            let keep_transform = object.has_tag(TAG_NO_TRANSFORM) || record.ignore_transform || skip_pawn;
            let keep_physics = object.has_tag(TAG_NO_PHYSICS);
            let keep_hidden = object.has_tag(TAG_NO_HIDE);
            if let Some(state) = object.actor.as_mut() {
                if state.movable && !keep_transform {
                    state.transform.location = record.location;
                    state.transform.rotation = record.rotation;
                    state.transform.scale = record.scale;
                }
                if state.movable && !keep_physics {
                    state.linear_velocity = record.linear_velocity;
                    state.angular_velocity = record.angular_velocity;
                }
                if !keep_hidden {
                    state.hidden = record.hidden_in_game;
                }
            }
        }

        if !record.outer_name.is_empty() {
            let parent = identity::resolve(world, &record.outer_name)
                .filter(|p| *p != actor && world.get(*p).map(LiveObject::is_actor).unwrap_or(false));
            if let Some(parent) = parent {
                if let Err(e) = world.attach_to(actor, Some(parent)) {
                    log::debug!("{}: could not reattach to {}: {}", record.full_name, record.outer_name, e);
                }
            }
        }
        SaveResult::Success
    }

    fn apply_minimal_record(&self, world: &mut World, id: ObjectId, record: &MinimalRecord) {
        let Some(object) = world.get_mut(id) else {
            return;
        };
        let keep_transform = object.has_tag(TAG_NO_TRANSFORM);
        let keep_hidden = object.has_tag(TAG_NO_HIDE);
        if let Some(state) = object.actor.as_mut() {
            if state.movable && !keep_transform {
                state.transform.location = record.location;
                state.transform.rotation = record.rotation;
                state.transform.scale = record.scale;
            }
            if !keep_hidden {
                state.hidden = record.hidden;
            }
        } else if let Some(state) = object.component.as_mut() {
            if state.movable && !keep_transform {
                state.transform.location = record.location;
                state.transform.rotation = record.rotation;
                state.transform.scale = record.scale;
            }
            state.active = record.active;
        }
    }

    // ======================================================================
    // Auto-destroy
    // ======================================================================

    /// Flags an object for destruction on the next load of this save
    ///
    /// Fails when the object has no `Destroyed` field.
    pub fn mark_object_auto_destroyed(&self, world: &mut World, object: ObjectId) -> SaveResult {
        mark_destroyed(world, object, EntityKind::Object)
    }

    /// Flags a component and deactivates it
    pub fn mark_component_auto_destroyed(&self, world: &mut World, component: ObjectId) -> SaveResult {
        mark_destroyed(world, component, EntityKind::Component)
    }

    /// Flags an actor and hides it
    pub fn mark_actor_auto_destroyed(&self, world: &mut World, actor: ObjectId) -> SaveResult {
        mark_destroyed(world, actor, EntityKind::Actor)
    }

    pub fn is_object_marked_auto_destroy(&self, world: &World, object: ObjectId) -> bool {
        is_marked(world, object, EntityKind::Object)
    }

    pub fn is_component_marked_auto_destroy(&self, world: &World, component: ObjectId) -> bool {
        is_marked(world, component, EntityKind::Component)
    }

    pub fn is_actor_marked_auto_destroy(&self, world: &World, actor: ObjectId) -> bool {
        is_marked(world, actor, EntityKind::Actor)
    }

    // ======================================================================
    // Helpers
    // ======================================================================

    fn in_scope(&self, world: &World, id: ObjectId) -> bool {
        let classes = world.classes();
        world
            .get(id)
            .map(|o| self.scope_filter(classes).in_scope(classes, o.class))
            .unwrap_or(false)
    }

    fn for_each(
        &self,
        world: &mut World,
        ids: Vec<ObjectId>,
        operation: fn(&Self, &mut World, ObjectId) -> SaveResult,
    ) -> SaveResult {
        let mut result = SaveResult::Skipped;
        for id in ids {
            match operation(self, world, id) {
                SaveResult::Success => result = SaveResult::Success,
                SaveResult::Failed if result == SaveResult::Skipped => result = SaveResult::Failed,
                _ => {}
            }
        }
        result
    }
}

fn of_class(world: &World, class: ClassId, kind: EntityKind) -> Vec<ObjectId> {
    world
        .iter()
        .filter(|o| o.is_live() && o.level.is_some())
        .filter(|o| EntityKind::of(o) == kind)
        .filter(|o| world.classes().is_a(o.class, class))
        .map(|o| o.id)
        .collect()
}

fn mark_destroyed(world: &mut World, id: ObjectId, kind: EntityKind) -> SaveResult {
    let Some(object) = world.get_mut(id).filter(|o| o.is_live() && kind.accepts(o)) else {
        return SaveResult::Failed;
    };
    if !object.set(DESTROYED_FIELD, Value::Bool(true)) {
        return SaveResult::Failed;
    }
    if let Some(actor) = object.actor.as_mut() {
        actor.hidden = true;
    }
    if let Some(component) = object.component.as_mut() {
        component.active = false;
    }
    SaveResult::Success
}

fn is_marked(world: &World, id: ObjectId, kind: EntityKind) -> bool {
    world
        .get(id)
        .filter(|o| kind.accepts(o))
        .map(LiveObject::is_marked_destroyed)
        .unwrap_or(false)
}
