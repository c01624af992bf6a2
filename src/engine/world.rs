// World: the registry of every live object
//
// The World owns all objects (actors, components, sub-objects, singletons) and
// the role slots the engine fills in (game instance, game mode, player, ...).
// It provides spawning, teardown, lookups by path, and ownership queries.

use super::class::{ClassId, ClassKind, ClassRegistry};
use super::object::{ActorState, ComponentState, LiveObject, ObjectId};
use super::value::Transform;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Errors raised while creating objects
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    #[error("unknown class {0:?}")]
    UnknownClass(ClassId),

    #[error("class '{class}' is not a {expected:?} class")]
    WrongKind { class: String, expected: ClassKind },

    #[error("object {0:?} not found")]
    NotFound(ObjectId),

    #[error("name '{0}' already used in this scope")]
    NameTaken(String),
}

/// Well-known objects the engine keeps track of
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldRoles {
    pub game_instance: Option<ObjectId>,
    pub game_mode: Option<ObjectId>,
    pub game_state: Option<ObjectId>,
    pub player_controller: Option<ObjectId>,
    pub player_pawn: Option<ObjectId>,
    pub player_hud: Option<ObjectId>,
    pub player_state: Option<ObjectId>,
}

/// World encapsulates all live objects and world state
pub struct World {
    pub name: String,
    persistent_level: String,
    classes: Arc<ClassRegistry>,
    objects: BTreeMap<ObjectId, LiveObject>,
    next_id: u64,
    name_counters: HashMap<ClassId, u32>,
    defaults: HashMap<ClassId, ObjectId>,
    pub roles: WorldRoles,
    pub paused: bool,
}

impl World {
    /// Creates an empty world whose persistent level is named after the world
    pub fn new(name: impl Into<String>, classes: Arc<ClassRegistry>) -> Self {
        let name = name.into();
        World {
            persistent_level: name.clone(),
            name,
            classes,
            objects: BTreeMap::new(),
            next_id: 1,
            name_counters: HashMap::new(),
            defaults: HashMap::new(),
            roles: WorldRoles::default(),
            paused: false,
        }
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn classes_arc(&self) -> Arc<ClassRegistry> {
        Arc::clone(&self.classes)
    }

    pub fn persistent_level(&self) -> &str {
        &self.persistent_level
    }

    // ======================================================================
    // Spawning
    // ======================================================================

    /// Spawns an actor into a level (the persistent level when `level` is None)
    pub fn spawn_actor(
        &mut self,
        class: ClassId,
        name: Option<&str>,
        level: Option<&str>,
        transform: Transform,
    ) -> Result<ObjectId, WorldError> {
        self.expect_kind(class, ClassKind::Actor)?;
        let level = level.unwrap_or(&self.persistent_level).to_string();
        let mut object = self.instantiate(class, name, None, Some(level))?;
        object.actor = Some(ActorState {
            transform,
            ..Default::default()
        });
        Ok(self.insert(object))
    }

    /// Creates a component owned by an actor
    pub fn spawn_component(
        &mut self,
        owner: ObjectId,
        class: ClassId,
        name: Option<&str>,
    ) -> Result<ObjectId, WorldError> {
        self.expect_kind(class, ClassKind::Component)?;
        let level = self.get(owner).ok_or(WorldError::NotFound(owner))?.level.clone();
        let mut object = self.instantiate(class, name, Some(owner), level)?;
        object.component = Some(ComponentState::new(owner));
        Ok(self.insert(object))
    }

    /// Creates a plain object inside `outer` (or directly in the persistent level)
    pub fn new_object(
        &mut self,
        outer: Option<ObjectId>,
        class: ClassId,
        name: Option<&str>,
    ) -> Result<ObjectId, WorldError> {
        self.expect_kind(class, ClassKind::Object)?;
        let level = match outer {
            Some(outer) => self.get(outer).ok_or(WorldError::NotFound(outer))?.level.clone(),
            None => Some(self.persistent_level.clone()),
        };
        let object = self.instantiate(class, name, outer, level)?;
        Ok(self.insert(object))
    }

    /// Creates the game instance singleton; it lives outside any level
    pub fn new_game_instance(&mut self, class: ClassId) -> Result<ObjectId, WorldError> {
        if !self.classes.is_a(class, ClassRegistry::GAME_INSTANCE) {
            return Err(WorldError::WrongKind {
                class: self.classes.name_of(class).to_string(),
                expected: ClassKind::Object,
            });
        }
        let object = self.instantiate(class, None, None, None)?;
        let id = self.insert(object);
        self.roles.game_instance = Some(id);
        Ok(id)
    }

    /// Class default object, created on first request
    ///
    /// Templates are flagged and never part of a save walk.
    pub fn class_default(&mut self, class: ClassId) -> Result<ObjectId, WorldError> {
        if let Some(id) = self.defaults.get(&class) {
            return Ok(*id);
        }
        let name = format!("Default__{}", self.classes.name_of(class));
        let mut object = self.instantiate(class, Some(&name), None, None)?;
        object.flags.default_object = true;
        let id = self.insert(object);
        self.defaults.insert(class, id);
        Ok(id)
    }

    fn expect_kind(&self, class: ClassId, expected: ClassKind) -> Result<(), WorldError> {
        let descriptor = self.classes.get(class).ok_or(WorldError::UnknownClass(class))?;
        if descriptor.kind != expected {
            return Err(WorldError::WrongKind {
                class: descriptor.name.clone(),
                expected,
            });
        }
        Ok(())
    }

    fn instantiate(
        &mut self,
        class: ClassId,
        name: Option<&str>,
        outer: Option<ObjectId>,
        level: Option<String>,
    ) -> Result<LiveObject, WorldError> {
        if self.classes.get(class).is_none() {
            return Err(WorldError::UnknownClass(class));
        }

        let name = match name {
            Some(name) => {
                if self.name_in_use(name, outer, level.as_deref()) {
                    return Err(WorldError::NameTaken(name.to_string()));
                }
                name.to_string()
            }
            None => self.generate_name(class, outer, level.as_deref()),
        };

        let id = ObjectId(self.next_id);
        self.next_id += 1;

        let mut object = LiveObject::new(id, name, class);
        object.outer = outer;
        object.level = level;
        object.fields = self
            .classes
            .all_fields(class)
            .map(|f| (f.name.clone(), f.default.clone()))
            .collect();
        Ok(object)
    }

    fn insert(&mut self, object: LiveObject) -> ObjectId {
        let id = object.id;
        self.objects.insert(id, object);
        id
    }

    fn name_in_use(&self, name: &str, outer: Option<ObjectId>, level: Option<&str>) -> bool {
        self.objects.values().any(|o| {
            o.name == name && o.outer == outer && (outer.is_some() || o.level.as_deref() == level)
        })
    }

    fn generate_name(&mut self, class: ClassId, outer: Option<ObjectId>, level: Option<&str>) -> String {
        let base = self.classes.name_of(class).to_string();
        loop {
            let counter = self.name_counters.entry(class).or_insert(0);
            let candidate = format!("{}_{}", base, counter);
            *counter += 1;
            if !self.name_in_use(&candidate, outer, level) {
                return candidate;
            }
        }
    }

    // ======================================================================
    // Teardown
    // ======================================================================

    /// Marks an object and everything it owns as pending destroy
    ///
    /// Returns false if the object is unknown or already being destroyed.
    pub fn destroy(&mut self, id: ObjectId) -> bool {
        match self.objects.get_mut(&id) {
            Some(object) if !object.flags.pending_destroy => object.flags.pending_destroy = true,
            _ => return false,
        }

        let owned: Vec<ObjectId> = self
            .objects
            .values()
            .filter(|o| o.outer == Some(id) || o.component.as_ref().map(|c| c.owner) == Some(id))
            .map(|o| o.id)
            .collect();
        for child in owned {
            self.destroy(child);
        }

        let roles = &mut self.roles;
        for slot in [
            &mut roles.game_instance,
            &mut roles.game_mode,
            &mut roles.game_state,
            &mut roles.player_controller,
            &mut roles.player_pawn,
            &mut roles.player_hud,
            &mut roles.player_state,
        ] {
            if *slot == Some(id) {
                *slot = None;
            }
        }
        true
    }

    /// Drops every object pending destroy; returns how many were removed
    pub fn purge_destroyed(&mut self) -> usize {
        let before = self.objects.len();
        self.objects.retain(|_, o| !o.flags.pending_destroy);
        before - self.objects.len()
    }

    // ======================================================================
    // Queries
    // ======================================================================

    pub fn get(&self, id: ObjectId) -> Option<&LiveObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut LiveObject> {
        self.objects.get_mut(&id)
    }

    /// True if the object exists and is not being destroyed
    pub fn is_valid(&self, id: ObjectId) -> bool {
        self.get(id).map(|o| !o.flags.pending_destroy).unwrap_or(false)
    }

    /// All objects in registry (creation) order
    pub fn iter(&self) -> impl Iterator<Item = &LiveObject> {
        self.objects.values()
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Full object path: `<Level>:<Outermost>.<...>.<Name>`
    ///
    /// Objects outside any level use `Transient` as their level part.
    pub fn path_of(&self, id: ObjectId) -> Option<String> {
        let object = self.get(id)?;
        let mut names = vec![object.name.clone()];
        let mut cursor = object.outer;
        while let Some(outer) = cursor {
            let parent = self.get(outer)?;
            names.push(parent.name.clone());
            cursor = parent.outer;
        }
        names.reverse();
        let level = object.level.as_deref().unwrap_or("Transient");
        Some(format!("{}:{}", level, names.join(".")))
    }

    /// Finds a live (non-template, not destroyed) object by full path
    pub fn find_by_path(&self, path: &str) -> Option<ObjectId> {
        self.iter()
            .filter(|o| o.is_live())
            .find(|o| self.path_of(o.id).as_deref() == Some(path))
            .map(|o| o.id)
    }

    /// Finds a live object by name inside an outer (or a level, for outer-less objects)
    pub fn find_named(&self, name: &str, outer: Option<ObjectId>, level: Option<&str>) -> Option<ObjectId> {
        self.iter()
            .filter(|o| o.is_live())
            .find(|o| {
                o.name == name && o.outer == outer && (outer.is_some() || o.level.as_deref() == level)
            })
            .map(|o| o.id)
    }

    /// Plain objects (not components) whose outer is `id`
    pub fn sub_objects_of(&self, id: ObjectId) -> Vec<ObjectId> {
        self.iter()
            .filter(|o| o.outer == Some(id) && !o.is_component())
            .map(|o| o.id)
            .collect()
    }

    pub fn components_of(&self, actor: ObjectId) -> Vec<ObjectId> {
        self.iter()
            .filter(|o| o.component.as_ref().map(|c| c.owner) == Some(actor))
            .map(|o| o.id)
            .collect()
    }

    /// Actors whose attach parent is `actor`
    pub fn attached_actors_of(&self, actor: ObjectId) -> Vec<ObjectId> {
        self.iter()
            .filter(|o| o.actor.as_ref().and_then(|a| a.attach_parent) == Some(actor))
            .map(|o| o.id)
            .collect()
    }

    /// Owning actor of an object: itself for actors, the owner for components,
    /// the first actor in the outer chain for plain objects
    pub fn owning_actor(&self, id: ObjectId) -> Option<ObjectId> {
        let object = self.get(id)?;
        if object.is_actor() {
            return Some(id);
        }
        if let Some(component) = &object.component {
            return Some(component.owner);
        }
        object.outer.and_then(|outer| self.owning_actor(outer))
    }

    /// Attaches an actor to another; `None` detaches it
    pub fn attach_to(&mut self, child: ObjectId, parent: Option<ObjectId>) -> Result<(), WorldError> {
        if let Some(parent) = parent {
            if !self.get(parent).map(|o| o.is_actor()).unwrap_or(false) {
                return Err(WorldError::NotFound(parent));
            }
        }
        let actor = self
            .get_mut(child)
            .and_then(|o| o.actor.as_mut())
            .ok_or(WorldError::NotFound(child))?;
        actor.attach_parent = parent;
        Ok(())
    }
}
