//! Scope filter and world walker
//!
//! The walker enumerates live objects in registry order and decides, per
//! object, which serializer handles it. The scope filter decides whether an
//! object's class is persisted at all.

use super::config::SlotConfig;
use crate::engine::{ClassId, ClassRegistry, LiveObject, ObjectId, World};
use std::collections::HashSet;

/// Class scopes resolved against a registry
#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    pub objects: Vec<ClassId>,
    pub actors: Vec<ClassId>,
    pub components: Vec<ClassId>,
    pub respawn: Vec<ClassId>,
}

impl ScopeFilter {
    /// Resolves the configured class paths; unknown entries are logged and ignored
    pub fn from_config(config: &SlotConfig, classes: &ClassRegistry) -> Self {
        let resolve = |paths: &[String]| -> Vec<ClassId> {
            paths
                .iter()
                .filter_map(|path| {
                    let class = classes.resolve(path);
                    if class.is_none() {
                        log::warn!("scope class '{}' is not registered", path);
                    }
                    class
                })
                .collect()
        };
        ScopeFilter {
            objects: resolve(&config.object_scope),
            actors: resolve(&config.actor_scope),
            components: resolve(&config.component_scope),
            respawn: resolve(&config.respawn_scope),
        }
    }

    /// True if `class` is-a any class of the object, actor or component scope
    pub fn in_scope(&self, classes: &ClassRegistry, class: ClassId) -> bool {
        self.objects
            .iter()
            .chain(&self.actors)
            .chain(&self.components)
            .any(|scope| classes.is_a(class, *scope))
    }

    /// True if `class` may be respawned; an empty respawn scope allows all
    pub fn can_respawn(&self, classes: &ClassRegistry, class: ClassId) -> bool {
        self.respawn.is_empty() || self.respawn.iter().any(|scope| classes.is_a(class, *scope))
    }
}

/// What part of the world an operation covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Walk {
    World,
    /// Objects whose level name contains this text, ignoring case
    Level(String),
    /// Game mode, game state and the local player's objects
    GameMode,
    GameInstance,
}

/// One walked object and the serializer that handles it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    GameInstance(ObjectId),
    ActorHierarchy(ObjectId),
    Component(ObjectId),
    ObjectHierarchy(ObjectId),
    Object(ObjectId),
}

impl Target {
    pub fn id(self) -> ObjectId {
        match self {
            Target::GameInstance(id)
            | Target::ActorHierarchy(id)
            | Target::Component(id)
            | Target::ObjectHierarchy(id)
            | Target::Object(id) => id,
        }
    }
}

/// Objects a walk visits, in registry order
///
/// Components and owned objects reached through a hierarchy target are not
/// listed again on their own.
pub fn collect_targets(world: &World, filter: &ScopeFilter, walk: &Walk) -> Vec<Target> {
    without_covered(world, walked(world, filter, walk))
}

fn walked(world: &World, filter: &ScopeFilter, walk: &Walk) -> Vec<Target> {
    let classes = world.classes();
    match walk {
        Walk::World => world
            .iter()
            .filter(|o| o.is_live())
            .filter_map(|o| {
                if classes.is_a(o.class, ClassRegistry::GAME_INSTANCE) {
                    return Some(Target::GameInstance(o.id));
                }
                if o.level.is_none() || !filter.in_scope(classes, o.class) {
                    return None;
                }
                Some(route(o, false))
            })
            .collect(),

        Walk::Level(level) => {
            let needle = level.to_lowercase();
            world
                .iter()
                .filter(|o| o.is_live())
                .filter(|o| {
                    o.level
                        .as_deref()
                        .map(|l| l.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
                .filter(|o| filter.in_scope(classes, o.class))
                .map(|o| route(o, true))
                .collect()
        }

        Walk::GameMode => {
            let roles = &world.roles;
            [
                roles.game_mode,
                roles.game_state,
                roles.player_controller,
                roles.player_pawn,
                roles.player_hud,
                roles.player_state,
            ]
            .into_iter()
            .flatten()
            .filter(|id| world.is_valid(*id))
            .filter(|id| world.get(*id).map(|o| filter.in_scope(classes, o.class)).unwrap_or(false))
            .map(Target::ActorHierarchy)
            .collect()
        }

        Walk::GameInstance => world
            .roles
            .game_instance
            .filter(|id| world.is_valid(*id))
            .map(Target::GameInstance)
            .into_iter()
            .collect(),
    }
}

fn without_covered(world: &World, targets: Vec<Target>) -> Vec<Target> {
    let hierarchies: HashSet<ObjectId> = targets
        .iter()
        .filter_map(|target| match target {
            Target::ActorHierarchy(id) | Target::ObjectHierarchy(id) => Some(*id),
            _ => None,
        })
        .collect();
    if hierarchies.is_empty() {
        return targets;
    }
    targets
        .into_iter()
        .filter(|target| match target {
            Target::GameInstance(_) | Target::ActorHierarchy(_) => true,
            other => !has_hierarchy_ancestor(world, other.id(), &hierarchies),
        })
        .collect()
}

/// True if the owner or outer chain of `id` contains a hierarchy target
fn has_hierarchy_ancestor(world: &World, id: ObjectId, hierarchies: &HashSet<ObjectId>) -> bool {
    let parent_of = |id: ObjectId| {
        world
            .get(id)
            .and_then(|o| o.component.as_ref().map(|c| c.owner).or(o.outer))
    };
    std::iter::successors(parent_of(id), |id| parent_of(*id)).any(|ancestor| hierarchies.contains(&ancestor))
}

fn route(object: &LiveObject, flat_objects: bool) -> Target {
    if object.is_component() {
        Target::Component(object.id)
    } else if object.is_actor() {
        Target::ActorHierarchy(object.id)
    } else if flat_objects {
        Target::Object(object.id)
    } else {
        Target::ObjectHierarchy(object.id)
    }
}

/// Number of objects a walk will process
pub fn calculate_workload(world: &World, filter: &ScopeFilter, walk: &Walk) -> usize {
    collect_targets(world, filter, walk).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ClassBuilder, FieldType, Transform};
    use std::sync::Arc;

    struct Fixture {
        world: World,
        door: ClassId,
        rock: ClassId,
        note: ClassId,
    }

    fn fixture() -> Fixture {
        let mut classes = ClassRegistry::new();
        let door = classes
            .register(ClassBuilder::new("Door").parent(ClassRegistry::ACTOR))
            .unwrap();
        let rock = classes
            .register(ClassBuilder::new("Rock").parent(ClassRegistry::ACTOR))
            .unwrap();
        let note = classes
            .register(ClassBuilder::new("Note").persistent("Text", FieldType::Str))
            .unwrap();
        Fixture {
            world: World::new("Dungeon", Arc::new(classes)),
            door,
            rock,
            note,
        }
    }

    fn door_only(classes: &ClassRegistry) -> ScopeFilter {
        let config = SlotConfig {
            actor_scope: vec!["Door".to_string()],
            component_scope: Vec::new(),
            ..Default::default()
        };
        ScopeFilter::from_config(&config, classes)
    }

    #[test]
    fn test_out_of_scope_objects_are_not_walked() {
        let mut f = fixture();
        let door = f.world.spawn_actor(f.door, None, None, Transform::default()).unwrap();
        f.world.spawn_actor(f.rock, None, None, Transform::default()).unwrap();
        let filter = door_only(f.world.classes());

        let targets = collect_targets(&f.world, &filter, &Walk::World);
        assert_eq!(targets, vec![Target::ActorHierarchy(door)]);
        assert_eq!(calculate_workload(&f.world, &filter, &Walk::World), 1);
    }

    #[test]
    fn test_any_scope_qualifies_an_object() {
        let mut f = fixture();
        let rock = f.world.spawn_actor(f.rock, None, None, Transform::default()).unwrap();
        let config = SlotConfig {
            actor_scope: Vec::new(),
            component_scope: vec!["Rock".to_string()],
            ..Default::default()
        };
        let filter = ScopeFilter::from_config(&config, f.world.classes());
        assert_eq!(collect_targets(&f.world, &filter, &Walk::World), vec![Target::ActorHierarchy(rock)]);
    }

    #[test]
    fn test_templates_and_destroyed_are_excluded() {
        let mut f = fixture();
        f.world.class_default(f.door).unwrap();
        let doomed = f.world.spawn_actor(f.door, None, None, Transform::default()).unwrap();
        f.world.destroy(doomed);
        let filter = door_only(f.world.classes());
        assert!(collect_targets(&f.world, &filter, &Walk::World).is_empty());
    }

    #[test]
    fn test_game_instance_always_routed_to_singleton() {
        let mut f = fixture();
        let instance = f.world.new_game_instance(ClassRegistry::GAME_INSTANCE).unwrap();
        let filter = door_only(f.world.classes());
        assert_eq!(
            collect_targets(&f.world, &filter, &Walk::World),
            vec![Target::GameInstance(instance)]
        );
        assert_eq!(
            collect_targets(&f.world, &filter, &Walk::GameInstance),
            vec![Target::GameInstance(instance)]
        );
    }

    #[test]
    fn test_level_walk_matches_case_insensitively() {
        let mut f = fixture();
        let cellar = f.world.spawn_actor(f.door, None, Some("Cellar_Sub"), Transform::default()).unwrap();
        f.world.spawn_actor(f.door, None, None, Transform::default()).unwrap();
        let note = f.world.new_object(Some(cellar), f.note, None).unwrap();
        let config = SlotConfig {
            object_scope: vec!["Note".to_string()],
            ..Default::default()
        };
        let filter = ScopeFilter::from_config(&config, f.world.classes());

        let targets = collect_targets(&f.world, &filter, &Walk::Level("cellar".to_string()));
        assert_eq!(targets, vec![Target::ActorHierarchy(cellar)]);
        assert!(!targets.contains(&Target::Object(note)));
    }

    #[test]
    fn test_owned_objects_are_walked_once_through_their_actor() {
        let mut classes = ClassRegistry::new();
        let door = classes
            .register(ClassBuilder::new("Door").parent(ClassRegistry::ACTOR))
            .unwrap();
        let lever = classes
            .register(ClassBuilder::new("Lever").parent(ClassRegistry::COMPONENT))
            .unwrap();
        let note = classes
            .register(ClassBuilder::new("Note").persistent("Text", FieldType::Str))
            .unwrap();
        let mut world = World::new("Dungeon", Arc::new(classes));
        let actor = world.spawn_actor(door, None, None, Transform::default()).unwrap();
        let component = world.spawn_component(actor, lever, None).unwrap();
        let owned = world.new_object(Some(component), note, None).unwrap();
        let loose = world.new_object(None, note, None).unwrap();
        let inner = world.new_object(Some(loose), note, None).unwrap();
        let config = SlotConfig {
            object_scope: vec!["Note".to_string()],
            ..Default::default()
        };
        let filter = ScopeFilter::from_config(&config, world.classes());

        let targets = collect_targets(&world, &filter, &Walk::World);
        assert_eq!(
            targets,
            vec![Target::ActorHierarchy(actor), Target::ObjectHierarchy(loose)]
        );
        for covered in [component, owned, inner] {
            assert!(!targets.iter().any(|t| t.id() == covered));
        }
        assert_eq!(calculate_workload(&world, &filter, &Walk::World), 2);
    }

    #[test]
    fn test_game_mode_walk_uses_roles() {
        let mut f = fixture();
        let mode = f.world.spawn_actor(ClassRegistry::GAME_MODE, None, None, Transform::default()).unwrap();
        let pawn = f.world.spawn_actor(ClassRegistry::PAWN, None, None, Transform::default()).unwrap();
        f.world.spawn_actor(f.door, None, None, Transform::default()).unwrap();
        f.world.roles.game_mode = Some(mode);
        f.world.roles.player_pawn = Some(pawn);
        let filter = ScopeFilter::from_config(&SlotConfig::default(), f.world.classes());

        assert_eq!(
            collect_targets(&f.world, &filter, &Walk::GameMode),
            vec![Target::ActorHierarchy(mode), Target::ActorHierarchy(pawn)]
        );
    }

    #[test]
    fn test_respawn_scope_empty_allows_all() {
        let f = fixture();
        let filter = ScopeFilter::default();
        assert!(filter.can_respawn(f.world.classes(), f.door));
        let restricted = ScopeFilter {
            respawn: vec![f.rock],
            ..Default::default()
        };
        assert!(!restricted.can_respawn(f.world.classes(), f.door));
    }
}
