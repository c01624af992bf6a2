//! Class registry and reflected field descriptors
//!
//! Every persistable type is described once, at startup, by a `ClassDescriptor`:
//! its parent class, its kind (plain object, actor, component), the fields it
//! declares and which of them are tagged for persistence. The save system never
//! looks at Rust types directly; it only walks these descriptors.
//!
//! # Example
//!
//! ```ignore
//! let mut classes = ClassRegistry::new();
//! let door = classes.register(
//!     ClassBuilder::new("Door")
//!         .parent(ClassRegistry::ACTOR)
//!         .persistent("Health", FieldType::Int)
//!         .procedural(),
//! )?;
//! ```

use super::hooks::Serializable;
use super::value::{Rotator, Value, Vector3};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Name of the tagged field holding an entity's persistent GUID
pub const GUID_FIELD: &str = "SGUID";

/// Name of the tagged boolean field used for auto-destroy marking
pub const DESTROYED_FIELD: &str = "Destroyed";

/// Handle into the class registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

/// Broad category of a class, inherited from its root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Object,
    Actor,
    Component,
}

/// Declared type of a reflected field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Bool,
    Int,
    Float,
    Str,
    Name,
    Vector,
    Rotator,
    Guid,
    /// Reference to a live object whose class is-a the given class
    Object(ClassId),
    Array(Box<FieldType>),
    Set(Box<FieldType>),
    Map(Box<FieldType>, Box<FieldType>),
    Struct(Vec<FieldDescriptor>),
}

impl FieldType {
    pub fn array(inner: FieldType) -> Self {
        FieldType::Array(Box::new(inner))
    }

    pub fn set(inner: FieldType) -> Self {
        FieldType::Set(Box::new(inner))
    }

    pub fn map(key: FieldType, value: FieldType) -> Self {
        FieldType::Map(Box::new(key), Box::new(value))
    }

    /// Zero value a freshly spawned object starts with
    pub fn default_value(&self) -> Value {
        match self {
            FieldType::Bool => Value::Bool(false),
            FieldType::Int => Value::Int(0),
            FieldType::Float => Value::Float(0.0),
            FieldType::Str => Value::Str(String::new()),
            FieldType::Name => Value::Name(String::new()),
            FieldType::Vector => Value::Vector(Vector3::ZERO),
            FieldType::Rotator => Value::Rotator(Rotator::default()),
            FieldType::Guid => Value::Guid(Uuid::nil()),
            FieldType::Object(_) => Value::Object(None),
            FieldType::Array(_) => Value::Array(Vec::new()),
            FieldType::Set(_) => Value::Set(Vec::new()),
            FieldType::Map(_, _) => Value::Map(Vec::new()),
            FieldType::Struct(fields) => Value::Struct(
                fields
                    .iter()
                    .map(|f| (f.name.clone(), f.default.clone()))
                    .collect::<BTreeMap<_, _>>(),
            ),
        }
    }
}

/// One field declared on a class
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: FieldType,
    /// Tagged for persistence
    pub persistent: bool,
    pub default: Value,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: FieldType, persistent: bool) -> Self {
        let default = ty.default_value();
        FieldDescriptor {
            name: name.into(),
            ty,
            persistent,
            default,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }
}

/// Registered description of a class
pub struct ClassDescriptor {
    pub id: ClassId,
    pub name: String,
    pub path: String,
    pub parent: Option<ClassId>,
    pub kind: ClassKind,
    pub fields: Vec<FieldDescriptor>,
    pub hooks: Option<Arc<dyn Serializable>>,
    pub procedural: bool,
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("parent", &self.parent)
            .field("kind", &self.kind)
            .field("fields", &self.fields.len())
            .field("serializable", &self.hooks.is_some())
            .field("procedural", &self.procedural)
            .finish()
    }
}

/// Builder used to register a class
pub struct ClassBuilder {
    name: String,
    module: String,
    parent: ClassId,
    fields: Vec<FieldDescriptor>,
    hooks: Option<Arc<dyn Serializable>>,
    procedural: bool,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ClassBuilder {
            name: name.into(),
            module: "Game".to_string(),
            parent: ClassRegistry::OBJECT,
            fields: Vec::new(),
            hooks: None,
            procedural: false,
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn parent(mut self, parent: ClassId) -> Self {
        self.parent = parent;
        self
    }

    /// Declares a field tagged for persistence
    pub fn persistent(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDescriptor::new(name, ty, true));
        self
    }

    /// Declares a runtime-only field
    pub fn transient(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDescriptor::new(name, ty, false));
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds the tagged `SGUID` field that gives instances a persistent identity
    pub fn with_guid(self) -> Self {
        self.persistent(GUID_FIELD, FieldType::Guid)
    }

    /// Adds the tagged `Destroyed` flag used by auto-destroy marking
    pub fn with_destroyed_flag(self) -> Self {
        self.persistent(DESTROYED_FIELD, FieldType::Bool)
    }

    pub fn serializable(mut self, hooks: Arc<dyn Serializable>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Opts the class into runtime respawn
    pub fn procedural(mut self) -> Self {
        self.procedural = true;
        self
    }
}

/// Errors raised while registering classes
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassError {
    #[error("class '{0}' already registered")]
    AlreadyRegistered(String),

    #[error("unknown parent class {0:?}")]
    UnknownParent(ClassId),

    #[error("field '{field}' declared twice in the hierarchy of '{class}'")]
    DuplicateField { class: String, field: String },
}

/// Central registry of every class the world can instantiate
///
/// The first ten entries are the built-in engine roots; their ids are the
/// associated constants below.
pub struct ClassRegistry {
    classes: Vec<ClassDescriptor>,
    by_path: HashMap<String, ClassId>,
    by_name: HashMap<String, ClassId>,
}

impl ClassRegistry {
    pub const OBJECT: ClassId = ClassId(0);
    pub const ACTOR: ClassId = ClassId(1);
    pub const COMPONENT: ClassId = ClassId(2);
    pub const GAME_INSTANCE: ClassId = ClassId(3);
    pub const GAME_MODE: ClassId = ClassId(4);
    pub const GAME_STATE: ClassId = ClassId(5);
    pub const PLAYER_CONTROLLER: ClassId = ClassId(6);
    pub const PLAYER_STATE: ClassId = ClassId(7);
    pub const PAWN: ClassId = ClassId(8);
    pub const HUD: ClassId = ClassId(9);

    /// Creates a registry holding the built-in engine classes
    pub fn new() -> Self {
        let mut registry = ClassRegistry {
            classes: Vec::new(),
            by_path: HashMap::new(),
            by_name: HashMap::new(),
        };

        registry.push_builtin("Object", None, ClassKind::Object);
        registry.push_builtin("Actor", Some(Self::OBJECT), ClassKind::Actor);
        registry.push_builtin("Component", Some(Self::OBJECT), ClassKind::Component);
        registry.push_builtin("GameInstance", Some(Self::OBJECT), ClassKind::Object);
        registry.push_builtin("GameMode", Some(Self::ACTOR), ClassKind::Actor);
        registry.push_builtin("GameState", Some(Self::ACTOR), ClassKind::Actor);
        registry.push_builtin("PlayerController", Some(Self::ACTOR), ClassKind::Actor);
        registry.push_builtin("PlayerState", Some(Self::ACTOR), ClassKind::Actor);
        registry.push_builtin("Pawn", Some(Self::ACTOR), ClassKind::Actor);
        registry.push_builtin("Hud", Some(Self::ACTOR), ClassKind::Actor);

        registry
    }

    fn push_builtin(&mut self, name: &str, parent: Option<ClassId>, kind: ClassKind) {
        let id = ClassId(self.classes.len() as u32);
        let path = format!("/Script/Engine.{}", name);
        self.by_path.insert(path.clone(), id);
        self.by_name.insert(name.to_string(), id);
        self.classes.push(ClassDescriptor {
            id,
            name: name.to_string(),
            path,
            parent,
            kind,
            fields: Vec::new(),
            hooks: None,
            procedural: false,
        });
    }

    /// Registers a new class
    ///
    /// Field names must be unique across the whole inheritance chain so that
    /// a record key always maps to exactly one field.
    pub fn register(&mut self, builder: ClassBuilder) -> Result<ClassId, ClassError> {
        let path = format!("/{}/{}.{}", builder.module, builder.module, builder.name);
        if self.by_path.contains_key(&path) || self.by_name.contains_key(&builder.name) {
            return Err(ClassError::AlreadyRegistered(builder.name));
        }

        let parent = self
            .get(builder.parent)
            .ok_or(ClassError::UnknownParent(builder.parent))?;
        let kind = parent.kind;

        for field in &builder.fields {
            let clashes = self.all_fields(builder.parent).any(|f| f.name == field.name)
                || builder.fields.iter().filter(|f| f.name == field.name).count() > 1;
            if clashes {
                return Err(ClassError::DuplicateField {
                    class: builder.name,
                    field: field.name.clone(),
                });
            }
        }

        let id = ClassId(self.classes.len() as u32);
        self.by_path.insert(path.clone(), id);
        self.by_name.insert(builder.name.clone(), id);
        self.classes.push(ClassDescriptor {
            id,
            name: builder.name,
            path,
            parent: Some(builder.parent),
            kind,
            fields: builder.fields,
            hooks: builder.hooks,
            procedural: builder.procedural,
        });

        Ok(id)
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassDescriptor> {
        self.classes.get(id.0 as usize)
    }

    pub fn find_by_path(&self, path: &str) -> Option<ClassId> {
        self.by_path.get(path).copied()
    }

    pub fn find_by_name(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// Looks up a class by path first, then by short name
    pub fn resolve(&self, path_or_name: &str) -> Option<ClassId> {
        self.find_by_path(path_or_name)
            .or_else(|| self.find_by_name(path_or_name))
    }

    pub fn name_of(&self, id: ClassId) -> &str {
        self.get(id).map(|c| c.name.as_str()).unwrap_or("None")
    }

    pub fn path_of(&self, id: ClassId) -> &str {
        self.get(id).map(|c| c.path.as_str()).unwrap_or("None")
    }

    pub fn kind_of(&self, id: ClassId) -> ClassKind {
        self.get(id).map(|c| c.kind).unwrap_or(ClassKind::Object)
    }

    /// Derived-class-inclusive membership check
    pub fn is_a(&self, class: ClassId, ancestor: ClassId) -> bool {
        self.ancestry(class).any(|c| c == ancestor)
    }

    /// The class itself followed by its parents up to the root
    pub fn ancestry(&self, class: ClassId) -> impl Iterator<Item = ClassId> + '_ {
        std::iter::successors(self.get(class).map(|c| c.id), move |id| {
            self.get(*id).and_then(|c| c.parent)
        })
    }

    /// Every declared field, base class first, in declaration order
    pub fn all_fields(&self, class: ClassId) -> impl Iterator<Item = &FieldDescriptor> + '_ {
        let mut chain: Vec<ClassId> = self.ancestry(class).collect();
        chain.reverse();
        chain
            .into_iter()
            .filter_map(move |id| self.get(id))
            .flat_map(|c| c.fields.iter())
    }

    /// Fields tagged for persistence, in the same stable order as `all_fields`
    pub fn persistent_fields(&self, class: ClassId) -> impl Iterator<Item = &FieldDescriptor> + '_ {
        self.all_fields(class).filter(|f| f.persistent)
    }

    pub fn find_field(&self, class: ClassId, name: &str) -> Option<&FieldDescriptor> {
        self.all_fields(class).find(|f| f.name == name)
    }

    /// Serializable capability query, inherited from the closest ancestor
    pub fn hooks(&self, class: ClassId) -> Option<Arc<dyn Serializable>> {
        self.ancestry(class)
            .filter_map(|id| self.get(id))
            .find_map(|c| c.hooks.clone())
    }

    /// Procedural capability query, inherited from any ancestor
    pub fn is_procedural(&self, class: ClassId) -> bool {
        self.ancestry(class)
            .filter_map(|id| self.get(id))
            .any(|c| c.procedural)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_door() -> (ClassRegistry, ClassId, ClassId) {
        let mut classes = ClassRegistry::new();
        let door = classes
            .register(
                ClassBuilder::new("Door")
                    .parent(ClassRegistry::ACTOR)
                    .persistent("Health", FieldType::Int)
                    .transient("Cache", FieldType::Int),
            )
            .unwrap();
        let vault = classes
            .register(
                ClassBuilder::new("VaultDoor")
                    .parent(door)
                    .persistent("Code", FieldType::Str)
                    .procedural(),
            )
            .unwrap();
        (classes, door, vault)
    }

    #[test]
    fn test_is_a_is_derived_inclusive() {
        let (classes, door, vault) = registry_with_door();
        assert!(classes.is_a(vault, door));
        assert!(classes.is_a(vault, ClassRegistry::ACTOR));
        assert!(classes.is_a(door, door));
        assert!(!classes.is_a(door, vault));
        assert!(!classes.is_a(door, ClassRegistry::COMPONENT));
    }

    #[test]
    fn test_kind_is_inherited_from_root() {
        let (classes, _, vault) = registry_with_door();
        assert_eq!(classes.kind_of(vault), ClassKind::Actor);
        assert_eq!(classes.kind_of(ClassRegistry::GAME_INSTANCE), ClassKind::Object);
    }

    #[test]
    fn test_persistent_fields_base_first() {
        let (classes, _, vault) = registry_with_door();
        let names: Vec<_> = classes
            .persistent_fields(vault)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["Health", "Code"]);
    }

    #[test]
    fn test_duplicate_field_in_hierarchy_rejected() {
        let (mut classes, door, _) = registry_with_door();
        let result = classes.register(
            ClassBuilder::new("BadDoor")
                .parent(door)
                .persistent("Health", FieldType::Float),
        );
        assert!(matches!(result, Err(ClassError::DuplicateField { .. })));
    }

    #[test]
    fn test_procedural_is_inherited() {
        let (mut classes, door, vault) = registry_with_door();
        let tiny = classes
            .register(ClassBuilder::new("TinyVault").parent(vault))
            .unwrap();
        assert!(classes.is_procedural(tiny));
        assert!(!classes.is_procedural(door));
    }

    #[test]
    fn test_resolve_by_path_or_name() {
        let (classes, door, _) = registry_with_door();
        assert_eq!(classes.resolve("/Game/Game.Door"), Some(door));
        assert_eq!(classes.resolve("Door"), Some(door));
        assert_eq!(classes.resolve("/Script/Engine.Actor"), Some(ClassRegistry::ACTOR));
        assert_eq!(classes.resolve("Missing"), None);
    }
}
