//! Record types: the flattened, persisted snapshot of one entity
//!
//! Two variants exist. A `MinimalRecord` stores only spatial and visibility
//! state. A `ComplexRecord` additionally stores identity (path, class, outer,
//! GUID) and every persistent field, which is what makes respawn possible.

use crate::engine::{Rotator, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Serialized reference to another entity
///
/// Never a raw handle: `key` is the referenced entity's identity string,
/// `class_path` its class at save time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
    pub class_path: String,
    pub is_null: bool,
}

impl ObjectRef {
    pub fn null() -> Self {
        ObjectRef {
            is_null: true,
            ..Default::default()
        }
    }
}

/// Serialized value of one persistent field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Vector(Vector3),
    Rotator(Rotator),
    Guid(Uuid),
    Object(ObjectRef),
    Array(Vec<PropertyValue>),
    Set(Vec<PropertyValue>),
    Map(Vec<(PropertyValue, PropertyValue)>),
    Struct(BTreeMap<String, PropertyValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalRecord {
    pub active: bool,
    pub hidden: bool,
    pub location: Vector3,
    pub rotation: Rotator,
    pub scale: Vector3,
}

impl Default for MinimalRecord {
    fn default() -> Self {
        MinimalRecord {
            active: true,
            hidden: false,
            location: Vector3::ZERO,
            rotation: Rotator::default(),
            scale: Vector3::ONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexRecord {
    /// `<Level>:<Outermost>.<...>.<Name>` of the entity at save time
    pub full_name: String,
    pub class_path: String,
    /// Identity key of the owning actor (components, attached actors) or outer (objects)
    pub outer_name: String,
    pub guid: Option<Uuid>,

    pub active: bool,
    pub hidden_in_game: bool,
    pub ignore_transform: bool,
    pub destroyed: bool,

    pub location: Vector3,
    pub rotation: Rotator,
    pub scale: Vector3,
    pub linear_velocity: Vector3,
    pub angular_velocity: Vector3,

    /// Sanitized field name to value
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Default for ComplexRecord {
    fn default() -> Self {
        ComplexRecord {
            full_name: String::new(),
            class_path: String::new(),
            outer_name: String::new(),
            guid: None,
            active: true,
            hidden_in_game: false,
            ignore_transform: false,
            destroyed: false,
            location: Vector3::ZERO,
            rotation: Rotator::default(),
            scale: Vector3::ONE,
            linear_velocity: Vector3::ZERO,
            angular_velocity: Vector3::ZERO,
            properties: BTreeMap::new(),
        }
    }
}

impl ComplexRecord {
    /// Object name: last path segment of `full_name`
    pub fn object_name(&self) -> &str {
        let path = self.full_name.rsplit(':').next().unwrap_or(&self.full_name);
        path.rsplit('.').next().unwrap_or(path)
    }

    /// Full name of the owner: `full_name` without its last segment
    pub fn outer_path(&self) -> Option<String> {
        let (level, path) = self.full_name.split_once(':')?;
        let (outer, _) = path.rsplit_once('.')?;
        Some(format!("{}:{}", level, outer))
    }

    /// Level part of `full_name`
    pub fn level_name(&self) -> &str {
        match self.full_name.split_once(':') {
            Some((level, _)) => level,
            None => "",
        }
    }
}
