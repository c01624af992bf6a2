//! Runtime field values held by live objects
//!
//! A `Value` is what a reflected field contains while the game is running.
//! Object references are raw `ObjectId` handles here; they only make sense
//! inside the current process and are never written to a slot as-is.

use super::object::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A 3D vector (location, scale, velocity)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Vector3 = Vector3 { x: 1.0, y: 1.0, z: 1.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vector3 { x, y, z }
    }
}

/// Pitch/yaw/roll in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotator {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Rotator {
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Rotator { pitch, yaw, roll }
    }
}

/// Location, rotation and scale of an actor or scene component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub location: Vector3,
    pub rotation: Rotator,
    pub scale: Vector3,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            location: Vector3::ZERO,
            rotation: Rotator::default(),
            scale: Vector3::ONE,
        }
    }
}

impl Transform {
    pub fn at(location: Vector3) -> Self {
        Transform {
            location,
            ..Default::default()
        }
    }
}

/// The value of one reflected field
///
/// Sets and maps are kept as vectors so insertion order survives a
/// round-trip; uniqueness is enforced by `insert_unique` and the codec.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Vector(Vector3),
    Rotator(Rotator),
    Guid(Uuid),
    Object(Option<ObjectId>),
    Array(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) | Value::Name(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_guid(&self) -> Option<Uuid> {
        match self {
            Value::Guid(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(v) => *v,
            _ => None,
        }
    }
}

/// Pushes `value` into a set-like vector unless an equal element is present
pub fn insert_unique(set: &mut Vec<Value>, value: Value) -> bool {
    if set.contains(&value) {
        return false;
    }
    set.push(value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_default_has_unit_scale() {
        let transform = Transform::default();
        assert_eq!(transform.scale, Vector3::ONE);
        assert_eq!(transform.location, Vector3::ZERO);
    }

    #[test]
    fn test_insert_unique_rejects_duplicates() {
        let mut set = vec![Value::Int(1)];
        assert!(!insert_unique(&mut set, Value::Int(1)));
        assert!(insert_unique(&mut set, Value::Int(2)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_accessors_match_variant() {
        assert_eq!(Value::Int(80).as_int(), Some(80));
        assert_eq!(Value::Float(1.5).as_int(), None);
        assert_eq!(Value::Name("Door".into()).as_str(), Some("Door"));
        assert_eq!(Value::Object(None).as_object(), None);
    }
}
