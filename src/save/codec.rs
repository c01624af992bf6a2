//! Record codec: persistent fields <-> flat property map
//!
//! Encoding walks the persistent fields of an object's class (inherited
//! first) and turns each value into a `PropertyValue`. References become
//! `ObjectRef`s carrying the target's identity key, never a handle.
//!
//! Decoding is best-effort. A key that matches no field is retried once
//! through the redirector table; a key that still matches nothing, or whose
//! value has the wrong shape, is skipped without affecting the other fields.

use super::identity::{self, assign_guid_once};
use super::record::{ObjectRef, PropertyValue};
use super::redirector::Redirectors;
use crate::engine::value::insert_unique;
use crate::engine::{ClassId, FieldDescriptor, FieldType, LiveObject, ObjectId, Value, World, GUID_FIELD};
use std::collections::BTreeMap;

/// Turns a serialized reference back into a live object
///
/// The slot implements this with respawn support; `LookupOnly` only
/// searches the live world.
pub trait ReferenceResolver {
    fn resolve_reference(
        &mut self,
        world: &mut World,
        reference: &ObjectRef,
        declared: ClassId,
        referrer: ObjectId,
    ) -> Option<ObjectId>;
}

/// Resolves references by GUID, then by key, and never creates anything
pub struct LookupOnly;

impl ReferenceResolver for LookupOnly {
    fn resolve_reference(
        &mut self,
        world: &mut World,
        reference: &ObjectRef,
        declared: ClassId,
        _referrer: ObjectId,
    ) -> Option<ObjectId> {
        lookup_reference(world, reference, declared)
    }
}

/// Live object a reference points at, if it exists and has the declared class
pub fn lookup_reference(world: &World, reference: &ObjectRef, declared: ClassId) -> Option<ObjectId> {
    if reference.is_null {
        return None;
    }
    identity::resolve(world, &reference.key).filter(|id| {
        world
            .get(*id)
            .map(|o| world.classes().is_a(o.class, declared))
            .unwrap_or(false)
    })
}

/// Strips a generated `_<n>_<32 hex>` suffix from a field name
///
/// `Health_12_0123456789ABCDEF0123456789ABCDEF` becomes `Health`; any other
/// name is returned unchanged.
pub fn sanitize_property_id(name: &str) -> String {
    let mut parts = name.rsplitn(3, '_');
    let (Some(hex), Some(digits), Some(base)) = (parts.next(), parts.next(), parts.next()) else {
        return name.to_string();
    };
    let is_hex = hex.len() == 32 && hex.chars().all(|c| c.is_ascii_hexdigit());
    let is_number = !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit());
    if is_hex && is_number && !base.is_empty() {
        base.to_string()
    } else {
        name.to_string()
    }
}

// ==========================================================================
// Encoding
// ==========================================================================

/// Every persistent field of `object`, keyed by sanitized name
pub fn encode_properties(world: &World, object: &LiveObject, trace: bool) -> BTreeMap<String, PropertyValue> {
    let classes = world.classes();
    let mut properties = BTreeMap::new();

    for field in classes.persistent_fields(object.class) {
        let value = object.get(&field.name).unwrap_or(&field.default);
        let encoded = encode_value(world, value);
        if trace {
            log::trace!("encode {}.{} = {:?}", object.name, field.name, encoded);
        }
        properties.insert(sanitize_property_id(&field.name), encoded);
    }

    properties
}

fn encode_value(world: &World, value: &Value) -> PropertyValue {
    match value {
        Value::Bool(v) => PropertyValue::Bool(*v),
        Value::Int(v) => PropertyValue::Int(*v),
        Value::Float(v) => PropertyValue::Float(*v),
        Value::Str(v) => PropertyValue::Str(v.clone()),
        Value::Name(v) => PropertyValue::Name(v.clone()),
        Value::Vector(v) => PropertyValue::Vector(*v),
        Value::Rotator(v) => PropertyValue::Rotator(*v),
        Value::Guid(v) => PropertyValue::Guid(*v),
        Value::Object(reference) => PropertyValue::Object(encode_reference(world, *reference)),
        Value::Array(items) => PropertyValue::Array(items.iter().map(|v| encode_value(world, v)).collect()),
        Value::Set(items) => {
            let mut set = Vec::with_capacity(items.len());
            for item in items {
                let encoded = encode_value(world, item);
                if !set.contains(&encoded) {
                    set.push(encoded);
                }
            }
            PropertyValue::Set(set)
        }
        Value::Map(entries) => {
            let mut map: Vec<(PropertyValue, PropertyValue)> = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let key = encode_value(world, key);
                if map.iter().all(|(k, _)| *k != key) {
                    map.push((key, encode_value(world, value)));
                }
            }
            PropertyValue::Map(map)
        }
        Value::Struct(members) => PropertyValue::Struct(
            members
                .iter()
                .map(|(name, v)| (sanitize_property_id(name), encode_value(world, v)))
                .collect(),
        ),
    }
}

fn encode_reference(world: &World, reference: Option<ObjectId>) -> ObjectRef {
    let Some(id) = reference.filter(|id| world.is_valid(*id)) else {
        return ObjectRef::null();
    };
    match (identity::identity_of(world, id), world.get(id)) {
        (Some(key), Some(object)) => ObjectRef {
            key,
            class_path: world.classes().path_of(object.class).to_string(),
            is_null: false,
        },
        _ => ObjectRef::null(),
    }
}

// ==========================================================================
// Decoding
// ==========================================================================

/// What happened to each key of a decoded record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeReport {
    /// Field names written
    pub applied: Vec<String>,
    /// (record key, field name) pairs resolved through a redirector
    pub redirected: Vec<(String, String)>,
    /// Record keys that could not be applied
    pub skipped: Vec<String>,
}

/// Writes a record's properties onto `target`
pub fn decode_properties(
    world: &mut World,
    target: ObjectId,
    properties: &BTreeMap<String, PropertyValue>,
    redirectors: &Redirectors,
    resolver: &mut dyn ReferenceResolver,
    trace: bool,
) -> DecodeReport {
    let mut report = DecodeReport::default();
    let classes = world.classes_arc();
    let Some(class) = world.get(target).map(|o| o.class) else {
        report.skipped.extend(properties.keys().cloned());
        return report;
    };
    let fields: Vec<FieldDescriptor> = classes.persistent_fields(class).cloned().collect();

    for (key, stored) in properties {
        let field = match find_field(&fields, key) {
            Some(field) => field,
            None => match redirectors
                .lookup(&classes, class, key)
                .and_then(|renamed| find_field(&fields, renamed))
            {
                Some(field) => {
                    report.redirected.push((key.clone(), field.name.clone()));
                    field
                }
                None => {
                    log::debug!("no field for record key '{}' on {}", key, classes.name_of(class));
                    report.skipped.push(key.clone());
                    continue;
                }
            },
        };

        if field.name == GUID_FIELD {
            let assigned = match (stored, world.get_mut(target)) {
                (PropertyValue::Guid(guid), Some(object)) => {
                    assign_guid_once(object, *guid) || object.guid() == Some(*guid)
                }
                _ => false,
            };
            if assigned {
                report.applied.push(field.name.clone());
            } else {
                report.skipped.push(key.clone());
            }
            continue;
        }

        match decode_value(world, stored, &field.ty, target, resolver) {
            Some(value) => {
                if trace {
                    log::trace!("decode {} <- {:?}", field.name, value);
                }
                if let Some(object) = world.get_mut(target) {
                    object.set(&field.name, value);
                }
                report.applied.push(field.name.clone());
            }
            None => {
                log::debug!("type mismatch for '{}' on {}", key, classes.name_of(class));
                report.skipped.push(key.clone());
            }
        }
    }

    report
}

fn find_field<'a>(fields: &'a [FieldDescriptor], key: &str) -> Option<&'a FieldDescriptor> {
    fields.iter().find(|f| sanitize_property_id(&f.name) == key)
}

/// Decodes one value against its declared type; `None` on a shape mismatch
fn decode_value(
    world: &mut World,
    stored: &PropertyValue,
    ty: &FieldType,
    referrer: ObjectId,
    resolver: &mut dyn ReferenceResolver,
) -> Option<Value> {
    Some(match (ty, stored) {
        (FieldType::Bool, PropertyValue::Bool(v)) => Value::Bool(*v),
        (FieldType::Int, PropertyValue::Int(v)) => Value::Int(*v),
        (FieldType::Float, PropertyValue::Float(v)) => Value::Float(*v),
        (FieldType::Str, PropertyValue::Str(v)) => Value::Str(v.clone()),
        (FieldType::Name, PropertyValue::Name(v)) => Value::Name(v.clone()),
        (FieldType::Vector, PropertyValue::Vector(v)) => Value::Vector(*v),
        (FieldType::Rotator, PropertyValue::Rotator(v)) => Value::Rotator(*v),
        (FieldType::Guid, PropertyValue::Guid(v)) => Value::Guid(*v),
        (FieldType::Object(declared), PropertyValue::Object(reference)) => {
            if reference.is_null {
                Value::Object(None)
            } else {
                Value::Object(resolver.resolve_reference(world, reference, *declared, referrer))
            }
        }
        (FieldType::Array(inner), PropertyValue::Array(items)) => Value::Array(
            items
                .iter()
                .map(|item| decode_value(world, item, inner, referrer, resolver))
                .collect::<Option<Vec<_>>>()?,
        ),
        (FieldType::Set(inner), PropertyValue::Set(items)) => {
            let mut set = Vec::with_capacity(items.len());
            for item in items {
                insert_unique(&mut set, decode_value(world, item, inner, referrer, resolver)?);
            }
            Value::Set(set)
        }
        (FieldType::Map(key_ty, value_ty), PropertyValue::Map(entries)) => {
            let mut map: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let key = decode_value(world, key, key_ty, referrer, resolver)?;
                let value = decode_value(world, value, value_ty, referrer, resolver)?;
                if map.iter().all(|(k, _)| *k != key) {
                    map.push((key, value));
                }
            }
            Value::Map(map)
        }
        (FieldType::Struct(members), PropertyValue::Struct(stored)) => {
            let mut decoded = BTreeMap::new();
            for member in members {
                let value = stored
                    .get(&sanitize_property_id(&member.name))
                    .and_then(|v| decode_value(world, v, &member.ty, referrer, resolver))
                    .unwrap_or_else(|| member.default.clone());
                decoded.insert(member.name.clone(), value);
            }
            Value::Struct(decoded)
        }
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ClassBuilder, ClassRegistry, Transform, Vector3};
    use std::sync::Arc;

    struct Fixture {
        world: World,
        door: ClassId,
        key_class: ClassId,
    }

    fn fixture() -> Fixture {
        let mut classes = ClassRegistry::new();
        let key_class = classes
            .register(ClassBuilder::new("Key").parent(ClassRegistry::ACTOR).with_guid())
            .unwrap();
        let door = classes
            .register(
                ClassBuilder::new("Door")
                    .parent(ClassRegistry::ACTOR)
                    .with_guid()
                    .persistent("Health", FieldType::Int)
                    .persistent("Speed", FieldType::Float)
                    .persistent("Codes", FieldType::set(FieldType::Int))
                    .persistent("Hinges", FieldType::array(FieldType::Vector))
                    .persistent("Owners", FieldType::map(FieldType::Name, FieldType::Int))
                    .persistent("Opener", FieldType::Object(key_class))
                    .persistent(
                        "Lock",
                        FieldType::Struct(vec![
                            FieldDescriptor::new("Pins", FieldType::Int, true),
                            FieldDescriptor::new("Jammed", FieldType::Bool, true),
                        ]),
                    )
                    .transient("Cache", FieldType::Int),
            )
            .unwrap();
        Fixture {
            world: World::new("Dungeon", Arc::new(classes)),
            door,
            key_class,
        }
    }

    #[test]
    fn test_sanitize_strips_generated_suffix() {
        assert_eq!(sanitize_property_id("Health_12_0123456789ABCDEF0123456789ABCDEF"), "Health");
        assert_eq!(sanitize_property_id("Max_Health_3_0123456789abcdef0123456789abcdef"), "Max_Health");
        assert_eq!(sanitize_property_id("Max_Health"), "Max_Health");
        assert_eq!(sanitize_property_id("Health_12_XYZ"), "Health_12_XYZ");
    }

    #[test]
    fn test_transient_fields_are_not_encoded() {
        let mut f = fixture();
        let door = f.world.spawn_actor(f.door, None, None, Transform::default()).unwrap();
        let properties = encode_properties(&f.world, f.world.get(door).unwrap(), false);
        assert!(properties.contains_key("Health"));
        assert!(!properties.contains_key("Cache"));
    }

    #[test]
    fn test_round_trip_all_shapes() {
        let mut f = fixture();
        let key = f.world.spawn_actor(f.key_class, Some("Brass"), None, Transform::default()).unwrap();
        let source = f.world.spawn_actor(f.door, Some("Front"), None, Transform::default()).unwrap();
        {
            let door = f.world.get_mut(source).unwrap();
            door.set("Health", Value::Int(80));
            door.set("Speed", Value::Float(0.1 + 0.2));
            door.set("Codes", Value::Set(vec![Value::Int(3), Value::Int(1)]));
            door.set(
                "Hinges",
                Value::Array(vec![Value::Vector(Vector3::new(1.0, 2.0, 3.0)), Value::Vector(Vector3::ZERO)]),
            );
            door.set(
                "Owners",
                Value::Map(vec![(Value::Name("ada".into()), Value::Int(1))]),
            );
            door.set("Opener", Value::Object(Some(key)));
            door.set(
                "Lock",
                Value::Struct(BTreeMap::from([
                    ("Pins".to_string(), Value::Int(5)),
                    ("Jammed".to_string(), Value::Bool(true)),
                ])),
            );
        }
        let properties = encode_properties(&f.world, f.world.get(source).unwrap(), false);

        let target = f.world.spawn_actor(f.door, Some("Back"), None, Transform::default()).unwrap();
        let report = decode_properties(
            &mut f.world,
            target,
            &properties,
            &Redirectors::default(),
            &mut LookupOnly,
            false,
        );
        assert!(report.skipped.iter().all(|k| k == GUID_FIELD), "{:?}", report);

        let (a, b) = (f.world.get(source).unwrap(), f.world.get(target).unwrap());
        for field in ["Health", "Speed", "Codes", "Hinges", "Owners", "Opener", "Lock"] {
            assert_eq!(a.get(field), b.get(field), "field {}", field);
        }
        assert_eq!(b.get("Speed"), Some(&Value::Float(0.1 + 0.2)));
    }

    #[test]
    fn test_redirector_renames_field() {
        let mut f = fixture();
        let target = f.world.spawn_actor(f.door, None, None, Transform::default()).unwrap();
        let properties = BTreeMap::from([
            ("Hp".to_string(), PropertyValue::Int(42)),
            ("Speed".to_string(), PropertyValue::Float(2.5)),
        ]);
        let redirectors = Redirectors::new(BTreeMap::from([(
            "Door".to_string(),
            BTreeMap::from([("Hp".to_string(), "Health".to_string())]),
        )]));

        let report = decode_properties(&mut f.world, target, &properties, &redirectors, &mut LookupOnly, false);
        assert_eq!(report.redirected, vec![("Hp".to_string(), "Health".to_string())]);
        assert_eq!(f.world.get(target).unwrap().get("Health"), Some(&Value::Int(42)));
    }

    #[test]
    fn test_unknown_key_skipped_rest_applied() {
        let mut f = fixture();
        let target = f.world.spawn_actor(f.door, None, None, Transform::default()).unwrap();
        let properties = BTreeMap::from([
            ("Hp".to_string(), PropertyValue::Int(42)),
            ("Speed".to_string(), PropertyValue::Float(2.5)),
        ]);

        let report = decode_properties(
            &mut f.world,
            target,
            &properties,
            &Redirectors::default(),
            &mut LookupOnly,
            false,
        );
        assert_eq!(report.skipped, vec!["Hp".to_string()]);
        let door = f.world.get(target).unwrap();
        assert_eq!(door.get("Health"), Some(&Value::Int(0)));
        assert_eq!(door.get("Speed"), Some(&Value::Float(2.5)));
    }

    #[test]
    fn test_type_mismatch_never_coerces() {
        let mut f = fixture();
        let target = f.world.spawn_actor(f.door, None, None, Transform::default()).unwrap();
        let properties = BTreeMap::from([("Health".to_string(), PropertyValue::Float(80.0))]);

        let report = decode_properties(
            &mut f.world,
            target,
            &properties,
            &Redirectors::default(),
            &mut LookupOnly,
            false,
        );
        assert_eq!(report.skipped, vec!["Health".to_string()]);
        assert_eq!(f.world.get(target).unwrap().get("Health"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_valid_guid_is_not_overwritten() {
        let mut f = fixture();
        let target = f.world.spawn_actor(f.door, None, None, Transform::default()).unwrap();
        let original = identity::create_once_guid(f.world.get_mut(target).unwrap()).unwrap();
        let properties = BTreeMap::from([(
            GUID_FIELD.to_string(),
            PropertyValue::Guid(uuid::Uuid::new_v4()),
        )]);

        decode_properties(&mut f.world, target, &properties, &Redirectors::default(), &mut LookupOnly, false);
        assert_eq!(f.world.get(target).unwrap().guid(), Some(original));
    }

    #[test]
    fn test_unresolved_reference_becomes_null() {
        let mut f = fixture();
        let target = f.world.spawn_actor(f.door, None, None, Transform::default()).unwrap();
        let properties = BTreeMap::from([(
            "Opener".to_string(),
            PropertyValue::Object(ObjectRef {
                key: "Dungeon.Key.Gone".to_string(),
                class_path: "/Game/Game.Key".to_string(),
                is_null: false,
            }),
        )]);

        let report = decode_properties(
            &mut f.world,
            target,
            &properties,
            &Redirectors::default(),
            &mut LookupOnly,
            false,
        );
        assert_eq!(report.applied, vec!["Opener".to_string()]);
        assert_eq!(f.world.get(target).unwrap().get("Opener"), Some(&Value::Object(None)));
    }
}
