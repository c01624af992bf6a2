//! Demo: saves a small dungeon, then loads it into a fresh world where
//! one chest was never spawned and must come back from the slot.
//!
//! Usage: `keepsake [config.json]`

use keepsake::engine::{ClassBuilder, ClassId, ClassRegistry, FieldType, LiveObject, Serializable, Transform, Value, Vector3, World};
use keepsake::save::{default_save_dir, MainThread, SaveResult, Slot, SlotConfig, SlotMeta};
use parking_lot::RwLock;
use std::sync::Arc;

struct ChestLog;

impl Serializable for ChestLog {
    fn on_loaded(&self, object: &mut LiveObject, meta: &SlotMeta) {
        log::info!("{} restored (saved {} {})", object.name, meta.save_date_iso(), meta.save_time_iso());
    }
}

struct DemoClasses {
    registry: Arc<ClassRegistry>,
    chest: ClassId,
    lock: ClassId,
    guard: ClassId,
}

fn register_classes() -> Result<DemoClasses, String> {
    let mut registry = ClassRegistry::new();
    let chest = registry
        .register(
            ClassBuilder::new("Chest")
                .module("Dungeon")
                .parent(ClassRegistry::ACTOR)
                .with_guid()
                .with_destroyed_flag()
                .persistent("Gold", FieldType::Int)
                .persistent("Items", FieldType::array(FieldType::Name))
                .serializable(Arc::new(ChestLog))
                .procedural(),
        )
        .map_err(|e| e.to_string())?;
    let lock = registry
        .register(
            ClassBuilder::new("Lock")
                .module("Dungeon")
                .parent(ClassRegistry::COMPONENT)
                .with_guid()
                .persistent("Picked", FieldType::Bool)
                .procedural(),
        )
        .map_err(|e| e.to_string())?;
    let guard = registry
        .register(
            ClassBuilder::new("Guard")
                .module("Dungeon")
                .parent(ClassRegistry::PAWN)
                .with_guid()
                .persistent("Watching", FieldType::Object(chest))
                .transient("Alert", FieldType::Float),
        )
        .map_err(|e| e.to_string())?;
    Ok(DemoClasses {
        registry: Arc::new(registry),
        chest,
        lock,
        guard,
    })
}

fn build_world(classes: &DemoClasses, with_chests: bool) -> Result<World, String> {
    let mut world = World::new("Crypt", classes.registry.clone());
    let guard = world
        .spawn_actor(classes.guard, Some("Warden"), None, Transform::default())
        .map_err(|e| e.to_string())?;

    if with_chests {
        for (name, gold, x) in [("NorthChest", 120, 4.0), ("SouthChest", 35, -6.0)] {
            let chest = world
                .spawn_actor(classes.chest, Some(name), None, Transform::at(Vector3::new(x, 0.0, 1.0)))
                .map_err(|e| e.to_string())?;
            world
                .spawn_component(chest, classes.lock, Some("Lock"))
                .map_err(|e| e.to_string())?;
            if let Some(object) = world.get_mut(chest) {
                object.set("Gold", Value::Int(gold));
                object.set("Items", Value::Array(vec![Value::Name("Ruby".into())]));
            }
            if let Some(object) = world.get_mut(guard) {
                object.set("Watching", Value::Object(Some(chest)));
            }
        }
    }
    Ok(world)
}

fn report(world: &World, classes: &DemoClasses) {
    for object in world.iter().filter(|o| o.is_live() && o.class == classes.chest) {
        let gold = object.get("Gold").and_then(Value::as_int).unwrap_or_default();
        let at = object.actor.as_ref().map(|a| a.transform.location).unwrap_or(Vector3::ZERO);
        println!(
            "  {} gold={} at ({}, {}, {}) components={}",
            object.name,
            gold,
            at.x,
            at.y,
            at.z,
            world.components_of(object.id).len()
        );
    }
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => SlotConfig::load_from_file(&path)
            .map_err(|e| format!("Failed to load slot config {}: {}", path, e))?,
        None => SlotConfig::default(),
    };
    if config.save_directory.is_none() {
        config.save_directory = Some(default_save_dir());
    }
    config.meta_defaults.chapter = "The Crypt".to_string();

    let classes = register_classes()?;

    // Session one: save
    let main = MainThread::new(Arc::new(RwLock::new(build_world(&classes, true)?)));
    let slot = Slot::new(config.clone()).map_err(|e| format!("Failed to create slot: {}", e))?;
    slot.attach(&main);
    slot.update_meta(|meta| {
        meta.player_name = "Ash".to_string();
        meta.play_time = 3725;
    });
    if slot.run_world_save() != SaveResult::Success {
        return Err("world save failed".to_string());
    }
    println!("Saved '{}':", slot.slot_name());
    report(&main.world().read(), &classes);

    // Session two: the chests were never spawned
    let main = MainThread::new(Arc::new(RwLock::new(build_world(&classes, false)?)));
    let slot = Slot::new(config).map_err(|e| format!("Failed to create slot: {}", e))?;
    slot.attach(&main);
    if slot.run_world_load() != SaveResult::Success {
        return Err("world load failed".to_string());
    }
    let meta = slot.meta();
    println!("Loaded '{}' ({}, played {}):", slot.slot_name(), meta.player_name, meta.play_time_display());
    report(&main.world().read(), &classes);

    let slots = slot
        .storage()
        .list_slots()
        .map_err(|e| format!("Failed to list slots: {}", e))?;
    for info in slots {
        println!("slot {} -> {}", info.name, info.path.display());
    }
    Ok(())
}
