//! Run functions: whole-world, level, game mode and game instance operations
//!
//! Each run walks its part of the world and feeds every target through the
//! serializers, then finishes: the slot file is written (saves only),
//! counters are reset, the finish listeners fire and a load that paused the
//! game unpauses it.
//!
//! In asynchronous mode the walk happens on a worker thread. The worker only
//! reads the world; every step that touches live objects or the progress
//! counters, and the finish step, is queued to the main thread and runs when
//! the host pumps.

use super::config::RuntimeMode;
use super::dispatch::MainThread;
use super::progress;
use super::scope::{self, Target, Walk};
use super::serializer::EntityKind;
use super::slot::Slot;
use super::types::{RecordType, SaveResult};
use crate::engine::World;
use std::sync::atomic::Ordering;
use std::thread;

impl Slot {
    pub fn run_world_save(&self) -> SaveResult {
        self.run_save(Walk::World)
    }

    pub fn run_world_load(&self) -> SaveResult {
        self.run_load(Walk::World)
    }

    /// Saves objects of every level whose name contains `level` (case-insensitive)
    pub fn run_level_save(&self, level: &str) -> SaveResult {
        self.run_save(Walk::Level(level.to_string()))
    }

    pub fn run_level_load(&self, level: &str) -> SaveResult {
        self.run_load(Walk::Level(level.to_string()))
    }

    pub fn run_game_mode_save(&self) -> SaveResult {
        self.run_save(Walk::GameMode)
    }

    pub fn run_game_mode_load(&self) -> SaveResult {
        self.run_load(Walk::GameMode)
    }

    pub fn run_game_instance_save(&self) -> SaveResult {
        self.run_save(Walk::GameInstance)
    }

    pub fn run_game_instance_load(&self) -> SaveResult {
        self.run_load(Walk::GameInstance)
    }

    // ======================================================================
    // Save
    // ======================================================================

    /// In asynchronous mode `Success` means the operation was started; the
    /// outcome arrives through the finish-save listeners.
    fn run_save(&self, walk: Walk) -> SaveResult {
        let Some(host) = self.host() else {
            log::warn!("save of '{}' aborted: no world", self.slot_name());
            self.events().broadcast_finish_save(false);
            return SaveResult::Failed;
        };

        progress::publish(self.progress());
        self.progress().begin_save(0);
        self.events().broadcast_begin_save();

        match self.config().save_mode {
            RuntimeMode::Synchronous => self.execute_save(&host, walk, RuntimeMode::Synchronous),
            RuntimeMode::Asynchronous => {
                let slot = self.clone();
                let worker_host = host.clone();
                let spawned = thread::Builder::new()
                    .name(format!("save-{}", self.slot_name()))
                    .spawn(move || {
                        slot.execute_save(&worker_host, walk, RuntimeMode::Asynchronous);
                    });
                match spawned {
                    Ok(_) => SaveResult::Success,
                    Err(e) => {
                        log::warn!("could not start save worker: {}", e);
                        let slot = self.clone();
                        host.post(move |_| {
                            slot.finish_save_step(false);
                        });
                        SaveResult::Failed
                    }
                }
            }
        }
    }

    fn execute_save(&self, host: &MainThread, walk: Walk, mode: RuntimeMode) -> SaveResult {
        if walk == Walk::World {
            self.data().clear();
        } else if self.data().is_empty() && self.slot_file_exists() {
            // partial saves keep the records of everything they don't cover
            if let Err(e) = self.read_slot_file() {
                log::warn!("could not merge existing slot '{}': {}", self.slot_name(), e);
            }
        }

        let targets = {
            let world = host.world().read();
            scope::collect_targets(&world, &self.scope_filter(world.classes()), &walk)
        };
        if self.config().debug {
            log::info!("{:?} save of '{}': {} objects", walk, self.slot_name(), targets.len());
        }
        let slot = self.clone();
        let total = targets.len();
        self.step(host, mode, move |_| slot.progress().begin_save(total));

        for target in targets {
            let slot = self.clone();
            self.step(host, mode, move |world| {
                slot.save_target(world, target);
                slot.progress().step_save();
            });
        }

        let slot = self.clone();
        let finish = move |_: &mut World| slot.finish_save_step(true);
        match mode {
            RuntimeMode::Synchronous => match host.run(finish) {
                Some(true) => SaveResult::Success,
                _ => SaveResult::Failed,
            },
            RuntimeMode::Asynchronous => {
                host.post(move |world| {
                    finish(world);
                });
                SaveResult::Success
            }
        }
    }

    fn save_target(&self, world: &mut World, target: Target) -> SaveResult {
        match target {
            Target::GameInstance(id) => self.save_entity(world, id, EntityKind::Object, false),
            Target::ActorHierarchy(id) => self.save_actor_hierarchy(world, id),
            Target::Component(id) => self.save_component(world, id),
            Target::ObjectHierarchy(id) => self.save_object_hierarchy(world, id),
            Target::Object(id) => self.save_object(world, id),
        }
    }

    fn finish_save_step(&self, walked: bool) -> bool {
        let success = walked
            && match self.write_slot_file() {
                Ok(path) => {
                    log::info!("slot '{}' saved to {}", self.slot_name(), path.display());
                    true
                }
                Err(e) => {
                    log::warn!("writing slot '{}' failed: {}", self.slot_name(), e);
                    false
                }
            };
        self.progress().finish_save();
        self.events().broadcast_finish_save(success);
        success
    }

    // ======================================================================
    // Load
    // ======================================================================

    fn run_load(&self, walk: Walk) -> SaveResult {
        let Some(host) = self.host() else {
            log::warn!("load of '{}' aborted: no world", self.slot_name());
            self.events().broadcast_finish_load(false);
            return SaveResult::Failed;
        };

        progress::publish(self.progress());
        self.progress().begin_load(0);
        self.events().broadcast_begin_load();

        match self.config().load_mode {
            RuntimeMode::Synchronous => self.execute_load(&host, walk, RuntimeMode::Synchronous),
            RuntimeMode::Asynchronous => {
                let slot = self.clone();
                let worker_host = host.clone();
                let spawned = thread::Builder::new()
                    .name(format!("load-{}", self.slot_name()))
                    .spawn(move || {
                        slot.execute_load(&worker_host, walk, RuntimeMode::Asynchronous);
                    });
                match spawned {
                    Ok(_) => SaveResult::Success,
                    Err(e) => {
                        log::warn!("could not start load worker: {}", e);
                        let slot = self.clone();
                        host.post(move |world| {
                            slot.finish_load_step(world, false);
                        });
                        SaveResult::Failed
                    }
                }
            }
        }
    }

    fn execute_load(&self, host: &MainThread, walk: Walk, mode: RuntimeMode) -> SaveResult {
        if let Err(e) = self.read_slot_file() {
            log::warn!("reading slot '{}' failed: {}", self.slot_name(), e);
            let slot = self.clone();
            self.step(host, mode, move |world| {
                slot.finish_load_step(world, false);
            });
            return SaveResult::Failed;
        }

        if self.config().pause_game_on_load {
            let slot = self.clone();
            self.step(host, mode, move |world| {
                if !world.paused {
                    world.paused = true;
                    slot.inner.paused_by_load.store(true, Ordering::Relaxed);
                }
            });
        }

        let slot = self.clone();
        self.step(host, mode, move |world| slot.begin_identity_index(world));

        let respawn_level = match &walk {
            Walk::World => Some(None),
            Walk::Level(level) => Some(Some(level.clone())),
            Walk::GameMode | Walk::GameInstance => None,
        };
        if let (Some(level), RecordType::Complex) = (respawn_level, self.config().compression) {
            // blocking, so the walk below sees the respawned entities
            let slot = self.clone();
            let spawned = host
                .run(move |world| slot.respawn_missing(world, level.as_deref()))
                .unwrap_or(0);
            if spawned > 0 && self.config().debug {
                log::info!("respawned {} entities for '{}'", spawned, self.slot_name());
            }
        }

        let targets = {
            let world = host.world().read();
            scope::collect_targets(&world, &self.scope_filter(world.classes()), &walk)
        };
        let slot = self.clone();
        let total = targets.len();
        self.step(host, mode, move |_| slot.progress().begin_load(total));

        for target in targets {
            let slot = self.clone();
            self.step(host, mode, move |world| {
                slot.load_target(world, target);
                slot.progress().step_load();
            });
        }

        let slot = self.clone();
        let finish = move |world: &mut World| slot.finish_load_step(world, true);
        match mode {
            RuntimeMode::Synchronous => match host.run(finish) {
                Some(true) => SaveResult::Success,
                _ => SaveResult::Failed,
            },
            RuntimeMode::Asynchronous => {
                host.post(move |world| {
                    finish(world);
                });
                SaveResult::Success
            }
        }
    }

    fn load_target(&self, world: &mut World, target: Target) -> SaveResult {
        match target {
            Target::GameInstance(id) => self.load_entity(world, id, EntityKind::Object, false),
            Target::ActorHierarchy(id) => self.load_actor_hierarchy(world, id),
            Target::Component(id) => self.load_component(world, id),
            Target::ObjectHierarchy(id) => self.load_object_hierarchy(world, id),
            Target::Object(id) => self.load_object(world, id),
        }
    }

    fn finish_load_step(&self, world: &mut World, success: bool) -> bool {
        self.end_identity_index();
        self.progress().finish_load();
        if self.inner.paused_by_load.swap(false, Ordering::Relaxed) {
            world.paused = false;
        }
        self.events().broadcast_finish_load(success);
        if success {
            log::info!("slot '{}' loaded", self.slot_name());
        }
        success
    }

    /// Runs a main-thread step: blocking when synchronous, queued otherwise
    fn step(&self, host: &MainThread, mode: RuntimeMode, step: impl FnOnce(&mut World) + Send + 'static) {
        match mode {
            RuntimeMode::Synchronous => {
                host.run(step);
            }
            RuntimeMode::Asynchronous => host.post(step),
        }
    }
}
