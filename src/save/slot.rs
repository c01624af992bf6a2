//! The save slot: one save game and everything needed to produce or apply it
//!
//! A `Slot` owns its records and meta, its configuration, its progress
//! counters and its listeners. It is a cheap handle (`Clone` shares the same
//! slot) so that background workers can carry it.
//!
//! The serializer operations live in `serializer.rs`, respawn in
//! `respawn.rs` and the threaded run functions in `runner.rs`; all of them
//! are `impl Slot` blocks.
//!
//! # Example
//!
//! ```ignore
//! let slot = Slot::new(SlotConfig::default())?;
//! slot.attach(&main_thread);
//! slot.run_world_save();
//! ```

use super::config::SlotConfig;
use super::dispatch::MainThread;
use super::events::SlotEvents;
use super::identity::IdentityIndex;
use super::manager::SlotStorage;
use super::progress::Progress;
use super::redirector::Redirectors;
use super::scope::{self, ScopeFilter, Walk};
use super::slot_data::{SlotData, SlotFile, SlotMeta};
use super::types::SaveError;
use crate::engine::{ClassRegistry, World};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) struct SlotInner {
    pub(crate) config: SlotConfig,
    pub(crate) redirectors: Redirectors,
    pub(crate) storage: SlotStorage,
    pub(crate) data: Mutex<SlotData>,
    pub(crate) meta: Mutex<SlotMeta>,
    pub(crate) progress: Arc<Progress>,
    pub(crate) events: SlotEvents,
    pub(crate) host: RwLock<Option<MainThread>>,
    /// Record keys currently being respawned
    pub(crate) respawning: Mutex<HashSet<String>>,
    /// Present while a load walk runs
    pub(crate) identity_index: Mutex<Option<IdentityIndex>>,
    pub(crate) paused_by_load: AtomicBool,
}

#[derive(Clone)]
pub struct Slot {
    pub(crate) inner: Arc<SlotInner>,
}

impl Slot {
    /// Creates an empty slot; the save directory is created if needed
    pub fn new(config: SlotConfig) -> Result<Self, SaveError> {
        let storage = SlotStorage::new(config.directory(), config.format)?;
        let meta = SlotMeta::from_defaults(&config.meta_defaults);
        let redirectors = Redirectors::new(config.redirectors.clone());
        Ok(Slot {
            inner: Arc::new(SlotInner {
                config,
                redirectors,
                storage,
                data: Mutex::new(SlotData::default()),
                meta: Mutex::new(meta),
                progress: Arc::new(Progress::new()),
                events: SlotEvents::default(),
                host: RwLock::new(None),
                respawning: Mutex::new(HashSet::new()),
                identity_index: Mutex::new(None),
                paused_by_load: AtomicBool::new(false),
            }),
        })
    }

    /// A fresh, empty slot with this slot's configuration and main thread
    pub fn new_slot_instance(&self) -> Result<Slot, SaveError> {
        let slot = Slot::new(self.inner.config.clone())?;
        if let Some(host) = self.host() {
            slot.attach(&host);
        }
        Ok(slot)
    }

    pub fn config(&self) -> &SlotConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &SlotEvents {
        &self.inner.events
    }

    pub fn storage(&self) -> &SlotStorage {
        &self.inner.storage
    }

    /// Binds the slot to the main thread of a world
    pub fn attach(&self, host: &MainThread) {
        *self.inner.host.write() = Some(host.clone());
        self.inner.identity_index.lock().take();
    }

    pub fn detach(&self) {
        *self.inner.host.write() = None;
        self.inner.identity_index.lock().take();
    }

    pub fn host(&self) -> Option<MainThread> {
        self.inner.host.read().clone()
    }

    // ======================================================================
    // Data and meta
    // ======================================================================

    /// Locks the slot's records
    ///
    /// Do not hold the guard across a call into the slot.
    pub fn data(&self) -> MutexGuard<'_, SlotData> {
        self.inner.data.lock()
    }

    pub fn meta(&self) -> SlotMeta {
        self.inner.meta.lock().clone()
    }

    pub fn set_meta(&self, meta: SlotMeta) {
        *self.inner.meta.lock() = meta;
    }

    pub fn update_meta(&self, update: impl FnOnce(&mut SlotMeta)) {
        update(&mut *self.inner.meta.lock());
    }

    /// Restores meta from the configured defaults
    pub fn reset_meta(&self) {
        self.set_meta(SlotMeta::from_defaults(&self.inner.config.meta_defaults));
    }

    // ======================================================================
    // Progress
    // ======================================================================

    pub fn progress(&self) -> &Arc<Progress> {
        &self.inner.progress
    }

    pub fn save_progress(&self) -> f32 {
        self.inner.progress.save_progress()
    }

    pub fn load_progress(&self) -> f32 {
        self.inner.progress.load_progress()
    }

    pub fn saves_done(&self) -> f32 {
        self.inner.progress.saves_done()
    }

    pub fn loads_done(&self) -> f32 {
        self.inner.progress.loads_done()
    }

    pub fn clear_workload(&self) {
        self.inner.progress.clear_workload();
    }

    pub fn scope_filter(&self, classes: &ClassRegistry) -> ScopeFilter {
        ScopeFilter::from_config(&self.inner.config, classes)
    }

    /// Number of objects a walk over `world` would process
    pub fn calculate_workload(&self, world: &World, walk: &Walk) -> usize {
        scope::calculate_workload(world, &self.scope_filter(world.classes()), walk)
    }

    // ======================================================================
    // Slot file
    // ======================================================================

    pub fn slot_name(&self) -> &str {
        &self.inner.config.slot_file_name
    }

    /// Writes records and meta to the slot file (and the meta file, if configured)
    pub fn write_slot_file(&self) -> Result<PathBuf, SaveError> {
        let meta = {
            let mut meta = self.inner.meta.lock();
            meta.touch();
            meta.clone()
        };
        let file = SlotFile::new(meta.clone(), self.inner.data.lock().clone());
        let path = self.inner.storage.write_slot(self.slot_name(), &file)?;
        if self.inner.config.write_meta_on_save {
            self.inner.storage.write_meta(self.slot_name(), &meta)?;
        }
        Ok(path)
    }

    /// Replaces records and meta with the slot file's content
    pub fn read_slot_file(&self) -> Result<(), SaveError> {
        let file = self.inner.storage.read_slot(self.slot_name())?;
        *self.inner.data.lock() = file.data;
        *self.inner.meta.lock() = file.meta;
        Ok(())
    }

    pub fn write_meta_file(&self) -> Result<PathBuf, SaveError> {
        self.inner.storage.write_meta(self.slot_name(), &self.meta())
    }

    /// Replaces only the meta, from the meta file
    pub fn read_meta_file(&self) -> Result<SlotMeta, SaveError> {
        let meta = self.inner.storage.read_meta(self.slot_name())?;
        self.set_meta(meta.clone());
        Ok(meta)
    }

    pub fn slot_file_exists(&self) -> bool {
        self.inner.storage.slot_exists(self.slot_name())
    }

    pub fn delete_slot_file(&self) -> Result<bool, SaveError> {
        self.inner.storage.delete_slot(self.slot_name())
    }

    pub(crate) fn deep_logs(&self) -> bool {
        self.inner.config.deep_logs
    }
}
