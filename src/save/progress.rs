//! Workload and progress counters
//!
//! Counters are mutated only by main-thread steps and read from anywhere
//! (typically a loading screen). Reads use relaxed atomics: values may be
//! stale, which is fine for telemetry.

use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Progress {
    save_workload: AtomicU32,
    saves_completed: AtomicU32,
    save_finished: AtomicBool,
    load_workload: AtomicU32,
    loads_completed: AtomicU32,
    load_finished: AtomicBool,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a save: counters go back to zero, then the workload is set
    pub fn begin_save(&self, workload: usize) {
        self.saves_completed.store(0, Ordering::Relaxed);
        self.save_finished.store(false, Ordering::Relaxed);
        self.save_workload.store(workload as u32, Ordering::Relaxed);
    }

    pub fn begin_load(&self, workload: usize) {
        self.loads_completed.store(0, Ordering::Relaxed);
        self.load_finished.store(false, Ordering::Relaxed);
        self.load_workload.store(workload as u32, Ordering::Relaxed);
    }

    /// Counts one processed entity; never exceeds the workload
    pub fn step_save(&self) {
        let workload = self.save_workload.load(Ordering::Relaxed);
        let _ = self
            .saves_completed
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |done| {
                (done < workload).then_some(done + 1)
            });
    }

    pub fn step_load(&self) {
        let workload = self.load_workload.load(Ordering::Relaxed);
        let _ = self
            .loads_completed
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |done| {
                (done < workload).then_some(done + 1)
            });
    }

    /// Zeroes the save counters and flags the save as done
    pub fn finish_save(&self) {
        self.clear_save();
        self.save_finished.store(true, Ordering::Relaxed);
    }

    pub fn finish_load(&self) {
        self.clear_load();
        self.load_finished.store(true, Ordering::Relaxed);
    }

    /// Resets every counter to zero
    pub fn clear_workload(&self) {
        self.clear_save();
        self.clear_load();
    }

    fn clear_save(&self) {
        self.save_workload.store(0, Ordering::Relaxed);
        self.saves_completed.store(0, Ordering::Relaxed);
        self.save_finished.store(false, Ordering::Relaxed);
    }

    fn clear_load(&self) {
        self.load_workload.store(0, Ordering::Relaxed);
        self.loads_completed.store(0, Ordering::Relaxed);
        self.load_finished.store(false, Ordering::Relaxed);
    }

    /// 0-100 share of the current save already processed
    pub fn save_progress(&self) -> f32 {
        percent(
            self.saves_completed.load(Ordering::Relaxed),
            self.save_workload.load(Ordering::Relaxed),
        )
    }

    pub fn load_progress(&self) -> f32 {
        percent(
            self.loads_completed.load(Ordering::Relaxed),
            self.load_workload.load(Ordering::Relaxed),
        )
    }

    /// 100 once the last save has finished, 0 while one runs or none ran
    pub fn saves_done(&self) -> f32 {
        if self.save_finished.load(Ordering::Relaxed) { 100.0 } else { 0.0 }
    }

    pub fn loads_done(&self) -> f32 {
        if self.load_finished.load(Ordering::Relaxed) { 100.0 } else { 0.0 }
    }

    pub fn save_workload(&self) -> u32 {
        self.save_workload.load(Ordering::Relaxed)
    }

    pub fn load_workload(&self) -> u32 {
        self.load_workload.load(Ordering::Relaxed)
    }
}

fn percent(done: u32, workload: u32) -> f32 {
    if workload == 0 {
        return 0.0;
    }
    (done as f32 / workload as f32 * 100.0).min(100.0)
}

lazy_static! {
    static ref ACTIVE_PROGRESS: RwLock<Option<Arc<Progress>>> = RwLock::new(None);
}

/// Publishes the counters of the operation that just started
pub fn publish(progress: &Arc<Progress>) {
    *ACTIVE_PROGRESS.write() = Some(Arc::clone(progress));
}

/// Counters of the most recently started operation, for UI polling
pub fn active_progress() -> Option<Arc<Progress>> {
    ACTIVE_PROGRESS.read().clone()
}
