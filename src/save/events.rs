//! Begin/finish listeners for slot operations

use parking_lot::Mutex;
use std::sync::Arc;

pub type BeginListener = Arc<dyn Fn() + Send + Sync>;
/// Receives `true` when the operation succeeded
pub type FinishListener = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Default)]
pub struct SlotEvents {
    begin_save: Mutex<Vec<BeginListener>>,
    finish_save: Mutex<Vec<FinishListener>>,
    begin_load: Mutex<Vec<BeginListener>>,
    finish_load: Mutex<Vec<FinishListener>>,
}

impl SlotEvents {
    pub fn on_begin_save(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.begin_save.lock().push(Arc::new(listener));
    }

    pub fn on_finish_save(&self, listener: impl Fn(bool) + Send + Sync + 'static) {
        self.finish_save.lock().push(Arc::new(listener));
    }

    pub fn on_begin_load(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.begin_load.lock().push(Arc::new(listener));
    }

    pub fn on_finish_load(&self, listener: impl Fn(bool) + Send + Sync + 'static) {
        self.finish_load.lock().push(Arc::new(listener));
    }

    // Listeners are called on a snapshot so they may register further listeners

    pub fn broadcast_begin_save(&self) {
        let listeners = self.begin_save.lock().clone();
        listeners.iter().for_each(|listener| listener());
    }

    pub fn broadcast_finish_save(&self, success: bool) {
        let listeners = self.finish_save.lock().clone();
        listeners.iter().for_each(|listener| listener(success));
    }

    pub fn broadcast_begin_load(&self) {
        let listeners = self.begin_load.lock().clone();
        listeners.iter().for_each(|listener| listener());
    }

    pub fn broadcast_finish_load(&self, success: bool) {
        let listeners = self.finish_load.lock().clone();
        listeners.iter().for_each(|listener| listener(success));
    }

    pub fn clear(&self) {
        self.begin_save.lock().clear();
        self.finish_save.lock().clear();
        self.begin_load.lock().clear();
        self.finish_load.lock().clear();
    }
}
