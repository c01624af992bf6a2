//! Main-thread dispatch
//!
//! Live objects may only be mutated on the main thread. `MainThread` is the
//! handle workers use to get there: a step is run inline when already on the
//! main thread, otherwise it is queued and executed the next time the host
//! calls `pump()`. Steps can be fire-and-forget (`post`) or blocking (`run`).
//!
//! # Example
//!
//! ```ignore
//! let main = MainThread::new(world.clone());
//! // in the game loop
//! main.pump();
//! ```

use crate::engine::World;
use parking_lot::{Mutex, RwLock};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// The world shared between the main thread and save workers
pub type SharedWorld = Arc<RwLock<World>>;

/// A unit of main-thread work
pub type MainTask = Box<dyn FnOnce(&mut World) + Send>;

struct TaskQueue {
    sender: Sender<MainTask>,
    receiver: Mutex<Receiver<MainTask>>,
}

/// Handle to the main thread and the world it owns
#[derive(Clone)]
pub struct MainThread {
    world: SharedWorld,
    queue: Arc<TaskQueue>,
    thread: ThreadId,
}

impl MainThread {
    /// Binds the current thread as the main thread
    pub fn new(world: SharedWorld) -> Self {
        let (sender, receiver) = mpsc::channel();
        MainThread {
            world,
            queue: Arc::new(TaskQueue {
                sender,
                receiver: Mutex::new(receiver),
            }),
            thread: thread::current().id(),
        }
    }

    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.thread
    }

    /// Runs every queued step; returns how many ran
    ///
    /// Must be called from the main thread while it holds no lock on the world.
    pub fn pump(&self) -> usize {
        let mut ran = 0;
        loop {
            // one at a time: steps queued by a step run in this pump too
            let task = match self.queue.receiver.lock().try_recv() {
                Ok(task) => task,
                Err(_) => break,
            };
            let mut world = self.world.write();
            task(&mut world);
            ran += 1;
        }
        ran
    }

    /// Queues a step without waiting for it; runs inline on the main thread
    pub fn post<F>(&self, step: F)
    where
        F: FnOnce(&mut World) + Send + 'static,
    {
        if self.is_main_thread() {
            let mut world = self.world.write();
            step(&mut world);
            return;
        }
        if self.queue.sender.send(Box::new(step)).is_err() {
            log::warn!("main thread queue closed; step dropped");
        }
    }

    /// Runs a step on the main thread and waits for its result
    ///
    /// Returns `None` if the step could not be delivered or never replied.
    pub fn run<F, R>(&self, step: F) -> Option<R>
    where
        F: FnOnce(&mut World) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_main_thread() {
            let mut world = self.world.write();
            return Some(step(&mut world));
        }

        let (reply, result) = mpsc::channel();
        let task: MainTask = Box::new(move |world| {
            let _ = reply.send(step(world));
        });
        if self.queue.sender.send(task).is_err() {
            log::warn!("main thread queue closed; step dropped");
            return None;
        }
        result.recv().ok()
    }
}
