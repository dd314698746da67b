//! Ordered `(priority, name, handler)` lists per event, plus the 20-entry error ring that
//! isolates a handler's failure from the pipeline (spec §4.7, §9).

use super::context::HookContext;
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;

type Handler = Box<dyn Fn(&mut HookContext) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    BeforePerceive,
    AfterPerceive,
    BeforeAct,
    AfterAct,
    OnError,
}

#[derive(Debug, Clone)]
pub struct HookError {
    pub event: &'static str,
    pub hook_name: String,
    pub message: String,
}

struct Entry {
    priority: i32,
    name: String,
    handler: Handler,
}

#[derive(Default)]
struct EventList {
    entries: Vec<Entry>,
}

impl EventList {
    fn register(&mut self, priority: i32, name: &str, handler: Handler) {
        self.entries.push(Entry { priority, name: name.to_string(), handler });
        self.entries.sort_by_key(|e| e.priority);
    }
}

const ERROR_RING_CAPACITY: usize = 20;

/// The process-wide hook registry singleton (spec §9 "global state ... as process-wide
/// singletons with idempotent init").
pub struct HookRegistry {
    before_perceive: Mutex<EventList>,
    after_perceive: Mutex<EventList>,
    before_act: Mutex<EventList>,
    after_act: Mutex<EventList>,
    on_error: Mutex<EventList>,
    errors: Mutex<VecDeque<HookError>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            before_perceive: Mutex::new(EventList::default()),
            after_perceive: Mutex::new(EventList::default()),
            before_act: Mutex::new(EventList::default()),
            after_act: Mutex::new(EventList::default()),
            on_error: Mutex::new(EventList::default()),
            errors: Mutex::new(VecDeque::with_capacity(ERROR_RING_CAPACITY)),
        }
    }

    pub fn on(&self, event: Event, priority: i32, name: &str, handler: Handler) {
        self.list_for(event).lock().register(priority, name, handler);
    }

    fn list_for(&self, event: Event) -> &Mutex<EventList> {
        match event {
            Event::BeforePerceive => &self.before_perceive,
            Event::AfterPerceive => &self.after_perceive,
            Event::BeforeAct => &self.before_act,
            Event::AfterAct => &self.after_act,
            Event::OnError => &self.on_error,
        }
    }

    /// Runs every handler for `event` in priority order against `ctx`. A handler's error is
    /// pushed onto the ring and the remaining handlers still run (spec §4.7 "handlers
    /// isolated; thrown errors recorded in a 20-entry ring, pipeline continues").
    pub fn run(&self, event: Event, ctx: &mut HookContext) {
        let event_name = match event {
            Event::BeforePerceive => "before_perceive",
            Event::AfterPerceive => "after_perceive",
            Event::BeforeAct => "before_act",
            Event::AfterAct => "after_act",
            Event::OnError => "on_error",
        };
        let list = self.list_for(event).lock();
        for entry in &list.entries {
            if let Err(e) = (entry.handler)(ctx) {
                self.push_error(HookError {
                    event: event_name,
                    hook_name: entry.name.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    fn push_error(&self, error: HookError) {
        let mut errors = self.errors.lock();
        errors.push_back(error);
        while errors.len() > ERROR_RING_CAPACITY {
            errors.pop_front();
        }
    }

    pub fn recent_errors(&self) -> Vec<HookError> {
        self.errors.lock().iter().cloned().collect()
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handlers_run_in_priority_order() {
        let registry = HookRegistry::new();
        let order = std::sync::Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        registry.on(Event::BeforeAct, 20, "second", Box::new(move |_| { o1.lock().push(2); Ok(()) }));
        let o2 = order.clone();
        registry.on(Event::BeforeAct, 10, "first", Box::new(move |_| { o2.lock().push(1); Ok(()) }));
        let mut ctx = HookContext::new();
        registry.run(Event::BeforeAct, &mut ctx);
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn failing_handler_is_isolated_and_recorded() {
        let registry = HookRegistry::new();
        registry.on(Event::AfterAct, 10, "boom", Box::new(|_| Err(crate::error::NexusError::AdapterFailed("boom".into()))));
        let ran = std::sync::Arc::new(Mutex::new(false));
        let ran2 = ran.clone();
        registry.on(Event::AfterAct, 20, "ok", Box::new(move |_| { *ran2.lock() = true; Ok(()) }));
        let mut ctx = HookContext::new();
        registry.run(Event::AfterAct, &mut ctx);
        assert!(*ran.lock());
        assert_eq!(registry.recent_errors().len(), 1);
    }

    #[test]
    fn error_ring_trims_to_capacity() {
        let registry = HookRegistry::new();
        for i in 0..25 {
            registry.on(Event::OnError, i, &format!("h{i}"), Box::new(|_| Err(crate::error::NexusError::AdapterFailed("x".into()))));
        }
        let mut ctx = HookContext::new();
        registry.run(Event::OnError, &mut ctx);
        assert_eq!(registry.recent_errors().len(), ERROR_RING_CAPACITY);
    }
}
