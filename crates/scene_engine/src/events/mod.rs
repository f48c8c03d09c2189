//! Scene events
//!
//! - Key-value properties (no order dependency)
//! - Exactly one target: the whole scene, one entity or one component
//! - Deferred delivery: events are queued and dispatched by the scene
//! - Named listeners run after components; every listener subscribed to
//!   the event's name sees it

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::ecs::{ComponentRef, EntityId};
use crate::foundation::math::Vec3;

/// Receiver of a dispatched event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    /// Every entity in the scene
    Scene,
    /// Every active component of one entity
    Entity(EntityId),
    /// One component
    Component(ComponentRef),
}

/// Property value carried by an event
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    /// Boolean flag
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Text
    Text(String),
    /// Vector
    Vector(Vec3),
    /// Entity reference
    Entity(EntityId),
}

/// Named event with a property bag and a target
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    name: String,
    target: EventTarget,
    props: HashMap<String, EventValue>,
}

impl Event {
    /// Create an event
    pub fn new(name: impl Into<String>, target: EventTarget) -> Self {
        Self {
            name: name.into(),
            target,
            props: HashMap::new(),
        }
    }

    /// Add a property (builder pattern)
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: EventValue) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    /// Event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event target
    pub fn target(&self) -> EventTarget {
        self.target
    }

    /// Property by key
    pub fn prop(&self, key: &str) -> Option<&EventValue> {
        self.props.get(key)
    }

    /// Float property
    pub fn float(&self, key: &str) -> Option<f64> {
        match self.prop(key) {
            Some(EventValue::Float(value)) => Some(*value),
            Some(EventValue::Int(value)) => Some(*value as f64),
            _ => None,
        }
    }

    /// Text property
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.prop(key) {
            Some(EventValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }
}

/// Listener registered on the scene for one event name
pub trait EventListener: Send {
    /// Handle an event, return true if it was acted on
    fn on_event(&mut self, event: &Event) -> bool;
}

impl<F> EventListener for F
where
    F: FnMut(&Event) -> bool + Send,
{
    fn on_event(&mut self, event: &Event) -> bool {
        self(event)
    }
}

/// Thread-safe FIFO of pending events
#[derive(Debug, Default)]
pub struct EventQueue {
    queue: Mutex<VecDeque<Event>>,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event
    pub fn push(&self, event: Event) {
        log::trace!("Queued event '{}'", event.name());
        self.queue.lock().push_back(event);
    }

    /// Take the oldest event
    pub fn pop(&self) -> Option<Event> {
        self.queue.lock().pop_front()
    }

    /// Pending event count
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether no events are pending
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Drop every pending event
    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_fifo() {
        let queue = EventQueue::new();
        queue.push(Event::new("first", EventTarget::Scene));
        queue.push(Event::new("second", EventTarget::Scene));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().name(), "first");
        assert_eq!(queue.pop().unwrap().name(), "second");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_props() {
        let event = Event::new("damage", EventTarget::Scene)
            .with_prop("amount", EventValue::Int(12))
            .with_prop("source", EventValue::Text("trap".to_string()));

        assert_eq!(event.float("amount"), Some(12.0));
        assert_eq!(event.text("source"), Some("trap"));
        assert_eq!(event.text("amount"), None);
        assert!(event.prop("missing").is_none());
    }

    #[test]
    fn test_closure_listener() {
        let mut seen = 0;
        {
            let mut listener = |event: &Event| {
                seen += 1;
                event.name() == "stop"
            };
            assert!(!listener.on_event(&Event::new("go", EventTarget::Scene)));
            assert!(listener.on_event(&Event::new("stop", EventTarget::Scene)));
        }
        assert_eq!(seen, 2);
    }
}
