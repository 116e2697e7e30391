use crate::object::DynamicObject;
use crate::queue::Queue;
use std::sync::Arc;

/// A change notification for a watched object.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The object was observed for the first time.
    Create(Arc<DynamicObject>),
    /// The object changed from `old` to `new`.
    Update {
        /// State before the change.
        old: Arc<DynamicObject>,
        /// State after the change.
        new: Arc<DynamicObject>,
    },
    /// The object was deleted; carries the last known state.
    Delete(Arc<DynamicObject>),
    /// Re-evaluation triggered from outside the watch, e.g. a resync.
    Generic(Arc<DynamicObject>),
}

impl Event {
    /// Returns a stable label for the event type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Event::Create(_) => "create",
            Event::Update { .. } => "update",
            Event::Delete(_) => "delete",
            Event::Generic(_) => "generic",
        }
    }
}

/// Turns watch events into reconcile requests.
///
/// Methods return nothing and must not fail: a handler that cannot do its job
/// for an event logs and drops it. Implementations are shared across threads
/// and receive events concurrently.
pub trait EventHandler: Send + Sync {
    /// Handles a create event.
    fn create(&self, object: &DynamicObject, queue: &dyn Queue);

    /// Handles an update event.
    fn update(&self, old: &DynamicObject, new: &DynamicObject, queue: &dyn Queue);

    /// Handles a delete event.
    fn delete(&self, object: &DynamicObject, queue: &dyn Queue);

    /// Handles a generic event.
    fn generic(&self, object: &DynamicObject, queue: &dyn Queue);

    /// Dispatches an [`Event`] to the matching method.
    fn handle(&self, event: &Event, queue: &dyn Queue) {
        match event {
            Event::Create(object) => self.create(object, queue),
            Event::Update { old, new } => self.update(old, new, queue),
            Event::Delete(object) => self.delete(object, queue),
            Event::Generic(object) => self.generic(object, queue),
        }
    }
}
