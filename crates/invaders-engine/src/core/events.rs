//! Typed lifecycle notifications for entities.
//!
//! Subscribers are registered per `EventKind` and run in registration order.
//! A subscriber that returns an error or panics is logged and skipped; the
//! remaining subscribers still run and nothing propagates to the emitter.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use glam::Vec2;

use crate::api::types::EntityId;

/// Which notification a subscriber wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Update,
    Move,
    Velocity,
    Activate,
    Deactivate,
    Destroy,
}

/// A lifecycle notification with its payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityEvent {
    /// Position integrated by `Entity::update`.
    Updated { pos: Vec2 },
    /// Position set directly.
    Moved { from: Vec2, to: Vec2 },
    VelocityChanged { velocity: Vec2 },
    Activated,
    Deactivated,
    Destroyed,
}

impl EntityEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EntityEvent::Updated { .. } => EventKind::Update,
            EntityEvent::Moved { .. } => EventKind::Move,
            EntityEvent::VelocityChanged { .. } => EventKind::Velocity,
            EntityEvent::Activated => EventKind::Activate,
            EntityEvent::Deactivated => EventKind::Deactivate,
            EntityEvent::Destroyed => EventKind::Destroy,
        }
    }
}

/// Handle returned by `Listeners::on`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

pub type Listener = Box<dyn FnMut(EntityId, &EntityEvent) -> anyhow::Result<()>>;

/// Subscriber table keyed by event kind.
#[derive(Default)]
pub struct Listeners {
    table: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: u32,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(EntityId, &EntityEvent) -> anyhow::Result<()> + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.table
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        for subscribers in self.table.values_mut() {
            if let Some(idx) = subscribers.iter().position(|(lid, _)| *lid == id) {
                drop(subscribers.remove(idx));
                return true;
            }
        }
        false
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Number of registered subscribers across all kinds.
    pub fn len(&self) -> usize {
        self.table.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every subscriber of its kind.
    pub fn emit(&mut self, entity: EntityId, event: &EntityEvent) {
        let Some(subscribers) = self.table.get_mut(&event.kind()) else {
            return;
        };
        for (listener_id, listener) in subscribers.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| listener(entity, event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    log::warn!(
                        "entity {}: listener {:?} failed on {:?}: {:#}",
                        entity,
                        listener_id,
                        event.kind(),
                        err
                    );
                }
                Err(_) => {
                    log::warn!(
                        "entity {}: listener {:?} panicked on {:?}",
                        entity,
                        listener_id,
                        event.kind()
                    );
                }
            }
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("count", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(
        log: &Rc<RefCell<Vec<&'static str>>>,
        name: &'static str,
    ) -> impl FnMut(EntityId, &EntityEvent) -> anyhow::Result<()> + 'static {
        let log = Rc::clone(log);
        move |_, _| {
            log.borrow_mut().push(name);
            Ok(())
        }
    }

    #[test]
    fn subscribers_run_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::new();
        listeners.on(EventKind::Activate, recorder(&log, "first"));
        listeners.on(EventKind::Activate, recorder(&log, "second"));
        listeners.on(EventKind::Destroy, recorder(&log, "other"));

        listeners.emit(EntityId(1), &EntityEvent::Activated);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn failing_subscriber_does_not_stop_the_rest() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::new();
        listeners.on(EventKind::Activate, |_, _| anyhow::bail!("nope"));
        listeners.on(EventKind::Activate, |_, _| panic!("boom"));
        listeners.on(EventKind::Activate, recorder(&log, "survivor"));

        listeners.emit(EntityId(1), &EntityEvent::Activated);
        assert_eq!(*log.borrow(), vec!["survivor"]);
    }

    #[test]
    fn off_unsubscribes() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::new();
        let id = listeners.on(EventKind::Activate, recorder(&log, "gone"));
        assert!(listeners.off(id));
        assert!(!listeners.off(id));
        listeners.emit(EntityId(1), &EntityEvent::Activated);
        assert!(log.borrow().is_empty());
        assert!(listeners.is_empty());
    }
}
