use glam::Vec2;

use crate::api::error::EngineError;
use crate::api::types::EntityId;
use crate::core::bounds::Bounds;
use crate::core::events::{EntityEvent, EventKind, ListenerId, Listeners};

/// Kind tag given to entities that don't set one.
pub const DEFAULT_KIND: &str = "entity";

/// A positioned, sized game object.
///
/// `pos` is the top-left corner. Velocity is multiplied by `speed` and the
/// elapsed seconds on every `update`. Inactive entities neither move nor
/// collide; invisible entities are skipped when drawing. Both flags are
/// independent.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    kind: String,
    pos: Vec2,
    size: Vec2,
    velocity: Vec2,
    speed: f32,
    active: bool,
    visible: bool,
    listeners: Listeners,
}

impl Entity {
    /// Create an entity with a freshly allocated id.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Result<Self, EngineError> {
        Self::with_id(EntityId::next(), x, y, width, height)
    }

    /// Create an entity with a caller-chosen id.
    pub fn with_id(
        id: EntityId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<Self, EngineError> {
        check_finite("x", x)?;
        check_finite("y", y)?;
        check_extent("width", width)?;
        check_extent("height", height)?;
        Ok(Self {
            id,
            kind: DEFAULT_KIND.to_string(),
            pos: Vec2::new(x, y),
            size: Vec2::new(width, height),
            velocity: Vec2::ZERO,
            speed: 0.0,
            active: true,
            visible: true,
            listeners: Listeners::new(),
        })
    }

    // -- Builder pattern --

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    // -- Accessors --

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn pos(&self) -> Vec2 {
        self.pos
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn width(&self) -> f32 {
        self.size.x
    }

    pub fn height(&self) -> f32 {
        self.size.y
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_rect(self.pos, self.size)
    }

    pub fn center(&self) -> Vec2 {
        self.pos + self.size * 0.5
    }

    /// AABB overlap with another entity. Always false if either is inactive.
    pub fn is_colliding(&self, other: &Entity) -> bool {
        if !self.active || !other.active {
            return false;
        }
        self.bounds().intersects(&other.bounds())
    }

    // -- Mutation --

    /// Integrate position over `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        if !self.active {
            return;
        }
        self.pos += self.velocity * self.speed * dt;
        self.emit(EntityEvent::Updated { pos: self.pos });
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        let from = self.pos;
        self.pos = Vec2::new(x, y);
        self.emit(EntityEvent::Moved { from, to: self.pos });
    }

    pub fn set_velocity(&mut self, vx: f32, vy: f32) {
        self.velocity = Vec2::new(vx, vy);
        self.emit(EntityEvent::VelocityChanged {
            velocity: self.velocity,
        });
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn set_size(&mut self, size: Vec2) {
        self.size = size;
    }

    pub(crate) fn set_kind(&mut self, kind: String) {
        self.kind = kind;
    }

    pub fn activate(&mut self) {
        self.active = true;
        self.emit(EntityEvent::Activated);
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.emit(EntityEvent::Deactivated);
    }

    /// Disable the entity for good: hides it, deactivates it, sends a final
    /// `Destroyed` notification and drops every listener.
    pub fn destroy(&mut self) {
        self.active = false;
        self.visible = false;
        self.emit(EntityEvent::Destroyed);
        self.listeners.clear();
    }

    // -- Listeners --

    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(EntityId, &EntityEvent) -> anyhow::Result<()> + 'static,
    {
        self.listeners.on(kind, listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.listeners.off(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn emit(&mut self, event: EntityEvent) {
        self.listeners.emit(self.id, &event);
    }
}

fn check_finite(field: &'static str, value: f32) -> Result<(), EngineError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::validation(field, format!("must be finite, got {value}")))
    }
}

fn check_extent(field: &'static str, value: f32) -> Result<(), EngineError> {
    check_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::validation(field, format!("must be positive, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[rstest]
    #[case::zero_width(0.0, 10.0, "width")]
    #[case::zero_height(10.0, 0.0, "height")]
    #[case::negative_width(-1.0, 10.0, "width")]
    #[case::nan_height(10.0, f32::NAN, "height")]
    fn degenerate_size_is_rejected(
        #[case] width: f32,
        #[case] height: f32,
        #[case] field: &'static str,
    ) {
        match Entity::new(0.0, 0.0, width, height) {
            Err(EngineError::Validation { field: f, .. }) => assert_eq!(f, field),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn infinite_position_is_rejected() {
        assert!(Entity::new(f32::INFINITY, 0.0, 1.0, 1.0).is_err());
        assert!(Entity::new(0.0, f32::NEG_INFINITY, 1.0, 1.0).is_err());
    }

    #[test]
    fn negative_position_is_allowed() {
        let e = Entity::new(-50.0, -20.0, 10.0, 10.0).unwrap();
        assert_eq!(e.pos(), Vec2::new(-50.0, -20.0));
    }

    #[test]
    fn defaults() {
        let e = Entity::new(1.0, 2.0, 3.0, 4.0).unwrap();
        assert_eq!(e.kind(), DEFAULT_KIND);
        assert_eq!(e.speed(), 0.0);
        assert!(e.is_active());
        assert!(e.is_visible());
    }

    #[test]
    fn update_integrates_velocity_times_speed() {
        let mut e = Entity::new(0.0, 100.0, 10.0, 10.0)
            .unwrap()
            .with_speed(200.0)
            .with_velocity(Vec2::new(1.0, -0.5));
        e.update(0.5);
        assert_relative_eq!(e.pos().x, 100.0);
        assert_relative_eq!(e.pos().y, 50.0);
    }

    #[test]
    fn inactive_entity_does_not_move() {
        let mut e = Entity::new(0.0, 0.0, 10.0, 10.0)
            .unwrap()
            .with_speed(100.0)
            .with_velocity(Vec2::X);
        e.deactivate();
        e.update(1.0);
        assert_eq!(e.pos(), Vec2::ZERO);
    }

    #[test]
    fn bounds_track_size_after_mutation() {
        let mut e = Entity::new(3.0, 4.0, 12.0, 8.0).unwrap();
        e.set_position(-40.0, 90.0);
        let b = e.bounds();
        assert_eq!(b.right - b.left, e.width());
        assert_eq!(b.bottom - b.top, e.height());
        assert_eq!(e.bounds(), b);
    }

    #[test]
    fn inactive_entities_never_collide() {
        let a = Entity::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let mut b = Entity::new(5.0, 5.0, 10.0, 10.0).unwrap();
        assert!(a.is_colliding(&b));
        b.deactivate();
        assert!(!a.is_colliding(&b));
        assert!(!b.is_colliding(&a));
    }

    #[test]
    fn touching_entities_collide() {
        let a = Entity::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let b = Entity::new(10.0, 10.0, 10.0, 10.0).unwrap();
        assert!(a.is_colliding(&b));
    }

    #[test]
    fn mutations_notify_listeners() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut e = Entity::new(0.0, 0.0, 10.0, 10.0).unwrap();
        for kind in [EventKind::Move, EventKind::Velocity, EventKind::Deactivate, EventKind::Activate] {
            let seen = Rc::clone(&seen);
            e.on(kind, move |_, event| {
                seen.borrow_mut().push(*event);
                Ok(())
            });
        }

        e.set_position(5.0, 6.0);
        e.set_velocity(0.0, 1.0);
        e.deactivate();
        e.activate();

        assert_eq!(
            *seen.borrow(),
            vec![
                EntityEvent::Moved { from: Vec2::ZERO, to: Vec2::new(5.0, 6.0) },
                EntityEvent::VelocityChanged { velocity: Vec2::Y },
                EntityEvent::Deactivated,
                EntityEvent::Activated,
            ]
        );
    }

    #[test]
    fn throwing_listener_is_isolated() {
        let mut e = Entity::new(0.0, 0.0, 10.0, 10.0).unwrap();
        e.on(EventKind::Move, |_, _| anyhow::bail!("listener failure"));
        e.set_position(1.0, 1.0);
        assert_eq!(e.pos(), Vec2::ONE);
    }

    #[test]
    fn destroy_notifies_then_clears_listeners() {
        let destroyed = Rc::new(RefCell::new(0));
        let mut e = Entity::new(0.0, 0.0, 10.0, 10.0).unwrap();
        {
            let destroyed = Rc::clone(&destroyed);
            e.on(EventKind::Destroy, move |_, _| {
                *destroyed.borrow_mut() += 1;
                Ok(())
            });
        }
        e.destroy();
        assert_eq!(*destroyed.borrow(), 1);
        assert!(!e.is_active());
        assert!(!e.is_visible());
        assert_eq!(e.listener_count(), 0);

        e.destroy();
        assert_eq!(*destroyed.borrow(), 1);
    }
}
