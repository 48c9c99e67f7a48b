use std::collections::{HashMap, HashSet};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::api::error::EngineError;
use crate::api::types::EntityId;
use crate::components::entity::Entity;
use crate::core::bounds::Bounds;
use crate::core::collision::{sort_results, CollisionConfig, CollisionEngine, CollisionResult};
use crate::core::spatial::SpatialGrid;

/// Partial update applied by `EntityManager::update_entity`.
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPatch {
    pub pos: Option<Vec2>,
    pub size: Option<Vec2>,
    pub velocity: Option<Vec2>,
    pub speed: Option<f32>,
    pub kind: Option<String>,
    pub active: Option<bool>,
    pub visible: Option<bool>,
}

impl EntityPatch {
    pub fn position(x: f32, y: f32) -> Self {
        Self {
            pos: Some(Vec2::new(x, y)),
            ..Self::default()
        }
    }

    pub fn velocity(vx: f32, vy: f32) -> Self {
        Self {
            velocity: Some(Vec2::new(vx, vy)),
            ..Self::default()
        }
    }
}

/// Counters describing the manager's state after the last sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerMetrics {
    pub entities: usize,
    pub active: usize,
    pub occupied_cells: usize,
    pub candidate_pairs: usize,
    pub collisions: usize,
}

/// Owns every entity plus two secondary indexes: kind tag → ids and the
/// spatial grid. Anything in an index is also in the canonical map, and
/// every entity is indexed under its current bounds.
#[derive(Debug)]
pub struct EntityManager {
    entities: HashMap<EntityId, Entity>,
    kinds: HashMap<String, HashSet<EntityId>>,
    grid: SpatialGrid,
    engine: CollisionEngine,
    metrics: ManagerMetrics,
}

impl EntityManager {
    pub fn new(config: CollisionConfig) -> Self {
        Self {
            entities: HashMap::with_capacity(256),
            kinds: HashMap::new(),
            grid: SpatialGrid::new(config.cell_size),
            engine: CollisionEngine::new(config),
            metrics: ManagerMetrics::default(),
        }
    }

    /// Store an entity. Fails on a duplicate id or a malformed entity.
    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId, EngineError> {
        let id = entity.id();
        if self.entities.contains_key(&id) {
            return Err(EngineError::DuplicateId(id));
        }
        validate_entity(&entity)?;

        self.grid.insert(id, &entity.bounds());
        self.kinds
            .entry(entity.kind().to_string())
            .or_default()
            .insert(id);
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Destroy and drop an entity. Unknown ids are not an error: returns false.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        let Some(mut entity) = self.entities.remove(&id) else {
            return false;
        };
        self.grid.remove(id);
        self.unlink_kind(entity.kind(), id);
        entity.destroy();
        true
    }

    /// Merge `patch` into an existing entity and re-index it.
    /// Nothing is applied if the merged state would be invalid.
    pub fn update_entity(&mut self, id: EntityId, patch: EntityPatch) -> Result<(), EngineError> {
        let entity = self.entities.get(&id).ok_or(EngineError::NotFound(id))?;
        validate_patch(&patch)?;
        let old_kind = entity.kind().to_string();

        // Drop the stale cells before the merge, insert fresh ones after.
        self.grid.remove(id);
        let Some(entity) = self.entities.get_mut(&id) else {
            return Err(EngineError::NotFound(id));
        };
        if let Some(pos) = patch.pos {
            entity.set_position(pos.x, pos.y);
        }
        if let Some(size) = patch.size {
            entity.set_size(size);
        }
        if let Some(velocity) = patch.velocity {
            entity.set_velocity(velocity.x, velocity.y);
        }
        if let Some(speed) = patch.speed {
            entity.set_speed(speed);
        }
        if let Some(kind) = patch.kind {
            entity.set_kind(kind);
        }
        match patch.active {
            Some(true) if !entity.is_active() => entity.activate(),
            Some(false) if entity.is_active() => entity.deactivate(),
            _ => {}
        }
        if let Some(visible) = patch.visible {
            entity.set_visible(visible);
        }
        let bounds = entity.bounds();
        let new_kind = entity.kind().to_string();

        self.grid.insert(id, &bounds);
        if new_kind != old_kind {
            self.unlink_kind(&old_kind, id);
            self.kinds.entry(new_kind).or_default().insert(id);
        }
        Ok(())
    }

    /// Mutable access to one entity; the grid is refreshed afterwards.
    /// The kind tag cannot change through this path.
    pub fn modify<R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Entity) -> R,
    ) -> Result<R, EngineError> {
        let entity = self.entities.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        let result = f(entity);
        self.grid.update(id, &entity.bounds());
        Ok(result)
    }

    /// Advance every active entity by `dt` seconds and re-index it.
    pub fn update_entities(&mut self, dt: f32) {
        for (id, entity) in self.entities.iter_mut() {
            if !entity.is_active() {
                continue;
            }
            entity.update(dt);
            self.grid.update(*id, &entity.bounds());
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Destroy every entity.
    pub fn clear(&mut self) {
        for entity in self.entities.values_mut() {
            entity.destroy();
        }
        self.entities.clear();
        self.kinds.clear();
        self.grid.clear();
    }

    /// Active entities carrying `kind`, in no particular order.
    pub fn entities_by_kind(&self, kind: &str) -> Vec<&Entity> {
        let Some(ids) = self.kinds.get(kind) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.entities.get(id))
            .filter(|e| e.is_active())
            .collect()
    }

    /// Number of active entities carrying `kind`.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.kinds.get(kind).map_or(0, |ids| {
            ids.iter()
                .filter(|&&id| self.entities.get(&id).is_some_and(|e| e.is_active()))
                .count()
        })
    }

    /// Active entities whose bounds intersect `region`.
    pub fn entities_in_region(&self, region: &Bounds) -> Vec<&Entity> {
        self.grid
            .query(region)
            .into_iter()
            .filter_map(|id| self.entities.get(&id))
            .filter(|e| e.is_active() && e.bounds().intersects(region))
            .collect()
    }

    /// Every colliding pair of active entities, each pair once, sorted by id.
    ///
    /// The result reflects the state at the start of the call; entities the
    /// caller adds or removes while handling it show up in the next sweep.
    pub fn detect_collisions(&mut self) -> Result<Vec<CollisionResult>, EngineError> {
        let mut candidates = 0;
        let mut hits = Vec::new();
        for (a, b) in self.grid.candidate_pairs() {
            candidates += 1;
            let (Some(ea), Some(eb)) = (self.entities.get(&a), self.entities.get(&b)) else {
                continue;
            };
            if !ea.is_active() || !eb.is_active() {
                continue;
            }
            let result = self.engine.check_pair(ea, eb)?;
            if result.collided {
                hits.push(result);
            }
        }
        sort_results(&mut hits);

        self.metrics = ManagerMetrics {
            entities: self.entities.len(),
            active: self.entities.values().filter(|e| e.is_active()).count(),
            occupied_cells: self.grid.cell_count(),
            candidate_pairs: candidates,
            collisions: hits.len(),
        };
        log::debug!(
            "collision sweep: {} candidates, {} hits",
            candidates,
            hits.len()
        );
        Ok(hits)
    }

    /// Same answer as `detect_collisions`, computed by the engine's
    /// full-rebuild sweep instead of the maintained grid.
    pub fn detect_collisions_rebuild(&mut self) -> Result<Vec<CollisionResult>, EngineError> {
        self.engine.update(self.entities.values())
    }

    /// Snapshot of the counters from the last sweep.
    pub fn metrics(&self) -> ManagerMetrics {
        self.metrics
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    fn unlink_kind(&mut self, kind: &str, id: EntityId) {
        if let Some(ids) = self.kinds.get_mut(kind) {
            ids.remove(&id);
            if ids.is_empty() {
                self.kinds.remove(kind);
            }
        }
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new(CollisionConfig::default())
    }
}

/// Shape check run once at the `add_entity` boundary.
pub fn validate_entity(entity: &Entity) -> Result<(), EngineError> {
    if entity.id().0 == 0 {
        return Err(EngineError::validation("id", "must be non-zero"));
    }
    if entity.kind().is_empty() {
        return Err(EngineError::validation("kind", "must be non-empty"));
    }
    check_vec("position", entity.pos())?;
    check_vec("velocity", entity.velocity())?;
    check_size(entity.size())?;
    if !entity.speed().is_finite() {
        return Err(EngineError::validation(
            "speed",
            format!("must be finite, got {}", entity.speed()),
        ));
    }
    Ok(())
}

/// The stored entity was validated on insert; only patched fields can break it.
fn validate_patch(patch: &EntityPatch) -> Result<(), EngineError> {
    if let Some(pos) = patch.pos {
        check_vec("position", pos)?;
    }
    if let Some(size) = patch.size {
        check_size(size)?;
    }
    if let Some(velocity) = patch.velocity {
        check_vec("velocity", velocity)?;
    }
    if let Some(speed) = patch.speed {
        if !speed.is_finite() {
            return Err(EngineError::validation(
                "speed",
                format!("must be finite, got {speed}"),
            ));
        }
    }
    if patch.kind.as_deref() == Some("") {
        return Err(EngineError::validation("kind", "must be non-empty"));
    }
    Ok(())
}

fn check_vec(field: &'static str, v: Vec2) -> Result<(), EngineError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(EngineError::validation(field, format!("must be finite, got {v}")))
    }
}

fn check_size(size: Vec2) -> Result<(), EngineError> {
    if !size.is_finite() || size.x <= 0.0 || size.y <= 0.0 {
        return Err(EngineError::validation(
            "size",
            format!("must be positive, got {}x{}", size.x, size.y),
        ));
    }
    Ok(())
}
