use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::api::error::EngineError;
use crate::api::types::EntityId;
use crate::components::entity::Entity;
use crate::core::spatial::SpatialGrid;

/// Default grid cell size, roughly one sprite across.
pub const DEFAULT_CELL_SIZE: f32 = 50.0;

/// Broad-phase configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Side length of a grid cell in world units.
    pub cell_size: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

/// Outcome of a narrow-phase check between two entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    pub collided: bool,
    pub entity_a: EntityId,
    pub entity_b: EntityId,
    /// Centre of the overlap rectangle, when the pair collided.
    pub intersection: Option<Vec2>,
}

impl CollisionResult {
    /// Whether `id` is one side of this pair.
    pub fn involves(&self, id: EntityId) -> bool {
        self.entity_a == id || self.entity_b == id
    }

    /// The other side of the pair, if `id` is one side.
    pub fn other(&self, id: EntityId) -> Option<EntityId> {
        if self.entity_a == id {
            Some(self.entity_b)
        } else if self.entity_b == id {
            Some(self.entity_a)
        } else {
            None
        }
    }
}

/// Narrow-phase AABB checks plus a self-contained full-rebuild sweep.
#[derive(Debug, Clone)]
pub struct CollisionEngine {
    grid: SpatialGrid,
}

impl CollisionEngine {
    pub fn new(config: CollisionConfig) -> Self {
        Self {
            grid: SpatialGrid::new(config.cell_size),
        }
    }

    /// Exact AABB test between two entities. Activity flags are not
    /// consulted; sweeps filter inactive entities before calling this.
    pub fn check_pair(&self, a: &Entity, b: &Entity) -> Result<CollisionResult, EngineError> {
        check_dimensions(a)?;
        check_dimensions(b)?;

        let intersection = a.bounds().intersection(&b.bounds()).map(|i| i.center());
        Ok(CollisionResult {
            collided: intersection.is_some(),
            entity_a: a.id(),
            entity_b: b.id(),
            intersection,
        })
    }

    /// Rebuild the grid from scratch with every active entity and return all
    /// colliding pairs, sorted by id pair.
    ///
    /// The rebuild happens on every call; at a few hundred entities this is
    /// cheaper than keeping an incremental index consistent.
    pub fn update<'a>(
        &mut self,
        entities: impl IntoIterator<Item = &'a Entity>,
    ) -> Result<Vec<CollisionResult>, EngineError> {
        self.grid.clear();
        let mut lookup: HashMap<EntityId, &Entity> = HashMap::new();
        for entity in entities {
            if !entity.is_active() {
                continue;
            }
            self.grid.insert(entity.id(), &entity.bounds());
            lookup.insert(entity.id(), entity);
        }

        let mut hits = Vec::new();
        for (a, b) in self.grid.candidate_pairs() {
            let (Some(ea), Some(eb)) = (lookup.get(&a), lookup.get(&b)) else {
                continue;
            };
            let result = self.check_pair(ea, eb)?;
            if result.collided {
                hits.push(result);
            }
        }
        sort_results(&mut hits);
        log::debug!(
            "full sweep: {} entities, {} collisions",
            lookup.len(),
            hits.len()
        );
        Ok(hits)
    }
}

impl Default for CollisionEngine {
    fn default() -> Self {
        Self::new(CollisionConfig::default())
    }
}

fn check_dimensions(entity: &Entity) -> Result<(), EngineError> {
    let (width, height) = (entity.width(), entity.height());
    if width > 0.0 && height > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidDimension {
            id: entity.id(),
            width,
            height,
        })
    }
}

pub(crate) fn sort_results(results: &mut [CollisionResult]) {
    results.sort_by_key(|r| (r.entity_a, r.entity_b));
}
