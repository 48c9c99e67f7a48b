use std::collections::{HashMap, HashSet};

use crate::api::types::EntityId;
use crate::core::bounds::Bounds;

/// Smallest usable cell size; non-positive configuration values clamp to it.
const MIN_CELL_SIZE: f32 = 1e-3;

/// Boxes covering more cells than this are kept out of the cell map and
/// paired by range overlap instead.
pub const MAX_CELLS_PER_ENTRY: u64 = 1024;

pub type CellKey = (i32, i32);

/// Inclusive range of grid cells covered by a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub min: CellKey,
    pub max: CellKey,
}

impl CellRange {
    pub fn contains(&self, key: CellKey) -> bool {
        key.0 >= self.min.0 && key.0 <= self.max.0 && key.1 >= self.min.1 && key.1 <= self.max.1
    }

    /// Number of cells in the range.
    pub fn area(&self) -> u64 {
        let w = (self.max.0 as i64 - self.min.0 as i64 + 1).max(0) as u64;
        let h = (self.max.1 as i64 - self.min.1 as i64 + 1).max(0) as u64;
        w.saturating_mul(h)
    }

    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.min.0 <= other.max.0
            && other.min.0 <= self.max.0
            && self.min.1 <= other.max.1
            && other.min.1 <= self.max.1
    }

    pub fn cells(&self) -> impl Iterator<Item = CellKey> {
        let (min, max) = (self.min, self.max);
        (min.1..=max.1).flat_map(move |cy| (min.0..=max.0).map(move |cx| (cx, cy)))
    }
}

/// Uniform grid broad phase.
///
/// Each id is registered in every cell its bounds touch (inclusive on the far
/// edge, so boxes that merely touch always share a cell). The grid keeps the
/// range each id was indexed under; `remove` and `update` use that stored
/// range, never the entity's current position.
///
/// Ids spanning more than `MAX_CELLS_PER_ENTRY` cells are oversized: they
/// live in a side list and pair with every id whose range overlaps theirs.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<CellKey, Vec<EntityId>>,
    indexed: HashMap<EntityId, CellRange>,
    oversized: Vec<EntityId>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() {
            cell_size.max(MIN_CELL_SIZE)
        } else {
            MIN_CELL_SIZE
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            indexed: HashMap::new(),
            oversized: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn cell_of(&self, x: f32, y: f32) -> CellKey {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    pub fn range_of(&self, bounds: &Bounds) -> CellRange {
        CellRange {
            min: self.cell_of(bounds.left, bounds.top),
            max: self.cell_of(bounds.right, bounds.bottom),
        }
    }

    /// Index `id` under `bounds`. An id that is already present is moved.
    pub fn insert(&mut self, id: EntityId, bounds: &Bounds) {
        let range = self.range_of(bounds);
        if let Some(old) = self.indexed.get(&id).copied() {
            if old == range {
                return;
            }
            self.unlink(id, old);
        }
        if range.area() > MAX_CELLS_PER_ENTRY {
            self.oversized.push(id);
        } else {
            for key in range.cells() {
                self.cells.entry(key).or_default().push(id);
            }
        }
        self.indexed.insert(id, range);
    }

    /// Re-index `id` under its new bounds.
    pub fn update(&mut self, id: EntityId, bounds: &Bounds) {
        self.insert(id, bounds);
    }

    /// Drop `id` from every cell it was indexed in. Returns false if unknown.
    pub fn remove(&mut self, id: EntityId) -> bool {
        match self.indexed.remove(&id) {
            Some(range) => {
                self.unlink(id, range);
                true
            }
            None => false,
        }
    }

    fn unlink(&mut self, id: EntityId, range: CellRange) {
        if range.area() > MAX_CELLS_PER_ENTRY {
            self.oversized.retain(|&other| other != id);
            return;
        }
        for key in range.cells() {
            if let Some(ids) = self.cells.get_mut(&key) {
                ids.retain(|&other| other != id);
                if ids.is_empty() {
                    self.cells.remove(&key);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.indexed.clear();
        self.oversized.clear();
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.indexed.contains_key(&id)
    }

    /// The cell range `id` is currently indexed under.
    pub fn indexed_range(&self, id: EntityId) -> Option<CellRange> {
        self.indexed.get(&id).copied()
    }

    /// Number of indexed ids.
    pub fn len(&self) -> usize {
        self.indexed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty()
    }

    /// Number of occupied cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of ids kept outside the cell map.
    pub fn oversized_count(&self) -> usize {
        self.oversized.len()
    }

    /// Every pair of ids sharing at least one cell, each pair once, ordered
    /// so that `a < b`. Pairs whose boxes don't actually overlap are included;
    /// the narrow phase filters them.
    pub fn candidate_pairs(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        let mut seen: HashSet<(EntityId, EntityId)> = HashSet::new();
        let in_cells = self.cells.values().flat_map(|ids| {
            (0..ids.len())
                .flat_map(move |i| (i + 1..ids.len()).map(move |j| ordered(ids[i], ids[j])))
        });
        let with_oversized = self.oversized.iter().flat_map(move |&big| {
            let range = self.indexed.get(&big).copied();
            self.indexed.iter().filter_map(move |(&other, other_range)| {
                let hit = other != big && range.is_some_and(|r| r.overlaps(other_range));
                hit.then(|| ordered(big, other))
            })
        });
        in_cells
            .chain(with_oversized)
            .filter(move |pair| seen.insert(*pair))
    }

    /// Ids indexed in any cell overlapping `bounds`, deduplicated.
    /// Callers still need an exact bounds test.
    pub fn query(&self, bounds: &Bounds) -> Vec<EntityId> {
        let range = self.range_of(bounds);
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut collect = |ids: &Vec<EntityId>| {
            for &id in ids {
                if seen.insert(id) {
                    out.push(id);
                }
            }
        };

        if range.area() > self.cells.len() as u64 {
            // Huge region: cheaper to scan the occupied cells.
            for (key, ids) in &self.cells {
                if range.contains(*key) {
                    collect(ids);
                }
            }
        } else {
            for key in range.cells() {
                if let Some(ids) = self.cells.get(&key) {
                    collect(ids);
                }
            }
        }
        for &id in &self.oversized {
            if self.indexed.get(&id).is_some_and(|r| r.overlaps(&range)) && seen.insert(id) {
                out.push(id);
            }
        }
        out
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(crate::core::collision::DEFAULT_CELL_SIZE)
    }
}

fn ordered(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
