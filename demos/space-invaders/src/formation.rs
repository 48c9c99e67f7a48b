use std::collections::HashMap;

use invaders_engine::{Entity, EntityId, EntityManager, EngineError, Rng};

use crate::rules::{kinds, InvaderRules};

/// Grid slot of one enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub row: u32,
    pub col: u32,
}

/// The marching block of enemies.
///
/// Enemies move through their velocity like everything else; the formation
/// only decides direction and speed, and drops the whole block one step when
/// it touches a side wall.
#[derive(Debug, Default)]
pub struct Formation {
    slots: HashMap<EntityId, Slot>,
    total: usize,
    /// +1.0 marching right, -1.0 marching left.
    direction: f32,
    base_speed: f32,
    speed: f32,
}

impl Formation {
    /// Spawn a fresh `rows × columns` block for `level`, centred horizontally.
    pub fn spawn(
        entities: &mut EntityManager,
        rules: &InvaderRules,
        level: u32,
    ) -> Result<Self, EngineError> {
        let left = (rules.world_width - rules.formation_width()) / 2.0;
        let base_speed = rules.level_speed(level);
        let mut slots = HashMap::new();

        for row in 0..rules.rows {
            for col in 0..rules.columns {
                let enemy = Entity::new(
                    left + col as f32 * rules.enemy_spacing_x,
                    rules.formation_top + row as f32 * rules.enemy_spacing_y,
                    rules.enemy_width,
                    rules.enemy_height,
                )?
                .with_kind(kinds::ENEMY)
                .with_velocity(glam::Vec2::X)
                .with_speed(base_speed);
                let id = entities.add_entity(enemy)?;
                slots.insert(id, Slot { row, col });
            }
        }

        log::info!(
            "level {level}: {} enemies marching at {base_speed:.1}",
            slots.len()
        );
        Ok(Self {
            total: slots.len(),
            slots,
            direction: 1.0,
            base_speed,
            speed: base_speed,
        })
    }

    pub fn slot(&self, id: EntityId) -> Option<Slot> {
        self.slots.get(&id).copied()
    }

    /// Forget a destroyed enemy. Returns its slot.
    pub fn remove(&mut self, id: EntityId) -> Option<Slot> {
        self.slots.remove(&id)
    }

    pub fn remaining(&self) -> usize {
        self.slots.len()
    }

    pub fn is_cleared(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn direction(&self) -> f32 {
        self.direction
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Turn at the walls and re-apply the current speed. Call after entities
    /// moved this tick. Returns true if the block dropped.
    pub fn steer(
        &mut self,
        entities: &mut EntityManager,
        rules: &InvaderRules,
    ) -> Result<bool, EngineError> {
        let Some((left, right)) = self.extent(entities) else {
            return Ok(false);
        };

        let hit_right = self.direction > 0.0 && right >= rules.world_width - rules.side_margin;
        let hit_left = self.direction < 0.0 && left <= rules.side_margin;
        let dropped = hit_right || hit_left;

        // Push the block back inside so it never sticks to the wall.
        let nudge = if hit_right {
            (rules.world_width - rules.side_margin) - right
        } else if hit_left {
            rules.side_margin - left
        } else {
            0.0
        };
        if dropped {
            self.direction = -self.direction;
        }

        let killed = (self.total - self.slots.len()) as f32 / self.total.max(1) as f32;
        let speed = self.base_speed * (1.0 + rules.thinning_speedup * killed);
        if !dropped && speed == self.speed {
            return Ok(false);
        }
        self.speed = speed;

        let direction = self.direction;
        let drop = if dropped { rules.drop_distance } else { 0.0 };
        for &id in self.slots.keys() {
            entities.modify(id, |e| {
                if dropped {
                    let p = e.pos();
                    e.set_position(p.x + nudge, p.y + drop);
                    e.set_velocity(direction, 0.0);
                }
                e.set_speed(speed);
            })?;
        }
        Ok(dropped)
    }

    /// Largest bottom edge among live enemies.
    pub fn lowest_edge(&self, entities: &EntityManager) -> Option<f32> {
        self.slots
            .keys()
            .filter_map(|id| entities.get(*id))
            .map(|e| e.bounds().bottom)
            .reduce(f32::max)
    }

    /// The bottom-most enemy of a random occupied column.
    pub fn pick_shooter(&self, entities: &EntityManager, rng: &mut Rng) -> Option<EntityId> {
        let mut lowest: HashMap<u32, (u32, EntityId)> = HashMap::new();
        for (&id, slot) in &self.slots {
            let entry = lowest.entry(slot.col).or_insert((slot.row, id));
            if slot.row > entry.0 {
                *entry = (slot.row, id);
            }
        }
        let mut columns: Vec<u32> = lowest.keys().copied().collect();
        if columns.is_empty() {
            return None;
        }
        columns.sort_unstable();
        let col = columns[rng.next_int(columns.len() as u32) as usize];
        lowest
            .get(&col)
            .map(|&(_, id)| id)
            .filter(|id| entities.contains(*id))
    }

    fn extent(&self, entities: &EntityManager) -> Option<(f32, f32)> {
        self.slots
            .keys()
            .filter_map(|id| entities.get(*id))
            .map(|e| {
                let b = e.bounds();
                (b.left, b.right)
            })
            .reduce(|(l1, r1), (l2, r2)| (l1.min(l2), r1.max(r2)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_rules() -> InvaderRules {
        InvaderRules {
            rows: 2,
            columns: 3,
            ..InvaderRules::default()
        }
    }

    #[test]
    fn spawns_full_grid_centred() {
        let rules = small_rules();
        let mut entities = EntityManager::default();
        let formation = Formation::spawn(&mut entities, &rules, 1).unwrap();
        assert_eq!(formation.remaining(), 6);
        assert_eq!(entities.count_kind(kinds::ENEMY), 6);

        let left = entities
            .iter()
            .map(|e| e.bounds().left)
            .fold(f32::INFINITY, f32::min);
        let right = entities
            .iter()
            .map(|e| e.bounds().right)
            .fold(f32::NEG_INFINITY, f32::max);
        assert!((left - (rules.world_width - right)).abs() < 1e-3);
    }

    #[test]
    fn wall_contact_drops_and_reverses() {
        let rules = small_rules();
        let mut entities = EntityManager::default();
        let mut formation = Formation::spawn(&mut entities, &rules, 1).unwrap();
        let top_before = formation_top(&entities);

        // March right until the wall turns the block around.
        let mut dropped = false;
        for _ in 0..2000 {
            entities.update_entities(1.0 / 60.0);
            if formation.steer(&mut entities, &rules).unwrap() {
                dropped = true;
                break;
            }
        }
        assert!(dropped);
        assert_eq!(formation.direction(), -1.0);
        assert_eq!(formation_top(&entities), top_before + rules.drop_distance);
        assert!(entities
            .iter()
            .all(|e| e.bounds().right <= rules.world_width - rules.side_margin + 1e-3));
        assert!(entities.iter().all(|e| e.velocity().x == -1.0));
    }

    #[test]
    fn thinning_speeds_up_the_march() {
        let rules = small_rules();
        let mut entities = EntityManager::default();
        let mut formation = Formation::spawn(&mut entities, &rules, 1).unwrap();
        let start = formation.speed();

        let victim = entities.iter().next().unwrap().id();
        entities.remove_entity(victim);
        formation.remove(victim);
        formation.steer(&mut entities, &rules).unwrap();

        assert!(formation.speed() > start);
        assert!(entities.iter().all(|e| e.speed() == formation.speed()));
    }

    #[test]
    fn shooter_is_lowest_in_its_column() {
        let rules = small_rules();
        let mut entities = EntityManager::default();
        let formation = Formation::spawn(&mut entities, &rules, 1).unwrap();
        let mut rng = Rng::new(3);
        for _ in 0..20 {
            let id = formation.pick_shooter(&entities, &mut rng).unwrap();
            assert_eq!(formation.slot(id).unwrap().row, rules.rows - 1);
        }
    }

    fn formation_top(entities: &EntityManager) -> f32 {
        entities
            .iter()
            .map(|e| e.bounds().top)
            .fold(f32::INFINITY, f32::min)
    }
}
