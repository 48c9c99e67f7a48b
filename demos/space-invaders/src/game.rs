use glam::Vec2;
use invaders_engine::*;

use crate::formation::Formation;
use crate::rules::{
    events, kinds, sounds, styles, InvaderRules, KEY_A, KEY_D, KEY_FIRE, KEY_LEFT, KEY_PAUSE,
    KEY_RESTART, KEY_RIGHT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Playing,
    Paused,
    GameOver,
}

/// Space Invaders: one ship, a marching 5×11 formation, shots both ways.
pub struct SpaceInvaders {
    rules: InvaderRules,
    rng: Rng,
    formation: Formation,
    player: Option<EntityId>,
    score: u32,
    lives: u32,
    level: u32,
    phase: Phase,
    /// Milliseconds until the player may fire again.
    cooldown_ms: f64,
}

impl SpaceInvaders {
    pub fn new() -> Self {
        Self::with_rules(InvaderRules::default())
    }

    pub fn with_rules(rules: InvaderRules) -> Self {
        Self {
            rng: Rng::new(rules.seed),
            lives: rules.lives,
            rules,
            formation: Formation::default(),
            player: None,
            score: 0,
            level: 1,
            phase: Phase::Playing,
            cooldown_ms: 0.0,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn player(&self) -> Option<EntityId> {
        self.player
    }

    pub fn formation(&self) -> &Formation {
        &self.formation
    }

    pub fn rules(&self) -> &InvaderRules {
        &self.rules
    }

    fn player_start(&self) -> Vec2 {
        Vec2::new(
            (self.rules.world_width - self.rules.player_width) / 2.0,
            self.rules.player_line(),
        )
    }

    /// Wipe the board and start again from level 1.
    fn reset(&mut self, ctx: &mut EngineContext) -> anyhow::Result<()> {
        ctx.entities.clear();
        self.rng = Rng::new(self.rules.seed);
        self.score = 0;
        self.lives = self.rules.lives;
        self.level = 1;
        self.phase = Phase::Playing;
        self.cooldown_ms = 0.0;

        let start = self.player_start();
        let player = Entity::new(
            start.x,
            start.y,
            self.rules.player_width,
            self.rules.player_height,
        )?
        .with_kind(kinds::PLAYER);
        self.player = Some(ctx.entities.add_entity(player)?);
        self.formation = Formation::spawn(&mut ctx.entities, &self.rules, self.level)?;

        ctx.emit_event(GameEvent::new(events::SCORE, 0.0));
        ctx.emit_event(GameEvent::new(events::LIVES, self.lives as f32));
        ctx.emit_event(GameEvent::new(events::LEVEL, self.level as f32));
        Ok(())
    }

    fn handle_pause(&mut self, ctx: &mut EngineContext, input: &InputQueue) {
        if !input.was_pressed(KEY_PAUSE) {
            return;
        }
        self.phase = match self.phase {
            Phase::Playing => Phase::Paused,
            Phase::Paused => Phase::Playing,
            Phase::GameOver => return,
        };
        let paused = self.phase == Phase::Paused;
        log::info!("{}", if paused { "paused" } else { "resumed" });
        ctx.emit_event(GameEvent::new(events::PAUSED, if paused { 1.0 } else { 0.0 }));
    }

    fn move_player(&mut self, ctx: &mut EngineContext, input: &InputQueue, dt: f32) -> anyhow::Result<()> {
        let Some(id) = self.player else {
            return Ok(());
        };
        let mut dir = 0.0;
        if input.is_held(KEY_LEFT) || input.is_held(KEY_A) {
            dir -= 1.0;
        }
        if input.is_held(KEY_RIGHT) || input.is_held(KEY_D) {
            dir += 1.0;
        }
        if dir == 0.0 {
            return Ok(());
        }
        let max_x = self.rules.world_width - self.rules.player_width;
        let step = dir * self.rules.player_speed * dt;
        ctx.entities.modify(id, |e| {
            let p = e.pos();
            e.set_position((p.x + step).clamp(0.0, max_x), p.y);
        })?;
        Ok(())
    }

    fn player_fire(&mut self, ctx: &mut EngineContext, input: &InputQueue) -> anyhow::Result<()> {
        if self.cooldown_ms > 0.0 || ctx.entities.count_kind(kinds::PLAYER_SHOT) > 0 {
            return Ok(());
        }
        if !(input.was_pressed(KEY_FIRE) || input.is_held(KEY_FIRE)) {
            return Ok(());
        }
        let Some(player) = self.player.and_then(|id| ctx.entities.get(id)) else {
            return Ok(());
        };
        let b = player.bounds();
        let shot = Entity::new(
            b.center().x - self.rules.shot_width / 2.0,
            b.top - self.rules.shot_height,
            self.rules.shot_width,
            self.rules.shot_height,
        )?
        .with_kind(kinds::PLAYER_SHOT)
        .with_velocity(Vec2::NEG_Y)
        .with_speed(self.rules.shot_speed);
        ctx.entities.add_entity(shot)?;
        self.cooldown_ms = self.rules.shot_cooldown_ms;
        ctx.emit_sound(SoundEvent(sounds::SHOOT));
        Ok(())
    }

    fn enemy_fire(&mut self, ctx: &mut EngineContext) -> anyhow::Result<()> {
        if ctx.entities.count_kind(kinds::ENEMY_SHOT) >= self.rules.max_enemy_shots
            || !self.rng.chance(self.rules.enemy_fire_chance)
        {
            return Ok(());
        }
        let Some(shooter) = self
            .formation
            .pick_shooter(&ctx.entities, &mut self.rng)
            .and_then(|id| ctx.entities.get(id))
        else {
            return Ok(());
        };
        let b = shooter.bounds();
        let shot = Entity::new(
            b.center().x - self.rules.shot_width / 2.0,
            b.bottom,
            self.rules.shot_width,
            self.rules.shot_height,
        )?
        .with_kind(kinds::ENEMY_SHOT)
        .with_velocity(Vec2::Y)
        .with_speed(self.rules.enemy_shot_speed);
        ctx.entities.add_entity(shot)?;
        ctx.emit_sound(SoundEvent(sounds::ENEMY_SHOOT));
        Ok(())
    }

    /// Drop projectiles that left the world.
    fn cull_projectiles(&mut self, ctx: &mut EngineContext) {
        let world = Bounds::new(0.0, 0.0, self.rules.world_width, self.rules.world_height);
        let gone: Vec<EntityId> = [kinds::PLAYER_SHOT, kinds::ENEMY_SHOT]
            .iter()
            .flat_map(|kind| ctx.entities.entities_by_kind(kind))
            .filter(|e| !e.bounds().intersects(&world))
            .map(|e| e.id())
            .collect();
        for id in gone {
            ctx.entities.remove_entity(id);
        }
    }

    fn resolve_collisions(&mut self, ctx: &mut EngineContext) -> anyhow::Result<()> {
        let hits = ctx.entities.detect_collisions()?;
        // At most one life is lost per tick; extra shots on the ship are absorbed.
        let mut player_was_hit = false;
        for hit in hits {
            if self.phase == Phase::GameOver {
                break;
            }
            // An earlier hit this tick may already have removed one side.
            let (Some(a), Some(b)) = (
                ctx.entities.get(hit.entity_a).map(|e| e.kind().to_string()),
                ctx.entities.get(hit.entity_b).map(|e| e.kind().to_string()),
            ) else {
                continue;
            };
            let ((ka, ida), (kb, idb)) = order_pair((a, hit.entity_a), (b, hit.entity_b));

            match (ka.as_str(), kb.as_str()) {
                (kinds::ENEMY, kinds::PLAYER_SHOT) => {
                    ctx.entities.remove_entity(idb);
                    self.kill_enemy(ctx, ida);
                }
                (kinds::ENEMY_SHOT, kinds::PLAYER) => {
                    ctx.entities.remove_entity(ida);
                    if !player_was_hit {
                        player_was_hit = true;
                        self.player_hit(ctx)?;
                    }
                }
                (kinds::ENEMY_SHOT, kinds::PLAYER_SHOT) => {
                    ctx.entities.remove_entity(ida);
                    ctx.entities.remove_entity(idb);
                }
                (kinds::ENEMY, kinds::PLAYER) => self.game_over(ctx),
                _ => {}
            }
        }
        Ok(())
    }

    fn kill_enemy(&mut self, ctx: &mut EngineContext, id: EntityId) {
        let Some(slot) = self.formation.remove(id) else {
            return;
        };
        ctx.entities.remove_entity(id);
        self.score += self.rules.score_for_row(slot.row);
        ctx.emit_sound(SoundEvent(sounds::EXPLOSION));
        ctx.emit_event(GameEvent::new(events::SCORE, self.score as f32));
    }

    fn player_hit(&mut self, ctx: &mut EngineContext) -> anyhow::Result<()> {
        self.lives = self.lives.saturating_sub(1);
        ctx.emit_sound(SoundEvent(sounds::PLAYER_HIT));
        ctx.emit_event(GameEvent::new(events::LIVES, self.lives as f32));
        if self.lives == 0 {
            self.game_over(ctx);
            return Ok(());
        }
        if let Some(id) = self.player {
            let start = self.player_start();
            ctx.entities
                .update_entity(id, EntityPatch::position(start.x, start.y))?;
        }
        Ok(())
    }

    fn game_over(&mut self, ctx: &mut EngineContext) {
        if self.phase == Phase::GameOver {
            return;
        }
        self.phase = Phase::GameOver;
        log::info!("game over at level {} with {} points", self.level, self.score);
        ctx.emit_sound(SoundEvent(sounds::GAME_OVER));
        ctx.emit_event(GameEvent::new(events::GAME_OVER, self.score as f32));
    }

    fn next_level(&mut self, ctx: &mut EngineContext) -> anyhow::Result<()> {
        for kind in [kinds::PLAYER_SHOT, kinds::ENEMY_SHOT] {
            let ids: Vec<EntityId> = ctx
                .entities
                .entities_by_kind(kind)
                .iter()
                .map(|e| e.id())
                .collect();
            for id in ids {
                ctx.entities.remove_entity(id);
            }
        }
        self.level += 1;
        self.cooldown_ms = 0.0;
        self.formation = Formation::spawn(&mut ctx.entities, &self.rules, self.level)?;
        ctx.emit_sound(SoundEvent(sounds::LEVEL_UP));
        ctx.emit_event(GameEvent::new(events::LEVEL, self.level as f32));
        Ok(())
    }

    fn style_of(&self, entity: &Entity) -> u32 {
        match entity.kind() {
            kinds::PLAYER => styles::PLAYER,
            kinds::PLAYER_SHOT => styles::PLAYER_SHOT,
            kinds::ENEMY_SHOT => styles::ENEMY_SHOT,
            _ => {
                let row = self.formation.slot(entity.id()).map_or(0, |s| s.row);
                // Top row, middle rows, bottom rows.
                styles::ENEMY_TOP + (row.min(4) + 1) / 2
            }
        }
    }
}

impl Default for SpaceInvaders {
    fn default() -> Self {
        Self::new()
    }
}

/// Order a pair so the kind names compare ascending.
fn order_pair(
    a: (String, EntityId),
    b: (String, EntityId),
) -> ((String, EntityId), (String, EntityId)) {
    if a.0 <= b.0 {
        (a, b)
    } else {
        (b, a)
    }
}

impl Game for SpaceInvaders {
    fn config(&self) -> GameConfig {
        GameConfig {
            world_width: self.rules.world_width,
            world_height: self.rules.world_height,
            ..GameConfig::default()
        }
    }

    fn init(&mut self, ctx: &mut EngineContext) -> anyhow::Result<()> {
        self.rules.validate()?;
        self.reset(ctx)?;
        log::info!(
            "SpaceInvaders: {}x{} formation, {} lives",
            self.rules.rows,
            self.rules.columns,
            self.lives
        );
        Ok(())
    }

    fn update(&mut self, ctx: &mut EngineContext, input: &InputQueue, dt_ms: f64) -> anyhow::Result<()> {
        self.handle_pause(ctx, input);

        match self.phase {
            Phase::Paused => return Ok(()),
            Phase::GameOver => {
                if input.was_pressed(KEY_RESTART) {
                    log::info!("restart");
                    self.reset(ctx)?;
                }
                return Ok(());
            }
            Phase::Playing => {}
        }

        let dt = (dt_ms / 1000.0) as f32;
        self.cooldown_ms = (self.cooldown_ms - dt_ms).max(0.0);

        self.move_player(ctx, input, dt)?;
        self.player_fire(ctx, input)?;
        self.enemy_fire(ctx)?;

        ctx.entities.update_entities(dt);
        self.formation.steer(&mut ctx.entities, &self.rules)?;
        self.cull_projectiles(ctx);
        self.resolve_collisions(ctx)?;

        if self.phase != Phase::Playing {
            return Ok(());
        }
        if self
            .formation
            .lowest_edge(&ctx.entities)
            .is_some_and(|bottom| bottom >= self.rules.player_line())
        {
            self.game_over(ctx);
        } else if self.formation.is_cleared() {
            self.next_level(ctx)?;
        }
        Ok(())
    }

    fn render(&self, ctx: &EngineContext, draws: &mut DrawList) {
        draw_entities(ctx.entities.iter(), draws, |e| self.style_of(e));
    }
}
