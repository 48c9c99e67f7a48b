use serde::{Deserialize, Serialize};

use crate::api::error::EngineError;
use crate::api::types::{GameEvent, SoundEvent};
use crate::core::collision::CollisionConfig;
use crate::core::game_loop::LoopConfig;
use crate::core::manager::EntityManager;
use crate::input::queue::InputQueue;
use crate::renderer::draw::DrawList;

/// Configuration for the engine, provided by the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// World width in game units.
    pub world_width: f32,
    pub world_height: f32,
    /// Loop timing and failure tolerance.
    pub game_loop: LoopConfig,
    /// Broad-phase grid settings.
    pub collision: CollisionConfig,
    /// Maximum draw commands per frame (default: 512).
    pub max_draw_commands: usize,
    /// Maximum sound events per frame (default: 32).
    pub max_sounds: usize,
    /// Maximum game events per frame (default: 32).
    pub max_events: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            world_width: 800.0,
            world_height: 600.0,
            game_loop: LoopConfig::default(),
            collision: CollisionConfig::default(),
            max_draw_commands: 512,
            max_sounds: 32,
            max_events: 32,
        }
    }
}

impl GameConfig {
    /// Parse a config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::Argument(format!("invalid game config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.world_width > 0.0 && self.world_height > 0.0)
            || !self.world_width.is_finite()
            || !self.world_height.is_finite()
        {
            return Err(EngineError::Argument(format!(
                "world size must be positive, got {}x{}",
                self.world_width, self.world_height
            )));
        }
        if !(self.collision.cell_size.is_finite() && self.collision.cell_size > 0.0) {
            return Err(EngineError::Argument(format!(
                "cell size must be positive, got {}",
                self.collision.cell_size
            )));
        }
        self.game_loop.validate()
    }
}

/// The contract every game must fulfil.
pub trait Game {
    /// Return engine configuration. Called once before init.
    fn config(&self) -> GameConfig {
        GameConfig::default()
    }

    /// Set up initial state and spawn entities.
    fn init(&mut self, ctx: &mut EngineContext) -> anyhow::Result<()>;

    /// One fixed-interval tick. `dt_ms` is the loop's frame interval.
    /// An error fails the current frame only.
    fn update(&mut self, ctx: &mut EngineContext, input: &InputQueue, dt_ms: f64)
        -> anyhow::Result<()>;

    /// Read-only render pass. The default draws every visible entity.
    fn render(&self, ctx: &EngineContext, draws: &mut DrawList) {
        crate::systems::render::draw_entities(ctx.entities.iter(), draws, |_| 0);
    }
}

/// Mutable engine state passed to `Game::init` and `Game::update`.
#[derive(Debug)]
pub struct EngineContext {
    pub entities: EntityManager,
    pub sounds: Vec<SoundEvent>,
    pub events: Vec<GameEvent>,
}

impl EngineContext {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            entities: EntityManager::new(config.collision),
            sounds: Vec::with_capacity(config.max_sounds),
            events: Vec::with_capacity(config.max_events),
        }
    }

    /// Emit a sound event to be forwarded to JS.
    pub fn emit_sound(&mut self, event: SoundEvent) {
        self.sounds.push(event);
    }

    /// Emit a game event to be forwarded to JS.
    pub fn emit_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Clear per-frame transient data (sounds, events).
    pub fn clear_frame_data(&mut self) {
        self.sounds.clear();
        self.events.clear();
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(&GameConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_fills_defaults() {
        let config = GameConfig::from_json(r#"{ "world_width": 224, "max_sounds": 8 }"#).unwrap();
        assert_eq!(config.world_width, 224.0);
        assert_eq!(config.world_height, 600.0);
        assert_eq!(config.max_sounds, 8);
        assert_eq!(config.game_loop, LoopConfig::default());
    }

    #[test]
    fn from_json_nested_loop_config() {
        let config =
            GameConfig::from_json(r#"{ "game_loop": { "max_errors": 5 }, "collision": { "cell_size": 32 } }"#)
                .unwrap();
        assert_eq!(config.game_loop.max_errors, 5);
        assert_eq!(config.game_loop.frame_interval_ms, 1000.0 / 60.0);
        assert_eq!(config.collision.cell_size, 32.0);
    }

    #[test]
    fn from_json_rejects_garbage_and_bad_values() {
        assert!(matches!(
            GameConfig::from_json("not json"),
            Err(EngineError::Argument(_))
        ));
        assert!(GameConfig::from_json(r#"{ "world_width": -1 }"#).is_err());
        assert!(GameConfig::from_json(r#"{ "collision": { "cell_size": 0 } }"#).is_err());
    }

    #[test]
    fn frame_data_is_cleared() {
        let mut ctx = EngineContext::default();
        ctx.emit_sound(SoundEvent(1));
        ctx.emit_event(GameEvent::new(2.0, 3.0));
        assert_eq!(ctx.sounds.len(), 1);
        assert_eq!(ctx.events.len(), 1);
        ctx.clear_frame_data();
        assert!(ctx.sounds.is_empty());
        assert!(ctx.events.is_empty());
    }
}
