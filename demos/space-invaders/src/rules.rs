use anyhow::Context;
use serde::{Deserialize, Serialize};

// DOM key codes.
pub const KEY_LEFT: u32 = 37;
pub const KEY_RIGHT: u32 = 39;
pub const KEY_A: u32 = 65;
pub const KEY_D: u32 = 68;
pub const KEY_FIRE: u32 = 32;
pub const KEY_PAUSE: u32 = 80;
pub const KEY_RESTART: u32 = 13;

/// Entity kind tags.
pub mod kinds {
    pub const PLAYER: &str = "player";
    pub const ENEMY: &str = "enemy";
    pub const PLAYER_SHOT: &str = "player_shot";
    pub const ENEMY_SHOT: &str = "enemy_shot";
}

/// Sound ids, mapped to audio clips by the JS side.
pub mod sounds {
    pub const SHOOT: u32 = 1;
    pub const ENEMY_SHOOT: u32 = 2;
    pub const EXPLOSION: u32 = 3;
    pub const PLAYER_HIT: u32 = 4;
    pub const LEVEL_UP: u32 = 5;
    pub const GAME_OVER: u32 = 6;
}

/// `GameEvent::kind` values. Payload in `a` unless noted.
pub mod events {
    pub const SCORE: f32 = 1.0;
    pub const LIVES: f32 = 2.0;
    pub const LEVEL: f32 = 3.0;
    /// `a` = final score.
    pub const GAME_OVER: f32 = 4.0;
    /// `a` = 1.0 when paused, 0.0 when resumed.
    pub const PAUSED: f32 = 5.0;
}

/// Palette indices written into draw commands.
pub mod styles {
    pub const PLAYER: u32 = 1;
    /// Enemy rows use `ENEMY_TOP + row_band`.
    pub const ENEMY_TOP: u32 = 2;
    pub const PLAYER_SHOT: u32 = 5;
    pub const ENEMY_SHOT: u32 = 6;
}

/// Tunable gameplay rules. Speeds are world units per second, times are
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvaderRules {
    pub world_width: f32,
    pub world_height: f32,

    pub rows: u32,
    pub columns: u32,
    pub enemy_width: f32,
    pub enemy_height: f32,
    /// Distance between neighbouring enemies' top-left corners.
    pub enemy_spacing_x: f32,
    pub enemy_spacing_y: f32,
    pub formation_top: f32,
    /// Gap kept between the formation and the side walls.
    pub side_margin: f32,
    pub march_speed: f32,
    /// March speed multiplier applied per level.
    pub level_speedup: f32,
    /// Extra speed as the formation thins out: at one enemy left the march
    /// runs at `1 + thinning_speedup` times the level speed.
    pub thinning_speedup: f32,
    pub drop_distance: f32,

    pub player_width: f32,
    pub player_height: f32,
    pub player_speed: f32,
    /// Gap between the player's bottom edge and the world floor.
    pub player_floor_gap: f32,
    pub lives: u32,

    pub shot_width: f32,
    pub shot_height: f32,
    pub shot_speed: f32,
    pub shot_cooldown_ms: f64,

    pub enemy_shot_speed: f32,
    /// Chance per tick that some enemy fires.
    pub enemy_fire_chance: f32,
    pub max_enemy_shots: usize,

    /// Points per kill, top row first; the last entry covers deeper rows.
    pub row_scores: Vec<u32>,
    pub seed: u64,
}

impl Default for InvaderRules {
    fn default() -> Self {
        Self {
            world_width: 800.0,
            world_height: 600.0,
            rows: 5,
            columns: 11,
            enemy_width: 32.0,
            enemy_height: 22.0,
            enemy_spacing_x: 48.0,
            enemy_spacing_y: 36.0,
            formation_top: 80.0,
            side_margin: 10.0,
            march_speed: 30.0,
            level_speedup: 1.2,
            thinning_speedup: 3.0,
            drop_distance: 16.0,
            player_width: 44.0,
            player_height: 20.0,
            player_speed: 240.0,
            player_floor_gap: 24.0,
            lives: 3,
            shot_width: 4.0,
            shot_height: 14.0,
            shot_speed: 480.0,
            shot_cooldown_ms: 350.0,
            enemy_shot_speed: 220.0,
            enemy_fire_chance: 0.02,
            max_enemy_shots: 3,
            row_scores: vec![30, 20, 20, 10, 10],
            seed: 0x5eed_1978,
        }
    }
}

impl InvaderRules {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let rules: Self = serde_json::from_str(json).context("invalid invader rules")?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.rows > 0 && self.columns > 0, "formation must not be empty");
        anyhow::ensure!(!self.row_scores.is_empty(), "row_scores must not be empty");
        let formation_width = self.formation_width() + 2.0 * self.side_margin;
        anyhow::ensure!(
            formation_width <= self.world_width,
            "formation ({formation_width}) wider than the world ({})",
            self.world_width
        );
        anyhow::ensure!(
            self.player_width < self.world_width,
            "player wider than the world"
        );
        Ok(())
    }

    pub fn formation_width(&self) -> f32 {
        (self.columns - 1) as f32 * self.enemy_spacing_x + self.enemy_width
    }

    /// Y of the player's top edge. An enemy whose bottom reaches it ends the game.
    pub fn player_line(&self) -> f32 {
        self.world_height - self.player_floor_gap - self.player_height
    }

    pub fn score_for_row(&self, row: u32) -> u32 {
        let last = self.row_scores.len() - 1;
        self.row_scores[(row as usize).min(last)]
    }

    /// Base march speed for `level` (1-based).
    pub fn level_speed(&self, level: u32) -> f32 {
        self.march_speed * self.level_speedup.powi(level.saturating_sub(1) as i32)
    }
}
