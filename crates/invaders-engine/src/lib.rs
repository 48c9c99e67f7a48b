pub mod api;
pub mod core;
pub mod components;
pub mod systems;
pub mod renderer;
pub mod bridge;
pub mod input;

// Re-export key types at crate root for convenience
pub use api::error::EngineError;
pub use api::game::{EngineContext, Game, GameConfig};
pub use api::types::{EntityId, GameEvent, SoundEvent};
pub use bridge::protocol::ProtocolLayout;
pub use components::entity::Entity;
pub use crate::core::bounds::Bounds;
pub use crate::core::clock::{Clock, FrameRequest, FrameScheduler, ManualClock};
#[cfg(not(target_arch = "wasm32"))]
pub use crate::core::clock::SystemClock;
pub use crate::core::collision::{CollisionConfig, CollisionEngine, CollisionResult};
pub use crate::core::events::{EntityEvent, EventKind, ListenerId};
pub use crate::core::game_loop::{FrameOutcome, GameLoop, LoopConfig, LoopState, LoopStats};
pub use crate::core::manager::{EntityManager, EntityPatch, ManagerMetrics};
pub use crate::core::spatial::SpatialGrid;
pub use crate::core::time::FixedTimestep;
pub use input::queue::{InputEvent, InputQueue};
pub use renderer::draw::{DrawCommand, DrawList};
pub use systems::render::draw_entities;
pub use systems::rng::Rng;

pub use glam::Vec2;
