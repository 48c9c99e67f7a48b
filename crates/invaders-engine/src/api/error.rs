use thiserror::Error;

use crate::api::types::EntityId;

/// Errors surfaced synchronously by the engine's public API.
///
/// Contract violations propagate to the direct caller. Failures inside a
/// running loop's callbacks are contained by `GameLoop` and only become
/// `Fatal` after too many consecutive failed frames.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Malformed entity construction input or `add_entity` payload.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// `add_entity` called with an id that is already stored.
    #[error("entity {0} already exists")]
    DuplicateId(EntityId),

    /// An operation that requires the entity to exist could not find it.
    #[error("entity {0} not found")]
    NotFound(EntityId),

    /// Collision check against an entity with no area.
    #[error("entity {id} has degenerate size {width}x{height}")]
    InvalidDimension { id: EntityId, width: f32, height: f32 },

    /// Bad arguments to a loop or configuration call.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The game loop stopped itself after repeated frame failures.
    #[error("game loop stopped after {failures} consecutive failed frames: {last}")]
    Fatal { failures: u32, last: String },
}

impl EngineError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::Validation {
            field,
            reason: reason.into(),
        }
    }
}
