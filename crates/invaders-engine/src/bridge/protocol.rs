//! SharedArrayBuffer layout.
//! Must stay in sync with the TypeScript `protocol.ts`.
//!
//! Layout (all values in f32 / 4 bytes):
//! ```text
//! [Header: 11 floats]
//! [Draw commands: max_draw_commands × 6 floats]
//! [Sounds: max_sounds × 1 float]
//! [Events: max_events × 4 floats]
//! ```
//!
//! Capacities are written into the header at init so the reader can compute
//! offsets without sharing constants.

use crate::api::game::GameConfig;
use crate::api::types::{GameEvent, SoundEvent};
use crate::renderer::draw::{DrawCommand, DrawList};

/// Number of floats in the header section.
pub const HEADER_FLOATS: usize = 11;

/// Header field indices.
pub const HEADER_FRAME_COUNTER: usize = 0;
pub const HEADER_MAX_DRAW_COMMANDS: usize = 1;
pub const HEADER_DRAW_COUNT: usize = 2;
pub const HEADER_WORLD_WIDTH: usize = 3;
pub const HEADER_WORLD_HEIGHT: usize = 4;
pub const HEADER_MAX_SOUNDS: usize = 5;
pub const HEADER_SOUND_COUNT: usize = 6;
pub const HEADER_MAX_EVENTS: usize = 7;
pub const HEADER_EVENT_COUNT: usize = 8;
pub const HEADER_PROTOCOL_VERSION: usize = 9;
/// 1.0 while the loop is running, 0.0 once stopped.
pub const HEADER_RUNNING: usize = 10;

pub const PROTOCOL_VERSION: f32 = 1.0;

/// Floats per draw command: x, y, w, h, style, alpha.
pub const DRAW_COMMAND_FLOATS: usize = DrawCommand::FLOATS;

/// Floats per game event: kind, a, b, c.
pub const EVENT_FLOATS: usize = GameEvent::FLOATS;

/// Buffer layout computed from capacities.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolLayout {
    pub max_draw_commands: usize,
    pub max_sounds: usize,
    pub max_events: usize,

    pub draw_data_offset: usize,
    pub sound_data_offset: usize,
    pub event_data_offset: usize,

    /// Total buffer size in floats.
    pub buffer_total_floats: usize,
    pub buffer_total_bytes: usize,
}

impl ProtocolLayout {
    pub fn new(max_draw_commands: usize, max_sounds: usize, max_events: usize) -> Self {
        let draw_data_offset = HEADER_FLOATS;
        let sound_data_offset = draw_data_offset + max_draw_commands * DRAW_COMMAND_FLOATS;
        let event_data_offset = sound_data_offset + max_sounds;
        let buffer_total_floats = event_data_offset + max_events * EVENT_FLOATS;

        Self {
            max_draw_commands,
            max_sounds,
            max_events,
            draw_data_offset,
            sound_data_offset,
            event_data_offset,
            buffer_total_floats,
            buffer_total_bytes: buffer_total_floats * 4,
        }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(config.max_draw_commands, config.max_sounds, config.max_events)
    }

    /// Allocate a zeroed buffer with the static header fields filled in.
    pub fn allocate(&self, config: &GameConfig) -> Vec<f32> {
        let mut buffer = vec![0.0; self.buffer_total_floats];
        buffer[HEADER_MAX_DRAW_COMMANDS] = self.max_draw_commands as f32;
        buffer[HEADER_WORLD_WIDTH] = config.world_width;
        buffer[HEADER_WORLD_HEIGHT] = config.world_height;
        buffer[HEADER_MAX_SOUNDS] = self.max_sounds as f32;
        buffer[HEADER_MAX_EVENTS] = self.max_events as f32;
        buffer[HEADER_PROTOCOL_VERSION] = PROTOCOL_VERSION;
        buffer
    }

    /// Copy one frame's output into `buffer`, truncating each section to its
    /// capacity, and bump the frame counter.
    pub fn write_frame(
        &self,
        buffer: &mut [f32],
        draws: &DrawList,
        sounds: &[SoundEvent],
        events: &[GameEvent],
        running: bool,
    ) {
        if buffer.len() < self.buffer_total_floats {
            log::warn!(
                "frame buffer too small: {} < {} floats",
                buffer.len(),
                self.buffer_total_floats
            );
            return;
        }

        let draw_floats = draws.as_floats();
        let draw_floats = &draw_floats[..draw_floats.len().min(self.max_draw_commands * DRAW_COMMAND_FLOATS)];
        buffer[self.draw_data_offset..self.draw_data_offset + draw_floats.len()]
            .copy_from_slice(draw_floats);

        let sound_count = sounds.len().min(self.max_sounds);
        for (slot, sound) in buffer[self.sound_data_offset..]
            .iter_mut()
            .zip(&sounds[..sound_count])
        {
            *slot = sound.0 as f32;
        }

        let event_count = events.len().min(self.max_events);
        let event_floats: &[f32] = bytemuck::cast_slice(&events[..event_count]);
        buffer[self.event_data_offset..self.event_data_offset + event_floats.len()]
            .copy_from_slice(event_floats);

        buffer[HEADER_DRAW_COUNT] = (draw_floats.len() / DRAW_COMMAND_FLOATS) as f32;
        buffer[HEADER_SOUND_COUNT] = sound_count as f32;
        buffer[HEADER_EVENT_COUNT] = event_count as f32;
        buffer[HEADER_RUNNING] = if running { 1.0 } else { 0.0 };
        buffer[HEADER_FRAME_COUNTER] += 1.0;
    }
}
