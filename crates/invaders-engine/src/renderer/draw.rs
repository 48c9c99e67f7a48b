use bytemuck::{Pod, Zeroable};

/// One filled rectangle for the JS renderer.
/// Must match the TypeScript protocol: 6 floats = 24 bytes stride.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct DrawCommand {
    /// Top-left X in world units.
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    /// Palette index chosen by the game; the renderer maps it to a colour.
    pub style: f32,
    /// Opacity (0.0 = invisible, 1.0 = opaque).
    pub alpha: f32,
}

impl DrawCommand {
    pub const FLOATS: usize = 6;
    pub const STRIDE_BYTES: usize = Self::FLOATS * 4;

    pub fn rect(x: f32, y: f32, w: f32, h: f32, style: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            style: style as f32,
            alpha: 1.0,
        }
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }
}

/// Per-frame list of draw commands, bounded by the shared buffer capacity.
#[derive(Debug, Clone)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
    capacity: usize,
    dropped: usize,
}

impl DrawList {
    pub fn new(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.dropped = 0;
    }

    /// Append a command. Returns false (and counts the drop) once full.
    pub fn push(&mut self, command: DrawCommand) -> bool {
        if self.commands.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.commands.push(command);
        true
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Commands rejected since the last `clear`.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Commands as a flat float slice, in wire order.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.commands)
    }

    /// Raw pointer to command data for SharedArrayBuffer reads.
    pub fn commands_ptr(&self) -> *const f32 {
        self.commands.as_ptr() as *const f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_command_is_6_floats() {
        assert_eq!(std::mem::size_of::<DrawCommand>(), 24);
        assert_eq!(DrawCommand::FLOATS, 6);
    }

    #[test]
    fn push_stops_at_capacity() {
        let mut list = DrawList::new(2);
        assert!(list.push(DrawCommand::rect(0.0, 0.0, 1.0, 1.0, 0)));
        assert!(list.push(DrawCommand::rect(1.0, 0.0, 1.0, 1.0, 0)));
        assert!(!list.push(DrawCommand::rect(2.0, 0.0, 1.0, 1.0, 0)));
        assert_eq!(list.len(), 2);
        assert_eq!(list.dropped(), 1);
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.dropped(), 0);
    }

    #[test]
    fn floats_follow_field_order() {
        let mut list = DrawList::new(4);
        list.push(DrawCommand::rect(1.0, 2.0, 3.0, 4.0, 5).with_alpha(0.5));
        assert_eq!(list.as_floats(), &[1.0, 2.0, 3.0, 4.0, 5.0, 0.5]);
    }
}
