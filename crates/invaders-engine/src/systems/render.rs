use crate::components::entity::Entity;
use crate::renderer::draw::{DrawCommand, DrawList};

/// Append one rectangle per visible, active entity.
/// `style_of` picks the palette index for each entity.
/// Returns how many commands were accepted.
pub fn draw_entities<'a>(
    entities: impl Iterator<Item = &'a Entity>,
    draws: &mut DrawList,
    style_of: impl Fn(&Entity) -> u32,
) -> usize {
    let mut drawn = 0;
    for entity in entities {
        if !entity.is_active() || !entity.is_visible() {
            continue;
        }
        let pos = entity.pos();
        let command = DrawCommand::rect(
            pos.x,
            pos.y,
            entity.width(),
            entity.height(),
            style_of(entity),
        );
        if draws.push(command) {
            drawn += 1;
        }
    }
    drawn
}
