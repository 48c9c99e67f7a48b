pub mod draw;

pub use draw::{DrawCommand, DrawList};
