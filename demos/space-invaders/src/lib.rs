use wasm_bindgen::prelude::*;
use invaders_engine::*;

pub mod formation;
pub mod game;
pub mod rules;

pub use game::{Phase, SpaceInvaders};
pub use rules::InvaderRules;

invaders_web::export_game!(SpaceInvaders, "space-invaders");
