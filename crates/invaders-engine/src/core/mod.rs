pub mod bounds;
pub mod clock;
pub mod collision;
pub mod events;
pub mod game_loop;
pub mod manager;
pub mod spatial;
pub mod time;
