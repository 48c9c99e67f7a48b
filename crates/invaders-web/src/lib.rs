pub mod clock;
pub mod js_loop;
pub mod runner;

pub use clock::PerformanceClock;
pub use js_loop::JsGameLoop;
pub use runner::{GameRunner, RunnerStats};

/// Generate all `#[wasm_bindgen]` exports for a game.
///
/// Generates:
/// - `thread_local!` storage for the GameRunner
/// - `with_runner()` helper function
/// - wasm-bindgen exports for lifecycle, input and buffer accessors
///
/// # Usage
///
/// ```ignore
/// use wasm_bindgen::prelude::*;
/// use invaders_engine::*;
///
/// mod game;
/// use game::MyGame;
///
/// invaders_web::export_game!(MyGame, "my-game");
/// ```
///
/// JS side, per animation frame:
///
/// ```text
/// if (game_frame(performance.now())) requestAnimationFrame(tick);
/// ```
///
/// # Arguments
///
/// - `$game_type`: a type implementing `invaders_engine::Game` with a `new()`
/// - `$game_name`: a string literal used in log messages
#[macro_export]
macro_rules! export_game {
    ($game_type:ty, $game_name:literal) => {
        use std::cell::RefCell;

        thread_local! {
            static RUNNER: RefCell<Option<$crate::GameRunner<$game_type>>> = RefCell::new(None);
        }

        /// Run `f` against the runner; `None` before `game_init`.
        fn with_runner<R>(f: impl FnOnce(&mut $crate::GameRunner<$game_type>) -> R) -> Option<R> {
            RUNNER.with(|cell| {
                let mut borrow = cell.borrow_mut();
                match borrow.as_mut() {
                    Some(runner) => Some(f(runner)),
                    None => {
                        log::warn!("{}: call game_init() first", $game_name);
                        None
                    }
                }
            })
        }

        #[wasm_bindgen]
        pub fn game_init() -> bool {
            console_error_panic_hook::set_once();
            let _ = console_log::init_with_level(log::Level::Info);

            let game = <$game_type>::new();
            let mut runner =
                match $crate::GameRunner::new(game, Box::new($crate::PerformanceClock::new())) {
                    Ok(runner) => runner,
                    Err(err) => {
                        log::error!("{}: bad config: {}", $game_name, err);
                        return false;
                    }
                };
            if let Err(err) = runner.init() {
                log::error!("{}: init failed: {:#}", $game_name, err);
                return false;
            }

            RUNNER.with(|cell| {
                *cell.borrow_mut() = Some(runner);
            });
            log::info!("{}: initialized", $game_name);
            true
        }

        /// Returns true if JS should request the first animation frame.
        #[wasm_bindgen]
        pub fn game_start() -> bool {
            with_runner(|r| match r.start() {
                Ok(wants_frame) => wants_frame,
                Err(err) => {
                    log::warn!("{}: {}", $game_name, err);
                    false
                }
            })
            .unwrap_or(false)
        }

        #[wasm_bindgen]
        pub fn game_stop() {
            with_runner(|r| r.stop());
        }

        /// Returns true if JS should request another animation frame.
        #[wasm_bindgen]
        pub fn game_frame(timestamp: f64) -> bool {
            with_runner(|r| r.frame(timestamp)).unwrap_or(false)
        }

        #[wasm_bindgen]
        pub fn game_key_down(key_code: u32) {
            with_runner(|r| r.push_input(InputEvent::KeyDown { key_code }));
        }

        #[wasm_bindgen]
        pub fn game_key_up(key_code: u32) {
            with_runner(|r| r.push_input(InputEvent::KeyUp { key_code }));
        }

        /// Window lost focus; key-ups may never arrive.
        #[wasm_bindgen]
        pub fn game_blur() {
            with_runner(|r| r.release_keys());
        }

        // ---- Data accessors ----

        #[wasm_bindgen]
        pub fn get_buffer_ptr() -> *const f32 {
            with_runner(|r| r.buffer_ptr()).unwrap_or(std::ptr::null())
        }

        #[wasm_bindgen]
        pub fn get_buffer_total_floats() -> u32 {
            with_runner(|r| r.buffer_total_floats()).unwrap_or(0)
        }

        #[wasm_bindgen]
        pub fn get_draw_data_offset() -> u32 {
            with_runner(|r| r.layout().draw_data_offset as u32).unwrap_or(0)
        }

        #[wasm_bindgen]
        pub fn get_sound_data_offset() -> u32 {
            with_runner(|r| r.layout().sound_data_offset as u32).unwrap_or(0)
        }

        #[wasm_bindgen]
        pub fn get_event_data_offset() -> u32 {
            with_runner(|r| r.layout().event_data_offset as u32).unwrap_or(0)
        }

        #[wasm_bindgen]
        pub fn get_world_width() -> f32 {
            with_runner(|r| r.world_width()).unwrap_or(0.0)
        }

        #[wasm_bindgen]
        pub fn get_world_height() -> f32 {
            with_runner(|r| r.world_height()).unwrap_or(0.0)
        }

        #[wasm_bindgen]
        pub fn get_stats_json() -> String {
            with_runner(|r| r.stats_json()).unwrap_or_else(|| "{}".to_string())
        }
    };
}
