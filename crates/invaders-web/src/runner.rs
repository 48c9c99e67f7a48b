use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use invaders_engine::bridge::protocol::HEADER_RUNNING;
use invaders_engine::{
    Clock, DrawList, EngineContext, EngineError, FrameOutcome, FrameRequest, Game, GameConfig,
    GameLoop, InputEvent, InputQueue, LoopStats, ManagerMetrics, ProtocolLayout,
};

/// Everything the loop callbacks touch, shared with the runner on one thread.
struct RunnerState<G: Game> {
    game: G,
    ctx: EngineContext,
    input: InputQueue,
    draws: DrawList,
    layout: ProtocolLayout,
    /// Flat frame buffer JS reads through `buffer_ptr`.
    buffer: Vec<f32>,
}

impl<G: Game> RunnerState<G> {
    fn tick(&mut self, dt_ms: f64) -> anyhow::Result<()> {
        let result = self.game.update(&mut self.ctx, &self.input, dt_ms);
        // Edge events are seen by exactly one tick, failed or not; held keys persist.
        self.input.drain();
        result
    }

    fn reset_input(&mut self) {
        self.input.drain();
        self.input.release_all();
    }

    fn render(&mut self) {
        self.draws.clear();
        self.game.render(&self.ctx, &mut self.draws);
        if self.draws.dropped() > 0 {
            log::warn!("draw list full, dropped {} commands", self.draws.dropped());
        }
        self.layout.write_frame(
            &mut self.buffer,
            &self.draws,
            &self.ctx.sounds,
            &self.ctx.events,
            true,
        );
        self.ctx.clear_frame_data();
    }
}

/// Snapshot for the debug overlay.
#[derive(Debug, Clone, Serialize)]
pub struct RunnerStats {
    pub running: bool,
    pub frames: u64,
    pub ticks: u64,
    pub consecutive_errors: u32,
    #[serde(rename = "loop")]
    pub loop_stats: LoopStats,
    pub entities: ManagerMetrics,
    pub last_error: Option<String>,
}

/// Generic game runner that drives a `Game` through a `GameLoop`.
///
/// Each concrete game creates a `thread_local!` GameRunner and exports free
/// functions via `#[wasm_bindgen]`, because wasm-bindgen cannot export
/// generic structs directly. JS owns `requestAnimationFrame`: it calls
/// `frame(timestamp)` and schedules another frame only when that returns true.
pub struct GameRunner<G: Game> {
    state: Rc<RefCell<RunnerState<G>>>,
    game_loop: GameLoop,
    request: FrameRequest,
    config: GameConfig,
    initialized: bool,
}

impl<G: Game + 'static> GameRunner<G> {
    pub fn new(game: G, clock: Box<dyn Clock>) -> Result<Self, EngineError> {
        let config = game.config();
        config.validate()?;
        let layout = ProtocolLayout::from_config(&config);
        let request = FrameRequest::new();
        let game_loop = GameLoop::new(config.game_loop, clock, Box::new(request.clone()))?;

        let state = RunnerState {
            game,
            ctx: EngineContext::new(&config),
            input: InputQueue::new(),
            draws: DrawList::new(config.max_draw_commands),
            buffer: layout.allocate(&config),
            layout,
        };

        Ok(Self {
            state: Rc::new(RefCell::new(state)),
            game_loop,
            request,
            config,
            initialized: false,
        })
    }

    /// Initialize the game. Call once after construction.
    pub fn init(&mut self) -> anyhow::Result<()> {
        {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            state.game.init(&mut state.ctx)?;
        }
        self.initialized = true;
        log::info!(
            "runner ready: {}x{} world, {} entities",
            self.config.world_width,
            self.config.world_height,
            self.state.borrow().ctx.entities.len()
        );
        Ok(())
    }

    /// Start the loop. Returns true if JS should request the first frame.
    pub fn start(&mut self) -> Result<bool, EngineError> {
        if !self.initialized {
            return Err(EngineError::Argument("runner started before init".into()));
        }
        let update_state = Rc::clone(&self.state);
        let render_state = Rc::clone(&self.state);
        self.game_loop.start(
            move |dt| update_state.borrow_mut().tick(dt),
            move || {
                render_state.borrow_mut().render();
                Ok(())
            },
        )?;
        Ok(self.request.take())
    }

    pub fn stop(&mut self) {
        self.game_loop.stop();
        self.request.take();
        self.mark_stopped();
    }

    /// Run one loop iteration. Returns true if another frame is wanted.
    pub fn frame(&mut self, timestamp: f64) -> bool {
        match self.game_loop.frame(timestamp) {
            FrameOutcome::Fatal => {
                self.mark_stopped();
                if let Some(err) = self.game_loop.last_error() {
                    log::error!("{err}");
                }
            }
            FrameOutcome::Skipped => self.mark_stopped(),
            // A panicking tick never reached its own drain.
            FrameOutcome::Failed { .. } => {
                self.state.borrow_mut().input.drain();
            }
            FrameOutcome::Completed { .. } => {}
        }
        self.request.take()
    }

    /// Flag the buffer as stopped and forget pending and held input.
    fn mark_stopped(&mut self) {
        let mut state = self.state.borrow_mut();
        state.buffer[HEADER_RUNNING] = 0.0;
        state.reset_input();
    }

    /// Push an input event into the queue. Dropped while the loop is stopped.
    pub fn push_input(&mut self, event: InputEvent) {
        if !self.game_loop.is_running() {
            log::debug!("loop stopped, dropping {event:?}");
            return;
        }
        self.state.borrow_mut().input.push(event);
    }

    /// Forget held keys (window blur).
    pub fn release_keys(&mut self) {
        self.state.borrow_mut().input.release_all();
    }

    pub fn is_running(&self) -> bool {
        self.game_loop.is_running()
    }

    pub fn stats(&self) -> RunnerStats {
        let state = self.state.borrow();
        RunnerStats {
            running: self.game_loop.is_running(),
            frames: self.game_loop.frames(),
            ticks: self.game_loop.ticks(),
            consecutive_errors: self.game_loop.consecutive_errors(),
            loop_stats: self.game_loop.stats(),
            entities: state.ctx.entities.metrics(),
            last_error: self.game_loop.last_error().map(|e| e.to_string()),
        }
    }

    pub fn stats_json(&self) -> String {
        match serde_json::to_string(&self.stats()) {
            Ok(json) => json,
            Err(err) => {
                log::warn!("stats serialisation failed: {err}");
                "{}".to_string()
            }
        }
    }

    /// Read-only access to the game and its context.
    pub fn inspect<R>(&self, f: impl FnOnce(&G, &EngineContext) -> R) -> R {
        let state = self.state.borrow();
        f(&state.game, &state.ctx)
    }

    /// Copy of the frame buffer.
    pub fn buffer_snapshot(&self) -> Vec<f32> {
        self.state.borrow().buffer.clone()
    }

    // ---- Pointer accessors for SharedArrayBuffer reads ----

    /// The buffer is allocated once and never grows, so the pointer is stable.
    pub fn buffer_ptr(&self) -> *const f32 {
        self.state.borrow().buffer.as_ptr()
    }

    pub fn layout(&self) -> ProtocolLayout {
        self.state.borrow().layout.clone()
    }

    pub fn buffer_total_floats(&self) -> u32 {
        self.state.borrow().layout.buffer_total_floats as u32
    }

    pub fn world_width(&self) -> f32 {
        self.config.world_width
    }

    pub fn world_height(&self) -> f32 {
        self.config.world_height
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }
}
