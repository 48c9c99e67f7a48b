//! Fixed-timestep update / once-per-frame render loop.
//!
//! The host calls `frame(timestamp)` whenever the scheduler it was given
//! fires. Each call runs zero or more fixed-interval updates followed by
//! exactly one render. A failing (or panicking) update or render costs that
//! frame only; `max_errors` consecutive failures stop the loop.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::api::error::EngineError;
use crate::core::clock::{Clock, FrameScheduler};
use crate::core::time::FixedTimestep;

/// Loop timing and failure tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Simulated milliseconds per fixed update.
    pub frame_interval_ms: f64,
    /// Largest real frame delta fed into the accumulator.
    pub max_delta_ms: f64,
    /// Consecutive failed frames tolerated before the loop stops.
    pub max_errors: u32,
}

impl LoopConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.frame_interval_ms.is_finite() && self.frame_interval_ms > 0.0) {
            return Err(EngineError::Argument(format!(
                "frame interval must be positive, got {}",
                self.frame_interval_ms
            )));
        }
        if !(self.max_delta_ms.is_finite() && self.max_delta_ms > 0.0) {
            return Err(EngineError::Argument(format!(
                "max delta must be positive, got {}",
                self.max_delta_ms
            )));
        }
        if self.max_errors == 0 {
            return Err(EngineError::Argument("max errors must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 1000.0 / 60.0,
            max_delta_ms: 1000.0 / 30.0,
            max_errors: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Stopped,
    Running,
}

/// Per-frame measurements. Times are milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopStats {
    /// Rendered frames per second, from the last frame delta.
    pub fps: f64,
    pub frame_time: f64,
    /// Total time spent in update callbacks during the last frame.
    pub update_time: f64,
    pub render_time: f64,
}

/// What a call to `frame` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The loop isn't running; nothing happened.
    Skipped,
    /// Updates and render succeeded.
    Completed { ticks: u32 },
    /// The frame failed but the loop keeps going.
    Failed { consecutive: u32 },
    /// Too many consecutive failures; the loop has stopped.
    Fatal,
}

pub type UpdateFn = Box<dyn FnMut(f64) -> anyhow::Result<()>>;
pub type RenderFn = Box<dyn FnMut() -> anyhow::Result<()>>;
pub type FatalHandler = Box<dyn FnMut(&EngineError)>;

struct Callbacks {
    update: UpdateFn,
    render: RenderFn,
}

pub struct GameLoop {
    config: LoopConfig,
    state: LoopState,
    clock: Box<dyn Clock>,
    scheduler: Box<dyn FrameScheduler>,
    timestep: FixedTimestep,
    callbacks: Option<Callbacks>,
    on_fatal: Option<FatalHandler>,
    last_frame_time: f64,
    consecutive_errors: u32,
    last_error: Option<EngineError>,
    stats: LoopStats,
    ticks: u64,
    frames: u64,
}

impl GameLoop {
    pub fn new(
        config: LoopConfig,
        clock: Box<dyn Clock>,
        scheduler: Box<dyn FrameScheduler>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            state: LoopState::Stopped,
            clock,
            scheduler,
            timestep: FixedTimestep::new(config.frame_interval_ms, config.max_delta_ms),
            callbacks: None,
            on_fatal: None,
            last_frame_time: 0.0,
            consecutive_errors: 0,
            last_error: None,
            stats: LoopStats::default(),
            ticks: 0,
            frames: 0,
        })
    }

    /// Begin running with the given callbacks and request the first frame.
    ///
    /// `update` receives the fixed frame interval in milliseconds.
    pub fn start<U, R>(&mut self, update: U, render: R) -> Result<(), EngineError>
    where
        U: FnMut(f64) -> anyhow::Result<()> + 'static,
        R: FnMut() -> anyhow::Result<()> + 'static,
    {
        self.start_boxed(Box::new(update), Box::new(render))
    }

    pub fn start_boxed(&mut self, update: UpdateFn, render: RenderFn) -> Result<(), EngineError> {
        if self.state == LoopState::Running {
            return Err(EngineError::Argument("game loop is already running".into()));
        }
        self.callbacks = Some(Callbacks { update, render });
        self.state = LoopState::Running;
        self.last_frame_time = self.clock.now_ms();
        self.timestep.reset();
        self.consecutive_errors = 0;
        self.last_error = None;
        self.scheduler.request_frame();
        log::info!(
            "game loop started ({:.2} ms interval)",
            self.config.frame_interval_ms
        );
        Ok(())
    }

    /// Stop the loop. Frames delivered afterwards are ignored.
    pub fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.state = LoopState::Stopped;
        self.scheduler.cancel_frame();
        log::info!("game loop stopped after {} frames", self.frames);
    }

    /// Register a handler invoked once when the loop gives up.
    pub fn on_fatal(&mut self, handler: impl FnMut(&EngineError) + 'static) {
        self.on_fatal = Some(Box::new(handler));
    }

    /// Run one iteration for a scheduler tick at `current_time` (ms).
    pub fn frame(&mut self, current_time: f64) -> FrameOutcome {
        if self.state != LoopState::Running {
            return FrameOutcome::Skipped;
        }
        let Some(callbacks) = self.callbacks.as_mut() else {
            return FrameOutcome::Skipped;
        };

        let delta = self.timestep.cap(current_time - self.last_frame_time);
        if current_time.is_finite() {
            self.last_frame_time = current_time;
        }
        let steps = self.timestep.accumulate(delta);
        let interval = self.timestep.interval();

        let mut ticks = 0;
        let mut failure = None;

        let update_start = self.clock.now_ms();
        for _ in 0..steps {
            if let Err(err) = guarded(|| (callbacks.update)(interval)) {
                failure = Some(format!("update failed: {err}"));
                break;
            }
            ticks += 1;
        }
        let render_start = self.clock.now_ms();
        if failure.is_none() {
            if let Err(err) = guarded(|| (callbacks.render)()) {
                failure = Some(format!("render failed: {err}"));
            }
        }
        let render_end = self.clock.now_ms();

        self.ticks += ticks as u64;
        self.frames += 1;
        self.stats = LoopStats {
            fps: if delta > 0.0 { 1000.0 / delta } else { 0.0 },
            frame_time: delta,
            update_time: render_start - update_start,
            render_time: render_end - render_start,
        };

        match failure {
            None => {
                self.consecutive_errors = 0;
                self.scheduler.request_frame();
                FrameOutcome::Completed { ticks }
            }
            Some(message) => self.record_failure(message),
        }
    }

    fn record_failure(&mut self, message: String) -> FrameOutcome {
        self.consecutive_errors += 1;
        log::error!(
            "frame {} failed ({}/{}): {}",
            self.frames,
            self.consecutive_errors,
            self.config.max_errors,
            message
        );

        if self.consecutive_errors < self.config.max_errors {
            self.scheduler.request_frame();
            return FrameOutcome::Failed {
                consecutive: self.consecutive_errors,
            };
        }

        let fatal = EngineError::Fatal {
            failures: self.consecutive_errors,
            last: message,
        };
        log::error!("{fatal}");
        self.stop();
        if let Some(handler) = self.on_fatal.as_mut() {
            handler(&fatal);
        }
        self.last_error = Some(fatal);
        FrameOutcome::Fatal
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Snapshot of the last frame's measurements.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Simulated time owed but not yet ticked, always below one interval.
    pub fn accumulator(&self) -> f64 {
        self.timestep.accumulator()
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// The error that stopped the loop, if it stopped itself.
    pub fn last_error(&self) -> Option<&EngineError> {
        self.last_error.as_ref()
    }

    /// Fixed updates run since creation.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Frames processed since creation.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl fmt::Debug for GameLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameLoop")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("accumulator", &self.timestep.accumulator())
            .field("consecutive_errors", &self.consecutive_errors)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Run a callback, turning both `Err` and panics into an error message.
fn guarded(f: impl FnOnce() -> anyhow::Result<()>) -> Result<(), String> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
