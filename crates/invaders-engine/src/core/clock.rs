//! Time source and frame scheduling seams for `GameLoop`.
//!
//! The loop never reads wall-clock time or schedules frames by itself; hosts
//! inject both so tests can drive it deterministically.

use std::cell::Cell;
use std::rc::Rc;

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Host hook for "call me again on the next display refresh".
pub trait FrameScheduler {
    fn request_frame(&mut self);

    /// Withdraw a pending request. Hosts that can't cancel may ignore this;
    /// a stopped loop ignores late frames anyway.
    fn cancel_frame(&mut self) {}
}

/// `std::time::Instant`-backed clock for native builds.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// Scheduler that just raises a flag the host polls.
///
/// The browser runner checks `take()` after each frame and calls
/// `requestAnimationFrame` again only if the loop asked for it. Clones share
/// the flag, so one copy can live inside the loop while the host keeps another.
#[derive(Debug, Clone, Default)]
pub struct FrameRequest {
    pending: Rc<Cell<bool>>,
    requests: Rc<Cell<u64>>,
}

impl FrameRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    /// Consume the pending request.
    pub fn take(&self) -> bool {
        self.pending.replace(false)
    }

    /// Total number of requests ever made.
    pub fn request_count(&self) -> u64 {
        self.requests.get()
    }
}

impl FrameScheduler for FrameRequest {
    fn request_frame(&mut self) {
        self.pending.set(true);
        self.requests.set(self.requests.get() + 1);
    }

    fn cancel_frame(&mut self) {
        self.pending.set(false);
    }
}
