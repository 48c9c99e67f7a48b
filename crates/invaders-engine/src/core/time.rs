/// Fixed timestep accumulator.
/// Ensures game logic runs at a consistent rate regardless of frame time.
/// All values are milliseconds.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    /// The fixed delta time per tick.
    interval: f64,
    /// Largest frame delta accepted in one go.
    max_delta: f64,
    /// Accumulated time from variable frame deltas.
    accumulator: f64,
}

impl FixedTimestep {
    pub fn new(interval: f64, max_delta: f64) -> Self {
        Self {
            interval,
            max_delta,
            accumulator: 0.0,
        }
    }

    /// Clamp a raw frame delta into `[0, max_delta]`.
    /// Long stalls (a backgrounded tab) would otherwise owe an unbounded
    /// number of ticks and never catch up.
    pub fn cap(&self, frame_dt: f64) -> f64 {
        if frame_dt.is_nan() {
            return 0.0;
        }
        frame_dt.clamp(0.0, self.max_delta)
    }

    /// Add frame time to the accumulator. Returns the number of fixed steps to run.
    /// Afterwards `0 <= accumulator < interval`.
    pub fn accumulate(&mut self, frame_dt: f64) -> u32 {
        self.accumulator += self.cap(frame_dt);
        let mut steps = 0;
        while self.accumulator >= self.interval {
            self.accumulator -= self.interval;
            steps += 1;
        }
        self.accumulator = self.accumulator.max(0.0);
        steps
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    /// The fixed delta time.
    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn max_delta(&self) -> f64 {
        self.max_delta
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }
}
