use wasm_bindgen::prelude::*;

use invaders_engine::{EngineError, FrameRequest, GameLoop, LoopConfig};

use crate::clock::PerformanceClock;

/// `GameLoop` for plain JS callers that bring their own update/render
/// functions instead of a Rust `Game`.
#[wasm_bindgen]
pub struct JsGameLoop {
    inner: GameLoop,
    request: FrameRequest,
}

#[wasm_bindgen]
impl JsGameLoop {
    #[wasm_bindgen(constructor)]
    pub fn new(
        frame_interval_ms: f64,
        max_delta_ms: f64,
        max_errors: u32,
    ) -> Result<JsGameLoop, JsValue> {
        let config = LoopConfig {
            frame_interval_ms,
            max_delta_ms,
            max_errors,
        };
        let request = FrameRequest::new();
        let inner = GameLoop::new(
            config,
            Box::new(PerformanceClock::new()),
            Box::new(request.clone()),
        )
        .map_err(to_js)?;
        Ok(Self { inner, request })
    }

    /// Start with JS callbacks. `update(dt_ms)` runs per fixed tick and
    /// `render()` once per frame. Returns true if a frame should be requested.
    pub fn start(&mut self, update: JsValue, render: JsValue) -> Result<bool, JsValue> {
        let update = callable("update", update).map_err(to_js)?;
        let render = callable("render", render).map_err(to_js)?;
        self.inner
            .start(
                move |dt| {
                    update
                        .call1(&JsValue::NULL, &JsValue::from_f64(dt))
                        .map(|_| ())
                        .map_err(js_error)
                },
                move || render.call0(&JsValue::NULL).map(|_| ()).map_err(js_error),
            )
            .map_err(to_js)?;
        Ok(self.request.take())
    }

    pub fn stop(&mut self) {
        self.inner.stop();
        self.request.take();
    }

    /// Run one iteration. Returns true if another frame is wanted.
    pub fn frame(&mut self, timestamp: f64) -> bool {
        self.inner.frame(timestamp);
        self.request.take()
    }

    #[wasm_bindgen(getter, js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// `{fps, frame_time, update_time, render_time}` as JSON.
    #[wasm_bindgen(js_name = statsJson)]
    pub fn stats_json(&self) -> String {
        serde_json::to_string(&self.inner.stats()).unwrap_or_else(|_| "{}".to_string())
    }

    #[wasm_bindgen(js_name = lastError)]
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error().map(|e| e.to_string())
    }
}

fn callable(name: &str, value: JsValue) -> Result<js_sys::Function, EngineError> {
    check_callable(name, value.is_function())?;
    value
        .dyn_into::<js_sys::Function>()
        .map_err(|_| EngineError::Argument(format!("{name} must be a function")))
}

pub(crate) fn check_callable(name: &str, is_function: bool) -> Result<(), EngineError> {
    if is_function {
        Ok(())
    } else {
        Err(EngineError::Argument(format!("{name} must be a function")))
    }
}

fn to_js(err: EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn js_error(value: JsValue) -> anyhow::Error {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return anyhow::anyhow!(String::from(err.message()));
    }
    match value.as_string() {
        Some(message) => anyhow::anyhow!(message),
        None => anyhow::anyhow!("{value:?}"),
    }
}
