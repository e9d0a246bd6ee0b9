//! Forcing function handle for plotting on the JS side.

use lti_core::forcing::{transform_forcing, ForcingFunction};
use wasm_bindgen::prelude::*;

const POLE_TOLERANCE: f64 = 1e-9;

#[wasm_bindgen]
pub struct WasmForcing {
    forcing: ForcingFunction,
}

#[wasm_bindgen]
impl WasmForcing {
    #[wasm_bindgen(constructor)]
    pub fn new(source: &str) -> Result<WasmForcing, JsValue> {
        console_error_panic_hook::set_once();

        let forcing = ForcingFunction::parse(source)
            .map_err(|e| JsValue::from_str(&format!("Invalid forcing: {}", e)))?;
        Ok(WasmForcing { forcing })
    }

    pub fn source(&self) -> String {
        self.forcing.source().to_string()
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        self.forcing.evaluate(t)
    }

    pub fn sample(&self, times: Vec<f64>) -> Vec<f64> {
        times.iter().map(|&t| self.forcing.evaluate(t)).collect()
    }

    /// `F(s)` as text, or an error if the expression is outside the
    /// transformable family.
    pub fn laplace_transform(&self) -> Result<String, JsValue> {
        self.transform_text()
            .map_err(|e| JsValue::from_str(&format!("Unsupported forcing: {}", e)))
    }
}

impl WasmForcing {
    fn transform_text(&self) -> lti_core::ResponseResult<String> {
        let transform = transform_forcing(Some(&self.forcing), 0.0, POLE_TOLERANCE)?;
        Ok(transform.transform.to_string())
    }
}
