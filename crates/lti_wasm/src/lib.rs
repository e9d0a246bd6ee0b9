//! WASM bindings for `lti_core`.

mod forcing;
mod request;

pub use forcing::WasmForcing;
pub use request::{build_request, solve_request, PreparedRequest, SolveRequest};

use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Solves one request and returns the serialized `SolutionReport`.
#[wasm_bindgen]
pub fn solve_response(request_val: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let request: SolveRequest = from_value(request_val)
        .map_err(|e| JsValue::from_str(&format!("Invalid solve request: {}", e)))?;
    let report = solve_request(request).map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;

    to_value(&report).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::{solve_response, WasmForcing};
    use serde::Serialize;
    use serde_json::{json, Value};
    use serde_wasm_bindgen::{from_value, Serializer};
    use wasm_bindgen::JsValue;
    use wasm_bindgen_test::wasm_bindgen_test;

    fn js_request(request: Value) -> JsValue {
        request
            .serialize(&Serializer::json_compatible())
            .expect("request")
    }

    #[wasm_bindgen_test]
    fn solve_response_round_trips_through_js_values() {
        let request = js_request(json!({
            "coefficients": [1.0, 3.0],
            "mode": "ZeroInput",
            "initial": [2.0],
        }));
        let report: Value = from_value(solve_response(request).expect("report")).expect("decode");
        let stages = report["stages"].as_array().expect("stages");
        assert!(stages.contains(&json!("ConstantsResolved")), "{stages:?}");
    }

    #[wasm_bindgen_test]
    fn solve_response_reports_invalid_equation() {
        let request = js_request(json!({
            "coefficients": [0.0, 1.0],
            "mode": "ZeroInput",
            "initial": [1.0],
        }));
        let message = solve_response(request)
            .expect_err("degenerate equation")
            .as_string()
            .unwrap_or_default();
        assert!(message.starts_with("Invalid equation"), "{message}");
    }

    #[wasm_bindgen_test]
    fn forcing_rejects_malformed_source() {
        assert!(WasmForcing::new("sin(").is_err());
        let forcing = WasmForcing::new("t").expect("forcing");
        assert_eq!(forcing.laplace_transform().expect("transform"), "1/s^2");
    }
}
