//! Decoding of solve requests coming from JS.

use anyhow::{bail, Context};
use lti_core::{
    solve_with_settings, ForcingFunction, InitialConditions, OdeSpec, ResponseMode,
    SolutionReport, SolverSettings,
};
use serde::Deserialize;

/// Request payload. The coefficient count fixes the order:
/// `[a, b]` for first order, `[a, b, c]` for second order.
#[derive(Clone, Debug, Deserialize)]
pub struct SolveRequest {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub constant_input: f64,
    pub mode: ResponseMode,
    /// `[y0]` or `[y0, dy0]`.
    #[serde(default)]
    pub initial: Option<Vec<f64>>,
    #[serde(default)]
    pub forcing: Option<String>,
    #[serde(default)]
    pub settings: Option<SolverSettings>,
}

/// Typed arguments for [`solve_with_settings`].
#[derive(Clone, Debug)]
pub struct PreparedRequest {
    pub spec: OdeSpec,
    pub initial: Option<InitialConditions>,
    pub forcing: Option<ForcingFunction>,
    pub settings: SolverSettings,
}

pub fn build_request(request: SolveRequest) -> anyhow::Result<PreparedRequest> {
    let spec = match request.coefficients.as_slice() {
        &[a, b] => OdeSpec::first_order(a, b, request.mode),
        &[a, b, c] => OdeSpec::second_order(a, b, c, request.mode),
        other => bail!(
            "expected 2 or 3 coefficients (order 1 or 2), got {}",
            other.len()
        ),
    }
    .context("Invalid equation")?
    .with_constant_input(request.constant_input);

    let initial = match request.initial.as_deref() {
        None => None,
        Some(&[y0]) => Some(InitialConditions::first_order(y0)),
        Some(&[y0, dy0]) => Some(InitialConditions::second_order(y0, dy0)),
        Some(other) => bail!("expected 1 or 2 initial values, got {}", other.len()),
    };
    if let Some(initial) = &initial {
        // Catch a missing y'(0) here instead of deep in the solve.
        initial
            .state(spec.order())
            .context("Invalid initial conditions")?;
    }

    let forcing = match request.forcing.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(source) => Some(ForcingFunction::parse(source).context("Invalid forcing")?),
    };

    let settings = request.settings.unwrap_or_default();
    settings.validate().context("Invalid settings")?;

    Ok(PreparedRequest {
        spec,
        initial,
        forcing,
        settings,
    })
}

pub fn solve_request(request: SolveRequest) -> anyhow::Result<SolutionReport> {
    let prepared = build_request(request)?;
    let report = solve_with_settings(
        &prepared.spec,
        prepared.initial.as_ref(),
        prepared.forcing.as_ref(),
        &prepared.settings,
    )
    .context("Solve failed")?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lti_core::{Coefficients, IntegrationMethod};
    use serde_json::json;

    fn decode(value: serde_json::Value) -> SolveRequest {
        serde_json::from_value(value).expect("request should decode")
    }

    fn error_text(request: SolveRequest) -> String {
        format!("{:#}", build_request(request).expect_err("expected an error"))
    }

    #[test]
    fn coefficient_count_sets_order() {
        let first = build_request(decode(json!({
            "coefficients": [1.0, 3.0],
            "mode": "ZeroInput",
            "initial": [2.0]
        })))
        .expect("first order");
        assert_eq!(first.spec.coefficients, Coefficients::First { a: 1.0, b: 3.0 });
        assert_eq!(first.initial, Some(InitialConditions::first_order(2.0)));
        assert!(first.forcing.is_none());

        let second = build_request(decode(json!({
            "coefficients": [1.0, 2.0, 5.0],
            "constant_input": 4.0,
            "mode": "General",
            "initial": [1.0, 0.0],
            "forcing": " sin(t) "
        })))
        .expect("second order");
        assert_eq!(second.spec.order(), 2);
        assert_eq!(second.spec.constant_input, 4.0);
        assert_eq!(second.forcing.as_ref().map(|f| f.source()), Some("sin(t)"));
        assert_eq!(second.settings, SolverSettings::default());
    }

    #[test]
    fn rejects_malformed_requests() {
        let text = error_text(decode(json!({ "coefficients": [1.0], "mode": "ZeroInput" })));
        assert!(text.contains("expected 2 or 3 coefficients"), "{text}");

        let text = error_text(decode(json!({ "coefficients": [0.0, 1.0], "mode": "ZeroInput" })));
        assert!(text.contains("Invalid equation"), "{text}");

        let text = error_text(decode(json!({
            "coefficients": [1.0, 0.0, 1.0],
            "mode": "ZeroInput",
            "initial": [1.0]
        })));
        assert!(text.contains("y'(0)"), "{text}");

        let text = error_text(decode(json!({
            "coefficients": [1.0, 1.0],
            "mode": "ZeroState",
            "forcing": "t +"
        })));
        assert!(text.contains("Invalid forcing"), "{text}");

        let text = error_text(decode(json!({
            "coefficients": [1.0, 1.0],
            "mode": "ZeroState",
            "settings": { "time_span": -1.0 }
        })));
        assert!(text.contains("Invalid settings"), "{text}");
    }

    #[test]
    fn blank_forcing_is_absent() {
        let prepared = build_request(decode(json!({
            "coefficients": [1.0, 1.0],
            "mode": "ZeroState",
            "forcing": "   "
        })))
        .expect("request");
        assert!(prepared.forcing.is_none());
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let prepared = build_request(decode(json!({
            "coefficients": [1.0, 1.0],
            "mode": "ZeroState",
            "settings": {
                "time_span": 2.5,
                "integrator": { "method": { "Rk4": { "step": 0.05 } } }
            }
        })))
        .expect("request");
        assert_eq!(prepared.settings.time_span, 2.5);
        assert_eq!(
            prepared.settings.integrator.method,
            IntegrationMethod::Rk4 { step: 0.05 }
        );
        assert_eq!(
            prepared.settings.pole_tolerance,
            SolverSettings::default().pole_tolerance
        );
    }

    #[test]
    fn solve_request_returns_report() {
        let report = solve_request(decode(json!({
            "coefficients": [1.0, 0.0],
            "mode": "ZeroState",
            "forcing": "t"
        })))
        .expect("report");
        let closed_form = report.closed_form().expect("closed form");
        assert_eq!(closed_form.to_string(), "0.5*t^2");
        assert!(report.is_complete());

        let encoded = serde_json::to_value(&report).expect("serialize");
        assert_eq!(encoded["forcing"], "t");
    }
}
