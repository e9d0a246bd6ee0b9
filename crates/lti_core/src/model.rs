//! Request value types and solver configuration.

use crate::error::{ResponseError, ResponseResult};
use serde::{Deserialize, Serialize};

/// Which response of the equation is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseMode {
    /// Free response: initial conditions only, no forcing.
    ZeroInput,
    /// Forced response from rest.
    ZeroState,
    /// Forcing and nonzero initial conditions together.
    General,
}

impl ResponseMode {
    pub fn uses_initial_conditions(self) -> bool {
        matches!(self, ResponseMode::ZeroInput | ResponseMode::General)
    }

    pub fn uses_forcing(self) -> bool {
        matches!(self, ResponseMode::ZeroState | ResponseMode::General)
    }
}

/// Coefficients of `a*y' + b*y` or `a*y'' + b*y' + c*y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "order")]
pub enum Coefficients {
    First { a: f64, b: f64 },
    Second { a: f64, b: f64, c: f64 },
}

impl Coefficients {
    pub fn order(&self) -> usize {
        match self {
            Coefficients::First { .. } => 1,
            Coefficients::Second { .. } => 2,
        }
    }

    pub fn leading(&self) -> f64 {
        match *self {
            Coefficients::First { a, .. } | Coefficients::Second { a, .. } => a,
        }
    }

    /// Coefficients in descending derivative order.
    pub fn as_slice(&self) -> Vec<f64> {
        match *self {
            Coefficients::First { a, b } => vec![a, b],
            Coefficients::Second { a, b, c } => vec![a, b, c],
        }
    }

    /// Left-hand side `a*y^(n) + ...` given `derivatives = [y, y', y'']`.
    pub fn apply(&self, derivatives: &[f64]) -> f64 {
        match *self {
            Coefficients::First { a, b } => a * derivatives[1] + b * derivatives[0],
            Coefficients::Second { a, b, c } => {
                a * derivatives[2] + b * derivatives[1] + c * derivatives[0]
            }
        }
    }
}

/// A linear constant-coefficient ODE `L[y] = d + f(t)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OdeSpec {
    pub coefficients: Coefficients,
    /// The constant input `d` on the right-hand side.
    #[serde(default)]
    pub constant_input: f64,
    pub mode: ResponseMode,
}

impl OdeSpec {
    pub fn first_order(a: f64, b: f64, mode: ResponseMode) -> ResponseResult<Self> {
        let spec = Self {
            coefficients: Coefficients::First { a, b },
            constant_input: 0.0,
            mode,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn second_order(a: f64, b: f64, c: f64, mode: ResponseMode) -> ResponseResult<Self> {
        let spec = Self {
            coefficients: Coefficients::Second { a, b, c },
            constant_input: 0.0,
            mode,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn with_constant_input(mut self, d: f64) -> Self {
        self.constant_input = d;
        self
    }

    pub fn order(&self) -> usize {
        self.coefficients.order()
    }

    pub fn leading(&self) -> f64 {
        self.coefficients.leading()
    }

    /// Rejects a vanishing leading coefficient and non-finite values.
    pub fn validate(&self) -> ResponseResult<()> {
        let coefficients = self.coefficients.as_slice();
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ResponseError::invalid(format!(
                "coefficients must be finite, got {coefficients:?}"
            )));
        }
        if !self.constant_input.is_finite() {
            return Err(ResponseError::invalid("constant input must be finite"));
        }
        if self.leading() == 0.0 {
            return Err(ResponseError::DegenerateEquation {
                order: self.order(),
            });
        }
        Ok(())
    }
}

/// Values of `y(0)` and, for second-order equations, `y'(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialConditions {
    pub y0: f64,
    #[serde(default)]
    pub dy0: Option<f64>,
}

impl InitialConditions {
    pub fn first_order(y0: f64) -> Self {
        Self { y0, dy0: None }
    }

    pub fn second_order(y0: f64, dy0: f64) -> Self {
        Self { y0, dy0: Some(dy0) }
    }

    pub fn zero(order: usize) -> Self {
        if order >= 2 {
            Self::second_order(0.0, 0.0)
        } else {
            Self::first_order(0.0)
        }
    }

    /// State vector `[y0]` or `[y0, dy0]` for an equation of the given order.
    pub fn state(&self, order: usize) -> ResponseResult<Vec<f64>> {
        let mut state = vec![self.y0];
        if order >= 2 {
            let dy0 = self.dy0.ok_or_else(|| {
                ResponseError::invalid("second-order equations need y'(0) in the initial conditions")
            })?;
            state.push(dy0);
        }
        if state.iter().any(|v| !v.is_finite()) {
            return Err(ResponseError::invalid(format!(
                "initial conditions must be finite, got {state:?}"
            )));
        }
        Ok(state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum IntegrationMethod {
    /// Adaptive Tsitouras 5(4) pair.
    Tsit5,
    /// Classic fixed-step RK4 with the given step.
    Rk4 { step: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    pub method: IntegrationMethod,
    pub rel_tol: f64,
    pub abs_tol: f64,
    /// Zero picks a step from the span.
    pub initial_step: f64,
    pub min_step: f64,
    pub max_step: f64,
    pub max_steps: usize,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            method: IntegrationMethod::Tsit5,
            rel_tol: 1e-9,
            abs_tol: 1e-11,
            initial_step: 0.0,
            min_step: 1e-12,
            max_step: f64::INFINITY,
            max_steps: 100_000,
        }
    }
}

impl IntegratorSettings {
    pub fn validate(&self) -> ResponseResult<()> {
        if !(self.rel_tol.is_finite() && self.rel_tol > 0.0) {
            return Err(ResponseError::invalid("rel_tol must be finite and positive"));
        }
        if !(self.abs_tol.is_finite() && self.abs_tol > 0.0) {
            return Err(ResponseError::invalid("abs_tol must be finite and positive"));
        }
        if self.initial_step < 0.0 || self.initial_step.is_nan() {
            return Err(ResponseError::invalid("initial_step must be non-negative"));
        }
        if !(self.min_step > 0.0) || self.max_step.is_nan() || self.max_step < self.min_step {
            return Err(ResponseError::invalid(
                "step bounds must satisfy 0 < min_step <= max_step",
            ));
        }
        if self.max_steps == 0 {
            return Err(ResponseError::invalid("max_steps must be greater than zero"));
        }
        if let IntegrationMethod::Rk4 { step } = self.method {
            if !(step.is_finite() && step > 0.0) {
                return Err(ResponseError::invalid("RK4 step must be finite and positive"));
            }
        }
        Ok(())
    }
}

/// Tunables of a solve request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// End of the integration span `[0, time_span]`.
    pub time_span: f64,
    /// Relative tolerance for calling a discriminant zero.
    pub root_tolerance: f64,
    /// Relative tolerance for calling the initial-condition matrix singular.
    pub singular_tolerance: f64,
    /// Relative distance under which two poles are the same pole.
    pub pole_tolerance: f64,
    pub run_numeric: bool,
    pub integrator: IntegratorSettings,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_span: 10.0,
            root_tolerance: 1e-9,
            singular_tolerance: 1e-12,
            pole_tolerance: 1e-9,
            run_numeric: true,
            integrator: IntegratorSettings::default(),
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> ResponseResult<()> {
        if !(self.time_span.is_finite() && self.time_span > 0.0) {
            return Err(ResponseError::invalid(format!(
                "time span must be finite and positive, got {}",
                self.time_span
            )));
        }
        for (name, value) in [
            ("root_tolerance", self.root_tolerance),
            ("singular_tolerance", self.singular_tolerance),
            ("pole_tolerance", self.pole_tolerance),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ResponseError::invalid(format!(
                    "{name} must be finite and non-negative"
                )));
            }
        }
        self.integrator.validate()
    }
}
