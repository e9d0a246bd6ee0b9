//! Numeric integration of the equation in companion form.

use crate::error::ResponseResult;
use crate::forcing::ForcingFunction;
use crate::model::{Coefficients, IntegrationMethod, OdeSpec, SolverSettings};
use crate::solvers::{integrate_adaptive, integrate_fixed, StepControl, StepStats, Tsit5, RK4};
use crate::traits::DynamicalSystem;
use crate::equation_engine::{Bytecode, VM};
use log::debug;
use serde::Serialize;
use std::cell::RefCell;

/// `L[y] = d + f(t)` rewritten as `x' = F(t, x)` with `x = [y]` or `[y, y']`.
pub struct CompanionSystem<'a> {
    coefficients: Coefficients,
    constant_input: f64,
    forcing: Option<&'a Bytecode>,
    // Interior mutability for the VM stack to avoid allocation in apply.
    stack: RefCell<Vec<f64>>,
}

impl<'a> CompanionSystem<'a> {
    pub fn new(
        coefficients: Coefficients,
        constant_input: f64,
        forcing: Option<&'a ForcingFunction>,
    ) -> Self {
        Self {
            coefficients,
            constant_input,
            forcing: forcing.map(ForcingFunction::program),
            stack: RefCell::new(Vec::with_capacity(32)),
        }
    }

    /// Right-hand side `d + f(t)`.
    pub fn input(&self, t: f64) -> f64 {
        let forced = match self.forcing {
            Some(program) => VM::execute(program, t, &mut self.stack.borrow_mut()),
            None => 0.0,
        };
        self.constant_input + forced
    }
}

impl DynamicalSystem<f64> for CompanionSystem<'_> {
    fn dimension(&self) -> usize {
        self.coefficients.order()
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        let input = self.input(t);
        match self.coefficients {
            Coefficients::First { a, b } => out[0] = (input - b * x[0]) / a,
            Coefficients::Second { a, b, c } => {
                out[0] = x[1];
                out[1] = (input - b * x[1] - c * x[0]) / a;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectorySample {
    pub t: f64,
    pub y: f64,
}

/// Accepted `(t, y)` points of one integration run, in time order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericTrajectory {
    pub samples: Vec<TrajectorySample>,
    pub method: IntegrationMethod,
    pub accepted_steps: usize,
    pub rejected_steps: usize,
}

impl NumericTrajectory {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&TrajectorySample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&TrajectorySample> {
        self.samples.last()
    }

    /// Largest `|y - reference(t)|` over the samples, with the time it occurs.
    pub fn max_deviation(&self, reference: impl Fn(f64) -> f64) -> Option<(f64, f64)> {
        self.samples
            .iter()
            .map(|s| ((s.y - reference(s.t)).abs(), s.t))
            .fold(None, |worst, (err, t)| match worst {
                Some((w, _)) if w >= err => worst,
                _ => Some((err, t)),
            })
    }
}

/// Integrates over `[0, settings.time_span]` from `state`.
///
/// Modes without forcing integrate the homogeneous equation regardless of
/// what is passed in `forcing` or the constant input.
pub fn integrate(
    spec: &OdeSpec,
    state: &[f64],
    forcing: Option<&ForcingFunction>,
    settings: &SolverSettings,
) -> ResponseResult<NumericTrajectory> {
    spec.validate()?;
    settings.validate()?;
    let (constant_input, forcing) = if spec.mode.uses_forcing() {
        (spec.constant_input, forcing)
    } else {
        (0.0, None)
    };
    let system = CompanionSystem::new(spec.coefficients, constant_input, forcing);

    let mut x = state.to_vec();
    x.resize(system.dimension(), 0.0);
    let mut samples = vec![TrajectorySample { t: 0.0, y: x[0] }];
    let record = |t: f64, x: &[f64]| samples.push(TrajectorySample { t, y: x[0] });

    let integrator = &settings.integrator;
    let t_end = settings.time_span;
    let stats: StepStats = match integrator.method {
        IntegrationMethod::Tsit5 => {
            let control = StepControl {
                abs_tol: integrator.abs_tol,
                rel_tol: integrator.rel_tol,
                initial_step: integrator.initial_step,
                min_step: integrator.min_step,
                max_step: integrator.max_step,
                max_steps: integrator.max_steps,
            };
            let mut stepper = Tsit5::new(system.dimension());
            integrate_adaptive(&mut stepper, &system, 0.0, t_end, &mut x, &control, record)?
        }
        IntegrationMethod::Rk4 { step } => {
            let mut stepper = RK4::new(system.dimension());
            integrate_fixed(
                &mut stepper,
                &system,
                0.0,
                t_end,
                &mut x,
                step,
                integrator.max_steps,
                record,
            )?
        }
    };

    debug!(
        "integrated to t = {t_end} with {:?}: {} accepted, {} rejected steps",
        integrator.method, stats.accepted, stats.rejected
    );
    Ok(NumericTrajectory {
        samples,
        method: integrator.method,
        accepted_steps: stats.accepted,
        rejected_steps: stats.rejected,
    })
}
