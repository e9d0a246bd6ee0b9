use crate::error::{ResponseError, ResponseResult};
use crate::traits::{DynamicalSystem, EmbeddedSteppable, Scalar, Steppable};

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
            k2: vec![T::zero(); dim],
            k3: vec![T::zero(); dim],
            k4: vec![T::zero(); dim],
            tmp: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half = T::lit(0.5);
        let sixth = T::lit(1.0 / 6.0);
        let two = T::lit(2.0);

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

// Tsitouras 5(4) tableau.
const TSIT5_C: [f64; 5] = [0.161, 0.327, 0.9, 0.9800255409045097, 1.0];
const TSIT5_A3: [f64; 2] = [-0.008480655492356989, 0.335480655492357];
const TSIT5_A4: [f64; 3] = [2.898, -6.359447987781783, 4.361447987781783];
const TSIT5_A5: [f64; 4] = [
    5.325864858437957,
    -11.748883564062828,
    7.495539342889693,
    -0.09249506636030195,
];
const TSIT5_A6: [f64; 5] = [
    5.86145544294642,
    -12.92096931784711,
    8.159367898576159,
    -0.071584973281401,
    -0.02826857949054663,
];
// Fifth-order weights; also the last row of the tableau.
const TSIT5_B: [f64; 6] = [
    0.09646076681806523,
    0.01,
    0.4798896504144996,
    1.379008574103742,
    -3.290069515436099,
    2.324710524099774,
];
// Difference between the fifth- and embedded fourth-order weights, k7 included.
const TSIT5_BTILDE: [f64; 7] = [
    -0.00178001105222577714,
    -0.0008164344596567469,
    0.007880878010261995,
    -0.1447110071732629,
    0.5823571654525552,
    -0.45808210592918697,
    1.0 / 66.0,
];

/// Tsitouras 5/4 Solver
pub struct Tsit5<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    k5: Vec<T>,
    k6: Vec<T>,
    k7: Vec<T>,
    tmp: Vec<T>,
    next: Vec<T>,
}

impl<T: Scalar> Tsit5<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            k5: vec![z; dim],
            k6: vec![z; dim],
            k7: vec![z; dim],
            tmp: vec![z; dim],
            next: vec![z; dim],
        }
    }

    /// Runs the six stages and leaves the fifth-order solution in `self.next`.
    fn advance(&mut self, system: &impl DynamicalSystem<T>, t0: T, state: &[T], dt: T) {
        let c = TSIT5_C.map(T::lit);
        let a21 = c[0];
        let a3 = TSIT5_A3.map(T::lit);
        let a4 = TSIT5_A4.map(T::lit);
        let a5 = TSIT5_A5.map(T::lit);
        let a6 = TSIT5_A6.map(T::lit);
        let b = TSIT5_B.map(T::lit);

        // k1
        system.apply(t0, state, &mut self.k1);

        // k2
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * (a21 * self.k1[i]);
        }
        system.apply(t0 + c[0] * dt, &self.tmp, &mut self.k2);

        // k3
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * (a3[0] * self.k1[i] + a3[1] * self.k2[i]);
        }
        system.apply(t0 + c[1] * dt, &self.tmp, &mut self.k3);

        // k4
        for i in 0..state.len() {
            self.tmp[i] = state[i]
                + dt * (a4[0] * self.k1[i] + a4[1] * self.k2[i] + a4[2] * self.k3[i]);
        }
        system.apply(t0 + c[2] * dt, &self.tmp, &mut self.k4);

        // k5
        for i in 0..state.len() {
            self.tmp[i] = state[i]
                + dt * (a5[0] * self.k1[i]
                    + a5[1] * self.k2[i]
                    + a5[2] * self.k3[i]
                    + a5[3] * self.k4[i]);
        }
        system.apply(t0 + c[3] * dt, &self.tmp, &mut self.k5);

        // k6
        for i in 0..state.len() {
            self.tmp[i] = state[i]
                + dt * (a6[0] * self.k1[i]
                    + a6[1] * self.k2[i]
                    + a6[2] * self.k3[i]
                    + a6[3] * self.k4[i]
                    + a6[4] * self.k5[i]);
        }
        system.apply(t0 + c[4] * dt, &self.tmp, &mut self.k6);

        for i in 0..state.len() {
            self.next[i] = state[i]
                + dt * (b[0] * self.k1[i]
                    + b[1] * self.k2[i]
                    + b[2] * self.k3[i]
                    + b[3] * self.k4[i]
                    + b[4] * self.k5[i]
                    + b[5] * self.k6[i]);
        }
    }
}

impl<T: Scalar> Steppable<T> for Tsit5<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let t0 = *t;
        self.advance(system, t0, state, dt);
        state.copy_from_slice(&self.next);
        *t = t0 + dt;
    }
}

impl<T: Scalar> EmbeddedSteppable<T> for Tsit5<T> {
    fn attempt(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        dt: T,
        out: &mut [T],
        abs_tol: T,
        rel_tol: T,
    ) -> T {
        self.advance(system, t, state, dt);
        system.apply(t + dt, &self.next, &mut self.k7);
        let e = TSIT5_BTILDE.map(T::lit);

        let mut sum = T::zero();
        for i in 0..state.len() {
            let err = dt
                * (e[0] * self.k1[i]
                    + e[1] * self.k2[i]
                    + e[2] * self.k3[i]
                    + e[3] * self.k4[i]
                    + e[4] * self.k5[i]
                    + e[5] * self.k6[i]
                    + e[6] * self.k7[i]);
            let scale = abs_tol + rel_tol * state[i].abs().max(self.next[i].abs());
            sum = sum + (err / scale) * (err / scale);
        }
        out.copy_from_slice(&self.next);
        if state.is_empty() {
            return T::zero();
        }
        (sum / T::lit(state.len() as f64)).sqrt()
    }
}

/// Step-size policy for [`integrate_adaptive`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepControl<T: Scalar> {
    pub abs_tol: T,
    pub rel_tol: T,
    /// First trial step; non-positive picks `span / 1000`.
    pub initial_step: T,
    pub min_step: T,
    pub max_step: T,
    /// Attempted steps, accepted or not.
    pub max_steps: usize,
}

/// Step counts of a finished integration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    pub accepted: usize,
    pub rejected: usize,
}

/// Integrates `system` from `t0` to `t_end` with local error control.
///
/// `observe` sees every accepted `(t, state)`; the final call is at exactly
/// `t_end`. Running out of attempts, a rejected step already at `min_step`,
/// or a non-finite state end the run with `IntegratorDivergence`.
pub fn integrate_adaptive<T, S, D, F>(
    stepper: &mut S,
    system: &D,
    t0: T,
    t_end: T,
    state: &mut [T],
    control: &StepControl<T>,
    mut observe: F,
) -> ResponseResult<StepStats>
where
    T: Scalar,
    S: EmbeddedSteppable<T>,
    D: DynamicalSystem<T>,
    F: FnMut(T, &[T]),
{
    let span = t_end - t0;
    let mut dt = if control.initial_step > T::zero() {
        control.initial_step.min(span)
    } else {
        (span * T::lit(1e-3))
            .max(control.min_step)
            .min(control.max_step)
            .min(span)
    };
    let mut t = t0;
    let mut proposal = vec![T::zero(); state.len()];
    let mut stats = StepStats::default();

    let safety = T::lit(0.9);
    let exponent = T::lit(-0.2);
    let shrink_limit = T::lit(0.2);
    let grow_limit = T::lit(5.0);

    while t < t_end {
        if stats.accepted + stats.rejected >= control.max_steps {
            return Err(ResponseError::divergence(
                as_f64(t),
                format!(
                    "exceeded max_steps = {} before reaching t = {}",
                    control.max_steps,
                    as_f64(t_end)
                ),
            ));
        }
        let remaining = t_end - t;
        let h = dt.min(remaining);
        let err = stepper.attempt(system, t, state, h, &mut proposal, control.abs_tol, control.rel_tol);

        if err <= T::one() {
            t = if h >= remaining { t_end } else { t + h };
            state.copy_from_slice(&proposal);
            stats.accepted += 1;
            if state.iter().any(|x| !x.is_finite()) {
                return Err(ResponseError::divergence(as_f64(t), "state became non-finite"));
            }
            observe(t, state);
        } else {
            stats.rejected += 1;
            if h <= control.min_step {
                return Err(ResponseError::divergence(
                    as_f64(t),
                    format!(
                        "step size fell below min_step = {:e}",
                        as_f64(control.min_step)
                    ),
                ));
            }
        }

        let factor = if err == T::zero() {
            grow_limit
        } else if !err.is_finite() {
            shrink_limit
        } else {
            (safety * err.powf(exponent)).max(shrink_limit).min(grow_limit)
        };
        dt = (h * factor).max(control.min_step).min(control.max_step);
    }

    Ok(stats)
}

/// Integrates with a fixed step `dt`; the last step covers whatever remains of the span.
#[allow(clippy::too_many_arguments)]
pub fn integrate_fixed<T, S, D, F>(
    stepper: &mut S,
    system: &D,
    t0: T,
    t_end: T,
    state: &mut [T],
    dt: T,
    max_steps: usize,
    mut observe: F,
) -> ResponseResult<StepStats>
where
    T: Scalar,
    S: Steppable<T>,
    D: DynamicalSystem<T>,
    F: FnMut(T, &[T]),
{
    // A trailing sliver of rounding error does not earn its own step.
    let steps = ((t_end - t0) / dt - T::lit(1e-9))
        .ceil()
        .max(T::one())
        .to_usize()
        .unwrap_or(usize::MAX);
    if steps > max_steps {
        return Err(ResponseError::divergence(
            as_f64(t0),
            format!("fixed step {} needs {steps} steps, more than max_steps = {max_steps}", as_f64(dt)),
        ));
    }

    let mut t = t0;
    for i in 0..steps {
        let last = i + 1 == steps;
        let h = if last { t_end - t } else { dt };
        stepper.step(system, &mut t, state, h);
        if last {
            t = t_end;
        }
        if state.iter().any(|x| !x.is_finite()) {
            return Err(ResponseError::divergence(as_f64(t), "state became non-finite"));
        }
        observe(t, state);
    }

    Ok(StepStats {
        accepted: steps,
        rejected: 0,
    })
}

fn as_f64<T: Scalar>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
