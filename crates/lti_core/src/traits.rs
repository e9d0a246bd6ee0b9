use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars by the steppers.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {
    /// Converts an `f64` literal, falling back to NaN for types that cannot hold it.
    fn lit(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::nan)
    }
}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A first-order system `x' = f(t, x)`.
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// x: current state
    /// out: buffer to write dx/dt
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A trait for solvers that can step a system forward.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    /// dt: step size
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}

/// Steppers carrying an embedded lower-order solution for local error control.
pub trait EmbeddedSteppable<T: Scalar>: Steppable<T> {
    /// Attempts a step without committing it.
    ///
    /// Writes the propagated state into `out` and returns the RMS error norm
    /// scaled by `abs_tol + rel_tol * |x|`; values `<= 1` mean the step is acceptable.
    #[allow(clippy::too_many_arguments)]
    fn attempt(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        dt: T,
        out: &mut [T],
        abs_tol: T,
        rel_tol: T,
    ) -> T;
}
