//! `lti_core` computes responses of linear constant-coefficient ODEs
//!
//! ```text
//! a*y' + b*y = d + f(t)        a*y'' + b*y' + c*y = d + f(t)
//! ```
//!
//! in closed form and numerically.
//!
//! Key components:
//! - **Characteristic / Basis / Constants**: root classification, the matching
//!   homogeneous basis, and constants fitted to the initial conditions.
//! - **Forcing / Transform / Frequency / Inverse**: forced responses by the
//!   Laplace transform, with factored rational functions and exact partial fractions.
//! - **Equation Engine**: parser and bytecode VM for forcing expressions in `t`.
//! - **Numeric / Solvers**: companion-form integration with adaptive Tsit5 or fixed-step RK4.
//! - **Response**: the orchestrator producing a [`SolutionReport`].
pub mod basis;
pub mod characteristic;
pub mod constants;
pub mod equation_engine;
pub mod error;
pub mod forcing;
pub mod frequency;
pub mod inverse;
pub mod model;
pub mod numeric;
pub mod response;
pub mod solvers;
pub mod time_domain;
pub mod traits;
pub mod transform;

pub use error::{ResponseError, ResponseResult};
pub use forcing::ForcingFunction;
pub use model::{
    Coefficients, InitialConditions, IntegrationMethod, IntegratorSettings, OdeSpec, ResponseMode,
    SolverSettings,
};
pub use response::{solve, solve_with_settings, Diagnostic, DiagnosticPath, SolutionReport};
