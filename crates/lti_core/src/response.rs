//! Request orchestration: routes a request through the analytic and numeric
//! paths and assembles the [`SolutionReport`].

use crate::basis::{GeneralSolution, ParticularSolution};
use crate::characteristic::CharacteristicRoots;
use crate::constants::resolve_constants;
use crate::error::{ResponseError, ResponseResult};
use crate::forcing::{transform_forcing, ForcingFunction};
use crate::frequency::solve_transformed;
use crate::inverse::{invert, ForcedSolution};
use crate::model::{InitialConditions, OdeSpec, ResponseMode, SolverSettings};
use crate::numeric::{integrate, NumericTrajectory};
use crate::time_domain::TimeExpression;
use log::{debug, info, warn};
use serde::Serialize;

/// Relative cross-check deviation above which the report carries a note.
const CROSS_CHECK_TOLERANCE: f64 = 1e-4;

/// States of one request.
///
/// `Init -> RootsClassified -> BasisBuilt`, then either `ConstantsResolved`
/// or `Transformed -> FrequencyDomainSolved -> Inverted`, and finally
/// `Reported`. A failing sub-path jumps straight to `Reported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStage {
    Init,
    RootsClassified,
    BasisBuilt,
    ConstantsResolved,
    Transformed,
    FrequencyDomainSolved,
    Inverted,
    Reported,
}

impl PipelineStage {
    pub fn can_advance_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        matches!(
            (self, next),
            (Init, RootsClassified)
                | (RootsClassified, BasisBuilt)
                | (BasisBuilt, ConstantsResolved)
                | (BasisBuilt, Transformed)
                | (Transformed, FrequencyDomainSolved)
                | (FrequencyDomainSolved, Inverted)
        ) || (next == Reported && self != Init && self != Reported)
    }
}

struct StageTracker {
    visited: Vec<PipelineStage>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            visited: vec![PipelineStage::Init],
        }
    }

    fn current(&self) -> PipelineStage {
        self.visited
            .last()
            .copied()
            .unwrap_or(PipelineStage::Init)
    }

    fn advance(&mut self, next: PipelineStage) -> ResponseResult<()> {
        let current = self.current();
        if !current.can_advance_to(next) {
            return Err(ResponseError::invalid(format!(
                "illegal pipeline transition {current:?} -> {next:?}"
            )));
        }
        debug!("stage {current:?} -> {next:?}");
        self.visited.push(next);
        Ok(())
    }
}

/// Which part of the pipeline a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticPath {
    Request,
    Analytic,
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Diagnostic {
    Failure {
        path: DiagnosticPath,
        error: ResponseError,
    },
    Note {
        path: DiagnosticPath,
        message: String,
    },
}

/// Laplace-domain artifacts of the forced path, rendered as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForcedResponse {
    /// Canonical time-domain right-hand side `d + f(t)`.
    pub input: String,
    /// `F(s)`.
    pub forcing_transform: String,
    /// `Y(s)`.
    pub output_transform: String,
    pub solution: ForcedSolution,
}

/// Agreement between the closed form and the numeric trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrossCheck {
    pub max_abs_error: f64,
    pub at_time: f64,
}

/// Everything computed for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolutionReport {
    pub spec: OdeSpec,
    pub forcing: Option<String>,
    pub roots: CharacteristicRoots,
    pub general_solution: GeneralSolution,
    pub basis: Vec<String>,
    pub particular: Option<ParticularSolution>,
    pub forced: Option<ForcedResponse>,
    pub trajectory: Option<NumericTrajectory>,
    pub cross_check: Option<CrossCheck>,
    pub stages: Vec<PipelineStage>,
    pub diagnostics: Vec<Diagnostic>,
}

impl SolutionReport {
    /// The analytic `y(t)`, from whichever path the mode selected.
    pub fn closed_form(&self) -> Option<&TimeExpression> {
        self.particular
            .as_ref()
            .map(|p| &p.expression)
            .or_else(|| self.forced.as_ref().map(|f| &f.solution.expression))
    }

    pub fn evaluate(&self, t: f64) -> Option<f64> {
        self.closed_form().map(|expr| expr.evaluate(t))
    }

    pub fn failures(&self) -> Vec<&ResponseError> {
        self.diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::Failure { error, .. } => Some(error),
                Diagnostic::Note { .. } => None,
            })
            .collect()
    }

    /// True when no sub-path failed.
    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }
}

#[derive(Default)]
struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    fn note(&mut self, path: DiagnosticPath, message: impl Into<String>) {
        let message = message.into();
        info!("{path:?}: {message}");
        self.entries.push(Diagnostic::Note { path, message });
    }

    fn failure(&mut self, path: DiagnosticPath, error: ResponseError) {
        warn!("{path:?} path failed: {error}");
        self.entries.push(Diagnostic::Failure { path, error });
    }
}

/// Solves with [`SolverSettings::default`].
pub fn solve(
    spec: &OdeSpec,
    initial: Option<&InitialConditions>,
    forcing: Option<&ForcingFunction>,
) -> ResponseResult<SolutionReport> {
    solve_with_settings(spec, initial, forcing, &SolverSettings::default())
}

/// Computes the requested response of `spec`.
///
/// Returns `Err` only for request-level problems (degenerate equation,
/// invalid values, missing initial conditions). Failures of the analytic or
/// numeric path are reported as diagnostics on an otherwise valid report.
pub fn solve_with_settings(
    spec: &OdeSpec,
    initial: Option<&InitialConditions>,
    forcing: Option<&ForcingFunction>,
    settings: &SolverSettings,
) -> ResponseResult<SolutionReport> {
    spec.validate()?;
    settings.validate()?;
    info!(
        "solving order-{} equation {:?} in {:?} mode",
        spec.order(),
        spec.coefficients,
        spec.mode
    );

    let mut diagnostics = Diagnostics::default();
    let order = spec.order();
    let initial = request_initial_conditions(spec, initial, &mut diagnostics)?;
    let state = initial.state(order)?;
    let forcing = request_forcing(spec, forcing, &mut diagnostics);

    let mut stages = StageTracker::new();
    let roots = CharacteristicRoots::classify(spec, settings.root_tolerance)?;
    stages.advance(PipelineStage::RootsClassified)?;
    let general_solution = GeneralSolution::new(roots);
    stages.advance(PipelineStage::BasisBuilt)?;
    debug!("{}: {general_solution}", roots.describe());

    let mut particular: Option<ParticularSolution> = None;
    let mut forced: Option<ForcedResponse> = None;
    match spec.mode {
        ResponseMode::ZeroInput => {
            match resolve_constants(&general_solution, &initial, settings.singular_tolerance) {
                Ok(solution) => {
                    stages.advance(PipelineStage::ConstantsResolved)?;
                    particular = Some(solution);
                }
                Err(err) => diagnostics.failure(DiagnosticPath::Analytic, err),
            }
        }
        ResponseMode::ZeroState | ResponseMode::General => {
            let initial_state = (spec.mode == ResponseMode::General).then_some(state.as_slice());
            match forced_response(spec, &roots, forcing, initial_state, settings, &mut stages) {
                Ok(response) => forced = Some(response),
                Err(err) => diagnostics.failure(DiagnosticPath::Analytic, err),
            }
        }
    }

    let trajectory = if settings.run_numeric {
        match integrate(spec, &state, forcing, settings) {
            Ok(trajectory) => Some(trajectory),
            Err(err) => {
                diagnostics.failure(DiagnosticPath::Numeric, err);
                None
            }
        }
    } else {
        None
    };

    let closed_form = particular
        .as_ref()
        .map(|p| &p.expression)
        .or_else(|| forced.as_ref().map(|f| &f.solution.expression));
    let cross_check = match (closed_form, &trajectory) {
        (Some(expr), Some(trajectory)) => trajectory
            .max_deviation(|t| expr.evaluate(t))
            .map(|(max_abs_error, at_time)| CrossCheck {
                max_abs_error,
                at_time,
            }),
        _ => None,
    };
    if let (Some(check), Some(trajectory)) = (cross_check, &trajectory) {
        debug!(
            "closed form and trajectory differ by at most {:e} (t = {})",
            check.max_abs_error, check.at_time
        );
        let peak = trajectory.samples.iter().fold(0.0_f64, |acc, s| acc.max(s.y.abs()));
        if check.max_abs_error > CROSS_CHECK_TOLERANCE * (1.0 + peak) {
            diagnostics.note(
                DiagnosticPath::Numeric,
                format!(
                    "closed form and trajectory disagree by {:e} at t = {}",
                    check.max_abs_error, check.at_time
                ),
            );
        }
    }

    stages.advance(PipelineStage::Reported)?;
    Ok(SolutionReport {
        spec: *spec,
        forcing: forcing.map(|f| f.source().to_string()),
        roots,
        basis: general_solution.basis.describe(),
        general_solution,
        particular,
        forced,
        trajectory,
        cross_check,
        stages: stages.visited,
        diagnostics: diagnostics.entries,
    })
}

fn request_initial_conditions(
    spec: &OdeSpec,
    initial: Option<&InitialConditions>,
    diagnostics: &mut Diagnostics,
) -> ResponseResult<InitialConditions> {
    if spec.mode.uses_initial_conditions() {
        return initial.copied().ok_or_else(|| {
            ResponseError::invalid(format!("{:?} response needs initial conditions", spec.mode))
        });
    }
    if initial.is_some() {
        diagnostics.note(
            DiagnosticPath::Request,
            "initial conditions are ignored for the zero-state response",
        );
    }
    Ok(InitialConditions::zero(spec.order()))
}

fn request_forcing<'a>(
    spec: &OdeSpec,
    forcing: Option<&'a ForcingFunction>,
    diagnostics: &mut Diagnostics,
) -> Option<&'a ForcingFunction> {
    if !spec.mode.uses_forcing() {
        if forcing.is_some() || spec.constant_input != 0.0 {
            diagnostics.note(
                DiagnosticPath::Request,
                "forcing and constant input are ignored for the zero-input response",
            );
        }
        return None;
    }
    if forcing.is_none() && spec.constant_input == 0.0 {
        diagnostics.note(
            DiagnosticPath::Request,
            "no forcing given; the forced part of the response is zero",
        );
    }
    forcing
}

fn forced_response(
    spec: &OdeSpec,
    roots: &CharacteristicRoots,
    forcing: Option<&ForcingFunction>,
    initial_state: Option<&[f64]>,
    settings: &SolverSettings,
    stages: &mut StageTracker,
) -> ResponseResult<ForcedResponse> {
    let transformed = transform_forcing(forcing, spec.constant_input, settings.pole_tolerance)?;
    stages.advance(PipelineStage::Transformed)?;

    let equation = solve_transformed(
        &spec.coefficients,
        roots,
        &transformed.transform,
        initial_state,
    );
    stages.advance(PipelineStage::FrequencyDomainSolved)?;

    let solution = invert(&equation.partial_fractions(), settings.pole_tolerance);
    stages.advance(PipelineStage::Inverted)?;

    Ok(ForcedResponse {
        input: transformed.terms.to_string(),
        forcing_transform: equation.forcing.to_string(),
        output_transform: equation.output.to_string(),
        solution,
    })
}
