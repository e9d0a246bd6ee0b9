use lti_core::{
    solve, solve_with_settings, Coefficients, ForcingFunction, InitialConditions, OdeSpec,
    ResponseError, ResponseMode, SolutionReport, SolverSettings,
};
use lti_core::time_domain::TimeExpression;
use proptest::prelude::*;
use simplelog::{Config, LevelFilter, TestLogger};

fn init_logging() {
    let _ = TestLogger::init(LevelFilter::Debug, Config::default());
}

fn closed_form(report: &SolutionReport) -> &TimeExpression {
    report.closed_form().expect("report has a closed form")
}

/// Sum of absolute term values, used to scale residual tolerances.
fn magnitude(expr: &TimeExpression, t: f64) -> f64 {
    expr.terms.iter().map(|term| term.evaluate(t).abs()).sum()
}

/// Checks `L[y](t) = d + f(t)` with exact derivatives of the closed form.
fn assert_residual(spec: &OdeSpec, forcing: Option<&ForcingFunction>, y: &TimeExpression, t: f64) {
    let derivatives = y.derivatives(spec.order());
    let values: Vec<f64> = derivatives.iter().map(|d| d.evaluate(t)).collect();
    let lhs = spec.coefficients.apply(&values);
    let rhs = spec.constant_input + forcing.map_or(0.0, |f| f.evaluate(t));
    let scale: f64 = 1.0
        + rhs.abs()
        + spec
            .coefficients
            .as_slice()
            .iter()
            .rev()
            .zip(&derivatives)
            .map(|(c, d)| c.abs() * magnitude(d, t))
            .sum::<f64>();
    assert!(
        (lhs - rhs).abs() <= 1e-8 * scale,
        "residual {} at t = {t} for y(t) = {y}",
        lhs - rhs
    );
}

fn assert_initial_values(y: &TimeExpression, expected: &[f64]) {
    let derivatives = y.derivatives(expected.len() - 1);
    for (k, (d, want)) in derivatives.iter().zip(expected).enumerate() {
        let got = d.evaluate(0.0);
        assert!(
            (got - want).abs() <= 1e-9 * (1.0 + want.abs()),
            "y^({k})(0) = {got}, expected {want} for y(t) = {y}"
        );
    }
}

#[test]
fn scenario_first_order_free_decay() {
    init_logging();
    let spec = OdeSpec::first_order(1.0, 3.0, ResponseMode::ZeroInput).unwrap();
    let report = solve(&spec, Some(&InitialConditions::first_order(2.0)), None).unwrap();
    assert_eq!(closed_form(&report).to_string(), "2*exp(-3*t)");
    assert_eq!(report.basis, vec!["exp(-3*t)"]);
    assert_eq!(report.general_solution.to_string(), "y(t) = C1*exp(-3*t)");
    assert!(report.is_complete());
}

#[test]
fn scenario_critically_damped() {
    init_logging();
    let spec = OdeSpec::second_order(1.0, 2.0, 1.0, ResponseMode::ZeroInput).unwrap();
    let report = solve(&spec, Some(&InitialConditions::second_order(1.0, 0.0)), None).unwrap();
    assert_eq!(report.basis, vec!["exp(-t)", "t*exp(-t)"]);
    assert_eq!(closed_form(&report).to_string(), "exp(-t) + t*exp(-t)");
    for &t in &[0.0_f64, 0.5, 2.0] {
        let expected = (1.0 + t) * (-t).exp();
        assert!((report.evaluate(t).unwrap() - expected).abs() < 1e-12);
    }
}

#[test]
fn scenario_undamped_oscillator() {
    init_logging();
    let spec = OdeSpec::second_order(1.0, 0.0, 1.0, ResponseMode::ZeroInput).unwrap();
    let report = solve(&spec, Some(&InitialConditions::second_order(1.0, 0.0)), None).unwrap();
    assert_eq!(
        report.general_solution.to_string(),
        "y(t) = C1*cos(t) + C2*sin(t)"
    );
    assert_eq!(closed_form(&report).to_string(), "cos(t)");
    assert!(report.cross_check.unwrap().max_abs_error < 1e-7);
}

#[test]
fn scenario_ramp_into_integrator() {
    init_logging();
    let spec = OdeSpec::first_order(1.0, 0.0, ResponseMode::ZeroState).unwrap();
    let forcing = ForcingFunction::parse("t").unwrap();
    let report = solve(&spec, None, Some(&forcing)).unwrap();
    let forced = report.forced.as_ref().unwrap();
    assert_eq!(forced.forcing_transform, "1/s^2");
    assert_eq!(forced.output_transform, "1/s^3");
    assert_eq!(closed_form(&report).to_string(), "0.5*t^2");
    assert_eq!(report.forcing.as_deref(), Some("t"));
}

#[test]
fn scenario_degenerate_leading_coefficient() {
    init_logging();
    assert_eq!(
        OdeSpec::first_order(0.0, 1.0, ResponseMode::ZeroInput).unwrap_err(),
        ResponseError::DegenerateEquation { order: 1 }
    );
    let spec = OdeSpec {
        coefficients: Coefficients::First { a: 0.0, b: 1.0 },
        constant_input: 0.0,
        mode: ResponseMode::ZeroInput,
    };
    let err = solve(&spec, Some(&InitialConditions::first_order(1.0)), None).unwrap_err();
    assert_eq!(err, ResponseError::DegenerateEquation { order: 1 });
    assert!(err.is_request_fatal());
}

#[test]
fn scenario_nearly_constant_sinusoid_forcing() {
    init_logging();
    // 1e9*sin(1e-11*t) is 0.01*t to within (1e-11*t)^2.
    let spec = OdeSpec::first_order(1.0, 1.0, ResponseMode::ZeroState).unwrap();
    let forcing = ForcingFunction::parse("1000000000*sin(0.00000000001*t)").unwrap();
    let report = solve(&spec, None, Some(&forcing)).unwrap();
    assert!(report.is_complete(), "{:?}", report.diagnostics);
    let forced = report.forced.as_ref().unwrap();
    assert_eq!(forced.input, "0.01*t");
    assert_eq!(forced.forcing_transform, "0.01/s^2");
    for &t in &[0.5_f64, 3.3, 8.0] {
        let expected = 0.01 * (t - 1.0 + (-t).exp());
        let got = report.evaluate(t).unwrap();
        assert!((got - expected).abs() < 1e-12, "y({t}) = {got}, expected {expected}");
    }
    assert!(report.cross_check.unwrap().max_abs_error < 1e-7);
}

#[test]
fn scenario_very_slow_oscillator() {
    init_logging();
    // Roots ±1e-12 i: over any practical span y(t) = 2 + 3t.
    let spec = OdeSpec::second_order(1e24, 0.0, 1.0, ResponseMode::ZeroInput).unwrap();
    let report = solve(&spec, Some(&InitialConditions::second_order(2.0, 3.0)), None).unwrap();
    assert!(report.is_complete(), "{:?}", report.diagnostics);
    for &t in &[0.0_f64, 1.0, 4.0] {
        let got = report.evaluate(t).unwrap();
        assert!((got - (2.0 + 3.0 * t)).abs() < 1e-9 * (1.0 + got.abs()), "y({t}) = {got}");
    }
    assert!(report.cross_check.unwrap().max_abs_error < 1e-6);
}

#[test]
fn forced_solutions_satisfy_equation_and_initial_values() {
    init_logging();
    let cases: Vec<(OdeSpec, InitialConditions, &str)> = vec![
        (
            OdeSpec::first_order(2.0, 1.0, ResponseMode::General)
                .unwrap()
                .with_constant_input(3.0),
            InitialConditions::first_order(1.0),
            "exp(-t)*sin(2*t)",
        ),
        (
            // Resonance: cos(2t) drives natural frequency 2.
            OdeSpec::second_order(1.0, 0.0, 4.0, ResponseMode::General).unwrap(),
            InitialConditions::second_order(1.0, -1.0),
            "cos(2*t)",
        ),
        (
            // Forcing shares the repeated root -1.
            OdeSpec::second_order(1.0, 2.0, 1.0, ResponseMode::ZeroState).unwrap(),
            InitialConditions::second_order(0.0, 0.0),
            "t*exp(-t)",
        ),
        (
            OdeSpec::second_order(1.0, 3.0, 2.0, ResponseMode::General)
                .unwrap()
                .with_constant_input(-1.0),
            InitialConditions::second_order(0.5, 2.0),
            "t^2",
        ),
        (
            OdeSpec::second_order(2.0, 1.0, 5.0, ResponseMode::General).unwrap(),
            InitialConditions::second_order(-1.0, 0.25),
            "sin(t)*cos(3*t) - 2*exp(0.5*t)",
        ),
    ];

    for (spec, initial, source) in cases {
        let forcing = ForcingFunction::parse(source).unwrap();
        let report = solve(&spec, Some(&initial), Some(&forcing)).unwrap();
        assert!(report.is_complete(), "{source}: {:?}", report.diagnostics);
        let y = closed_form(&report);
        for &t in &[0.0, 0.5, 1.3, 2.9] {
            assert_residual(&spec, Some(&forcing), y, t);
        }
        let expected = if spec.mode == ResponseMode::General {
            initial.state(spec.order()).unwrap()
        } else {
            vec![0.0; spec.order()]
        };
        assert_initial_values(y, &expected);
    }
}

#[test]
fn trajectory_starts_at_initial_value_and_agrees_with_closed_form() {
    init_logging();
    let settings = SolverSettings {
        time_span: 6.0,
        ..SolverSettings::default()
    };
    let spec = OdeSpec::second_order(1.0, 0.5, 4.0, ResponseMode::General).unwrap();
    let forcing = ForcingFunction::parse("cos(2*t) + t").unwrap();
    let report = solve_with_settings(
        &spec,
        Some(&InitialConditions::second_order(2.0, -1.0)),
        Some(&forcing),
        &settings,
    )
    .unwrap();

    let trajectory = report.trajectory.as_ref().unwrap();
    let first = trajectory.first().unwrap();
    assert_eq!((first.t, first.y), (0.0, 2.0));
    assert_eq!(trajectory.last().unwrap().t, 6.0);
    assert!(trajectory.samples.windows(2).all(|w| w[0].t < w[1].t));

    let peak = trajectory.samples.iter().map(|s| s.y.abs()).fold(0.0, f64::max);
    let check = report.cross_check.unwrap();
    assert!(
        check.max_abs_error < 1e-6 * (1.0 + peak),
        "closed form and trajectory differ by {} at t = {}",
        check.max_abs_error,
        check.at_time
    );
}

proptest! {
    #[test]
    fn zero_input_solutions_satisfy_equation(
        a in 0.5_f64..3.0,
        b in -3.0_f64..3.0,
        c in -3.0_f64..3.0,
        y0 in -5.0_f64..5.0,
        dy0 in -5.0_f64..5.0,
        t in 0.0_f64..1.5,
    ) {
        let spec = OdeSpec::second_order(a, b, c, ResponseMode::ZeroInput).unwrap();
        let settings = SolverSettings { run_numeric: false, ..SolverSettings::default() };
        let report = solve_with_settings(
            &spec,
            Some(&InitialConditions::second_order(y0, dy0)),
            None,
            &settings,
        )
        .unwrap();
        prop_assert!(report.particular.is_some(), "{:?}", report.diagnostics);
        let y = closed_form(&report);
        assert_residual(&spec, None, y, t);
        assert_initial_values(y, &[y0, dy0]);
    }

    #[test]
    fn first_order_zero_input_is_a_single_exponential(
        a in 0.5_f64..3.0,
        b in -3.0_f64..3.0,
        y0 in -5.0_f64..5.0,
        t in 0.0_f64..1.5,
    ) {
        let spec = OdeSpec::first_order(a, b, ResponseMode::ZeroInput).unwrap();
        let settings = SolverSettings { run_numeric: false, ..SolverSettings::default() };
        let report = solve_with_settings(&spec, Some(&InitialConditions::first_order(y0)), None, &settings)
            .unwrap();
        let expected = y0 * (-b / a * t).exp();
        let got = report.evaluate(t).unwrap();
        prop_assert!((got - expected).abs() <= 1e-9 * (1.0 + expected.abs()));
    }
}
