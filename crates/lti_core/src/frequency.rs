//! The transformed equation `(a*s^n + ...) Y(s) = F(s) + I(s)` and its solution.

use crate::characteristic::{characteristic_polynomial, CharacteristicRoots};
use crate::model::Coefficients;
use crate::transform::polynomial::format_real_polynomial;
use crate::transform::{ComplexPolynomial, FactoredRational, PartialFractionTerm};
use log::debug;

/// Artifacts of solving the equation in the Laplace domain.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedEquation {
    /// `F(s)`, transform of the right-hand side.
    pub forcing: FactoredRational,
    /// `I(s)`, contribution of the initial conditions.
    pub initial_terms: ComplexPolynomial,
    /// Characteristic polynomial, lowest degree first.
    pub characteristic: Vec<f64>,
    /// `Y(s) = (F(s) + I(s)) / P(s)`.
    pub output: FactoredRational,
}

impl TransformedEquation {
    pub fn characteristic_text(&self) -> String {
        format_real_polynomial(&self.characteristic)
    }

    pub fn partial_fractions(&self) -> Vec<PartialFractionTerm> {
        self.output.partial_fractions()
    }
}

/// Initial-value polynomial from the derivative rule
/// `L{y'} = sY - y0`, `L{y''} = s^2 Y - s y0 - y0'`:
/// `a*y0` for order 1, `a*(y0*s + y0') + b*y0` for order 2.
pub fn initial_polynomial(coefficients: &Coefficients, state: &[f64]) -> ComplexPolynomial {
    match (*coefficients, state) {
        (Coefficients::First { a, .. }, [y0, ..]) => ComplexPolynomial::from_real(&[a * y0]),
        (Coefficients::Second { a, b, .. }, [y0, dy0, ..]) => {
            ComplexPolynomial::from_real(&[a * dy0 + b * y0, a * y0])
        }
        _ => ComplexPolynomial::zero(),
    }
}

/// Solves for `Y(s)` with the characteristic roots as poles.
///
/// `initial_state` is `None` for the zero-state response. Characteristic
/// roots that coincide with forcing poles merge into a higher multiplicity.
pub fn solve_transformed(
    coefficients: &Coefficients,
    roots: &CharacteristicRoots,
    forcing: &FactoredRational,
    initial_state: Option<&[f64]>,
) -> TransformedEquation {
    let initial_terms = initial_state
        .map(|state| initial_polynomial(coefficients, state))
        .unwrap_or_else(ComplexPolynomial::zero);
    let output = forcing
        .add_polynomial(&initial_terms)
        .divide_by_poles(&roots.poles(), 1.0 / coefficients.leading());
    debug!("Y(s) = {output}");
    TransformedEquation {
        forcing: forcing.clone(),
        initial_terms,
        characteristic: characteristic_polynomial(coefficients),
        output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_domain::{Oscillation, TimeTerm};
    use crate::transform::TransformPair;
    use num_complex::Complex64;

    const TOL: f64 = 1e-9;

    fn forcing_of(terms: &[TimeTerm]) -> FactoredRational {
        let pairs: Vec<TransformPair> = terms.iter().flat_map(TransformPair::decompose).collect();
        FactoredRational::from_pairs(&pairs, TOL)
    }

    fn solve(coefficients: Coefficients, forcing: &FactoredRational, state: Option<&[f64]>) -> TransformedEquation {
        let roots = CharacteristicRoots::from_coefficients(&coefficients, TOL);
        solve_transformed(&coefficients, &roots, forcing, state)
    }

    #[test]
    fn ramp_into_integrator() {
        let eq = solve(
            Coefficients::First { a: 1.0, b: 0.0 },
            &forcing_of(&[TimeTerm::exponential(1.0, 1, 0.0)]),
            None,
        );
        assert_eq!(eq.forcing.to_string(), "1/s^2");
        assert_eq!(eq.output.to_string(), "1/s^3");
        assert_eq!(eq.characteristic_text(), "s");
        assert!(eq.initial_terms.is_zero());
    }

    #[test]
    fn initial_conditions_enter_the_numerator() {
        let first = Coefficients::First { a: 1.0, b: 1.0 };
        let eq = solve(first, &FactoredRational::zero(TOL), Some(&[2.0]));
        assert_eq!(eq.output.to_string(), "2/(s + 1)");

        let second = Coefficients::Second { a: 1.0, b: 2.0, c: 5.0 };
        let eq = solve(second, &FactoredRational::zero(TOL), Some(&[1.0, 0.0]));
        assert_eq!(eq.initial_terms.to_string(), "s + 2");
        assert_eq!(eq.output.to_string(), "(s + 2)/(s^2 + 2*s + 5)");
        assert_eq!(eq.characteristic_text(), "s^2 + 2*s + 5");
    }

    #[test]
    fn resonant_forcing_raises_multiplicity() {
        let eq = solve(
            Coefficients::Second { a: 1.0, b: 0.0, c: 1.0 },
            &forcing_of(&[TimeTerm::oscillating(1.0, 0, 0.0, 1.0, Oscillation::Sin)]),
            None,
        );
        assert_eq!(eq.output.poles.len(), 2);
        assert!(eq.output.poles.iter().all(|p| p.multiplicity == 2));
        assert_eq!(eq.output.to_string(), "1/(s^2 + 1)^2");
    }

    #[test]
    fn output_satisfies_the_transformed_equation() {
        let coefficients = Coefficients::Second { a: 2.0, b: -1.0, c: 3.0 };
        let forcing = forcing_of(&[
            TimeTerm::exponential(1.5, 1, -2.0),
            TimeTerm::oscillating(0.5, 0, 0.0, 3.0, Oscillation::Cos),
        ]);
        let eq = solve(coefficients, &forcing, Some(&[0.7, -1.2]));
        for s in [Complex64::new(0.4, 0.9), Complex64::new(-3.0, 1.0), Complex64::new(5.0, 0.0)] {
            let p = 2.0 * s * s - s + 3.0;
            let expected = (forcing.evaluate(s) + eq.initial_terms.evaluate(s)) / p;
            assert!((eq.output.evaluate(s) - expected).norm() < 1e-12 * expected.norm().max(1.0));
        }
    }
}
