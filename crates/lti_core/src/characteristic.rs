//! Roots of the characteristic polynomial and their classification.

use crate::error::ResponseResult;
use crate::model::{Coefficients, OdeSpec};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Structure of the characteristic roots.
///
/// For `ComplexConjugate` the roots are `re ± i*im` with `im > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CharacteristicRoots {
    SingleReal { root: f64 },
    DistinctReal { r1: f64, r2: f64 },
    RepeatedReal { root: f64 },
    ComplexConjugate { re: f64, im: f64 },
}

impl CharacteristicRoots {
    /// Classifies the roots of `spec`'s characteristic polynomial.
    ///
    /// `tolerance` is relative: the discriminant counts as zero when
    /// `|b² - 4ac| <= tolerance * max(b², |4ac|)`.
    pub fn classify(spec: &OdeSpec, tolerance: f64) -> ResponseResult<Self> {
        spec.validate()?;
        Ok(Self::from_coefficients(&spec.coefficients, tolerance))
    }

    pub(crate) fn from_coefficients(coefficients: &Coefficients, tolerance: f64) -> Self {
        match *coefficients {
            Coefficients::First { a, b } => CharacteristicRoots::SingleReal {
                root: snap(-b / a),
            },
            Coefficients::Second { a, b, c } => classify_quadratic(a, b, c, tolerance),
        }
    }

    /// Roots as complex poles with multiplicities.
    pub fn poles(&self) -> Vec<(Complex64, usize)> {
        match *self {
            CharacteristicRoots::SingleReal { root } => vec![(Complex64::new(root, 0.0), 1)],
            CharacteristicRoots::DistinctReal { r1, r2 } => vec![
                (Complex64::new(r1, 0.0), 1),
                (Complex64::new(r2, 0.0), 1),
            ],
            CharacteristicRoots::RepeatedReal { root } => vec![(Complex64::new(root, 0.0), 2)],
            CharacteristicRoots::ComplexConjugate { re, im } => vec![
                (Complex64::new(re, im), 1),
                (Complex64::new(re, -im), 1),
            ],
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            CharacteristicRoots::SingleReal { root } => format!("single real root {root}"),
            CharacteristicRoots::DistinctReal { r1, r2 } => {
                format!("distinct real roots {r1} and {r2}")
            }
            CharacteristicRoots::RepeatedReal { root } => format!("repeated real root {root}"),
            CharacteristicRoots::ComplexConjugate { re, im } => {
                format!("complex conjugate roots {re} ± {im}i")
            }
        }
    }
}

fn classify_quadratic(a: f64, b: f64, c: f64, tolerance: f64) -> CharacteristicRoots {
    let discriminant = b * b - 4.0 * a * c;
    let scale = (b * b).max((4.0 * a * c).abs());
    if discriminant.abs() <= tolerance * scale {
        return CharacteristicRoots::RepeatedReal {
            root: snap(-b / (2.0 * a)),
        };
    }
    if discriminant < 0.0 {
        return CharacteristicRoots::ComplexConjugate {
            re: snap(-b / (2.0 * a)),
            im: snap((-discriminant).sqrt() / (2.0 * a.abs())),
        };
    }

    // q = -(b + sign(b) * sqrt(Δ)) / 2 avoids subtracting nearly equal values.
    let sqrt_disc = discriminant.sqrt();
    let q = if b >= 0.0 {
        -0.5 * (b + sqrt_disc)
    } else {
        -0.5 * (b - sqrt_disc)
    };
    // q/a is the root whose formula sign matches -sign(b).
    let (plus, minus) = if b >= 0.0 {
        (c / q, q / a)
    } else {
        (q / a, c / q)
    };
    CharacteristicRoots::DistinctReal {
        r1: snap(plus),
        r2: snap(minus),
    }
}

/// Snaps values within rounding distance of an integer onto it.
///
/// The distance is relative, so small nonzero values never collapse to zero.
fn snap(value: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() <= 1e-12 * value.abs() {
        // Also normalizes -0.0.
        rounded + 0.0
    } else {
        value
    }
}

/// The characteristic polynomial coefficients, lowest degree first.
pub(crate) fn characteristic_polynomial(coefficients: &Coefficients) -> Vec<f64> {
    let mut ascending = coefficients.as_slice();
    ascending.reverse();
    ascending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResponseError;
    use crate::model::ResponseMode;

    const TOL: f64 = 1e-9;

    fn quadratic(a: f64, b: f64, c: f64) -> CharacteristicRoots {
        let spec = OdeSpec::second_order(a, b, c, ResponseMode::ZeroInput).unwrap();
        CharacteristicRoots::classify(&spec, TOL).unwrap()
    }

    #[test]
    fn first_order_root() {
        let spec = OdeSpec::first_order(2.0, 6.0, ResponseMode::ZeroInput).unwrap();
        assert_eq!(
            CharacteristicRoots::classify(&spec, TOL).unwrap(),
            CharacteristicRoots::SingleReal { root: -3.0 }
        );
    }

    #[test]
    fn zero_root_is_not_negative_zero() {
        let spec = OdeSpec::first_order(1.0, 0.0, ResponseMode::ZeroState).unwrap();
        match CharacteristicRoots::classify(&spec, TOL).unwrap() {
            CharacteristicRoots::SingleReal { root } => {
                assert_eq!(root, 0.0);
                assert!(root.is_sign_positive());
            }
            other => panic!("unexpected roots {other:?}"),
        }
    }

    #[test]
    fn distinct_real_roots_follow_formula_order() {
        // s^2 + 3s + 2 = (s + 1)(s + 2)
        assert_eq!(
            quadratic(1.0, 3.0, 2.0),
            CharacteristicRoots::DistinctReal { r1: -1.0, r2: -2.0 }
        );
        // s^2 - 3s + 2 = (s - 1)(s - 2)
        assert_eq!(
            quadratic(1.0, -3.0, 2.0),
            CharacteristicRoots::DistinctReal { r1: 2.0, r2: 1.0 }
        );
        // s^2 + 4s = s(s + 4)
        assert_eq!(
            quadratic(1.0, 4.0, 0.0),
            CharacteristicRoots::DistinctReal { r1: 0.0, r2: -4.0 }
        );
    }

    #[test]
    fn small_distinct_root_keeps_precision() {
        // Roots near -1e-8 and -1e8; the naive formula loses the small one entirely.
        match quadratic(1.0, 1e8, 1.0) {
            CharacteristicRoots::DistinctReal { r1, r2 } => {
                approx::assert_relative_eq!(r1, -1e-8, max_relative = 1e-9);
                approx::assert_relative_eq!(r2, -1e8, max_relative = 1e-9);
            }
            other => panic!("unexpected roots {other:?}"),
        }
    }

    #[test]
    fn repeated_root_absorbs_rounding() {
        assert_eq!(
            quadratic(1.0, 2.0, 1.0),
            CharacteristicRoots::RepeatedReal { root: -1.0 }
        );
        // 0.1 * 0.1 is not exactly 0.01 in binary.
        match quadratic(1.0, 0.2, 0.01) {
            CharacteristicRoots::RepeatedReal { root } => {
                approx::assert_relative_eq!(root, -0.1, max_relative = 1e-12)
            }
            other => panic!("unexpected roots {other:?}"),
        }
        assert_eq!(
            quadratic(3.0, 0.0, 0.0),
            CharacteristicRoots::RepeatedReal { root: 0.0 }
        );
    }

    #[test]
    fn complex_roots_have_positive_imaginary_part() {
        assert_eq!(
            quadratic(1.0, 0.0, 1.0),
            CharacteristicRoots::ComplexConjugate { re: 0.0, im: 1.0 }
        );
        assert_eq!(
            quadratic(-1.0, -2.0, -5.0),
            CharacteristicRoots::ComplexConjugate { re: -1.0, im: 2.0 }
        );
    }

    #[test]
    fn tiny_imaginary_part_is_not_snapped_away() {
        // s^2 * 1e24 + 1 has roots ±1e-12 i.
        match quadratic(1e24, 0.0, 1.0) {
            CharacteristicRoots::ComplexConjugate { re, im } => {
                assert_eq!(re, 0.0);
                approx::assert_relative_eq!(im, 1e-12, max_relative = 1e-12);
            }
            other => panic!("unexpected roots {other:?}"),
        }
        match quadratic(1.0, 2e-13, 0.0) {
            CharacteristicRoots::DistinctReal { r1, r2 } => {
                assert_eq!(r1, 0.0);
                approx::assert_relative_eq!(r2, -2e-13, max_relative = 1e-12);
            }
            other => panic!("unexpected roots {other:?}"),
        }
    }

    #[test]
    fn degenerate_spec_is_rejected() {
        let spec = OdeSpec {
            coefficients: Coefficients::Second {
                a: 0.0,
                b: 1.0,
                c: 1.0,
            },
            constant_input: 0.0,
            mode: ResponseMode::ZeroInput,
        };
        assert_eq!(
            CharacteristicRoots::classify(&spec, TOL).unwrap_err(),
            ResponseError::DegenerateEquation { order: 2 }
        );
    }

    #[test]
    fn poles_carry_multiplicity() {
        let poles = CharacteristicRoots::RepeatedReal { root: -2.0 }.poles();
        assert_eq!(poles, vec![(Complex64::new(-2.0, 0.0), 2)]);
        let poles = CharacteristicRoots::ComplexConjugate { re: 1.0, im: 3.0 }.poles();
        assert_eq!(poles.len(), 2);
        assert_eq!(poles[0].0.conj(), poles[1].0);
    }
}
