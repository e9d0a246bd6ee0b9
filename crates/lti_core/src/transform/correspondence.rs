//! The single Laplace correspondence used in both directions:
//!
//! ```text
//! weight * t^n * exp(p*t)   <->   weight * n! / (s - p)^(n+1)
//! ```
//!
//! Forward transforms decompose canonical time terms into pairs; inverse
//! transforms read partial-fraction terms back as pairs. Extending the
//! forcing grammar therefore only needs a new decomposition into pairs.

use crate::time_domain::{Oscillation, TimeTerm};
use num_complex::Complex64;
use serde::Serialize;

/// One partial-fraction term `residue / (s - pole)^order`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PartialFractionTerm {
    pub pole: Complex64,
    pub order: usize,
    pub residue: Complex64,
}

/// `weight * t^power * exp(pole*t)`, the common currency of both transform directions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformPair {
    pub power: u32,
    pub pole: Complex64,
    pub weight: Complex64,
}

impl TransformPair {
    /// Frequency-domain side: `weight * power! / (s - pole)^(power + 1)`.
    pub fn to_partial_fraction(&self) -> PartialFractionTerm {
        PartialFractionTerm {
            pole: self.pole,
            order: self.power as usize + 1,
            residue: self.weight * factorial(self.power),
        }
    }

    /// Reads a partial-fraction term back as a time-domain pair.
    pub fn from_partial_fraction(term: &PartialFractionTerm) -> Self {
        let power = term.order.saturating_sub(1) as u32;
        Self {
            power,
            pole: term.pole,
            weight: term.residue / factorial(power),
        }
    }

    /// Splits a real canonical term into complex-exponential pairs.
    ///
    /// `cos(wt) = (e^{iwt} + e^{-iwt}) / 2` and
    /// `sin(wt) = (e^{iwt} - e^{-iwt}) / 2i`, so every sinusoid becomes a
    /// conjugate pole pair shifted by the exponential rate.
    pub fn decompose(term: &TimeTerm) -> Vec<TransformPair> {
        let c = term.coefficient;
        match term.oscillation {
            Oscillation::None => vec![TransformPair {
                power: term.power,
                pole: Complex64::new(term.rate, 0.0),
                weight: Complex64::new(c, 0.0),
            }],
            Oscillation::Cos => Self::conjugate_pair(term, Complex64::new(0.5 * c, 0.0)),
            Oscillation::Sin => Self::conjugate_pair(term, Complex64::new(0.0, -0.5 * c)),
        }
    }

    fn conjugate_pair(term: &TimeTerm, upper_weight: Complex64) -> Vec<TransformPair> {
        let upper = Complex64::new(term.rate, term.frequency);
        vec![
            TransformPair {
                power: term.power,
                pole: upper,
                weight: upper_weight,
            },
            TransformPair {
                power: term.power,
                pole: upper.conj(),
                weight: upper_weight.conj(),
            },
        ]
    }
}

pub(crate) fn factorial(n: u32) -> f64 {
    (1..=n).map(f64::from).product()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_maps_to_factorial_over_pole_power() {
        // t^3  <->  6 / s^4
        let pairs = TransformPair::decompose(&TimeTerm::exponential(1.0, 3, 0.0));
        assert_eq!(pairs.len(), 1);
        let pf = pairs[0].to_partial_fraction();
        assert_eq!(pf.order, 4);
        assert_eq!(pf.residue, Complex64::new(6.0, 0.0));
        assert_eq!(pf.pole, Complex64::new(0.0, 0.0));
    }

    #[test]
    fn partial_fraction_round_trips_through_pair() {
        let pf = PartialFractionTerm {
            pole: Complex64::new(-1.0, 2.0),
            order: 3,
            residue: Complex64::new(4.0, -2.0),
        };
        let pair = TransformPair::from_partial_fraction(&pf);
        assert_eq!(pair.power, 2);
        assert_eq!(pair.weight, Complex64::new(2.0, -1.0));
        assert_eq!(pair.to_partial_fraction(), pf);
    }

    #[test]
    fn sinusoids_split_into_conjugate_pairs() {
        let sin = TimeTerm::oscillating(2.0, 0, -1.0, 3.0, Oscillation::Sin);
        let pairs = TransformPair::decompose(&sin);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].pole, Complex64::new(-1.0, 3.0));
        assert_eq!(pairs[1].pole, Complex64::new(-1.0, -3.0));
        assert_eq!(pairs[0].weight, Complex64::new(0.0, -1.0));
        assert_eq!(pairs[1].weight, Complex64::new(0.0, 1.0));

        // Recombining the exponentials reproduces the sinusoid.
        let t = 0.7_f64;
        let value: Complex64 = pairs
            .iter()
            .map(|p| p.weight * (p.pole * t).exp())
            .sum();
        assert!((value.re - sin.evaluate(t)).abs() < 1e-14);
        assert!(value.im.abs() < 1e-14);
    }

    #[test]
    fn factorial_values() {
        assert_eq!(factorial(0), 1.0);
        assert_eq!(factorial(5), 120.0);
    }
}
