//! Inverse Laplace transform of partial-fraction expansions.

use crate::time_domain::{Oscillation, TimeExpression, TimeTerm};
use crate::transform::{PartialFractionTerm, TransformPair};
use serde::Serialize;
use std::fmt;

/// One real-valued term of the forced solution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum ForcedTerm {
    /// `coefficient * t^power * exp(rate*t)`.
    Exponential { coefficient: f64, power: u32, rate: f64 },
    /// `amplitude * t^power * exp(rate*t) * cos(frequency*t + phase)`.
    DampedSinusoid {
        amplitude: f64,
        phase: f64,
        power: u32,
        rate: f64,
        frequency: f64,
    },
}

impl ForcedTerm {
    /// Expansion into canonical terms; a phase-shifted cosine becomes
    /// `A cos(phase) cos(wt) - A sin(phase) sin(wt)`.
    pub fn time_terms(&self) -> Vec<TimeTerm> {
        match *self {
            ForcedTerm::Exponential {
                coefficient,
                power,
                rate,
            } => vec![TimeTerm::exponential(coefficient, power, rate)],
            ForcedTerm::DampedSinusoid {
                amplitude,
                phase,
                power,
                rate,
                frequency,
            } => vec![
                TimeTerm::oscillating(amplitude * phase.cos(), power, rate, frequency, Oscillation::Cos),
                TimeTerm::oscillating(-amplitude * phase.sin(), power, rate, frequency, Oscillation::Sin),
            ],
        }
    }
}

/// The inverse transform of `Y(s)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForcedSolution {
    pub terms: Vec<ForcedTerm>,
    pub expression: TimeExpression,
}

impl ForcedSolution {
    pub fn evaluate(&self, t: f64) -> f64 {
        self.expression.evaluate(t)
    }
}

impl fmt::Display for ForcedSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "y(t) = {}", self.expression)
    }
}

/// Reads partial fractions back through [`TransformPair`].
///
/// A pole counts as real when its imaginary part is within `tolerance`
/// (relative). Complex poles come in conjugate pairs and only the upper
/// member is read; it contributes `2 * Re(W e^{pt})` for the pair weight `W`.
pub fn invert(partials: &[PartialFractionTerm], tolerance: f64) -> ForcedSolution {
    let mut terms = Vec::with_capacity(partials.len());
    for partial in partials {
        let pair = TransformPair::from_partial_fraction(partial);
        let pole = pair.pole;
        if pole.im.abs() <= tolerance * pole.norm().max(1.0) {
            terms.push(ForcedTerm::Exponential {
                coefficient: pair.weight.re,
                power: pair.power,
                rate: pole.re,
            });
        } else if pole.im > 0.0 {
            terms.push(ForcedTerm::DampedSinusoid {
                amplitude: 2.0 * pair.weight.norm(),
                phase: pair.weight.arg(),
                power: pair.power,
                rate: pole.re,
                frequency: pole.im,
            });
        }
    }
    let expression = TimeExpression::from_terms(terms.iter().flat_map(ForcedTerm::time_terms));
    ForcedSolution { terms, expression }
}
