//! Closed-form functions of time.
//!
//! Every analytic result in the crate is a finite sum of terms
//!
//! ```text
//! coefficient * t^power * exp(rate*t) * {1 | cos(frequency*t) | sin(frequency*t)}
//! ```
//!
//! which is closed under differentiation, so residual and initial-value checks
//! are exact instead of finite-difference approximations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Relative size below which a coefficient is treated as cancellation noise.
const PRUNE_RELATIVE: f64 = 1e-12;
/// Frequencies at or below this are rounding residue of `w1 - w2`.
const ZERO_FREQUENCY: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Oscillation {
    None,
    Cos,
    Sin,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeTerm {
    pub coefficient: f64,
    pub power: u32,
    pub rate: f64,
    pub frequency: f64,
    pub oscillation: Oscillation,
}

impl TimeTerm {
    pub fn constant(coefficient: f64) -> Self {
        Self::exponential(coefficient, 0, 0.0)
    }

    /// `coefficient * t^power * exp(rate*t)`.
    pub fn exponential(coefficient: f64, power: u32, rate: f64) -> Self {
        Self {
            coefficient,
            power,
            rate,
            frequency: 0.0,
            oscillation: Oscillation::None,
        }
    }

    /// `coefficient * t^power * exp(rate*t) * cos|sin(frequency*t)`.
    ///
    /// Negative frequencies are folded into the coefficient. A frequency at
    /// or below rounding level takes its small-angle limit, see
    /// [`TimeTerm::small_angle_limit`].
    pub fn oscillating(
        coefficient: f64,
        power: u32,
        rate: f64,
        frequency: f64,
        oscillation: Oscillation,
    ) -> Self {
        let (coefficient, frequency) = match oscillation {
            Oscillation::Sin if frequency < 0.0 => (-coefficient, -frequency),
            _ => (coefficient, frequency.abs()),
        };
        Self {
            coefficient,
            power,
            rate,
            frequency,
            oscillation,
        }
        .small_angle_limit(ZERO_FREQUENCY)
    }

    /// Replaces `cos(wt)` by `1` and `sin(wt)` by `w*t` when `w <= threshold`.
    ///
    /// The dropped remainder is `O((wt)^2)` relative to the term.
    pub fn small_angle_limit(&self, threshold: f64) -> Self {
        if self.oscillation == Oscillation::None || self.frequency > threshold {
            return *self;
        }
        match self.oscillation {
            Oscillation::Sin => Self::exponential(
                self.coefficient * self.frequency,
                self.power + 1,
                self.rate,
            ),
            _ => Self::exponential(self.coefficient, self.power, self.rate),
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            coefficient: self.coefficient * factor,
            ..*self
        }
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        let mut value = self.coefficient * (self.rate * t).exp();
        if self.power > 0 {
            value *= t.powi(self.power as i32);
        }
        match self.oscillation {
            Oscillation::None => value,
            Oscillation::Cos => value * (self.frequency * t).cos(),
            Oscillation::Sin => value * (self.frequency * t).sin(),
        }
    }

    /// Exact derivative by the product rule.
    pub fn derivative(&self) -> Vec<TimeTerm> {
        let mut out = Vec::with_capacity(3);
        if self.power > 0 {
            out.push(Self {
                coefficient: self.coefficient * self.power as f64,
                power: self.power - 1,
                ..*self
            });
        }
        if self.rate != 0.0 {
            out.push(self.scaled(self.rate));
        }
        match self.oscillation {
            Oscillation::None => {}
            Oscillation::Cos => out.push(Self {
                coefficient: -self.coefficient * self.frequency,
                oscillation: Oscillation::Sin,
                ..*self
            }),
            Oscillation::Sin => out.push(Self {
                coefficient: self.coefficient * self.frequency,
                oscillation: Oscillation::Cos,
                ..*self
            }),
        }
        out
    }

    /// Same function of time up to the coefficient.
    pub fn same_shape(&self, other: &TimeTerm) -> bool {
        self.power == other.power
            && self.oscillation == other.oscillation
            && close(self.rate, other.rate)
            && (self.oscillation == Oscillation::None || close(self.frequency, other.frequency))
    }

    /// The term with unit coefficient, e.g. `t*exp(-t)`.
    pub fn shape(&self) -> String {
        let factors = self.factors();
        if factors.is_empty() {
            "1".to_string()
        } else {
            factors.join("*")
        }
    }

    fn factors(&self) -> Vec<String> {
        let mut factors = Vec::new();
        match self.power {
            0 => {}
            1 => factors.push("t".to_string()),
            n => factors.push(format!("t^{n}")),
        }
        if self.rate != 0.0 {
            factors.push(format!("exp({})", scaled_time(self.rate)));
        }
        match self.oscillation {
            Oscillation::None => {}
            Oscillation::Cos => factors.push(format!("cos({})", scaled_time(self.frequency))),
            Oscillation::Sin => factors.push(format!("sin({})", scaled_time(self.frequency))),
        }
        factors
    }
}

impl fmt::Display for TimeTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factors = self.factors();
        if factors.is_empty() {
            return write!(f, "{}", format_number(self.coefficient));
        }
        let body = factors.join("*");
        let coefficient = format_number(self.coefficient);
        match coefficient.as_str() {
            "1" => write!(f, "{body}"),
            "-1" => write!(f, "-{body}"),
            _ => write!(f, "{coefficient}*{body}"),
        }
    }
}

/// A finite sum of [`TimeTerm`]s with like terms merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeExpression {
    pub terms: Vec<TimeTerm>,
}

impl TimeExpression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a merged and pruned expression.
    pub fn from_terms(terms: impl IntoIterator<Item = TimeTerm>) -> Self {
        let mut expression = Self::new();
        for term in terms {
            expression.push(term);
        }
        expression.prune();
        expression
    }

    /// Adds a term, merging it into an existing term of the same shape.
    pub fn push(&mut self, term: TimeTerm) {
        if let Some(existing) = self.terms.iter_mut().find(|t| t.same_shape(&term)) {
            existing.coefficient += term.coefficient;
        } else {
            self.terms.push(term);
        }
    }

    /// Drops terms that are negligible against the largest coefficient.
    pub fn prune(&mut self) {
        let largest = self
            .terms
            .iter()
            .map(|t| t.coefficient.abs())
            .fold(0.0, f64::max);
        let threshold = largest * PRUNE_RELATIVE;
        self.terms
            .retain(|t| t.coefficient != 0.0 && t.coefficient.abs() > threshold);
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        self.terms.iter().map(|term| term.evaluate(t)).sum()
    }

    pub fn derivative(&self) -> TimeExpression {
        TimeExpression::from_terms(self.terms.iter().flat_map(TimeTerm::derivative))
    }

    /// `[y, y', ..., y^(order)]` as expressions.
    pub fn derivatives(&self, order: usize) -> Vec<TimeExpression> {
        let mut out = vec![self.clone()];
        for _ in 0..order {
            let next = out[out.len() - 1].derivative();
            out.push(next);
        }
        out
    }

    pub fn sum(&self, other: &TimeExpression) -> TimeExpression {
        TimeExpression::from_terms(self.terms.iter().chain(other.terms.iter()).copied())
    }
}

impl fmt::Display for TimeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, term) in self.terms.iter().enumerate() {
            let text = term.to_string();
            if i == 0 {
                write!(f, "{text}")?;
            } else if let Some(rest) = text.strip_prefix('-') {
                write!(f, " - {rest}")?;
            } else {
                write!(f, " + {text}")?;
            }
        }
        Ok(())
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

fn scaled_time(k: f64) -> String {
    match format_number(k).as_str() {
        "1" => "t".to_string(),
        "-1" => "-t".to_string(),
        s => format!("{s}*t"),
    }
}

/// Plain decimal text the forcing parser reads back.
///
/// Values within `1e-10` (relative) of a nonzero integer print as that
/// integer; everything else keeps 12 significant digits.
pub(crate) fn format_number(value: f64) -> String {
    let rounded = value.round();
    let near_integer = value == 0.0
        || (rounded != 0.0 && (value - rounded).abs() <= 1e-10 * value.abs());
    if near_integer && rounded.abs() < 1e15 {
        return format!("{}", rounded as i64);
    }
    let significant: f64 = format!("{value:.11e}").parse().unwrap_or(value);
    format!("{significant}")
}
