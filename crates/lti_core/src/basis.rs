//! Homogeneous solution bases keyed on the root classification.

use crate::characteristic::CharacteristicRoots;
use crate::time_domain::{Oscillation, TimeExpression, TimeTerm};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A free constant of the general solution, fixed by its basis position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstantSlot {
    C1,
    C2,
}

impl ConstantSlot {
    pub const ALL: [ConstantSlot; 2] = [ConstantSlot::C1, ConstantSlot::C2];

    pub fn index(self) -> usize {
        match self {
            ConstantSlot::C1 => 0,
            ConstantSlot::C2 => 1,
        }
    }
}

impl fmt::Display for ConstantSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantSlot::C1 => write!(f, "C1"),
            ConstantSlot::C2 => write!(f, "C2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasisFunction {
    pub slot: ConstantSlot,
    /// Unit-coefficient function of time.
    pub term: TimeTerm,
}

impl BasisFunction {
    pub fn value_at(&self, t: f64) -> f64 {
        self.term.evaluate(t)
    }

    pub fn derivative_at(&self, t: f64) -> f64 {
        self.term.derivative().iter().map(|d| d.evaluate(t)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionBasis {
    pub functions: Vec<BasisFunction>,
}

impl SolutionBasis {
    /// Builds the basis for the given roots; slots follow basis order.
    pub fn from_roots(roots: &CharacteristicRoots) -> Self {
        let terms = match *roots {
            CharacteristicRoots::SingleReal { root } => vec![TimeTerm::exponential(1.0, 0, root)],
            CharacteristicRoots::DistinctReal { r1, r2 } => vec![
                TimeTerm::exponential(1.0, 0, r1),
                TimeTerm::exponential(1.0, 0, r2),
            ],
            CharacteristicRoots::RepeatedReal { root } => vec![
                TimeTerm::exponential(1.0, 0, root),
                TimeTerm::exponential(1.0, 1, root),
            ],
            CharacteristicRoots::ComplexConjugate { re, im } => vec![
                TimeTerm::oscillating(1.0, 0, re, im, Oscillation::Cos),
                TimeTerm::oscillating(1.0, 0, re, im, Oscillation::Sin),
            ],
        };
        let functions = terms
            .into_iter()
            .zip(ConstantSlot::ALL)
            .map(|(term, slot)| BasisFunction { slot, term })
            .collect();
        Self { functions }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Human-readable basis functions, e.g. `["exp(-t)", "t*exp(-t)"]`.
    pub fn describe(&self) -> Vec<String> {
        self.functions.iter().map(|f| f.term.shape()).collect()
    }

    /// `sum(constant_k * basis_k)` for constants given in slot order.
    pub fn combine(&self, constants: &[f64]) -> TimeExpression {
        TimeExpression::from_terms(
            self.functions
                .iter()
                .map(|f| f.term.scaled(constants[f.slot.index()])),
        )
    }
}

/// Homogeneous solution with its constants still free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSolution {
    pub roots: CharacteristicRoots,
    pub basis: SolutionBasis,
}

impl GeneralSolution {
    pub fn new(roots: CharacteristicRoots) -> Self {
        Self {
            basis: SolutionBasis::from_roots(&roots),
            roots,
        }
    }

    pub fn constants(&self) -> Vec<ConstantSlot> {
        self.basis.functions.iter().map(|f| f.slot).collect()
    }
}

impl fmt::Display for GeneralSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .basis
            .functions
            .iter()
            .map(|func| match func.term.shape().as_str() {
                "1" => func.slot.to_string(),
                shape => format!("{}*{}", func.slot, shape),
            })
            .collect();
        write!(f, "y(t) = {}", parts.join(" + "))
    }
}

/// General solution with every constant resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticularSolution {
    pub basis: SolutionBasis,
    pub constants: Vec<(ConstantSlot, f64)>,
    pub expression: TimeExpression,
}

impl ParticularSolution {
    pub fn evaluate(&self, t: f64) -> f64 {
        self.expression.evaluate(t)
    }

    pub fn constant(&self, slot: ConstantSlot) -> Option<f64> {
        self.constants
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, value)| *value)
    }
}

impl fmt::Display for ParticularSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "y(t) = {}", self.expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_table_matches_root_structure() {
        let basis = SolutionBasis::from_roots(&CharacteristicRoots::SingleReal { root: -3.0 });
        assert_eq!(basis.describe(), vec!["exp(-3*t)"]);

        let basis =
            SolutionBasis::from_roots(&CharacteristicRoots::DistinctReal { r1: 1.0, r2: -2.0 });
        assert_eq!(basis.describe(), vec!["exp(t)", "exp(-2*t)"]);

        let basis = SolutionBasis::from_roots(&CharacteristicRoots::RepeatedReal { root: -1.0 });
        assert_eq!(basis.describe(), vec!["exp(-t)", "t*exp(-t)"]);

        let basis = SolutionBasis::from_roots(&CharacteristicRoots::ComplexConjugate {
            re: -0.5,
            im: 2.0,
        });
        assert_eq!(
            basis.describe(),
            vec!["exp(-0.5*t)*cos(2*t)", "exp(-0.5*t)*sin(2*t)"]
        );
    }

    #[test]
    fn slots_follow_basis_position() {
        let general = GeneralSolution::new(CharacteristicRoots::RepeatedReal { root: 2.0 });
        assert_eq!(general.constants(), vec![ConstantSlot::C1, ConstantSlot::C2]);
        assert_eq!(general.basis.functions[1].term.power, 1);
    }

    #[test]
    fn general_solution_renders_with_constants() {
        let general = GeneralSolution::new(CharacteristicRoots::SingleReal { root: 0.0 });
        assert_eq!(general.to_string(), "y(t) = C1");

        let general = GeneralSolution::new(CharacteristicRoots::ComplexConjugate {
            re: 0.0,
            im: 1.0,
        });
        assert_eq!(general.to_string(), "y(t) = C1*cos(t) + C2*sin(t)");
    }

    #[test]
    fn derivative_at_zero_of_damped_sine_is_frequency() {
        let basis = SolutionBasis::from_roots(&CharacteristicRoots::ComplexConjugate {
            re: -1.0,
            im: 3.0,
        });
        assert_eq!(basis.functions[1].value_at(0.0), 0.0);
        assert!((basis.functions[1].derivative_at(0.0) - 3.0).abs() < 1e-15);
        assert!((basis.functions[0].derivative_at(0.0) + 1.0).abs() < 1e-15);
    }
}
