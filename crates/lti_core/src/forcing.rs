//! Forcing functions and their forward Laplace transform.

use crate::equation_engine::{compile, parse, Bytecode, Expr, Function, VM};
use crate::error::{ResponseError, ResponseResult};
use crate::time_domain::{Oscillation, TimeExpression, TimeTerm};
use crate::transform::{FactoredRational, TransformPair};
use log::debug;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Largest `n` accepted in `t^n`; `n!` must stay exact in an `f64`.
const MAX_POWER: f64 = 20.0;

/// A parsed forcing expression `f(t)`.
///
/// Parsing only checks syntax and names. Whether the expression fits the
/// transformable grammar is decided by [`ForcingFunction::canonical_terms`],
/// so expressions outside it can still drive the numeric integrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ForcingFunction {
    source: String,
    expr: Expr,
    program: Bytecode,
}

impl ForcingFunction {
    pub fn parse(source: &str) -> ResponseResult<Self> {
        let expr = parse(source)?;
        let program = compile(&expr);
        Ok(Self {
            source: source.trim().to_string(),
            expr,
            program,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn program(&self) -> &Bytecode {
        &self.program
    }

    /// Numeric value through the bytecode VM.
    pub fn evaluate(&self, t: f64) -> f64 {
        VM::execute(&self.program, t, &mut Vec::with_capacity(16))
    }

    /// The expression as a sum of canonical time terms, or
    /// `UnsupportedForcingTerm` when it leaves the transformable grammar.
    pub fn canonical_terms(&self) -> ResponseResult<TimeExpression> {
        let monomials = lower(&self.expr)?;
        Ok(TimeExpression::from_terms(
            monomials.iter().flat_map(Monomial::canonical_terms),
        ))
    }

    /// Eager grammar check for callers that reject at the boundary.
    pub fn validate(&self) -> ResponseResult<()> {
        self.canonical_terms().map(|_| ())
    }
}

impl FromStr for ForcingFunction {
    type Err = ResponseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ForcingFunction {
    type Error = ResponseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ForcingFunction> for String {
    fn from(value: ForcingFunction) -> Self {
        value.source
    }
}

/// Primitive factors of the forcing grammar.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Primitive {
    Power(u32),
    Exponential(f64),
    Sine(f64),
    Cosine(f64),
}

/// `coefficient * product(factors)` with at most two factors.
#[derive(Debug, Clone, PartialEq)]
struct Monomial {
    coefficient: f64,
    factors: Vec<Primitive>,
}

impl Monomial {
    fn constant(coefficient: f64) -> Self {
        Self {
            coefficient,
            factors: Vec::new(),
        }
    }

    fn primitive(primitive: Primitive) -> Self {
        Self {
            coefficient: 1.0,
            factors: vec![primitive],
        }
    }

    fn scaled(mut self, factor: f64) -> Self {
        self.coefficient *= factor;
        self
    }

    /// Powers add, rates add, two sinusoids go through product-to-sum.
    fn canonical_terms(&self) -> Vec<TimeTerm> {
        let mut terms = vec![TimeTerm::constant(self.coefficient)];
        for factor in &self.factors {
            terms = terms
                .iter()
                .flat_map(|term| multiply(term, *factor))
                .collect();
        }
        terms
    }
}

fn multiply(term: &TimeTerm, factor: Primitive) -> Vec<TimeTerm> {
    match factor {
        Primitive::Power(n) => vec![TimeTerm {
            power: term.power + n,
            ..*term
        }],
        Primitive::Exponential(k) => vec![TimeTerm {
            rate: term.rate + k,
            ..*term
        }],
        Primitive::Sine(w) => multiply_sinusoid(term, Oscillation::Sin, w),
        Primitive::Cosine(w) => multiply_sinusoid(term, Oscillation::Cos, w),
    }
}

fn multiply_sinusoid(term: &TimeTerm, oscillation: Oscillation, w: f64) -> Vec<TimeTerm> {
    let make = |coefficient: f64, frequency: f64, kind: Oscillation| {
        TimeTerm::oscillating(coefficient, term.power, term.rate, frequency, kind)
    };
    let half = 0.5 * term.coefficient;
    let a = term.frequency;
    match (term.oscillation, oscillation) {
        (Oscillation::None, kind) => vec![make(term.coefficient, w, kind)],
        (Oscillation::Cos, Oscillation::Cos) => vec![
            make(half, a - w, Oscillation::Cos),
            make(half, a + w, Oscillation::Cos),
        ],
        (Oscillation::Sin, Oscillation::Sin) => vec![
            make(half, a - w, Oscillation::Cos),
            make(-half, a + w, Oscillation::Cos),
        ],
        (Oscillation::Sin, Oscillation::Cos) => vec![
            make(half, a + w, Oscillation::Sin),
            make(half, a - w, Oscillation::Sin),
        ],
        (Oscillation::Cos, Oscillation::Sin) => vec![
            make(half, a + w, Oscillation::Sin),
            make(-half, a - w, Oscillation::Sin),
        ],
        (_, Oscillation::None) => vec![*term],
    }
}

/// Lowers an AST into a sum of monomials, enforcing the grammar.
fn lower(expr: &Expr) -> ResponseResult<Vec<Monomial>> {
    if expr.is_constant() {
        return match expr.constant_value() {
            Some(value) => Ok(vec![Monomial::constant(value)]),
            None => Err(ResponseError::unsupported(
                expr.to_string(),
                "constant sub-expression is not finite",
            )),
        };
    }
    match expr {
        Expr::Time => Ok(vec![Monomial::primitive(Primitive::Power(1))]),
        Expr::Unary(_, inner) => Ok(negate(lower(inner)?)),
        Expr::Binary(left, '+', right) => {
            let mut out = lower(left)?;
            out.extend(lower(right)?);
            Ok(out)
        }
        Expr::Binary(left, '-', right) => {
            let mut out = lower(left)?;
            out.extend(negate(lower(right)?));
            Ok(out)
        }
        Expr::Binary(left, '*', right) => product(&lower(left)?, &lower(right)?, expr),
        Expr::Binary(left, '/', right) => match right.constant_value() {
            Some(divisor) if divisor != 0.0 => Ok(lower(left)?
                .into_iter()
                .map(|m| m.scaled(1.0 / divisor))
                .collect()),
            _ => Err(ResponseError::unsupported(
                expr.to_string(),
                "division is only allowed by a nonzero constant",
            )),
        },
        Expr::Binary(base, '^', exponent) => {
            let n = exponent.constant_value().filter(|n| {
                n.fract() == 0.0 && *n >= 0.0 && *n <= MAX_POWER
            });
            match (base.as_ref(), n) {
                (Expr::Time, Some(n)) => Ok(vec![Monomial::primitive(Primitive::Power(n as u32))]),
                _ => Err(ResponseError::unsupported(
                    expr.to_string(),
                    format!("powers must be t^n with an integer 0 <= n <= {MAX_POWER}"),
                )),
            }
        }
        Expr::Call(func, arg) => {
            let rate = linear_rate(arg).ok_or_else(|| {
                ResponseError::unsupported(
                    expr.to_string(),
                    format!("{}() needs an argument of the form k*t", func.name()),
                )
            })?;
            let primitive = match func {
                Function::Exp => Primitive::Exponential(rate),
                Function::Sin => Primitive::Sine(rate),
                Function::Cos => Primitive::Cosine(rate),
            };
            Ok(vec![Monomial::primitive(primitive)])
        }
        other => Err(ResponseError::unsupported(
            other.to_string(),
            "construct outside the forcing grammar",
        )),
    }
}

fn negate(monomials: Vec<Monomial>) -> Vec<Monomial> {
    monomials.into_iter().map(|m| m.scaled(-1.0)).collect()
}

fn product(left: &[Monomial], right: &[Monomial], expr: &Expr) -> ResponseResult<Vec<Monomial>> {
    let mut out = Vec::with_capacity(left.len() * right.len());
    for a in left {
        for b in right {
            let factors: Vec<Primitive> = a.factors.iter().chain(&b.factors).copied().collect();
            if factors.len() > 2 {
                return Err(ResponseError::unsupported(
                    expr.to_string(),
                    format!(
                        "product of {} primitives; at most two are supported",
                        factors.len()
                    ),
                ));
            }
            out.push(Monomial {
                coefficient: a.coefficient * b.coefficient,
                factors,
            });
        }
    }
    Ok(out)
}

/// `k` when `arg` is `k*t` (in any arrangement of constant factors).
fn linear_rate(arg: &Expr) -> Option<f64> {
    match arg {
        Expr::Time => Some(1.0),
        Expr::Unary(_, inner) => linear_rate(inner).map(|k| -k),
        Expr::Binary(left, '*', right) => {
            if let Some(c) = left.constant_value() {
                linear_rate(right).map(|k| c * k)
            } else {
                right.constant_value().and_then(|c| linear_rate(left).map(|k| c * k))
            }
        }
        Expr::Binary(left, '/', right) => right
            .constant_value()
            .filter(|c| *c != 0.0)
            .and_then(|c| linear_rate(left).map(|k| k / c)),
        _ => None,
    }
}

/// Forward transform of the right-hand side `d + f(t)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForcingTransform {
    /// Canonical time-domain right-hand side.
    pub terms: TimeExpression,
    pub pairs: Vec<TransformPair>,
    pub transform: FactoredRational,
}

/// Transforms `constant_input + forcing(t)` into `F(s)`.
pub fn transform_forcing(
    forcing: Option<&ForcingFunction>,
    constant_input: f64,
    pole_tolerance: f64,
) -> ResponseResult<ForcingTransform> {
    let mut terms = match forcing {
        Some(forcing) => forcing.canonical_terms()?,
        None => TimeExpression::new(),
    };
    if constant_input != 0.0 {
        terms = terms.sum(&TimeExpression::from_terms([TimeTerm::constant(constant_input)]));
    }
    // Poles i*w and -i*w within the merge tolerance would collapse into one
    // pole and cancel, so such sinusoids take their small-angle limit first.
    let terms = TimeExpression::from_terms(terms.terms.iter().map(|term| {
        let pole_scale = term.rate.hypot(term.frequency).max(1.0);
        term.small_angle_limit(pole_tolerance * pole_scale)
    }));
    let pairs: Vec<TransformPair> = terms.terms.iter().flat_map(TransformPair::decompose).collect();
    let transform = FactoredRational::from_pairs(&pairs, pole_tolerance);
    debug!("forcing {terms} transforms to F(s) = {transform}");
    Ok(ForcingTransform {
        terms,
        pairs,
        transform,
    })
}
