use super::correspondence::{PartialFractionTerm, TransformPair};
use super::polynomial::{format_real_polynomial, ComplexPolynomial};
use crate::time_domain::format_number;
use num_complex::Complex64;
use std::fmt;

/// A pole with its multiplicity in a denominator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pole {
    pub value: Complex64,
    pub multiplicity: usize,
}

/// `numerator(s) / prod (s - p_k)^(m_k)`.
///
/// Poles are kept factored so partial fractions never need a numeric root
/// finder; poles closer than the merge tolerance are treated as one pole.
#[derive(Debug, Clone, PartialEq)]
pub struct FactoredRational {
    pub numerator: ComplexPolynomial,
    pub poles: Vec<Pole>,
    tolerance: f64,
}

impl FactoredRational {
    pub fn zero(tolerance: f64) -> Self {
        Self {
            numerator: ComplexPolynomial::zero(),
            poles: Vec::new(),
            tolerance,
        }
    }

    /// Sums the frequency-domain images of `pairs` over a common denominator.
    pub fn from_pairs(pairs: &[TransformPair], tolerance: f64) -> Self {
        let mut rational = Self::zero(tolerance);
        for pair in pairs {
            let pf = pair.to_partial_fraction();
            rational.raise_pole(pf.pole, pf.order);
        }

        let mut numerator = ComplexPolynomial::zero();
        for pair in pairs {
            let pf = pair.to_partial_fraction();
            let index = rational.find_pole(pf.pole).unwrap_or_default();
            let mut term = ComplexPolynomial::constant(pf.residue);
            for (k, pole) in rational.poles.iter().enumerate() {
                let power = if k == index {
                    pole.multiplicity - pf.order
                } else {
                    pole.multiplicity
                };
                term = term.mul(&ComplexPolynomial::linear_power(pole.value, power));
            }
            numerator = numerator.add(&term);
        }
        rational.numerator = numerator;
        rational
    }

    /// Expanded denominator polynomial.
    pub fn denominator(&self) -> ComplexPolynomial {
        self.poles.iter().fold(ComplexPolynomial::one(), |acc, pole| {
            acc.mul(&ComplexPolynomial::linear_power(pole.value, pole.multiplicity))
        })
    }

    /// `self + polynomial`, keeping the denominator.
    pub fn add_polynomial(&self, polynomial: &ComplexPolynomial) -> Self {
        Self {
            numerator: self
                .numerator
                .add(&polynomial.mul(&self.denominator())),
            ..self.clone()
        }
    }

    /// `self * scale / prod (s - p)^m` over the given extra poles.
    pub fn divide_by_poles(&self, poles: &[(Complex64, usize)], scale: f64) -> Self {
        let mut out = Self {
            numerator: self.numerator.scale(Complex64::new(scale, 0.0)),
            ..self.clone()
        };
        for &(value, multiplicity) in poles {
            match out.find_pole(value) {
                Some(index) => out.poles[index].multiplicity += multiplicity,
                None => out.poles.push(Pole {
                    value,
                    multiplicity,
                }),
            }
        }
        out
    }

    pub fn evaluate(&self, s: Complex64) -> Complex64 {
        self.numerator.evaluate(s) / self.denominator().evaluate(s)
    }

    pub fn is_zero(&self) -> bool {
        self.numerator.is_zero()
    }

    /// Partial-fraction decomposition of a strictly proper rational function.
    ///
    /// For a pole `p` of multiplicity `m` and `g(s) = (s - p)^m * self`, the
    /// coefficient of `1/(s - p)^(m - j)` is `g^(j)(p) / j!`, i.e. the j-th
    /// Taylor coefficient of `g` at `p`. That coefficient is built exactly
    /// from a Taylor shift of the numerator and truncated geometric series of
    /// the remaining factors. Negligible residues are dropped.
    pub fn partial_fractions(&self) -> Vec<PartialFractionTerm> {
        debug_assert!(
            self.numerator.degree().map_or(true, |d| d < self.degree()),
            "partial fractions need a strictly proper rational function"
        );
        let mut terms = Vec::new();
        for (index, pole) in self.poles.iter().enumerate() {
            let m = pole.multiplicity;
            let mut series = self.numerator.taylor(pole.value, m);
            for (other_index, other) in self.poles.iter().enumerate() {
                if other_index == index {
                    continue;
                }
                let inverse = inverse_linear_series(pole.value - other.value, m);
                for _ in 0..other.multiplicity {
                    series = series_mul(&series, &inverse, m);
                }
            }
            for (j, residue) in series.into_iter().enumerate() {
                terms.push(PartialFractionTerm {
                    pole: pole.value,
                    order: m - j,
                    residue,
                });
            }
        }

        let scale = terms.iter().map(|t| t.residue.norm()).fold(0.0, f64::max);
        terms.retain(|t| t.residue.norm() > 1e-12 * scale && t.residue.norm() > 0.0);
        terms
    }

    /// Denominator degree.
    pub fn degree(&self) -> usize {
        self.poles.iter().map(|p| p.multiplicity).sum()
    }

    fn raise_pole(&mut self, value: Complex64, multiplicity: usize) {
        match self.find_pole(value) {
            Some(index) => {
                let pole = &mut self.poles[index];
                pole.multiplicity = pole.multiplicity.max(multiplicity);
            }
            None => self.poles.push(Pole {
                value,
                multiplicity,
            }),
        }
    }

    fn find_pole(&self, value: Complex64) -> Option<usize> {
        self.poles.iter().position(|pole| {
            (pole.value - value).norm() <= self.tolerance * pole.value.norm().max(1.0)
        })
    }

    /// Denominator factors as text, conjugate pairs folded into real quadratics.
    fn denominator_factors(&self) -> Vec<String> {
        let mut factors = Vec::new();
        for pole in &self.poles {
            let p = pole.value;
            let im_small = p.im.abs() <= self.tolerance * p.norm().max(1.0);
            let base = if im_small {
                if p.re.abs() <= self.tolerance {
                    "s".to_string()
                } else if p.re > 0.0 {
                    format!("(s - {})", format_number(p.re))
                } else {
                    format!("(s + {})", format_number(-p.re))
                }
            } else if p.im > 0.0 {
                let quadratic = [p.norm_sqr(), -2.0 * p.re, 1.0];
                format!("({})", format_real_polynomial(&quadratic))
            } else {
                // Lower half-plane partner, printed with its conjugate.
                continue;
            };
            factors.push(match pole.multiplicity {
                1 => base,
                m => format!("{base}^{m}"),
            });
        }
        factors
    }
}

impl fmt::Display for FactoredRational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numerator = self.numerator.to_string();
        let factors = self.denominator_factors();
        if factors.is_empty() || self.numerator.is_zero() {
            return write!(f, "{numerator}");
        }
        let numerator = if numerator.contains(' ') {
            format!("({numerator})")
        } else {
            numerator
        };
        if factors.len() == 1 {
            write!(f, "{numerator}/{}", factors[0])
        } else {
            write!(f, "{numerator}/({})", factors.join("*"))
        }
    }
}

/// Series of `1/(d + h)` in `h`: `sum (-1)^k h^k / d^(k+1)`.
fn inverse_linear_series(d: Complex64, terms: usize) -> Vec<Complex64> {
    let inv = d.inv();
    let mut out = Vec::with_capacity(terms);
    let mut current = inv;
    for _ in 0..terms {
        out.push(current);
        current = -current * inv;
    }
    out
}

fn series_mul(a: &[Complex64], b: &[Complex64], terms: usize) -> Vec<Complex64> {
    let mut out = vec![Complex64::default(); terms];
    for (i, x) in a.iter().enumerate().take(terms) {
        for (j, y) in b.iter().enumerate().take(terms - i) {
            out[i + j] += x * y;
        }
    }
    out
}
