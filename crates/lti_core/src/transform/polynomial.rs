use num_complex::Complex64;
use std::fmt;

/// Polynomial in `s` with complex coefficients, lowest degree first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplexPolynomial {
    coeffs: Vec<Complex64>,
}

impl ComplexPolynomial {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(value: Complex64) -> Self {
        Self::from_coefficients(vec![value])
    }

    pub fn one() -> Self {
        Self::constant(Complex64::new(1.0, 0.0))
    }

    pub fn from_coefficients(coeffs: Vec<Complex64>) -> Self {
        let mut poly = Self { coeffs };
        poly.trim();
        poly
    }

    /// Real coefficients, lowest degree first.
    pub fn from_real(coeffs: &[f64]) -> Self {
        Self::from_coefficients(coeffs.iter().map(|&c| Complex64::new(c, 0.0)).collect())
    }

    /// `(s - root)^power`.
    pub fn linear_power(root: Complex64, power: usize) -> Self {
        let factor = Self::from_coefficients(vec![-root, Complex64::new(1.0, 0.0)]);
        (0..power).fold(Self::one(), |acc, _| acc.mul(&factor))
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Degree, with the zero polynomial reported as `None`.
    pub fn degree(&self) -> Option<usize> {
        self.coeffs.len().checked_sub(1)
    }

    pub fn add(&self, other: &Self) -> Self {
        let len = self.coeffs.len().max(other.coeffs.len());
        let coeffs = (0..len)
            .map(|i| {
                self.coeffs.get(i).copied().unwrap_or_default()
                    + other.coeffs.get(i).copied().unwrap_or_default()
            })
            .collect();
        Self::from_coefficients(coeffs)
    }

    pub fn mul(&self, other: &Self) -> Self {
        if self.is_zero() || other.is_zero() {
            return Self::zero();
        }
        let mut coeffs = vec![Complex64::default(); self.coeffs.len() + other.coeffs.len() - 1];
        for (i, a) in self.coeffs.iter().enumerate() {
            for (j, b) in other.coeffs.iter().enumerate() {
                coeffs[i + j] += a * b;
            }
        }
        Self::from_coefficients(coeffs)
    }

    pub fn scale(&self, factor: Complex64) -> Self {
        Self::from_coefficients(self.coeffs.iter().map(|c| c * factor).collect())
    }

    pub fn evaluate(&self, s: Complex64) -> Complex64 {
        self.coeffs
            .iter()
            .rev()
            .fold(Complex64::default(), |acc, c| acc * s + c)
    }

    /// First `terms` coefficients of the expansion of `p(center + h)` in `h`.
    pub fn taylor(&self, center: Complex64, terms: usize) -> Vec<Complex64> {
        let mut shifted = self.coeffs.clone();
        let n = shifted.len();
        for k in 0..n {
            for j in (k..n - 1).rev() {
                let next = shifted[j + 1];
                shifted[j] += center * next;
            }
        }
        shifted.resize(n.max(terms), Complex64::default());
        shifted.truncate(terms);
        shifted
    }

    /// Drops imaginary parts when every one is negligible.
    pub fn real_coefficients(&self, tolerance: f64) -> Option<Vec<f64>> {
        let scale = self.coeffs.iter().map(|c| c.norm()).fold(0.0, f64::max);
        self.coeffs
            .iter()
            .map(|c| (c.im.abs() <= tolerance * scale.max(1.0)).then_some(c.re))
            .collect()
    }

    fn trim(&mut self) {
        while self
            .coeffs
            .last()
            .is_some_and(|c| c.re == 0.0 && c.im == 0.0)
        {
            self.coeffs.pop();
        }
    }
}

impl fmt::Display for ComplexPolynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coeffs: Vec<f64> = match self.real_coefficients(1e-9) {
            Some(real) => real,
            None => self.coeffs.iter().map(|c| c.re).collect(),
        };
        write!(f, "{}", format_real_polynomial(&coeffs))
    }
}

/// Renders real coefficients (lowest degree first) highest power first.
pub(crate) fn format_real_polynomial(coeffs: &[f64]) -> String {
    let scale = coeffs.iter().map(|c| c.abs()).fold(0.0, f64::max);
    let mut parts: Vec<String> = Vec::new();
    for (power, &c) in coeffs.iter().enumerate().rev() {
        if c == 0.0 || c.abs() <= 1e-12 * scale {
            continue;
        }
        let magnitude = crate::time_domain::format_number(c.abs());
        let body = match (power, magnitude.as_str()) {
            (0, _) => magnitude,
            (1, "1") => "s".to_string(),
            (1, _) => format!("{magnitude}*s"),
            (p, "1") => format!("s^{p}"),
            (p, _) => format!("{magnitude}*s^{p}"),
        };
        let negative = c < 0.0;
        if parts.is_empty() {
            parts.push(if negative { format!("-{body}") } else { body });
        } else {
            parts.push(format!("{} {body}", if negative { "-" } else { "+" }));
        }
    }
    if parts.is_empty() {
        "0".to_string()
    } else {
        parts.join(" ")
    }
}
