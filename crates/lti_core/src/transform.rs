//! Laplace-domain algebra shared by the forced-response pipeline.
//!
//! - `polynomial`: complex-coefficient polynomials in `s`.
//! - `correspondence`: the one transform table, used forwards and backwards.
//! - `rational`: factored rational functions and their partial fractions.

pub mod correspondence;
pub mod polynomial;
pub mod rational;

pub use correspondence::{PartialFractionTerm, TransformPair};
pub use polynomial::ComplexPolynomial;
pub use rational::{FactoredRational, Pole};
