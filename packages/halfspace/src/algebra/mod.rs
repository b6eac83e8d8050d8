//! Normalized multivariate polynomial algebra.

pub mod monomial;
pub mod polynomial;

pub use self::monomial::Monomial;
pub use self::polynomial::{FreeVariables, NonConstantDivisor, Polynomial};
