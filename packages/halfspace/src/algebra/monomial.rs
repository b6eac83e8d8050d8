//! Monomials: sorted multisets of variable identifiers.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::ops::{Mul, MulAssign};

use num_traits::One;

/** A monomial in several variables.

A monomial is a product of variable powers, stored as a sorted run-length
encoding from variable to exponent. The empty monomial is the constant 1.
Zero exponents are never stored, so equality of monomials coincides with
equality of the underlying variable multisets, and the derived ordering is
total and deterministic.
 */
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Monomial<Var>(BTreeMap<Var, u32>);

impl<Var> Default for Monomial<Var> {
    fn default() -> Self {
        Monomial(BTreeMap::new())
    }
}

impl<Var> Monomial<Var>
where
    Var: Ord,
{
    /// Generating monomial on a single variable.
    pub fn generator(var: Var) -> Self {
        Monomial([(var, 1)].into_iter().collect())
    }

    /// Total degree: the sum of the exponents.
    pub fn degree(&self) -> u32 {
        self.0.values().sum()
    }

    /// Is the monomial the constant 1?
    pub fn is_constant(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the variables, in sorted order.
    pub fn variables(&self) -> impl ExactSizeIterator<Item = &Var> {
        self.0.keys()
    }

    /// Iterates over variable-exponent pairs, in sorted order.
    pub fn powers(&self) -> impl ExactSizeIterator<Item = (&Var, u32)> {
        self.0.iter().map(|(var, exp)| (var, *exp))
    }
}

/// Collects a sequence of variables, duplicates allowed, into their product.
impl<Var> FromIterator<Var> for Monomial<Var>
where
    Var: Ord,
{
    fn from_iter<T: IntoIterator<Item = Var>>(iter: T) -> Self {
        let mut powers = BTreeMap::new();
        for var in iter {
            *powers.entry(var).or_insert(0) += 1;
        }
        Monomial(powers)
    }
}

impl<Var> MulAssign for Monomial<Var>
where
    Var: Ord,
{
    fn mul_assign(&mut self, rhs: Self) {
        for (var, exp) in rhs.0 {
            *self.0.entry(var).or_insert(0) += exp;
        }
    }
}

impl<Var> Mul for Monomial<Var>
where
    Var: Ord,
{
    type Output = Self;

    fn mul(mut self, rhs: Self) -> Self {
        self *= rhs;
        self
    }
}

impl<Var> One for Monomial<Var>
where
    Var: Ord,
{
    fn one() -> Self {
        Monomial(BTreeMap::new())
    }

    fn is_one(&self) -> bool {
        self.0.is_empty()
    }
}

impl<Var> Display for Monomial<Var>
where
    Var: Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pairs = self.0.iter();
        let fmt_power = |f: &mut std::fmt::Formatter<'_>, var: &Var, exp: &u32| {
            write!(f, "{var}")?;
            if *exp != 1 {
                write!(f, "^{exp}")?;
            }
            Ok(())
        };
        if let Some((var, exp)) = pairs.next() {
            fmt_power(f, var, exp)?;
        }
        for (var, exp) in pairs {
            write!(f, " ")?;
            fmt_power(f, var, exp)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monomials() {
        let x = Monomial::generator('x');
        let y = Monomial::generator('y');
        assert_eq!(x.to_string(), "x");

        let product = x.clone() * y.clone() * y * x;
        assert_eq!(product.to_string(), "x^2 y^2");
        assert_eq!(product.degree(), 4);
        assert!(!product.is_constant());
        assert!(Monomial::<char>::one().is_constant());
    }

    #[test]
    fn multiset_collection() {
        let from_seq: Monomial<_> = ['y', 'x', 'x'].into_iter().collect();
        let from_mul = Monomial::generator('x') * Monomial::generator('x') * Monomial::generator('y');
        assert_eq!(from_seq, from_mul);
    }
}
