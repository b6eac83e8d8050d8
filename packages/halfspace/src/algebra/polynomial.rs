//! Polynomials in several variables, kept in normal form.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

use derivative::Derivative;
use num_traits::{One, Zero};
use thiserror::Error;

use super::monomial::Monomial;

/** A polynomial in several variables.

A polynomial is a finite mapping from [monomial](Monomial) to nonzero
coefficient. The mapping is kept in *normal form*: no zero coefficient is
ever stored and each monomial key appears at most once, so structural
equality of the maps is semantic equality of the polynomials.

Polynomials are immutable values. Every arithmetic operation consumes or
borrows its operands and returns a new normalized polynomial; the operator
overloads on this type are the expression surface used to build objectives
and constraint left-hand sides.
 */
#[derive(Clone, Debug, PartialEq, Derivative)]
#[derivative(Default(bound = ""))]
pub struct Polynomial<Var>(BTreeMap<Monomial<Var>, f64>);

/// Error: dividing a polynomial by a divisor that is not a constant.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("cannot divide by the non-constant polynomial `{divisor}`")]
pub struct NonConstantDivisor {
    /// Rendering of the offending divisor.
    pub divisor: String,
}

/// Error: evaluating a polynomial under an incomplete assignment.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("evaluation left free variables: {}", .missing.join(", "))]
pub struct FreeVariables {
    /// The variables with no binding, in sorted order.
    pub missing: Vec<String>,
}

impl<Var> Polynomial<Var>
where
    Var: Ord,
{
    /// The constant polynomial, which is the zero polynomial when `c` is 0.
    pub fn constant(c: f64) -> Self {
        let mut poly = Self::default();
        poly += (c, Monomial::default());
        poly
    }

    /// Generating polynomial on a single variable.
    pub fn generator(var: Var) -> Self {
        Self::from_monomial(Monomial::generator(var))
    }

    /// The polynomial with a single unit-coefficient term.
    pub fn from_monomial(m: Monomial<Var>) -> Self {
        Polynomial([(m, 1.0)].into_iter().collect())
    }

    /// Iterates over the terms as monomial-coefficient pairs, in key order.
    pub fn terms(&self) -> impl ExactSizeIterator<Item = (&Monomial<Var>, f64)> {
        self.0.iter().map(|(m, coef)| (m, *coef))
    }

    /// The number of stored terms.
    pub fn num_terms(&self) -> usize {
        self.0.len()
    }

    /// Total degree: the maximum degree of any monomial, 0 for the zero
    /// polynomial.
    pub fn degree(&self) -> u32 {
        self.0.keys().map(Monomial::degree).max().unwrap_or(0)
    }

    /// Is the polynomial a constant (degree 0)?
    pub fn is_constant(&self) -> bool {
        self.degree() == 0
    }

    /// The coefficient on the empty monomial, 0 when absent.
    pub fn constant_term(&self) -> f64 {
        self.0.get(&Monomial::default()).copied().unwrap_or(0.0)
    }

    /// The value of a constant polynomial, or `None` if any variable occurs.
    pub fn as_constant(&self) -> Option<f64> {
        self.is_constant().then(|| self.constant_term())
    }

    /// Sorted deduplicated variables occurring anywhere in the polynomial.
    pub fn variables(&self) -> impl Iterator<Item = &Var> {
        self.0
            .keys()
            .flat_map(Monomial::variables)
            .collect::<BTreeSet<_>>()
            .into_iter()
    }

    /** Sums a sequence of polynomials (or anything coercible to one).

    This is the bulk construction primitive: every input term is merged into
    a single accumulating map exactly once, so summing is linear in the total
    number of terms across the inputs rather than quadratic as repeatedly
    materializing intermediate polynomials would be. The result is equal to
    the left fold of [`Add`] over the same sequence.
     */
    pub fn sum<I>(terms: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Self>,
    {
        let mut acc = Self::default();
        for term in terms {
            acc += term.into();
        }
        acc
    }

    /// Raises the polynomial to a nonnegative integer power.
    pub fn pow(&self, k: u32) -> Self
    where
        Var: Clone,
    {
        let mut result = Self::one();
        for _ in 0..k {
            result = result * self.clone();
        }
        result
    }

    /** Substitutes polynomials for variables.

    Every variable with an image in the map is replaced by that image inside
    each monomial; variables without an image stay themselves. Per monomial,
    the substituted factors are multiplied together with the original
    coefficient, and the resulting products are summed.
     */
    pub fn substitute(&self, images: &BTreeMap<Var, Polynomial<Var>>) -> Self
    where
        Var: Clone,
    {
        Self::sum(self.0.iter().map(|(m, coef)| {
            let mut product = Self::constant(*coef);
            for (var, exp) in m.powers() {
                let factor = match images.get(var) {
                    Some(image) => image.clone(),
                    None => Self::generator(var.clone()),
                };
                product = product * factor.pow(exp);
            }
            product
        }))
    }

    /// Evaluates the polynomial under a complete assignment, failing with
    /// the list of free variables when the assignment is incomplete.
    pub fn evaluate(&self, values: &BTreeMap<Var, f64>) -> Result<f64, FreeVariables>
    where
        Var: Display,
    {
        let missing: Vec<String> = self
            .variables()
            .filter(|var| !values.contains_key(var))
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(FreeVariables { missing });
        }
        Ok(self
            .0
            .iter()
            .map(|(m, coef)| {
                coef * m
                    .powers()
                    .map(|(var, exp)| values[var].powi(exp as i32))
                    .product::<f64>()
            })
            .sum())
    }

    /// Divides by a divisor that must be a constant, failing otherwise.
    pub fn checked_div(&self, divisor: &Self) -> Result<Self, NonConstantDivisor>
    where
        Var: Clone + Display,
    {
        match divisor.as_constant() {
            Some(c) => Ok(self.clone() / c),
            None => Err(NonConstantDivisor {
                divisor: divisor.to_string(),
            }),
        }
    }
}

/// Adds a single term, combining like monomials and pruning zeros.
impl<Var> AddAssign<(f64, Monomial<Var>)> for Polynomial<Var>
where
    Var: Ord,
{
    fn add_assign(&mut self, (coef, m): (f64, Monomial<Var>)) {
        if coef == 0.0 {
            return;
        }
        match self.0.entry(m) {
            Entry::Occupied(mut entry) => {
                let total = *entry.get() + coef;
                if total == 0.0 {
                    entry.remove();
                } else {
                    *entry.get_mut() = total;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(coef);
            }
        }
    }
}

impl<Var> AddAssign for Polynomial<Var>
where
    Var: Ord,
{
    fn add_assign(&mut self, rhs: Self) {
        for (m, coef) in rhs.0 {
            *self += (coef, m);
        }
    }
}

impl<Var> Add for Polynomial<Var>
where
    Var: Ord,
{
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl<Var> Add<f64> for Polynomial<Var>
where
    Var: Ord,
{
    type Output = Self;

    fn add(mut self, rhs: f64) -> Self {
        self += (rhs, Monomial::default());
        self
    }
}

impl<Var> Neg for Polynomial<Var>
where
    Var: Ord,
{
    type Output = Self;

    fn neg(self) -> Self {
        Polynomial(self.0.into_iter().map(|(m, coef)| (m, -coef)).collect())
    }
}

impl<Var> Sub for Polynomial<Var>
where
    Var: Ord,
{
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + rhs.neg()
    }
}

impl<Var> Sub<f64> for Polynomial<Var>
where
    Var: Ord,
{
    type Output = Self;

    fn sub(self, rhs: f64) -> Self {
        self + (-rhs)
    }
}

/// Multiplies polynomials using the distributive law.
impl<Var> Mul for Polynomial<Var>
where
    Var: Clone + Ord,
{
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut result = Self::default();
        for (m, a) in &self.0 {
            for (n, b) in &rhs.0 {
                result += (a * b, m.clone() * n.clone());
            }
        }
        result
    }
}

/// Scales every coefficient; scaling by 0 collapses to the zero polynomial.
impl<Var> Mul<f64> for Polynomial<Var>
where
    Var: Ord,
{
    type Output = Self;

    fn mul(self, scalar: f64) -> Self {
        if scalar == 0.0 {
            return Self::default();
        }
        Polynomial(self.0.into_iter().map(|(m, coef)| (m, coef * scalar)).collect())
    }
}

/// Divides every coefficient by a scalar, multiplying by its reciprocal.
impl<Var> Div<f64> for Polynomial<Var>
where
    Var: Ord,
{
    type Output = Self;

    fn div(self, scalar: f64) -> Self {
        self * (1.0 / scalar)
    }
}

impl<Var> From<f64> for Polynomial<Var>
where
    Var: Ord,
{
    fn from(c: f64) -> Self {
        Self::constant(c)
    }
}

impl<Var> From<Monomial<Var>> for Polynomial<Var>
where
    Var: Ord,
{
    fn from(m: Monomial<Var>) -> Self {
        Self::from_monomial(m)
    }
}

impl<Var> FromIterator<(f64, Monomial<Var>)> for Polynomial<Var>
where
    Var: Ord,
{
    fn from_iter<T: IntoIterator<Item = (f64, Monomial<Var>)>>(iter: T) -> Self {
        let mut poly = Self::default();
        for (coef, m) in iter {
            poly += (coef, m);
        }
        poly
    }
}

impl<Var> std::iter::Sum for Polynomial<Var>
where
    Var: Ord,
{
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Polynomial::sum(iter)
    }
}

impl<Var> Zero for Polynomial<Var>
where
    Var: Ord,
{
    fn zero() -> Self {
        Self::default()
    }

    fn is_zero(&self) -> bool {
        self.0.is_empty()
    }
}

impl<Var> One for Polynomial<Var>
where
    Var: Clone + Ord,
{
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl<Var> Display for Polynomial<Var>
where
    Var: Display + Ord,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "0");
        }
        for (i, (m, coef)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            if m.is_constant() {
                write!(f, "{coef}")?;
            } else if *coef == 1.0 {
                write!(f, "{m}")?;
            } else {
                write!(f, "{coef} {m}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    type Poly = Polynomial<char>;

    fn x() -> Poly {
        Poly::generator('x')
    }

    fn y() -> Poly {
        Poly::generator('y')
    }

    #[test]
    fn construction_and_degree() {
        assert_eq!(Poly::constant(0.0), Poly::default());
        assert_eq!(Poly::constant(0.0).degree(), 0);
        assert_eq!(x().degree(), 1);
        assert_eq!((x() * y() + x()).degree(), 2);
        assert_eq!((x() + y()).to_string(), "x + y");
        assert_eq!((x() * 2.0 - y()).to_string(), "2 x + -1 y");
    }

    #[test]
    fn constant_queries() {
        assert_eq!(Poly::constant(3.5).as_constant(), Some(3.5));
        assert_eq!(Poly::default().as_constant(), Some(0.0));
        assert_eq!(x().as_constant(), None);
        assert_eq!((x() + 2.0).constant_term(), 2.0);
    }

    #[test]
    fn scaling_and_division() {
        assert_eq!(x() * 0.0, Poly::default());
        assert_eq!((x() * 3.0) / 2.0, x() * 1.5);
        assert_eq!((x() * 6.0).checked_div(&Poly::constant(2.0)).unwrap(), x() * 3.0);

        let err = x().checked_div(&(y() + 1.0)).unwrap_err();
        assert_eq!(err.divisor, "1 + y");
    }

    #[test]
    fn powers() {
        assert_eq!(x().pow(0), Poly::constant(1.0));
        assert_eq!(x().pow(3), x() * x() * x());
        let square = (x() + y()).pow(2);
        assert_eq!(square, x() * x() + x() * y() * 2.0 + y() * y());
    }

    #[test]
    fn substitution() {
        // x^2 with x := y + 1 becomes (y + 1)^2.
        let images = BTreeMap::from([('x', y() + 1.0)]);
        let substituted = (x() * x()).substitute(&images);
        assert_eq!(substituted, y() * y() + y() * 2.0 + 1.0);

        // Numbers substitute as constants; unmapped variables stay themselves.
        let images = BTreeMap::from([('x', Poly::constant(3.0))]);
        assert_eq!((x() * y() * 2.0).substitute(&images), y() * 6.0);
    }

    #[test]
    fn evaluation() {
        let poly = x() * y() * 2.0 + x() + 5.0;
        let values = BTreeMap::from([('x', 2.0), ('y', 3.0)]);
        assert_eq!(poly.evaluate(&values), Ok(19.0));

        let err = poly.evaluate(&BTreeMap::from([('x', 2.0)])).unwrap_err();
        assert_eq!(err.missing, vec!["y".to_string()]);
    }

    #[test]
    fn bulk_sum_edge_cases() {
        assert_eq!(Poly::sum(Vec::<Poly>::new()), Poly::default());
        assert_eq!(Poly::sum([x()]), x());
        assert_eq!(Poly::sum([3.0, -1.5, -1.5]), Poly::default());

        // Cancellation yields the zero polynomial, not a zero-coefficient term.
        let cancelled = Poly::sum([x() * 3.0, x() * -3.0]);
        assert!(cancelled.is_zero());
        assert_eq!(cancelled.as_constant(), Some(0.0));
    }

    #[test]
    fn bulk_sum_throughput() {
        let names: Vec<_> = (0..1000).map(|i| ustr::ustr(&format!("v{i:04}"))).collect();
        let start = std::time::Instant::now();
        let total = Polynomial::sum(
            (0..42_000).map(|i| Polynomial::generator(names[i % 1000]) * ((i % 7) as f64 + 1.0)),
        );
        let elapsed = start.elapsed();
        assert_eq!(total.num_terms(), 1000);
        assert!(elapsed < std::time::Duration::from_secs(1), "bulk sum took {elapsed:?}");
    }

    fn arb_coef() -> impl Strategy<Value = f64> {
        // Small integral coefficients keep f64 arithmetic exact, so the
        // algebraic laws hold on the nose.
        (-5i32..=5).prop_map(f64::from)
    }

    fn arb_monomial() -> impl Strategy<Value = Monomial<char>> {
        prop::collection::vec(prop::sample::select(vec!['a', 'b', 'c', 'd']), 0..3)
            .prop_map(Monomial::from_iter)
    }

    fn arb_poly() -> impl Strategy<Value = Poly> {
        prop::collection::vec((arb_coef(), arb_monomial()), 0..5)
            .prop_map(|terms| terms.into_iter().collect())
    }

    proptest! {
        #[test]
        fn addition_commutes(p in arb_poly(), q in arb_poly()) {
            prop_assert_eq!(p.clone() + q.clone(), q + p);
        }

        #[test]
        fn addition_associates(p in arb_poly(), q in arb_poly(), r in arb_poly()) {
            prop_assert_eq!(p.clone() + (q.clone() + r.clone()), (p + q) + r);
        }

        #[test]
        fn zero_is_additive_identity(p in arb_poly()) {
            prop_assert_eq!(p.clone() + Poly::constant(0.0), p.clone());
            prop_assert_eq!(p.clone() + 0.0, p);
        }

        #[test]
        fn multiplication_commutes(p in arb_poly(), q in arb_poly()) {
            prop_assert_eq!(p.clone() * q.clone(), q * p);
        }

        #[test]
        fn multiplication_associates(p in arb_poly(), q in arb_poly(), r in arb_poly()) {
            prop_assert_eq!(p.clone() * (q.clone() * r.clone()), (p * q) * r);
        }

        #[test]
        fn one_is_multiplicative_identity(p in arb_poly()) {
            prop_assert_eq!(p.clone() * Poly::constant(1.0), p.clone());
            prop_assert_eq!(p.clone() * 1.0, p);
        }

        #[test]
        fn multiplication_distributes(p in arb_poly(), q in arb_poly(), s in arb_poly()) {
            prop_assert_eq!(
                q.clone() * (p.clone() + s.clone()),
                q.clone() * p + q * s
            );
        }

        #[test]
        fn bulk_sum_agrees_with_fold(polys in prop::collection::vec(arb_poly(), 0..8)) {
            let folded = polys.clone().into_iter().fold(Poly::default(), Add::add);
            prop_assert_eq!(Poly::sum(polys), folded);
        }
    }
}
