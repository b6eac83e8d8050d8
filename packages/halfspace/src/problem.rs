//! Optimization problems: decision variables, constraints, and objectives.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Display;

use nonempty::NonEmpty;
use thiserror::Error;
use ustr::Ustr;

use crate::algebra::Polynomial;

/// The mangled identifier of a registered decision variable.
///
/// Mangled identifiers embed a zero-padded per-problem counter, so their
/// string order is creation order, and they are legal LP-format names. The
/// identifier always begins with a letter, which keeps it disjoint from
/// numeric literals in every format the solver reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VariableId(Ustr);

/// The mangled identifier of a registered constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintId(Ustr);

impl VariableId {
    /// The LP-format name of the variable.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl ConstraintId {
    /// The LP-format name of the constraint.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for VariableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for ConstraintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Interned strings compare by pointer; ids must order by their text so that
// serialization is deterministic.
impl Ord for VariableId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_str().cmp(other.0.as_str())
    }
}

impl PartialOrd for VariableId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConstraintId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_str().cmp(other.0.as_str())
    }
}

impl PartialOrd for ConstraintId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Which way the objective drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Drive the objective down.
    Minimize,
    /// Drive the objective up.
    Maximize,
}

/// The type of a decision variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariableType {
    /// A real-valued variable.
    Continuous,
    /// An integer-valued variable.
    Integer,
    /// A 0/1 variable; its bounds are implied by the type.
    Binary,
}

/// The comparison operator of a constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Left-hand side at most the right-hand side.
    LessEq,
    /// Left-hand side at least the right-hand side.
    GreaterEq,
    /// Left-hand side equal to the right-hand side.
    Equal,
}

impl Display for ConstraintOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            ConstraintOp::LessEq => "<=",
            ConstraintOp::GreaterEq => ">=",
            ConstraintOp::Equal => "=",
        };
        write!(f, "{symbol}")
    }
}

/** A decision variable declaration.

Declarations are built with chained setters and registered with
[`Problem::add_variable`], which assigns the mangled identifier:

```
# use halfspace::problem::{Direction, Problem, Variable};
let mut problem = Problem::new(Direction::Maximize);
let x = problem.add_variable(Variable::continuous("x").bounds(0.0, 10.0));
```
 */
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    name: String,
    lower: Option<f64>,
    upper: Option<f64>,
    var_type: VariableType,
}

impl Variable {
    fn new(name: impl Into<String>, var_type: VariableType) -> Self {
        Variable {
            name: name.into(),
            lower: None,
            upper: None,
            var_type,
        }
    }

    /// A continuous variable with the given human name.
    pub fn continuous(name: impl Into<String>) -> Self {
        Self::new(name, VariableType::Continuous)
    }

    /// An integer variable with the given human name.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, VariableType::Integer)
    }

    /// A binary variable with the given human name.
    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, VariableType::Binary)
    }

    /// Sets the lower bound.
    pub fn lower(mut self, bound: f64) -> Self {
        self.lower = Some(bound);
        self
    }

    /// Sets the upper bound.
    pub fn upper(mut self, bound: f64) -> Self {
        self.upper = Some(bound);
        self
    }

    /// Sets both bounds.
    pub fn bounds(self, lower: f64, upper: f64) -> Self {
        self.lower(lower).upper(upper)
    }

    /// The human name of the variable.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lower bound, if any.
    pub fn lower_bound(&self) -> Option<f64> {
        self.lower
    }

    /// The upper bound, if any.
    pub fn upper_bound(&self) -> Option<f64> {
        self.upper
    }

    /// The type of the variable.
    pub fn variable_type(&self) -> VariableType {
        self.var_type
    }
}

/** A constraint: a polynomial compared against a numeric right-hand side.

The left-hand side must have degree at most two for the solver to accept it,
which [`Problem::validate`] checks and serialization enforces.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    name: Option<String>,
    lhs: Polynomial<VariableId>,
    op: ConstraintOp,
    rhs: f64,
}

impl Constraint {
    /// A constraint comparing a polynomial against a right-hand side.
    pub fn new(lhs: impl Into<Polynomial<VariableId>>, op: ConstraintOp, rhs: f64) -> Self {
        Constraint {
            name: None,
            lhs: lhs.into(),
            op,
            rhs,
        }
    }

    /// The constraint `lhs <= rhs`.
    pub fn less_eq(lhs: impl Into<Polynomial<VariableId>>, rhs: f64) -> Self {
        Self::new(lhs, ConstraintOp::LessEq, rhs)
    }

    /// The constraint `lhs >= rhs`.
    pub fn greater_eq(lhs: impl Into<Polynomial<VariableId>>, rhs: f64) -> Self {
        Self::new(lhs, ConstraintOp::GreaterEq, rhs)
    }

    /// The constraint `lhs = rhs`.
    pub fn equal(lhs: impl Into<Polynomial<VariableId>>, rhs: f64) -> Self {
        Self::new(lhs, ConstraintOp::Equal, rhs)
    }

    /// Attaches a human name, which becomes part of the mangled identifier.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The left-hand side polynomial.
    pub fn lhs(&self) -> &Polynomial<VariableId> {
        &self.lhs
    }

    /// The comparison operator.
    pub fn op(&self) -> ConstraintOp {
        self.op
    }

    /// The right-hand side value.
    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    /// The human name, if one was attached.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/** An optimization problem ready to be serialized and solved.

A problem owns its variables and constraints, keyed by mangled identifiers
whose order is creation order, plus one objective polynomial (zero by
default) and an optimization direction.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct Problem {
    direction: Direction,
    variables: BTreeMap<VariableId, Variable>,
    constraints: BTreeMap<ConstraintId, Constraint>,
    objective: Polynomial<VariableId>,
    next_index: usize,
}

impl Problem {
    /// Creates an empty problem with the given direction.
    pub fn new(direction: Direction) -> Self {
        Problem {
            direction,
            variables: BTreeMap::new(),
            constraints: BTreeMap::new(),
            objective: Polynomial::default(),
            next_index: 1,
        }
    }

    fn mangle(&mut self, prefix: char, name: &str) -> Ustr {
        let mut id = format!("{prefix}{:06}", self.next_index);
        self.next_index += 1;
        let suffix: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if !suffix.is_empty() {
            id.push('_');
            id.push_str(&suffix);
        }
        Ustr::from(id.as_str())
    }

    /// Registers a variable under a fresh mangled identifier and returns its
    /// generator polynomial for use in expressions.
    pub fn add_variable(&mut self, variable: Variable) -> Polynomial<VariableId> {
        let id = VariableId(self.mangle('x', &variable.name));
        self.variables.insert(id, variable);
        Polynomial::generator(id)
    }

    /// Registers a constraint under a fresh mangled identifier.
    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstraintId {
        let id = ConstraintId(self.mangle('c', constraint.name.as_deref().unwrap_or("")));
        self.constraints.insert(id, constraint);
        id
    }

    /// Adds to the objective so that solving drives the expression up,
    /// whatever the direction of the problem.
    pub fn maximize(&mut self, poly: impl Into<Polynomial<VariableId>>) {
        match self.direction {
            Direction::Maximize => self.increment_objective(poly),
            Direction::Minimize => self.decrement_objective(poly),
        }
    }

    /// Adds to the objective so that solving drives the expression down.
    pub fn minimize(&mut self, poly: impl Into<Polynomial<VariableId>>) {
        match self.direction {
            Direction::Maximize => self.decrement_objective(poly),
            Direction::Minimize => self.increment_objective(poly),
        }
    }

    /// Adds the expression to the objective as-is.
    pub fn increment_objective(&mut self, poly: impl Into<Polynomial<VariableId>>) {
        self.objective = std::mem::take(&mut self.objective) + poly.into();
    }

    /// Subtracts the expression from the objective as-is.
    pub fn decrement_objective(&mut self, poly: impl Into<Polynomial<VariableId>>) {
        self.objective = std::mem::take(&mut self.objective) - poly.into();
    }

    /// The optimization direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The objective polynomial.
    pub fn objective(&self) -> &Polynomial<VariableId> {
        &self.objective
    }

    /// Iterates over the registered variables in identifier order.
    pub fn variables(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.variables.iter().map(|(id, variable)| (*id, variable))
    }

    /// Iterates over the registered constraints in identifier order.
    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints.iter().map(|(id, constraint)| (*id, constraint))
    }

    /// Looks up a registered variable.
    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(&id)
    }

    /// Looks up a registered constraint.
    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(&id)
    }

    /** Validates the problem.

    A problem is valid when every variable mentioned by the objective or a
    constraint left-hand side is registered and all of those polynomials have
    degree at most two. Returns either `Ok` or a nonempty list of failures.
     */
    pub fn validate(&self) -> Result<(), NonEmpty<InvalidProblem>> {
        match NonEmpty::collect(self.iter_invalid()) {
            Some(errors) => Err(errors),
            None => Ok(()),
        }
    }

    fn iter_invalid(&self) -> impl Iterator<Item = InvalidProblem> {
        let mut errors = Vec::new();
        if self.objective.degree() > 2 {
            errors.push(InvalidProblem::ObjectiveDegree {
                degree: self.objective.degree(),
            });
        }
        for var in self.objective.variables() {
            if !self.variables.contains_key(var) {
                errors.push(InvalidProblem::UnregisteredVariable {
                    var: var.to_string(),
                    location: "the objective".into(),
                });
            }
        }
        for (id, constraint) in &self.constraints {
            if constraint.lhs.degree() > 2 {
                errors.push(InvalidProblem::ConstraintDegree {
                    id: id.to_string(),
                    degree: constraint.lhs.degree(),
                });
            }
            for var in constraint.lhs.variables() {
                if !self.variables.contains_key(var) {
                    errors.push(InvalidProblem::UnregisteredVariable {
                        var: var.to_string(),
                        location: format!("constraint `{id}`"),
                    });
                }
            }
        }
        errors.into_iter()
    }
}

/// A failure of an optimization problem to be well formed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidProblem {
    /// A polynomial mentions a variable the problem never registered.
    #[error("variable `{var}` in {location} is not registered in the problem")]
    UnregisteredVariable {
        /// The unregistered variable.
        var: String,
        /// Where the variable occurs.
        location: String,
    },

    /// The objective has degree above two.
    #[error("objective has degree {degree} but the solver accepts at most 2")]
    ObjectiveDegree {
        /// The offending degree.
        degree: u32,
    },

    /// A constraint left-hand side has degree above two.
    #[error("constraint `{id}` has degree {degree} but the solver accepts at most 2")]
    ConstraintDegree {
        /// The offending constraint.
        id: String,
        /// The offending degree.
        degree: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangled_ids_sort_in_creation_order() {
        let mut problem = Problem::new(Direction::Minimize);
        let x = problem.add_variable(Variable::continuous("price"));
        let y = problem.add_variable(Variable::continuous("amount"));
        let ids: Vec<_> = problem.variables().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, vec!["x000001_price", "x000002_amount"]);

        // The returned polynomials are the generators on the mangled ids.
        assert_eq!(x.variables().next().unwrap().as_str(), "x000001_price");
        assert_eq!(y.variables().next().unwrap().as_str(), "x000002_amount");
    }

    #[test]
    fn name_sanitization() {
        let mut problem = Problem::new(Direction::Minimize);
        problem.add_variable(Variable::continuous("per-unit cost!"));
        let (id, variable) = problem.variables().next().unwrap();
        assert_eq!(id.as_str(), "x000001_perunitcost");
        assert_eq!(variable.name(), "per-unit cost!");

        let id = problem.add_constraint(Constraint::less_eq(0.0, 1.0));
        assert_eq!(id.as_str(), "c000002");
    }

    #[test]
    fn directional_objective_helpers() {
        let mut problem = Problem::new(Direction::Minimize);
        let x = problem.add_variable(Variable::continuous("x"));

        // Maximizing on a minimization problem subtracts.
        problem.maximize(x.clone());
        assert_eq!(*problem.objective(), -x.clone());

        problem.increment_objective(x.clone() * 3.0);
        assert_eq!(*problem.objective(), x * 2.0);
    }

    #[test]
    fn validation_reports_every_failure() {
        let mut registered = Problem::new(Direction::Minimize);
        let x = registered.add_variable(Variable::continuous("x"));
        registered.increment_objective(x.clone());
        registered.add_constraint(Constraint::less_eq(x.clone(), 1.0));
        assert!(registered.validate().is_ok());

        // A foreign variable and a cubic constraint are both reported.
        let mut broken = Problem::new(Direction::Minimize);
        broken.increment_objective(x.clone());
        broken.add_constraint(Constraint::less_eq(x.clone() * x.clone() * x, 1.0));
        let errors = broken.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(
            errors.head,
            InvalidProblem::ObjectiveDegree { .. } | InvalidProblem::UnregisteredVariable { .. }
        ));
    }
}
