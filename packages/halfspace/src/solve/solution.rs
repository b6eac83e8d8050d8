//! Parsing of the solver's solution files.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::algebra::{FreeVariables, Polynomial};
use crate::problem::{ConstraintId, VariableId};

/// How the solver finished, for the solution-bearing outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolutionStatus {
    /// Proven optimum.
    Optimal,
    /// Wall-clock limit hit with a feasible point in hand.
    TimeLimit,
    /// Iteration limit hit with a feasible point in hand.
    IterationLimit,
    /// The bound on the objective was reached.
    ObjectiveBound,
    /// The target for the objective was reached.
    ObjectiveTarget,
    /// The solution-count limit was reached.
    SolutionLimit,
}

/** A solved assignment of the problem's variables.

The maps are keyed by the mangled LP names, the names that round-trip
through the solver; typed lookups go through [`Solution::evaluate`] and
[`Solution::constraint_value`].
 */
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    /// How the solver finished.
    pub status: SolutionStatus,
    /// Whether the assignment is feasible.
    pub feasible: bool,
    /// The objective value.
    pub objective: f64,
    /// Primal variable values keyed by LP name.
    pub variables: BTreeMap<String, f64>,
    /// Constraint activities keyed by LP name.
    pub constraints: BTreeMap<String, f64>,
    /// The relative MIP gap reported by the solver, when present.
    pub mip_gap: Option<f64>,
}

impl Solution {
    /// Evaluates a polynomial under the solved assignment, failing with the
    /// variables the solver reported no value for.
    pub fn evaluate(&self, poly: &Polynomial<VariableId>) -> Result<f64, FreeVariables> {
        let values: BTreeMap<VariableId, f64> = poly
            .variables()
            .filter_map(|var| self.variables.get(var.as_str()).map(|value| (*var, *value)))
            .collect();
        poly.evaluate(&values)
    }

    /// The activity of a constraint, when the solver reported one.
    pub fn constraint_value(&self, id: ConstraintId) -> Option<f64> {
        self.constraints.get(id.as_str()).copied()
    }
}

/// A malformed solution file.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SolutionParseError {
    /// A numeric field failed to parse.
    #[error("expected a number in solution line `{line}`")]
    MalformedNumber {
        /// The offending line.
        line: String,
    },

    /// A `name value` pair line was malformed.
    #[error("expected a `name value` pair in solution line `{line}`")]
    MalformedPair {
        /// The offending line.
        line: String,
    },
}

/// The primal content of a solution file, before status classification.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct PrimalValues {
    pub feasible: bool,
    pub objective: f64,
    pub variables: BTreeMap<String, f64>,
    pub constraints: BTreeMap<String, f64>,
}

/** Parses the primal block of a solution file.

The file is a sequence of labeled blocks; only the primal one is consumed
here and a missing block yields empty mappings. All numbers are parsed as
floating point.
 */
pub(crate) fn parse_primal(content: &str) -> Result<PrimalValues, SolutionParseError> {
    let mut parsed = PrimalValues::default();
    let mut lines = content.lines().map(str::trim);

    while let Some(line) = lines.next() {
        if line != "# Primal solution values" {
            continue;
        }
        if let Some(marker) = lines.next() {
            parsed.feasible = marker == "Feasible";
        }
        while let Some(line) = lines.next() {
            if line.is_empty() {
                continue;
            }
            if line.starts_with("# Dual") || line.starts_with("# Basis") {
                break;
            }
            if let Some(value) = line.strip_prefix("Objective") {
                parsed.objective = parse_number(value.trim(), line)?;
            } else if let Some(count) = line.strip_prefix("# Columns") {
                parse_pairs(&mut lines, parse_count(count, line)?, &mut parsed.variables)?;
            } else if let Some(count) = line.strip_prefix("# Rows") {
                parse_pairs(&mut lines, parse_count(count, line)?, &mut parsed.constraints)?;
            }
        }
        break;
    }
    Ok(parsed)
}

fn parse_number(text: &str, line: &str) -> Result<f64, SolutionParseError> {
    text.parse().map_err(|_| SolutionParseError::MalformedNumber {
        line: line.to_owned(),
    })
}

fn parse_count(text: &str, line: &str) -> Result<usize, SolutionParseError> {
    text.trim().parse().map_err(|_| SolutionParseError::MalformedNumber {
        line: line.to_owned(),
    })
}

fn parse_pairs<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
    count: usize,
    into: &mut BTreeMap<String, f64>,
) -> Result<(), SolutionParseError> {
    for _ in 0..count {
        // A truncated file simply ends the block.
        let Some(line) = lines.next() else {
            break;
        };
        let mut fields = line.split_whitespace();
        let (Some(name), Some(value)) = (fields.next(), fields.next()) else {
            return Err(SolutionParseError::MalformedPair {
                line: line.to_owned(),
            });
        };
        into.insert(name.to_owned(), parse_number(value, line)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Direction, Problem, Variable};

    const SOLUTION_FILE: &str = "\
Model status
Optimal

# Primal solution values
Feasible
Objective 10.5
# Columns 2
x000001_x 10
x000002_y 0.5
# Rows 1
c000003 10.5

# Dual solution values
Feasible
# Columns 2
x000001_x 0
x000002_y 0
# Rows 1
c000003 1

# Basis
HiGHS v1
None
";

    #[test]
    fn parses_the_primal_block() {
        let primal = parse_primal(SOLUTION_FILE).unwrap();
        assert!(primal.feasible);
        assert_eq!(primal.objective, 10.5);
        assert_eq!(primal.variables["x000001_x"], 10.0);
        assert_eq!(primal.variables["x000002_y"], 0.5);
        assert_eq!(primal.constraints["c000003"], 10.5);
        // The dual block is not consumed into the primal values.
        assert_eq!(primal.variables.len(), 2);
        assert_eq!(primal.constraints.len(), 1);
    }

    #[test]
    fn missing_blocks_yield_empty_mappings() {
        let primal = parse_primal("Model status\nOptimal\n").unwrap();
        assert_eq!(primal, PrimalValues::default());

        let primal = parse_primal("# Primal solution values\nInfeasible\n").unwrap();
        assert!(!primal.feasible);
        assert!(primal.variables.is_empty());
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let err = parse_primal("# Primal solution values\nFeasible\nObjective ten\n").unwrap_err();
        assert_eq!(
            err,
            SolutionParseError::MalformedNumber {
                line: "Objective ten".into()
            }
        );
    }

    #[test]
    fn evaluates_polynomials_under_the_assignment() {
        let mut problem = Problem::new(Direction::Maximize);
        let x = problem.add_variable(Variable::continuous("x"));
        let y = problem.add_variable(Variable::continuous("y"));

        let primal = parse_primal(SOLUTION_FILE).unwrap();
        let solution = Solution {
            status: SolutionStatus::Optimal,
            feasible: primal.feasible,
            objective: primal.objective,
            variables: primal.variables,
            constraints: primal.constraints,
            mip_gap: None,
        };
        assert_eq!(solution.evaluate(&(x.clone() + y * 2.0)).unwrap(), 11.0);

        let z = problem.add_variable(Variable::continuous("z"));
        let err = solution.evaluate(&z).unwrap_err();
        assert_eq!(err.missing, vec!["x000003_z".to_string()]);
    }
}
