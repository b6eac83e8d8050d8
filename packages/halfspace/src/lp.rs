//! Serialization of problems to the LP text format the solver consumes.

use itertools::Itertools;
use thiserror::Error;

use crate::algebra::{Monomial, Polynomial};
use crate::problem::{Direction, Problem, VariableId, VariableType};

/// A failure to serialize a problem to LP text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LpWriteError {
    /// The LP format stops at quadratic terms.
    #[error("cannot serialize a polynomial of degree {degree}: the LP format stops at degree 2")]
    DegreeTooHigh {
        /// The offending degree.
        degree: u32,
    },
}

/// Whether a quadratic block belongs to the objective or to a constraint.
///
/// The solver halves the bracketed quadratic block of an *objective*, so its
/// coefficients are doubled on the way out to preserve their meaning; the
/// bracketed block of a constraint is taken at face value and its
/// coefficients are emitted as-is.
#[derive(Clone, Copy, PartialEq, Eq)]
enum QuadraticContext {
    Objective,
    Constraint,
}

/** Serializes a problem to the LP text format.

The output is a pure function of the problem value: equal problems produce
byte-identical text. Constraints and variables appear in identifier order,
every term carries an explicit sign, and quadratic terms are gathered into a
trailing `[ ... ] / 2` block. Binary variables never emit bound lines; the
type declaration fully specifies them.
 */
pub fn write_lp(problem: &Problem) -> Result<String, LpWriteError> {
    let mut out = String::new();
    out.push_str(match problem.direction() {
        Direction::Maximize => "Maximize\n",
        Direction::Minimize => "Minimize\n",
    });
    let objective = render_polynomial(problem.objective(), QuadraticContext::Objective)?;
    if !objective.is_empty() {
        out.push_str("  ");
        out.push_str(&objective);
        out.push('\n');
    }

    out.push_str("Subject To\n");
    for (id, constraint) in problem.constraints() {
        let lhs = render_polynomial(constraint.lhs(), QuadraticContext::Constraint)?;
        let op = constraint.op();
        let rhs = constraint.rhs();
        out.push_str(&format!("  {id}: {lhs} {op} {rhs}\n"));
    }

    out.push_str("Bounds\n");
    for (id, variable) in problem.variables() {
        if variable.variable_type() == VariableType::Binary {
            continue;
        }
        match (variable.lower_bound(), variable.upper_bound()) {
            (None, None) => out.push_str(&format!("  {id} free\n")),
            (None, Some(upper)) => out.push_str(&format!("  {id} <= {upper}\n")),
            (Some(lower), None) => out.push_str(&format!("  {lower} <= {id}\n")),
            (Some(lower), Some(upper)) => {
                out.push_str(&format!("  {lower} <= {id}\n"));
                out.push_str(&format!("  {id} <= {upper}\n"));
            }
        }
    }

    for (section, var_type) in [("General", VariableType::Integer), ("Binary", VariableType::Binary)] {
        let names: Vec<_> = problem
            .variables()
            .filter(|(_, variable)| variable.variable_type() == var_type)
            .map(|(id, _)| id)
            .collect();
        if !names.is_empty() {
            out.push_str(section);
            out.push('\n');
            for id in names {
                out.push_str(&format!("  {id}\n"));
            }
        }
    }

    out.push_str("End\n");
    Ok(out)
}

/// Renders a polynomial as LP text, partitioned into a signed linear part
/// and a bracketed quadratic block.
fn render_polynomial(
    poly: &Polynomial<VariableId>,
    context: QuadraticContext,
) -> Result<String, LpWriteError> {
    let mut linear = Vec::new();
    let mut quadratic = Vec::new();
    for (monomial, coef) in poly.terms() {
        match monomial.degree() {
            0 | 1 => linear.push(signed_term(coef, monomial)),
            2 => {
                let coef = match context {
                    QuadraticContext::Objective => 2.0 * coef,
                    QuadraticContext::Constraint => coef,
                };
                quadratic.push(signed_term(coef, monomial));
            }
            degree => return Err(LpWriteError::DegreeTooHigh { degree }),
        }
    }
    let mut rendered = linear.join(" ");
    if !quadratic.is_empty() {
        if !rendered.is_empty() {
            rendered.push(' ');
        }
        rendered.push_str(&format!("+ [ {} ] / 2", quadratic.join(" ")));
    }
    Ok(rendered)
}

/// Renders one term with an explicit sign and absolute coefficient.
fn signed_term(coef: f64, monomial: &Monomial<VariableId>) -> String {
    let sign = if coef < 0.0 { '-' } else { '+' };
    let magnitude = coef.abs();
    if monomial.is_constant() {
        format!("{sign} {magnitude}")
    } else {
        format!("{sign} {magnitude} {}", render_monomial(monomial))
    }
}

/// Renders a monomial with `*` between distinct variables and `^` powers.
fn render_monomial(monomial: &Monomial<VariableId>) -> String {
    monomial
        .powers()
        .map(|(var, exp)| {
            if exp == 1 {
                var.to_string()
            } else {
                format!("{var}^{exp}")
            }
        })
        .join(" * ")
}
