/*! A modeling layer for linear and mixed-integer optimization problems.

Users assemble a [`Problem`](problem::Problem) — an objective polynomial plus
a set of constraints over named decision variables — and submit it to the
HiGHS solver running as a child process. The crate serializes the problem to
the LP text format, drives the solver, parses its solution file, and returns
a well-typed [`SolveOutcome`](solve::SolveOutcome). When a problem turns out
to be infeasible, a concurrent second solver pass can extract an *irreducible
infeasible subsystem* (IIS) naming the conflicting constraints and bounds.

# Organization

The crate is organized into top-level modules following the data flow:

- [`algebra`]: normalized multivariate polynomials, the expression language
  of objectives and constraint left-hand sides.
- [`problem`]: decision variables, constraints, objectives, and validation.
- [`lp`]: the deterministic serializer to the LP text format.
- [`solve`]: the solve orchestrator together with the parsers for the
  solver's solution files and IIS models.

Solving itself is delegated to an external binary; locating or installing
that binary is out of scope beyond the [`Solver`](solve::Solver) handle's
environment lookup.
*/

#![warn(missing_docs)]
#![allow(
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod algebra;
pub mod lp;
pub mod problem;
pub mod solve;
