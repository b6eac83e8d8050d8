//! End-to-end scenarios against a real solver binary.
//!
//! These tests drive an installed HiGHS binary (set `HALFSPACE_SOLVER` or
//! put `highs` on the search path) and are ignored by default; run them with
//! `cargo test -- --ignored`.

use halfspace::problem::{Constraint, Direction, Problem, Variable};
use halfspace::solve::{SolveOutcome, Solver, SolverOptions};

#[tokio::test]
#[ignore = "requires a HiGHS binary"]
async fn contradictory_bounds_are_infeasible_with_an_iis() {
    let mut problem = Problem::new(Direction::Minimize);
    let x = problem.add_variable(Variable::continuous("x"));
    problem.add_constraint(Constraint::greater_eq(x.clone(), 10.0));
    problem.add_constraint(Constraint::less_eq(x.clone(), 5.0));
    problem.minimize(x);

    let options = SolverOptions::new().compute_iis(true).time_limit(60.0);
    let outcome = Solver::from_env().solve(&problem, &options).await;
    let SolveOutcome::Infeasible { iis: Some(iis), .. } = outcome else {
        panic!("expected infeasibility with an IIS, got {outcome:?}");
    };
    assert!(iis.constraints.len() >= 2, "conflict should name both constraints: {iis:?}");
    assert!(!iis.variables.is_empty(), "conflict should involve the variable: {iis:?}");
}

#[tokio::test]
#[ignore = "requires a HiGHS binary"]
async fn maximizing_without_an_upper_bound_is_unbounded() {
    let mut problem = Problem::new(Direction::Maximize);
    let x = problem.add_variable(Variable::continuous("x").lower(0.0));
    problem.maximize(x);

    let outcome = Solver::from_env().solve(&problem, &SolverOptions::new()).await;
    assert!(matches!(outcome, SolveOutcome::Unbounded { .. }), "got {outcome:?}");
}

#[tokio::test]
#[ignore = "requires a HiGHS binary"]
async fn a_bounded_maximum_is_attained() {
    let mut problem = Problem::new(Direction::Maximize);
    let x = problem.add_variable(Variable::continuous("x").bounds(0.0, 10.0));
    problem.add_constraint(Constraint::less_eq(x.clone(), 10.0));
    problem.maximize(x.clone());

    let outcome = Solver::from_env().solve(&problem, &SolverOptions::new()).await;
    let SolveOutcome::Optimal(solution) = outcome else {
        panic!("expected an optimum, got {outcome:?}");
    };
    assert_eq!(solution.objective, 10.0);
    assert_eq!(solution.evaluate(&x).unwrap(), 10.0);
}

#[tokio::test]
#[ignore = "requires a HiGHS binary"]
async fn joint_capacity_conflicts_are_diagnosed() {
    let mut problem = Problem::new(Direction::Minimize);
    let x = problem.add_variable(Variable::continuous("x"));
    let y = problem.add_variable(Variable::continuous("y"));
    problem.add_constraint(Constraint::greater_eq(x.clone() + y.clone(), 20.0));
    problem.add_constraint(Constraint::less_eq(x.clone(), 5.0));
    problem.add_constraint(Constraint::less_eq(y.clone(), 10.0));
    problem.minimize(x + y);

    let options = SolverOptions::new().compute_iis(true).time_limit(60.0);
    let outcome = Solver::from_env().solve(&problem, &options).await;
    let SolveOutcome::Infeasible { iis: Some(iis), .. } = outcome else {
        panic!("expected infeasibility with an IIS, got {outcome:?}");
    };
    // Three user constraints plus the objective row of the emitted model.
    assert_eq!(iis.constraints.len(), 4, "{iis:?}");
    assert_eq!(iis.variables.len(), 2, "{iis:?}");
}

#[tokio::test]
#[ignore = "requires a HiGHS binary"]
async fn allocation_puts_everything_in_the_center() {
    let mut problem = Problem::new(Direction::Maximize);
    let left = problem.add_variable(Variable::continuous("left").lower(0.0));
    let center = problem.add_variable(Variable::continuous("center").lower(0.0));
    let right = problem.add_variable(Variable::continuous("right").lower(0.0));
    problem.add_constraint(Constraint::equal(
        left.clone() + center.clone() + right.clone(),
        300.0,
    ));
    problem.maximize(center.clone() - left - right);

    let outcome = Solver::from_env().solve(&problem, &SolverOptions::new()).await;
    let SolveOutcome::Optimal(solution) = outcome else {
        panic!("expected an optimum, got {outcome:?}");
    };
    assert_eq!(solution.objective, 300.0);
    assert_eq!(solution.evaluate(&center).unwrap(), 300.0);
}

#[tokio::test]
#[ignore = "requires a HiGHS binary"]
async fn integer_infeasibility_is_detected() {
    let mut problem = Problem::new(Direction::Maximize);
    let x = problem.add_variable(Variable::integer("x").bounds(0.0, 10.0));
    let y = problem.add_variable(Variable::integer("y").bounds(0.0, 10.0));
    problem.add_constraint(Constraint::greater_eq(x.clone() + y.clone(), 25.0));
    problem.maximize(x + y);

    let outcome = Solver::from_env().solve(&problem, &SolverOptions::new()).await;
    assert!(matches!(outcome, SolveOutcome::Infeasible { .. }), "got {outcome:?}");
}
