/*! Driving the external solver.

A [`Solver`] stages the LP model in a private temp directory, runs the HiGHS
binary as a child process, and classifies what came back into a
[`SolveOutcome`]. When an IIS is requested, a second solver pass runs
concurrently with the main one and is awaited only if the problem turns out
to be infeasible; on every other path it is killed and its artifacts are
discarded along with the temp directory.
*/

pub mod iis;
pub mod solution;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

pub use self::iis::Iis;
pub use self::solution::{Solution, SolutionStatus};

use crate::lp::{self, LpWriteError};
use crate::problem::Problem;
use self::solution::parse_primal;

/// Environment variable consulted by [`Solver::from_env`] for the solver
/// binary path.
pub const SOLVER_ENV_VAR: &str = "HALFSPACE_SOLVER";

/** Options for a solve call.

Built with chained setters; the default requests a plain solve with no
limits and no IIS pass.
 */
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolverOptions {
    time_limit: Option<f64>,
    compute_iis: bool,
    mip_rel_gap: Option<f64>,
    mip_max_stall_nodes: Option<i64>,
    log_to_console: Option<bool>,
}

impl SolverOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wall-clock limit in seconds for the solver. The same limit bounds the
    /// wait for the IIS pass on an infeasible result.
    pub fn time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    /// Requests an irreducible infeasible subsystem when the problem turns
    /// out to be infeasible.
    pub fn compute_iis(mut self, enabled: bool) -> Self {
        self.compute_iis = enabled;
        self
    }

    /// Relative MIP gap at which the solver may declare optimality.
    pub fn mip_rel_gap(mut self, gap: f64) -> Self {
        self.mip_rel_gap = Some(gap);
        self
    }

    /// Node-stall limit for the MIP search.
    pub fn mip_max_stall_nodes(mut self, nodes: i64) -> Self {
        self.mip_max_stall_nodes = Some(nodes);
        self
    }

    /// Forwards solver logging to the console.
    pub fn log_to_console(mut self, enabled: bool) -> Self {
        self.log_to_console = Some(enabled);
        self
    }

    /// The contents of the options file for the main pass, `None` when no
    /// file-only option is set.
    fn file_options(&self) -> Option<String> {
        let mut lines = Vec::new();
        if let Some(gap) = self.mip_rel_gap {
            lines.push(format!("mip_rel_gap = {gap}"));
        }
        if let Some(log) = self.log_to_console {
            lines.push(format!("log_to_console = {log}"));
        }
        if let Some(nodes) = self.mip_max_stall_nodes {
            lines.push(format!("mip_max_stall_nodes = {nodes}"));
        }
        if lines.is_empty() { None } else { Some(lines.join("\n") + "\n") }
    }
}

/// The result of a solve call.
#[derive(Debug)]
pub enum SolveOutcome {
    /// Proven optimum.
    Optimal(Solution),
    /// Feasible point in hand when the wall-clock limit hit.
    TimeLimit(Solution),
    /// Feasible point in hand when the iteration limit hit.
    IterationLimit(Solution),
    /// The bound on the objective was reached.
    ObjectiveBound(Solution),
    /// The target for the objective was reached.
    ObjectiveTarget(Solution),
    /// The solution-count limit was reached.
    SolutionLimit(Solution),
    /// No feasible point exists.
    Infeasible {
        /// The solver's merged standard output and error.
        output: String,
        /// The conflict diagnostic, when requested and computed in time.
        iis: Option<Iis>,
    },
    /// The problem admits an unboundedly improving direction.
    Unbounded {
        /// The solver's merged standard output and error.
        output: String,
    },
    /// The solver failed to produce an interpretable artifact.
    Error(SolverFailure),
}

impl SolveOutcome {
    /// The solution payload of the feasible, solution-bearing outcomes.
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            SolveOutcome::Optimal(solution)
            | SolveOutcome::TimeLimit(solution)
            | SolveOutcome::IterationLimit(solution)
            | SolveOutcome::ObjectiveBound(solution)
            | SolveOutcome::ObjectiveTarget(solution)
            | SolveOutcome::SolutionLimit(solution) => Some(solution),
            _ => None,
        }
    }

    /// Converts to a `Result`, turning infeasibility, unboundedness, and
    /// solver failures into typed errors carrying the same payloads.
    pub fn into_result(self) -> Result<Solution, SolveError> {
        match self {
            SolveOutcome::Optimal(solution)
            | SolveOutcome::TimeLimit(solution)
            | SolveOutcome::IterationLimit(solution)
            | SolveOutcome::ObjectiveBound(solution)
            | SolveOutcome::ObjectiveTarget(solution)
            | SolveOutcome::SolutionLimit(solution) => Ok(solution),
            SolveOutcome::Infeasible { output, iis } => {
                Err(SolveError::Infeasible { output, iis })
            }
            SolveOutcome::Unbounded { output } => Err(SolveError::Unbounded { output }),
            SolveOutcome::Error(failure) => Err(SolveError::Failure(failure)),
        }
    }
}

/// A failure of the solve pipeline to produce an interpretable artifact.
#[derive(Debug, Error)]
pub enum SolverFailure {
    /// The model could not be serialized.
    #[error(transparent)]
    Model(#[from] LpWriteError),

    /// An I/O failure while staging files or spawning the solver.
    #[error("i/o failure while driving the solver: {0}")]
    Io(#[from] std::io::Error),

    /// The solver exited with a code other than 0 or 1.
    #[error("solver exited with code {code:?}")]
    SolverError {
        /// The exit code, when the process was not killed by a signal.
        code: Option<i32>,
        /// The solver's merged standard output and error.
        output: String,
        /// The LP text that was fed to the solver.
        model: String,
    },

    /// The solver ran to completion but wrote no readable solution file.
    #[error("solver produced no readable solution file")]
    NoSolution {
        /// The solver's merged standard output and error.
        output: String,
        /// The LP text that was fed to the solver.
        model: String,
    },

    /// The solution file was present but malformed.
    #[error("could not parse the solution file: {reason}")]
    ParseError {
        /// What failed to parse.
        reason: String,
        /// The raw solution file content.
        raw: String,
        /// The solver's merged standard output and error.
        output: String,
    },

    /// Neither the solution file nor the output disclosed a model status.
    #[error("could not determine the model status")]
    UnknownStatus {
        /// The raw solution file content.
        raw: String,
        /// The solver's merged standard output and error.
        output: String,
    },
}

/// The raising form of a [`SolveOutcome`].
#[derive(Debug, Error)]
pub enum SolveError {
    /// No feasible point exists.
    #[error("the problem is infeasible")]
    Infeasible {
        /// The solver's merged standard output and error.
        output: String,
        /// The conflict diagnostic, when requested and computed in time.
        iis: Option<Iis>,
    },

    /// The problem admits an unboundedly improving direction.
    #[error("the problem is unbounded")]
    Unbounded {
        /// The solver's merged standard output and error.
        output: String,
    },

    /// The solver failed to produce an interpretable artifact.
    #[error(transparent)]
    Failure(#[from] SolverFailure),
}

/** Handle to an installed solver binary with a HiGHS-compatible CLI.

The binary location is an injected dependency; nothing else about the
solver is global state.
 */
#[derive(Clone, Debug)]
pub struct Solver {
    binary: PathBuf,
}

impl Solver {
    /// A solver driving the given binary.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Solver {
            binary: binary.into(),
        }
    }

    /// A solver driving the binary named by the `HALFSPACE_SOLVER`
    /// environment variable, falling back to `highs` on the search path.
    pub fn from_env() -> Self {
        let binary = std::env::var_os(SOLVER_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("highs"));
        Solver::new(binary)
    }

    /** Solves the problem.

    The model is serialized into a private temp directory, the solver runs as
    a child process, and its artifacts are interpreted into a
    [`SolveOutcome`]. With [`SolverOptions::compute_iis`], a second solver
    pass runs concurrently against the same model file but with disjoint
    output artifacts; it is awaited (up to the time limit) only when the main
    pass reports infeasibility and is killed otherwise. All temp files are
    deleted on every exit path.
     */
    pub async fn solve(&self, problem: &Problem, options: &SolverOptions) -> SolveOutcome {
        match self.solve_inner(problem, options).await {
            Ok(outcome) => outcome,
            Err(failure) => SolveOutcome::Error(failure),
        }
    }

    /// Blocking facade over [`Solver::solve`] for synchronous callers.
    pub fn solve_blocking(&self, problem: &Problem, options: &SolverOptions) -> SolveOutcome {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build();
        match runtime {
            Ok(runtime) => runtime.block_on(self.solve(problem, options)),
            Err(err) => SolveOutcome::Error(err.into()),
        }
    }

    async fn solve_inner(
        &self,
        problem: &Problem,
        options: &SolverOptions,
    ) -> Result<SolveOutcome, SolverFailure> {
        let model = lp::write_lp(problem)?;

        let dir = tempfile::Builder::new().prefix("halfspace-").tempdir()?;
        let model_path = dir.path().join("model.lp");
        let solution_path = dir.path().join("solution.lp");
        let options_path = dir.path().join("options.txt");
        tokio::fs::write(&model_path, &model).await?;
        debug!(dir = %dir.path().display(), "staged model for solve");

        // Spawned after the model write so both children read a stable
        // input, and before the main invocation so the passes overlap.
        let iis_pass = if options.compute_iis {
            Some(IisPass::spawn(&self.binary, dir.path(), &model_path, options.time_limit).await?)
        } else {
            None
        };

        let mut command = Command::new(&self.binary);
        command
            .arg(&model_path)
            .arg("--solution_file")
            .arg(&solution_path);
        if let Some(seconds) = options.time_limit {
            command.arg("--time_limit").arg(seconds.to_string());
        }
        if let Some(contents) = options.file_options() {
            tokio::fs::write(&options_path, contents).await?;
            command.arg("--options_file").arg(&options_path);
        }
        let output = command
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;
        debug!(status = %output.status, "main solver pass finished");

        let merged = merge_output(&output.stdout, &output.stderr);
        let raw_solution = tokio::fs::read_to_string(&solution_path).await.ok();
        let outcome = interpret(output.status.code(), &merged, raw_solution, &model);

        let outcome = match outcome {
            SolveOutcome::Infeasible { output, iis: _ } => {
                let iis = match iis_pass {
                    Some(pass) => pass.wait(options.time_limit).await,
                    None => None,
                };
                SolveOutcome::Infeasible { output, iis }
            }
            other => {
                if let Some(pass) = iis_pass {
                    pass.discard();
                }
                other
            }
        };
        // `dir` drops here, deleting every artifact of both passes.
        Ok(outcome)
    }
}

/// The concurrently running IIS pass and the artifact it will produce.
struct IisPass {
    handle: JoinHandle<()>,
    iis_path: PathBuf,
}

impl IisPass {
    /// Writes the pass's own options file and starts the solver child.
    ///
    /// The pass shares nothing with the main solve except the model file:
    /// separate options and output artifacts keep a buggy solver from
    /// cross-contaminating the primary pass.
    async fn spawn(
        binary: &Path,
        dir: &Path,
        model_path: &Path,
        time_limit: Option<f64>,
    ) -> std::io::Result<Self> {
        let options_path = dir.join("iis_options.txt");
        let iis_path = dir.join("iis.lp");
        let contents = format!(
            "write_iis_model_file = {}\niis_strategy = 2\npresolve = off\n",
            iis_path.display()
        );
        tokio::fs::write(&options_path, contents).await?;

        let mut command = Command::new(binary);
        command.arg(model_path).arg("--options_file").arg(&options_path);
        if let Some(seconds) = time_limit {
            command.arg("--time_limit").arg(seconds.to_string());
        }
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let handle = tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(%status, "iis pass finished"),
                Err(err) => warn!(%err, "iis pass failed"),
            }
        });
        Ok(IisPass { handle, iis_path })
    }

    /// Awaits the pass, bounded by the time limit when one is set, and
    /// parses its artifact. A timeout discards the pass and yields `None`.
    async fn wait(mut self, time_limit: Option<f64>) -> Option<Iis> {
        let joined = match time_limit {
            Some(seconds) => {
                let deadline = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO);
                match timeout(deadline, &mut self.handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        debug!("discarded the iis pass at the wait deadline");
                        return None;
                    }
                }
            }
            None => (&mut self.handle).await,
        };
        if let Err(err) = joined {
            warn!(%err, "iis task failed");
            return None;
        }
        Iis::from_file(&self.iis_path).await
    }

    /// Kills the pass; its child process dies with the aborted task.
    fn discard(self) {
        debug!("discarding the iis pass");
    }
}

impl Drop for IisPass {
    fn drop(&mut self) {
        // A no-op once the task has completed. Covers every path that lets
        // go of the pass, including early error returns.
        self.handle.abort();
    }
}

fn merge_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut merged = String::from_utf8_lossy(stdout).into_owned();
    merged.push_str(&String::from_utf8_lossy(stderr));
    merged
}

static OUTPUT_INFEASIBLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Status\s+Infeasible$").unwrap());
static OUTPUT_PRIMAL_INFEASIBLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Status\s+Primal infeasible or unbounded$").unwrap());
static OUTPUT_UNBOUNDED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Status\s+Unbounded$").unwrap());

static RELATIVE_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Relative gap:\s*([\d.]+)").unwrap());
static PERCENT_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Gap:\s*([\d.]+)%").unwrap());

/// Extracts the relative MIP gap from the solver's console output.
fn extract_mip_gap(output: &str) -> Option<f64> {
    if let Some(captures) = RELATIVE_GAP.captures(output) {
        return captures[1].parse().ok();
    }
    PERCENT_GAP
        .captures(output)
        .and_then(|captures| captures[1].parse::<f64>().ok())
        .map(|percent| percent / 100.0)
}

/// Classifies a finished main pass into an outcome.
fn interpret(
    code: Option<i32>,
    output: &str,
    raw_solution: Option<String>,
    model: &str,
) -> SolveOutcome {
    if !matches!(code, Some(0) | Some(1)) {
        return SolveOutcome::Error(SolverFailure::SolverError {
            code,
            output: output.to_owned(),
            model: model.to_owned(),
        });
    }

    let Some(raw) = raw_solution else {
        return match status_from_output(output) {
            Some(outcome) => outcome,
            None => SolveOutcome::Error(SolverFailure::NoSolution {
                output: output.to_owned(),
                model: model.to_owned(),
            }),
        };
    };

    let mut lines = raw.lines();
    let has_header = lines.next().map(str::trim) == Some("Model status");
    let status = match (has_header, lines.next().map(str::trim)) {
        (true, Some(status)) => status.to_owned(),
        _ => {
            return match status_from_output(output) {
                Some(outcome) => outcome,
                None => SolveOutcome::Error(SolverFailure::UnknownStatus {
                    raw,
                    output: output.to_owned(),
                }),
            };
        }
    };

    let status = match status.as_str() {
        "Optimal" => SolutionStatus::Optimal,
        "Bound on objective reached" => SolutionStatus::ObjectiveBound,
        "Target for objective reached" => SolutionStatus::ObjectiveTarget,
        "Time limit reached" => SolutionStatus::TimeLimit,
        "Iteration limit reached" => SolutionStatus::IterationLimit,
        "Solution limit reached" => SolutionStatus::SolutionLimit,
        "Infeasible" | "Primal infeasible or unbounded" => {
            return SolveOutcome::Infeasible {
                output: output.to_owned(),
                iis: None,
            };
        }
        "Unbounded" => {
            return SolveOutcome::Unbounded {
                output: output.to_owned(),
            };
        }
        _ => {
            return SolveOutcome::Error(SolverFailure::UnknownStatus {
                raw,
                output: output.to_owned(),
            });
        }
    };

    let primal = match parse_primal(&raw) {
        Ok(primal) => primal,
        Err(err) => {
            return SolveOutcome::Error(SolverFailure::ParseError {
                reason: err.to_string(),
                raw,
                output: output.to_owned(),
            });
        }
    };
    let solution = Solution {
        status,
        feasible: primal.feasible,
        objective: primal.objective,
        variables: primal.variables,
        constraints: primal.constraints,
        mip_gap: extract_mip_gap(output),
    };
    match status {
        SolutionStatus::Optimal => SolveOutcome::Optimal(solution),
        SolutionStatus::TimeLimit => SolveOutcome::TimeLimit(solution),
        SolutionStatus::IterationLimit => SolveOutcome::IterationLimit(solution),
        SolutionStatus::ObjectiveBound => SolveOutcome::ObjectiveBound(solution),
        SolutionStatus::ObjectiveTarget => SolveOutcome::ObjectiveTarget(solution),
        SolutionStatus::SolutionLimit => SolveOutcome::SolutionLimit(solution),
    }
}

/// Falls back to the console output when the solution file discloses no
/// model status.
fn status_from_output(output: &str) -> Option<SolveOutcome> {
    if OUTPUT_INFEASIBLE.is_match(output) || OUTPUT_PRIMAL_INFEASIBLE.is_match(output) {
        return Some(SolveOutcome::Infeasible {
            output: output.to_owned(),
            iis: None,
        });
    }
    if OUTPUT_UNBOUNDED.is_match(output) {
        return Some(SolveOutcome::Unbounded {
            output: output.to_owned(),
        });
    }
    None
}
