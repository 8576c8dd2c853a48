//! Objective evaluation for width-vector optimizers.
//!
//! An optimizer proposes width vectors; each one is applied to a private copy
//! of the mesh, solved, and handed to a caller-supplied objective. Candidates
//! that cannot be evaluated come back as NaN so that one bad candidate never
//! stops the search.

use log::warn;
use thiserror::Error;

use crate::ccx::{Solve, SolverResults};
use crate::errors::{SolverError, WidthError};
use crate::mesh::Mesh;

/// Why a width vector could not be evaluated.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The widths were malformed or the pruned topology is infeasible.
    #[error(transparent)]
    Width(#[from] WidthError),
    /// The solver failed on a feasible topology.
    #[error(transparent)]
    Solver(#[from] SolverError),
}

impl EvaluationError {
    /// Whether the candidate was rejected for structural infeasibility.
    #[must_use]
    pub fn is_infeasible(&self) -> bool {
        matches!(self, EvaluationError::Width(error) if error.is_infeasible())
    }
}

/// Apply `widths` to a copy of `mesh`, solve it and score the outcome.
///
/// `mesh` itself is never modified.
///
/// # Errors
///
/// Returns [`EvaluationError::Width`] when the widths are rejected and
/// [`EvaluationError::Solver`] when solving fails.
pub fn try_evaluate<S, F, T>(
    mesh: &Mesh,
    widths: &[f64],
    solver: &S,
    token: &str,
    objective: F,
) -> Result<T, EvaluationError>
where
    S: Solve + ?Sized,
    F: FnOnce(&Mesh, &SolverResults) -> T,
{
    let mut candidate = mesh.clone();
    candidate.set_width_array(widths)?;
    let results = solver.solve(&candidate, token)?;
    Ok(objective(&candidate, &results))
}

/// Like [`try_evaluate`] for objectives with `outputs` values, with every
/// failure reported as `outputs` NaNs.
///
/// # Examples
/// ```
/// use trussmesh::ccx::{Solve, SolverResults};
/// use trussmesh::objective::evaluate;
/// use trussmesh::{Bracing, GridSpec, Mesh, MeshSettings, SolverError};
///
/// struct Unreachable;
/// impl Solve for Unreachable {
///     fn solve(&self, _: &Mesh, _: &str) -> Result<SolverResults, SolverError> {
///         unreachable!("infeasible candidates are never solved")
///     }
/// }
///
/// let mesh = GridSpec::new(1.0, 1.0, (1, 1), Bracing::None)
///     .build(MeshSettings::default())
///     .expect("valid grid");
/// // No supports registered: any per-beam vector is infeasible.
/// let scores = evaluate(&mesh, &[1.0; 4], &Unreachable, "c0", 2, |mesh, _| {
///     vec![mesh.mechanism_area(), 0.0]
/// });
/// assert_eq!(scores.len(), 2);
/// assert!(scores.iter().all(|score| score.is_nan()));
/// ```
pub fn evaluate<S, F>(
    mesh: &Mesh,
    widths: &[f64],
    solver: &S,
    token: &str,
    outputs: usize,
    objective: F,
) -> Vec<f64>
where
    S: Solve + ?Sized,
    F: FnOnce(&Mesh, &SolverResults) -> Vec<f64>,
{
    match try_evaluate(mesh, widths, solver, token, objective) {
        Ok(scores) => scores,
        Err(error) => {
            warn!("candidate {token} scored as NaN: {error}");
            vec![f64::NAN; outputs]
        }
    }
}
