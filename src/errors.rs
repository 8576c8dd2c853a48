//! Error types produced while building, pruning, solving and persisting meshes.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::beam::BeamId;
use crate::store::NodeId;

/// Error returned when building or annotating a [`Mesh`](crate::Mesh) with invalid input.
///
/// # Examples
///
/// ```
/// use trussmesh::{Mesh, MeshEditError, MeshSettings, NodeId, NodeRef};
///
/// let mut mesh = Mesh::new(MeshSettings::default()).expect("default settings are valid");
/// let error = mesh
///     .make_boundary(NodeRef::Id(NodeId::new(7)), 1, true)
///     .expect_err("unknown node is rejected");
/// assert_eq!(error, MeshEditError::UnknownNode(NodeId::new(7)));
/// ```
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MeshEditError {
    /// Returned when a node id does not exist in the mesh.
    #[error("node {0} does not exist in this mesh")]
    UnknownNode(NodeId),
    /// Returned when a beam anchor is not a main node.
    #[error("node {0} is not a main node")]
    NotAMainNode(NodeId),
    /// Returned when a nearest-node lookup runs on a mesh without main nodes.
    #[error("mesh has no main nodes to search")]
    NoMainNodes,
    /// Returned when a coordinate is NaN or infinite.
    #[error("coordinate ({x}, {y}) is not finite")]
    NonFiniteCoordinate {
        /// Rejected x coordinate.
        x: f64,
        /// Rejected y coordinate.
        y: f64,
    },
    /// Returned when both anchors of a beam are the same node.
    #[error("beam anchors must differ (both are node {0})")]
    DegenerateBeam(NodeId),
    /// Returned when a boundary type code is not 1, 2 or 3.
    #[error("boundary type must be 1, 2 or 3 (received {0})")]
    InvalidBoundaryType(u8),
    /// Returned when the number of sub-beams per segmented beam is zero.
    #[error("divisions per beam must be at least 1 (received {0})")]
    InvalidDivisions(usize),
    /// Returned when grid generator parameters are not usable.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
    /// Returned when a bracing mode string is not recognised.
    #[error("unknown bracing mode {0:?}; expected one of \"none\", \"fd\", \"bd\", \"x\"")]
    UnknownBracing(String),
}

/// Structural-validity failure of a proposed width vector.
///
/// These failures are recoverable: the candidate topology is invalid, the mesh is
/// unchanged, and an optimizer should treat the point as infeasible.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// A main node would be left with exactly one incident beam.
    #[error("lonely node: main node {node} would keep exactly one beam")]
    LonelyNode {
        /// The under-connected main node.
        node: NodeId,
    },
    /// A node carrying a force would be detached from the structure.
    #[error("trying to remove the force applied at node {node}")]
    ForceRemoved {
        /// The loaded node.
        node: NodeId,
    },
    /// A node with a prescribed initial displacement would be detached.
    #[error("trying to remove the initial displacement of node {node}")]
    InitialDisplacementRemoved {
        /// The displaced node.
        node: NodeId,
    },
    /// A node carrying an unremovable boundary condition would be detached.
    #[error("trying to remove an unremovable boundary at node {node}")]
    UnremovableBoundaryRemoved {
        /// The supported node.
        node: NodeId,
    },
    /// The only surviving boundary node does not restrain x, y and rotation.
    #[error("too many boundaries removed: node {node} alone cannot pin the structure")]
    SingleBoundaryUnderConstrained {
        /// The single surviving boundary node.
        node: NodeId,
    },
    /// Fewer than two boundary nodes stay attached to the structure.
    #[error("too many boundaries removed: only {remaining} boundary node(s) left")]
    TooFewBoundaries {
        /// Number of boundary nodes still attached.
        remaining: usize,
    },
}

/// Error returned by [`Mesh::set_width_array`](crate::Mesh::set_width_array).
#[derive(Clone, Debug, Error, PartialEq)]
pub enum WidthError {
    /// The width vector does not hold one entry per segmented beam.
    #[error("wrong width array size: expected {expected}, received {found}")]
    WrongLength {
        /// Number of beams in the mesh.
        expected: usize,
        /// Number of widths supplied.
        found: usize,
    },
    /// A width is NaN or infinite.
    #[error("width {width} for beam {beam:?} is not finite")]
    NonFiniteWidth {
        /// Beam that received the width, `None` for a uniform width.
        beam: Option<BeamId>,
        /// The rejected width.
        width: f64,
    },
    /// The proposed topology violates a structural-validity rule.
    #[error(transparent)]
    Infeasible(#[from] TopologyError),
}

impl WidthError {
    /// Whether this error marks a structurally infeasible candidate rather than
    /// malformed input.
    #[must_use]
    pub fn is_infeasible(&self) -> bool {
        matches!(self, WidthError::Infeasible(_))
    }
}

/// Error returned when reading a solver result file.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ResultParseError {
    /// A packed scientific-notation value could not be decoded.
    #[error("line {line}: malformed number {text:?}")]
    BadNumber {
        /// One-based line number in the result file.
        line: usize,
        /// Offending text.
        text: String,
    },
    /// A data line is too short to carry a node number.
    #[error("line {line}: missing node number")]
    MissingNode {
        /// One-based line number in the result file.
        line: usize,
    },
}

/// Error returned when running the external solver.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Filesystem or process spawning failure.
    #[error("solver i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The solver process exited unsuccessfully.
    #[error("solver `{program}` exited with {status}")]
    Failed {
        /// Program that was run.
        program: String,
        /// Exit status of the process.
        status: ExitStatus,
    },
    /// The solver did not finish within the configured timeout.
    #[error("solver did not finish within {0:?}")]
    Timeout(Duration),
    /// The solver finished but did not produce a result file.
    #[error("solver produced no result file at {0}")]
    MissingResults(PathBuf),
    /// The result file could not be parsed.
    #[error("cannot read solver results: {0}")]
    Parse(#[from] ResultParseError),
}

/// Error returned when saving or restoring a [`MeshSnapshot`](crate::MeshSnapshot).
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Serialization failure.
    #[error("snapshot serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    /// The snapshot was written by an incompatible schema version.
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version this crate writes.
        expected: u32,
        /// Version found in the snapshot.
        found: u32,
    },
    /// The snapshot tables disagree with each other.
    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),
}

/// Error returned when reading or writing a width history file.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Filesystem failure.
    #[error("history i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The file does not start with the history magic bytes.
    #[error("not a width history file")]
    BadMagic,
    /// A row does not match the history's column count.
    #[error("history rows have {expected} columns, received {found}")]
    ColumnMismatch {
        /// Column count of the history.
        expected: usize,
        /// Length of the rejected row.
        found: usize,
    },
}
