#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_doc_code_examples)]
#![warn(clippy::missing_docs_in_private_items)]
#![doc = include_str!("../README.md")]

pub mod beam;
pub mod ccx;
pub mod conditions;
pub mod errors;
pub mod generator;
pub mod geometry;
pub mod history;
pub mod mesh;
pub mod objective;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod topology;

pub use beam::{BeamId, Element, SegmentedBeam};
pub use ccx::{write_input, Calculix, Solve, SolverResults};
pub use conditions::{BoundaryCondition, Conditions, Constraint, InitialDisplacement, PointLoad};
pub use errors::{
    HistoryError, MeshEditError, ResultParseError, SnapshotError, SolverError, TopologyError,
    WidthError,
};
pub use generator::{Bracing, GridSpec};
pub use geometry::{displacement, force, point, Displacement, Force, Point};
pub use history::WidthHistory;
pub use mesh::Mesh;
pub use objective::{evaluate, try_evaluate, EvaluationError};
pub use settings::{Material, MeshSettings, SolverConfig};
pub use snapshot::{BeamRecord, MeshSnapshot, SNAPSHOT_VERSION};
pub use store::{NodeId, NodeRef, NodeStore};
pub use topology::{Proposal, WidthInput};
