//! Supports, point loads and prescribed initial displacements attached to mesh nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::MeshEditError;
use crate::geometry::{Displacement, Force};
use crate::store::NodeId;

/// Degree of freedom restrained by a boundary condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Constraint {
    /// Translation along X.
    TranslationX,
    /// Translation along Y.
    TranslationY,
    /// In-plane rotation about Z.
    RotationZ,
}

impl Constraint {
    /// Every constraint a node needs to pin a planar rigid body on its own.
    pub const ALL: [Constraint; 3] = [
        Constraint::TranslationX,
        Constraint::TranslationY,
        Constraint::RotationZ,
    ];

    /// Parse the user-facing boundary code: 1 = x, 2 = y, 3 = rotation.
    ///
    /// # Errors
    ///
    /// Returns [`MeshEditError::InvalidBoundaryType`] for any other code.
    ///
    /// # Examples
    /// ```
    /// use trussmesh::Constraint;
    ///
    /// let rotation = Constraint::from_code(3).expect("valid code");
    /// assert_eq!(rotation.solver_dof(), 6);
    /// assert!(Constraint::from_code(4).is_err());
    /// ```
    pub fn from_code(code: u8) -> Result<Self, MeshEditError> {
        match code {
            1 => Ok(Constraint::TranslationX),
            2 => Ok(Constraint::TranslationY),
            3 => Ok(Constraint::RotationZ),
            other => Err(MeshEditError::InvalidBoundaryType(other)),
        }
    }

    /// Degree-of-freedom number in the solver vocabulary.
    #[must_use]
    pub const fn solver_dof(self) -> u8 {
        match self {
            Constraint::TranslationX => 1,
            Constraint::TranslationY => 2,
            Constraint::RotationZ => 6,
        }
    }
}

/// A restrained degree of freedom at a node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCondition {
    /// Supported node.
    pub node: NodeId,
    /// Restrained degree of freedom.
    pub constraint: Constraint,
    /// Whether topology pruning may detach this node.
    pub removable: bool,
}

/// A concentrated force at a node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointLoad {
    /// Loaded node.
    pub node: NodeId,
    /// Applied force.
    pub force: Force,
}

/// A prescribed displacement of a node at the start of the load step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitialDisplacement {
    /// Moved node.
    pub node: NodeId,
    /// Prescribed translation.
    pub displacement: Displacement,
}

/// Registry of everything applied to mesh nodes.
///
/// Entries are only ever appended; duplicates are kept.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    /// Boundary conditions in registration order.
    boundaries: Vec<BoundaryCondition>,
    /// Point loads in registration order.
    forces: Vec<PointLoad>,
    /// Initial displacements in registration order.
    initial_displacements: Vec<InitialDisplacement>,
}

impl Conditions {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a boundary condition.
    pub fn add_boundary(&mut self, node: NodeId, constraint: Constraint, removable: bool) {
        self.boundaries.push(BoundaryCondition {
            node,
            constraint,
            removable,
        });
    }

    /// Record a point load.
    pub fn add_force(&mut self, node: NodeId, force: Force) {
        self.forces.push(PointLoad { node, force });
    }

    /// Record an initial displacement.
    pub fn add_initial_displacement(&mut self, node: NodeId, displacement: Displacement) {
        self.initial_displacements.push(InitialDisplacement { node, displacement });
    }

    /// Boundary conditions in registration order.
    #[must_use]
    pub fn boundaries(&self) -> &[BoundaryCondition] {
        &self.boundaries
    }

    /// Point loads in registration order.
    #[must_use]
    pub fn forces(&self) -> &[PointLoad] {
        &self.forces
    }

    /// Initial displacements in registration order.
    #[must_use]
    pub fn initial_displacements(&self) -> &[InitialDisplacement] {
        &self.initial_displacements
    }

    /// Constraints grouped by node, in ascending node order.
    #[must_use]
    pub fn constraints_by_node(&self) -> BTreeMap<NodeId, Vec<Constraint>> {
        let mut grouped: BTreeMap<NodeId, Vec<Constraint>> = BTreeMap::new();
        for boundary in &self.boundaries {
            let constraints = grouped.entry(boundary.node).or_default();
            if !constraints.contains(&boundary.constraint) {
                constraints.push(boundary.constraint);
            }
        }
        grouped
    }

    /// Every node referenced by any registry entry.
    pub(crate) fn referenced_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.boundaries
            .iter()
            .map(|b| b.node)
            .chain(self.forces.iter().map(|f| f.node))
            .chain(self.initial_displacements.iter().map(|d| d.node))
    }
}
