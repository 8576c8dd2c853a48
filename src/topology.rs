//! Width assignment and validated pruning of the active topology.
//!
//! A per-beam width vector splits the beams into the ones that survive (width at
//! least the mesh's minimal width) and the ones that are removed. Before the
//! split is committed it must pass every structural rule below; each rule is a
//! separate predicate over the proposal so it can be checked in isolation.
//!
//! 1. no main node may keep exactly one beam,
//! 2. loaded nodes stay attached,
//! 3. nodes with an initial displacement stay attached,
//! 4. nodes with an unremovable boundary stay attached,
//! 5. at least two boundary nodes stay attached, and a lone survivor must
//!    restrain x, y and rotation.
//!
//! A failing rule leaves the mesh exactly as it was.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::beam::BeamId;
use crate::conditions::Constraint;
use crate::errors::{TopologyError, WidthError};
use crate::mesh::Mesh;
use crate::store::NodeId;

/// Width assignment accepted by [`Mesh::set_width_array`].
#[derive(Clone, Debug, PartialEq)]
pub enum WidthInput {
    /// The same width for every beam; all beams become active.
    Uniform(f64),
    /// One width per beam, in beam creation order.
    PerBeam(Vec<f64>),
}

impl From<f64> for WidthInput {
    fn from(value: f64) -> Self {
        WidthInput::Uniform(value)
    }
}

impl From<Vec<f64>> for WidthInput {
    fn from(value: Vec<f64>) -> Self {
        WidthInput::PerBeam(value)
    }
}

impl From<&[f64]> for WidthInput {
    fn from(value: &[f64]) -> Self {
        WidthInput::PerBeam(value.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for WidthInput {
    fn from(value: [f64; N]) -> Self {
        WidthInput::PerBeam(value.to_vec())
    }
}

/// A proposed split of the beams into survivors and removed beams.
#[derive(Clone, Debug, PartialEq)]
pub struct Proposal {
    /// Survival flag per beam, in beam order.
    keep: Vec<bool>,
    /// Nodes of any kind lying on a surviving beam.
    attached: BTreeSet<NodeId>,
    /// Removed-beam count per main node touching at least one removed beam.
    removed_per_node: BTreeMap<NodeId, usize>,
}

impl Proposal {
    /// Split the beams of `mesh` by comparing `widths` with the minimal width.
    ///
    /// `widths` must hold one entry per beam.
    #[must_use]
    pub fn new(mesh: &Mesh, widths: &[f64]) -> Self {
        let minimal = mesh.settings().minimal_width;
        let keep: Vec<bool> = widths.iter().map(|&width| width >= minimal).collect();
        Self::from_mask(mesh, keep)
    }

    /// Build a proposal from an explicit survival mask.
    #[must_use]
    pub fn from_mask(mesh: &Mesh, keep: Vec<bool>) -> Self {
        let mut attached = BTreeSet::new();
        let mut removed_per_node = BTreeMap::new();
        for (id, beam) in mesh.beams() {
            if keep.get(id.index()).copied().unwrap_or(false) {
                attached.extend(beam.nodes());
            } else {
                for anchor in [beam.start(), beam.end()] {
                    *removed_per_node.entry(anchor).or_insert(0) += 1;
                }
            }
        }
        Self {
            keep,
            attached,
            removed_per_node,
        }
    }

    /// Whether `beam` survives.
    #[must_use]
    pub fn keeps(&self, beam: BeamId) -> bool {
        self.keep.get(beam.index()).copied().unwrap_or(false)
    }

    /// Whether `node` lies on a surviving beam.
    #[must_use]
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.attached.contains(&node)
    }

    /// Survival flags in beam order.
    #[must_use]
    pub fn mask(&self) -> &[bool] {
        &self.keep
    }

    /// Fail when removing beams leaves a main node with exactly one beam.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::LonelyNode`] for the lowest offending node.
    pub fn check_lonely_nodes(&self, mesh: &Mesh) -> Result<(), TopologyError> {
        for (&node, &removed) in &self.removed_per_node {
            let total = mesh.incident_beams(node).len();
            if total.saturating_sub(removed) == 1 {
                return Err(TopologyError::LonelyNode { node });
            }
        }
        Ok(())
    }

    /// Fail when a loaded node loses every beam.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::ForceRemoved`] for the first detached load.
    pub fn check_forces(&self, mesh: &Mesh) -> Result<(), TopologyError> {
        match mesh
            .conditions()
            .forces()
            .iter()
            .find(|load| !self.is_attached(load.node))
        {
            Some(load) => Err(TopologyError::ForceRemoved { node: load.node }),
            None => Ok(()),
        }
    }

    /// Fail when a node with an initial displacement loses every beam.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::InitialDisplacementRemoved`] for the first
    /// detached node.
    pub fn check_initial_displacements(&self, mesh: &Mesh) -> Result<(), TopologyError> {
        match mesh
            .conditions()
            .initial_displacements()
            .iter()
            .find(|moved| !self.is_attached(moved.node))
        {
            Some(moved) => Err(TopologyError::InitialDisplacementRemoved { node: moved.node }),
            None => Ok(()),
        }
    }

    /// Fail when a node with an unremovable boundary condition loses every beam.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnremovableBoundaryRemoved`] for the first
    /// detached node.
    pub fn check_unremovable_boundaries(&self, mesh: &Mesh) -> Result<(), TopologyError> {
        match mesh
            .conditions()
            .boundaries()
            .iter()
            .find(|boundary| !boundary.removable && !self.is_attached(boundary.node))
        {
            Some(boundary) => Err(TopologyError::UnremovableBoundaryRemoved {
                node: boundary.node,
            }),
            None => Ok(()),
        }
    }

    /// Fail when the surviving supports cannot pin the structure.
    ///
    /// A single surviving support node must restrain x, y and rotation, and even
    /// then at least two support nodes are required.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::SingleBoundaryUnderConstrained`] or
    /// [`TopologyError::TooFewBoundaries`].
    pub fn check_boundary_sufficiency(&self, mesh: &Mesh) -> Result<(), TopologyError> {
        let surviving: Vec<(NodeId, Vec<Constraint>)> = mesh
            .conditions()
            .constraints_by_node()
            .into_iter()
            .filter(|(node, _)| self.is_attached(*node))
            .collect();

        if let [(node, constraints)] = surviving.as_slice() {
            if !Constraint::ALL.iter().all(|c| constraints.contains(c)) {
                return Err(TopologyError::SingleBoundaryUnderConstrained { node: *node });
            }
        }
        if surviving.len() < 2 {
            return Err(TopologyError::TooFewBoundaries {
                remaining: surviving.len(),
            });
        }
        Ok(())
    }

    /// Run every structural check in order and stop at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the [`TopologyError`] of the first failing check.
    pub fn validate(&self, mesh: &Mesh) -> Result<(), TopologyError> {
        self.check_lonely_nodes(mesh)?;
        self.check_forces(mesh)?;
        self.check_initial_displacements(mesh)?;
        self.check_unremovable_boundaries(mesh)?;
        self.check_boundary_sufficiency(mesh)
    }
}

/// Sum of width times length over the beams flagged in `keep`.
pub(crate) fn mechanism_area(mesh: &Mesh, widths: &[f64], keep: &[bool]) -> f64 {
    mesh.beams()
        .filter(|(id, _)| keep[id.index()])
        .map(|(id, beam)| widths[id.index()] * beam.length())
        .sum()
}

impl Mesh {
    /// Assign beam widths and recompute the active topology.
    ///
    /// A uniform width activates every beam without further checks. A per-beam
    /// vector removes beams narrower than the minimal width, after verifying the
    /// result is structurally valid; on failure the previous state is kept.
    ///
    /// # Errors
    ///
    /// Returns [`WidthError::WrongLength`] or [`WidthError::NonFiniteWidth`] for
    /// malformed input and [`WidthError::Infeasible`] when the pruned topology
    /// breaks a structural rule.
    ///
    /// # Examples
    /// ```
    /// use trussmesh::{Bracing, GridSpec, MeshSettings};
    ///
    /// let mut mesh = GridSpec::new(2.0, 1.0, (2, 1), Bracing::None)
    ///     .build(MeshSettings::default())
    ///     .expect("valid grid");
    /// mesh.make_boundary((0.0, 0.0), 1, true).expect("node exists");
    /// mesh.make_boundary((2.0, 0.0), 2, true).expect("node exists");
    ///
    /// mesh.set_width_array(0.5).expect("uniform widths always apply");
    /// assert_eq!(mesh.active_beams().len(), 7);
    ///
    /// let error = mesh
    ///     .set_width_array(vec![0.0; 7])
    ///     .expect_err("everything removed");
    /// assert!(error.is_infeasible());
    /// assert_eq!(mesh.active_beams().len(), 7);
    /// ```
    pub fn set_width_array(&mut self, input: impl Into<WidthInput>) -> Result<(), WidthError> {
        match input.into() {
            WidthInput::Uniform(width) => self.set_uniform_width(width),
            WidthInput::PerBeam(widths) => self.set_beam_widths(widths),
        }
    }

    /// Activate every beam at one width.
    fn set_uniform_width(&mut self, width: f64) -> Result<(), WidthError> {
        if !width.is_finite() {
            return Err(WidthError::NonFiniteWidth { beam: None, width });
        }
        let widths = vec![width; self.beam_count()];
        let keep = vec![true; self.beam_count()];
        let area = mechanism_area(self, &widths, &keep);
        debug!("uniform width {width} on {} beams", widths.len());
        self.commit_widths(widths, keep, area);
        Ok(())
    }

    /// Validate and commit a per-beam width vector.
    fn set_beam_widths(&mut self, widths: Vec<f64>) -> Result<(), WidthError> {
        let proposal = self.propose(&widths)?;
        proposal.validate(self)?;
        let area = mechanism_area(self, &widths, proposal.mask());
        debug!(
            "pruned to {} of {} beams, mechanism area {area}",
            proposal.mask().iter().filter(|&&keep| keep).count(),
            widths.len()
        );
        self.commit_widths(widths, proposal.keep, area);
        Ok(())
    }

    /// Check the shape of a width vector and split the beams accordingly.
    ///
    /// Nothing is validated against the structural rules; see
    /// [`Proposal::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`WidthError::WrongLength`] or [`WidthError::NonFiniteWidth`].
    pub fn propose(&self, widths: &[f64]) -> Result<Proposal, WidthError> {
        if widths.len() != self.beam_count() {
            return Err(WidthError::WrongLength {
                expected: self.beam_count(),
                found: widths.len(),
            });
        }
        if let Some((index, &width)) = widths.iter().enumerate().find(|(_, w)| !w.is_finite()) {
            return Err(WidthError::NonFiniteWidth {
                beam: Some(BeamId::new(index)),
                width,
            });
        }
        Ok(Proposal::new(self, widths))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::generator::{Bracing, GridSpec};
    use crate::geometry::{displacement, force, point};
    use crate::settings::MeshSettings;

    /// 2x1 grid: nodes 0 1 2 along the bottom, 3 4 5 along the top.
    /// Beams: 0:(0,1) 1:(0,3) 2:(1,2) 3:(1,4) 4:(2,5) 5:(3,4) 6:(4,5)
    fn strip() -> Mesh {
        GridSpec::new(2.0, 1.0, (2, 1), Bracing::None)
            .build(MeshSettings::default())
            .expect("valid grid")
    }

    fn widths_without(count: usize, removed: &[usize]) -> Vec<f64> {
        (0..count)
            .map(|i| if removed.contains(&i) { 0.0 } else { 1.0 })
            .collect()
    }

    #[test]
    fn proposal_partitions_by_minimal_width() {
        let mesh = strip();
        let minimal = mesh.settings().minimal_width;
        let widths = vec![minimal, minimal * 0.5, 1.0, 0.0, 1.0, 1.0, 1.0];
        let proposal = mesh.propose(&widths).expect("well formed");
        assert_eq!(
            proposal.mask(),
            &[true, false, true, false, true, true, true]
        );
        assert!(proposal.is_attached(NodeId::new(0)));
        assert!(proposal.is_attached(NodeId::new(4)));
    }

    #[test]
    fn malformed_vectors_are_invalid_input() {
        let mut mesh = strip();
        assert_eq!(
            mesh.set_width_array(vec![1.0; 3]),
            Err(WidthError::WrongLength {
                expected: 7,
                found: 3
            })
        );
        let mut widths = vec![1.0; 7];
        widths[4] = f64::NAN;
        let error = mesh.set_width_array(widths).expect_err("nan rejected");
        assert!(matches!(
            error,
            WidthError::NonFiniteWidth { beam: Some(beam), .. } if beam.index() == 4
        ));
        assert!(!error.is_infeasible());
        assert!(mesh
            .set_width_array(f64::INFINITY)
            .expect_err("infinite rejected")
            .to_string()
            .contains("not finite"));
    }

    #[test]
    fn lonely_node_check_counts_remaining_beams() {
        let mesh = strip();
        // Nodes 0 and 3 lose every beam, nodes 1 and 4 keep two each.
        let ok = Proposal::new(&mesh, &widths_without(7, &[0, 1, 5]));
        assert_eq!(ok.check_lonely_nodes(&mesh), Ok(()));
        // Removing (0,1) leaves node 0 with only (0,3).
        let lonely = Proposal::new(&mesh, &widths_without(7, &[0]));
        assert_eq!(
            lonely.check_lonely_nodes(&mesh),
            Err(TopologyError::LonelyNode {
                node: NodeId::new(0)
            })
        );
    }

    #[test]
    fn force_check_requires_attachment() {
        let mut mesh = strip();
        mesh.make_force(point(0.0, 0.0), force(0.0, -1.0))
            .expect("node exists");
        let detached = Proposal::new(&mesh, &widths_without(7, &[0, 1, 5]));
        assert_eq!(
            detached.check_forces(&mesh),
            Err(TopologyError::ForceRemoved {
                node: NodeId::new(0)
            })
        );
        let attached = Proposal::new(&mesh, &widths_without(7, &[4, 6]));
        assert_eq!(attached.check_forces(&mesh), Ok(()));
    }

    #[test]
    fn forces_on_interior_nodes_follow_their_beam() {
        let mut mesh = strip();
        let interior = mesh.beam(BeamId::new(1)).expect("beam").elements()[1][1];
        mesh.make_force(interior, force(1.0, 0.0)).expect("node exists");
        let removed = Proposal::new(&mesh, &widths_without(7, &[0, 1, 5]));
        assert_eq!(
            removed.check_forces(&mesh),
            Err(TopologyError::ForceRemoved { node: interior })
        );
    }

    #[test]
    fn initial_displacement_check_requires_attachment() {
        let mut mesh = strip();
        mesh.move_node(NodeId::new(2), displacement(0.0, -0.5))
            .expect("node exists");
        let detached = Proposal::new(&mesh, &widths_without(7, &[2, 4]));
        assert_eq!(
            detached.check_initial_displacements(&mesh),
            Err(TopologyError::InitialDisplacementRemoved {
                node: NodeId::new(2)
            })
        );
        let full = Proposal::new(&mesh, &widths_without(7, &[]));
        assert_eq!(full.check_initial_displacements(&mesh), Ok(()));
    }

    #[test]
    fn unremovable_boundary_check_ignores_removable_ones() {
        let mut mesh = strip();
        mesh.make_boundary(NodeId::new(0), 1, true).expect("node exists");
        mesh.make_boundary(NodeId::new(2), 2, false).expect("node exists");
        let proposal = Proposal::new(&mesh, &widths_without(7, &[0, 1, 5]));
        assert_eq!(proposal.check_unremovable_boundaries(&mesh), Ok(()));
        let proposal = Proposal::new(&mesh, &widths_without(7, &[2, 4]));
        assert_eq!(
            proposal.check_unremovable_boundaries(&mesh),
            Err(TopologyError::UnremovableBoundaryRemoved {
                node: NodeId::new(2)
            })
        );
    }

    #[test]
    fn boundary_sufficiency_rules() {
        let mut mesh = strip();
        for code in [1, 2] {
            mesh.make_boundary(NodeId::new(0), code, true).expect("node exists");
            mesh.make_boundary(NodeId::new(2), code, true).expect("node exists");
        }
        let both = Proposal::new(&mesh, &widths_without(7, &[]));
        assert_eq!(both.check_boundary_sufficiency(&mesh), Ok(()));

        let lone = Proposal::new(&mesh, &widths_without(7, &[0, 1, 5]));
        assert_eq!(
            lone.check_boundary_sufficiency(&mesh),
            Err(TopologyError::SingleBoundaryUnderConstrained {
                node: NodeId::new(2)
            })
        );

        mesh.make_boundary(NodeId::new(2), 3, true).expect("node exists");
        let lone_but_pinned = Proposal::new(&mesh, &widths_without(7, &[0, 1, 5]));
        assert_eq!(
            lone_but_pinned.check_boundary_sufficiency(&mesh),
            Err(TopologyError::TooFewBoundaries { remaining: 1 })
        );
    }

    #[test]
    fn no_registered_boundaries_is_insufficient() {
        let mesh = strip();
        let proposal = Proposal::new(&mesh, &widths_without(7, &[]));
        assert_eq!(
            proposal.check_boundary_sufficiency(&mesh),
            Err(TopologyError::TooFewBoundaries { remaining: 0 })
        );
    }

    #[test]
    fn uniform_width_activates_everything() {
        let mut mesh = strip();
        mesh.set_width_array(0.5).expect("finite width");
        assert_eq!(mesh.active_beams().len(), 7);
        assert_eq!(mesh.widths(), &[0.5; 7]);
        assert_relative_eq!(mesh.mechanism_area(), 0.5 * 7.0);
    }

    #[test]
    fn successful_pruning_commits_mask_and_area() {
        let mut mesh = strip();
        mesh.make_boundary(NodeId::new(1), 1, true).expect("node exists");
        mesh.make_boundary(NodeId::new(2), 2, true).expect("node exists");
        let mut widths = widths_without(7, &[0, 1, 5]);
        widths[2] = 0.25;
        mesh.set_width_array(widths.clone()).expect("feasible");

        assert_eq!(mesh.widths(), widths.as_slice());
        assert_eq!(
            mesh.active_mask(),
            &[false, false, true, true, true, false, true]
        );
        assert_relative_eq!(mesh.mechanism_area(), 0.25 + 3.0);
        assert_eq!(mesh.width_record()[..3], [0.0, 0.0, 0.25]);
        assert!(!mesh.active_nodes().contains(&NodeId::new(0)));
    }

    #[test]
    fn failed_pruning_keeps_previous_state() {
        let mut mesh = strip();
        mesh.make_boundary(NodeId::new(0), 1, true).expect("node exists");
        mesh.make_boundary(NodeId::new(2), 2, true).expect("node exists");
        mesh.set_width_array(0.5).expect("finite width");
        let before = (mesh.widths().to_vec(), mesh.active_mask().to_vec());

        let error = mesh
            .set_width_array(widths_without(7, &[0]))
            .expect_err("lonely node");
        assert_eq!(
            error,
            WidthError::Infeasible(TopologyError::LonelyNode {
                node: NodeId::new(0)
            })
        );
        assert_eq!((mesh.widths().to_vec(), mesh.active_mask().to_vec()), before);
        assert_relative_eq!(mesh.mechanism_area(), 3.5);
    }
}
