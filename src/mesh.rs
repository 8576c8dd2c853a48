//! The mesh aggregate: nodes, segmented beams, node conditions and the active topology.

use std::collections::{BTreeSet, HashMap};

use log::trace;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::beam::{subdivide, BeamId, SegmentedBeam};
use crate::conditions::{Conditions, Constraint};
use crate::errors::MeshEditError;
use crate::geometry::{Displacement, Force, Point};
use crate::settings::MeshSettings;
use crate::store::{NodeId, NodeRef, NodeStore};

/// Container for a planar frame of segmented beams.
///
/// Main nodes and segmented beams form an undirected incidence graph whose edge
/// indices double as [`BeamId`]s. Beams are never removed from the graph; pruning
/// only toggles which beams are active.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Mesh-wide beam properties.
    settings: MeshSettings,
    /// Coordinates of every node.
    store: NodeStore,
    /// Main nodes joined by segmented beams.
    graph: UnGraph<NodeId, SegmentedBeam>,
    /// Graph vertex of each main node.
    graph_nodes: HashMap<NodeId, NodeIndex>,
    /// Supports, loads and initial displacements.
    conditions: Conditions,
    /// Width of every beam, in beam order.
    widths: Vec<f64>,
    /// Survival flag of every beam, in beam order.
    active: Vec<bool>,
    /// Sum of width times length over active beams.
    mechanism_area: f64,
}

impl Mesh {
    /// Create an empty mesh.
    ///
    /// # Errors
    ///
    /// Returns [`MeshEditError::InvalidDivisions`] when the settings ask for zero
    /// sub-beams per segmented beam.
    ///
    /// # Examples
    /// ```
    /// use trussmesh::{Mesh, MeshSettings};
    ///
    /// let mesh = Mesh::new(MeshSettings::default()).expect("valid settings");
    /// assert_eq!(mesh.node_count(), 0);
    /// assert_eq!(mesh.beam_count(), 0);
    /// ```
    pub fn new(settings: MeshSettings) -> Result<Self, MeshEditError> {
        if settings.divisions_per_beam == 0 {
            return Err(MeshEditError::InvalidDivisions(0));
        }
        Ok(Self {
            settings,
            store: NodeStore::new(),
            graph: UnGraph::default(),
            graph_nodes: HashMap::new(),
            conditions: Conditions::new(),
            widths: Vec::new(),
            active: Vec::new(),
            mechanism_area: 0.0,
        })
    }

    /// Mesh-wide beam properties.
    #[must_use]
    pub fn settings(&self) -> &MeshSettings {
        &self.settings
    }

    /// Number of sub-beams in every segmented beam.
    #[must_use]
    pub fn divisions_per_beam(&self) -> usize {
        self.settings.divisions_per_beam
    }

    /// Number of nodes of any kind.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.store.len()
    }

    /// Number of segmented beams, active or not.
    #[must_use]
    pub fn beam_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node storage.
    #[must_use]
    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// Coordinate of a node.
    #[must_use]
    pub fn point(&self, node: NodeId) -> Option<Point> {
        self.store.point(node)
    }

    /// Main nodes in creation order.
    #[must_use]
    pub fn main_nodes(&self) -> &[NodeId] {
        self.store.main_nodes()
    }

    /// Main nodes on the mesh perimeter.
    #[must_use]
    pub fn outer_nodes(&self) -> &[NodeId] {
        self.store.outer_nodes()
    }

    /// Append a plain node.
    ///
    /// # Errors
    ///
    /// Returns [`MeshEditError::NonFiniteCoordinate`] for NaN or infinite input.
    pub fn create_node(&mut self, position: Point) -> Result<NodeId, MeshEditError> {
        self.store.create_node(position)
    }

    /// Append a main node, which may anchor beams and conditions.
    ///
    /// # Errors
    ///
    /// Returns [`MeshEditError::NonFiniteCoordinate`] for NaN or infinite input.
    pub fn create_main_node(&mut self, position: Point) -> Result<NodeId, MeshEditError> {
        let node = self.store.create_main_node(position)?;
        let vertex = self.graph.add_node(node);
        self.graph_nodes.insert(node, vertex);
        Ok(node)
    }

    /// Flag a main node as lying on the mesh perimeter.
    ///
    /// # Errors
    ///
    /// Returns [`MeshEditError::NotAMainNode`] when `node` is not a main node.
    pub fn mark_outer(&mut self, node: NodeId) -> Result<(), MeshEditError> {
        self.store.mark_outer(node)
    }

    /// Connect two main nodes with a new segmented beam.
    ///
    /// The beam starts inactive with zero width until the next width assignment.
    ///
    /// # Errors
    ///
    /// See [`subdivide`](crate::beam::subdivide).
    ///
    /// # Examples
    /// ```
    /// use trussmesh::{point, Mesh, MeshSettings};
    ///
    /// let mut mesh = Mesh::new(MeshSettings::default()).expect("valid settings");
    /// let a = mesh.create_main_node(point(0.0, 0.0)).expect("finite");
    /// let b = mesh.create_main_node(point(1.0, 0.0)).expect("finite");
    /// let beam = mesh.create_segmented_beam(a, b).expect("valid anchors");
    /// assert_eq!(beam.index(), 0);
    /// assert_eq!(mesh.node_count(), 2 + 7);
    /// ```
    pub fn create_segmented_beam(
        &mut self,
        start: NodeId,
        end: NodeId,
    ) -> Result<BeamId, MeshEditError> {
        let beam = subdivide(&mut self.store, start, end, self.settings.divisions_per_beam)?;
        let (a, b) = (self.vertex(start)?, self.vertex(end)?);
        let id = self.graph.add_edge(a, b, beam);
        self.widths.push(0.0);
        self.active.push(false);
        Ok(id)
    }

    /// Graph vertex of a main node.
    fn vertex(&self, node: NodeId) -> Result<NodeIndex, MeshEditError> {
        self.graph_nodes
            .get(&node)
            .copied()
            .ok_or(MeshEditError::NotAMainNode(node))
    }

    /// Main node closest to `target`, ties to the lowest id.
    ///
    /// # Errors
    ///
    /// Returns [`MeshEditError::NoMainNodes`] for a mesh without main nodes.
    pub fn nearest_main_node(&self, target: Point) -> Result<NodeId, MeshEditError> {
        self.store.nearest_main_node(target)
    }

    /// Main nodes inside the inclusive box spanned by `low` and `high`.
    #[must_use]
    pub fn nodes_in_box(&self, low: Point, high: Point) -> Vec<NodeId> {
        self.store.nodes_in_box(low, high)
    }

    /// Turn a [`NodeRef`] into a concrete node id.
    ///
    /// # Errors
    ///
    /// See [`NodeStore::resolve`].
    pub fn resolve(&self, node: impl Into<NodeRef>) -> Result<NodeId, MeshEditError> {
        self.store.resolve(node.into())
    }

    /// A segmented beam by id.
    #[must_use]
    pub fn beam(&self, beam: BeamId) -> Option<&SegmentedBeam> {
        self.graph.edge_weight(beam)
    }

    /// Every beam in creation order.
    pub fn beams(&self) -> impl Iterator<Item = (BeamId, &SegmentedBeam)> + '_ {
        self.graph
            .edge_indices()
            .filter_map(move |id| self.graph.edge_weight(id).map(|beam| (id, beam)))
    }

    /// Beams attached to a main node, in ascending beam order.
    ///
    /// Empty for nodes that are not main nodes.
    #[must_use]
    pub fn incident_beams(&self, node: NodeId) -> Vec<BeamId> {
        let Some(&vertex) = self.graph_nodes.get(&node) else {
            return Vec::new();
        };
        let mut beams: Vec<BeamId> = self.graph.edges(vertex).map(|edge| edge.id()).collect();
        beams.sort_unstable();
        beams
    }

    /// Attach a boundary condition to a node.
    ///
    /// `code` is 1 for x-translation, 2 for y-translation and 3 for rotation.
    ///
    /// # Errors
    ///
    /// Returns [`MeshEditError::InvalidBoundaryType`] for other codes and the
    /// errors of [`Mesh::resolve`] for unusable node references.
    pub fn make_boundary(
        &mut self,
        node: impl Into<NodeRef>,
        code: u8,
        removable: bool,
    ) -> Result<NodeId, MeshEditError> {
        let node = self.resolve(node)?;
        let constraint = Constraint::from_code(code)?;
        self.conditions.add_boundary(node, constraint, removable);
        Ok(node)
    }

    /// Apply a concentrated force to a node.
    ///
    /// # Errors
    ///
    /// See [`Mesh::resolve`].
    pub fn make_force(
        &mut self,
        node: impl Into<NodeRef>,
        force: Force,
    ) -> Result<NodeId, MeshEditError> {
        let node = self.resolve(node)?;
        self.conditions.add_force(node, force);
        Ok(node)
    }

    /// Prescribe an initial displacement for a node.
    ///
    /// # Errors
    ///
    /// See [`Mesh::resolve`].
    pub fn move_node(
        &mut self,
        node: impl Into<NodeRef>,
        displacement: Displacement,
    ) -> Result<NodeId, MeshEditError> {
        let node = self.resolve(node)?;
        self.conditions.add_initial_displacement(node, displacement);
        Ok(node)
    }

    /// Supports, loads and initial displacements.
    #[must_use]
    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    /// Width of every beam in beam order, as last assigned.
    #[must_use]
    pub fn widths(&self) -> &[f64] {
        &self.widths
    }

    /// Width of every beam with zero in place of inactive beams.
    #[must_use]
    pub fn width_record(&self) -> Vec<f64> {
        self.widths
            .iter()
            .zip(&self.active)
            .map(|(&width, &active)| if active { width } else { 0.0 })
            .collect()
    }

    /// Survival flag of every beam in beam order.
    #[must_use]
    pub fn active_mask(&self) -> &[bool] {
        &self.active
    }

    /// Whether a beam is part of the active topology.
    #[must_use]
    pub fn is_active(&self, beam: BeamId) -> bool {
        self.active.get(beam.index()).copied().unwrap_or(false)
    }

    /// Active beams in creation order.
    #[must_use]
    pub fn active_beams(&self) -> Vec<BeamId> {
        self.beams()
            .map(|(id, _)| id)
            .filter(|id| self.is_active(*id))
            .collect()
    }

    /// Nodes of any kind lying on an active beam, ascending.
    #[must_use]
    pub fn active_nodes(&self) -> BTreeSet<NodeId> {
        self.beams()
            .filter(|(id, _)| self.is_active(*id))
            .flat_map(|(_, beam)| beam.nodes())
            .collect()
    }

    /// Sum of width times length over the active beams.
    #[must_use]
    pub fn mechanism_area(&self) -> f64 {
        self.mechanism_area
    }

    /// Replace the committed width state.
    pub(crate) fn commit_widths(&mut self, widths: Vec<f64>, active: Vec<bool>, area: f64) {
        trace!(
            "committing {} active of {} beams, area {area}",
            active.iter().filter(|&&a| a).count(),
            active.len()
        );
        self.widths = widths;
        self.active = active;
        self.mechanism_area = area;
    }

    /// Rebuild a mesh from raw tables without re-running subdivision.
    pub(crate) fn from_parts(
        settings: MeshSettings,
        store: NodeStore,
        beams: Vec<SegmentedBeam>,
        conditions: Conditions,
    ) -> Result<Self, MeshEditError> {
        let mut mesh = Self::new(settings)?;
        for &node in store.main_nodes() {
            let vertex = mesh.graph.add_node(node);
            mesh.graph_nodes.insert(node, vertex);
        }
        mesh.store = store;
        for beam in beams {
            let (a, b) = (mesh.vertex(beam.start())?, mesh.vertex(beam.end())?);
            mesh.graph.add_edge(a, b, beam);
            mesh.widths.push(0.0);
            mesh.active.push(false);
        }
        mesh.conditions = conditions;
        Ok(mesh)
    }
}
