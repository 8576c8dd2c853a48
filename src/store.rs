//! Node coordinate storage and index bookkeeping.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::MeshEditError;
use crate::geometry::Point;

/// Dense, zero-based identifier of a mesh node, assigned in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Wrap a raw node index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Raw zero-based index of the node.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// One-based node number used by the solver input format.
    #[must_use]
    pub const fn solver_number(self) -> usize {
        self.0 + 1
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a node, either by id or by an approximate location.
///
/// Locations resolve to the nearest main node.
///
/// # Examples
/// ```
/// use trussmesh::{point, NodeId, NodeRef};
///
/// assert_eq!(NodeRef::from(NodeId::new(3)), NodeRef::Id(NodeId::new(3)));
/// assert_eq!(NodeRef::from((1.0, 2.0)), NodeRef::Nearest(point(1.0, 2.0)));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeRef {
    /// An explicit node id.
    Id(NodeId),
    /// The main node closest to this location.
    Nearest(Point),
}

impl From<NodeId> for NodeRef {
    fn from(value: NodeId) -> Self {
        NodeRef::Id(value)
    }
}

impl From<Point> for NodeRef {
    fn from(value: Point) -> Self {
        NodeRef::Nearest(value)
    }
}

impl From<(f64, f64)> for NodeRef {
    fn from(value: (f64, f64)) -> Self {
        NodeRef::Nearest(Point::from(value))
    }
}

impl From<[f64; 2]> for NodeRef {
    fn from(value: [f64; 2]) -> Self {
        NodeRef::Nearest(Point::from(value))
    }
}

/// Owner of every node coordinate in a mesh.
///
/// Nodes are append-only: an id, once handed out, always refers to the same
/// coordinate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeStore {
    /// Coordinates of all nodes indexed by [`NodeId`].
    points: Vec<Point>,
    /// Main-node membership flag for each node.
    main_flags: Vec<bool>,
    /// Main nodes in creation order.
    main_nodes: Vec<NodeId>,
    /// Main nodes on the bounding rectangle, in the order they were flagged.
    outer_nodes: Vec<NodeId>,
}

impl NodeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes of any kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the store holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append a node and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`MeshEditError::NonFiniteCoordinate`] for NaN or infinite input.
    pub fn create_node(&mut self, position: Point) -> Result<NodeId, MeshEditError> {
        if !position.is_finite() {
            return Err(MeshEditError::NonFiniteCoordinate {
                x: position.x,
                y: position.y,
            });
        }
        let id = NodeId::new(self.points.len());
        self.points.push(position);
        self.main_flags.push(false);
        Ok(id)
    }

    /// Append a node and register it as a main node.
    ///
    /// # Errors
    ///
    /// Returns [`MeshEditError::NonFiniteCoordinate`] for NaN or infinite input.
    pub fn create_main_node(&mut self, position: Point) -> Result<NodeId, MeshEditError> {
        let id = self.create_node(position)?;
        self.main_flags[id.index()] = true;
        self.main_nodes.push(id);
        Ok(id)
    }

    /// Flag a main node as lying on the mesh perimeter.
    ///
    /// # Errors
    ///
    /// Returns [`MeshEditError::NotAMainNode`] when `node` is not a main node.
    pub fn mark_outer(&mut self, node: NodeId) -> Result<(), MeshEditError> {
        if !self.is_main(node) {
            return Err(MeshEditError::NotAMainNode(node));
        }
        if !self.outer_nodes.contains(&node) {
            self.outer_nodes.push(node);
        }
        Ok(())
    }

    /// Coordinate of a node.
    #[must_use]
    pub fn point(&self, node: NodeId) -> Option<Point> {
        self.points.get(node.index()).copied()
    }

    /// Coordinates of every node, indexed by id.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Whether `node` exists.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        node.index() < self.points.len()
    }

    /// Whether `node` exists and is a main node.
    #[must_use]
    pub fn is_main(&self, node: NodeId) -> bool {
        self.main_flags.get(node.index()).copied().unwrap_or(false)
    }

    /// Whether `node` is flagged as an outer node.
    #[must_use]
    pub fn is_outer(&self, node: NodeId) -> bool {
        self.outer_nodes.contains(&node)
    }

    /// Main nodes in creation order.
    #[must_use]
    pub fn main_nodes(&self) -> &[NodeId] {
        &self.main_nodes
    }

    /// Outer nodes in the order they were flagged.
    #[must_use]
    pub fn outer_nodes(&self) -> &[NodeId] {
        &self.outer_nodes
    }

    /// Main node closest to `target`.
    ///
    /// Ties go to the lowest id.
    ///
    /// # Errors
    ///
    /// Returns [`MeshEditError::NonFiniteCoordinate`] for a NaN or infinite
    /// target and [`MeshEditError::NoMainNodes`] when the store has no main node.
    pub fn nearest_main_node(&self, target: Point) -> Result<NodeId, MeshEditError> {
        if !target.is_finite() {
            return Err(MeshEditError::NonFiniteCoordinate {
                x: target.x,
                y: target.y,
            });
        }
        let mut best: Option<(NodeId, f64)> = None;
        for &node in &self.main_nodes {
            let distance = self.points[node.index()].distance_to(target);
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((node, distance)),
            }
        }
        best.map(|(node, _)| node).ok_or(MeshEditError::NoMainNodes)
    }

    /// Main nodes inside the inclusive axis-aligned box spanned by `low` and `high`.
    #[must_use]
    pub fn nodes_in_box(&self, low: Point, high: Point) -> Vec<NodeId> {
        self.main_nodes
            .iter()
            .copied()
            .filter(|node| {
                let p = self.points[node.index()];
                (low.x..=high.x).contains(&p.x) && (low.y..=high.y).contains(&p.y)
            })
            .collect()
    }

    /// Turn a [`NodeRef`] into a concrete id.
    ///
    /// # Errors
    ///
    /// Returns [`MeshEditError::UnknownNode`] for an id outside the store and
    /// [`MeshEditError::NoMainNodes`] for a location lookup in an empty store.
    pub fn resolve(&self, node: NodeRef) -> Result<NodeId, MeshEditError> {
        match node {
            NodeRef::Id(id) if self.contains(id) => Ok(id),
            NodeRef::Id(id) => Err(MeshEditError::UnknownNode(id)),
            NodeRef::Nearest(target) => self.nearest_main_node(target),
        }
    }
}
