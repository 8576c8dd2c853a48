//! Segmented beams: chains of three-node sub-beam elements between two main nodes.

use petgraph::graph::EdgeIndex;

use crate::errors::MeshEditError;
use crate::geometry::Point;
use crate::store::{NodeId, NodeStore};

/// Identifier of a segmented beam, dense in creation order.
pub type BeamId = EdgeIndex;

/// Sub-beam element given as (start, mid, end) node ids.
pub type Element = [NodeId; 3];

/// A straight beam between two main nodes, subdivided into quadratic elements.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentedBeam {
    /// Sub-beam elements from the first anchor to the second.
    elements: Vec<Element>,
    /// Euclidean distance between the anchors.
    length: f64,
}

impl SegmentedBeam {
    /// Reassemble a beam from stored parts.
    pub(crate) fn from_parts(elements: Vec<Element>, length: f64) -> Self {
        Self { elements, length }
    }

    /// Sub-beam elements in order along the beam.
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Number of sub-beams.
    #[must_use]
    pub fn divisions(&self) -> usize {
        self.elements.len()
    }

    /// Anchor node at the start of the chain.
    #[must_use]
    pub fn start(&self) -> NodeId {
        self.elements[0][0]
    }

    /// Anchor node at the end of the chain.
    #[must_use]
    pub fn end(&self) -> NodeId {
        self.elements[self.elements.len() - 1][2]
    }

    /// Distance between the two anchors.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Every node on the beam, anchors included, without repeats.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(self.start()).chain(
            self.elements
                .iter()
                .flat_map(|element| [element[1], element[2]]),
        )
    }
}

/// Subdivide the segment between two main nodes into `divisions` sub-beams.
///
/// `2 * divisions - 1` interior nodes are appended to `store`; element `k` spans
/// polyline points `2k`, `2k + 1` and `2k + 2`, so neighbouring elements share
/// their boundary node.
///
/// # Errors
///
/// Returns [`MeshEditError::UnknownNode`] or [`MeshEditError::NotAMainNode`] for
/// unusable anchors, [`MeshEditError::DegenerateBeam`] when both anchors are the
/// same node, [`MeshEditError::InvalidDivisions`] for zero divisions and
/// [`MeshEditError::NonFiniteCoordinate`] when an interior point overflows. No
/// node is added on error.
pub fn subdivide(
    store: &mut NodeStore,
    start: NodeId,
    end: NodeId,
    divisions: usize,
) -> Result<SegmentedBeam, MeshEditError> {
    if divisions == 0 {
        return Err(MeshEditError::InvalidDivisions(divisions));
    }
    let a = anchor_point(store, start)?;
    let b = anchor_point(store, end)?;
    if start == end {
        return Err(MeshEditError::DegenerateBeam(start));
    }

    let steps = 2 * divisions;
    #[allow(clippy::cast_precision_loss)]
    let interior: Vec<Point> = (1..steps)
        .map(|step| a.lerp(b, step as f64 / steps as f64))
        .collect();
    if let Some(bad) = interior.iter().find(|p| !p.is_finite()) {
        return Err(MeshEditError::NonFiniteCoordinate { x: bad.x, y: bad.y });
    }

    let mut chain = Vec::with_capacity(steps + 1);
    chain.push(start);
    for position in interior {
        chain.push(store.create_node(position)?);
    }
    chain.push(end);

    let elements = chain
        .windows(3)
        .step_by(2)
        .map(|window| [window[0], window[1], window[2]])
        .collect();

    Ok(SegmentedBeam {
        elements,
        length: a.distance_to(b),
    })
}

/// Position of a beam anchor, which must be an existing main node.
fn anchor_point(store: &NodeStore, node: NodeId) -> Result<Point, MeshEditError> {
    let position = store.point(node).ok_or(MeshEditError::UnknownNode(node))?;
    if !store.is_main(node) {
        return Err(MeshEditError::NotAMainNode(node));
    }
    Ok(position)
}
