//! Versioned, serializable picture of a mesh.
//!
//! A [`MeshSnapshot`] stores the raw tables of a [`Mesh`] (nodes, beams,
//! widths, conditions and settings) so that a mesh can be written to JSON and
//! rebuilt later without re-running the generator.

use std::collections::BTreeSet;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::beam::{Element, SegmentedBeam};
use crate::conditions::Conditions;
use crate::errors::SnapshotError;
use crate::geometry::Point;
use crate::mesh::Mesh;
use crate::settings::MeshSettings;
use crate::store::{NodeId, NodeStore};
use crate::topology::mechanism_area;

/// Schema version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One segmented beam.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeamRecord {
    /// First anchor.
    pub start: NodeId,
    /// Second anchor.
    pub end: NodeId,
    /// Anchor distance.
    pub length: f64,
    /// Sub-beam node triples.
    pub elements: Vec<Element>,
}

/// Plain-data copy of a [`Mesh`].
///
/// # Examples
/// ```
/// use trussmesh::{Bracing, GridSpec, Mesh, MeshSettings, MeshSnapshot};
///
/// let mut mesh = GridSpec::new(2.0, 1.0, (2, 1), Bracing::ForwardDiagonal)
///     .build(MeshSettings::default())
///     .expect("valid grid");
/// mesh.set_width_array(0.3).expect("finite width");
///
/// let mut json = Vec::new();
/// mesh.snapshot().write_json(&mut json).expect("serializable");
/// let snapshot = MeshSnapshot::read_json(json.as_slice()).expect("valid json");
/// let restored = Mesh::from_snapshot(snapshot).expect("consistent snapshot");
/// assert_eq!(restored.beam_count(), mesh.beam_count());
/// assert_eq!(restored.active_mask(), mesh.active_mask());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshSnapshot {
    /// Schema version; see [`SNAPSHOT_VERSION`].
    pub version: u32,
    /// Mesh-wide beam properties.
    pub settings: MeshSettings,
    /// Coordinates indexed by node id.
    pub nodes: Vec<Point>,
    /// Main nodes in ascending id order.
    pub main_nodes: Vec<NodeId>,
    /// Main nodes on the perimeter.
    pub outer_nodes: Vec<NodeId>,
    /// Beams in creation order.
    pub beams: Vec<BeamRecord>,
    /// Width per beam.
    pub widths: Vec<f64>,
    /// Survival flag per beam.
    pub active: Vec<bool>,
    /// Supports, loads and initial displacements.
    pub conditions: Conditions,
}

impl MeshSnapshot {
    /// Serialize as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] when writing fails.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), SnapshotError> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Deserialize from JSON. The version is checked by [`Mesh::from_snapshot`].
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] for malformed documents.
    pub fn read_json<R: Read>(reader: R) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Shorthand for [`SnapshotError::Inconsistent`].
fn inconsistent(message: impl Into<String>) -> SnapshotError {
    SnapshotError::Inconsistent(message.into())
}

impl Mesh {
    /// Copy the mesh into a [`MeshSnapshot`].
    #[must_use]
    pub fn snapshot(&self) -> MeshSnapshot {
        MeshSnapshot {
            version: SNAPSHOT_VERSION,
            settings: *self.settings(),
            nodes: self.store().points().to_vec(),
            main_nodes: self.main_nodes().to_vec(),
            outer_nodes: self.outer_nodes().to_vec(),
            beams: self
                .beams()
                .map(|(_, beam)| BeamRecord {
                    start: beam.start(),
                    end: beam.end(),
                    length: beam.length(),
                    elements: beam.elements().to_vec(),
                })
                .collect(),
            widths: self.widths().to_vec(),
            active: self.active_mask().to_vec(),
            conditions: self.conditions().clone(),
        }
    }

    /// Rebuild a mesh from a snapshot.
    ///
    /// The active topology is restored as stored; it is not re-validated.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::UnsupportedVersion`] for snapshots of another
    /// schema version and [`SnapshotError::Inconsistent`] when the tables
    /// contradict each other.
    pub fn from_snapshot(snapshot: MeshSnapshot) -> Result<Self, SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                expected: SNAPSHOT_VERSION,
                found: snapshot.version,
            });
        }
        let store = restore_store(&snapshot)?;
        let divisions = snapshot.settings.divisions_per_beam;

        let mut beams = Vec::with_capacity(snapshot.beams.len());
        for (index, record) in snapshot.beams.into_iter().enumerate() {
            check_beam(&store, index, &record, divisions)?;
            beams.push(SegmentedBeam::from_parts(record.elements, record.length));
        }

        let beam_count = beams.len();
        if snapshot.widths.len() != beam_count || snapshot.active.len() != beam_count {
            return Err(inconsistent(format!(
                "{beam_count} beams but {} widths and {} activity flags",
                snapshot.widths.len(),
                snapshot.active.len()
            )));
        }
        if let Some(width) = snapshot.widths.iter().find(|w| !w.is_finite()) {
            return Err(inconsistent(format!("width {width} is not finite")));
        }
        if let Some(node) = snapshot
            .conditions
            .referenced_nodes()
            .find(|node| !store.contains(*node))
        {
            return Err(inconsistent(format!("condition on unknown node {node}")));
        }

        let mut mesh = Mesh::from_parts(snapshot.settings, store, beams, snapshot.conditions)
            .map_err(|error| inconsistent(error.to_string()))?;
        let area = mechanism_area(&mesh, &snapshot.widths, &snapshot.active);
        mesh.commit_widths(snapshot.widths, snapshot.active, area);
        Ok(mesh)
    }
}

/// Recreate the node table with its main and outer flags.
fn restore_store(snapshot: &MeshSnapshot) -> Result<NodeStore, SnapshotError> {
    if !snapshot.main_nodes.windows(2).all(|pair| pair[0] < pair[1]) {
        return Err(inconsistent("main nodes are not in ascending order"));
    }
    let main: BTreeSet<NodeId> = snapshot.main_nodes.iter().copied().collect();
    let mut store = NodeStore::new();
    for (index, &position) in snapshot.nodes.iter().enumerate() {
        let created = if main.contains(&NodeId::new(index)) {
            store.create_main_node(position)
        } else {
            store.create_node(position)
        };
        created.map_err(|error| inconsistent(error.to_string()))?;
    }
    if store.main_nodes().len() != main.len() {
        return Err(inconsistent("main node list names nodes that do not exist"));
    }
    for &node in &snapshot.outer_nodes {
        store
            .mark_outer(node)
            .map_err(|error| inconsistent(error.to_string()))?;
    }
    Ok(store)
}

/// Verify one beam record against the restored node table.
fn check_beam(
    store: &NodeStore,
    index: usize,
    record: &BeamRecord,
    divisions: usize,
) -> Result<(), SnapshotError> {
    if record.elements.len() != divisions {
        return Err(inconsistent(format!(
            "beam {index} has {} sub-beams, expected {divisions}",
            record.elements.len()
        )));
    }
    let chained = record
        .elements
        .windows(2)
        .all(|pair| pair[0][2] == pair[1][0]);
    let anchored = record.elements.first().map(|e| e[0]) == Some(record.start)
        && record.elements.last().map(|e| e[2]) == Some(record.end);
    if !chained || !anchored {
        return Err(inconsistent(format!("beam {index} is not a continuous chain")));
    }
    if let Some(node) = record
        .elements
        .iter()
        .flatten()
        .find(|node| !store.contains(**node))
    {
        return Err(inconsistent(format!("beam {index} uses unknown node {node}")));
    }
    if !record.length.is_finite() || record.length <= 0.0 {
        return Err(inconsistent(format!(
            "beam {index} has invalid length {}",
            record.length
        )));
    }
    Ok(())
}
