//! Regular rectangular grid meshes with optional bracing.

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::MeshEditError;
use crate::geometry::point;
use crate::mesh::Mesh;
use crate::settings::MeshSettings;
use crate::store::NodeId;

/// Bracing added inside every grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bracing {
    /// Horizontal and vertical beams only.
    #[default]
    None,
    /// One diagonal per cell from bottom-left to top-right (`"fd"`).
    ForwardDiagonal,
    /// One diagonal per cell from bottom-right to top-left (`"bd"`).
    BackwardDiagonal,
    /// Four beams per cell meeting at a new centre main node (`"x"`).
    Crossed,
}

impl FromStr for Bracing {
    type Err = MeshEditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(Bracing::None),
            "fd" => Ok(Bracing::ForwardDiagonal),
            "bd" => Ok(Bracing::BackwardDiagonal),
            "x" => Ok(Bracing::Crossed),
            other => Err(MeshEditError::UnknownBracing(other.to_owned())),
        }
    }
}

impl fmt::Display for Bracing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Bracing::None => "none",
            Bracing::ForwardDiagonal => "fd",
            Bracing::BackwardDiagonal => "bd",
            Bracing::Crossed => "x",
        })
    }
}

/// Parameters of a rectangular grid mesh with its lower-left corner at the origin.
///
/// # Examples
/// ```
/// use trussmesh::{Bracing, GridSpec, MeshSettings};
///
/// let mesh = GridSpec::new(10.0, 5.0, (4, 2), Bracing::Crossed)
///     .build(MeshSettings::default())
///     .expect("valid grid");
/// assert_eq!(mesh.main_nodes().len(), 15 + 8);
/// assert_eq!(mesh.beam_count(), 22 + 4 * 8);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Extent along X.
    pub length: f64,
    /// Extent along Y.
    pub height: f64,
    /// Number of cells along X and Y.
    pub divisions: (usize, usize),
    /// Bracing inside each cell.
    pub bracing: Bracing,
}

impl GridSpec {
    /// Describe a grid.
    #[must_use]
    pub const fn new(
        length: f64,
        height: f64,
        divisions: (usize, usize),
        bracing: Bracing,
    ) -> Self {
        Self {
            length,
            height,
            divisions,
            bracing,
        }
    }

    /// Number of segmented beams [`GridSpec::build`] creates.
    #[must_use]
    pub fn expected_beam_count(&self) -> usize {
        let (nx, ny) = self.divisions;
        let frame = nx * (ny + 1) + ny * (nx + 1);
        match self.bracing {
            Bracing::None => frame,
            Bracing::ForwardDiagonal | Bracing::BackwardDiagonal => frame + nx * ny,
            Bracing::Crossed => frame + 4 * nx * ny,
        }
    }

    /// Number of main nodes [`GridSpec::build`] creates.
    #[must_use]
    pub fn expected_main_node_count(&self) -> usize {
        let (nx, ny) = self.divisions;
        let corners = (nx + 1) * (ny + 1);
        match self.bracing {
            Bracing::Crossed => corners + nx * ny,
            _ => corners,
        }
    }

    /// Reject grids without cells or with non-positive extents.
    fn validate(&self) -> Result<(), MeshEditError> {
        let (nx, ny) = self.divisions;
        if nx == 0 || ny == 0 {
            return Err(MeshEditError::InvalidGrid(format!(
                "divisions must be at least 1 in both directions (received ({nx}, {ny}))"
            )));
        }
        for (name, value) in [("length", self.length), ("height", self.height)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(MeshEditError::InvalidGrid(format!(
                    "{name} must be positive and finite (received {value})"
                )));
            }
        }
        Ok(())
    }

    /// Generate the mesh.
    ///
    /// Grid main nodes are created first in row-major order (y outer, x inner),
    /// so grid node `(i, j)` has id `i + j * (nx + 1)`. Beams are then created
    /// cell by cell in the same order; crossed bracing interleaves its centre
    /// nodes with the subdivision nodes of the beams.
    ///
    /// # Errors
    ///
    /// Returns [`MeshEditError::InvalidGrid`] for zero divisions or non-positive
    /// extents and the errors of [`Mesh::new`] for invalid settings.
    pub fn build(&self, settings: MeshSettings) -> Result<Mesh, MeshEditError> {
        self.validate()?;
        let (nx, ny) = self.divisions;
        let mut mesh = Mesh::new(settings)?;

        for j in 0..=ny {
            for i in 0..=nx {
                #[allow(clippy::cast_precision_loss)]
                let position = point(
                    self.length * i as f64 / nx as f64,
                    self.height * j as f64 / ny as f64,
                );
                let node = mesh.create_main_node(position)?;
                if i == 0 || i == nx || j == 0 || j == ny {
                    mesh.mark_outer(node)?;
                }
            }
        }

        let row = nx + 1;
        let grid = |index: usize| NodeId::new(index);
        for j in 0..=ny {
            for i in 0..=nx {
                let current = i + j * row;
                if i < nx {
                    mesh.create_segmented_beam(grid(current), grid(current + 1))?;
                }
                if j < ny {
                    mesh.create_segmented_beam(grid(current), grid(current + row))?;
                }
                match self.bracing {
                    Bracing::ForwardDiagonal if i < nx && j < ny => {
                        mesh.create_segmented_beam(grid(current), grid(current + row + 1))?;
                    }
                    Bracing::BackwardDiagonal if i > 0 && j < ny => {
                        mesh.create_segmented_beam(grid(current), grid(current + row - 1))?;
                    }
                    Bracing::Crossed if i < nx && j < ny => {
                        self.add_cross(&mut mesh, current, row)?;
                    }
                    _ => {}
                }
            }
        }

        debug!(
            "generated {nx}x{ny} grid ({} bracing): {} nodes, {} main, {} beams",
            self.bracing,
            mesh.node_count(),
            mesh.main_nodes().len(),
            mesh.beam_count()
        );
        Ok(mesh)
    }

    /// Centre node of the cell whose lower-left corner is `corner`, joined to all
    /// four corners.
    fn add_cross(&self, mesh: &mut Mesh, corner: usize, row: usize) -> Result<(), MeshEditError> {
        let lower_left = NodeId::new(corner);
        let lower_right = NodeId::new(corner + 1);
        let upper_left = NodeId::new(corner + row);
        let upper_right = NodeId::new(corner + row + 1);

        let centre_position = mesh
            .point(lower_left)
            .zip(mesh.point(upper_right))
            .map(|(a, b)| a.midpoint(b))
            .ok_or(MeshEditError::UnknownNode(upper_right))?;
        let centre = mesh.create_main_node(centre_position)?;

        mesh.create_segmented_beam(lower_left, centre)?;
        mesh.create_segmented_beam(centre, upper_right)?;
        mesh.create_segmented_beam(upper_left, centre)?;
        mesh.create_segmented_beam(centre, lower_right)?;
        Ok(())
    }
}
