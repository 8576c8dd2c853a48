//! CalculiX input deck for the active topology of a mesh.

use std::io::{self, Write};

use log::trace;

use crate::mesh::Mesh;
use crate::store::NodeId;

/// Name of the element set holding every beam.
const ALL_ELEMENTS: &str = "elall";
/// Name of the node set holding every active node.
const ALL_NODES: &str = "nall";
/// Name of the single material of the deck.
const MATERIAL: &str = "mesh_material";

/// Element set name of the `k`-th active beam.
fn elset_name(k: usize) -> String {
    format!("b_{k}")
}

/// Write the deck for the mesh's active topology.
///
/// Node and element numbers are one-based. Every active beam gets its own
/// element set so that it can carry its own section width. Boundary conditions
/// on nodes that are no longer part of the structure are left out.
///
/// # Errors
///
/// Returns any error raised by `out`.
///
/// # Examples
/// ```
/// use trussmesh::ccx::write_input;
/// use trussmesh::{Bracing, GridSpec, MeshSettings};
///
/// let mut mesh = GridSpec::new(1.0, 1.0, (1, 1), Bracing::None)
///     .build(MeshSettings::default())
///     .expect("valid grid");
/// mesh.set_width_array(0.5).expect("finite width");
///
/// let mut deck = Vec::new();
/// write_input(&mesh, false, &mut deck).expect("writing to memory cannot fail");
/// let deck = String::from_utf8(deck).expect("ascii output");
/// assert!(deck.starts_with("*node, nset=nall\n"));
/// assert!(deck.ends_with("*end step\n"));
/// ```
pub fn write_input<W: Write>(mesh: &Mesh, nonlinear: bool, out: &mut W) -> io::Result<()> {
    let active_nodes = mesh.active_nodes();
    let divisions = mesh.divisions_per_beam();
    let settings = mesh.settings();

    writeln!(out, "*node, nset={ALL_NODES}")?;
    for &node in &active_nodes {
        if let Some(p) = mesh.point(node) {
            writeln!(out, "{}, {}, {}", node.solver_number(), p.x, p.y)?;
        }
    }

    let active: Vec<_> = mesh
        .beams()
        .filter(|(id, _)| mesh.is_active(*id))
        .collect();

    for (k, (_, beam)) in active.iter().enumerate() {
        writeln!(out, "*element, type=b32, elset={}", elset_name(k))?;
        for (i, [a, b, c]) in beam.elements().iter().enumerate() {
            writeln!(
                out,
                "{}, {}, {}, {}",
                1 + i + k * divisions,
                a.solver_number(),
                b.solver_number(),
                c.solver_number()
            )?;
        }
    }
    writeln!(out, "*elset, elset={ALL_ELEMENTS}")?;
    for k in 0..active.len() {
        writeln!(out, "{},", elset_name(k))?;
    }

    writeln!(out, "*material, name={MATERIAL}")?;
    writeln!(out, "*elastic, type=iso")?;
    writeln!(
        out,
        "{}, {}",
        settings.material.elastic_modulus, settings.material.poisson_ratio
    )?;

    let widths = mesh.widths();
    for (k, (id, _)) in active.iter().enumerate() {
        writeln!(
            out,
            "*beam section,elset={},material={MATERIAL},section=rect",
            elset_name(k)
        )?;
        writeln!(out, "{}, {}", settings.section_height, widths[id.index()])?;
        writeln!(out, "0.d0,0.d0,1.d0")?;
    }

    // Planar model: out-of-plane translation and rotation are fixed everywhere.
    writeln!(out, "*boundary")?;
    for &node in &active_nodes {
        writeln!(out, "{}, 3,5", node.solver_number())?;
    }

    writeln!(out, "*boundary")?;
    for boundary in mesh.conditions().boundaries() {
        if active_nodes.contains(&boundary.node) {
            writeln!(
                out,
                "{}, {}",
                boundary.node.solver_number(),
                boundary.constraint.solver_dof()
            )?;
        } else {
            trace!("skipping boundary on detached node {}", boundary.node);
        }
    }

    if nonlinear {
        writeln!(out, "*step, nlgeom")?;
    } else {
        writeln!(out, "*step")?;
    }
    writeln!(out, "*static")?;

    let moved = mesh.conditions().initial_displacements();
    if !moved.is_empty() {
        writeln!(out, "*boundary")?;
        for prescribed in moved {
            let d = prescribed.displacement;
            write_components(out, prescribed.node, d.x, d.y, |out, node, dof, value| {
                writeln!(out, "{node}, {dof}, {dof}, {value}")
            })?;
        }
    }

    writeln!(out, "*cload")?;
    for load in mesh.conditions().forces() {
        write_components(out, load.node, load.force.x, load.force.y, |out, node, dof, value| {
            writeln!(out, "{node}, {dof}, {value}")
        })?;
    }

    writeln!(out, "*el print, elset={ALL_ELEMENTS}")?;
    writeln!(out, "s")?;
    writeln!(out, "*node file, output=2d, nset={ALL_NODES}")?;
    writeln!(out, "u")?;
    writeln!(out, "*el file, elset={ALL_ELEMENTS}")?;
    writeln!(out, "s,noe")?;
    writeln!(out, "*el print, elset={ALL_ELEMENTS}")?;
    writeln!(out, "evol")?;
    writeln!(out, "*end step")?;
    Ok(())
}

/// Emit the non-zero in-plane components of a nodal vector, y first.
fn write_components<W, F>(out: &mut W, node: NodeId, x: f64, y: f64, mut line: F) -> io::Result<()>
where
    W: Write,
    F: FnMut(&mut W, usize, u8, f64) -> io::Result<()>,
{
    if y != 0.0 {
        line(out, node.solver_number(), 2, y)?;
    }
    if x != 0.0 {
        line(out, node.solver_number(), 1, x)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{Bracing, GridSpec};
    use crate::geometry::{displacement, force};
    use crate::settings::MeshSettings;

    /// 1x1 grid with one sub-beam per beam: corners 0..4, beams
    /// 0:(0,1) 1:(0,2) 2:(1,3) 3:(2,3).
    fn square() -> Mesh {
        let settings = MeshSettings {
            divisions_per_beam: 1,
            ..MeshSettings::default()
        };
        GridSpec::new(2.0, 2.0, (1, 1), Bracing::None)
            .build(settings)
            .expect("valid grid")
    }

    fn deck(mesh: &Mesh, nonlinear: bool) -> String {
        let mut buffer = Vec::new();
        write_input(mesh, nonlinear, &mut buffer).expect("writing to memory cannot fail");
        String::from_utf8(buffer).expect("ascii output")
    }

    fn block<'a>(deck: &'a str, header: &str) -> Vec<&'a str> {
        deck.lines()
            .skip_while(|line| *line != header)
            .skip(1)
            .take_while(|line| !line.starts_with('*'))
            .collect()
    }

    #[test]
    fn nodes_and_elements_are_one_based() {
        let mut mesh = square();
        mesh.set_width_array(0.5).expect("finite width");
        let deck = deck(&mesh, false);

        let nodes = block(&deck, "*node, nset=nall");
        assert_eq!(nodes.len(), 8);
        assert_eq!(nodes[0], "1, 0, 0");
        assert_eq!(nodes[1], "2, 2, 0");

        assert_eq!(block(&deck, "*element, type=b32, elset=b_0"), vec!["1, 1, 5, 2"]);
        assert_eq!(block(&deck, "*element, type=b32, elset=b_3"), vec!["4, 3, 8, 4"]);
        assert_eq!(block(&deck, "*elset, elset=elall"), vec!["b_0,", "b_1,", "b_2,", "b_3,"]);
        assert!(deck.contains("*elastic, type=iso\n100000, 0.29\n"));
        assert!(deck.contains(
            "*beam section,elset=b_2,material=mesh_material,section=rect\n0.5, 0.5\n0.d0,0.d0,1.d0\n"
        ));
        assert!(deck.contains("*step\n*static\n"));
    }

    #[test]
    fn pruned_beams_and_their_nodes_are_left_out() {
        let settings = MeshSettings {
            divisions_per_beam: 1,
            ..MeshSettings::default()
        };
        // Beams 0:(0,1) 1:(0,2) 2:(0,3) 3:(1,3) 4:(2,3); dropping 0 and 3
        // leaves the triangle 0-2-3.
        let mut mesh = GridSpec::new(2.0, 2.0, (1, 1), Bracing::ForwardDiagonal)
            .build(settings)
            .expect("valid grid");
        mesh.make_boundary(NodeId::new(0), 1, true).expect("node exists");
        mesh.make_boundary(NodeId::new(1), 2, true).expect("node exists");
        mesh.make_boundary(NodeId::new(2), 2, true).expect("node exists");
        mesh.set_width_array(vec![0.0, 1.0, 1.0, 0.0, 1.0]).expect("feasible");
        let deck = deck(&mesh, true);

        let nodes = block(&deck, "*node, nset=nall");
        assert_eq!(nodes.len(), 6);
        assert!(!nodes.iter().any(|line| line.starts_with("2, ")));
        assert!(deck.contains("elset=b_2"));
        assert!(!deck.contains("elset=b_3"));
        let planar = block(&deck, "*boundary");
        assert_eq!(planar.len(), 6);
        assert!(planar.iter().all(|line| line.ends_with(", 3,5")));
        // The support on detached node 1 is skipped.
        assert!(deck.contains("*boundary\n1, 1\n3, 2\n*step, nlgeom\n"));
    }

    #[test]
    fn loads_and_prescribed_displacements_skip_zero_components() {
        let mut mesh = square();
        mesh.make_force(NodeId::new(3), force(0.0, -1000.0)).expect("node exists");
        mesh.make_force(NodeId::new(1), force(5.0, 2.0)).expect("node exists");
        mesh.move_node(NodeId::new(2), displacement(0.0, -0.5)).expect("node exists");
        mesh.set_width_array(1.0).expect("finite width");
        let deck = deck(&mesh, false);

        assert!(deck.contains("*static\n*boundary\n3, 2, 2, -0.5\n*cload\n"));
        assert_eq!(block(&deck, "*cload"), vec!["4, 2, -1000", "2, 2, 2", "2, 1, 5"]);
        assert!(deck.ends_with(
            "*el print, elset=elall\ns\n*node file, output=2d, nset=nall\nu\n\
             *el file, elset=elall\ns,noe\n*el print, elset=elall\nevol\n*end step\n"
        ));
    }
}
