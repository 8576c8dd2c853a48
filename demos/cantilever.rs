use trussmesh::{force, point, Bracing, Calculix, GridSpec, MeshSettings, Solve, SolverConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A braced cantilever, 4 long and 1 deep
    let mut mesh = GridSpec::new(4.0, 1.0, (4, 1), Bracing::Crossed)
        .build(MeshSettings::default())?;

    // Clamp the left edge and load the free tip
    for corner in [point(0.0, 0.0), point(0.0, 1.0)] {
        for code in 1..=3 {
            mesh.make_boundary(corner, code, false)?;
        }
    }
    let tip = mesh.make_force(point(4.0, 0.0), force(0.0, -50.0))?;

    // Uniform widths, then solve
    mesh.set_width_array(0.1)?;
    let solver = Calculix::new(SolverConfig {
        work_dir: std::env::temp_dir(),
        ..SolverConfig::default()
    });
    let results = solver.solve(&mesh, "cantilever")?;

    if let Some(deflection) = results.displacement(tip) {
        println!("tip deflection: ({:.4e}, {:.4e})", deflection.x, deflection.y);
    }
    println!("mechanism area: {:.3}", mesh.mechanism_area());

    Ok(())
}
