use std::fs::File;

use trussmesh::{force, point, Bracing, GridSpec, MeshSettings, WidthHistory};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A 4x2 grid with forward diagonals, pinned along the left edge
    let mut mesh = GridSpec::new(4.0, 2.0, (4, 2), Bracing::ForwardDiagonal)
        .build(MeshSettings::default())?;
    mesh.make_boundary(point(0.0, 0.0), 1, true)?;
    mesh.make_boundary(point(0.0, 0.0), 2, true)?;
    mesh.make_boundary(point(0.0, 2.0), 1, false)?;
    mesh.make_force(point(4.0, 1.0), force(0.0, -10.0))?;
    mesh.set_width_array(0.3)?;

    let history_path = std::env::temp_dir().join("pruning-demo.whst");
    if history_path.exists() {
        std::fs::remove_file(&history_path)?;
    }

    // Greedily drop one beam at a time, keeping every removal the rules accept
    let mut widths = mesh.widths().to_vec();
    for beam in 0..mesh.beam_count() {
        let mut candidate = widths.clone();
        candidate[beam] = 0.0;
        match mesh.set_width_array(candidate.clone()) {
            Ok(()) => {
                widths = candidate;
                WidthHistory::append_to_file(&history_path, &mesh.width_record())?;
                println!("dropped beam {beam:>2}: area {:.3}", mesh.mechanism_area());
            }
            Err(error) => println!("kept beam {beam:>2}: {error}"),
        }
    }

    println!(
        "{} of {} beams remain",
        mesh.active_beams().len(),
        mesh.beam_count()
    );
    if history_path.exists() {
        let history = WidthHistory::load(&history_path)?;
        println!("{} accepted designs in {}", history.len(), history_path.display());
    }

    let snapshot_path = std::env::temp_dir().join("pruning-demo.json");
    mesh.snapshot().write_json(File::create(&snapshot_path)?)?;
    println!("final mesh saved to {}", snapshot_path.display());

    Ok(())
}
