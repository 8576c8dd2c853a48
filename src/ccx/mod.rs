//! Running CalculiX on a mesh and reading back its results.
//!
//! [`Calculix`] writes the deck produced by [`write_input`] into a scratch
//! directory named after a caller-supplied token, runs the solver there and
//! parses the `.frd` file with [`read_results`]. Anything else able to turn a
//! mesh into [`SolverResults`] can stand in for it through the [`Solve`] trait.

mod input;
mod results;

pub use input::write_input;
pub use results::{read_results, ResultBlock, SolverResults};

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::errors::SolverError;
use crate::mesh::Mesh;
use crate::settings::SolverConfig;

/// How often a solver with a deadline is polled.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Something that can solve the active topology of a mesh.
pub trait Solve {
    /// Solve `mesh`; `token` names the run and must be unique among concurrent runs.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] when the run fails or its results are unreadable.
    fn solve(&self, mesh: &Mesh, token: &str) -> Result<SolverResults, SolverError>;
}

/// The CalculiX `ccx` executable driven through scratch directories.
#[derive(Clone, Debug, Default)]
pub struct Calculix {
    /// Executable, scratch location and run options.
    config: SolverConfig,
}

impl Calculix {
    /// Wrap a solver configuration.
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// The configuration runs are made with.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Scratch directory used for `token`.
    #[must_use]
    pub fn scratch_dir(&self, token: &str) -> PathBuf {
        self.config.work_dir.join(token)
    }

    /// Write the deck into `dir`, run the solver there and read its results.
    fn run_in(&self, dir: &Path, mesh: &Mesh, token: &str) -> Result<SolverResults, SolverError> {
        let deck_path = dir.join(format!("{token}.inp"));
        let mut deck = BufWriter::new(File::create(&deck_path)?);
        write_input(mesh, self.config.nonlinear, &mut deck)?;
        deck.flush()?;

        let log = File::create(dir.join(format!("{token}.log")))?;
        let mut command = Command::new(&self.config.executable);
        command
            .arg(token)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(log);
        if let Some(threads) = self.config.threads {
            command.env("OMP_NUM_THREADS", threads.to_string());
        }

        info!(
            "running {} on {} ({} active beams)",
            self.config.executable.display(),
            deck_path.display(),
            mesh.active_beams().len()
        );
        let started = Instant::now();
        let mut child = command.spawn()?;
        let status = wait_for(&mut child, self.config.timeout())?;
        if !status.success() {
            return Err(SolverError::Failed {
                program: self.config.executable.display().to_string(),
                status,
            });
        }
        debug!("solver {token} finished in {:?}", started.elapsed());

        let results_path = dir.join(format!("{token}.frd"));
        if !results_path.is_file() {
            return Err(SolverError::MissingResults(results_path));
        }
        read_results(BufReader::new(File::open(&results_path)?))
    }
}

impl Solve for Calculix {
    fn solve(&self, mesh: &Mesh, token: &str) -> Result<SolverResults, SolverError> {
        let dir = self.scratch_dir(token);
        fs::create_dir_all(&dir)?;
        let outcome = self.run_in(&dir, mesh, token);
        if !self.config.keep_files {
            if let Err(error) = fs::remove_dir_all(&dir) {
                warn!("could not remove {}: {error}", dir.display());
            }
        }
        outcome
    }
}

/// Wait for `child`, killing it once `timeout` has elapsed.
fn wait_for(child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus, SolverError> {
    let Some(limit) = timeout else {
        return Ok(child.wait()?);
    };
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        let now = Instant::now();
        if now >= deadline {
            if let Err(error) = child.kill() {
                warn!("could not kill solver process {}: {error}", child.id());
            }
            child.wait()?;
            return Err(SolverError::Timeout(limit));
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;
    use crate::generator::{Bracing, GridSpec};
    use crate::settings::MeshSettings;
    use crate::store::NodeId;

    const FRD: &str = concat!(
        " -4  DISP        4    1\n",
        " -5  D1          1    2    1    0\n",
        " -5  D2          1    2    2    0\n",
        " -5  D3          1    2    3    0\n",
        " -5  ALL         1    2    0    0    1ALL\n",
        " -1         1 1.00000E-01-2.00000E-01 0.00000E+00\n",
        " -3\n",
    );

    /// Fresh directory holding a fake solver script with the given body.
    fn fake_solver(name: &str, body: &str) -> (PathBuf, SolverConfig) {
        let root = std::env::temp_dir().join(format!("trussmesh-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).expect("temp dir");
        let script = root.join("fake-ccx");
        fs::write(&script, format!("#!/bin/sh\n{body}\n")).expect("write script");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");
        let config = SolverConfig {
            executable: script,
            work_dir: root.join("runs"),
            ..SolverConfig::default()
        };
        (root, config)
    }

    fn mesh() -> Mesh {
        let mut mesh = GridSpec::new(1.0, 1.0, (1, 1), Bracing::None)
            .build(MeshSettings::default())
            .expect("valid grid");
        mesh.set_width_array(0.2).expect("finite width");
        mesh
    }

    #[test]
    fn successful_run_reads_results_and_cleans_up() {
        let body = format!("cat > \"$1.frd\" <<'EOF'\n{FRD}EOF");
        let (root, config) = fake_solver("ok", &body);
        let solver = Calculix::new(config);

        let results = solver.solve(&mesh(), "run-1").expect("fake solver succeeds");
        let moved = results.displacement(NodeId::new(0)).expect("node 1 reported");
        assert_eq!((moved.x, moved.y), (0.1, -0.2));
        assert!(!solver.scratch_dir("run-1").exists());
        fs::remove_dir_all(root).expect("cleanup");
    }

    #[test]
    fn kept_files_include_the_deck() {
        let body = format!("cat > \"$1.frd\" <<'EOF'\n{FRD}EOF");
        let (root, mut config) = fake_solver("keep", &body);
        config.keep_files = true;
        let solver = Calculix::new(config);

        solver.solve(&mesh(), "kept").expect("fake solver succeeds");
        let deck = fs::read_to_string(solver.scratch_dir("kept").join("kept.inp"))
            .expect("deck kept");
        assert!(deck.starts_with("*node, nset=nall"));
        fs::remove_dir_all(root).expect("cleanup");
    }

    #[test]
    fn failures_are_reported_distinctly() {
        let (root, config) = fake_solver("fail", "exit 3");
        let error = Calculix::new(config).solve(&mesh(), "bad").expect_err("exit 3");
        assert!(matches!(error, SolverError::Failed { status, .. } if status.code() == Some(3)));

        let (other, config) = fake_solver("silent", "exit 0");
        let error = Calculix::new(config).solve(&mesh(), "quiet").expect_err("no frd");
        assert!(matches!(error, SolverError::MissingResults(path) if path.ends_with("quiet.frd")));

        fs::remove_dir_all(root).expect("cleanup");
        fs::remove_dir_all(other).expect("cleanup");
    }

    #[test]
    fn slow_solvers_are_killed() {
        let (root, mut config) = fake_solver("slow", "exec sleep 10");
        config.timeout_secs = Some(0.25);
        let started = Instant::now();
        let error = Calculix::new(config).solve(&mesh(), "slow").expect_err("timed out");
        assert!(matches!(
            error,
            SolverError::Timeout(limit) if limit == Duration::from_millis(250)
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
        fs::remove_dir_all(root).expect("cleanup");
    }
}
