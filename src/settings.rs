//! Mesh-wide and solver configuration.
//!
//! Both structures deserialize from JSON with every field optional, falling back
//! to [`Default`] values for anything omitted.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Isotropic linear-elastic material.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Elastic modulus.
    pub elastic_modulus: f64,
    /// Poisson ratio.
    pub poisson_ratio: f64,
}

impl Material {
    /// Create a material from its elastic constants.
    #[must_use]
    pub const fn new(elastic_modulus: f64, poisson_ratio: f64) -> Self {
        Self {
            elastic_modulus,
            poisson_ratio,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(1.0e5, 0.29)
    }
}

/// Properties shared by every beam of a mesh.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    /// Number of sub-beam elements per segmented beam.
    pub divisions_per_beam: usize,
    /// Beam material.
    pub material: Material,
    /// Out-of-plane height of every beam cross-section.
    pub section_height: f64,
    /// Beams narrower than this are removed from the active topology.
    pub minimal_width: f64,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            divisions_per_beam: 4,
            material: Material::default(),
            section_height: 0.5,
            minimal_width: 0.05,
        }
    }
}

impl MeshSettings {
    /// Read settings from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] for malformed documents.
    ///
    /// # Examples
    /// ```
    /// use trussmesh::MeshSettings;
    ///
    /// let settings = MeshSettings::from_json(r#"{"divisions_per_beam": 2}"#)
    ///     .expect("valid json");
    /// assert_eq!(settings.divisions_per_beam, 2);
    /// assert_eq!(settings.minimal_width, MeshSettings::default().minimal_width);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// How to run the external CalculiX solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Solver executable, looked up on `PATH` when relative.
    pub executable: PathBuf,
    /// Directory under which per-evaluation scratch directories are created.
    pub work_dir: PathBuf,
    /// Request a geometrically nonlinear static step.
    pub nonlinear: bool,
    /// Keep scratch directories after the run.
    pub keep_files: bool,
    /// Value for `OMP_NUM_THREADS`, inherited from the environment when unset.
    pub threads: Option<usize>,
    /// Kill the solver after this many seconds.
    pub timeout_secs: Option<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("ccx"),
            work_dir: PathBuf::from("."),
            nonlinear: true,
            keep_files: false,
            threads: None,
            timeout_secs: None,
        }
    }
}

impl SolverConfig {
    /// Read a solver configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] for malformed documents.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Configured timeout, ignoring values that are not positive or do not
    /// fit a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}
