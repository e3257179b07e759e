// src/config.rs
//
// TOML configuration for a synthetic-data run: mesh, model, problem,
// survey geometry and noise.

use crate::discretization::generator::{create_flat_3d_mesh, create_regular_2d_grid, create_uniform_line_mesh};
use crate::discretization::mesh::Mesh;
use crate::model::{MappedModel, Mapping, Model};
use crate::problem::ProblemError;
use crate::problem::diffusion::{DiffusionConfig, PointSource};
use crate::survey::SurveyGeometry;
use nalgebra::DVector;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Configuration Types
// =============================================================================

/// Root configuration. Every section falls back to [`SimulationConfig::default`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// `env_logger` filter used when `RUST_LOG` is unset
    pub log_level: Option<String>,
    /// Directory the survey CSV and run summary are written to
    pub output_dir: PathBuf,
    pub mesh: MeshConfig,
    pub model: ModelConfig,
    pub problem: DiffusionConfig,
    pub survey: SurveyGeometry,
    pub noise: NoiseConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeshConfig {
    /// Uniform cells along x.
    Line {
        length: f64,
        cells: usize,
        #[serde(default = "default_cross_section")]
        cross_section: f64,
    },
    /// Voronoi cells from a regular 2D grid of generators, extruded in z.
    Voronoi {
        width: [f64; 2],
        nx: usize,
        ny: usize,
        #[serde(default = "default_cross_section")]
        thickness: f64,
    },
}

fn default_cross_section() -> f64 {
    1.0
}

/// An interval along x where the model takes `value` instead of the background.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Anomaly {
    pub from: f64,
    pub to: f64,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ModelConfig {
    /// One mapping gives a single model; several are chained, last applied first.
    #[serde(default = "default_mappings")]
    pub mappings: Vec<Mapping>,
    #[serde(default)]
    pub background: f64,
    #[serde(default)]
    pub anomalies: Vec<Anomaly>,
}

fn default_mappings() -> Vec<Mapping> {
    vec![Mapping::Exp]
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Relative standard deviation of the added noise
    pub std: f64,
    pub seed: u64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self { std: 0.05, seed: 42 }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            mappings: default_mappings(),
            background: 0.0,
            anomalies: vec![Anomaly {
                from: 0.4,
                to: 0.6,
                value: std::f64::consts::LN_10,
            }],
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            output_dir: PathBuf::from("output"),
            mesh: MeshConfig::Line {
                length: 1.0,
                cells: 50,
                cross_section: 1.0,
            },
            model: ModelConfig::default(),
            problem: DiffusionConfig {
                sources: vec![
                    PointSource { cell: 10, strength: 1.0 },
                    PointSource { cell: 39, strength: -1.0 },
                ],
                ..DiffusionConfig::default()
            },
            survey: SurveyGeometry::cells((2..50).step_by(4).collect()),
            noise: NoiseConfig::default(),
        }
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl SimulationConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mesh.validate()?;
        if self.model.mappings.is_empty() {
            return Err(ConfigError::Invalid("model needs at least one mapping".into()));
        }
        for a in &self.model.anomalies {
            if !(a.from < a.to) {
                return Err(ConfigError::Invalid(format!(
                    "anomaly interval [{}, {}] is empty",
                    a.from, a.to
                )));
            }
        }
        if !(self.noise.std.is_finite() && self.noise.std >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "noise std must be finite and non-negative, got {}",
                self.noise.std
            )));
        }
        Ok(())
    }
}

impl MeshConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let ok = match *self {
            MeshConfig::Line {
                length,
                cells,
                cross_section,
            } => length > 0.0 && cells > 0 && cross_section > 0.0,
            MeshConfig::Voronoi {
                width,
                nx,
                ny,
                thickness,
            } => width[0] > 0.0 && width[1] > 0.0 && nx > 0 && ny > 0 && thickness > 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!("degenerate mesh: {self:?}")))
        }
    }

    pub fn build(&self) -> Mesh {
        match *self {
            MeshConfig::Line {
                length,
                cells,
                cross_section,
            } => create_uniform_line_mesh(length, cells, cross_section),
            MeshConfig::Voronoi {
                width,
                nx,
                ny,
                thickness,
            } => {
                let points = create_regular_2d_grid(width, nx, ny);
                create_flat_3d_mesh(&points, width, thickness)
            }
        }
    }
}

impl ModelConfig {
    pub fn build(&self, mesh: Arc<Mesh>) -> Result<Model, ProblemError> {
        match self.mappings.as_slice() {
            [mapping] => Ok(Model::mapped(*mapping, mesh)),
            mappings => Model::combo(
                mappings
                    .iter()
                    .map(|m| MappedModel::new(*m, Arc::clone(&mesh)))
                    .collect(),
            ),
        }
    }

    /// Model parameters per cell: the background, overwritten inside anomalies.
    pub fn parameters(&self, mesh: &Mesh) -> DVector<f64> {
        DVector::from_iterator(
            mesh.n_cells(),
            mesh.cells.iter().map(|cell| {
                let x = cell.centroid[0];
                self.anomalies
                    .iter()
                    .rev()
                    .find(|a| a.from <= x && x <= a.to)
                    .map_or(self.background, |a| a.value)
            }),
        )
    }
}

// =============================================================================
// Default Configuration
// =============================================================================

/// Returns a documented configuration file equivalent to the defaults.
pub fn default_config_template() -> &'static str {
    r#"# Synthetic survey configuration

log_level = "info"
output_dir = "output"

[mesh]
type = "line"
length = 1.0
cells = 50
# cross_section = 1.0

# [mesh]
# type = "voronoi"
# width = [1.0, 1.0]
# nx = 10
# ny = 10

[model]
# log-conductivity; combine several with e.g. [{ type = "scale", factor = 2.0 }, { type = "exp" }]
mappings = [{ type = "exp" }]
background = 0.0
anomalies = [{ from = 0.4, to = 0.6, value = 2.302585092994046 }]

[problem]
sources = [{ cell = 10, strength = 1.0 }, { cell = 39, strength = -1.0 }]
boundary = { type = "dirichlet", value = 0.0 }
# per-face overrides picked by outward normal; at least one face must stay Dirichlet
# boundary_rules = [{ normal = [1.0, 0.0, 0.0], condition = { type = "neumann", flux = 0.0 } }]
# model_requirement = { mapping = "exp" }

[survey]
receivers = { cells = [2, 6, 10, 14, 18, 22, 26, 30, 34, 38, 42, 46] }
eps = 1e-5

[noise]
std = 0.05
seed = 42
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MappingKind;
    use crate::physics::bc::{BoundaryCondition, BoundaryRule};
    use crate::survey::Receivers;

    #[test]
    fn template_matches_defaults() {
        let parsed = SimulationConfig::from_toml(default_config_template()).unwrap();
        let defaults = SimulationConfig::default();

        assert_eq!(parsed.mesh, defaults.mesh);
        assert_eq!(parsed.model, defaults.model);
        assert_eq!(parsed.problem, defaults.problem);
        assert_eq!(parsed.survey, defaults.survey);
        assert_eq!(parsed.noise, defaults.noise);
        assert_eq!(parsed.log_level.as_deref(), Some("info"));
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = SimulationConfig::from_toml("").unwrap();
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.noise.seed, 42);
        assert_eq!(config.mesh.build().n_cells(), 50);
    }

    #[test]
    fn parses_combo_model_and_boundary_rules() {
        let config = SimulationConfig::from_toml(
            r#"
            [mesh]
            type = "line"
            length = 2.0
            cells = 8

            [model]
            mappings = [{ type = "exp" }, { type = "scale", factor = 0.5 }]

            [problem]
            sources = [{ cell = 3, strength = 2.0 }]
            boundary_rules = [{ normal = [1.0, 0.0, 0.0], condition = { type = "neumann", flux = 0.0 } }]

            [survey]
            receivers = { locations = [[0.1, 0.0, 0.0], [1.9, 0.0, 0.0]] }
            "#,
        )
        .unwrap();

        assert_eq!(config.problem.boundary, BoundaryCondition::Dirichlet { value: 0.0 });
        assert_eq!(
            config.problem.boundary_rules,
            vec![BoundaryRule {
                normal: [1.0, 0.0, 0.0],
                condition: BoundaryCondition::Neumann { flux: 0.0 },
            }]
        );
        assert!(matches!(config.survey.receivers, Receivers::Locations(ref l) if l.len() == 2));

        let mesh = Arc::new(config.mesh.build());
        let model = config.model.build(mesh).unwrap();
        assert_eq!(model.to_string(), "combo[exp, scale]");
        match model {
            Model::Combo(ref combo) => assert_eq!(combo.leading().mapping().kind(), MappingKind::Exp),
            Model::Single(_) => panic!("expected a combo model"),
        }
    }

    #[test]
    fn anomalies_overwrite_background() {
        let mesh = create_uniform_line_mesh(1.0, 10, 1.0);
        let model = ModelConfig {
            mappings: vec![Mapping::Identity],
            background: 1.0,
            anomalies: vec![Anomaly {
                from: 0.3,
                to: 0.5,
                value: 4.0,
            }],
        };
        let m = model.parameters(&mesh);

        assert_eq!(m[3], 4.0);
        assert_eq!(m[4], 4.0);
        assert_eq!(m[2], 1.0);
        assert_eq!(m[5], 1.0);
    }

    #[test]
    fn rejects_invalid_values() {
        let negative_std = SimulationConfig::from_toml("[noise]\nstd = -0.1\n");
        assert!(matches!(negative_std, Err(ConfigError::Invalid(_))));

        let no_cells = SimulationConfig::from_toml("[mesh]\ntype = \"line\"\nlength = 1.0\ncells = 0\n");
        assert!(matches!(no_cells, Err(ConfigError::Invalid(_))));

        let bad_toml = SimulationConfig::from_toml("[noise\n");
        assert!(matches!(bad_toml, Err(ConfigError::Parse(_))));
    }
}
