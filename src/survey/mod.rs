//! Acquisition geometry and the data containers of a survey.
//!
//! A survey knows where data are recorded (`receiver_cells`) and carries
//! true, observed and uncertainty vectors. It does not know which problem it
//! is paired with; that relation lives in
//! [`PairingRegistry`](crate::pairing::PairingRegistry).

use crate::discretization::mesh::Mesh;
use crate::problem::{Fields, ProblemError, error::ensure_len};
use log::warn;
use nalgebra::{DMatrix, DVector};
use serde::Deserialize;
use std::fmt;

const DEFAULT_EPS: f64 = 1e-5;

/// The survey capability a problem declares.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyKind {
    /// Any survey.
    #[default]
    Base,
    /// Point samples of the potential field.
    Potential,
}

impl SurveyKind {
    /// Whether a survey of this kind can be paired where `required` is declared.
    pub fn satisfies(self, required: SurveyKind) -> bool {
        required == SurveyKind::Base || self == required
    }
}

impl fmt::Display for SurveyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurveyKind::Base => f.write_str("base survey"),
            SurveyKind::Potential => f.write_str("potential survey"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Receivers {
    /// Receivers placed directly on mesh cells.
    Cells(Vec<usize>),
    /// Receivers at arbitrary points, snapped to the nearest cell centroid.
    Locations(Vec<[f64; 3]>),
}

/// Geometry options used to build a survey.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SurveyGeometry {
    pub receivers: Receivers,
    /// Noise floor added to the data weights.
    #[serde(default = "default_eps")]
    pub eps: f64,
}

fn default_eps() -> f64 {
    DEFAULT_EPS
}

impl SurveyGeometry {
    pub fn cells(cells: Vec<usize>) -> Self {
        Self {
            receivers: Receivers::Cells(cells),
            eps: DEFAULT_EPS,
        }
    }

    pub fn locations(locations: Vec<[f64; 3]>) -> Self {
        Self {
            receivers: Receivers::Locations(locations),
            eps: DEFAULT_EPS,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Survey {
    kind: SurveyKind,
    receiver_cells: Vec<usize>,
    n_cells: usize,
    pub eps: f64,
    /// The model the synthetic data were generated from.
    pub mtrue: Option<DVector<f64>>,
    pub dtrue: Option<DVector<f64>>,
    pub dobs: Option<DVector<f64>>,
    pub std: Option<DVector<f64>>,
}

impl Survey {
    /// Resolves `geometry` on `mesh`. Fails if a receiver cell is out of
    /// range, if there are no receivers, or if `eps` is negative.
    pub fn new(kind: SurveyKind, geometry: &SurveyGeometry, mesh: &Mesh) -> Result<Self, ProblemError> {
        let n_cells = mesh.n_cells();
        let receiver_cells = match &geometry.receivers {
            Receivers::Cells(cells) => {
                if let Some(bad) = cells.iter().find(|c| **c >= n_cells) {
                    return Err(ProblemError::InvalidConfig(format!(
                        "receiver cell {bad} is outside a mesh of {n_cells} cells"
                    )));
                }
                cells.clone()
            }
            Receivers::Locations(points) => points
                .iter()
                .map(|p| {
                    mesh.nearest_cell(*p).ok_or_else(|| {
                        ProblemError::InvalidConfig("cannot place receivers on an empty mesh".into())
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        if receiver_cells.is_empty() {
            return Err(ProblemError::InvalidConfig("a survey needs at least one receiver".into()));
        }
        if !(geometry.eps >= 0.0) {
            return Err(ProblemError::InvalidConfig(format!(
                "eps must be non-negative, got {}",
                geometry.eps
            )));
        }

        let mut sorted = receiver_cells.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != receiver_cells.len() {
            warn!(
                "{} receivers share a cell with another receiver",
                receiver_cells.len() - sorted.len()
            );
        }

        Ok(Self {
            kind,
            receiver_cells,
            n_cells,
            eps: geometry.eps,
            mtrue: None,
            dtrue: None,
            dobs: None,
            std: None,
        })
    }

    pub fn kind(&self) -> SurveyKind {
        self.kind
    }

    pub fn receiver_cells(&self) -> &[usize] {
        &self.receiver_cells
    }

    /// Number of data.
    pub fn nd(&self) -> usize {
        self.receiver_cells.len()
    }

    /// Number of mesh cells the projection acts on.
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    pub fn is_synthetic(&self) -> bool {
        self.mtrue.is_some()
    }

    /// The projection `P`, one row per datum.
    pub fn projection(&self) -> DMatrix<f64> {
        let mut p = DMatrix::zeros(self.nd(), self.n_cells);
        for (row, cell) in self.receiver_cells.iter().enumerate() {
            p[(row, *cell)] = 1.0;
        }
        p
    }

    /// `P u` for a cell vector `u`.
    pub fn project(&self, u: &DVector<f64>) -> Result<DVector<f64>, ProblemError> {
        ensure_len(self.n_cells, u.len())?;
        Ok(DVector::from_iterator(
            self.nd(),
            self.receiver_cells.iter().map(|c| u[*c]),
        ))
    }

    /// `P^T v` for a data vector `v`.
    pub fn project_transpose(&self, v: &DVector<f64>) -> Result<DVector<f64>, ProblemError> {
        ensure_len(self.nd(), v.len())?;
        let mut out = DVector::zeros(self.n_cells);
        for (row, cell) in self.receiver_cells.iter().enumerate() {
            out[*cell] += v[row];
        }
        Ok(out)
    }

    pub fn project_fields(&self, fields: &Fields) -> Result<DVector<f64>, ProblemError> {
        self.project(&fields.u)
    }

    /// `dpred - dobs` for already computed predicted data.
    pub fn residual(&self, dpred: &DVector<f64>) -> Result<DVector<f64>, ProblemError> {
        let dobs = self.dobs.as_ref().ok_or(ProblemError::MissingData("dobs"))?;
        ensure_len(dobs.len(), dpred.len())?;
        Ok(dpred - dobs)
    }

    /// Data weights `1 / (std |dobs| + eps)`.
    pub fn weights(&self) -> Result<DVector<f64>, ProblemError> {
        let dobs = self.dobs.as_ref().ok_or(ProblemError::MissingData("dobs"))?;
        let std = self.std.as_ref().ok_or(ProblemError::MissingData("std"))?;
        ensure_len(dobs.len(), std.len())?;
        Ok(dobs.zip_map(std, |d, s| 1.0 / (s * d.abs() + self.eps)))
    }
}
