//! The forward-problem contract.
//!
//! A problem is a PDE `c(m, u) = 0`. Given the model `m` it yields the fields
//! `u(m)`; a paired survey observes them through a linear projection `P`, so
//! `d_pred = P u(m)`. Linearizing,
//!
//! ```text
//! J = P du/dm = -P (dc/du)^-1 dc/dm
//! ```
//!
//! Inversions never form `J`; they ask for `J v` ([`Problem::jvec`]) and
//! `J^T v` ([`Problem::jtvec`]). There is no generic fallback for either:
//! every concrete problem provides its own.

pub mod diffusion;
pub mod error;

pub use error::ProblemError;

use crate::discretization::mesh::Mesh;
use crate::model::{Model, ModelRequirement};
use crate::survey::{Survey, SurveyKind};
use nalgebra::DVector;

/// The solution `u(m)` over mesh cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Fields {
    pub u: DVector<f64>,
}

impl Fields {
    pub fn new(u: DVector<f64>) -> Self {
        Self { u }
    }

    pub fn len(&self) -> usize {
        self.u.len()
    }

    pub fn is_empty(&self) -> bool {
        self.u.is_empty()
    }
}

pub trait Problem {
    /// The model this problem was constructed with.
    fn model(&self) -> &Model;

    /// The kind of survey this problem can be paired with.
    fn survey_kind(&self) -> SurveyKind {
        SurveyKind::Base
    }

    fn mesh(&self) -> &Mesh {
        self.model().mesh()
    }

    /// Fields `u(m)`. `Ok(None)` means the problem does not compute fields.
    fn fields(&self, _m: &DVector<f64>) -> Result<Option<Fields>, ProblemError> {
        Ok(None)
    }

    /// `J v`. If `u` is `None` the fields are computed from `m`.
    fn jvec(
        &self,
        _survey: &Survey,
        _m: &DVector<f64>,
        _v: &DVector<f64>,
        _u: Option<&Fields>,
    ) -> Result<DVector<f64>, ProblemError> {
        Err(ProblemError::NotImplemented("jvec"))
    }

    /// `J^T v`. If `u` is `None` the fields are computed from `m`.
    fn jtvec(
        &self,
        _survey: &Survey,
        _m: &DVector<f64>,
        _v: &DVector<f64>,
        _u: Option<&Fields>,
    ) -> Result<DVector<f64>, ProblemError> {
        Err(ProblemError::NotImplemented("jtvec"))
    }

    /// Approximate `J v`; exact unless a problem has something cheaper.
    fn jvec_approx(
        &self,
        survey: &Survey,
        m: &DVector<f64>,
        v: &DVector<f64>,
        u: Option<&Fields>,
    ) -> Result<DVector<f64>, ProblemError> {
        self.jvec(survey, m, v, u)
    }

    /// Approximate `J^T v`; exact unless a problem has something cheaper.
    fn jtvec_approx(
        &self,
        survey: &Survey,
        m: &DVector<f64>,
        v: &DVector<f64>,
        u: Option<&Fields>,
    ) -> Result<DVector<f64>, ProblemError> {
        self.jtvec(survey, m, v, u)
    }
}

/// A problem with no forward operator. Everything but pairing falls through
/// to the trait defaults.
#[derive(Clone, Debug)]
pub struct BaseProblem {
    model: Model,
}

impl BaseProblem {
    pub fn new(model: Model) -> Result<Self, ProblemError> {
        Self::with_requirement(model, ModelRequirement::Any)
    }

    /// Fails with [`ProblemError::TypeMismatch`] if `model` does not meet
    /// `requirement`.
    pub fn with_requirement(model: Model, requirement: ModelRequirement) -> Result<Self, ProblemError> {
        requirement.check(&model)?;
        Ok(Self { model })
    }
}

impl Problem for BaseProblem {
    fn model(&self) -> &Model {
        &self.model
    }
}
