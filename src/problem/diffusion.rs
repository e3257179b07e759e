use super::error::ensure_len;
use super::{Fields, Problem, ProblemError};
use crate::discretization::mesh::Mesh;
use crate::model::{Model, ModelRequirement};
use crate::physics::bc::{BoundaryCondition, BoundaryRule, resolve_boundary};
use crate::physics::diffusion::DiffusionOperator;
use crate::survey::{Survey, SurveyKind};
use log::debug;
use nalgebra::{DMatrix, DVector};
use num_dual::{DualDVec64, DualNum, jacobian};
use serde::Deserialize;

/// Source injected into a single cell, integrated over the cell.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct PointSource {
    pub cell: usize,
    pub strength: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct DiffusionConfig {
    pub sources: Vec<PointSource>,
    /// Condition on every boundary face no rule claims.
    #[serde(default)]
    pub boundary: BoundaryCondition,
    #[serde(default)]
    pub boundary_rules: Vec<BoundaryRule>,
    #[serde(default)]
    pub model_requirement: ModelRequirement,
}

impl DiffusionConfig {
    fn validate(&self, mesh: &Mesh) -> Result<Vec<BoundaryCondition>, ProblemError> {
        let n_cells = mesh.n_cells();
        if self.sources.is_empty() {
            return Err(ProblemError::InvalidConfig("at least one source is required".into()));
        }
        for source in &self.sources {
            if source.cell >= n_cells {
                return Err(ProblemError::InvalidConfig(format!(
                    "source cell {} is outside a mesh of {n_cells} cells",
                    source.cell
                )));
            }
            if !source.strength.is_finite() {
                return Err(ProblemError::InvalidConfig(format!(
                    "source strength in cell {} is not finite",
                    source.cell
                )));
            }
        }
        let conditions = std::iter::once(&self.boundary)
            .chain(self.boundary_rules.iter().map(|r| &r.condition));
        for bc in conditions {
            let (alpha, beta, gamma) = bc.coefficients();
            if ![alpha, beta, gamma].iter().all(|c| c.is_finite()) {
                return Err(ProblemError::InvalidConfig("boundary values must be finite".into()));
            }
        }
        if let Some(rule) = self.boundary_rules.iter().find(|r| {
            let norm: f64 = r.normal.iter().map(|c| c * c).sum();
            !(norm.is_finite() && norm > 0.0)
        }) {
            return Err(ProblemError::InvalidConfig(format!(
                "boundary rule normal {:?} has no direction",
                rule.normal
            )));
        }

        // without a value-fixing face u is only defined up to a constant
        let resolved = resolve_boundary(mesh, self.boundary, &self.boundary_rules);
        let pinned = mesh.boundary_faces().any(|(f, _)| resolved[f].fixes_value());
        if !pinned {
            return Err(ProblemError::InvalidConfig(
                "at least one boundary face needs a Dirichlet condition".into(),
            ));
        }
        Ok(resolved)
    }
}

/// Steady-state diffusion `-div(sigma grad u) = q` with `sigma = mapping(m)`.
///
/// `dc/du` and `dc/dm` are assembled with forward-mode AD over the same
/// residual the fields are solved from, so `jvec` and `jtvec` are exact
/// adjoints of each other up to the LU round-off.
#[derive(Clone, Debug)]
pub struct DiffusionProblem {
    model: Model,
    boundary: Vec<BoundaryCondition>,
    source: DVector<f64>,
}

impl DiffusionProblem {
    pub fn new(model: Model, config: DiffusionConfig) -> Result<Self, ProblemError> {
        config.model_requirement.check(&model)?;
        let boundary = config.validate(model.mesh())?;
        let n_cells = model.mesh().n_cells();

        let mut source = DVector::zeros(n_cells);
        for s in &config.sources {
            source[s.cell] += s.strength;
        }

        Ok(Self {
            model,
            boundary,
            source,
        })
    }

    fn operator(&self) -> DiffusionOperator<'_> {
        DiffusionOperator::new(self.model.mesh(), &self.boundary)
    }

    /// Physical property for `m`, rejecting non-positive conductivities.
    fn conductivity<T>(&self, m: &DVector<T>) -> Result<DVector<T>, ProblemError>
    where
        T: nalgebra::Scalar + DualNum<f64>,
    {
        ensure_len(self.model.n_params(), m.len())?;
        let sigma = self.model.transform(m);
        if let Some(bad) = sigma.iter().find(|s| !(s.re() > 0.0)) {
            return Err(ProblemError::InvalidModel(format!(
                "conductivity must be positive, found {}",
                bad.re()
            )));
        }
        Ok(sigma)
    }

    /// `c(m, u)`.
    pub fn residual(&self, m: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>, ProblemError> {
        let sigma = self.conductivity(m)?;
        ensure_len(self.source.len(), u.len())?;
        Ok(self.operator().residual(&sigma, u, &self.source))
    }

    /// `A = dc/du`. The residual is affine in `u`, so `A` depends on `m` only.
    pub fn system_matrix(&self, m: &DVector<f64>) -> Result<DMatrix<f64>, ProblemError> {
        let sigma = self.conductivity(m)?.map(DualDVec64::from_re);
        let op = self.operator();
        let (_, a) = jacobian(
            |u: DVector<DualDVec64>| op.residual(&sigma, &u, &self.source),
            DVector::zeros(self.source.len()),
        );
        Ok(a)
    }

    /// `G = dc/dm` at fixed fields.
    pub fn model_derivative(&self, m: &DVector<f64>, fields: &Fields) -> Result<DMatrix<f64>, ProblemError> {
        self.conductivity(m)?;
        ensure_len(self.source.len(), fields.len())?;
        let u = fields.u.map(DualDVec64::from_re);
        let op = self.operator();
        let (_, g) = jacobian(
            |m: DVector<DualDVec64>| {
                let sigma = self.model.transform(&m);
                op.residual(&sigma, &u, &self.source)
            },
            m.clone(),
        );
        Ok(g)
    }

    fn solve_fields(&self, m: &DVector<f64>) -> Result<Fields, ProblemError> {
        let a = self.system_matrix(m)?;
        let r0 = self.residual(m, &DVector::zeros(self.source.len()))?;
        let u = checked_solve(a, &-r0)?;
        debug!("solved fields on {} cells, |u| = {:.3e}", u.len(), u.norm());
        Ok(Fields::new(u))
    }
}

/// Largest residual `|a x - b|` accepted, relative to `|b|`.
const SOLVE_TOLERANCE: f64 = 1e-6;

/// Dense LU solve of `a x = b`. Fails on a zero pivot, and on a solution
/// that does not satisfy the system, which is what a numerically singular
/// `a` produces.
fn checked_solve(a: DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, ProblemError> {
    let x = a
        .clone()
        .lu()
        .solve(b)
        .ok_or(ProblemError::LinearSolveFailed)?;
    let r = (&a * &x - b).amax();
    if x.iter().all(|v| v.is_finite()) && r <= SOLVE_TOLERANCE * b.amax() {
        Ok(x)
    } else {
        debug!("rejected solve: |a x - b| = {r:.3e}, |b| = {:.3e}", b.amax());
        Err(ProblemError::LinearSolveFailed)
    }
}

impl Problem for DiffusionProblem {
    fn model(&self) -> &Model {
        &self.model
    }

    fn survey_kind(&self) -> SurveyKind {
        SurveyKind::Potential
    }

    fn fields(&self, m: &DVector<f64>) -> Result<Option<Fields>, ProblemError> {
        self.solve_fields(m).map(Some)
    }

    fn jvec(
        &self,
        survey: &Survey,
        m: &DVector<f64>,
        v: &DVector<f64>,
        u: Option<&Fields>,
    ) -> Result<DVector<f64>, ProblemError> {
        ensure_len(self.model.n_params(), v.len())?;
        let computed;
        let fields = match u {
            Some(fields) => fields,
            None => {
                computed = self.solve_fields(m)?;
                &computed
            }
        };

        let a = self.system_matrix(m)?;
        let g = self.model_derivative(m, fields)?;
        let du = checked_solve(a, &(g * v))?;
        Ok(-survey.project(&du)?)
    }

    fn jtvec(
        &self,
        survey: &Survey,
        m: &DVector<f64>,
        v: &DVector<f64>,
        u: Option<&Fields>,
    ) -> Result<DVector<f64>, ProblemError> {
        let ptv = survey.project_transpose(v)?;
        let computed;
        let fields = match u {
            Some(fields) => fields,
            None => {
                computed = self.solve_fields(m)?;
                &computed
            }
        };

        let a = self.system_matrix(m)?;
        let g = self.model_derivative(m, fields)?;
        let lambda = checked_solve(a.transpose(), &ptv)?;
        Ok(-(g.transpose() * lambda))
    }
}
