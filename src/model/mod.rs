//! Model parameterizations and the capability checks problems run on them.
//!
//! A [`Model`] is either a single mapped model or a [`ComboModel`], an ordered
//! composition of mapped models over the same mesh. Problems declare a
//! [`ModelRequirement`]; for a combo model only the leading (outermost)
//! member is inspected.

pub mod mapping;

pub use mapping::{Mapping, MappingKind};

use crate::discretization::mesh::Mesh;
use crate::problem::ProblemError;
use nalgebra::{DMatrix, DVector};
use num_dual::{DualDVec64, DualNum, jacobian};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// A mapping bound to the mesh it parameterizes.
#[derive(Clone, Debug)]
pub struct MappedModel {
    mapping: Mapping,
    mesh: Arc<Mesh>,
}

impl MappedModel {
    pub fn new(mapping: Mapping, mesh: Arc<Mesh>) -> Self {
        Self { mapping, mesh }
    }

    pub fn mapping(&self) -> Mapping {
        self.mapping
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }
}

/// Composition `models[0] ∘ models[1] ∘ …`; the last member is applied first.
#[derive(Clone, Debug)]
pub struct ComboModel {
    models: Vec<MappedModel>,
}

impl ComboModel {
    /// Fails if `models` is empty or the members do not share one mesh.
    pub fn new(models: Vec<MappedModel>) -> Result<Self, ProblemError> {
        let Some(first) = models.first() else {
            return Err(ProblemError::InvalidConfig(
                "a combo model needs at least one member".into(),
            ));
        };
        if models.iter().any(|m| !Arc::ptr_eq(&m.mesh, &first.mesh)) {
            return Err(ProblemError::InvalidConfig(
                "combo model members must share a mesh".into(),
            ));
        }
        Ok(Self { models })
    }

    /// The outermost member, the one capability checks look at.
    pub fn leading(&self) -> &MappedModel {
        // non-empty by construction
        &self.models[0]
    }
}

#[derive(Clone, Debug)]
pub enum Model {
    Single(MappedModel),
    Combo(ComboModel),
}

impl Model {
    pub fn mapped(mapping: Mapping, mesh: Arc<Mesh>) -> Self {
        Model::Single(MappedModel::new(mapping, mesh))
    }

    pub fn combo(models: Vec<MappedModel>) -> Result<Self, ProblemError> {
        ComboModel::new(models).map(Model::Combo)
    }

    fn leading(&self) -> &MappedModel {
        match self {
            Model::Single(model) => model,
            Model::Combo(combo) => combo.leading(),
        }
    }

    pub fn mesh(&self) -> &Mesh {
        self.leading().mesh()
    }

    /// Number of model parameters: one per mesh cell.
    pub fn n_params(&self) -> usize {
        self.mesh().n_cells()
    }

    /// Physical property for the parameters `m`.
    pub fn transform<T>(&self, m: &DVector<T>) -> DVector<T>
    where
        T: nalgebra::Scalar + DualNum<f64>,
    {
        match self {
            Model::Single(model) => model.mapping.apply(m),
            Model::Combo(combo) => combo
                .models
                .iter()
                .rev()
                .fold(m.clone(), |acc, model| model.mapping.apply(&acc)),
        }
    }

    /// Derivative of [`Model::transform`] with respect to `m`.
    pub fn transform_deriv(&self, m: &DVector<f64>) -> DMatrix<f64> {
        let (_, jac) = jacobian(|x: DVector<DualDVec64>| self.transform(&x), m.clone());
        jac
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Single(model) => write!(f, "{}", model.mapping.kind()),
            Model::Combo(combo) => {
                let names: Vec<String> = combo
                    .models
                    .iter()
                    .map(|m| m.mapping.kind().to_string())
                    .collect();
                write!(f, "combo[{}]", names.join(", "))
            }
        }
    }
}

/// The model capability a problem declares.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRequirement {
    #[default]
    Any,
    Mapping(MappingKind),
}

impl ModelRequirement {
    pub fn accepts(&self, model: &Model) -> bool {
        match self {
            ModelRequirement::Any => true,
            ModelRequirement::Mapping(kind) => model.leading().mapping.kind() == *kind,
        }
    }

    pub fn check(&self, model: &Model) -> Result<(), ProblemError> {
        if self.accepts(model) {
            Ok(())
        } else {
            Err(ProblemError::TypeMismatch {
                expected: self.to_string(),
                found: model.to_string(),
            })
        }
    }
}

impl fmt::Display for ModelRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRequirement::Any => f.write_str("any model"),
            ModelRequirement::Mapping(kind) => write!(f, "{kind} model"),
        }
    }
}
