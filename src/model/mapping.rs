use nalgebra::DVector;
use num_dual::DualNum;
use serde::Deserialize;
use std::fmt;

/// Maps model parameters `m` onto the physical property the PDE consumes.
///
/// Mappings are evaluated over any [`DualNum`] so their derivatives come out
/// of the same code path as their values.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mapping {
    /// `sigma = m`
    Identity,
    /// `sigma = exp(m)`, i.e. `m` is a log-conductivity.
    Exp,
    /// `sigma = factor * m`
    Scale { factor: f64 },
}

/// The capability a mapping provides, without its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    Identity,
    Exp,
    Scale,
}

impl Mapping {
    pub fn kind(&self) -> MappingKind {
        match self {
            Mapping::Identity => MappingKind::Identity,
            Mapping::Exp => MappingKind::Exp,
            Mapping::Scale { .. } => MappingKind::Scale,
        }
    }

    pub fn apply<T>(&self, m: &DVector<T>) -> DVector<T>
    where
        T: nalgebra::Scalar + DualNum<f64>,
    {
        match *self {
            Mapping::Identity => m.clone(),
            Mapping::Exp => m.map(|x| x.exp()),
            Mapping::Scale { factor } => m.map(|x| x * factor),
        }
    }
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MappingKind::Identity => "identity",
            MappingKind::Exp => "exp",
            MappingKind::Scale => "scale",
        };
        f.write_str(name)
    }
}
