//! Forward problems, surveys and sensitivities for finite-volume inversion.
//!
//! A [`Problem`](problem::Problem) maps model parameters to fields, a
//! [`Survey`](survey::Survey) observes the fields, and the
//! [`PairingRegistry`](pairing::PairingRegistry) keeps the one-to-one
//! association between the two and evaluates predicted data and the
//! Jacobian products `J v` and `J^T v` through it.

pub mod config;
pub mod discretization;
pub mod model;
pub mod numerics;
pub mod pairing;
pub mod physics;
pub mod problem;
pub mod processing;
pub mod survey;

pub use model::{Mapping, Model, ModelRequirement};
pub use pairing::{PairingRegistry, ProblemId, SurveyId};
pub use problem::{BaseProblem, Fields, Problem, ProblemError};
pub use survey::{Survey, SurveyGeometry, SurveyKind};
