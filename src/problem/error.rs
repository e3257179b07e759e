use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProblemError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("the survey is already paired to a problem; unpair it first")]
    AlreadyPaired,
    #[error("{0} is not implemented for this problem")]
    NotImplemented(&'static str),
    #[error("no survey is paired with this problem")]
    NotPaired,
    #[error("unknown problem id {0}")]
    UnknownProblem(usize),
    #[error("unknown survey id {0}")]
    UnknownSurvey(usize),
    #[error("dimension mismatch: expected length {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("survey has no {0}")]
    MissingData(&'static str),
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("linear solve failed")]
    LinearSolveFailed,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Fails with [`ProblemError::DimensionMismatch`] unless `found == expected`.
pub(crate) fn ensure_len(expected: usize, found: usize) -> Result<(), ProblemError> {
    if expected == found {
        Ok(())
    } else {
        Err(ProblemError::DimensionMismatch { expected, found })
    }
}
