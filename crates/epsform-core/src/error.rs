//! Error type for the reduction core.

use thiserror::Error;

use epsform_engine::EngineError;

/// Errors produced by the reduction core.
///
/// Algorithmic dead ends are fatal: the system is left in an unspecified
/// intermediate state and the job must be aborted. Only
/// [`EngineError::DivisionByZero`] is ever handled locally, during the
/// speculative substitution searches of ε-factorization.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("unable to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path} line {line}: {msg}")]
    Parse {
        path: String,
        line: usize,
        msg: String,
    },

    #[error("upper right blocks are not zero")]
    UpperBlocksNotZero,

    #[error("system is not in fuchsian form")]
    NotFuchsian,

    #[error("no regular point found")]
    NoRegularPoint,

    #[error("unable to normalize system")]
    UnableToNormalize,

    #[error("unable to find all eigenvalues; matrix was: {0}")]
    EigenvaluesNotFound(String),

    #[error("eigenvalues have to be proportional to ep")]
    EigenvaluesNotEpProportional,

    #[error("jordan decomposition failed")]
    JordanFailed,

    #[error("wrong number of root vectors")]
    RootVectorCount,

    #[error("linear system has no solution")]
    NoSolution,

    #[error("left transformation failed to clear the target order")]
    TransformationFailed,

    #[error("transformation is singular")]
    SingularTransformation,

    #[error("system is singular at mu={0}")]
    SingularAtMu(i64),

    #[error("mu must be != 0")]
    MuZero,

    #[error("left gauge must satisfy G^2 = 0")]
    GaugeNotNilpotent,

    #[error("not in row reduced echelon form (this is a bug)")]
    NotEchelon,

    #[error("replay not possible: full system must be active")]
    ReplayWithPadding,

    #[error("transformation queue is empty")]
    EmptyQueue,
}

pub type Result<T> = std::result::Result<T, Error>;
