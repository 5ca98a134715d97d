//! Error type surfaced by every fallible operation of the crate.
//!
//! The core never retries: each error is reported to the caller as one of the
//! variants below. The adaptive refinement loop in `sve` is not an error
//! path; every iteration is an ordinary successful computation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("point {0} is outside the domain")]
    OutOfDomain(f64),

    #[error("piecewise polynomials are defined on different section edges")]
    MeshMismatch,

    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<mpnum::ParseRealError> for Error {
    fn from(e: mpnum::ParseRealError) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<mpnum::SvdError> for Error {
    fn from(e: mpnum::SvdError) -> Self {
        Error::NumericalFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
